//! Text encoding of embedding vectors for pgvector columns.
//!
//! pgvector accepts `[1.5,2,3]` as input for a `vector` column and prints the
//! same shape on output. Values are written with a fixed 9 fractional digits
//! so normalised embeddings (components well below 1.0) keep their precision.

use thiserror::Error;

/// Literal used for a vector with no components
pub const EMPTY_LITERAL: &str = "{}";

const FRACTION_DIGITS: usize = 9;

#[derive(Debug, Error, PartialEq)]
pub enum VectorLiteralError {
    #[error("vector literal must be wrapped in [] or {{}}: {0:?}")]
    Delimiters(String),

    #[error("invalid vector component {component:?} at position {position}")]
    Component { position: usize, component: String },

    #[error("vector component at position {0} is not finite")]
    NonFinite(usize),

    #[error("vector has {actual} dimensions, expected {expected}")]
    Dimension { expected: usize, actual: usize },
}

/// Encode `vector` as a pgvector literal; the empty vector becomes `{}`.
pub fn encode(vector: &[f32]) -> String {
    if vector.is_empty() {
        return EMPTY_LITERAL.to_string();
    }

    let components: Vec<String> = vector
        .iter()
        .map(|v| format!("{:.*}", FRACTION_DIGITS, v))
        .collect();

    format!("[{}]", components.join(","))
}

/// Parse a literal produced by [`encode`] or printed by pgvector.
pub fn decode(literal: &str) -> Result<Vec<f32>, VectorLiteralError> {
    let trimmed = literal.trim();

    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .or_else(|| trimmed.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
        .ok_or_else(|| VectorLiteralError::Delimiters(trimmed.to_string()))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .enumerate()
        .map(|(position, raw)| {
            let component = raw.trim();
            let value: f32 = component.parse().map_err(|_| VectorLiteralError::Component {
                position,
                component: component.to_string(),
            })?;
            if !value.is_finite() {
                return Err(VectorLiteralError::NonFinite(position));
            }
            Ok(value)
        })
        .collect()
}

/// Check that `vector` can be stored in a `vector(expected)` column.
pub fn validate(vector: &[f32], expected: usize) -> Result<(), VectorLiteralError> {
    if vector.len() != expected {
        return Err(VectorLiteralError::Dimension {
            expected,
            actual: vector.len(),
        });
    }

    match vector.iter().position(|v| !v.is_finite()) {
        Some(position) => Err(VectorLiteralError::NonFinite(position)),
        None => Ok(()),
    }
}
