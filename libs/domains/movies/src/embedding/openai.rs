use std::time::Duration;

use async_trait::async_trait;
use core_config::FromEnv;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, EmbeddingResult};

/// Longest provider error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// OpenAI-compatible `/embeddings` client
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
    timeout: Duration,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> EmbeddingResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(EmbeddingError::Config("API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
            timeout: config.timeout(),
        })
    }

    pub fn from_env() -> EmbeddingResult<Self> {
        let config =
            EmbeddingConfig::from_env().map_err(|e| EmbeddingError::Config(e.to_string()))?;
        Self::new(&config)
    }

    /// Only the v3 models accept a `dimensions` override
    fn requested_dimensions(&self) -> Option<u32> {
        self.model
            .starts_with("text-embedding-3")
            .then_some(self.dimension as u32)
    }

    fn transport_error(&self, err: reqwest::Error) -> EmbeddingError {
        if err.is_timeout() {
            EmbeddingError::Timeout(self.timeout)
        } else {
            EmbeddingError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Vectors in input order, checked against the number of inputs
fn parse_embeddings(body: &str, expected: usize) -> EmbeddingResult<Vec<Vec<f32>>> {
    let response: EmbeddingResponse =
        serde_json::from_str(body).map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

    if response.data.len() != expected {
        return Err(EmbeddingError::MalformedResponse(format!(
            "expected {} embeddings, got {}",
            expected,
            response.data.len()
        )));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in response.data {
        match slots.get_mut(item.index) {
            Some(slot) if slot.is_none() => *slot = Some(item.embedding),
            _ => {
                return Err(EmbeddingError::MalformedResponse(format!(
                    "unexpected embedding index {}",
                    item.index
                )));
            }
        }
    }

    Ok(slots.into_iter().flatten().collect())
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body.chars().take(MAX_ERROR_BODY).collect(),
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.requested_dimensions(),
        };

        debug!(model = %self.model, inputs = texts.len(), "Requesting embeddings");

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            return Err(EmbeddingError::RateLimited { retry_after_secs });
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(EmbeddingError::Provider {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        parse_embeddings(&body, texts.len())
    }
}
