use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{MovieError, MovieResult};
use crate::filter::{FieldValue, FilterField, FilterSpec, MatchMode};

/// Longest accepted title, per language
pub const MAX_NAME_LENGTH: u64 = 500;

/// Movie record as returned to callers
///
/// The stored embedding is never exposed; `distance` is only filled by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: Uuid,
    pub name_uz: String,
    pub name_ru: String,
    pub name_en: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl Movie {
    pub fn names(&self) -> MovieNames {
        MovieNames::new(&self.name_uz, &self.name_ru, &self.name_en)
    }
}

/// Title languages, in embedding order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Locale {
    Uz,
    Ru,
    En,
}

impl Locale {
    pub const ALL: [Locale; 3] = [Locale::Uz, Locale::Ru, Locale::En];
}

/// The three localized titles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieNames {
    pub name_uz: String,
    pub name_ru: String,
    pub name_en: String,
}

impl MovieNames {
    pub fn new(uz: impl Into<String>, ru: impl Into<String>, en: impl Into<String>) -> Self {
        Self {
            name_uz: uz.into(),
            name_ru: ru.into(),
            name_en: en.into(),
        }
    }

    /// Same text in every language, as used for search
    pub fn repeated(text: &str) -> Self {
        Self::new(text, text, text)
    }

    pub fn get(&self, locale: Locale) -> &str {
        match locale {
            Locale::Uz => &self.name_uz,
            Locale::Ru => &self.name_ru,
            Locale::En => &self.name_en,
        }
    }

    /// First name that carries text, in [`Locale::ALL`] order
    ///
    /// Records and queries are both embedded from this one text, so a query
    /// naming a record's leading title lands on that record's vector.
    pub fn embedding_text(&self) -> Option<&str> {
        Locale::ALL
            .into_iter()
            .map(|locale| self.get(locale))
            .find(|name| !name.trim().is_empty())
    }

    pub fn is_blank(&self) -> bool {
        self.embedding_text().is_none()
    }

    pub(crate) fn set(&mut self, column: PatchableColumn, value: String) {
        match column {
            PatchableColumn::NameUz => self.name_uz = value,
            PatchableColumn::NameRu => self.name_ru = value,
            PatchableColumn::NameEn => self.name_en = value,
        }
    }
}

fn validate_has_name(names: &[&str]) -> Result<(), ValidationError> {
    if names.iter().all(|name| name.trim().is_empty()) {
        let mut err = ValidationError::new("at_least_one_name");
        err.message = Some("at least one of name_uz, name_ru, name_en must be set".into());
        return Err(err);
    }
    Ok(())
}

fn validate_create_names(input: &CreateMovie) -> Result<(), ValidationError> {
    validate_has_name(&[&input.name_uz, &input.name_ru, &input.name_en])
}

fn validate_update_names(input: &UpdateMovie) -> Result<(), ValidationError> {
    validate_has_name(&[&input.name_uz, &input.name_ru, &input.name_en])
}

/// Input for creating a movie
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_create_names"))]
pub struct CreateMovie {
    #[serde(default)]
    #[validate(length(max = MAX_NAME_LENGTH))]
    pub name_uz: String,
    #[serde(default)]
    #[validate(length(max = MAX_NAME_LENGTH))]
    pub name_ru: String,
    #[serde(default)]
    #[validate(length(max = MAX_NAME_LENGTH))]
    pub name_en: String,
}

impl CreateMovie {
    pub fn new(uz: impl Into<String>, ru: impl Into<String>, en: impl Into<String>) -> Self {
        Self {
            name_uz: uz.into(),
            name_ru: ru.into(),
            name_en: en.into(),
        }
    }

    pub fn names(&self) -> MovieNames {
        MovieNames::new(&self.name_uz, &self.name_ru, &self.name_en)
    }
}

/// Full replacement of a movie's titles
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_update_names"))]
pub struct UpdateMovie {
    pub id: Uuid,
    #[serde(default)]
    #[validate(length(max = MAX_NAME_LENGTH))]
    pub name_uz: String,
    #[serde(default)]
    #[validate(length(max = MAX_NAME_LENGTH))]
    pub name_ru: String,
    #[serde(default)]
    #[validate(length(max = MAX_NAME_LENGTH))]
    pub name_en: String,
}

impl UpdateMovie {
    pub fn new(
        id: Uuid,
        uz: impl Into<String>,
        ru: impl Into<String>,
        en: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name_uz: uz.into(),
            name_ru: ru.into(),
            name_en: en.into(),
        }
    }

    pub fn names(&self) -> MovieNames {
        MovieNames::new(&self.name_uz, &self.name_ru, &self.name_en)
    }
}

/// Partial movie used as a lookup key or as search text
///
/// Unset or blank fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieLookup {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name_uz: Option<String>,
    #[serde(default)]
    pub name_ru: Option<String>,
    #[serde(default)]
    pub name_en: Option<String>,
}

impl MovieLookup {
    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    /// Search text applied to every language
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: None,
            name_uz: Some(text.clone()),
            name_ru: Some(text.clone()),
            name_en: Some(text),
        }
    }

    pub fn with_name_uz(mut self, name: impl Into<String>) -> Self {
        self.name_uz = Some(name.into());
        self
    }

    pub fn with_name_ru(mut self, name: impl Into<String>) -> Self {
        self.name_ru = Some(name.into());
        self
    }

    pub fn with_name_en(mut self, name: impl Into<String>) -> Self {
        self.name_en = Some(name.into());
        self
    }

    fn set_names(&self) -> impl Iterator<Item = (FilterField, &str)> {
        [
            (FilterField::NameUz, self.name_uz.as_deref()),
            (FilterField::NameRu, self.name_ru.as_deref()),
            (FilterField::NameEn, self.name_en.as_deref()),
        ]
        .into_iter()
        .filter_map(|(field, name)| match name {
            Some(name) if !name.trim().is_empty() => Some((field, name)),
            _ => None,
        })
    }

    /// Conjunctive filter over the set fields
    ///
    /// `id` compares exactly, names compare case-insensitively.
    pub fn to_filter(&self) -> MovieResult<FilterSpec> {
        let mut spec = FilterSpec::new();

        if let Some(id) = self.id {
            spec = spec.with_condition(FilterField::Id, MatchMode::Eq, FieldValue::Id(id));
        }
        for (field, name) in self.set_names() {
            spec = spec.with_condition(
                field,
                MatchMode::EqIgnoreCase,
                FieldValue::Text(name.to_string()),
            );
        }

        if !spec.has_conditions() {
            return Err(MovieError::validation(
                "lookup needs an id or at least one name",
            ));
        }
        Ok(spec)
    }

    /// Names to embed for a similarity search
    ///
    /// Search ranks by name only; an `id` is rejected rather than ignored.
    pub fn search_names(&self) -> MovieResult<MovieNames> {
        if self.id.is_some() {
            return Err(MovieError::validation(
                "search matches on names; use get_single to look up an id",
            ));
        }

        let mut names = MovieNames::default();
        for (field, name) in self.set_names() {
            match field {
                FilterField::NameUz => names.name_uz = name.to_string(),
                FilterField::NameRu => names.name_ru = name.to_string(),
                FilterField::NameEn => names.name_en = name.to_string(),
                _ => {}
            }
        }

        if names.is_blank() {
            return Err(MovieError::validation("search text must not be empty"));
        }
        Ok(names)
    }
}

/// Page of movies plus the total number of matches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieList {
    pub items: Vec<Movie>,
    pub count: u64,
}

/// Columns a bulk update may write
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PatchableColumn {
    NameUz,
    NameRu,
    NameEn,
}

impl PatchableColumn {
    pub fn field(self) -> FilterField {
        match self {
            PatchableColumn::NameUz => FilterField::NameUz,
            PatchableColumn::NameRu => FilterField::NameRu,
            PatchableColumn::NameEn => FilterField::NameEn,
        }
    }
}

/// New value for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPatch {
    pub column: PatchableColumn,
    pub value: FieldValue,
}

impl FieldPatch {
    pub fn text(column: PatchableColumn, value: impl Into<String>) -> Self {
        Self {
            column,
            value: FieldValue::Text(value.into()),
        }
    }

    /// Parse a column name, rejecting anything outside the allow-list
    pub fn parse(column: &str, value: FieldValue) -> MovieResult<Self> {
        let column = column
            .parse::<PatchableColumn>()
            .map_err(|_| MovieError::validation(format!("column `{}` cannot be updated", column)))?;
        Ok(Self { column, value })
    }
}

/// Bulk update: `items` applied to every row matching `filter`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateFieldRequest {
    pub items: Vec<FieldPatch>,
    pub filter: FilterSpec,
}

impl UpdateFieldRequest {
    pub fn new(filter: FilterSpec) -> Self {
        Self {
            items: Vec::new(),
            filter,
        }
    }

    pub fn set(mut self, column: PatchableColumn, value: impl Into<String>) -> Self {
        self.items.push(FieldPatch::text(column, value));
        self
    }

    /// Reject empty or ill-typed patches and unfiltered updates
    pub fn validate_request(&self) -> MovieResult<()> {
        if self.items.is_empty() {
            return Err(MovieError::validation("update needs at least one column"));
        }
        if !self.filter.has_conditions() {
            return Err(MovieError::validation(
                "update needs at least one filter condition",
            ));
        }

        let mut seen = Vec::with_capacity(self.items.len());
        for patch in &self.items {
            if seen.contains(&patch.column) {
                return Err(MovieError::validation(format!(
                    "column `{}` is set more than once",
                    patch.column
                )));
            }
            seen.push(patch.column);

            match &patch.value {
                FieldValue::Text(text) if text.chars().count() as u64 > MAX_NAME_LENGTH => {
                    return Err(MovieError::validation(format!(
                        "value for `{}` is longer than {} characters",
                        patch.column, MAX_NAME_LENGTH
                    )));
                }
                FieldValue::Text(_) => {}
                _ => {
                    return Err(MovieError::validation(format!(
                        "column `{}` takes a text value",
                        patch.column
                    )));
                }
            }
        }

        self.filter.validate()
    }

    /// Apply the text patches to `names`
    pub fn apply_to(&self, names: &mut MovieNames) {
        for patch in &self.items {
            if let FieldValue::Text(text) = &patch.value {
                names.set(patch.column, text.clone());
            }
        }
    }
}

/// Number of rows changed by a bulk update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowsAffected {
    pub rows_affected: u64,
}
