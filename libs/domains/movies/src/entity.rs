use sea_orm::entity::prelude::*;
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};

use crate::models::Movie;

/// Row of the `movies` table
///
/// The `embedding` column is left out; it is written and compared only
/// through raw statements with a `::vector` cast.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "movies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub name_uz: String,
    #[sea_orm(column_type = "Text")]
    pub name_ru: String,
    #[sea_orm(column_type = "Text")]
    pub name_en: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Movie {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name_uz: model.name_uz,
            name_ru: model.name_ru,
            name_en: model.name_en,
            created_at: model.created_at.to_utc(),
            updated_at: model.updated_at.to_utc(),
            distance: None,
        }
    }
}

/// Search result row: the record plus its `<->` distance to the query vector
#[derive(Debug, Clone, FromQueryResult)]
pub struct SearchRow {
    pub id: Uuid,
    pub name_uz: String,
    pub name_ru: String,
    pub name_en: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub distance: f64,
}

impl From<SearchRow> for Movie {
    fn from(row: SearchRow) -> Self {
        Self {
            id: row.id,
            name_uz: row.name_uz,
            name_ru: row.name_ru,
            name_en: row.name_en,
            created_at: row.created_at.to_utc(),
            updated_at: row.updated_at.to_utc(),
            distance: Some(row.distance),
        }
    }
}

#[derive(Debug, FromQueryResult)]
pub struct CountRow {
    pub count: i64,
}
