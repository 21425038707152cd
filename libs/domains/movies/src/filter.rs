//! Structured filters over the `movies` table.
//!
//! A [`FilterSpec`] becomes a SeaORM [`Condition`] that the page query, the
//! COUNT query and bulk updates share. Column names only ever come from the
//! [`FilterField`] allow-list; caller values are always bound parameters.
//! The same spec can be evaluated in memory with [`FilterSpec::matches`] and
//! [`sort_movies`].

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, DbBackend, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect,
    QueryTrait, Select, Statement, Value,
};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::entity::{Column, Entity};
use crate::error::{MovieError, MovieResult};
use crate::models::Movie;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

/// Largest LIMIT/OFFSET value the Postgres driver can bind
const MAX_BIND: u64 = i64::MAX as u64;

/// Columns a filter or ordering may reference
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FilterField {
    Id,
    NameUz,
    NameRu,
    NameEn,
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    Text,
    Id,
    Timestamp,
}

impl FilterField {
    /// Parse a caller-supplied column name
    pub fn parse_name(name: &str) -> MovieResult<Self> {
        name.parse()
            .map_err(|_| MovieError::validation(format!("unknown filter field `{}`", name)))
    }

    pub fn kind(self) -> ValueKind {
        match self {
            FilterField::Id => ValueKind::Id,
            FilterField::NameUz | FilterField::NameRu | FilterField::NameEn => ValueKind::Text,
            FilterField::CreatedAt | FilterField::UpdatedAt => ValueKind::Timestamp,
        }
    }

    pub(crate) fn column(self) -> Column {
        match self {
            FilterField::Id => Column::Id,
            FilterField::NameUz => Column::NameUz,
            FilterField::NameRu => Column::NameRu,
            FilterField::NameEn => Column::NameEn,
            FilterField::CreatedAt => Column::CreatedAt,
            FilterField::UpdatedAt => Column::UpdatedAt,
        }
    }

    fn read(self, movie: &Movie) -> Cell<'_> {
        match self {
            FilterField::Id => Cell::Id(movie.id),
            FilterField::NameUz => Cell::Text(&movie.name_uz),
            FilterField::NameRu => Cell::Text(&movie.name_ru),
            FilterField::NameEn => Cell::Text(&movie.name_en),
            FilterField::CreatedAt => Cell::Timestamp(movie.created_at),
            FilterField::UpdatedAt => Cell::Timestamp(movie.updated_at),
        }
    }
}

/// A column value read from an in-memory record
#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum Cell<'a> {
    Text(&'a str),
    Id(Uuid),
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchMode {
    Eq,
    /// Whole-value match ignoring case
    EqIgnoreCase,
    /// Case-insensitive substring match; `%` and `_` in the needle are literal
    Contains,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl MatchMode {
    fn allowed_for(self, kind: ValueKind) -> bool {
        match kind {
            ValueKind::Text => true,
            ValueKind::Id => self == MatchMode::Eq,
            ValueKind::Timestamp => !matches!(self, MatchMode::EqIgnoreCase | MatchMode::Contains),
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            MatchMode::Gt => ordering == Ordering::Greater,
            MatchMode::Gte => ordering != Ordering::Less,
            MatchMode::Lt => ordering == Ordering::Less,
            MatchMode::Lte => ordering != Ordering::Greater,
            _ => ordering == Ordering::Equal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Id(Uuid),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FieldValue::Text(_) => ValueKind::Text,
            FieldValue::Id(_) => ValueKind::Id,
            FieldValue::Timestamp(_) => ValueKind::Timestamp,
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        match self {
            FieldValue::Text(text) => Value::from(text.clone()),
            FieldValue::Id(id) => Value::from(*id),
            FieldValue::Timestamp(ts) => Value::from(*ts),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: FilterField,
    pub mode: MatchMode,
    pub value: FieldValue,
}

impl FilterCondition {
    pub fn new(field: FilterField, mode: MatchMode, value: FieldValue) -> Self {
        Self { field, mode, value }
    }

    pub fn validate(&self) -> MovieResult<()> {
        let kind = self.field.kind();
        if self.value.kind() != kind {
            return Err(MovieError::validation(format!(
                "`{}` takes a {} value, got {}",
                self.field,
                kind,
                self.value.kind()
            )));
        }
        if !self.mode.allowed_for(kind) {
            return Err(MovieError::validation(format!(
                "`{}` cannot be matched with `{}`",
                self.field, self.mode
            )));
        }
        Ok(())
    }

    fn add_to(&self, target: Condition) -> Condition {
        let column = self.field.column();
        match (self.mode, &self.value) {
            (MatchMode::EqIgnoreCase, FieldValue::Text(text)) => target.add(
                Expr::cust_with_values(ilike_sql(self.field), [escape_like(text)]),
            ),
            (MatchMode::Contains, FieldValue::Text(text)) => target.add(Expr::cust_with_values(
                ilike_sql(self.field),
                [format!("%{}%", escape_like(text))],
            )),
            (MatchMode::Gt, value) => target.add(column.gt(value.to_value())),
            (MatchMode::Gte, value) => target.add(column.gte(value.to_value())),
            (MatchMode::Lt, value) => target.add(column.lt(value.to_value())),
            (MatchMode::Lte, value) => target.add(column.lte(value.to_value())),
            (_, value) => target.add(column.eq(value.to_value())),
        }
    }

    fn matches(&self, movie: &Movie) -> bool {
        match (self.field.read(movie), &self.value) {
            (Cell::Text(actual), FieldValue::Text(expected)) => match self.mode {
                MatchMode::EqIgnoreCase => actual.to_lowercase() == expected.to_lowercase(),
                MatchMode::Contains => actual.to_lowercase().contains(&expected.to_lowercase()),
                mode => mode.accepts(actual.cmp(expected.as_str())),
            },
            (Cell::Id(actual), FieldValue::Id(expected)) => self.mode.accepts(actual.cmp(expected)),
            (Cell::Timestamp(actual), FieldValue::Timestamp(expected)) => {
                self.mode.accepts(actual.cmp(expected))
            }
            _ => false,
        }
    }
}

fn ilike_sql(field: FilterField) -> String {
    format!("\"{}\" ILIKE ?", field.as_ref())
}

/// Escape LIKE wildcards so the text matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    #[default]
    All,
    Any,
}

/// Conditions joined by one combinator; the group as a whole is ANDed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub combinator: Combinator,
    pub conditions: Vec<FilterCondition>,
}

impl FilterGroup {
    pub fn any(conditions: Vec<FilterCondition>) -> Self {
        Self {
            combinator: Combinator::Any,
            conditions,
        }
    }

    pub fn all(conditions: Vec<FilterCondition>) -> Self {
        Self {
            combinator: Combinator::All,
            conditions,
        }
    }

    fn condition(&self) -> Condition {
        let base = match self.combinator {
            Combinator::All => Condition::all(),
            Combinator::Any => Condition::any(),
        };
        self.conditions
            .iter()
            .fold(base, |acc, condition| condition.add_to(acc))
    }

    fn matches(&self, movie: &Movie) -> bool {
        if self.conditions.is_empty() {
            return true;
        }
        match self.combinator {
            Combinator::All => self.conditions.iter().all(|c| c.matches(movie)),
            Combinator::Any => self.conditions.iter().any(|c| c.matches(movie)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: FilterField,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: FilterField) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: FilterField) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }

    fn order(self) -> Order {
        match self.direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

/// Effective page and page size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    /// Missing or non-positive values fall back to page 1 and 10 rows.
    pub fn from_raw(page: Option<i64>, limit: Option<i64>) -> Self {
        let positive = |v: Option<i64>, default: u64| match v {
            Some(v) if v > 0 => v as u64,
            _ => default,
        };
        Self {
            page: positive(page, DEFAULT_PAGE),
            limit: positive(limit, DEFAULT_LIMIT),
        }
    }

    /// Rows to skip, capped at `i64::MAX` since Postgres binds it as BIGINT
    pub fn offset(&self) -> u64 {
        (self.page - 1)
            .checked_mul(self.limit)
            .map_or(MAX_BIND, |offset| offset.min(MAX_BIND))
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Page and count queries for one spec, with SQL text and bound values
#[derive(Debug, Clone)]
pub struct ListStatements {
    pub page: Statement,
    pub count: Statement,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
    #[serde(default)]
    pub groups: Vec<FilterGroup>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_condition(mut self, field: FilterField, mode: MatchMode, value: FieldValue) -> Self {
        self.conditions.push(FilterCondition::new(field, mode, value));
        self
    }

    pub fn with_group(mut self, group: FilterGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_order(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn paginate(mut self, page: i64, limit: i64) -> Self {
        self.page = Some(page);
        self.limit = Some(limit);
        self
    }

    /// True when at least one condition would restrict the rows
    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty() || self.groups.iter().any(|g| !g.conditions.is_empty())
    }

    pub fn validate(&self) -> MovieResult<()> {
        self.conditions
            .iter()
            .chain(self.groups.iter().flat_map(|g| g.conditions.iter()))
            .try_for_each(FilterCondition::validate)
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::from_raw(self.page, self.limit)
    }

    /// Requested ordering, `created_at DESC` when empty, then `id ASC`
    pub fn ordering(&self) -> Vec<OrderBy> {
        let mut ordering = if self.order_by.is_empty() {
            vec![OrderBy::desc(FilterField::CreatedAt)]
        } else {
            self.order_by.clone()
        };
        if !ordering.iter().any(|o| o.field == FilterField::Id) {
            ordering.push(OrderBy::asc(FilterField::Id));
        }
        ordering
    }

    /// Validate and build the WHERE condition
    pub fn condition(&self) -> MovieResult<Condition> {
        self.validate()?;

        let base = self
            .conditions
            .iter()
            .fold(Condition::all(), |acc, condition| condition.add_to(acc));

        Ok(self
            .groups
            .iter()
            .filter(|group| !group.conditions.is_empty())
            .fold(base, |acc, group| acc.add(group.condition())))
    }

    /// Filtered and ordered query, without paging
    pub fn select(&self) -> MovieResult<Select<Entity>> {
        let query = Entity::find().filter(self.condition()?);
        Ok(self
            .ordering()
            .into_iter()
            .fold(query, |query, o| query.order_by(o.field.column(), o.order())))
    }

    /// [`FilterSpec::select`] limited to the requested page
    pub fn page_select(&self) -> MovieResult<Select<Entity>> {
        let pagination = self.pagination();
        Ok(self
            .select()?
            .limit(pagination.limit)
            .offset(pagination.offset()))
    }

    /// `COUNT(*)` over the same condition, ignoring order and paging
    pub fn count_select(&self) -> MovieResult<Select<Entity>> {
        Ok(Entity::find()
            .select_only()
            .column_as(Expr::cust("COUNT(*)"), "count")
            .filter(self.condition()?))
    }

    pub fn statements(&self) -> MovieResult<ListStatements> {
        Ok(ListStatements {
            page: self.page_select()?.build(DbBackend::Postgres),
            count: self.count_select()?.build(DbBackend::Postgres),
        })
    }

    /// Evaluate the filter against an in-memory record
    pub fn matches(&self, movie: &Movie) -> bool {
        self.conditions.iter().all(|c| c.matches(movie))
            && self.groups.iter().all(|g| g.matches(movie))
    }
}

/// Sort by `ordering`, as produced by [`FilterSpec::ordering`]
pub fn sort_movies(movies: &mut [Movie], ordering: &[OrderBy]) {
    movies.sort_by(|a, b| {
        ordering
            .iter()
            .map(|o| {
                let ord = o.field.read(a).cmp(&o.field.read(b));
                match o.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}
