//! Movie list queries
//! Mission: Translate query-string parameters into a safe, parameterized SQL query
//!
//! Supported shapes:
//! - `field=value` equality (array fields match when any element equals the value)
//! - `field[gte|gt|lte|lt]=value` comparisons
//! - `sort=a,-b`, `fields=a,b` or `fields=-a`, `page=n`, `limit=n`
//!
//! Field names are resolved against a fixed whitelist, so no client text ever
//! reaches the SQL string itself.

use crate::movies::models::parse_date;
use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError(String);

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for QueryError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Number,
    Date,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieField {
    Id,
    Name,
    Description,
    Duration,
    Ratings,
    TotalRatings,
    ReleaseYear,
    ReleaseDate,
    CreatedAt,
    Genres,
    Directors,
    CoverImage,
    Actors,
    Price,
    CreatedBy,
}

impl MovieField {
    pub fn parse(name: &str) -> Option<Self> {
        let field = match name {
            "id" | "_id" => MovieField::Id,
            "name" => MovieField::Name,
            "description" => MovieField::Description,
            "duration" => MovieField::Duration,
            "ratings" => MovieField::Ratings,
            "totalRatings" => MovieField::TotalRatings,
            "releaseYear" => MovieField::ReleaseYear,
            "releaseDate" => MovieField::ReleaseDate,
            "createdAt" => MovieField::CreatedAt,
            "genres" => MovieField::Genres,
            "directors" => MovieField::Directors,
            "coverImage" => MovieField::CoverImage,
            "actors" => MovieField::Actors,
            "price" => MovieField::Price,
            "createdBy" => MovieField::CreatedBy,
            _ => return None,
        };
        Some(field)
    }

    /// Key in the JSON document
    pub fn json_key(&self) -> &'static str {
        match self {
            MovieField::Id => "id",
            MovieField::Name => "name",
            MovieField::Description => "description",
            MovieField::Duration => "duration",
            MovieField::Ratings => "ratings",
            MovieField::TotalRatings => "totalRatings",
            MovieField::ReleaseYear => "releaseYear",
            MovieField::ReleaseDate => "releaseDate",
            MovieField::CreatedAt => "createdAt",
            MovieField::Genres => "genres",
            MovieField::Directors => "directors",
            MovieField::CoverImage => "coverImage",
            MovieField::Actors => "actors",
            MovieField::Price => "price",
            MovieField::CreatedBy => "createdBy",
        }
    }

    /// Column in the `movies` table
    pub fn column(&self) -> &'static str {
        match self {
            MovieField::Id => "id",
            MovieField::Name => "name",
            MovieField::Description => "description",
            MovieField::Duration => "duration",
            MovieField::Ratings => "ratings",
            MovieField::TotalRatings => "total_ratings",
            MovieField::ReleaseYear => "release_year",
            MovieField::ReleaseDate => "release_date",
            MovieField::CreatedAt => "created_at",
            MovieField::Genres => "genres",
            MovieField::Directors => "directors",
            MovieField::CoverImage => "cover_image",
            MovieField::Actors => "actors",
            MovieField::Price => "price",
            MovieField::CreatedBy => "created_by",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            MovieField::Duration
            | MovieField::Ratings
            | MovieField::TotalRatings
            | MovieField::ReleaseYear
            | MovieField::Price => FieldKind::Number,
            MovieField::ReleaseDate | MovieField::CreatedAt => FieldKind::Date,
            MovieField::Genres | MovieField::Directors | MovieField::Actors => FieldKind::List,
            _ => FieldKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn parse(op: &str) -> Option<Self> {
        match op.trim_start_matches('$') {
            "eq" => Some(CompareOp::Eq),
            "gt" => Some(CompareOp::Gt),
            "gte" => Some(CompareOp::Gte),
            "lt" => Some(CompareOp::Lt),
            "lte" => Some(CompareOp::Lte),
            _ => None,
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(f64),
    /// Unix milliseconds
    Date(i64),
}

impl FilterValue {
    fn to_sql(&self) -> SqlValue {
        match self {
            FilterValue::Text(s) => SqlValue::Text(s.clone()),
            FilterValue::Number(n) => SqlValue::Real(*n),
            FilterValue::Date(ms) => SqlValue::Integer(*ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: MovieField,
    pub op: CompareOp,
    pub value: FilterValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: MovieField,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Include(Vec<MovieField>),
    Exclude(Vec<MovieField>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovieQuery {
    pub filters: Vec<Filter>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub page: u32,
    pub limit: u32,
}

impl Default for MovieQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: vec![SortKey {
                field: MovieField::CreatedAt,
                descending: true,
            }],
            projection: Projection::All,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// SQL pieces for a `MovieQuery`, appended after the visibility predicate
pub struct SqlParts {
    pub where_sql: String,
    pub order_sql: String,
    pub params: Vec<SqlValue>,
}

impl MovieQuery {
    /// Build from raw `(key, value)` query pairs
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, QueryError> {
        let mut query = MovieQuery::default();

        for (key, value) in pairs {
            match key.as_str() {
                "sort" => query.sort = parse_sort(value)?,
                "fields" => query.projection = parse_projection(value)?,
                "page" => query.page = parse_positive(value).unwrap_or(DEFAULT_PAGE),
                "limit" => {
                    query.limit = parse_positive(value).unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
                }
                _ => query.filters.push(parse_filter(key, value)?),
            }
        }

        Ok(query)
    }

    /// Same as [`from_pairs`](Self::from_pairs) but forces the given reserved keys.
    pub fn from_pairs_with_preset(
        pairs: &[(String, String)],
        preset: &[(&str, &str)],
    ) -> Result<Self, QueryError> {
        let mut merged: Vec<(String, String)> = pairs
            .iter()
            .filter(|(k, _)| !preset.iter().any(|(pk, _)| pk == k))
            .cloned()
            .collect();
        merged.extend(preset.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        Self::from_pairs(&merged)
    }

    pub fn skip(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    pub fn to_sql(&self) -> SqlParts {
        let mut clauses = Vec::with_capacity(self.filters.len());
        let mut params = Vec::with_capacity(self.filters.len());

        for filter in &self.filters {
            let column = filter.field.column();
            if filter.field.kind() == FieldKind::List {
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM json_each(movies.{}) WHERE json_each.value = ?)",
                    column
                ));
            } else {
                clauses.push(format!("movies.{} {} ?", column, filter.op.sql()));
            }
            params.push(filter.value.to_sql());
        }

        let where_sql = clauses
            .iter()
            .map(|c| format!(" AND {}", c))
            .collect::<String>();

        let mut order: Vec<String> = self
            .sort
            .iter()
            .map(|key| {
                format!(
                    "movies.{} {}",
                    key.field.column(),
                    if key.descending { "DESC" } else { "ASC" }
                )
            })
            .collect();
        // Stable pagination across equal sort keys
        order.push("movies.id ASC".to_string());

        SqlParts {
            where_sql,
            order_sql: order.join(", "),
            params,
        }
    }

    /// Apply the field projection to a movie document
    pub fn project(&self, doc: Value) -> Value {
        let Value::Object(map) = doc else {
            return doc;
        };

        let projected: Map<String, Value> = match &self.projection {
            Projection::All => map,
            Projection::Include(fields) => map
                .into_iter()
                .filter(|(key, _)| {
                    key == "id"
                        || fields.iter().any(|f| f.json_key() == key)
                        || (key == "durationInHours" && fields.contains(&MovieField::Duration))
                })
                .collect(),
            Projection::Exclude(fields) => map
                .into_iter()
                .filter(|(key, _)| {
                    key == "id"
                        || !fields.iter().any(|f| f.json_key() == key)
                        && !(key == "durationInHours" && fields.contains(&MovieField::Duration))
                })
                .collect(),
        };

        Value::Object(projected)
    }
}

fn parse_positive(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|n| *n > 0)
}

fn parse_field(name: &str) -> Result<MovieField, QueryError> {
    MovieField::parse(name.trim()).ok_or_else(|| QueryError(format!("Invalid query field: {}", name)))
}

fn parse_sort(raw: &str) -> Result<Vec<SortKey>, QueryError> {
    let mut keys = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (descending, name) = match part.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, part),
        };
        let field = parse_field(name)?;
        if field.kind() == FieldKind::List {
            return Err(QueryError(format!("Cannot sort by list field: {}", name)));
        }
        keys.push(SortKey { field, descending });
    }

    if keys.is_empty() {
        return Ok(MovieQuery::default().sort);
    }
    Ok(keys)
}

fn parse_projection(raw: &str) -> Result<Projection, QueryError> {
    let parts: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if parts.is_empty() {
        return Ok(Projection::All);
    }

    let excluded = parts.iter().filter(|p| p.starts_with('-')).count();
    if excluded != 0 && excluded != parts.len() {
        return Err(QueryError(
            "Cannot mix included and excluded fields".to_string(),
        ));
    }

    let fields = parts
        .iter()
        .map(|p| parse_field(p.trim_start_matches('-')))
        .collect::<Result<Vec<_>, _>>()?;

    if excluded == 0 {
        Ok(Projection::Include(fields))
    } else {
        Ok(Projection::Exclude(fields))
    }
}

fn parse_filter(key: &str, raw: &str) -> Result<Filter, QueryError> {
    let (name, op) = match key.split_once('[') {
        Some((name, rest)) => {
            let op_name = rest
                .strip_suffix(']')
                .ok_or_else(|| QueryError(format!("Invalid query field: {}", key)))?;
            let op = CompareOp::parse(op_name)
                .ok_or_else(|| QueryError(format!("Invalid query operator: {}", op_name)))?;
            (name, op)
        }
        None => (key, CompareOp::Eq),
    };

    let field = parse_field(name)?;

    let value = match field.kind() {
        FieldKind::Number => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(FilterValue::Number)
            .ok_or_else(|| QueryError(format!("Invalid number for {}: {}", name, raw)))?,
        FieldKind::Date => parse_date(raw)
            .map(|d| FilterValue::Date(d.timestamp_millis()))
            .ok_or_else(|| QueryError(format!("Invalid date for {}: {}", name, raw)))?,
        FieldKind::List => {
            if op != CompareOp::Eq {
                return Err(QueryError(format!(
                    "Only equality is supported for list field: {}",
                    name
                )));
            }
            FilterValue::Text(raw.to_string())
        }
        FieldKind::Text => FilterValue::Text(raw.to_string()),
    };

    Ok(Filter { field, op, value })
}
