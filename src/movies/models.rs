//! Movie Models
//! Mission: Define the movie document, its validation rules and report rows

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const NAME_MIN_LEN: usize = 4;
pub const NAME_MAX_LEN: usize = 100;
pub const RATING_MIN: f64 = 1.0;
pub const RATING_MAX: f64 = 10.0;

/// Stored movie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Minutes
    pub duration: f64,
    pub ratings: Option<f64>,
    pub total_ratings: Option<f64>,
    pub release_year: i64,
    pub release_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub genres: Vec<String>,
    pub directors: Vec<String>,
    pub cover_image: String,
    pub actors: Vec<String>,
    pub price: f64,
    pub created_by: Option<String>,
}

impl Movie {
    pub fn duration_in_hours(&self) -> f64 {
        self.duration / 60.0
    }

    /// JSON form returned to clients, including computed fields.
    pub fn to_document(&self) -> Value {
        let mut doc = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut doc {
            map.insert(
                "durationInHours".to_string(),
                serde_json::json!(self.duration_in_hours()),
            );
        }
        doc
    }
}

/// A validated movie ready to insert
#[derive(Debug, Clone)]
pub struct NewMovie {
    pub name: String,
    pub description: String,
    pub duration: f64,
    pub ratings: Option<f64>,
    pub total_ratings: Option<f64>,
    pub release_year: i64,
    pub release_date: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub genres: Vec<String>,
    pub directors: Vec<String>,
    pub cover_image: String,
    pub actors: Vec<String>,
    pub price: f64,
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct MoviePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration: Option<f64>,
    pub ratings: Option<f64>,
    pub total_ratings: Option<f64>,
    pub release_year: Option<i64>,
    pub release_date: Option<DateTime<Utc>>,
    pub genres: Option<Vec<String>>,
    pub directors: Option<Vec<String>>,
    pub cover_image: Option<String>,
    pub actors: Option<Vec<String>>,
    pub price: Option<f64>,
}

impl MoviePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.duration.is_none()
            && self.ratings.is_none()
            && self.total_ratings.is_none()
            && self.release_year.is_none()
            && self.release_date.is_none()
            && self.genres.is_none()
            && self.directors.is_none()
            && self.cover_image.is_none()
            && self.actors.is_none()
            && self.price.is_none()
    }
}

/// Request body for create and update. Unknown keys are ignored, and
/// `createdBy` is always stamped by the server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration: Option<f64>,
    pub ratings: Option<f64>,
    pub total_ratings: Option<f64>,
    pub release_year: Option<i64>,
    pub release_date: Option<String>,
    pub created_at: Option<String>,
    pub genres: Option<Vec<String>>,
    pub directors: Option<Vec<String>>,
    pub cover_image: Option<String>,
    pub actors: Option<Vec<String>>,
    pub price: Option<f64>,
}

impl MovieInput {
    /// Apply every create-time rule
    pub fn into_new_movie(self) -> Result<NewMovie, Vec<String>> {
        let mut errors = Vec::new();

        let name = required_text(self.name, "Name is required field!", &mut errors);
        if let Some(name) = &name {
            check_name_length(name, &mut errors);
        }
        let description =
            required_text(self.description, "Description is required field", &mut errors);
        let duration = required(self.duration, "Duration is required field!", &mut errors);
        if let Some(ratings) = self.ratings {
            check_ratings(ratings, &mut errors);
        }
        let release_year =
            required(self.release_year, "Release Year is required field!", &mut errors);
        let release_date = optional_date(self.release_date, "releaseDate", &mut errors);
        let created_at = optional_date(self.created_at, "createdAt", &mut errors);
        let genres = required_list(self.genres, "Genres is required field!", &mut errors);
        let directors = required_list(self.directors, "Directors is required field!", &mut errors);
        let cover_image =
            required_text(self.cover_image, "Cover Image is required field!", &mut errors);
        let actors = required_list(self.actors, "Actors is required field!", &mut errors);
        let price = required(self.price, "Price is required field!", &mut errors);

        match (
            name,
            description,
            duration,
            release_year,
            genres,
            directors,
            cover_image,
            actors,
            price,
        ) {
            (
                Some(name),
                Some(description),
                Some(duration),
                Some(release_year),
                Some(genres),
                Some(directors),
                Some(cover_image),
                Some(actors),
                Some(price),
            ) if errors.is_empty() => Ok(NewMovie {
                name,
                description,
                duration,
                ratings: self.ratings,
                total_ratings: self.total_ratings,
                release_year,
                release_date,
                created_at,
                genres,
                directors,
                cover_image,
                actors,
                price,
            }),
            _ => Err(errors),
        }
    }

    /// Apply the rules for the fields that are present
    pub fn into_patch(self) -> Result<MoviePatch, Vec<String>> {
        let mut errors = Vec::new();

        let name = self.name.map(|n| n.trim().to_string());
        match &name {
            Some(n) if n.is_empty() => errors.push("Name is required field!".to_string()),
            Some(n) => check_name_length(n, &mut errors),
            None => {}
        }

        let description = self.description.map(|d| d.trim().to_string());
        if description.as_deref() == Some("") {
            errors.push("Description is required field".to_string());
        }

        if let Some(ratings) = self.ratings {
            check_ratings(ratings, &mut errors);
        }

        let cover_image = self.cover_image.map(|c| c.trim().to_string());
        if cover_image.as_deref() == Some("") {
            errors.push("Cover Image is required field!".to_string());
        }

        for (list, message) in [
            (&self.genres, "Genres is required field!"),
            (&self.directors, "Directors is required field!"),
            (&self.actors, "Actors is required field!"),
        ] {
            if list.as_ref().is_some_and(|l| clean_list(l).is_empty()) {
                errors.push(message.to_string());
            }
        }

        let release_date = optional_date(self.release_date, "releaseDate", &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(MoviePatch {
            name,
            description,
            duration: self.duration,
            ratings: self.ratings,
            total_ratings: self.total_ratings,
            release_year: self.release_year,
            release_date,
            genres: self.genres.map(|l| clean_list(&l)),
            directors: self.directors.map(|l| clean_list(&l)),
            cover_image,
            actors: self.actors.map(|l| clean_list(&l)),
            price: self.price,
        })
    }
}

/// Yearly price/rating summary of well-rated movies
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearStats {
    #[serde(rename = "_id")]
    pub release_year: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub price_total: f64,
    pub movie_count: i64,
}

/// Movies sharing a genre
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreGroup {
    pub movie_count: i64,
    pub movies: Vec<String>,
    pub genre: String,
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn required<T>(value: Option<T>, message: &str, errors: &mut Vec<String>) -> Option<T> {
    if value.is_none() {
        errors.push(message.to_string());
    }
    value
}

fn required_text(value: Option<String>, message: &str, errors: &mut Vec<String>) -> Option<String> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    required(value, message, errors)
}

fn required_list(
    value: Option<Vec<String>>,
    message: &str,
    errors: &mut Vec<String>,
) -> Option<Vec<String>> {
    let value = value.map(|l| clean_list(&l)).filter(|l| !l.is_empty());
    required(value, message, errors)
}

fn optional_date(
    value: Option<String>,
    field: &str,
    errors: &mut Vec<String>,
) -> Option<DateTime<Utc>> {
    let raw = value?;
    let parsed = parse_date(&raw);
    if parsed.is_none() {
        errors.push(format!("Invalid {}: {}", field, raw));
    }
    parsed
}

fn clean_list(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn check_name_length(name: &str, errors: &mut Vec<String>) {
    let len = name.chars().count();
    if len > NAME_MAX_LEN {
        errors.push("Movie name must not have more than 100 characters".to_string());
    } else if len < NAME_MIN_LEN {
        errors.push("Movie name must have at least 4 characters".to_string());
    }
}

fn check_ratings(ratings: f64, errors: &mut Vec<String>) {
    if !(RATING_MIN..=RATING_MAX).contains(&ratings) {
        errors.push(format!(
            "The Ratings {} must be above or equal to 1 and below or equal to 10",
            ratings
        ));
    }
}
