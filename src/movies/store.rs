//! Movie Storage
//! Mission: Persist the movie collection in SQLite and answer list/report queries
//!
//! Only released movies exist as far as callers are concerned: every read,
//! update, delete and report filters on `release_date <= now`. Bulk
//! maintenance (`count`, `delete_all`, `import`) sees the whole table.

use crate::error::unique_violation;
use crate::movies::models::{GenreGroup, Movie, MoviePatch, NewMovie, YearStats};
use crate::movies::query::MovieQuery;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_CREATOR: &str = "Thee";

const STATS_MIN_RATING: f64 = 4.5;
const STATS_MAX_PRICE: f64 = 60.0;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS movies (
    id TEXT PRIMARY KEY,
    name TEXT UNIQUE NOT NULL,
    description TEXT NOT NULL,
    duration REAL NOT NULL,
    ratings REAL,
    total_ratings REAL,
    release_year INTEGER NOT NULL,
    release_date INTEGER,
    created_at INTEGER NOT NULL,
    genres TEXT NOT NULL DEFAULT '[]',
    directors TEXT NOT NULL DEFAULT '[]',
    cover_image TEXT NOT NULL,
    actors TEXT NOT NULL DEFAULT '[]',
    price REAL NOT NULL,
    created_by TEXT
);

CREATE INDEX IF NOT EXISTS idx_movies_release_date ON movies(release_date);
CREATE INDEX IF NOT EXISTS idx_movies_created_at ON movies(created_at DESC);
"#;

const MOVIE_COLUMNS: &str = "movies.id, movies.name, movies.description, movies.duration,
     movies.ratings, movies.total_ratings, movies.release_year, movies.release_date,
     movies.created_at, movies.genres, movies.directors, movies.cover_image,
     movies.actors, movies.price, movies.created_by";

/// Released-only predicate; binds one parameter (now, unix millis)
const VISIBLE: &str = "movies.release_date IS NOT NULL AND movies.release_date <= ?";

/// Movie storage with SQLite backend
pub struct MovieStore {
    conn: Arc<Mutex<Connection>>,
    creator: String,
}

impl MovieStore {
    /// Open (or create) the movie database
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open movie database at {}", db_path))?;
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize movie schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            creator: DEFAULT_CREATOR.to_string(),
        })
    }

    /// Name stamped into `created_by` on every insert
    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = creator.into();
        self
    }

    pub fn create(&self, new_movie: &NewMovie) -> Result<Movie> {
        let movie = self.build_movie(new_movie);

        {
            let conn = self.conn.lock();
            insert_movie(&conn, &movie)?;
        }

        info!(
            movie_id = %movie.id,
            "🎬 A new movie document with name {} has been created by {}",
            movie.name,
            movie.created_by.as_deref().unwrap_or_default()
        );

        Ok(movie)
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<Movie>> {
        let started = Instant::now();
        let conn = self.conn.lock();
        let movie = conn
            .query_row(
                &format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE movies.id = ? AND {VISIBLE}"),
                params![id.to_string(), now_millis()],
                row_to_movie,
            )
            .optional()
            .context("Failed to load movie")?;

        debug!(
            "Query took {} milliseconds to fetch the documents",
            started.elapsed().as_millis()
        );
        Ok(movie)
    }

    /// Apply a partial update to a released movie
    pub fn update(&self, id: &Uuid, patch: &MoviePatch) -> Result<Option<Movie>> {
        if patch.is_empty() {
            return self.get(id);
        }

        let (assignments, mut values) = patch_assignments(patch)?;
        values.push(SqlValue::Text(id.to_string()));
        values.push(SqlValue::Integer(now_millis()));

        let rows = {
            let conn = self.conn.lock();
            conn.execute(
                &format!(
                    "UPDATE movies SET {} WHERE movies.id = ? AND {VISIBLE}",
                    assignments.join(", ")
                ),
                params_from_iter(values),
            )
            .map_err(|e| unique_violation(e, "name", patch.name.as_deref().unwrap_or_default()))?
        };

        if rows == 0 {
            return Ok(None);
        }

        debug!(movie_id = %id, "Movie updated");
        // The patch may have moved the release date out of the visible window
        self.load(id)
    }

    fn load(&self, id: &Uuid) -> Result<Option<Movie>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE movies.id = ?"),
            params![id.to_string()],
            row_to_movie,
        )
        .optional()
        .context("Failed to load movie")
    }

    pub fn delete(&self, id: &Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                &format!("DELETE FROM movies WHERE movies.id = ? AND {VISIBLE}"),
                params![id.to_string(), now_millis()],
            )
            .context("Failed to delete movie")?;

        if rows > 0 {
            info!(movie_id = %id, "🗑️  Movie deleted");
        }
        Ok(rows > 0)
    }

    /// Filtered, sorted, projected and paginated listing
    pub fn find(&self, query: &MovieQuery) -> Result<Vec<Value>> {
        let started = Instant::now();
        let sql = query.to_sql();

        let mut values = Vec::with_capacity(sql.params.len() + 3);
        values.push(SqlValue::Integer(now_millis()));
        values.extend(sql.params);
        values.push(SqlValue::Integer(i64::from(query.limit)));
        values.push(SqlValue::Integer(
            i64::try_from(query.skip()).unwrap_or(i64::MAX),
        ));

        let movies = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {MOVIE_COLUMNS} FROM movies
                     WHERE {VISIBLE}{}
                     ORDER BY {}
                     LIMIT ? OFFSET ?",
                    sql.where_sql, sql.order_sql
                ))
                .context("Failed to prepare movie query")?;

            let rows = stmt
                .query_map(params_from_iter(values), row_to_movie)?
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read movies")?;
            rows
        };

        debug!(
            results = movies.len(),
            "Query took {} milliseconds to fetch the documents",
            started.elapsed().as_millis()
        );

        Ok(movies
            .iter()
            .map(|m| query.project(m.to_document()))
            .collect())
    }

    /// Per-year price and rating summary for well-rated movies
    pub fn stats(&self) -> Result<Vec<YearStats>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT movies.release_year,
                    AVG(movies.ratings), AVG(movies.price),
                    MIN(movies.price), MAX(movies.price),
                    SUM(movies.price), COUNT(*)
             FROM movies
             WHERE {VISIBLE} AND movies.ratings >= ?
             GROUP BY movies.release_year
             HAVING MAX(movies.price) <= ?
             ORDER BY MIN(movies.price) ASC, movies.release_year ASC"
        ))?;

        let stats = stmt
            .query_map(
                params![now_millis(), STATS_MIN_RATING, STATS_MAX_PRICE],
                |row| {
                    Ok(YearStats {
                        release_year: row.get(0)?,
                        avg_rating: row.get(1)?,
                        avg_price: row.get(2)?,
                        min_price: row.get(3)?,
                        max_price: row.get(4)?,
                        price_total: row.get(5)?,
                        movie_count: row.get(6)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to compute movie stats")?;

        Ok(stats)
    }

    /// Movies listing the given genre, grouped by genre
    pub fn by_genre(&self, genre: &str) -> Result<Vec<GenreGroup>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT g.value, COUNT(*), json_group_array(movies.name)
             FROM movies, json_each(movies.genres) AS g
             WHERE {VISIBLE} AND g.value = ?
             GROUP BY g.value
             ORDER BY COUNT(*) DESC"
        ))?;

        let groups = stmt
            .query_map(params![now_millis(), genre], |row| {
                let names: String = row.get(2)?;
                Ok(GenreGroup {
                    genre: row.get(0)?,
                    movie_count: row.get(1)?,
                    movies: parse_list(2, &names)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to group movies by genre")?;

        Ok(groups)
    }

    /// Number of stored movies, released or not
    pub fn count(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM movies", [], |row| row.get(0))
            .context("Failed to count movies")
    }

    pub fn delete_all(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM movies", [])
            .context("Failed to delete movies")?;
        info!(deleted = rows, "🗑️  Movie collection cleared");
        Ok(rows)
    }

    /// Insert a batch atomically; a duplicate name aborts the whole batch
    pub fn import(&self, movies: &[NewMovie]) -> Result<usize> {
        let built: Vec<Movie> = movies.iter().map(|m| self.build_movie(m)).collect();

        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("Failed to start import")?;
        for movie in &built {
            insert_movie(&tx, movie)?;
        }
        tx.commit().context("Failed to commit import")?;

        info!(imported = built.len(), "✅ Movies imported");
        Ok(built.len())
    }

    fn build_movie(&self, new_movie: &NewMovie) -> Movie {
        Movie {
            id: Uuid::new_v4(),
            name: new_movie.name.clone(),
            description: new_movie.description.clone(),
            duration: new_movie.duration,
            ratings: new_movie.ratings,
            total_ratings: new_movie.total_ratings,
            release_year: new_movie.release_year,
            release_date: new_movie.release_date,
            created_at: new_movie.created_at.unwrap_or_else(Utc::now),
            genres: new_movie.genres.clone(),
            directors: new_movie.directors.clone(),
            cover_image: new_movie.cover_image.clone(),
            actors: new_movie.actors.clone(),
            price: new_movie.price,
            created_by: Some(self.creator.clone()),
        }
    }
}

fn insert_movie(conn: &Connection, movie: &Movie) -> Result<()> {
    conn.execute(
        "INSERT INTO movies (id, name, description, duration, ratings, total_ratings,
             release_year, release_date, created_at, genres, directors, cover_image,
             actors, price, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            movie.id.to_string(),
            movie.name,
            movie.description,
            movie.duration,
            movie.ratings,
            movie.total_ratings,
            movie.release_year,
            movie.release_date.map(|d| d.timestamp_millis()),
            movie.created_at.timestamp_millis(),
            serde_json::to_string(&movie.genres)?,
            serde_json::to_string(&movie.directors)?,
            movie.cover_image,
            serde_json::to_string(&movie.actors)?,
            movie.price,
            movie.created_by,
        ],
    )
    .map_err(|e| unique_violation(e, "name", &movie.name))?;
    Ok(())
}

fn patch_assignments(patch: &MoviePatch) -> Result<(Vec<&'static str>, Vec<SqlValue>)> {
    let mut assignments = Vec::new();
    let mut values = Vec::new();

    let mut set = |column: &'static str, value: SqlValue| {
        assignments.push(column);
        values.push(value);
    };

    if let Some(name) = &patch.name {
        set("name = ?", SqlValue::Text(name.clone()));
    }
    if let Some(description) = &patch.description {
        set("description = ?", SqlValue::Text(description.clone()));
    }
    if let Some(duration) = patch.duration {
        set("duration = ?", SqlValue::Real(duration));
    }
    if let Some(ratings) = patch.ratings {
        set("ratings = ?", SqlValue::Real(ratings));
    }
    if let Some(total) = patch.total_ratings {
        set("total_ratings = ?", SqlValue::Real(total));
    }
    if let Some(year) = patch.release_year {
        set("release_year = ?", SqlValue::Integer(year));
    }
    if let Some(date) = patch.release_date {
        set("release_date = ?", SqlValue::Integer(date.timestamp_millis()));
    }
    if let Some(genres) = &patch.genres {
        set("genres = ?", SqlValue::Text(serde_json::to_string(genres)?));
    }
    if let Some(directors) = &patch.directors {
        set("directors = ?", SqlValue::Text(serde_json::to_string(directors)?));
    }
    if let Some(cover) = &patch.cover_image {
        set("cover_image = ?", SqlValue::Text(cover.clone()));
    }
    if let Some(actors) = &patch.actors {
        set("actors = ?", SqlValue::Text(serde_json::to_string(actors)?));
    }
    if let Some(price) = patch.price {
        set("price = ?", SqlValue::Real(price));
    }

    Ok((assignments, values))
}

fn row_to_movie(row: &Row<'_>) -> rusqlite::Result<Movie> {
    let id: String = row.get(0)?;
    let genres: String = row.get(9)?;
    let directors: String = row.get(10)?;
    let actors: String = row.get(12)?;

    Ok(Movie {
        id: Uuid::parse_str(&id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        name: row.get(1)?,
        description: row.get(2)?,
        duration: row.get(3)?,
        ratings: row.get(4)?,
        total_ratings: row.get(5)?,
        release_year: row.get(6)?,
        release_date: millis_to_datetime(row.get(7)?),
        created_at: millis_to_datetime(row.get(8)?).unwrap_or_default(),
        genres: parse_list(9, &genres)?,
        directors: parse_list(10, &directors)?,
        cover_image: row.get(11)?,
        actors: parse_list(12, &actors)?,
        price: row.get(13)?,
        created_by: row.get(14)?,
    })
}

fn parse_list(column: usize, raw: &str) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn millis_to_datetime(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::from_timestamp_millis)
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
