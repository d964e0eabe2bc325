//! Movie API
//! Mission: CRUD and report endpoints for the movie collection
//!
//! Mounted under `/api/v1/movies`.

use crate::app::AppState;
use crate::auth::{models::UserRole, protect, restrict};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::middleware::RequestedAt;
use crate::movies::{Movie, MovieInput, MovieQuery};
use axum::{
    extract::{Path, Query, State},
    handler::Handler,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

const MOVIE_NOT_FOUND: &str = "Movie with that ID is not found!";

pub fn movie_routes(state: &AppState) -> Router<AppState> {
    let protected = from_fn_with_state(state.clone(), protect);
    let admin_only = from_fn_with_state(UserRole::Admin, restrict);

    Router::new()
        .route("/movie-stats", get(movie_stats))
        .route("/movies-by-genre/:genre", get(movies_by_genre))
        .route("/highest-rated", get(highest_rated))
        .route(
            "/",
            get(list_movies.layer(protected.clone())).post(create_movie),
        )
        .route(
            "/:id",
            get(get_movie.layer(protected.clone()))
                .patch(update_movie)
                .delete(delete_movie.layer(admin_only).layer(protected)),
        )
}

/// GET / - filtered, sorted, paginated listing (protected)
pub async fn list_movies(
    State(state): State<AppState>,
    requested_at: RequestedAt,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    let query = MovieQuery::from_pairs(&params).map_err(|e| ApiError::bad_request(e.to_string()))?;
    list_response(&state, &query, requested_at)
}

/// GET /highest-rated - top five by rating
pub async fn highest_rated(
    State(state): State<AppState>,
    requested_at: RequestedAt,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    let query = MovieQuery::from_pairs_with_preset(&params, &[("limit", "5"), ("sort", "-ratings")])
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    list_response(&state, &query, requested_at)
}

fn list_response(
    state: &AppState,
    query: &MovieQuery,
    requested_at: RequestedAt,
) -> ApiResult<Json<Value>> {
    let movies = state.movies.find(query)?;

    Ok(Json(json!({
        "status": "Success",
        "requestedAt": requested_at.to_iso(),
        "length": movies.len(),
        "data": { "movies": movies }
    })))
}

/// GET /:id (protected)
pub async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id)?;
    let movie = state
        .movies
        .get(&id)?
        .ok_or_else(|| ApiError::not_found(MOVIE_NOT_FOUND))?;

    Ok(movie_envelope(&movie))
}

/// POST /
pub async fn create_movie(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<MovieInput>,
) -> ApiResult<Response> {
    let new_movie = input.into_new_movie().map_err(ApiError::Validation)?;
    let movie = state.movies.create(&new_movie)?;

    Ok((StatusCode::CREATED, movie_envelope(&movie)).into_response())
}

/// PATCH /:id
pub async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<MovieInput>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id)?;
    let patch = input.into_patch().map_err(ApiError::Validation)?;
    let movie = state
        .movies
        .update(&id, &patch)?
        .ok_or_else(|| ApiError::not_found(MOVIE_NOT_FOUND))?;

    Ok(movie_envelope(&movie))
}

/// DELETE /:id (protected, admin only)
pub async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    if !state.movies.delete(&id)? {
        return Err(ApiError::not_found(MOVIE_NOT_FOUND));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /movie-stats
pub async fn movie_stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let stats = state.movies.stats()?;

    Ok(Json(json!({
        "status": "Success",
        "count": stats.len(),
        "data": { "stats": stats }
    })))
}

/// GET /movies-by-genre/:genre
pub async fn movies_by_genre(
    State(state): State<AppState>,
    Path(genre): Path<String>,
) -> ApiResult<Json<Value>> {
    let movies = state.movies.by_genre(&genre)?;

    Ok(Json(json!({
        "status": "Success",
        "count": movies.len(),
        "data": { "movies": movies }
    })))
}

fn movie_envelope(movie: &Movie) -> Json<Value> {
    Json(json!({
        "status": "Success",
        "data": { "movie": movie.to_document() }
    }))
}

// A malformed id can't match any movie
fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found(MOVIE_NOT_FOUND))
}
