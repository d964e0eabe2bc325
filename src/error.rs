//! Centralized API error formatting
//! Mission: Every failure leaves the server as the same JSON envelope

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

/// Whether 5xx bodies carry the internal error chain (development only).
static EXPOSE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(true);

pub fn set_expose_internal_errors(expose: bool) {
    EXPOSE_INTERNAL_ERRORS.store(expose, Ordering::Relaxed);
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    PayloadTooLarge(String),
    Validation(Vec<String>),
    /// Placeholder routes that exist but have no behaviour yet
    NotDefined,
    /// A failure the client can't fix; the message is safe to show
    Unavailable(String),
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotDefined | ApiError::Unavailable(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::Unavailable(msg) => write!(f, "{}", msg),
            ApiError::Validation(msgs) => write!(f, "Invalid input data: {}", msgs.join(". ")),
            ApiError::NotDefined => write!(f, "This route is not yet defined"),
            ApiError::Internal(err) => write!(f, "{:#}", err),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<DuplicateKey>() {
            Ok(dup) => ApiError::Conflict(dup.to_string()),
            Err(err) => ApiError::Internal(err),
        }
    }
}

/// A write hit a UNIQUE constraint
#[derive(Debug, Clone)]
pub struct DuplicateKey {
    pub field: &'static str,
    pub value: String,
}

impl DuplicateKey {
    pub fn new(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}

impl fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "There is already a record with {} {:?}. Please use another {}!",
            self.field, self.value, self.field
        )
    }
}

impl std::error::Error for DuplicateKey {}

/// Turn a UNIQUE constraint failure into a [`DuplicateKey`] error.
pub fn unique_violation(err: rusqlite::Error, field: &'static str, value: &str) -> anyhow::Error {
    if let rusqlite::Error::SqliteFailure(code, _) = &err {
        if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
            return DuplicateKey::new(field, value).into();
        }
    }
    anyhow::Error::new(err).context(format!("Failed to write {}", field))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            ApiError::NotDefined => json!({
                "status": "Error",
                "message": self.to_string(),
            }),
            ApiError::Internal(err) => {
                error!(error = %format!("{:#}", err), "Unhandled internal error");
                if EXPOSE_INTERNAL_ERRORS.load(Ordering::Relaxed) {
                    json!({
                        "status": "error",
                        "message": "Something went wrong! Please try again later.",
                        "error": format!("{:#}", err),
                    })
                } else {
                    json!({
                        "status": "error",
                        "message": "Something went wrong! Please try again later.",
                    })
                }
            }
            ApiError::Unavailable(msg) => {
                error!(%msg, "Request failed");
                json!({ "status": "error", "message": msg })
            }
            _ => {
                debug!(status = status.as_u16(), message = %self, "Request rejected");
                json!({ "status": "fail", "message": self.to_string() })
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Fallback for unknown routes.
pub async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!(
        "The url with {} doesn't exists on the server",
        uri.path()
    ))
}

/// JSON body extractor whose rejections go through [`ApiError`].
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                Err(ApiError::PayloadTooLarge(rejection.body_text()))
            }
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_message_joins() {
        let err = ApiError::Validation(vec![
            "Name is required field!".to_string(),
            "Price is required field!".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid input data: Name is required field!. Price is required field!"
        );
    }

    #[test]
    fn test_duplicate_key_becomes_conflict() {
        let err: ApiError = anyhow::Error::new(DuplicateKey::new("name", "Inception")).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            err.to_string(),
            "There is already a record with name \"Inception\". Please use another name!"
        );

        let err: ApiError = anyhow::anyhow!("disk full").into();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[tokio::test]
    async fn test_client_errors_use_fail_envelope() {
        let response = ApiError::not_found("Movie with that ID is not found!").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "Movie with that ID is not found!");
    }

    #[tokio::test]
    async fn test_not_defined_envelope() {
        let response = ApiError::NotDefined.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["status"], "Error");
        assert_eq!(body["message"], "This route is not yet defined");
    }
}
