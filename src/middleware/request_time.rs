//! Request timestamp
//!
//! Stamps each request with the time it arrived so handlers can echo it back.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::convert::Infallible;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedAt(pub DateTime<Utc>);

impl RequestedAt {
    /// ISO-8601 with millisecond precision
    pub fn to_iso(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

pub async fn stamp_request_time(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(RequestedAt(Utc::now()));
    next.run(request).await
}

/// Falls back to "now" when the stamping middleware isn't installed
#[async_trait]
impl<S> FromRequestParts<S> for RequestedAt
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestedAt>()
            .copied()
            .unwrap_or_else(|| RequestedAt(Utc::now())))
    }
}
