//! Request logging middleware.
//!
//! Logs every HTTP request with method, path, status code, and latency.

use axum::{extract::ConnectInfo, extract::Request, middleware::Next, response::Response};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{info, warn, Instrument};

/// Logs at INFO for completed requests, WARN for 5xx. `/health` is skipped.
pub async fn request_logging(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if path == "/health" {
        return next.run(request).await;
    }

    let client_ip = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());

    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        client_ip = %client_ip,
    );

    let start = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    span.in_scope(|| {
        if status >= 500 {
            warn!(status, latency_ms, "Request failed (5xx)");
        } else if status >= 400 {
            info!(status, latency_ms, "Request completed (4xx)");
        } else {
            info!(status, latency_ms, "Request completed");
        }
    });

    response
}
