//! Middleware for observability and abuse protection.
//!
//! This module provides:
//! - Request logging with latency tracking
//! - Rate limiting per IP address
//! - Security response headers
//! - Request arrival timestamps

pub mod logging;
pub mod rate_limit;
pub mod request_time;
pub mod security;

pub use logging::request_logging;
pub use rate_limit::{rate_limit_middleware, RateLimitConfig, RateLimitLayer};
pub use request_time::{stamp_request_time, RequestedAt};
pub use security::with_security_headers;
