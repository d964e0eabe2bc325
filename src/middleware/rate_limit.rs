//! Rate limiting middleware.
//!
//! Fixed-window request counting per client IP, kept in memory.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Configuration for rate limiting.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window duration.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60 * 60),
        }
    }
}

/// Rate limiter state tracking requests per IP.
#[derive(Clone)]
pub struct RateLimitLayer {
    config: RateLimitConfig,
    state: Arc<Mutex<HashMap<IpAddr, RateLimitEntry>>>,
}

struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

#[derive(Debug, PartialEq, Eq)]
enum RateLimitResult {
    Allowed { remaining: u32 },
    Exceeded { retry_after: Duration },
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn check(&self, ip: IpAddr) -> RateLimitResult {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> RateLimitResult {
        let mut state = self.state.lock();

        let entry = state.entry(ip).or_insert(RateLimitEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.config.max_requests {
            let reset_at = entry.window_start + self.config.window;
            return RateLimitResult::Exceeded {
                retry_after: reset_at.saturating_duration_since(now),
            };
        }

        entry.count += 1;
        RateLimitResult::Allowed {
            remaining: self.config.max_requests - entry.count,
        }
    }

    /// Drop entries whose window has passed (call from a background task).
    pub fn cleanup(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        let window = self.config.window;
        let before = state.len();

        state.retain(|_, entry| now.duration_since(entry.window_start) < window);

        let removed = before - state.len();
        if removed > 0 {
            debug!(removed, tracked = state.len(), "Rate limit entries pruned");
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

/// Rate limiting middleware function.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimitLayer>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(connect_info.map(|ConnectInfo(addr)| addr), request.headers());

    match limiter.check(ip) {
        RateLimitResult::Allowed { remaining } => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert("X-RateLimit-Limit", HeaderValue::from(limiter.config.max_requests));
            response
                .headers_mut()
                .insert("X-RateLimit-Remaining", HeaderValue::from(remaining));
            response
        }
        RateLimitResult::Exceeded { retry_after } => {
            warn!(
                ip = %ip,
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );

            let body = serde_json::json!({
                "status": "fail",
                "message": "Too many requests from this IP, please try again in an hour!",
            });

            (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", retry_after.as_secs().to_string())],
                axum::Json(body),
            )
                .into_response()
        }
    }
}

/// Socket peer address, else the first `X-Forwarded-For` hop, else unspecified
fn client_ip(peer: Option<SocketAddr>, headers: &HeaderMap) -> IpAddr {
    if let Some(addr) = peer {
        return addr.ip();
    }

    headers
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32) -> RateLimitLayer {
        RateLimitLayer::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
        })
    }

    #[test]
    fn test_rate_limit_allows_under_limit() {
        let limiter = limiter(10);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for i in 0..10 {
            assert_eq!(limiter.check(ip), RateLimitResult::Allowed { remaining: 9 - i });
        }
        assert!(matches!(limiter.check(ip), RateLimitResult::Exceeded { .. }));
    }

    #[test]
    fn test_window_resets() {
        let limiter = limiter(1);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let start = Instant::now();

        assert!(matches!(limiter.check_at(ip, start), RateLimitResult::Allowed { .. }));
        assert!(matches!(
            limiter.check_at(ip, start + Duration::from_secs(30)),
            RateLimitResult::Exceeded { .. }
        ));
        assert!(matches!(
            limiter.check_at(ip, start + Duration::from_secs(61)),
            RateLimitResult::Allowed { .. }
        ));
    }

    #[test]
    fn test_ips_are_independent() {
        let limiter = limiter(1);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(matches!(limiter.check(a), RateLimitResult::Allowed { .. }));
        assert!(matches!(limiter.check(b), RateLimitResult::Allowed { .. }));
        assert!(matches!(limiter.check(a), RateLimitResult::Exceeded { .. }));
    }

    #[test]
    fn test_client_ip_fallbacks() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(None, &headers), IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        headers.insert("X-Forwarded-For", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(None, &headers), "203.0.113.7".parse::<IpAddr>().unwrap());

        let peer: SocketAddr = "192.0.2.1:4000".parse().unwrap();
        assert_eq!(client_ip(Some(peer), &headers), peer.ip());
    }
}
