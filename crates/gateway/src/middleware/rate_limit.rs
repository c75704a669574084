//! Rate limiting middleware using token bucket algorithm

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use classforge_common::config::RateLimitConfig;
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Create a new rate limiter from configuration; None when disabled
pub fn create_rate_limiter(config: &RateLimitConfig) -> Option<Arc<GlobalRateLimiter>> {
    if !config.enabled {
        return None;
    }

    let rps = NonZeroU32::new(config.requests_per_second.max(1))
        .expect("requests_per_second clamped to at least 1");
    let burst = NonZeroU32::new(config.burst.max(1)).expect("burst clamped to at least 1");

    let quota = Quota::per_second(rps).allow_burst(burst);

    Some(Arc::new(RateLimiter::direct(quota)))
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(ref limiter) = state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!("Rate limit exceeded");
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let config = RateLimitConfig {
            requests_per_second: 100,
            burst: 200,
            enabled: true,
        };
        let limiter = create_rate_limiter(&config).unwrap();
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn test_disabled_rate_limiter() {
        let config = RateLimitConfig {
            requests_per_second: 100,
            burst: 200,
            enabled: false,
        };
        assert!(create_rate_limiter(&config).is_none());
    }

    #[test]
    fn test_burst_exhaustion() {
        let config = RateLimitConfig {
            requests_per_second: 1,
            burst: 2,
            enabled: true,
        };
        let limiter = create_rate_limiter(&config).unwrap();
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
