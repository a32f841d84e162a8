//! Request middleware: per-client rate limit and security headers

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

const REQUESTS_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(20) {
    Some(n) => n,
    None => panic!("requests per minute must be non-zero"),
};

const BURST: NonZeroU32 = match NonZeroU32::new(100) {
    Some(n) => n,
    None => panic!("burst must be non-zero"),
};

/// Key used when the peer address is unknown (e.g. in-process requests)
const UNKNOWN_CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Per-client rate limiter keyed by peer IP
pub type ClientRateLimiter = DefaultKeyedRateLimiter<IpAddr>;

/// 100 requests per 5 minutes: a burst of 100 refilling at 20 per minute
pub fn default_quota() -> Quota {
    Quota::per_minute(REQUESTS_PER_MINUTE).allow_burst(BURST)
}

pub fn rate_limiter(quota: Quota) -> ClientRateLimiter {
    RateLimiter::keyed(quota)
}

/// Reject requests over the client's quota with 429 `RATE_LIMITED`
pub async fn rate_limit(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let client = connect_info.map_or(UNKNOWN_CLIENT, |ConnectInfo(addr)| addr.ip());

    if state.rate_limiter.check_key(&client).is_err() {
        warn!(client = %client, path = %request.uri().path(), "Rate limit exceeded");
        return ApiError::RateLimited("Too many requests, please try again later".to_string())
            .into_response();
    }

    next.run(request).await
}

/// Add standard hardening headers unless a handler already set them
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    let defaults = [
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
        (header::REFERRER_POLICY, "no-referrer"),
        (header::X_DNS_PREFETCH_CONTROL, "off"),
        (HeaderName::from_static("x-download-options"), "noopen"),
    ];
    for (name, value) in defaults {
        headers
            .entry(name)
            .or_insert_with(|| HeaderValue::from_static(value));
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_quota_allows_burst_of_100() {
        let limiter = rate_limiter(default_quota());
        let client = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        for _ in 0..100 {
            assert!(limiter.check_key(&client).is_ok());
        }
        assert!(limiter.check_key(&client).is_err());
    }

    #[test]
    fn test_clients_have_separate_quotas() {
        let limiter = rate_limiter(Quota::per_hour(NonZeroU32::MIN));
        let noisy = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let quiet = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        assert!(limiter.check_key(&noisy).is_ok());
        assert!(limiter.check_key(&noisy).is_err());
        assert!(limiter.check_key(&quiet).is_ok());
    }
}
