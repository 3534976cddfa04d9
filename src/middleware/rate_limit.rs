//! Per-client rate limiting using governor and `tower_governor`.
//!
//! - `api_rate_limiter`: every `/api` route, 1 token per second with a burst of 60
//! - `auth_rate_limiter`: admin login, 1 token every 6 seconds with a burst of 5

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::KeyExtractor, GovernorError, GovernorLayer};

/// Resolves the client address behind a reverse proxy: first hop of
/// `X-Forwarded-For`, then `X-Real-IP`, then the peer socket address.
#[derive(Clone, Copy, Debug)]
pub struct ProxyIpKeyExtractor;

impl KeyExtractor for ProxyIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let headers = req.headers();

        if let Some(ip) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return Ok(ip);
        }

        if let Some(ip) = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return Ok(ip);
        }

        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

pub type RateLimiterLayer = GovernorLayer<ProxyIpKeyExtractor, NoOpMiddleware<QuantaInstant>>;

/// Builds a limiter replenishing one token every `replenish_secs` seconds.
/// Returns `None` for a zero period or burst.
pub fn rate_limiter(replenish_secs: u64, burst_size: u32) -> Option<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ProxyIpKeyExtractor)
        .per_second(replenish_secs)
        .burst_size(burst_size)
        .finish()?;
    Some(GovernorLayer { config: Arc::new(config) })
}

pub fn api_rate_limiter() -> Option<RateLimiterLayer> { rate_limiter(1, 60) }

pub fn auth_rate_limiter() -> Option<RateLimiterLayer> { rate_limiter(6, 5) }

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/api/products");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let req = request(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1"), ("x-real-ip", "198.51.100.2")]);
        assert_eq!(ProxyIpKeyExtractor.extract(&req).unwrap(), "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_real_ip_fallback() {
        let req = request(&[("x-forwarded-for", "garbage"), ("x-real-ip", "198.51.100.2")]);
        assert_eq!(ProxyIpKeyExtractor.extract(&req).unwrap(), "198.51.100.2".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_connect_info_fallback() {
        let mut req = request(&[]);
        assert!(ProxyIpKeyExtractor.extract(&req).is_err());
        req.extensions_mut().insert(ConnectInfo("192.0.2.10:5555".parse::<SocketAddr>().unwrap()));
        assert_eq!(ProxyIpKeyExtractor.extract(&req).unwrap(), "192.0.2.10".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_limiter_configs_are_valid() {
        assert!(api_rate_limiter().is_some());
        assert!(auth_rate_limiter().is_some());
        assert!(rate_limiter(0, 5).is_none());
    }
}
