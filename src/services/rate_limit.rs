// src/services/rate_limit.rs
// DOCUMENTATION: Per-client throttling for public forms
// PURPOSE: Keep submission, claim and upload endpoints from being flooded

use crate::errors::FarmError;
use actix_web::HttpRequest;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;

/// Keyed limiter, one bucket per client address
pub struct FormRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl FormRateLimiter {
    /// `per_hour` requests per client per hour, all of them usable in a burst
    pub fn per_hour(per_hour: u32) -> Self {
        let rate = NonZeroU32::new(per_hour).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_hour(rate).allow_burst(rate);

        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    pub fn check(&self, client_key: &str) -> Result<(), FarmError> {
        self.limiter.check_key(&client_key.to_string()).map_err(|_| {
            log::warn!("Form rate limit exceeded for {}", client_key);
            FarmError::RateLimitExceeded
        })
    }

    /// Check using the caller's address
    pub fn check_request(&self, req: &HttpRequest) -> Result<(), FarmError> {
        self.check(&client_key(req))
    }

    /// Drop buckets that are full again
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

/// Client address, honouring X-Forwarded-For behind the proxy
pub fn client_key(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .map(|addr| match addr.parse::<std::net::SocketAddr>() {
            Ok(socket) => socket.ip().to_string(),
            Err(_) => addr.to_string(),
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_burst_then_reject() {
        let limiter = FormRateLimiter::per_hour(3);
        for _ in 0..3 {
            assert!(limiter.check("203.0.113.7").is_ok());
        }
        assert!(matches!(
            limiter.check("203.0.113.7"),
            Err(FarmError::RateLimitExceeded)
        ));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = FormRateLimiter::per_hour(1);
        assert!(limiter.check("198.51.100.1").is_ok());
        assert!(limiter.check("198.51.100.1").is_err());
        assert!(limiter.check("198.51.100.2").is_ok());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_client_key_prefers_forwarded_header() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "192.0.2.10"))
            .to_http_request();
        assert_eq!(client_key(&req), "192.0.2.10");
    }
}
