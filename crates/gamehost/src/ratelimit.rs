//! Per-IP limit on new session creation
//!
//! Uses governor's keyed rate limiter: one bucket per source address,
//! created on first use. Only brand-new sessions are counted; resuming an
//! existing session by token never is.

use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::ConnectError;

/// Default new sessions per minute per address
pub const DEFAULT_CONNECT_RATE: NonZeroU32 = nonzero!(20u32);

type KeyedLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

#[derive(Clone)]
pub struct ConnectLimiter {
    /// None when limiting is switched off
    limiter: Option<Arc<KeyedLimiter>>,
}

impl ConnectLimiter {
    /// `per_minute == 0` disables limiting
    pub fn new(per_minute: u32) -> Self {
        let limiter = NonZeroU32::new(per_minute)
            .map(|rate| Arc::new(RateLimiter::keyed(Quota::per_minute(rate))));
        Self { limiter }
    }

    pub fn unlimited() -> Self {
        Self { limiter: None }
    }

    /// Count one new session from `ip`
    pub fn check(&self, ip: IpAddr) -> Result<(), ConnectError> {
        match &self.limiter {
            Some(limiter) => limiter
                .check_key(&ip)
                .map_err(|_| ConnectError::RateLimited(ip)),
            None => Ok(()),
        }
    }
}

impl Default for ConnectLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_RATE.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn test_ip_v4() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))
    }

    fn test_ip_v6() -> IpAddr {
        IpAddr::V6(Ipv6Addr::LOCALHOST)
    }

    #[test]
    fn test_under_limit() {
        let limiter = ConnectLimiter::new(5);
        for _ in 0..5 {
            assert!(limiter.check(test_ip_v4()).is_ok());
        }
    }

    #[test]
    fn test_limit_exceeded() {
        let limiter = ConnectLimiter::new(2);
        let _ = limiter.check(test_ip_v4());
        let _ = limiter.check(test_ip_v4());
        assert!(matches!(
            limiter.check(test_ip_v4()),
            Err(ConnectError::RateLimited(_))
        ));
    }

    #[test]
    fn test_addresses_tracked_separately() {
        let limiter = ConnectLimiter::new(1);
        assert!(limiter.check(test_ip_v4()).is_ok());
        assert!(limiter.check(test_ip_v6()).is_ok());
        assert!(limiter.check(test_ip_v4()).is_err());
    }

    #[test]
    fn test_zero_disables() {
        let limiter = ConnectLimiter::new(0);
        for _ in 0..100 {
            assert!(limiter.check(test_ip_v4()).is_ok());
        }
        assert!(ConnectLimiter::unlimited().check(test_ip_v6()).is_ok());
    }

    #[test]
    fn test_clones_share_buckets() {
        let a = ConnectLimiter::new(1);
        let b = a.clone();
        assert!(a.check(test_ip_v4()).is_ok());
        assert!(b.check(test_ip_v4()).is_err());
    }
}
