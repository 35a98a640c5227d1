//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Max inbound match messages per second (paddle drags arrive at frame rate)
pub const INPUT_RATE_LIMIT: u32 = 120;

/// Max lobby messages per second (find_match, invites)
pub const LOBBY_RATE_LIMIT: u32 = 10;

/// Per-connection rate limiter state
#[derive(Clone)]
pub struct ConnectionRateLimiter {
    limiter: Arc<Limiter>,
}

impl ConnectionRateLimiter {
    /// Limiter for in-match traffic
    pub fn for_match() -> Self {
        Self {
            limiter: create_limiter(INPUT_RATE_LIMIT),
        }
    }

    /// Limiter for matchmaking and invite sockets
    pub fn for_lobby() -> Self {
        Self {
            limiter: create_limiter(LOBBY_RATE_LIMIT),
        }
    }

    /// Check if a message is allowed (returns true if allowed)
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lobby_limiter_rejects_burst() {
        let limiter = ConnectionRateLimiter::for_lobby();
        let allowed = (0..50).filter(|_| limiter.check()).count();
        assert!(allowed >= 1);
        assert!(allowed <= LOBBY_RATE_LIMIT as usize);
    }
}
