//! Token-bucket download rate limiting.
//!
//! Rate and burst both equal the configured bytes/second; workers request as
//! many tokens as they just received, and the wait is cancellable.

use std::num::NonZeroU32;

use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::cancel::CancelToken;
use crate::error::DownError;

pub struct RateGate {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    clock: DefaultClock,
    burst: u32,
}

impl RateGate {
    /// `bytes_per_sec` must be positive; callers pass `None` upstream for
    /// unlimited transfers.
    pub fn new(bytes_per_sec: i64) -> RateGate {
        let rate = bytes_per_sec.clamp(1, u32::MAX as i64) as u32;
        let rate = NonZeroU32::new(rate).unwrap();
        let quota = Quota::per_second(rate).allow_burst(rate);
        let clock = DefaultClock::default();
        RateGate {
            limiter: RateLimiter::direct_with_clock(quota, &clock),
            clock,
            burst: rate.get(),
        }
    }

    /// Blocks until `n` bytes worth of tokens are available or the token
    /// fires. Requests larger than the burst are drawn in burst-sized slices.
    pub fn admit(&self, n: usize, token: &CancelToken) -> Result<(), DownError> {
        let mut remaining = n as u64;
        while remaining > 0 {
            let take = remaining.min(self.burst as u64) as u32;
            let take = NonZeroU32::new(take).unwrap();
            loop {
                match self.limiter.check_n(take) {
                    Ok(Ok(())) => break,
                    Ok(Err(not_until)) => {
                        let wait = not_until.wait_time_from(self.clock.now());
                        if token.sleep(wait) {
                            return Err(token.reason().unwrap_or(DownError::Cancelled));
                        }
                    }
                    // take never exceeds burst.
                    Err(_) => unreachable!("rate request above burst"),
                }
            }
            remaining -= u64::from(take.get());
        }
        Ok(())
    }
}
