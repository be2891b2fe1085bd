//! Per-identity windowed request counters (spec §4.5, §9).
//!
//! Intentionally in-memory and process-local: a multi-instance deployment
//! either accepts per-instance limits or externalizes the counter to a
//! shared store. We don't do the latter here. `governor`'s keyed limiter
//! (backed by `dashmap`) gives each identity — client IP for submit/status,
//! runner id for runner endpoints — its own independent quota without a
//! global lock.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota};

use crate::config::RateLimits;

/// One keyed limiter per role. Admin is intentionally unbounded (spec §4.5)
/// and so has no entry here.
pub struct RoleLimiters {
    submit: DefaultKeyedRateLimiter<String>,
    status: DefaultKeyedRateLimiter<String>,
    runner: DefaultKeyedRateLimiter<String>,
    clock: DefaultClock,
}

fn quota_per_minute(n: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(n.max(1)).expect("max(1) is never zero"))
}

impl RoleLimiters {
    pub fn new(limits: &RateLimits) -> Self {
        RoleLimiters {
            submit: DefaultKeyedRateLimiter::keyed(quota_per_minute(limits.submit_per_minute)),
            status: DefaultKeyedRateLimiter::keyed(quota_per_minute(limits.status_per_minute)),
            runner: DefaultKeyedRateLimiter::keyed(quota_per_minute(limits.runner_per_minute)),
            clock: DefaultClock::default(),
        }
    }

    /// Seconds until the given keyed limiter's window resets, or `None` if
    /// the request is allowed.
    fn check(&self, limiter: &DefaultKeyedRateLimiter<String>, identity: &str) -> Option<u64> {
        match limiter.check_key(&identity.to_string()) {
            Ok(()) => None,
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                Some(ceil_secs(wait))
            }
        }
    }

    pub fn check_submit(&self, client_ip: &str) -> Option<u64> {
        self.check(&self.submit, client_ip)
    }

    pub fn check_status(&self, client_ip: &str) -> Option<u64> {
        self.check(&self.status, client_ip)
    }

    pub fn check_runner(&self, runner_id: &str) -> Option<u64> {
        self.check(&self.runner, runner_id)
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(n: u32) -> RateLimits {
        RateLimits {
            submit_per_minute: n,
            status_per_minute: n,
            runner_per_minute: n,
        }
    }

    #[test]
    fn allows_up_to_quota_then_limits() {
        let limiters = RoleLimiters::new(&limits(2));
        assert!(limiters.check_submit("1.2.3.4").is_none());
        assert!(limiters.check_submit("1.2.3.4").is_none());
        assert!(limiters.check_submit("1.2.3.4").is_some());
    }

    #[test]
    fn identities_are_independent() {
        let limiters = RoleLimiters::new(&limits(1));
        assert!(limiters.check_runner("runner-a").is_none());
        assert!(limiters.check_runner("runner-b").is_none());
        assert!(limiters.check_runner("runner-a").is_some());
    }

    #[test]
    fn roles_are_independent() {
        let limiters = RoleLimiters::new(&limits(1));
        assert!(limiters.check_submit("same-key").is_none());
        assert!(limiters.check_status("same-key").is_none());
    }
}
