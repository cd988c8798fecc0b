//! Monotonic clock abstraction

use std::time::Instant;

/// Monotonic time source, injected so cache expiry can be tested without sleeping
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock backed [`Clock`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
