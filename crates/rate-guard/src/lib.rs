pub mod errors;
pub mod limiter;
pub mod store;

pub use errors::RateError;
pub use limiter::{FixedWindowLimiter, RateLimitResult};
#[cfg(feature = "shared-http")]
pub use store::HttpCounterStore;
pub use store::{CounterStore, SharedWindowLimiter};

use std::sync::Arc;

/// Front door over the two counter backends. The window math is identical;
/// only where the counters live differs.
pub enum RateGuard {
    /// Per-process counters. Limits reset on restart and are not shared
    /// across server processes.
    Memory(FixedWindowLimiter),
    /// Counters in an external shared store, coordinated across processes at
    /// the cost of a network round trip per check.
    Shared(SharedWindowLimiter),
}

impl RateGuard {
    pub fn memory() -> Self {
        Self::Memory(FixedWindowLimiter::new())
    }

    pub fn shared(store: Arc<dyn CounterStore>) -> Self {
        Self::Shared(SharedWindowLimiter::new(store))
    }

    /// Count this request against the identifier's current window and admit
    /// or reject it. Store failures surface as errors; they are never
    /// downgraded to "not limited".
    pub async fn check_and_consume(
        &self,
        identifier: &str,
        limit: u32,
        window_ms: u64,
    ) -> Result<RateLimitResult, RateError> {
        match self {
            RateGuard::Memory(limiter) => Ok(limiter.check_and_consume(identifier, limit, window_ms)),
            RateGuard::Shared(limiter) => limiter.check_and_consume(identifier, limit, window_ms).await,
        }
    }
}
