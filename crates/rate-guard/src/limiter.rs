use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Outcome of counting one request against a window.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch millis at which the current window closes.
    pub reset_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

pub(crate) fn epoch_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

/// Shared window math for both backends: the count is post-increment.
pub(crate) fn window_result(count: u64, limit: u32, window_end: u64, now_ms: u64) -> RateLimitResult {
    if count > u64::from(limit) {
        let delta_ms = window_end.saturating_sub(now_ms);
        RateLimitResult {
            allowed: false,
            limit,
            remaining: 0,
            reset_at_ms: window_end,
            retry_after_secs: Some((delta_ms + 999) / 1000),
        }
    } else {
        RateLimitResult {
            allowed: true,
            limit,
            remaining: limit - count as u32,
            reset_at_ms: window_end,
            retry_after_secs: None,
        }
    }
}

struct WindowCounter {
    window_end: u64,
    count: u64,
}

/// Fixed-window counter map keyed by `identifier:window_start`.
///
/// Fixed windows admit the known burst-at-boundary artifact (up to twice the
/// limit across a window edge) in exchange for O(1) memory per identifier
/// and no coordination. The increment happens under the entry's exclusive
/// guard, so concurrent requests for one key cannot over-admit; closed
/// windows are swept after every check to keep the map bounded.
#[derive(Default)]
pub struct FixedWindowLimiter {
    counters: DashMap<String, WindowCounter>,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_and_consume(&self, identifier: &str, limit: u32, window_ms: u64) -> RateLimitResult {
        self.check_and_consume_at(identifier, limit, window_ms, epoch_ms_now())
    }

    pub(crate) fn check_and_consume_at(
        &self,
        identifier: &str,
        limit: u32,
        window_ms: u64,
        now_ms: u64,
    ) -> RateLimitResult {
        let window_ms = window_ms.max(1);
        let window_start = now_ms / window_ms * window_ms;
        let window_end = window_start + window_ms;
        let key = format!("{identifier}:{window_start}");

        let count = {
            let mut entry = self.counters.entry(key).or_insert(WindowCounter {
                window_end,
                count: 0,
            });
            entry.count += 1;
            entry.count
        };

        // The entry guard must be dropped before the sweep: retain locks
        // every shard, including the one the guard holds.
        self.purge_closed(now_ms);

        window_result(count, limit, window_end, now_ms)
    }

    fn purge_closed(&self, now_ms: u64) {
        let before = self.counters.len();
        self.counters
            .retain(|_, counter| counter.window_end > now_ms);
        let removed = before.saturating_sub(self.counters.len());
        if removed > 0 {
            trace!(removed, "purged closed rate windows");
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_windows(&self) -> usize {
        self.counters.len()
    }
}
