use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::RateError;
use crate::limiter::{epoch_ms_now, window_result, RateLimitResult};

/// External counter store shared by every server process. `incr_and_get`
/// must be atomic on the store side and is expected to expire the key once
/// its window has passed.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn incr_and_get(&self, key: &str, window_ms: u64) -> Result<u64, RateError>;
}

/// Fixed-window limiter over a shared [`CounterStore`]. Same admission math
/// as the in-process limiter; the store owns counter lifetime.
pub struct SharedWindowLimiter {
    store: Arc<dyn CounterStore>,
}

impl SharedWindowLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    pub async fn check_and_consume(
        &self,
        identifier: &str,
        limit: u32,
        window_ms: u64,
    ) -> Result<RateLimitResult, RateError> {
        self.check_and_consume_at(identifier, limit, window_ms, epoch_ms_now())
            .await
    }

    pub(crate) async fn check_and_consume_at(
        &self,
        identifier: &str,
        limit: u32,
        window_ms: u64,
        now_ms: u64,
    ) -> Result<RateLimitResult, RateError> {
        let window_ms = window_ms.max(1);
        let window_start = now_ms / window_ms * window_ms;
        let window_end = window_start + window_ms;
        let key = format!("{identifier}:{window_start}");

        let count = self.store.incr_and_get(&key, window_ms).await?;
        Ok(window_result(count, limit, window_end, now_ms))
    }
}

/// REST counter client in the Upstash style: `POST /incr/<key>` returns the
/// post-increment count, `POST /expire/<key>/<secs>` bounds the key's
/// lifetime on first increment.
#[cfg(feature = "shared-http")]
pub struct HttpCounterStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[cfg(feature = "shared-http")]
impl HttpCounterStore {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

#[cfg(feature = "shared-http")]
#[async_trait]
impl CounterStore for HttpCounterStore {
    async fn incr_and_get(&self, key: &str, window_ms: u64) -> Result<u64, RateError> {
        #[derive(serde::Deserialize)]
        struct CommandReply {
            result: u64,
        }

        let response = self
            .client
            .post(format!("{}/incr/{key}", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| RateError::Store(err.to_string()))?;
        if !response.status().is_success() {
            return Err(RateError::Store(format!(
                "incr returned {}",
                response.status()
            )));
        }
        let reply: CommandReply = response
            .json()
            .await
            .map_err(|err| RateError::InvalidCount(err.to_string()))?;

        if reply.result == 1 {
            let ttl_secs = ((window_ms + 999) / 1000).max(1);
            let response = self
                .client
                .post(format!("{}/expire/{key}/{ttl_secs}", self.base_url))
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|err| RateError::Store(err.to_string()))?;
            if !response.status().is_success() {
                return Err(RateError::Store(format!(
                    "expire returned {}",
                    response.status()
                )));
            }
        }

        Ok(reply.result)
    }
}
