//! Identity resolution contract.
//!
//! Session and credential verification belong to the managed backend; the
//! gate only needs "an authenticated principal or no principal" per request.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use marketgate_core_types::Principal;

/// Raw request credentials handed to the resolver.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub bearer_token: Option<String>,
    pub client_ip: Option<String>,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
            client_ip: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity verification failed: {0}")]
    Verification(String),
}

/// Turns inbound credentials into an authenticated principal.
///
/// `Ok(None)` is the valid "no principal" answer for missing or unknown
/// credentials; errors are reserved for verifier failures.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, credentials: &Credentials)
        -> Result<Option<Principal>, IdentityError>;
}

/// Static bearer-token table standing in for the session verifier in tests
/// and the demo server. Loaded once at startup, immutable afterwards.
#[derive(Default)]
pub struct StaticIdentityResolver {
    tokens: HashMap<String, Principal>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<Principal>, IdentityError> {
        Ok(credentials
            .bearer_token
            .as_deref()
            .and_then(|token| self.tokens.get(token))
            .cloned())
    }
}
