use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, warn};

use marketgate_core_types::{AdminRole, Principal};

use crate::allowlist::LegacyAllowlist;
use crate::errors::PrivilegeError;
use crate::model::{PrivilegeDecision, PrivilegeSource};
use crate::store::PrivilegeStore;

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(250);

/// Typed outcome of one resolution strategy. `Revoked` stops the chain: an
/// explicit inactive record must not be overridden by a later fallback.
#[derive(Clone, Debug, PartialEq, Eq)]
enum StrategyOutcome {
    Granted {
        role: AdminRole,
        source: PrivilegeSource,
    },
    Revoked,
    NotFound,
}

#[async_trait]
trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn resolve(&self, principal: &Principal) -> Result<StrategyOutcome, PrivilegeError>;
}

/// Authoritative strategy: the privilege record store, queried under a
/// timeout. A store error or timeout propagates; it never falls through to
/// the later strategies, so an unreachable store cannot silently widen
/// access via the allowlist.
struct DatabaseStrategy {
    store: Arc<dyn PrivilegeStore>,
    store_timeout: Duration,
}

#[async_trait]
impl ResolutionStrategy for DatabaseStrategy {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn resolve(&self, principal: &Principal) -> Result<StrategyOutcome, PrivilegeError> {
        let records = match timeout(
            self.store_timeout,
            self.store.find_privileges(&principal.id),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(PrivilegeError::StoreTimeout(
                    self.store_timeout.as_millis() as u64
                ))
            }
        };

        let active: Vec<_> = records.iter().filter(|record| record.is_active).collect();
        match active.as_slice() {
            [record] => Ok(StrategyOutcome::Granted {
                role: record.role,
                source: PrivilegeSource::Database,
            }),
            [] if records.is_empty() => Ok(StrategyOutcome::NotFound),
            [] => Ok(StrategyOutcome::Revoked),
            many => Err(PrivilegeError::AmbiguousRecord {
                principal_id: principal.id.clone(),
                count: many.len(),
            }),
        }
    }
}

/// Session-metadata fallback: a `role = admin` claim stamped by the auth
/// provider before the record store existed.
struct MetadataStrategy;

#[async_trait]
impl ResolutionStrategy for MetadataStrategy {
    fn name(&self) -> &'static str {
        "metadata"
    }

    async fn resolve(&self, principal: &Principal) -> Result<StrategyOutcome, PrivilegeError> {
        if principal.claim("role") == Some("admin") {
            Ok(StrategyOutcome::Granted {
                role: AdminRole::Admin,
                source: PrivilegeSource::Metadata,
            })
        } else {
            Ok(StrategyOutcome::NotFound)
        }
    }
}

/// Last resort: the static bootstrap allowlist of display identifiers.
struct LegacyAllowlistStrategy {
    allowlist: Arc<LegacyAllowlist>,
}

#[async_trait]
impl ResolutionStrategy for LegacyAllowlistStrategy {
    fn name(&self) -> &'static str {
        "legacy_allowlist"
    }

    async fn resolve(&self, principal: &Principal) -> Result<StrategyOutcome, PrivilegeError> {
        let allowlisted = principal
            .email
            .as_deref()
            .map(|email| self.allowlist.contains(email))
            .unwrap_or(false);
        if allowlisted {
            Ok(StrategyOutcome::Granted {
                role: AdminRole::Admin,
                source: PrivilegeSource::Legacy,
            })
        } else {
            Ok(StrategyOutcome::NotFound)
        }
    }
}

/// Ordered resolution chain: record store, then session metadata, then the
/// legacy allowlist. Read-only; the migration hint on fallback grants is
/// advisory and never applied here.
pub struct PrivilegeResolver {
    strategies: Vec<Box<dyn ResolutionStrategy>>,
}

impl PrivilegeResolver {
    pub fn new(store: Arc<dyn PrivilegeStore>, allowlist: Arc<LegacyAllowlist>) -> Self {
        Self::with_store_timeout(store, allowlist, DEFAULT_STORE_TIMEOUT)
    }

    pub fn with_store_timeout(
        store: Arc<dyn PrivilegeStore>,
        allowlist: Arc<LegacyAllowlist>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            strategies: vec![
                Box::new(DatabaseStrategy {
                    store,
                    store_timeout,
                }),
                Box::new(MetadataStrategy),
                Box::new(LegacyAllowlistStrategy { allowlist }),
            ],
        }
    }

    /// Resolve the privilege decision for an optional principal.
    ///
    /// A missing or unauthenticated principal is a terminal "not privileged"
    /// answer, not an error; callers serving privileged endpoints translate
    /// it into an authentication-required response.
    pub async fn resolve(
        &self,
        principal: Option<&Principal>,
    ) -> Result<PrivilegeDecision, PrivilegeError> {
        let Some(principal) = principal.filter(|principal| principal.authenticated) else {
            return Ok(PrivilegeDecision::not_privileged());
        };

        for strategy in &self.strategies {
            match strategy.resolve(principal).await? {
                StrategyOutcome::Granted { role, source } => {
                    let decision = PrivilegeDecision::granted(role, source);
                    if decision.needs_migration {
                        warn!(
                            principal = %principal.id,
                            strategy = strategy.name(),
                            %role,
                            "privilege granted via fallback; backfill a privilege record"
                        );
                    } else {
                        debug!(principal = %principal.id, %role, "privilege resolved from record store");
                    }
                    return Ok(decision);
                }
                StrategyOutcome::Revoked => {
                    warn!(
                        principal = %principal.id,
                        strategy = strategy.name(),
                        "privilege explicitly revoked; skipping remaining strategies"
                    );
                    return Ok(PrivilegeDecision::not_privileged());
                }
                StrategyOutcome::NotFound => continue,
            }
        }

        Ok(PrivilegeDecision::not_privileged())
    }
}
