//! MarketGate library
//!
//! Request-scoped authorization resolution and rate limiting for the
//! marketplace backend. The gate has no protocol of its own; request
//! handlers consume it through [`server::GateState`] or the re-exported
//! component APIs.

pub mod config;
pub mod errors;
pub mod identity;
pub mod server;

// Re-export commonly used types for external use
pub use marketgate_core_types::{AdminRole, GateError, Principal, RequestId};
pub use marketgate_privilege_center::{
    load_allowlist, InMemoryPrivilegeStore, LegacyAllowlist, PrivilegeDecision, PrivilegeError,
    PrivilegeRecord, PrivilegeResolver, PrivilegeSource, PrivilegeStore,
};
pub use marketgate_rate_guard::{CounterStore, RateError, RateGuard, RateLimitResult};
