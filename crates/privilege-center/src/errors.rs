use marketgate_core_types::GateError;
use thiserror::Error;

/// Failures reported by a privilege record store. "No rows" is not an error;
/// stores return an empty list for unknown principals.
#[derive(Clone, Debug, Error)]
pub enum StoreError {
    #[error("privilege store unavailable: {0}")]
    Unavailable(String),
    #[error("privilege store query failed: {0}")]
    Query(String),
}

#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("privilege store timed out after {0}ms")]
    StoreTimeout(u64),
    #[error("{count} active privilege records for principal {principal_id}")]
    AmbiguousRecord { principal_id: String, count: usize },
    #[error("invalid allowlist: {0}")]
    InvalidAllowlist(String),
    #[error("io error: {0}")]
    Io(String),
}

impl PrivilegeError {
    /// Store reachability problems, as opposed to data problems. Callers map
    /// these to a 5xx-equivalent and must not read them as "not privileged".
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            PrivilegeError::Store(_) | PrivilegeError::StoreTimeout(_)
        )
    }
}

impl From<PrivilegeError> for GateError {
    fn from(value: PrivilegeError) -> Self {
        GateError::new(value.to_string())
    }
}
