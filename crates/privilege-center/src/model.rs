use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use marketgate_core_types::AdminRole;

/// Privilege grant row read from the external record store. The gate only
/// ever reads these; creation and revocation happen out of band.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrivilegeRecord {
    pub principal_id: String,
    pub role: AdminRole,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PrivilegeRecord {
    pub fn active(principal_id: impl Into<String>, role: AdminRole) -> Self {
        let now = Utc::now();
        Self {
            principal_id: principal_id.into(),
            role,
            is_active: true,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn revoked(principal_id: impl Into<String>, role: AdminRole) -> Self {
        Self {
            is_active: false,
            ..Self::active(principal_id, role)
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Which resolution strategy produced a grant.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegeSource {
    Database,
    Metadata,
    Legacy,
    None,
}

/// Outcome of running the resolution chain for one principal.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrivilegeDecision {
    pub is_privileged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<AdminRole>,
    pub source: PrivilegeSource,
    /// Advisory hint that a fallback grant should be backfilled into the
    /// record store. Never acted on by the resolver itself.
    pub needs_migration: bool,
}

impl PrivilegeDecision {
    pub fn not_privileged() -> Self {
        Self {
            is_privileged: false,
            role: None,
            source: PrivilegeSource::None,
            needs_migration: false,
        }
    }

    pub fn granted(role: AdminRole, source: PrivilegeSource) -> Self {
        Self {
            is_privileged: true,
            role: Some(role),
            source,
            needs_migration: !matches!(source, PrivilegeSource::Database),
        }
    }
}
