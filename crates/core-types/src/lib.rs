use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Shared error type stub for the MarketGate crates.
#[derive(Debug, Error, Clone)]
pub enum GateError {
    #[error("{message}")]
    Message { message: String },
}

impl GateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated caller identity, built per request from verified credentials
/// and discarded at the end of the request. Never persisted by the gate.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Opaque account identifier from the session verifier.
    pub id: String,
    /// Display identifier. Only consulted by the legacy allowlist match.
    #[serde(default)]
    pub email: Option<String>,
    pub authenticated: bool,
    /// Metadata claims carried by the verified session (user/app metadata).
    #[serde(default)]
    pub claims: HashMap<String, String>,
}

impl Principal {
    pub fn authenticated(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: Some(email.into()),
            authenticated: true,
            claims: HashMap::new(),
        }
    }

    /// A principal that failed (or skipped) credential verification.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_claim(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(key.into(), value.into());
        self
    }

    pub fn claim(&self, key: &str) -> Option<&str> {
        self.claims.get(key).map(String::as_str)
    }
}

/// Administrative roles, ordered from least to most privileged.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    Support,
    Moderator,
    Admin,
    SuperAdmin,
}

impl AdminRole {
    fn rank(self) -> u8 {
        match self {
            AdminRole::Support => 1,
            AdminRole::Moderator => 2,
            AdminRole::Admin => 3,
            AdminRole::SuperAdmin => 4,
        }
    }

    /// Role hierarchy check: a higher role satisfies every lower requirement.
    pub fn has_role(self, required: AdminRole) -> bool {
        self.rank() >= required.rank()
    }

    pub fn can_manage_users(self) -> bool {
        self.has_role(AdminRole::Admin)
    }

    pub fn can_manage_admins(self) -> bool {
        self == AdminRole::SuperAdmin
    }

    pub fn can_view_logs(self) -> bool {
        self.has_role(AdminRole::Admin)
    }

    pub fn can_moderate_content(self) -> bool {
        self.has_role(AdminRole::Moderator)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdminRole::Support => "support",
            AdminRole::Moderator => "moderator",
            AdminRole::Admin => "admin",
            AdminRole::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminRole {
    type Err = GateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "support" => Ok(AdminRole::Support),
            "moderator" => Ok(AdminRole::Moderator),
            "admin" => Ok(AdminRole::Admin),
            "super_admin" | "superadmin" => Ok(AdminRole::SuperAdmin),
            other => Err(GateError::new(format!("unknown admin role: {other}"))),
        }
    }
}
