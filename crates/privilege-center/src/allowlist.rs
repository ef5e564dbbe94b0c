use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::errors::PrivilegeError;

const ENV_ALLOWLIST: &str = "MARKETGATE_ADMIN_ALLOWLIST";

/// Static set of display identifiers still trusted for backward
/// compatibility. Loaded once at process start and immutable afterwards;
/// always lower priority than an explicit privilege record.
#[derive(Clone, Debug, Default)]
pub struct LegacyAllowlist {
    entries: HashSet<String>,
}

impl LegacyAllowlist {
    pub fn new(entries: impl IntoIterator<Item = String>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| entry.trim().to_ascii_lowercase())
                .filter(|entry| !entry.is_empty())
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, email: &str) -> bool {
        self.entries.contains(&email.trim().to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default, Deserialize)]
struct AllowlistFile {
    #[serde(default)]
    admins: Vec<String>,
}

/// Build the allowlist from an optional YAML file plus the
/// `MARKETGATE_ADMIN_ALLOWLIST` comma list. The two sources are unioned: the
/// env var exists to bootstrap an admin on deployments without a config
/// file, not to mask one.
pub fn load_allowlist(path: Option<&Path>) -> Result<LegacyAllowlist, PrivilegeError> {
    let mut entries: Vec<String> = Vec::new();

    if let Some(path) = path {
        if path.exists() {
            let content =
                fs::read_to_string(path).map_err(|err| PrivilegeError::Io(err.to_string()))?;
            let file: AllowlistFile = serde_yaml::from_str(&content)
                .map_err(|err| PrivilegeError::InvalidAllowlist(err.to_string()))?;
            entries.extend(file.admins);
        }
    }

    if let Ok(raw) = env::var(ENV_ALLOWLIST) {
        entries.extend(raw.split(',').map(|token| token.to_string()));
    }

    Ok(LegacyAllowlist::new(entries))
}
