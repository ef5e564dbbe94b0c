//! Gate configuration: built-in defaults, optional YAML file, env overrides.
//! Loaded once at startup; the running gate never re-reads it.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use marketgate_core_types::AdminRole;

const ENV_BIND_ADDR: &str = "MARKETGATE_BIND_ADDR";
const ENV_RATE_LIMIT: &str = "MARKETGATE_RATE_LIMIT";
const ENV_RATE_WINDOW_MS: &str = "MARKETGATE_RATE_WINDOW_MS";
const ENV_STORE_TIMEOUT_MS: &str = "MARKETGATE_STORE_TIMEOUT_MS";
const ENV_STORE_MODE: &str = "MARKETGATE_STORE_MODE";
const ENV_SHARED_STORE_URL: &str = "MARKETGATE_SHARED_STORE_URL";
const ENV_SHARED_STORE_TOKEN: &str = "MARKETGATE_SHARED_STORE_TOKEN";
const ENV_ALLOWLIST_PATH: &str = "MARKETGATE_ALLOWLIST_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where rate-limit counters live.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    /// Per-process counters; limits reset on restart.
    Memory,
    /// External shared counter store, coordinated across processes.
    Shared,
}

impl FromStr for StoreMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreMode::Memory),
            "shared" => Ok(StoreMode::Shared),
            other => Err(ConfigError::Invalid(format!("unknown store mode: {other}"))),
        }
    }
}

/// Bearer-token entry for the static identity resolver in the demo server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenIdentity {
    pub token: String,
    pub principal_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub claims: HashMap<String, String>,
}

/// Demo seed row for the in-memory privilege store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrivilegeSeed {
    pub principal_id: String,
    pub role: AdminRole,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub bind_addr: String,
    pub rate_limit: u32,
    pub rate_window_ms: u64,
    pub store_timeout_ms: u64,
    pub store_mode: StoreMode,
    pub shared_store_url: Option<String>,
    pub shared_store_token: Option<String>,
    pub allowlist_path: Option<PathBuf>,
    pub identity_tokens: Vec<TokenIdentity>,
    pub privilege_seeds: Vec<PrivilegeSeed>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8787".to_string(),
            rate_limit: 30,
            rate_window_ms: 60_000,
            store_timeout_ms: 250,
            store_mode: StoreMode::Memory,
            shared_store_url: None,
            shared_store_token: None,
            allowlist_path: None,
            identity_tokens: Vec::new(),
            privilege_seeds: Vec::new(),
        }
    }
}

impl GateConfig {
    /// Defaults, overlaid by the YAML file (when given and present),
    /// overlaid by environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content =
                    fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
                serde_yaml::from_str(&content)
                    .map_err(|err| ConfigError::Invalid(err.to_string()))?
            }
            _ => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(addr) = env::var(ENV_BIND_ADDR) {
            self.bind_addr = addr;
        }
        self.rate_limit = env_parse(ENV_RATE_LIMIT, self.rate_limit);
        self.rate_window_ms = env_parse(ENV_RATE_WINDOW_MS, self.rate_window_ms);
        self.store_timeout_ms = env_parse(ENV_STORE_TIMEOUT_MS, self.store_timeout_ms);
        if let Ok(mode) = env::var(ENV_STORE_MODE) {
            self.store_mode = mode.parse()?;
        }
        if let Ok(url) = env::var(ENV_SHARED_STORE_URL) {
            self.shared_store_url = Some(url);
        }
        if let Ok(token) = env::var(ENV_SHARED_STORE_TOKEN) {
            self.shared_store_token = Some(token);
        }
        if let Ok(path) = env::var(ENV_ALLOWLIST_PATH) {
            self.allowlist_path = Some(PathBuf::from(path));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}
