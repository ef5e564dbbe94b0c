use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use marketgate_privilege_center::{LegacyAllowlist, PrivilegeResolver, PrivilegeStore};
use marketgate_rate_guard::RateGuard;

use crate::config::GateConfig;
use crate::identity::IdentityResolver;

/// Shared state behind every gate route.
#[derive(Clone)]
pub struct GateState {
    pub identity: Arc<dyn IdentityResolver>,
    pub privilege_store: Arc<dyn PrivilegeStore>,
    pub privileges: Arc<PrivilegeResolver>,
    pub rate_guard: Arc<RateGuard>,
    pub rate_limit: u32,
    pub rate_window_ms: u64,
    pub health: Arc<GateHealth>,
}

impl GateState {
    pub fn new(
        identity: Arc<dyn IdentityResolver>,
        privilege_store: Arc<dyn PrivilegeStore>,
        allowlist: Arc<LegacyAllowlist>,
        rate_guard: Arc<RateGuard>,
        config: &GateConfig,
    ) -> Self {
        let privileges = Arc::new(PrivilegeResolver::with_store_timeout(
            Arc::clone(&privilege_store),
            allowlist,
            Duration::from_millis(config.store_timeout_ms),
        ));
        Self {
            identity,
            privilege_store,
            privileges,
            rate_guard,
            rate_limit: config.rate_limit,
            rate_window_ms: config.rate_window_ms,
            health: Arc::new(GateHealth::new()),
        }
    }

    pub fn health_snapshot(&self) -> HealthSnapshot {
        self.health.snapshot()
    }

    pub fn mark_live(&self) {
        self.health.mark_live();
    }

    pub fn mark_ready(&self) {
        self.health.mark_ready();
    }

    pub fn mark_unready(&self, error: impl Into<String>) {
        self.health.mark_unready(error);
    }
}

#[derive(Default)]
pub struct GateHealth {
    live: AtomicBool,
    ready: AtomicBool,
    last_ready_check: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl GateHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_live(&self) {
        self.live.store(true, Ordering::SeqCst);
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
        self.update_last_check();
        let mut guard = self.last_error.lock().expect("health lock poisoned");
        *guard = None;
    }

    pub fn mark_unready(&self, error: impl Into<String>) {
        self.ready.store(false, Ordering::SeqCst);
        self.update_last_check();
        let mut guard = self.last_error.lock().expect("health lock poisoned");
        *guard = Some(error.into());
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            ready: self.ready.load(Ordering::SeqCst),
            live: self.live.load(Ordering::SeqCst),
            last_ready_check: self.last_ready_check(),
            last_error: self
                .last_error
                .lock()
                .expect("health lock poisoned")
                .clone(),
        }
    }

    fn update_last_check(&self) {
        if let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) {
            self.last_ready_check
                .store(duration.as_secs(), Ordering::SeqCst);
        }
    }

    fn last_ready_check(&self) -> Option<u64> {
        match self.last_ready_check.load(Ordering::SeqCst) {
            0 => None,
            value => Some(value),
        }
    }
}

pub struct HealthSnapshot {
    pub ready: bool,
    pub live: bool,
    pub last_ready_check: Option<u64>,
    pub last_error: Option<String>,
}
