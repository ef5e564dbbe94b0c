use std::env;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;

use marketgate_core_types::{AdminRole, Principal};

use crate::allowlist::{load_allowlist, LegacyAllowlist};
use crate::errors::{PrivilegeError, StoreError};
use crate::model::{PrivilegeRecord, PrivilegeSource};
use crate::resolver::PrivilegeResolver;
use crate::store::{InMemoryPrivilegeStore, PrivilegeStore};

struct FailingStore;

#[async_trait]
impl PrivilegeStore for FailingStore {
    async fn find_privileges(&self, _: &str) -> Result<Vec<PrivilegeRecord>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn list_privileges(&self) -> Result<Vec<PrivilegeRecord>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

struct SlowStore {
    delay: Duration,
}

#[async_trait]
impl PrivilegeStore for SlowStore {
    async fn find_privileges(&self, _: &str) -> Result<Vec<PrivilegeRecord>, StoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn list_privileges(&self) -> Result<Vec<PrivilegeRecord>, StoreError> {
        Ok(Vec::new())
    }
}

fn allowlisted(emails: &[&str]) -> Arc<LegacyAllowlist> {
    Arc::new(LegacyAllowlist::new(
        emails.iter().map(|email| email.to_string()),
    ))
}

fn resolver_with(
    store: Arc<dyn PrivilegeStore>,
    allowlist: Arc<LegacyAllowlist>,
) -> PrivilegeResolver {
    PrivilegeResolver::new(store, allowlist)
}

#[tokio::test]
async fn active_record_wins_over_allowlist() {
    let store = Arc::new(InMemoryPrivilegeStore::new());
    store
        .insert(PrivilegeRecord::active("u1", AdminRole::SuperAdmin))
        .await;
    let resolver = resolver_with(store, allowlisted(&["admin@example.com"]));

    let principal = Principal::authenticated("u1", "admin@example.com");
    let decision = resolver.resolve(Some(&principal)).await.unwrap();

    assert!(decision.is_privileged);
    assert_eq!(decision.source, PrivilegeSource::Database);
    assert_eq!(decision.role, Some(AdminRole::SuperAdmin));
    assert!(!decision.needs_migration);
}

#[tokio::test]
async fn allowlist_grants_with_migration_hint() {
    let store = Arc::new(InMemoryPrivilegeStore::new());
    let resolver = resolver_with(store, allowlisted(&["admin@example.com"]));

    let principal = Principal::authenticated("u1", "admin@example.com");
    let decision = resolver.resolve(Some(&principal)).await.unwrap();

    assert!(decision.is_privileged);
    assert_eq!(decision.source, PrivilegeSource::Legacy);
    assert_eq!(decision.role, Some(AdminRole::Admin));
    assert!(decision.needs_migration);
}

#[tokio::test]
async fn unknown_principal_is_not_privileged() {
    let store = Arc::new(InMemoryPrivilegeStore::new());
    let resolver = resolver_with(store, allowlisted(&["admin@example.com"]));

    let principal = Principal::authenticated("u2", "user@example.com");
    let decision = resolver.resolve(Some(&principal)).await.unwrap();

    assert!(!decision.is_privileged);
    assert_eq!(decision.source, PrivilegeSource::None);
    assert_eq!(decision.role, None);
}

#[tokio::test]
async fn missing_or_unauthenticated_principal_short_circuits() {
    let resolver = resolver_with(Arc::new(FailingStore), allowlisted(&[]));

    let decision = resolver.resolve(None).await.unwrap();
    assert!(!decision.is_privileged);

    // An unauthenticated principal never reaches the store.
    let anonymous = Principal::anonymous();
    let decision = resolver.resolve(Some(&anonymous)).await.unwrap();
    assert!(!decision.is_privileged);
    assert_eq!(decision.source, PrivilegeSource::None);
}

#[tokio::test]
async fn revoked_record_suppresses_allowlist() {
    let store = Arc::new(InMemoryPrivilegeStore::new());
    store
        .insert(PrivilegeRecord::revoked("u1", AdminRole::Admin))
        .await;
    let resolver = resolver_with(store, allowlisted(&["admin@example.com"]));

    let principal = Principal::authenticated("u1", "admin@example.com");
    let decision = resolver.resolve(Some(&principal)).await.unwrap();

    assert!(!decision.is_privileged);
    assert_eq!(decision.source, PrivilegeSource::None);
}

#[tokio::test]
async fn metadata_claim_grants_before_allowlist() {
    let store = Arc::new(InMemoryPrivilegeStore::new());
    let resolver = resolver_with(store, allowlisted(&["admin@example.com"]));

    let principal =
        Principal::authenticated("u3", "other@example.com").with_claim("role", "admin");
    let decision = resolver.resolve(Some(&principal)).await.unwrap();

    assert!(decision.is_privileged);
    assert_eq!(decision.source, PrivilegeSource::Metadata);
    assert!(decision.needs_migration);
}

#[tokio::test]
async fn database_record_wins_over_metadata_claim() {
    let store = Arc::new(InMemoryPrivilegeStore::new());
    store
        .insert(PrivilegeRecord::active("u3", AdminRole::Moderator))
        .await;
    let resolver = resolver_with(store, allowlisted(&[]));

    let principal =
        Principal::authenticated("u3", "other@example.com").with_claim("role", "admin");
    let decision = resolver.resolve(Some(&principal)).await.unwrap();

    assert_eq!(decision.source, PrivilegeSource::Database);
    assert_eq!(decision.role, Some(AdminRole::Moderator));
}

#[tokio::test]
async fn store_error_propagates_instead_of_denying() {
    let resolver = resolver_with(Arc::new(FailingStore), allowlisted(&["admin@example.com"]));

    let principal = Principal::authenticated("u1", "admin@example.com");
    let err = resolver.resolve(Some(&principal)).await.unwrap_err();

    assert!(err.is_store_failure());
}

#[tokio::test]
async fn store_timeout_is_a_store_failure() {
    let store = Arc::new(SlowStore {
        delay: Duration::from_millis(200),
    });
    let allowlist = allowlisted(&["admin@example.com"]);
    let resolver =
        PrivilegeResolver::with_store_timeout(store, allowlist, Duration::from_millis(10));

    let principal = Principal::authenticated("u1", "admin@example.com");
    let err = resolver.resolve(Some(&principal)).await.unwrap_err();

    match err {
        PrivilegeError::StoreTimeout(ms) => assert_eq!(ms, 10),
        other => panic!("expected StoreTimeout, got {other:?}"),
    }
}

#[tokio::test]
async fn multiple_active_records_are_a_data_error() {
    let store = Arc::new(InMemoryPrivilegeStore::new());
    store
        .insert(PrivilegeRecord::active("u1", AdminRole::Admin))
        .await;
    store
        .insert(PrivilegeRecord::active("u1", AdminRole::SuperAdmin))
        .await;
    let resolver = resolver_with(store, allowlisted(&[]));

    let principal = Principal::authenticated("u1", "admin@example.com");
    let err = resolver.resolve(Some(&principal)).await.unwrap_err();

    match err {
        PrivilegeError::AmbiguousRecord {
            principal_id,
            count,
        } => {
            assert_eq!(principal_id, "u1");
            assert_eq!(count, 2);
        }
        other => panic!("expected AmbiguousRecord, got {other:?}"),
    }
}

#[tokio::test]
async fn find_active_privilege_skips_revoked_rows() {
    let store = InMemoryPrivilegeStore::new();
    store
        .insert(PrivilegeRecord::revoked("u1", AdminRole::Admin))
        .await;
    assert!(store.find_active_privilege("u1").await.unwrap().is_none());

    store
        .insert(PrivilegeRecord::active("u1", AdminRole::Moderator))
        .await;
    let record = store.find_active_privilege("u1").await.unwrap().unwrap();
    assert_eq!(record.role, AdminRole::Moderator);

    store
        .insert(PrivilegeRecord::active("u1", AdminRole::Admin))
        .await;
    assert!(store.find_active_privilege("u1").await.is_err());
}

#[tokio::test]
async fn deactivate_revokes_every_row() {
    let store = Arc::new(InMemoryPrivilegeStore::new());
    store
        .insert(PrivilegeRecord::active("u1", AdminRole::Admin))
        .await;
    store.deactivate("u1").await;

    let resolver = resolver_with(store, allowlisted(&["admin@example.com"]));
    let principal = Principal::authenticated("u1", "admin@example.com");
    let decision = resolver.resolve(Some(&principal)).await.unwrap();
    assert!(!decision.is_privileged);
}

#[test]
fn allowlist_matches_case_insensitively() {
    let allowlist = LegacyAllowlist::new(vec!["Admin@Example.com ".to_string()]);
    assert!(allowlist.contains("admin@example.com"));
    assert!(allowlist.contains("  ADMIN@EXAMPLE.COM"));
    assert!(!allowlist.contains("other@example.com"));
    assert_eq!(allowlist.len(), 1);
}

#[test]
fn load_allowlist_unions_file_and_env() {
    let _guard = env_guard().lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("allowlist.yaml");
    std::fs::write(
        &file_path,
        "admins:\n  - admin@example.com\n  - moderator@example.com\n",
    )
    .unwrap();

    env::set_var("MARKETGATE_ADMIN_ALLOWLIST", "bootstrap@example.com");
    let allowlist = load_allowlist(Some(&file_path)).unwrap();
    env::remove_var("MARKETGATE_ADMIN_ALLOWLIST");

    assert_eq!(allowlist.len(), 3);
    assert!(allowlist.contains("admin@example.com"));
    assert!(allowlist.contains("bootstrap@example.com"));
}

#[test]
fn load_allowlist_tolerates_missing_file() {
    let _guard = env_guard().lock().unwrap();
    env::remove_var("MARKETGATE_ADMIN_ALLOWLIST");
    let allowlist = load_allowlist(Some(std::path::Path::new("/nonexistent/allow.yaml"))).unwrap();
    assert!(allowlist.is_empty());
}

#[test]
fn load_allowlist_rejects_malformed_yaml() {
    let _guard = env_guard().lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("allowlist.yaml");
    std::fs::write(&file_path, "admins: {not: [a, list}").unwrap();

    let err = load_allowlist(Some(&file_path)).unwrap_err();
    assert!(matches!(err, PrivilegeError::InvalidAllowlist(_)));
}

fn env_guard() -> &'static Mutex<()> {
    static ENV_GUARD: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_GUARD.get_or_init(|| Mutex::new(()))
}
