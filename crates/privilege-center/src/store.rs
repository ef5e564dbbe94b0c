use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::StoreError;
use crate::model::PrivilegeRecord;

/// Read-only view of the external privilege record store.
///
/// Implementations return every record they hold for a principal, active or
/// not; the resolver derives active/revoked/unknown from the full set and
/// enforces the single-active-record invariant itself.
#[async_trait]
pub trait PrivilegeStore: Send + Sync {
    async fn find_privileges(
        &self,
        principal_id: &str,
    ) -> Result<Vec<PrivilegeRecord>, StoreError>;

    /// All records in the store, newest first. Backs the admin listing
    /// surface.
    async fn list_privileges(&self) -> Result<Vec<PrivilegeRecord>, StoreError>;

    /// Narrow lookup: the one active record for a principal, if any. Errors
    /// when the store holds more than one active record rather than picking.
    async fn find_active_privilege(
        &self,
        principal_id: &str,
    ) -> Result<Option<PrivilegeRecord>, StoreError> {
        let mut active: Vec<PrivilegeRecord> = self
            .find_privileges(principal_id)
            .await?
            .into_iter()
            .filter(|record| record.is_active)
            .collect();
        match active.len() {
            0 => Ok(None),
            1 => Ok(Some(active.remove(0))),
            count => Err(StoreError::Query(format!(
                "{count} active privilege records for principal {principal_id}"
            ))),
        }
    }
}

/// In-process record store. Stands in for the managed backend in tests and
/// the demo server.
#[derive(Default)]
pub struct InMemoryPrivilegeStore {
    records: RwLock<HashMap<String, Vec<PrivilegeRecord>>>,
}

impl InMemoryPrivilegeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: PrivilegeRecord) {
        let mut records = self.records.write().await;
        records
            .entry(record.principal_id.clone())
            .or_default()
            .push(record);
    }

    /// Flip every record for the principal inactive, emulating an explicit
    /// revocation in the backing store.
    pub async fn deactivate(&self, principal_id: &str) {
        let mut records = self.records.write().await;
        if let Some(rows) = records.get_mut(principal_id) {
            for row in rows.iter_mut() {
                row.is_active = false;
                row.updated_at = chrono::Utc::now();
            }
        }
    }
}

#[async_trait]
impl PrivilegeStore for InMemoryPrivilegeStore {
    async fn find_privileges(
        &self,
        principal_id: &str,
    ) -> Result<Vec<PrivilegeRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(principal_id).cloned().unwrap_or_default())
    }

    async fn list_privileges(&self) -> Result<Vec<PrivilegeRecord>, StoreError> {
        let records = self.records.read().await;
        let mut all: Vec<PrivilegeRecord> = records.values().flatten().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}
