//! Execution-history ledger, read side.
//!
//! The ledger is written exclusively by the lifecycle engine inside its
//! transition snapshots; this service only exposes the per-instance
//! listing. No update or delete surface exists anywhere in the system.

use std::sync::Arc;

use cadre_storage::{CadreStorage, HistoryListing};

use crate::error::EngineError;
use crate::principal::Principal;

pub struct LedgerService<S: CadreStorage> {
    storage: Arc<S>,
}

impl<S: CadreStorage> LedgerService<S> {
    pub fn new(storage: Arc<S>) -> Self {
        LedgerService { storage }
    }

    /// History of one instance, newest-first, with step names and performer
    /// emails joined. The instance lookup enforces tenant scope before any
    /// entries are returned.
    pub async fn list_by_instance(
        &self,
        principal: &Principal,
        instance_id: &str,
    ) -> Result<Vec<HistoryListing>, EngineError> {
        let instance = self
            .storage
            .get_instance(instance_id, &principal.organization_id)
            .await?;
        Ok(self.storage.list_history(&instance.id).await?)
    }
}
