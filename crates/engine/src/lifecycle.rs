//! Instance lifecycle engine.
//!
//! A small, explicit finite-state machine per instance: `pending` is the
//! only non-terminal state; `approved` and `rejected` are closed. Every
//! transition stages the instance mutation and exactly one ledger entry in
//! the same snapshot, so the two commit or abort together -- there is no
//! code path that moves an instance without its audit record.
//!
//! Concurrency: correctness requires at-most-one-in-flight mutation per
//! instance id (two concurrent advances reading the same current step
//! would both write conflicting next steps plus duplicate ledger entries).
//! A keyed async mutex serializes mutations per instance for the duration
//! of the read-modify-write-and-log unit; the storage layer's OCC version
//! check backs this up. Operations on different instances proceed in
//! parallel, and no operation outlives its storage round trips.

use std::collections::HashMap;
use std::sync::Arc;

use cadre_core::transition::{self, StepRef, StepSequence, TransitionPlan, TransitionWarning};
use cadre_core::InstanceStatus;
use cadre_storage::{
    CadreStorage, InstanceListing, InstanceRecord, NewHistoryEntry, NewInstance, StepRecord,
};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::clock::now_utc;
use crate::error::EngineError;
use crate::principal::Principal;

/// Per-instance-id mutation locks.
///
/// The map only ever grows; entries are tiny and instance ids are bounded
/// by instances ever touched by this process.
struct InstanceLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InstanceLocks {
    fn new() -> Self {
        InstanceLocks {
            inner: Mutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, instance_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(instance_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub struct LifecycleEngine<S: CadreStorage> {
    storage: Arc<S>,
    locks: InstanceLocks,
}

impl<S: CadreStorage> LifecycleEngine<S> {
    pub fn new(storage: Arc<S>) -> Self {
        LifecycleEngine {
            storage,
            locks: InstanceLocks::new(),
        }
    }

    /// Start a new instance of a definition.
    ///
    /// Preconditions: the definition exists in the caller's organization,
    /// is active, and has at least one step. A zero-step definition is
    /// rejected here rather than creating an instance with nowhere to
    /// stand.
    pub async fn start(
        &self,
        principal: &Principal,
        definition_id: &str,
    ) -> Result<InstanceRecord, EngineError> {
        let definition = self
            .storage
            .get_definition(definition_id, &principal.organization_id)
            .await?;
        if !definition.active {
            return Err(EngineError::validation("process is not active"));
        }
        let steps = self.storage.list_steps(&definition.id).await?;
        let first = steps
            .first()
            .ok_or_else(|| EngineError::validation("process has no steps"))?;

        let now = now_utc();
        let mut snapshot = self.storage.begin_snapshot().await?;
        let result = async {
            let instance = self
                .storage
                .insert_instance(
                    &mut snapshot,
                    NewInstance {
                        definition_id: definition.id.clone(),
                        current_step_id: Some(first.id.clone()),
                        started_by: principal.user_id.clone(),
                        started_at: now.clone(),
                    },
                )
                .await?;
            self.storage
                .append_history(
                    &mut snapshot,
                    NewHistoryEntry {
                        instance_id: instance.id.clone(),
                        step_id: Some(first.id.clone()),
                        status: InstanceStatus::Pending,
                        notes: Some("Process started".to_string()),
                        performed_by: Some(principal.user_id.clone()),
                        performed_at: now.clone(),
                    },
                )
                .await?;
            Ok::<_, EngineError>(instance)
        }
        .await;

        match result {
            Ok(instance) => {
                self.storage.commit_snapshot(snapshot).await?;
                Ok(instance)
            }
            Err(err) => {
                let _ = self.storage.abort_snapshot(snapshot).await;
                Err(err)
            }
        }
    }

    /// Advance an instance, evaluating the definition's branching rule.
    ///
    /// Exactly one of two outcomes fires per call: move to the computed
    /// next step (status stays pending), or complete as approved when no
    /// next step exists. A rule target that matches no step falls back to
    /// default advancement and logs a warning.
    pub async fn advance(
        &self,
        principal: &Principal,
        instance_id: &str,
        value: Decimal,
    ) -> Result<InstanceRecord, EngineError> {
        let _guard = self.locks.acquire(instance_id).await;

        let instance = self
            .storage
            .get_instance(instance_id, &principal.organization_id)
            .await?;
        if instance.status.is_terminal() {
            return Err(EngineError::conflict(format!(
                "instance is already {}",
                instance.status
            )));
        }
        let definition = self
            .storage
            .get_definition(&instance.definition_id, &principal.organization_id)
            .await?;
        let steps = self.storage.list_steps(&definition.id).await?;
        let sequence = StepSequence::new(steps.iter().map(step_ref).collect());

        let (plan, warning) = transition::plan(
            &sequence,
            instance.current_step_id.as_deref(),
            definition.rule.as_ref(),
            value,
        );
        if let Some(TransitionWarning::MissingRuleTarget { target_step_order }) = warning {
            tracing::warn!(
                instance_id,
                definition_id = %definition.id,
                target_step_order,
                "rule target step not found; falling back to default advancement"
            );
        }

        let now = now_utc();
        let mut snapshot = self.storage.begin_snapshot().await?;
        let result = async {
            match plan {
                TransitionPlan::Advance { next } => {
                    let updated = self
                        .storage
                        .set_instance_step(&mut snapshot, &instance.id, instance.version, &next.id)
                        .await?;
                    self.storage
                        .append_history(
                            &mut snapshot,
                            NewHistoryEntry {
                                instance_id: instance.id.clone(),
                                step_id: Some(next.id.clone()),
                                status: InstanceStatus::Pending,
                                notes: Some(format!("Moved to step: {}", next.name)),
                                performed_by: Some(principal.user_id.clone()),
                                performed_at: now.clone(),
                            },
                        )
                        .await?;
                    Ok::<_, EngineError>(updated)
                }
                TransitionPlan::Complete => {
                    let updated = self
                        .storage
                        .set_instance_status(
                            &mut snapshot,
                            &instance.id,
                            instance.version,
                            InstanceStatus::Approved,
                            Some(now.clone()),
                        )
                        .await?;
                    // The entry records the step the instance completed
                    // from, not a next step -- none exists.
                    self.storage
                        .append_history(
                            &mut snapshot,
                            NewHistoryEntry {
                                instance_id: instance.id.clone(),
                                step_id: instance.current_step_id.clone(),
                                status: InstanceStatus::Approved,
                                notes: Some("Process completed".to_string()),
                                performed_by: Some(principal.user_id.clone()),
                                performed_at: now.clone(),
                            },
                        )
                        .await?;
                    Ok(updated)
                }
            }
        }
        .await;

        match result {
            Ok(updated) => {
                self.storage.commit_snapshot(snapshot).await?;
                Ok(updated)
            }
            Err(err) => {
                let _ = self.storage.abort_snapshot(snapshot).await;
                Err(err)
            }
        }
    }

    /// Set an instance's status directly, bypassing the rule evaluator.
    ///
    /// Terminal instances cannot be regressed; once approved or rejected,
    /// the instance is closed. Setting `pending` on a pending instance is
    /// permitted and records an annotation-style ledger entry.
    pub async fn set_status(
        &self,
        principal: &Principal,
        instance_id: &str,
        status: InstanceStatus,
        notes: Option<String>,
    ) -> Result<InstanceRecord, EngineError> {
        let _guard = self.locks.acquire(instance_id).await;

        let instance = self
            .storage
            .get_instance(instance_id, &principal.organization_id)
            .await?;
        if instance.status.is_terminal() {
            return Err(EngineError::conflict(format!(
                "instance is already {}",
                instance.status
            )));
        }

        let now = now_utc();
        let completed_at = status.is_terminal().then(|| now.clone());
        let mut snapshot = self.storage.begin_snapshot().await?;
        let result = async {
            let updated = self
                .storage
                .set_instance_status(
                    &mut snapshot,
                    &instance.id,
                    instance.version,
                    status,
                    completed_at,
                )
                .await?;
            self.storage
                .append_history(
                    &mut snapshot,
                    NewHistoryEntry {
                        instance_id: instance.id.clone(),
                        step_id: instance.current_step_id.clone(),
                        status,
                        notes,
                        performed_by: Some(principal.user_id.clone()),
                        performed_at: now.clone(),
                    },
                )
                .await?;
            Ok::<_, EngineError>(updated)
        }
        .await;

        match result {
            Ok(updated) => {
                self.storage.commit_snapshot(snapshot).await?;
                Ok(updated)
            }
            Err(err) => {
                let _ = self.storage.abort_snapshot(snapshot).await;
                Err(err)
            }
        }
    }

    pub async fn get(
        &self,
        principal: &Principal,
        instance_id: &str,
    ) -> Result<InstanceRecord, EngineError> {
        Ok(self
            .storage
            .get_instance(instance_id, &principal.organization_id)
            .await?)
    }

    pub async fn list(&self, principal: &Principal) -> Result<Vec<InstanceListing>, EngineError> {
        Ok(self
            .storage
            .list_instances(&principal.organization_id)
            .await?)
    }
}

fn step_ref(step: &StepRecord) -> StepRef {
    StepRef {
        id: step.id.clone(),
        order: step.order,
        name: step.name.clone(),
    }
}
