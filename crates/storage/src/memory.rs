//! In-memory reference backend.
//!
//! Committed state lives behind a `tokio::sync::RwLock`; a snapshot is a
//! staged clone of that state plus an owned writer permit, so transactions
//! are single-writer and queries always see the last committed state.
//! Committing swaps the staged state in wholesale; aborting (or dropping
//! the snapshot) discards it, which gives all-or-nothing semantics for
//! free.

use std::sync::Arc;

use async_trait::async_trait;
use cadre_core::InstanceStatus;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::StorageError;
use crate::record::{
    DefinitionListing, DefinitionRecord, HistoryListing, HistoryRecord, InstanceListing,
    InstanceRecord, MemberRecord, NewDefinition, NewHistoryEntry, NewInstance, NewMember, NewStep,
    StepRecord,
};
use crate::traits::CadreStorage;

#[derive(Debug, Clone, Default)]
struct State {
    definitions: Vec<DefinitionRecord>,
    steps: Vec<StepRecord>,
    instances: Vec<InstanceRecord>,
    history: Vec<HistoryRecord>,
    members: Vec<MemberRecord>,
    next_definition: u64,
    next_step: u64,
    next_instance: u64,
    next_history: u64,
}

/// An in-progress transaction: a staged copy of the whole store plus the
/// writer permit that serializes transactions.
pub struct MemorySnapshot {
    staged: State,
    _permit: OwnedMutexGuard<()>,
}

/// The in-memory storage backend.
#[derive(Clone)]
pub struct MemoryStorage {
    committed: Arc<RwLock<State>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage {
            committed: Arc::new(RwLock::new(State::default())),
            writer: Arc::new(Mutex::new(())),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CadreStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        let permit = self.writer.clone().lock_owned().await;
        let staged = self.committed.read().await.clone();
        Ok(MemorySnapshot {
            staged,
            _permit: permit,
        })
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        *self.committed.write().await = snapshot.staged;
        Ok(())
    }

    async fn abort_snapshot(&self, _snapshot: MemorySnapshot) -> Result<(), StorageError> {
        // Dropping the staged state is the rollback.
        Ok(())
    }

    async fn insert_definition(
        &self,
        snapshot: &mut MemorySnapshot,
        definition: NewDefinition,
    ) -> Result<DefinitionRecord, StorageError> {
        let state = &mut snapshot.staged;
        state.next_definition += 1;
        let record = DefinitionRecord {
            id: format!("def-{}", state.next_definition),
            organization_id: definition.organization_id,
            name: definition.name,
            description: definition.description,
            rule: definition.rule,
            active: true,
            created_by: definition.created_by,
            created_at: definition.created_at,
        };
        state.definitions.push(record.clone());
        Ok(record)
    }

    async fn update_definition(
        &self,
        snapshot: &mut MemorySnapshot,
        organization_id: &str,
        record: DefinitionRecord,
    ) -> Result<DefinitionRecord, StorageError> {
        let state = &mut snapshot.staged;
        let stored = state
            .definitions
            .iter_mut()
            .find(|d| d.id == record.id && d.organization_id == organization_id)
            .ok_or_else(|| StorageError::DefinitionNotFound {
                definition_id: record.id.clone(),
            })?;
        // Identity and ownership are not writable through updates.
        let mut record = record;
        record.id = stored.id.clone();
        record.organization_id = stored.organization_id.clone();
        record.created_by = stored.created_by.clone();
        record.created_at = stored.created_at.clone();
        *stored = record.clone();
        Ok(record)
    }

    async fn delete_definition(
        &self,
        snapshot: &mut MemorySnapshot,
        organization_id: &str,
        definition_id: &str,
    ) -> Result<(), StorageError> {
        let state = &mut snapshot.staged;
        let before = state.definitions.len();
        state
            .definitions
            .retain(|d| !(d.id == definition_id && d.organization_id == organization_id));
        if state.definitions.len() == before {
            return Err(StorageError::DefinitionNotFound {
                definition_id: definition_id.to_string(),
            });
        }
        state.steps.retain(|s| s.definition_id != definition_id);
        Ok(())
    }

    async fn insert_steps(
        &self,
        snapshot: &mut MemorySnapshot,
        definition_id: &str,
        steps: Vec<NewStep>,
    ) -> Result<Vec<StepRecord>, StorageError> {
        let state = &mut snapshot.staged;
        let mut created = Vec::with_capacity(steps.len());
        for step in steps {
            state.next_step += 1;
            let record = StepRecord {
                id: format!("step-{}", state.next_step),
                definition_id: definition_id.to_string(),
                order: step.order,
                name: step.name,
                description: step.description,
            };
            state.steps.push(record.clone());
            created.push(record);
        }
        Ok(created)
    }

    async fn delete_steps(
        &self,
        snapshot: &mut MemorySnapshot,
        definition_id: &str,
    ) -> Result<(), StorageError> {
        snapshot
            .staged
            .steps
            .retain(|s| s.definition_id != definition_id);
        Ok(())
    }

    async fn update_step(
        &self,
        snapshot: &mut MemorySnapshot,
        record: StepRecord,
    ) -> Result<StepRecord, StorageError> {
        let stored = snapshot
            .staged
            .steps
            .iter_mut()
            .find(|s| s.id == record.id && s.definition_id == record.definition_id)
            .ok_or_else(|| StorageError::StepNotFound {
                step_id: record.id.clone(),
            })?;
        let mut record = record;
        record.id = stored.id.clone();
        record.definition_id = stored.definition_id.clone();
        *stored = record.clone();
        Ok(record)
    }

    async fn delete_step(
        &self,
        snapshot: &mut MemorySnapshot,
        definition_id: &str,
        step_id: &str,
    ) -> Result<(), StorageError> {
        let state = &mut snapshot.staged;
        let before = state.steps.len();
        state
            .steps
            .retain(|s| !(s.id == step_id && s.definition_id == definition_id));
        if state.steps.len() == before {
            return Err(StorageError::StepNotFound {
                step_id: step_id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_instance(
        &self,
        snapshot: &mut MemorySnapshot,
        instance: NewInstance,
    ) -> Result<InstanceRecord, StorageError> {
        let state = &mut snapshot.staged;
        state.next_instance += 1;
        let record = InstanceRecord {
            id: format!("ins-{}", state.next_instance),
            definition_id: instance.definition_id,
            current_step_id: instance.current_step_id,
            status: InstanceStatus::Pending,
            started_by: instance.started_by,
            started_at: instance.started_at,
            completed_at: None,
            version: 0,
        };
        state.instances.push(record.clone());
        Ok(record)
    }

    async fn set_instance_step(
        &self,
        snapshot: &mut MemorySnapshot,
        instance_id: &str,
        expected_version: i64,
        step_id: &str,
    ) -> Result<InstanceRecord, StorageError> {
        let stored = find_instance_mut(&mut snapshot.staged, instance_id)?;
        if stored.version != expected_version {
            return Err(StorageError::ConcurrentConflict {
                instance_id: instance_id.to_string(),
                expected_version,
            });
        }
        stored.current_step_id = Some(step_id.to_string());
        stored.version += 1;
        Ok(stored.clone())
    }

    async fn set_instance_status(
        &self,
        snapshot: &mut MemorySnapshot,
        instance_id: &str,
        expected_version: i64,
        status: InstanceStatus,
        completed_at: Option<String>,
    ) -> Result<InstanceRecord, StorageError> {
        let stored = find_instance_mut(&mut snapshot.staged, instance_id)?;
        if stored.version != expected_version {
            return Err(StorageError::ConcurrentConflict {
                instance_id: instance_id.to_string(),
                expected_version,
            });
        }
        stored.status = status;
        stored.completed_at = completed_at;
        stored.version += 1;
        Ok(stored.clone())
    }

    async fn append_history(
        &self,
        snapshot: &mut MemorySnapshot,
        entry: NewHistoryEntry,
    ) -> Result<HistoryRecord, StorageError> {
        let state = &mut snapshot.staged;
        state.next_history += 1;
        let record = HistoryRecord {
            id: format!("hist-{}", state.next_history),
            instance_id: entry.instance_id,
            step_id: entry.step_id,
            status: entry.status,
            notes: entry.notes,
            performed_by: entry.performed_by,
            performed_at: entry.performed_at,
        };
        state.history.push(record.clone());
        Ok(record)
    }

    async fn insert_member(
        &self,
        snapshot: &mut MemorySnapshot,
        member: NewMember,
    ) -> Result<MemberRecord, StorageError> {
        let state = &mut snapshot.staged;
        let record = MemberRecord {
            id: member.user_id,
            email: member.email,
            organization_id: member.organization_id,
            role: member.role,
        };
        // Seeding is idempotent per user id.
        state.members.retain(|m| m.id != record.id);
        state.members.push(record.clone());
        Ok(record)
    }

    async fn get_definition(
        &self,
        definition_id: &str,
        organization_id: &str,
    ) -> Result<DefinitionRecord, StorageError> {
        let state = self.committed.read().await;
        state
            .definitions
            .iter()
            .find(|d| d.id == definition_id && d.organization_id == organization_id)
            .cloned()
            .ok_or_else(|| StorageError::DefinitionNotFound {
                definition_id: definition_id.to_string(),
            })
    }

    async fn list_definitions(
        &self,
        organization_id: &str,
    ) -> Result<Vec<DefinitionListing>, StorageError> {
        let state = self.committed.read().await;
        let listings = state
            .definitions
            .iter()
            .rev() // newest-created first
            .filter(|d| d.organization_id == organization_id)
            .map(|d| {
                let step_count = state.steps.iter().filter(|s| s.definition_id == d.id).count();
                let instances: Vec<&InstanceRecord> = state
                    .instances
                    .iter()
                    .filter(|i| i.definition_id == d.id)
                    .collect();
                let last_run_at = instances
                    .iter()
                    .map(|i| i.started_at.as_str())
                    .max()
                    .map(|s| s.to_string());
                DefinitionListing {
                    definition: d.clone(),
                    step_count,
                    instance_count: instances.len(),
                    last_run_at,
                }
            })
            .collect();
        Ok(listings)
    }

    async fn list_steps(&self, definition_id: &str) -> Result<Vec<StepRecord>, StorageError> {
        let state = self.committed.read().await;
        let mut steps: Vec<StepRecord> = state
            .steps
            .iter()
            .filter(|s| s.definition_id == definition_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.order);
        Ok(steps)
    }

    async fn get_instance(
        &self,
        instance_id: &str,
        organization_id: &str,
    ) -> Result<InstanceRecord, StorageError> {
        let state = self.committed.read().await;
        state
            .instances
            .iter()
            .find(|i| i.id == instance_id)
            .filter(|i| {
                state
                    .definitions
                    .iter()
                    .any(|d| d.id == i.definition_id && d.organization_id == organization_id)
            })
            .cloned()
            .ok_or_else(|| StorageError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })
    }

    async fn list_instances(
        &self,
        organization_id: &str,
    ) -> Result<Vec<InstanceListing>, StorageError> {
        let state = self.committed.read().await;
        let listings = state
            .instances
            .iter()
            .rev() // newest-started first
            .filter_map(|i| {
                let definition = state
                    .definitions
                    .iter()
                    .find(|d| d.id == i.definition_id && d.organization_id == organization_id)?;
                let current_step_name = i.current_step_id.as_deref().and_then(|sid| {
                    state.steps.iter().find(|s| s.id == sid).map(|s| s.name.clone())
                });
                let started_by_email = state
                    .members
                    .iter()
                    .find(|m| m.id == i.started_by)
                    .map(|m| m.email.clone());
                Some(InstanceListing {
                    instance: i.clone(),
                    process_name: definition.name.clone(),
                    current_step_name,
                    started_by_email,
                })
            })
            .collect();
        Ok(listings)
    }

    async fn count_instances_for_definition(
        &self,
        definition_id: &str,
    ) -> Result<usize, StorageError> {
        let state = self.committed.read().await;
        Ok(state
            .instances
            .iter()
            .filter(|i| i.definition_id == definition_id)
            .count())
    }

    async fn list_history(&self, instance_id: &str) -> Result<Vec<HistoryListing>, StorageError> {
        let state = self.committed.read().await;
        // Insertion order is causal order; reversing it is newest-first and
        // keeps same-timestamp entries stable.
        let listings = state
            .history
            .iter()
            .rev()
            .filter(|h| h.instance_id == instance_id)
            .map(|h| {
                let step_name = h.step_id.as_deref().and_then(|sid| {
                    state.steps.iter().find(|s| s.id == sid).map(|s| s.name.clone())
                });
                let performed_by_email = h.performed_by.as_deref().and_then(|uid| {
                    state.members.iter().find(|m| m.id == uid).map(|m| m.email.clone())
                });
                HistoryListing {
                    entry: h.clone(),
                    step_name,
                    performed_by_email,
                }
            })
            .collect();
        Ok(listings)
    }

    async fn list_members(
        &self,
        organization_id: &str,
    ) -> Result<Vec<MemberRecord>, StorageError> {
        let state = self.committed.read().await;
        Ok(state
            .members
            .iter()
            .filter(|m| m.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn count_members(&self, organization_id: &str) -> Result<usize, StorageError> {
        let state = self.committed.read().await;
        Ok(state
            .members
            .iter()
            .filter(|m| m.organization_id == organization_id)
            .count())
    }
}

fn find_instance_mut<'a>(
    state: &'a mut State,
    instance_id: &str,
) -> Result<&'a mut InstanceRecord, StorageError> {
    state
        .instances
        .iter_mut()
        .find(|i| i.id == instance_id)
        .ok_or_else(|| StorageError::InstanceNotFound {
            instance_id: instance_id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(org: &str) -> NewDefinition {
        NewDefinition {
            organization_id: org.to_string(),
            name: "Expense approval".to_string(),
            description: None,
            rule: None,
            created_by: "user-1".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn backend_assigns_sequential_ids() {
        let storage = MemoryStorage::new();
        let mut snap = storage.begin_snapshot().await.unwrap();
        let a = storage.insert_definition(&mut snap, definition("org-1")).await.unwrap();
        let b = storage.insert_definition(&mut snap, definition("org-1")).await.unwrap();
        assert_eq!(a.id, "def-1");
        assert_eq!(b.id, "def-2");
    }

    #[tokio::test]
    async fn occ_mismatch_is_a_concurrent_conflict() {
        let storage = MemoryStorage::new();
        let mut snap = storage.begin_snapshot().await.unwrap();
        let def = storage.insert_definition(&mut snap, definition("org-1")).await.unwrap();
        let instance = storage
            .insert_instance(
                &mut snap,
                NewInstance {
                    definition_id: def.id,
                    current_step_id: None,
                    started_by: "user-1".to_string(),
                    started_at: "2026-01-01T00:00:00Z".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(instance.version, 0);

        let err = storage
            .set_instance_step(&mut snap, &instance.id, 7, "step-1")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ConcurrentConflict { .. }));
    }
}
