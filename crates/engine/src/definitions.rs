//! Process definition store.
//!
//! Definitions are templates: an ordered step list plus at most one
//! branching rule, owned by exactly one organization. Editing steps is
//! whole-list replacement, which is what keeps step orders dense -- the
//! 1-based position in the submitted list becomes the stored `order`, and
//! any caller-supplied ordering is discarded.

use std::sync::Arc;

use cadre_core::ThresholdRule;
use cadre_storage::{
    CadreStorage, DefinitionListing, DefinitionRecord, NewDefinition, NewStep, StepRecord,
};

use crate::clock::now_utc;
use crate::error::EngineError;
use crate::principal::Principal;

/// One step as submitted by a caller. Position in the submitted list
/// determines its `order`.
#[derive(Debug, Clone)]
pub struct StepInput {
    pub name: String,
    pub description: Option<String>,
}

/// A partial update to a definition.
///
/// The outer `Option` distinguishes "leave unchanged" from "write this
/// value"; for the clearable fields the inner `Option` carries the value
/// or the explicit null.
#[derive(Debug, Clone, Default)]
pub struct DefinitionPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub rule: Option<Option<ThresholdRule>>,
}

pub struct DefinitionService<S: CadreStorage> {
    storage: Arc<S>,
}

impl<S: CadreStorage> DefinitionService<S> {
    pub fn new(storage: Arc<S>) -> Self {
        DefinitionService { storage }
    }

    /// Create a definition, optionally with its initial step list.
    pub async fn create(
        &self,
        principal: &Principal,
        name: &str,
        description: Option<String>,
        rule: Option<ThresholdRule>,
        steps: Vec<StepInput>,
    ) -> Result<(DefinitionRecord, Vec<StepRecord>), EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::validation("process name is required"));
        }
        validate_step_names(&steps)?;

        let mut snapshot = self.storage.begin_snapshot().await?;
        let result = async {
            let definition = self
                .storage
                .insert_definition(
                    &mut snapshot,
                    NewDefinition {
                        organization_id: principal.organization_id.clone(),
                        name: name.to_string(),
                        description,
                        rule,
                        created_by: principal.user_id.clone(),
                        created_at: now_utc(),
                    },
                )
                .await?;
            let created = self
                .storage
                .insert_steps(&mut snapshot, &definition.id, numbered(steps))
                .await?;
            Ok::<_, EngineError>((definition, created))
        }
        .await;

        match result {
            Ok(value) => {
                self.storage.commit_snapshot(snapshot).await?;
                Ok(value)
            }
            Err(err) => {
                let _ = self.storage.abort_snapshot(snapshot).await;
                Err(err)
            }
        }
    }

    /// A definition with its ordered steps, scoped to the caller's
    /// organization.
    pub async fn get(
        &self,
        principal: &Principal,
        definition_id: &str,
    ) -> Result<(DefinitionRecord, Vec<StepRecord>), EngineError> {
        let definition = self
            .storage
            .get_definition(definition_id, &principal.organization_id)
            .await?;
        let steps = self.storage.list_steps(&definition.id).await?;
        Ok((definition, steps))
    }

    pub async fn list(&self, principal: &Principal) -> Result<Vec<DefinitionListing>, EngineError> {
        Ok(self
            .storage
            .list_definitions(&principal.organization_id)
            .await?)
    }

    /// Apply a partial update. The fetched record carries the unchanged
    /// fields; the patched record is written back wholesale.
    pub async fn update(
        &self,
        principal: &Principal,
        definition_id: &str,
        patch: DefinitionPatch,
    ) -> Result<DefinitionRecord, EngineError> {
        let mut record = self
            .storage
            .get_definition(definition_id, &principal.organization_id)
            .await?;
        if let Some(name) = patch.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(EngineError::validation("process name is required"));
            }
            record.name = name;
        }
        if let Some(description) = patch.description {
            record.description = description;
        }
        if let Some(rule) = patch.rule {
            record.rule = rule;
        }
        self.write_definition(&principal.organization_id, record).await
    }

    /// Flip the active flag. Inactive definitions reject new instance
    /// starts (enforced by the lifecycle engine).
    pub async fn toggle_active(
        &self,
        principal: &Principal,
        definition_id: &str,
    ) -> Result<DefinitionRecord, EngineError> {
        let mut record = self
            .storage
            .get_definition(definition_id, &principal.organization_id)
            .await?;
        record.active = !record.active;
        self.write_definition(&principal.organization_id, record).await
    }

    /// Clear and rewrite the full ordered step list in one logical
    /// operation. Orders are reassigned from list position, so no gaps can
    /// result from an edit.
    pub async fn replace_steps(
        &self,
        principal: &Principal,
        definition_id: &str,
        steps: Vec<StepInput>,
    ) -> Result<Vec<StepRecord>, EngineError> {
        let definition = self
            .storage
            .get_definition(definition_id, &principal.organization_id)
            .await?;
        validate_step_names(&steps)?;

        let mut snapshot = self.storage.begin_snapshot().await?;
        let result = async {
            self.storage.delete_steps(&mut snapshot, &definition.id).await?;
            let created = self
                .storage
                .insert_steps(&mut snapshot, &definition.id, numbered(steps))
                .await?;
            Ok::<_, EngineError>(created)
        }
        .await;

        match result {
            Ok(created) => {
                self.storage.commit_snapshot(snapshot).await?;
                Ok(created)
            }
            Err(err) => {
                let _ = self.storage.abort_snapshot(snapshot).await;
                Err(err)
            }
        }
    }

    /// Edit one step's name and description; order is not editable.
    pub async fn update_step(
        &self,
        principal: &Principal,
        definition_id: &str,
        step_id: &str,
        name: &str,
        description: Option<String>,
    ) -> Result<StepRecord, EngineError> {
        let definition = self
            .storage
            .get_definition(definition_id, &principal.organization_id)
            .await?;
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::validation("step name is required"));
        }
        let steps = self.storage.list_steps(&definition.id).await?;
        let mut record = steps
            .into_iter()
            .find(|s| s.id == step_id)
            .ok_or_else(|| EngineError::NotFound {
                resource: "step".to_string(),
            })?;
        record.name = name.to_string();
        record.description = description;

        let mut snapshot = self.storage.begin_snapshot().await?;
        match self.storage.update_step(&mut snapshot, record).await {
            Ok(updated) => {
                self.storage.commit_snapshot(snapshot).await?;
                Ok(updated)
            }
            Err(err) => {
                let _ = self.storage.abort_snapshot(snapshot).await;
                Err(err.into())
            }
        }
    }

    /// Delete one step. This can leave an order gap and a dangling rule
    /// target; the advance path tolerates both.
    pub async fn remove_step(
        &self,
        principal: &Principal,
        definition_id: &str,
        step_id: &str,
    ) -> Result<(), EngineError> {
        let definition = self
            .storage
            .get_definition(definition_id, &principal.organization_id)
            .await?;
        let mut snapshot = self.storage.begin_snapshot().await?;
        match self
            .storage
            .delete_step(&mut snapshot, &definition.id, step_id)
            .await
        {
            Ok(()) => {
                self.storage.commit_snapshot(snapshot).await?;
                Ok(())
            }
            Err(err) => {
                let _ = self.storage.abort_snapshot(snapshot).await;
                Err(err.into())
            }
        }
    }

    /// Delete a definition and its steps.
    ///
    /// Refused while any instance references the definition: instances are
    /// retained forever for audit, so deleting their definition would leave
    /// permanently dangling references.
    pub async fn remove(
        &self,
        principal: &Principal,
        definition_id: &str,
    ) -> Result<(), EngineError> {
        let definition = self
            .storage
            .get_definition(definition_id, &principal.organization_id)
            .await?;
        let live = self
            .storage
            .count_instances_for_definition(&definition.id)
            .await?;
        if live > 0 {
            return Err(EngineError::conflict(format!(
                "process has {} instance(s) and cannot be deleted",
                live
            )));
        }

        let mut snapshot = self.storage.begin_snapshot().await?;
        match self
            .storage
            .delete_definition(&mut snapshot, &principal.organization_id, &definition.id)
            .await
        {
            Ok(()) => {
                self.storage.commit_snapshot(snapshot).await?;
                Ok(())
            }
            Err(err) => {
                let _ = self.storage.abort_snapshot(snapshot).await;
                Err(err.into())
            }
        }
    }

    async fn write_definition(
        &self,
        organization_id: &str,
        record: DefinitionRecord,
    ) -> Result<DefinitionRecord, EngineError> {
        let mut snapshot = self.storage.begin_snapshot().await?;
        match self
            .storage
            .update_definition(&mut snapshot, organization_id, record)
            .await
        {
            Ok(updated) => {
                self.storage.commit_snapshot(snapshot).await?;
                Ok(updated)
            }
            Err(err) => {
                let _ = self.storage.abort_snapshot(snapshot).await;
                Err(err.into())
            }
        }
    }
}

fn validate_step_names(steps: &[StepInput]) -> Result<(), EngineError> {
    for step in steps {
        if step.name.trim().is_empty() {
            return Err(EngineError::validation("step name is required"));
        }
    }
    Ok(())
}

/// Assign dense 1-based orders from list position.
fn numbered(steps: Vec<StepInput>) -> Vec<NewStep> {
    steps
        .into_iter()
        .enumerate()
        .map(|(i, step)| NewStep {
            order: (i + 1) as u32,
            name: step.name.trim().to_string(),
            description: step.description,
        })
        .collect()
}
