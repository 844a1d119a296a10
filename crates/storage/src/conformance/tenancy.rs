//! Tenant-scoping tests: another organization's resources behave as absent.

use std::future::Future;

use super::{make_definition, make_instance, seed_definition, TestResult};
use crate::{CadreStorage, StorageError};

pub(crate) async fn run_tenancy_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CadreStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "tenancy",
            "reads_are_organization_scoped",
            reads_are_organization_scoped(factory().await).await,
        ),
        TestResult::from_result(
            "tenancy",
            "writes_are_organization_scoped",
            writes_are_organization_scoped(factory().await).await,
        ),
        TestResult::from_result(
            "tenancy",
            "instance_reads_scope_through_the_definition",
            instance_reads_scope_through_the_definition(factory().await).await,
        ),
    ]
}

async fn reads_are_organization_scoped<S: CadreStorage>(storage: S) -> Result<(), String> {
    let (def_id, _) = seed_definition(&storage, "org-a", 1).await?;

    match storage.get_definition(&def_id, "org-b").await {
        Err(StorageError::DefinitionNotFound { .. }) => {}
        Err(other) => return Err(format!("expected DefinitionNotFound, got {}", other)),
        Ok(_) => return Err("cross-tenant read succeeded".to_string()),
    }
    let listed = storage
        .list_definitions("org-b")
        .await
        .map_err(|e| e.to_string())?;
    if !listed.is_empty() {
        return Err("cross-tenant listing returned rows".to_string());
    }
    Ok(())
}

async fn writes_are_organization_scoped<S: CadreStorage>(storage: S) -> Result<(), String> {
    let (def_id, _) = seed_definition(&storage, "org-a", 1).await?;
    let record = storage
        .get_definition(&def_id, "org-a")
        .await
        .map_err(|e| e.to_string())?;

    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut renamed = record.clone();
    renamed.name = "Hijacked".to_string();
    match storage.update_definition(&mut snap, "org-b", renamed).await {
        Err(StorageError::DefinitionNotFound { .. }) => {}
        Err(other) => return Err(format!("expected DefinitionNotFound, got {}", other)),
        Ok(_) => return Err("cross-tenant update succeeded".to_string()),
    }
    match storage.delete_definition(&mut snap, "org-b", &def_id).await {
        Err(StorageError::DefinitionNotFound { .. }) => {}
        Err(other) => return Err(format!("expected DefinitionNotFound, got {}", other)),
        Ok(_) => return Err("cross-tenant delete succeeded".to_string()),
    }
    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;

    // A second org's inserts never shadow the first org's rows.
    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    storage
        .insert_definition(&mut snap, make_definition("org-b"))
        .await
        .map_err(|e| e.to_string())?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;
    storage
        .get_definition(&def_id, "org-a")
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

async fn instance_reads_scope_through_the_definition<S: CadreStorage>(
    storage: S,
) -> Result<(), String> {
    let (def_id, step_ids) = seed_definition(&storage, "org-a", 1).await?;
    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    let instance = storage
        .insert_instance(&mut snap, make_instance(&def_id, Some(&step_ids[0])))
        .await
        .map_err(|e| e.to_string())?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;

    storage
        .get_instance(&instance.id, "org-a")
        .await
        .map_err(|e| e.to_string())?;
    match storage.get_instance(&instance.id, "org-b").await {
        Err(StorageError::InstanceNotFound { .. }) => Ok(()),
        Err(other) => Err(format!("expected InstanceNotFound, got {}", other)),
        Ok(_) => Err("cross-tenant instance read succeeded".to_string()),
    }
}
