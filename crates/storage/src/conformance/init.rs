//! Initialization tests: inserts assign ids and sensible defaults.

use std::future::Future;

use super::{make_definition, make_instance, make_steps, TestResult};
use crate::CadreStorage;
use cadre_core::InstanceStatus;

pub(crate) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CadreStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "init",
            "definitions_are_created_active_with_ids",
            definitions_are_created_active_with_ids(factory().await).await,
        ),
        TestResult::from_result(
            "init",
            "instances_start_pending_at_version_zero",
            instances_start_pending_at_version_zero(factory().await).await,
        ),
        TestResult::from_result(
            "init",
            "steps_list_in_order",
            steps_list_in_order(factory().await).await,
        ),
    ]
}

async fn definitions_are_created_active_with_ids<S: CadreStorage>(storage: S) -> Result<(), String> {
    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    let def = storage
        .insert_definition(&mut snap, make_definition("org-1"))
        .await
        .map_err(|e| e.to_string())?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;

    if def.id.is_empty() {
        return Err("definition id was empty".to_string());
    }
    if !def.active {
        return Err("new definitions must default to active".to_string());
    }
    let fetched = storage
        .get_definition(&def.id, "org-1")
        .await
        .map_err(|e| e.to_string())?;
    if fetched.name != def.name {
        return Err("round-tripped definition differs".to_string());
    }
    Ok(())
}

async fn instances_start_pending_at_version_zero<S: CadreStorage>(
    storage: S,
) -> Result<(), String> {
    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    let def = storage
        .insert_definition(&mut snap, make_definition("org-1"))
        .await
        .map_err(|e| e.to_string())?;
    let instance = storage
        .insert_instance(&mut snap, make_instance(&def.id, None))
        .await
        .map_err(|e| e.to_string())?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;

    if instance.status != InstanceStatus::Pending {
        return Err(format!("expected pending, got {}", instance.status));
    }
    if instance.version != 0 {
        return Err(format!("expected version 0, got {}", instance.version));
    }
    if instance.completed_at.is_some() {
        return Err("completed_at must be null at creation".to_string());
    }
    Ok(())
}

async fn steps_list_in_order<S: CadreStorage>(storage: S) -> Result<(), String> {
    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    let def = storage
        .insert_definition(&mut snap, make_definition("org-1"))
        .await
        .map_err(|e| e.to_string())?;
    storage
        .insert_steps(&mut snap, &def.id, make_steps(3))
        .await
        .map_err(|e| e.to_string())?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;

    let steps = storage.list_steps(&def.id).await.map_err(|e| e.to_string())?;
    let orders: Vec<u32> = steps.iter().map(|s| s.order).collect();
    if orders != vec![1, 2, 3] {
        return Err(format!("expected orders [1, 2, 3], got {:?}", orders));
    }
    Ok(())
}
