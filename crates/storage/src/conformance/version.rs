//! OCC tests: version-guarded instance mutations detect concurrent writers.

use std::future::Future;

use super::{make_instance, seed_definition, TestResult};
use crate::{CadreStorage, StorageError};
use cadre_core::InstanceStatus;

pub(crate) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CadreStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "version",
            "mutations_bump_the_version",
            mutations_bump_the_version(factory().await).await,
        ),
        TestResult::from_result(
            "version",
            "stale_version_conflicts",
            stale_version_conflicts(factory().await).await,
        ),
    ]
}

async fn mutations_bump_the_version<S: CadreStorage>(storage: S) -> Result<(), String> {
    let (def_id, step_ids) = seed_definition(&storage, "org-1", 2).await?;

    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    let instance = storage
        .insert_instance(&mut snap, make_instance(&def_id, Some(&step_ids[0])))
        .await
        .map_err(|e| e.to_string())?;
    let moved = storage
        .set_instance_step(&mut snap, &instance.id, 0, &step_ids[1])
        .await
        .map_err(|e| e.to_string())?;
    if moved.version != 1 {
        return Err(format!("expected version 1 after move, got {}", moved.version));
    }
    let completed = storage
        .set_instance_status(
            &mut snap,
            &instance.id,
            1,
            InstanceStatus::Approved,
            Some("2026-01-03T00:00:00Z".to_string()),
        )
        .await
        .map_err(|e| e.to_string())?;
    if completed.version != 2 {
        return Err(format!(
            "expected version 2 after status change, got {}",
            completed.version
        ));
    }
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

async fn stale_version_conflicts<S: CadreStorage>(storage: S) -> Result<(), String> {
    let (def_id, step_ids) = seed_definition(&storage, "org-1", 2).await?;

    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    let instance = storage
        .insert_instance(&mut snap, make_instance(&def_id, Some(&step_ids[0])))
        .await
        .map_err(|e| e.to_string())?;
    storage
        .set_instance_step(&mut snap, &instance.id, 0, &step_ids[1])
        .await
        .map_err(|e| e.to_string())?;

    // A second write that still expects version 0 must be rejected.
    match storage
        .set_instance_step(&mut snap, &instance.id, 0, &step_ids[0])
        .await
    {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        Err(other) => return Err(format!("expected ConcurrentConflict, got {}", other)),
        Ok(_) => return Err("stale write was accepted".to_string()),
    }
    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}
