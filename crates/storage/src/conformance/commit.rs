//! Atomic-commit tests: multi-record snapshots land all-or-nothing.

use std::future::Future;

use super::{make_definition, make_history, make_instance, make_steps, TestResult};
use crate::CadreStorage;

pub(crate) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CadreStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "commit",
            "multi_record_snapshot_commits_atomically",
            multi_record_snapshot_commits_atomically(factory().await).await,
        ),
        TestResult::from_result(
            "commit",
            "step_replacement_is_atomic",
            step_replacement_is_atomic(factory().await).await,
        ),
    ]
}

async fn multi_record_snapshot_commits_atomically<S: CadreStorage>(
    storage: S,
) -> Result<(), String> {
    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    let def = storage
        .insert_definition(&mut snap, make_definition("org-1"))
        .await
        .map_err(|e| e.to_string())?;
    let steps = storage
        .insert_steps(&mut snap, &def.id, make_steps(2))
        .await
        .map_err(|e| e.to_string())?;
    let instance = storage
        .insert_instance(&mut snap, make_instance(&def.id, Some(&steps[0].id)))
        .await
        .map_err(|e| e.to_string())?;
    storage
        .append_history(
            &mut snap,
            make_history(&instance.id, Some(&steps[0].id), "2026-01-02T00:00:00Z"),
        )
        .await
        .map_err(|e| e.to_string())?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;

    storage
        .get_definition(&def.id, "org-1")
        .await
        .map_err(|e| e.to_string())?;
    storage
        .get_instance(&instance.id, "org-1")
        .await
        .map_err(|e| e.to_string())?;
    let history = storage
        .list_history(&instance.id)
        .await
        .map_err(|e| e.to_string())?;
    if history.len() != 1 {
        return Err(format!("expected 1 history entry, got {}", history.len()));
    }
    Ok(())
}

async fn step_replacement_is_atomic<S: CadreStorage>(storage: S) -> Result<(), String> {
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

    // Rewrite the list in one snapshot, then abort: the old list survives.
    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    storage
        .delete_steps(&mut snap, &def.id)
        .await
        .map_err(|e| e.to_string())?;
    storage
        .insert_steps(&mut snap, &def.id, make_steps(1))
        .await
        .map_err(|e| e.to_string())?;
    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;

    let steps = storage.list_steps(&def.id).await.map_err(|e| e.to_string())?;
    if steps.len() != 3 {
        return Err(format!(
            "aborted rewrite leaked: expected 3 steps, got {}",
            steps.len()
        ));
    }
    Ok(())
}
