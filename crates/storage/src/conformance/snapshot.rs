//! Snapshot isolation tests: uncommitted writes invisible, aborts discarded.

use std::future::Future;

use super::{make_definition, TestResult};
use crate::CadreStorage;

pub(crate) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CadreStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "snapshot",
            "uncommitted_writes_are_invisible",
            uncommitted_writes_are_invisible(factory().await).await,
        ),
        TestResult::from_result(
            "snapshot",
            "aborted_writes_are_discarded",
            aborted_writes_are_discarded(factory().await).await,
        ),
        TestResult::from_result(
            "snapshot",
            "committed_writes_are_visible",
            committed_writes_are_visible(factory().await).await,
        ),
    ]
}

async fn uncommitted_writes_are_invisible<S: CadreStorage>(storage: S) -> Result<(), String> {
    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    let def = storage
        .insert_definition(&mut snap, make_definition("org-1"))
        .await
        .map_err(|e| e.to_string())?;

    if storage.get_definition(&def.id, "org-1").await.is_ok() {
        return Err("definition visible before commit".to_string());
    }
    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

async fn aborted_writes_are_discarded<S: CadreStorage>(storage: S) -> Result<(), String> {
    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    let def = storage
        .insert_definition(&mut snap, make_definition("org-1"))
        .await
        .map_err(|e| e.to_string())?;
    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;

    if storage.get_definition(&def.id, "org-1").await.is_ok() {
        return Err("definition survived an abort".to_string());
    }
    Ok(())
}

async fn committed_writes_are_visible<S: CadreStorage>(storage: S) -> Result<(), String> {
    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    let def = storage
        .insert_definition(&mut snap, make_definition("org-1"))
        .await
        .map_err(|e| e.to_string())?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;

    storage
        .get_definition(&def.id, "org-1")
        .await
        .map_err(|e| format!("definition missing after commit: {}", e))?;
    Ok(())
}
