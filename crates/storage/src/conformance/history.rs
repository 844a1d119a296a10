//! Ledger tests: audit entries abort with their transition and list
//! newest-first.

use std::future::Future;

use super::{make_history, make_instance, seed_definition, TestResult};
use crate::CadreStorage;

pub(crate) async fn run_history_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CadreStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "history",
            "transition_and_entry_abort_together",
            transition_and_entry_abort_together(factory().await).await,
        ),
        TestResult::from_result(
            "history",
            "entries_list_newest_first",
            entries_list_newest_first(factory().await).await,
        ),
    ]
}

async fn transition_and_entry_abort_together<S: CadreStorage>(storage: S) -> Result<(), String> {
    let (def_id, step_ids) = seed_definition(&storage, "org-1", 2).await?;
    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    let instance = storage
        .insert_instance(&mut snap, make_instance(&def_id, Some(&step_ids[0])))
        .await
        .map_err(|e| e.to_string())?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;

    // Stage a move plus its audit entry, then abort: neither may land.
    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    storage
        .set_instance_step(&mut snap, &instance.id, 0, &step_ids[1])
        .await
        .map_err(|e| e.to_string())?;
    storage
        .append_history(
            &mut snap,
            make_history(&instance.id, Some(&step_ids[1]), "2026-01-02T01:00:00Z"),
        )
        .await
        .map_err(|e| e.to_string())?;
    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;

    let stored = storage
        .get_instance(&instance.id, "org-1")
        .await
        .map_err(|e| e.to_string())?;
    if stored.current_step_id.as_deref() != Some(step_ids[0].as_str()) {
        return Err("aborted move leaked into the instance".to_string());
    }
    let history = storage
        .list_history(&instance.id)
        .await
        .map_err(|e| e.to_string())?;
    if !history.is_empty() {
        return Err("aborted history entry leaked into the ledger".to_string());
    }
    Ok(())
}

async fn entries_list_newest_first<S: CadreStorage>(storage: S) -> Result<(), String> {
    let (def_id, step_ids) = seed_definition(&storage, "org-1", 1).await?;
    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    let instance = storage
        .insert_instance(&mut snap, make_instance(&def_id, Some(&step_ids[0])))
        .await
        .map_err(|e| e.to_string())?;
    for (i, ts) in ["2026-01-02T00:00:00Z", "2026-01-02T01:00:00Z", "2026-01-02T02:00:00Z"]
        .iter()
        .enumerate()
    {
        let mut entry = make_history(&instance.id, Some(&step_ids[0]), ts);
        entry.notes = Some(format!("entry {}", i));
        storage
            .append_history(&mut snap, entry)
            .await
            .map_err(|e| e.to_string())?;
    }
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;

    let history = storage
        .list_history(&instance.id)
        .await
        .map_err(|e| e.to_string())?;
    let notes: Vec<&str> = history
        .iter()
        .filter_map(|h| h.entry.notes.as_deref())
        .collect();
    if notes != vec!["entry 2", "entry 1", "entry 0"] {
        return Err(format!("expected newest-first order, got {:?}", notes));
    }
    Ok(())
}
