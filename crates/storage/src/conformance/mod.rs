//! Conformance test suite for `CadreStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `CadreStorage` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Initialization**: record creation, id assignment, defaults
//! - **Snapshot isolation**: uncommitted writes invisible, aborts discarded
//! - **Atomic commit**: all-or-nothing semantics for multi-record snapshots
//! - **Version validation / OCC**: optimistic concurrency conflict detection
//! - **Ledger coupling**: instance mutations and history entries commit and
//!   abort together; the ledger is insert-only and lists newest-first
//! - **Tenant scoping**: out-of-tenant reads and writes behave as not-found
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function
//! that creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use cadre_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod commit;
mod history;
mod init;
mod snapshot;
mod tenancy;
mod version;

use std::fmt;
use std::future::Future;

use crate::record::{NewDefinition, NewHistoryEntry, NewInstance, NewStep};
use crate::CadreStorage;
use cadre_core::InstanceStatus;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "init", "snapshot", "commit").
    pub category: String,
    /// Test name (e.g. "uncommitted_writes_are_invisible").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self {
                category: category.to_string(),
                name: name.to_string(),
                passed: true,
                message: None,
            },
            Err(msg) => Self {
                category: category.to_string(),
                name: name.to_string(),
                passed: false,
                message: Some(msg),
            },
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: CadreStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(init::run_init_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(history::run_history_tests(&factory).await);
    results.extend(tenancy::run_tenancy_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ─────────────────────

fn make_definition(org: &str) -> NewDefinition {
    NewDefinition {
        organization_id: org.to_string(),
        name: "Purchase approval".to_string(),
        description: Some("Routes purchase requests".to_string()),
        rule: None,
        created_by: "user-1".to_string(),
        created_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

fn make_steps(count: u32) -> Vec<NewStep> {
    (1..=count)
        .map(|i| NewStep {
            order: i,
            name: format!("Review {}", i),
            description: None,
        })
        .collect()
}

fn make_instance(definition_id: &str, step_id: Option<&str>) -> NewInstance {
    NewInstance {
        definition_id: definition_id.to_string(),
        current_step_id: step_id.map(|s| s.to_string()),
        started_by: "user-1".to_string(),
        started_at: "2026-01-02T00:00:00Z".to_string(),
    }
}

fn make_history(instance_id: &str, step_id: Option<&str>, performed_at: &str) -> NewHistoryEntry {
    NewHistoryEntry {
        instance_id: instance_id.to_string(),
        step_id: step_id.map(|s| s.to_string()),
        status: InstanceStatus::Pending,
        notes: Some("Process started".to_string()),
        performed_by: Some("user-1".to_string()),
        performed_at: performed_at.to_string(),
    }
}

/// Seed one definition with `steps` steps and commit, returning the ids.
async fn seed_definition<S: CadreStorage>(
    storage: &S,
    org: &str,
    steps: u32,
) -> Result<(String, Vec<String>), String> {
    let mut snap = storage.begin_snapshot().await.map_err(|e| e.to_string())?;
    let def = storage
        .insert_definition(&mut snap, make_definition(org))
        .await
        .map_err(|e| e.to_string())?;
    let created = storage
        .insert_steps(&mut snap, &def.id, make_steps(steps))
        .await
        .map_err(|e| e.to_string())?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| e.to_string())?;
    Ok((def.id, created.into_iter().map(|s| s.id).collect()))
}
