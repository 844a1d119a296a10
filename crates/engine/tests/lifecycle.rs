//! End-to-end lifecycle tests against the in-memory backend.

mod common;

use cadre_core::{InstanceStatus, RuleOperator, ThresholdRule};
use cadre_engine::EngineError;
use rust_decimal::Decimal;

use common::{principal, seed_process, stack};

fn gt_rule(threshold: i64, target: u32) -> ThresholdRule {
    ThresholdRule {
        operator: RuleOperator::GreaterThan,
        threshold: Decimal::from(threshold),
        target_step_order: target,
    }
}

fn lt_rule(threshold: i64, target: u32) -> ThresholdRule {
    ThresholdRule {
        operator: RuleOperator::LessThan,
        threshold: Decimal::from(threshold),
        target_step_order: target,
    }
}

#[tokio::test]
async fn start_creates_correct_initial_state() {
    let stack = stack();
    let caller = principal("org-1");
    let (definition, steps) = seed_process(&stack, &caller, 3, None).await;

    let instance = stack.lifecycle.start(&caller, &definition.id).await.unwrap();

    assert_eq!(instance.current_step_id.as_deref(), Some(steps[0].id.as_str()));
    assert_eq!(instance.status, InstanceStatus::Pending);
    assert!(instance.completed_at.is_none());

    let history = stack.ledger.list_by_instance(&caller, &instance.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].entry.notes.as_deref(), Some("Process started"));
    assert_eq!(history[0].entry.status, InstanceStatus::Pending);
    assert_eq!(history[0].step_name.as_deref(), Some("Step 1"));
}

#[tokio::test]
async fn default_advancement_is_sequential_and_completes() {
    let stack = stack();
    let caller = principal("org-1");
    let (definition, steps) = seed_process(&stack, &caller, 3, None).await;
    let instance = stack.lifecycle.start(&caller, &definition.id).await.unwrap();

    let moved = stack
        .lifecycle
        .advance(&caller, &instance.id, Decimal::ZERO)
        .await
        .unwrap();
    assert_eq!(moved.current_step_id.as_deref(), Some(steps[1].id.as_str()));
    assert_eq!(moved.status, InstanceStatus::Pending);

    let moved = stack
        .lifecycle
        .advance(&caller, &instance.id, Decimal::ZERO)
        .await
        .unwrap();
    assert_eq!(moved.current_step_id.as_deref(), Some(steps[2].id.as_str()));

    let done = stack
        .lifecycle
        .advance(&caller, &instance.id, Decimal::ZERO)
        .await
        .unwrap();
    assert_eq!(done.status, InstanceStatus::Approved);
    assert!(done.completed_at.is_some());
    // Completion does not move the instance off its final step.
    assert_eq!(done.current_step_id.as_deref(), Some(steps[2].id.as_str()));

    let history = stack.ledger.list_by_instance(&caller, &instance.id).await.unwrap();
    assert_eq!(history[0].entry.notes.as_deref(), Some("Process completed"));
    assert_eq!(history[0].entry.status, InstanceStatus::Approved);
}

#[tokio::test]
async fn gt_rule_skips_to_its_target_step() {
    let stack = stack();
    let caller = principal("org-1");
    let (definition, steps) = seed_process(&stack, &caller, 4, Some(gt_rule(100, 3))).await;

    // value above the threshold: jump from step 1 straight to step 3
    let instance = stack.lifecycle.start(&caller, &definition.id).await.unwrap();
    let moved = stack
        .lifecycle
        .advance(&caller, &instance.id, Decimal::from(150))
        .await
        .unwrap();
    assert_eq!(moved.current_step_id.as_deref(), Some(steps[2].id.as_str()));

    // value below the threshold: default path to step 2
    let instance = stack.lifecycle.start(&caller, &definition.id).await.unwrap();
    let moved = stack
        .lifecycle
        .advance(&caller, &instance.id, Decimal::from(50))
        .await
        .unwrap();
    assert_eq!(moved.current_step_id.as_deref(), Some(steps[1].id.as_str()));

    let history = stack.ledger.list_by_instance(&caller, &instance.id).await.unwrap();
    assert_eq!(history[0].entry.notes.as_deref(), Some("Moved to step: Step 2"));
}

#[tokio::test]
async fn lt_rule_mirrors_gt() {
    let stack = stack();
    let caller = principal("org-1");
    let (definition, steps) = seed_process(&stack, &caller, 4, Some(lt_rule(100, 3))).await;

    let instance = stack.lifecycle.start(&caller, &definition.id).await.unwrap();
    let moved = stack
        .lifecycle
        .advance(&caller, &instance.id, Decimal::from(50))
        .await
        .unwrap();
    assert_eq!(moved.current_step_id.as_deref(), Some(steps[2].id.as_str()));

    let instance = stack.lifecycle.start(&caller, &definition.id).await.unwrap();
    let moved = stack
        .lifecycle
        .advance(&caller, &instance.id, Decimal::from(150))
        .await
        .unwrap();
    assert_eq!(moved.current_step_id.as_deref(), Some(steps[1].id.as_str()));
}

#[tokio::test]
async fn missing_rule_target_falls_back_to_default_advancement() {
    let stack = stack();
    let caller = principal("org-1");
    // Rule targets step 9, which does not exist.
    let (definition, steps) = seed_process(&stack, &caller, 3, Some(gt_rule(10, 9))).await;
    let instance = stack.lifecycle.start(&caller, &definition.id).await.unwrap();

    let moved = stack
        .lifecycle
        .advance(&caller, &instance.id, Decimal::from(999))
        .await
        .unwrap();
    assert_eq!(moved.current_step_id.as_deref(), Some(steps[1].id.as_str()));
    assert_eq!(moved.status, InstanceStatus::Pending);
}

#[tokio::test]
async fn terminal_states_are_closed() {
    let stack = stack();
    let caller = principal("org-1");
    let (definition, steps) = seed_process(&stack, &caller, 2, None).await;
    let instance = stack.lifecycle.start(&caller, &definition.id).await.unwrap();

    let rejected = stack
        .lifecycle
        .set_status(
            &caller,
            &instance.id,
            InstanceStatus::Rejected,
            Some("budget cut".to_string()),
        )
        .await
        .unwrap();
    assert!(rejected.completed_at.is_some());

    // Neither advance nor a status override may touch a terminal instance.
    let err = stack
        .lifecycle
        .advance(&caller, &instance.id, Decimal::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict { .. }), "{err}");

    let err = stack
        .lifecycle
        .set_status(&caller, &instance.id, InstanceStatus::Pending, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict { .. }), "{err}");

    let unchanged = stack.lifecycle.get(&caller, &instance.id).await.unwrap();
    assert_eq!(unchanged.status, InstanceStatus::Rejected);
    assert_eq!(
        unchanged.current_step_id.as_deref(),
        Some(steps[0].id.as_str())
    );
}

#[tokio::test]
async fn every_transition_is_audited_one_to_one() {
    let stack = stack();
    let caller = principal("org-1");
    let (definition, _) = seed_process(&stack, &caller, 5, None).await;
    let instance = stack.lifecycle.start(&caller, &definition.id).await.unwrap();

    stack
        .lifecycle
        .advance(&caller, &instance.id, Decimal::ZERO)
        .await
        .unwrap();
    stack
        .lifecycle
        .advance(&caller, &instance.id, Decimal::ZERO)
        .await
        .unwrap();
    stack
        .lifecycle
        .set_status(&caller, &instance.id, InstanceStatus::Approved, None)
        .await
        .unwrap();

    // N mutations plus the start entry, newest first, timestamps
    // non-decreasing in causal order.
    let history = stack.ledger.list_by_instance(&caller, &instance.id).await.unwrap();
    assert_eq!(history.len(), 4);
    let stamps: Vec<&str> = history
        .iter()
        .rev()
        .map(|h| h.entry.performed_at.as_str())
        .collect();
    assert!(
        stamps.windows(2).all(|w| w[0] <= w[1]),
        "timestamps regressed: {stamps:?}"
    );
    assert_eq!(history[3].entry.notes.as_deref(), Some("Process started"));
}

#[tokio::test]
async fn start_rejects_zero_step_definitions() {
    let stack = stack();
    let caller = principal("org-1");
    let (definition, _) = seed_process(&stack, &caller, 0, None).await;

    let err = stack.lifecycle.start(&caller, &definition.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }), "{err}");
}

#[tokio::test]
async fn start_rejects_inactive_definitions() {
    let stack = stack();
    let caller = principal("org-1");
    let (definition, _) = seed_process(&stack, &caller, 2, None).await;
    stack
        .definitions
        .toggle_active(&caller, &definition.id)
        .await
        .unwrap();

    let err = stack.lifecycle.start(&caller, &definition.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }), "{err}");
}

#[tokio::test]
async fn instances_are_tenant_scoped() {
    let stack = stack();
    let caller = principal("org-1");
    let outsider = principal("org-2");
    let (definition, _) = seed_process(&stack, &caller, 2, None).await;
    let instance = stack.lifecycle.start(&caller, &definition.id).await.unwrap();

    let err = stack.lifecycle.get(&outsider, &instance.id).await.unwrap_err();
    assert!(
        matches!(err, EngineError::Storage(_)),
        "cross-tenant get must read as not found: {err}"
    );
    let err = stack
        .lifecycle
        .advance(&outsider, &instance.id, Decimal::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)), "{err}");
    assert!(stack.lifecycle.list(&outsider).await.unwrap().is_empty());
}

#[tokio::test]
async fn set_status_records_notes_against_the_current_step() {
    let stack = stack();
    let caller = principal("org-1");
    let (definition, steps) = seed_process(&stack, &caller, 3, None).await;
    let instance = stack.lifecycle.start(&caller, &definition.id).await.unwrap();
    stack
        .lifecycle
        .advance(&caller, &instance.id, Decimal::ZERO)
        .await
        .unwrap();

    stack
        .lifecycle
        .set_status(
            &caller,
            &instance.id,
            InstanceStatus::Rejected,
            Some("missing receipts".to_string()),
        )
        .await
        .unwrap();

    let history = stack.ledger.list_by_instance(&caller, &instance.id).await.unwrap();
    let entry = &history[0];
    assert_eq!(entry.entry.status, InstanceStatus::Rejected);
    assert_eq!(entry.entry.notes.as_deref(), Some("missing receipts"));
    assert_eq!(entry.entry.step_id.as_deref(), Some(steps[1].id.as_str()));
}
