//! Definition-store tests: validation, whole-list step rewrites, tenant
//! isolation, and the delete guard.

mod common;

use cadre_core::{RuleOperator, ThresholdRule};
use cadre_engine::{DefinitionPatch, EngineError, StepInput};
use rust_decimal::Decimal;

use common::{principal, seed_process, stack, steps};

#[tokio::test]
async fn create_requires_a_name() {
    let stack = stack();
    let caller = principal("org-1");
    let err = stack
        .definitions
        .create(&caller, "   ", None, None, Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }), "{err}");
}

#[tokio::test]
async fn create_numbers_steps_from_list_position() {
    let stack = stack();
    let caller = principal("org-1");
    let (_, created) = stack
        .definitions
        .create(
            &caller,
            "Onboarding",
            Some("New-hire flow".to_string()),
            None,
            steps(&["Collect documents", "Manager review", "Provision accounts"]),
        )
        .await
        .unwrap();

    let orders: Vec<u32> = created.iter().map(|s| s.order).collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert_eq!(created[1].name, "Manager review");
}

#[tokio::test]
async fn replace_steps_renumbers_densely() {
    let stack = stack();
    let caller = principal("org-1");
    let (definition, _) = seed_process(&stack, &caller, 3, None).await;

    let rewritten = stack
        .definitions
        .replace_steps(&caller, &definition.id, steps(&["Intake", "Decision"]))
        .await
        .unwrap();
    assert_eq!(rewritten.len(), 2);
    assert_eq!(
        rewritten.iter().map(|s| s.order).collect::<Vec<_>>(),
        vec![1, 2]
    );

    let (_, stored) = stack.definitions.get(&caller, &definition.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].name, "Intake");
}

#[tokio::test]
async fn update_patches_only_provided_fields() {
    let stack = stack();
    let caller = principal("org-1");
    let (definition, _) = seed_process(&stack, &caller, 2, None).await;

    let rule = ThresholdRule {
        operator: RuleOperator::GreaterThan,
        threshold: Decimal::from(500),
        target_step_order: 2,
    };
    let updated = stack
        .definitions
        .update(
            &caller,
            &definition.id,
            DefinitionPatch {
                name: None,
                description: Some(Some("Large purchases escalate".to_string())),
                rule: Some(Some(rule.clone())),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, definition.name);
    assert_eq!(updated.description.as_deref(), Some("Large purchases escalate"));
    assert_eq!(updated.rule, Some(rule));

    // Clearing the rule back off is an explicit null, not an omission.
    let cleared = stack
        .definitions
        .update(
            &caller,
            &definition.id,
            DefinitionPatch {
                rule: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.rule, None);
}

#[tokio::test]
async fn definitions_are_tenant_scoped() {
    let stack = stack();
    let caller = principal("org-a");
    let outsider = principal("org-b");
    let (definition, _) = seed_process(&stack, &caller, 2, None).await;

    assert!(stack.definitions.get(&outsider, &definition.id).await.is_err());
    assert!(stack
        .definitions
        .update(&outsider, &definition.id, DefinitionPatch::default())
        .await
        .is_err());
    assert!(stack.definitions.remove(&outsider, &definition.id).await.is_err());
    assert!(stack.definitions.list(&outsider).await.unwrap().is_empty());

    // The owner still sees it untouched.
    let (stored, _) = stack.definitions.get(&caller, &definition.id).await.unwrap();
    assert_eq!(stored.name, definition.name);
}

#[tokio::test]
async fn remove_is_refused_while_instances_reference_the_definition() {
    let stack = stack();
    let caller = principal("org-1");
    let (definition, _) = seed_process(&stack, &caller, 2, None).await;
    stack.lifecycle.start(&caller, &definition.id).await.unwrap();

    let err = stack.definitions.remove(&caller, &definition.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict { .. }), "{err}");

    // A definition with no instances deletes cleanly, steps included.
    let (unused, _) = seed_process(&stack, &caller, 2, None).await;
    stack.definitions.remove(&caller, &unused.id).await.unwrap();
    assert!(stack.definitions.get(&caller, &unused.id).await.is_err());
}

#[tokio::test]
async fn single_steps_can_be_edited_and_deleted() {
    let stack = stack();
    let caller = principal("org-1");
    let (definition, created) = seed_process(&stack, &caller, 3, None).await;

    let renamed = stack
        .definitions
        .update_step(
            &caller,
            &definition.id,
            &created[1].id,
            "Compliance review",
            Some("Second pair of eyes".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Compliance review");
    assert_eq!(renamed.order, 2);

    stack
        .definitions
        .remove_step(&caller, &definition.id, &created[0].id)
        .await
        .unwrap();
    let (_, remaining) = stack.definitions.get(&caller, &definition.id).await.unwrap();
    assert_eq!(remaining.len(), 2);
    // Deleting a step leaves an order gap; that is tolerated.
    assert_eq!(remaining[0].order, 2);
}

#[tokio::test]
async fn listings_carry_counts_and_last_run() {
    let stack = stack();
    let caller = principal("org-1");
    let (definition, _) = seed_process(&stack, &caller, 2, None).await;
    let listed = stack.definitions.list(&caller).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].step_count, 2);
    assert_eq!(listed[0].instance_count, 0);
    assert!(listed[0].last_run_at.is_none());

    stack.lifecycle.start(&caller, &definition.id).await.unwrap();
    let listed = stack.definitions.list(&caller).await.unwrap();
    assert_eq!(listed[0].instance_count, 1);
    assert!(listed[0].last_run_at.is_some());
}

#[tokio::test]
async fn empty_step_names_are_rejected() {
    let stack = stack();
    let caller = principal("org-1");
    let err = stack
        .definitions
        .create(
            &caller,
            "Procurement",
            None,
            None,
            vec![StepInput {
                name: "  ".to_string(),
                description: None,
            }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }), "{err}");
}
