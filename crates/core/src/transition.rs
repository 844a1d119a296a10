//! Instance advancement as a pure state-machine walk.
//!
//! Given the ordered step list of a definition, the instance's current
//! position, the optional branching rule, and the caller-supplied value,
//! [`plan`] computes the single next move: either advance to a concrete
//! step or complete the instance. The two outcomes are mutually exclusive
//! and the function has no side effects; the engine is responsible for
//! persisting the move and its audit entry atomically.
//!
//! Key invariant: positions are resolved through an explicit order-to-index
//! map, so "the rule targets a step that no longer exists" is a handled
//! branch (fall back to default advancement, surface a warning), never a
//! silent `-1`.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::rule::ThresholdRule;

/// The slice of a step the planner needs: identity, position, display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRef {
    pub id: String,
    pub order: u32,
    pub name: String,
}

/// An ordered step list with an index-by-order map.
///
/// Construction sorts by `order`, so callers may pass steps in any
/// sequence. Orders are expected to be unique within one definition; on a
/// duplicate the later entry wins the index slot, matching last-write-wins
/// storage behavior.
#[derive(Debug, Clone)]
pub struct StepSequence {
    steps: Vec<StepRef>,
    by_order: BTreeMap<u32, usize>,
}

impl StepSequence {
    pub fn new(mut steps: Vec<StepRef>) -> Self {
        steps.sort_by_key(|s| s.order);
        let by_order = steps
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.order, idx))
            .collect();
        StepSequence { steps, by_order }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// The entry step of the definition (lowest `order`).
    pub fn first(&self) -> Option<&StepRef> {
        self.steps.first()
    }

    pub fn get(&self, index: usize) -> Option<&StepRef> {
        self.steps.get(index)
    }

    fn index_of_id(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    fn index_of_order(&self, order: u32) -> Option<usize> {
        self.by_order.get(&order).copied()
    }
}

/// Outcome of planning one advancement. Exactly one variant per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionPlan {
    /// Move to this step; status stays pending.
    Advance { next: StepRef },
    /// No next step exists: the instance completes as approved.
    Complete,
}

/// Non-fatal conditions surfaced alongside a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionWarning {
    /// The rule fired but no step carries its `target_step_order`; default
    /// advancement was used instead.
    MissingRuleTarget { target_step_order: u32 },
}

/// Compute the next position for an instance.
///
/// Semantics:
/// - the current index is located by step identity; an unknown or absent
///   current step counts as "before step 1", so the default next index is 0;
/// - otherwise the default next index is current + 1;
/// - if a rule is present and fires for `value`, the next index is
///   overridden with the index of the step whose `order` equals the rule's
///   target; a missing target falls back to the default and reports
///   [`TransitionWarning::MissingRuleTarget`];
/// - a next index past the end of the list completes the instance.
pub fn plan(
    steps: &StepSequence,
    current_step_id: Option<&str>,
    rule: Option<&ThresholdRule>,
    value: Decimal,
) -> (TransitionPlan, Option<TransitionWarning>) {
    let current_index = current_step_id.and_then(|id| steps.index_of_id(id));
    let mut next_index = match current_index {
        Some(idx) => idx + 1,
        None => 0,
    };
    let mut warning = None;

    if let Some(rule) = rule {
        if rule.fires(value) {
            match steps.index_of_order(rule.target_step_order) {
                Some(target_index) => next_index = target_index,
                None => {
                    warning = Some(TransitionWarning::MissingRuleTarget {
                        target_step_order: rule.target_step_order,
                    });
                }
            }
        }
    }

    let plan = match steps.get(next_index) {
        Some(step) => TransitionPlan::Advance { next: step.clone() },
        None => TransitionPlan::Complete,
    };
    (plan, warning)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleOperator;

    fn seq(n: u32) -> StepSequence {
        StepSequence::new(
            (1..=n)
                .map(|i| StepRef {
                    id: format!("step-{}", i),
                    order: i,
                    name: format!("Step {}", i),
                })
                .collect(),
        )
    }

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

    /// The id the plan advances to, or panic on `Complete`.
    fn advanced_to(plan: &TransitionPlan) -> &str {
        match plan {
            TransitionPlan::Advance { next } => &next.id,
            TransitionPlan::Complete => panic!("expected Advance, got Complete"),
        }
    }

    #[test]
    fn default_advancement_is_sequential() {
        let steps = seq(3);
        let (plan, warning) = plan(&steps, Some("step-1"), None, Decimal::ZERO);
        assert_eq!(advanced_to(&plan), "step-2");
        assert!(warning.is_none());

        let (plan, _) = super::plan(&steps, Some("step-2"), None, Decimal::ZERO);
        assert_eq!(advanced_to(&plan), "step-3");
    }

    #[test]
    fn advancing_past_the_last_step_completes() {
        let steps = seq(3);
        let (plan, warning) = plan(&steps, Some("step-3"), None, Decimal::ZERO);
        assert_eq!(plan, TransitionPlan::Complete);
        assert!(warning.is_none());
    }

    #[test]
    fn unknown_current_step_counts_as_before_step_one() {
        let steps = seq(3);
        let (plan, _) = plan(&steps, Some("step-gone"), None, Decimal::ZERO);
        assert_eq!(advanced_to(&plan), "step-1");

        let (plan, _) = super::plan(&steps, None, None, Decimal::ZERO);
        assert_eq!(advanced_to(&plan), "step-1");
    }

    #[test]
    fn gt_rule_jumps_to_target_when_it_fires() {
        let steps = seq(4);
        let rule = gt_rule(100, 3);
        let (plan, warning) = plan(&steps, Some("step-1"), Some(&rule), Decimal::from(150));
        // step 2 is skipped entirely
        assert_eq!(advanced_to(&plan), "step-3");
        assert!(warning.is_none());
    }

    #[test]
    fn gt_rule_takes_default_path_when_it_does_not_fire() {
        let steps = seq(4);
        let rule = gt_rule(100, 3);
        let (plan, _) = plan(&steps, Some("step-1"), Some(&rule), Decimal::from(50));
        assert_eq!(advanced_to(&plan), "step-2");
    }

    #[test]
    fn lt_rule_mirrors_gt() {
        let steps = seq(4);
        let rule = lt_rule(100, 3);

        let (plan, _) = plan(&steps, Some("step-1"), Some(&rule), Decimal::from(50));
        assert_eq!(advanced_to(&plan), "step-3");

        let (plan, _) = super::plan(&steps, Some("step-1"), Some(&rule), Decimal::from(150));
        assert_eq!(advanced_to(&plan), "step-2");
    }

    #[test]
    fn rule_can_retarget_without_completing() {
        let steps = seq(2);
        let rule = gt_rule(10, 2);
        // Walking off the end completes...
        let (plan, _) = plan(&steps, Some("step-2"), None, Decimal::ZERO);
        assert_eq!(plan, TransitionPlan::Complete);
        // ...but firing onto the final step from step 1 advances to it.
        let (plan, _) = super::plan(&steps, Some("step-1"), Some(&rule), Decimal::from(11));
        assert_eq!(advanced_to(&plan), "step-2");
    }

    #[test]
    fn missing_rule_target_falls_back_to_default_with_warning() {
        let steps = seq(3);
        let rule = gt_rule(100, 9);
        let (plan, warning) = plan(&steps, Some("step-1"), Some(&rule), Decimal::from(150));
        assert_eq!(advanced_to(&plan), "step-2");
        assert_eq!(
            warning,
            Some(TransitionWarning::MissingRuleTarget {
                target_step_order: 9
            })
        );
    }

    #[test]
    fn empty_sequence_always_completes() {
        let steps = StepSequence::new(Vec::new());
        let (plan, _) = plan(&steps, None, None, Decimal::ZERO);
        assert_eq!(plan, TransitionPlan::Complete);
    }

    #[test]
    fn sequence_sorts_out_of_order_input() {
        let steps = StepSequence::new(vec![
            StepRef {
                id: "b".into(),
                order: 2,
                name: "Second".into(),
            },
            StepRef {
                id: "a".into(),
                order: 1,
                name: "First".into(),
            },
        ]);
        assert_eq!(steps.first().unwrap().id, "a");
        let (plan, _) = plan(&steps, Some("a"), None, Decimal::ZERO);
        assert_eq!(advanced_to(&plan), "b");
    }
}
