//! Conditional branching rules.
//!
//! A definition carries at most one rule. The rule is a single numeric
//! comparison that, when it fires, redirects advancement to the step whose
//! `order` equals `target_step_order`. Rules are validated fully on write
//! from their JSON form and never partially trusted on read: an operator
//! outside {`>`, `<`}, a non-numeric threshold, or a non-positive target
//! all fail at parse time.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Comparison operator of a threshold rule. Closed set by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleOperator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
}

impl RuleOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleOperator::GreaterThan => ">",
            RuleOperator::LessThan => "<",
        }
    }
}

impl fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-condition branching rule attached to a process definition.
///
/// The absent-rule case is `Option::<ThresholdRule>::None`; there is no
/// partially-populated rule state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub operator: RuleOperator,
    pub threshold: Decimal,
    pub target_step_order: u32,
}

impl ThresholdRule {
    /// Parse and validate a rule from its JSON form:
    /// `{"operator": ">"|"<", "threshold": <number>, "target_step_order": <int >= 1>}`.
    ///
    /// `null` means "no rule". Thresholds are accepted as JSON numbers or
    /// numeric strings and always become `Decimal`.
    pub fn from_json(value: &serde_json::Value) -> Result<Option<ThresholdRule>, CoreError> {
        if value.is_null() {
            return Ok(None);
        }
        let obj = value.as_object().ok_or_else(|| CoreError::InvalidRule {
            message: "rule must be an object or null".to_string(),
        })?;

        let operator = match obj.get("operator").and_then(|v| v.as_str()) {
            Some(">") => RuleOperator::GreaterThan,
            Some("<") => RuleOperator::LessThan,
            Some(other) => {
                return Err(CoreError::InvalidRule {
                    message: format!("operator must be '>' or '<', got '{}'", other),
                })
            }
            None => {
                return Err(CoreError::InvalidRule {
                    message: "missing 'operator'".to_string(),
                })
            }
        };

        let threshold = obj
            .get("threshold")
            .ok_or_else(|| CoreError::InvalidRule {
                message: "missing 'threshold'".to_string(),
            })
            .and_then(|v| {
                decimal_from_json(v).ok_or_else(|| CoreError::InvalidRule {
                    message: "'threshold' must be a number".to_string(),
                })
            })?;

        let target = obj
            .get("target_step_order")
            .and_then(|v| v.as_u64())
            .filter(|n| *n >= 1)
            .ok_or_else(|| CoreError::InvalidRule {
                message: "'target_step_order' must be a positive integer".to_string(),
            })?;

        Ok(Some(ThresholdRule {
            operator,
            threshold,
            target_step_order: target as u32,
        }))
    }

    /// Evaluate the rule against a value. `>` fires when `value > threshold`,
    /// `<` when `value < threshold`.
    pub fn fires(&self, value: Decimal) -> bool {
        match self.operator {
            RuleOperator::GreaterThan => value > self.threshold,
            RuleOperator::LessThan => value < self.threshold,
        }
    }
}

/// Convert a JSON value into a `Decimal`.
///
/// Accepts JSON numbers and numeric strings; anything else is `None`. Going
/// through the number's canonical string form keeps the conversion exact
/// for integers and decimal literals alike.
pub fn decimal_from_json(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_valid_gt_rule() {
        let rule = ThresholdRule::from_json(&json!({
            "operator": ">",
            "threshold": 100,
            "target_step_order": 3
        }))
        .unwrap()
        .unwrap();
        assert_eq!(rule.operator, RuleOperator::GreaterThan);
        assert_eq!(rule.threshold, Decimal::from(100));
        assert_eq!(rule.target_step_order, 3);
    }

    #[test]
    fn null_means_no_rule() {
        assert_eq!(ThresholdRule::from_json(&json!(null)).unwrap(), None);
    }

    #[test]
    fn rejects_unknown_operator() {
        let err = ThresholdRule::from_json(&json!({
            "operator": ">=",
            "threshold": 1,
            "target_step_order": 1
        }))
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRule { .. }));
    }

    #[test]
    fn rejects_zero_target_step_order() {
        let err = ThresholdRule::from_json(&json!({
            "operator": "<",
            "threshold": 1,
            "target_step_order": 0
        }))
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRule { .. }));
    }

    #[test]
    fn threshold_accepts_numeric_strings() {
        let rule = ThresholdRule::from_json(&json!({
            "operator": "<",
            "threshold": "99.5",
            "target_step_order": 2
        }))
        .unwrap()
        .unwrap();
        assert_eq!(rule.threshold, Decimal::from_str("99.5").unwrap());
    }

    #[test]
    fn gt_fires_strictly_above_threshold() {
        let rule = ThresholdRule {
            operator: RuleOperator::GreaterThan,
            threshold: Decimal::from(100),
            target_step_order: 3,
        };
        assert!(rule.fires(Decimal::from(150)));
        assert!(!rule.fires(Decimal::from(100)));
        assert!(!rule.fires(Decimal::from(50)));
    }

    #[test]
    fn lt_fires_strictly_below_threshold() {
        let rule = ThresholdRule {
            operator: RuleOperator::LessThan,
            threshold: Decimal::from(100),
            target_step_order: 3,
        };
        assert!(rule.fires(Decimal::from(50)));
        assert!(!rule.fires(Decimal::from(100)));
        assert!(!rule.fires(Decimal::from(150)));
    }
}
