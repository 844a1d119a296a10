use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle status of a process instance.
///
/// `Pending` is the only non-terminal state. Once an instance reaches
/// `Approved` or `Rejected` no further transition is permitted; the engine
/// rejects mutations on terminal instances rather than silently ignoring
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Pending,
    Approved,
    Rejected,
}

impl InstanceStatus {
    /// Terminal states are closed: nothing transitions out of them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstanceStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Pending => "pending",
            InstanceStatus::Approved => "approved",
            InstanceStatus::Rejected => "rejected",
        }
    }

    /// Parse a wire status, rejecting anything outside the closed set.
    pub fn parse(value: &str) -> Result<InstanceStatus, CoreError> {
        match value {
            "pending" => Ok(InstanceStatus::Pending),
            "approved" => Ok(InstanceStatus::Approved),
            "rejected" => Ok(InstanceStatus::Rejected),
            other => Err(CoreError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_the_closed_set() {
        for s in ["pending", "approved", "rejected"] {
            assert_eq!(InstanceStatus::parse(s).unwrap().as_str(), s);
        }
    }

    #[test]
    fn parse_rejects_unknown_status() {
        let err = InstanceStatus::parse("aborted").unwrap_err();
        assert!(matches!(err, CoreError::InvalidStatus { .. }));
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!InstanceStatus::Pending.is_terminal());
        assert!(InstanceStatus::Approved.is_terminal());
        assert!(InstanceStatus::Rejected.is_terminal());
    }

    #[test]
    fn serde_uses_lowercase_wire_names() {
        let json = serde_json::to_string(&InstanceStatus::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
        let back: InstanceStatus = serde_json::from_str("\"rejected\"").unwrap();
        assert_eq!(back, InstanceStatus::Rejected);
    }
}
