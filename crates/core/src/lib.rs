//! cadre-core -- domain model and transition evaluator for the cadre
//! process engine.
//!
//! This crate holds the pieces of the system with real state-machine
//! semantics: the closed instance-status set, the conditional branching
//! rule, and the pure planner that computes where an instance moves next.
//! Everything here is synchronous and storage-free; the engine crate wires
//! these decisions to persistence.

pub mod error;
pub mod rule;
pub mod status;
pub mod transition;

pub use error::CoreError;
pub use rule::{RuleOperator, ThresholdRule};
pub use status::InstanceStatus;
pub use transition::{StepRef, StepSequence, TransitionPlan, TransitionWarning};
