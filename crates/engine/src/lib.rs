//! cadre-engine -- the executable side of cadre: definition store,
//! instance lifecycle engine, execution-history ledger, read-side
//! projections, and the history-to-text summary collaborator.
//!
//! Every service is generic over a [`cadre_storage::CadreStorage`] backend
//! handed in at construction; there is no ambient storage handle. Each
//! operation is one short read-modify-write unit: read committed state,
//! stage the mutation plus its audit entry in a snapshot, commit or abort
//! both together.

mod clock;
pub mod definitions;
pub mod error;
pub mod ledger;
pub mod lifecycle;
mod principal;
pub mod projection;
pub mod summary;

pub use definitions::{DefinitionPatch, DefinitionService, StepInput};
pub use error::EngineError;
pub use ledger::LedgerService;
pub use lifecycle::LifecycleEngine;
pub use principal::Principal;
pub use projection::{OrganizationStats, ProjectionService};
pub use summary::{AnthropicClient, SummaryClient, SummaryError, SummaryReport, SummaryService};
