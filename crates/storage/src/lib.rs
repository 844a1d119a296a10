//! cadre-storage -- storage trait, record types, and error types for cadre
//! backends, plus the in-memory reference backend and a backend-agnostic
//! conformance suite.
//!
//! Four related collections are persisted: definitions, steps, instances,
//! and history. A fifth, members, is a read-mostly directory seeded at
//! startup so that listings can join starter/performer emails and the
//! organization stats can count members.

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::MemoryStorage;
pub use record::{
    DefinitionListing, DefinitionRecord, HistoryListing, HistoryRecord, InstanceListing,
    InstanceRecord, MemberRecord, NewDefinition, NewHistoryEntry, NewInstance, NewMember, NewStep,
    StepRecord,
};
pub use traits::CadreStorage;
