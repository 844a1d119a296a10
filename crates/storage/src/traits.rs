use async_trait::async_trait;
use cadre_core::InstanceStatus;

use crate::error::StorageError;
use crate::record::{
    DefinitionListing, DefinitionRecord, HistoryListing, HistoryRecord, InstanceListing,
    InstanceRecord, MemberRecord, NewDefinition, NewHistoryEntry, NewInstance, NewMember, NewStep,
    StepRecord,
};

/// The storage trait for cadre backends.
///
/// A `CadreStorage` implementation provides durable, transactional storage
/// for process definitions, steps, instances, execution history, and the
/// member directory.
///
/// ## Snapshot Semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing
/// an in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()` — start a transaction, returns a `Snapshot`
/// 2. Call mutating methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)` — commit and consume the transaction
///    OR `abort_snapshot(snapshot)` — roll back and consume the transaction
///
/// Uncommitted writes are invisible to queries. If a `Snapshot` is dropped
/// without committing, the underlying transaction MUST be rolled back.
///
/// ## Audit Coupling
///
/// Every instance mutation (`set_instance_step`, `set_instance_status`) is
/// expected to be paired with exactly one `append_history` call in the SAME
/// snapshot. Committing them together is what enforces the ledger
/// invariant: no instance transition without a matching audit record.
///
/// ## OCC Conflict Detection
///
/// The instance mutations perform an optimistic concurrency check against
/// `expected_version`. If the stored version differs, the method returns
/// `Err(StorageError::ConcurrentConflict { .. })` and the snapshot should
/// be aborted.
///
/// ## Tenant Scoping
///
/// Queries on tenant-owned resources take the caller's organization id and
/// treat out-of-tenant rows as absent; "belongs to another organization"
/// and "does not exist" are indistinguishable to callers.
#[async_trait]
pub trait CadreStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ──────────────────────────────────────────────────

    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Definition mutations (within snapshot) ──────────────────────────────

    /// Insert a definition; the backend assigns its id.
    async fn insert_definition(
        &self,
        snapshot: &mut Self::Snapshot,
        definition: NewDefinition,
    ) -> Result<DefinitionRecord, StorageError>;

    /// Replace a stored definition's fields wholesale, scoped to `organization_id`.
    async fn update_definition(
        &self,
        snapshot: &mut Self::Snapshot,
        organization_id: &str,
        record: DefinitionRecord,
    ) -> Result<DefinitionRecord, StorageError>;

    /// Delete a definition and cascade to its steps, scoped to
    /// `organization_id`. Callers are responsible for refusing the delete
    /// while instances still reference the definition.
    async fn delete_definition(
        &self,
        snapshot: &mut Self::Snapshot,
        organization_id: &str,
        definition_id: &str,
    ) -> Result<(), StorageError>;

    // ── Step mutations (within snapshot) ────────────────────────────────────

    /// Insert a batch of steps for a definition; ids assigned by the backend.
    async fn insert_steps(
        &self,
        snapshot: &mut Self::Snapshot,
        definition_id: &str,
        steps: Vec<NewStep>,
    ) -> Result<Vec<StepRecord>, StorageError>;

    /// Remove every step of a definition (the first half of a whole-list
    /// rewrite).
    async fn delete_steps(
        &self,
        snapshot: &mut Self::Snapshot,
        definition_id: &str,
    ) -> Result<(), StorageError>;

    /// Replace a stored step's fields wholesale.
    async fn update_step(
        &self,
        snapshot: &mut Self::Snapshot,
        record: StepRecord,
    ) -> Result<StepRecord, StorageError>;

    /// Delete a single step.
    async fn delete_step(
        &self,
        snapshot: &mut Self::Snapshot,
        definition_id: &str,
        step_id: &str,
    ) -> Result<(), StorageError>;

    // ── Instance mutations (within snapshot) ────────────────────────────────

    /// Insert an instance at status `pending`, version 0.
    async fn insert_instance(
        &self,
        snapshot: &mut Self::Snapshot,
        instance: NewInstance,
    ) -> Result<InstanceRecord, StorageError>;

    /// Move an instance to a new current step (OCC-guarded). Returns the
    /// updated record with its bumped version.
    async fn set_instance_step(
        &self,
        snapshot: &mut Self::Snapshot,
        instance_id: &str,
        expected_version: i64,
        step_id: &str,
    ) -> Result<InstanceRecord, StorageError>;

    /// Set an instance's status and completion time (OCC-guarded).
    async fn set_instance_status(
        &self,
        snapshot: &mut Self::Snapshot,
        instance_id: &str,
        expected_version: i64,
        status: InstanceStatus,
        completed_at: Option<String>,
    ) -> Result<InstanceRecord, StorageError>;

    // ── Ledger (within snapshot; insert-only) ───────────────────────────────

    /// Append one history entry. There is deliberately no update or delete
    /// counterpart anywhere on this trait.
    async fn append_history(
        &self,
        snapshot: &mut Self::Snapshot,
        entry: NewHistoryEntry,
    ) -> Result<HistoryRecord, StorageError>;

    // ── Member directory (within snapshot) ──────────────────────────────────

    async fn insert_member(
        &self,
        snapshot: &mut Self::Snapshot,
        member: NewMember,
    ) -> Result<MemberRecord, StorageError>;

    // ── Queries (outside snapshot, against committed state) ─────────────────

    async fn get_definition(
        &self,
        definition_id: &str,
        organization_id: &str,
    ) -> Result<DefinitionRecord, StorageError>;

    /// Definitions of an organization with step/instance counts and the
    /// most recent instance start, newest-created first.
    async fn list_definitions(
        &self,
        organization_id: &str,
    ) -> Result<Vec<DefinitionListing>, StorageError>;

    /// Steps of a definition ordered by `order` ascending.
    async fn list_steps(&self, definition_id: &str) -> Result<Vec<StepRecord>, StorageError>;

    /// An instance, scoped through its owning definition's organization.
    async fn get_instance(
        &self,
        instance_id: &str,
        organization_id: &str,
    ) -> Result<InstanceRecord, StorageError>;

    /// Instances of an organization joined with definition name, current
    /// step name, and starter email, newest-started first.
    async fn list_instances(
        &self,
        organization_id: &str,
    ) -> Result<Vec<InstanceListing>, StorageError>;

    /// How many instances reference a definition (live-reference guard for
    /// deletes).
    async fn count_instances_for_definition(
        &self,
        definition_id: &str,
    ) -> Result<usize, StorageError>;

    /// History of an instance, newest-first by `performed_at` (insertion
    /// order breaks ties).
    async fn list_history(&self, instance_id: &str) -> Result<Vec<HistoryListing>, StorageError>;

    async fn list_members(
        &self,
        organization_id: &str,
    ) -> Result<Vec<MemberRecord>, StorageError>;

    async fn count_members(&self, organization_id: &str) -> Result<usize, StorageError>;
}
