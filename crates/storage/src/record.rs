use cadre_core::{InstanceStatus, ThresholdRule};
use serde::{Deserialize, Serialize};

/// A process definition as stored in the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionRecord {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub description: Option<String>,
    /// At most one branching rule; `None` means sequential advancement only.
    pub rule: Option<ThresholdRule>,
    pub active: bool,
    pub created_by: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
}

/// One ordered stage of a definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: String,
    pub definition_id: String,
    /// 1-based position, unique within the definition.
    pub order: u32,
    pub name: String,
    pub description: Option<String>,
}

/// One live execution of a definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: String,
    pub definition_id: String,
    /// Null only transiently; a pending instance always points at a step.
    pub current_step_id: Option<String>,
    pub status: InstanceStatus,
    pub started_by: String,
    /// ISO 8601 / RFC 3339 timestamp string. Immutable after creation.
    pub started_at: String,
    /// Set exactly when status leaves `pending`; immutable afterwards.
    pub completed_at: Option<String>,
    /// Optimistic-concurrency counter, bumped on every mutation.
    pub version: i64,
}

/// One append-only audit entry. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub instance_id: String,
    /// The step active at the time of the entry, when one applies.
    pub step_id: Option<String>,
    pub status: InstanceStatus,
    pub notes: Option<String>,
    /// None for system-generated entries.
    pub performed_by: Option<String>,
    /// ISO 8601 / RFC 3339 timestamp string, set at insert.
    pub performed_at: String,
}

/// A member of an organization, seeded from the serve config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: String,
    pub email: String,
    pub organization_id: String,
    pub role: String,
}

// ── Insert inputs (ids and derived fields assigned by the backend) ──────────

#[derive(Debug, Clone)]
pub struct NewDefinition {
    pub organization_id: String,
    pub name: String,
    pub description: Option<String>,
    pub rule: Option<ThresholdRule>,
    pub created_by: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewStep {
    pub order: u32,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewInstance {
    pub definition_id: String,
    pub current_step_id: Option<String>,
    pub started_by: String,
    pub started_at: String,
}

#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub instance_id: String,
    pub step_id: Option<String>,
    pub status: InstanceStatus,
    pub notes: Option<String>,
    pub performed_by: Option<String>,
    pub performed_at: String,
}

#[derive(Debug, Clone)]
pub struct NewMember {
    /// Identity assigned by the auth collaborator, not by the backend; the
    /// ledger's `performed_by` values join against it.
    pub user_id: String,
    pub email: String,
    pub organization_id: String,
    pub role: String,
}

// ── Joined read-side listings ───────────────────────────────────────────────

/// A definition with its aggregate counters, for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct DefinitionListing {
    #[serde(flatten)]
    pub definition: DefinitionRecord,
    pub step_count: usize,
    pub instance_count: usize,
    pub last_run_at: Option<String>,
}

/// An instance joined with its definition name, current step name, and
/// starter email.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceListing {
    #[serde(flatten)]
    pub instance: InstanceRecord,
    pub process_name: String,
    pub current_step_name: Option<String>,
    pub started_by_email: Option<String>,
}

/// A history entry joined with its step name and performer email.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryListing {
    #[serde(flatten)]
    pub entry: HistoryRecord,
    pub step_name: Option<String>,
    pub performed_by_email: Option<String>,
}
