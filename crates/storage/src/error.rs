/// All errors that can be returned by a CadreStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No definition with this id visible to the caller's organization.
    /// Out-of-tenant lookups deliberately collapse into this variant.
    #[error("definition not found: {definition_id}")]
    DefinitionNotFound { definition_id: String },

    /// No step with this id under the given definition.
    #[error("step not found: {step_id}")]
    StepNotFound { step_id: String },

    /// No instance with this id visible to the caller's organization.
    #[error("instance not found: {instance_id}")]
    InstanceNotFound { instance_id: String },

    /// Optimistic concurrency check failed: another writer moved the
    /// instance past the expected version.
    #[error("concurrent conflict on instance {instance_id}: expected version {expected_version}")]
    ConcurrentConflict {
        instance_id: String,
        expected_version: i64,
    },

    /// Backend-specific failure (connection loss, corruption, ...).
    #[error("storage backend error: {message}")]
    Backend { message: String },
}
