use cadre_core::CoreError;
use cadre_storage::StorageError;
use thiserror::Error;

/// Typed errors raised by engine operations.
///
/// The HTTP boundary maps these to status codes: `Validation` to 400,
/// `NotFound` to 404, `Conflict` to 409, and `Storage` by variant (the
/// not-found family to 404, concurrency conflicts to 409, everything else
/// to 500 with a generic message). No operation swallows an error; a
/// failed transition aborts its snapshot.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad or missing input.
    #[error("{message}")]
    Validation { message: String },

    /// Missing or out-of-tenant-scope resource.
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// The operation contradicts current state (terminal instance,
    /// definition with live instances, concurrent writer).
    #[error("{message}")]
    Conflict { message: String },

    /// Storage failure, passed through for boundary mapping.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        EngineError::Conflict {
            message: message.into(),
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        EngineError::Validation {
            message: err.to_string(),
        }
    }
}
