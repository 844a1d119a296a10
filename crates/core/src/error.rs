use thiserror::Error;

/// Errors raised while validating domain inputs.
///
/// These are always caller mistakes (bad status string, malformed rule),
/// never internal failures; the HTTP boundary maps them to 400.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A status string outside the closed set {pending, approved, rejected}.
    #[error("invalid status '{value}', expected one of: pending, approved, rejected")]
    InvalidStatus { value: String },

    /// A conditional rule that failed validation on write.
    #[error("invalid conditional rule: {message}")]
    InvalidRule { message: String },
}
