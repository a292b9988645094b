// ⛔ Canon Errors - Fail fast, never auto-recover
// Every mutating entry point of the registry and the timeline returns these.

use thiserror::Error;

/// Errors raised by the entity registry and the timeline manager.
///
/// These are data/programming errors, not transient failures: nothing here
/// is retried and nothing is swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonError {
    /// Malformed entity at construction or insertion time
    #[error("{0}")]
    InvalidEntity(String),

    /// Anchor id matches neither `T<n>` nor `T<n>-<LABEL>`
    #[error("Invalid anchor_id format: {0}")]
    InvalidAnchorFormat(String),

    #[error("Entity already exists: {0}")]
    DuplicateEntity(String),

    #[error("Anchor {0} already exists")]
    DuplicateAnchor(String),

    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// Attempted mutation or deletion of an immutable record
    #[error("{0}")]
    ImmutableViolation(String),
}

impl CanonError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        CanonError::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn immutable(action: &str, kind: &str, key: &str) -> Self {
        CanonError::ImmutableViolation(format!("Cannot {} immutable {}: {}", action, kind, key))
    }
}

pub type Result<T> = std::result::Result<T, CanonError>;
