//! Error taxonomy shared by every layer of the plot viewer

use thiserror::Error;

/// Errors surfaced by the core operations and the persistence collaborators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Missing file, view or zoom id
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Input that cannot be used at all (missing column in a row, wrong mimetype, bad id)
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Shape mismatch on create/update
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Underlying persistence failure, passed through
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
