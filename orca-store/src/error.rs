//! Store errors

use orca_core::OrcaError;
use thiserror::Error;

/// Failure reported by a record store or catalog backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("rejected: {0}")]
    Rejected(String),

    /// Network failure, timeout or outage
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound { kind, id: id.to_string() }
    }
}

impl From<StoreError> for OrcaError {
    fn from(err: StoreError) -> Self {
        OrcaError::persistence(err.to_string())
    }
}
