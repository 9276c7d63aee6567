//! Error types for the document store.

use thiserror::Error;

/// Errors surfaced by [`DocumentStore`](super::DocumentStore) implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The store could not be reached or refused the operation. Transient;
    /// the coordinator records it and keeps the optimistic local state.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A document payload could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File I/O error while saving or loading a persisted store image.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Check if this is a transient availability error.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        crate::Error::Store(err)
    }
}
