//! Error types for the sync coordinator.

use thiserror::Error;

use crate::model::Id;

/// Validation errors raised by coordinator operations before anything is
/// mutated or persisted.
///
/// Persist failures never show up here; they are recorded in
/// [`SyncStatus`](super::SyncStatus) instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// An item operation was called with no active list selected.
    #[error("No active list is selected")]
    NoActiveList,

    /// No item with this id exists on the active list.
    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: Id },

    /// A quantity was NaN or infinite.
    #[error("Quantity must be a finite number")]
    InvalidQuantity,

    /// A price was NaN, infinite, or negative.
    #[error("Price must be a finite, non-negative number")]
    InvalidPrice,
}

impl SyncError {
    /// Check if this is a missing-item error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::ItemNotFound { .. })
    }

    /// Check if this is a rejected input value.
    pub fn is_invalid_value(&self) -> bool {
        matches!(self, SyncError::InvalidQuantity | SyncError::InvalidPrice)
    }
}

impl From<SyncError> for crate::Error {
    fn from(err: SyncError) -> Self {
        crate::Error::Sync(err)
    }
}
