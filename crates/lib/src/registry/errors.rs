//! Error types for list lifecycle and membership operations.

use thiserror::Error;

use crate::model::Id;

/// Errors from list lifecycle, membership, and invite operations.
///
/// All of these are validation failures raised before anything is mutated or
/// persisted; the remote store independently enforces the same rules.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// An owner-only operation was attempted by a non-owner.
    #[error("Only the owner may modify list {list_id}")]
    NotOwner { list_id: Id },

    /// The owner tried to leave their own list. There is no ownership
    /// transfer; owners can only delete the list.
    #[error("The owner cannot leave list {list_id}")]
    OwnerCannotLeave { list_id: Id },

    /// `remove_member` targeted the owner.
    #[error("The owner cannot be removed from list {list_id}")]
    CannotRemoveOwner { list_id: Id },

    /// The invite code did not resolve to a list, or invites are disabled.
    #[error("Invite code is invalid or disabled")]
    InviteInvalid,

    /// No list with this id is known locally.
    #[error("List not found: {list_id}")]
    ListNotFound { list_id: Id },

    /// The acting user is not a member of the list.
    #[error("Not a member of list {list_id}")]
    NotAMember { list_id: Id },
}

impl RegistryError {
    /// Check if this is an authorization failure.
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            RegistryError::NotOwner { .. }
                | RegistryError::OwnerCannotLeave { .. }
                | RegistryError::CannotRemoveOwner { .. }
                | RegistryError::NotAMember { .. }
        )
    }

    /// Check if this is an invite resolution failure.
    pub fn is_invite_invalid(&self) -> bool {
        matches!(self, RegistryError::InviteInvalid)
    }

    /// Check if this is a missing-list error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::ListNotFound { .. })
    }
}

impl From<RegistryError> for crate::Error {
    fn from(err: RegistryError) -> Self {
        crate::Error::Registry(err)
    }
}
