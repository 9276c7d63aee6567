//! Shopping list and membership types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// Role of a member within a shopping list.
///
/// Exactly one member holds [`MemberRole::Owner`]; everyone who joined via an
/// invite code is an [`MemberRole::Editor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    /// May rename/delete the list, manage invites, remove members, and
    /// toggle cost splitting. Cannot leave.
    Owner,
    /// May edit items and leave the list.
    Editor,
}

/// Membership record for one user on one list.
///
/// Stored keyed by user id in [`ShoppingList::members`]; the key carries the
/// user id, so it is not repeated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListMember {
    pub role: MemberRole,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub joined_at: DateTime<Utc>,
}

/// A collaborative shopping list shared by one owner and any number of
/// editors.
///
/// Invariants maintained by the registry:
/// - `owner_id` is always a key of `members` with role `owner`, and is the
///   only member with that role.
/// - `member_ids` is always the key set of `members`, ordered owner first and
///   join order after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingList {
    pub id: Id,
    pub name: String,
    pub owner_id: Id,
    pub members: HashMap<Id, ListMember>,
    pub member_ids: Vec<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
    #[serde(default)]
    pub invite_enabled: bool,
    /// Denormalized count of items on the list, refreshed alongside item
    /// writes. Advisory only; the item collection is the source of truth.
    #[serde(default)]
    pub item_count: u32,
    #[serde(default)]
    pub cost_splitting_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShoppingList {
    /// Returns true if the user is a member of this list.
    pub fn is_member(&self, user_id: &Id) -> bool {
        self.members.contains_key(user_id)
    }

    /// Returns true if the user is the owner of this list.
    pub fn is_owner(&self, user_id: &Id) -> bool {
        self.owner_id == *user_id
    }

    /// Returns the member's role, or `None` for non-members.
    pub fn role_of(&self, user_id: &Id) -> Option<MemberRole> {
        self.members.get(user_id).map(|m| m.role)
    }

    /// Returns the membership record for a user, if any.
    pub fn member(&self, user_id: &Id) -> Option<&ListMember> {
        self.members.get(user_id)
    }
}
