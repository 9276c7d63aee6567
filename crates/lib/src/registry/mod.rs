//! List lifecycle, membership, and invite codes.
//!
//! Pure domain rules over [`ShoppingList`] values: role checks, the
//! membership state machine, and invite-code resolution. Every function
//! validates before mutating, so a returned error means the list is
//! untouched. Persisting the outcome (and cascading deletes) is the sync
//! coordinator's job.
//!
//! Membership transitions: `NonMember -> Editor` via join, `-> Owner` via
//! creation; `Editor -> NonMember` via leave or removal. `Owner` has no
//! transition out except list deletion.

mod errors;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::constants::INVITE_CODE_LEN;
use crate::identity::UserProfile;
use crate::model::{Id, ListMember, MemberRole, ShoppingList};

pub use errors::RegistryError;

/// What [`join`] did for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The caller was added as an editor.
    Joined,
    /// The caller was already a member; nothing changed.
    AlreadyMember,
}

/// Creates a new list with the creator as its sole owner member.
pub fn new_list(name: impl Into<String>, owner: &UserProfile, now: DateTime<Utc>) -> ShoppingList {
    let mut list = ShoppingList {
        id: Id::generate(),
        name: name.into(),
        owner_id: owner.id.clone(),
        members: Default::default(),
        member_ids: Vec::new(),
        invite_code: None,
        invite_enabled: false,
        item_count: 0,
        cost_splitting_enabled: false,
        currency: None,
        created_at: now,
        updated_at: now,
    };
    insert_member(&mut list, owner, MemberRole::Owner, now);
    list
}

/// Fails with [`RegistryError::NotOwner`] unless the user owns the list.
pub fn ensure_owner(list: &ShoppingList, user_id: &Id) -> Result<(), RegistryError> {
    if list.is_owner(user_id) {
        Ok(())
    } else {
        Err(RegistryError::NotOwner {
            list_id: list.id.clone(),
        })
    }
}

/// Fails with [`RegistryError::NotAMember`] unless the user is on the list.
pub fn ensure_member(list: &ShoppingList, user_id: &Id) -> Result<(), RegistryError> {
    if list.is_member(user_id) {
        Ok(())
    } else {
        Err(RegistryError::NotAMember {
            list_id: list.id.clone(),
        })
    }
}

/// Renames the list. Owner only.
pub fn rename(
    list: &mut ShoppingList,
    name: impl Into<String>,
    acting_user: &Id,
    now: DateTime<Utc>,
) -> Result<(), RegistryError> {
    ensure_owner(list, acting_user)?;
    list.name = name.into();
    list.updated_at = now;
    Ok(())
}

/// Issues a fresh invite code and enables the invite link. Owner only.
///
/// Any previously issued code stops resolving; regeneration is the only
/// revocation mechanism besides disabling.
pub fn generate_invite_code(
    list: &mut ShoppingList,
    acting_user: &Id,
    now: DateTime<Utc>,
) -> Result<String, RegistryError> {
    ensure_owner(list, acting_user)?;
    let code: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_CODE_LEN)
        .map(char::from)
        .collect();
    list.invite_code = Some(code.clone());
    list.invite_enabled = true;
    list.updated_at = now;
    Ok(code)
}

/// Turns the invite link off. Owner only.
///
/// The stored code is kept but stops resolving until a new one is generated.
pub fn disable_invite_link(
    list: &mut ShoppingList,
    acting_user: &Id,
    now: DateTime<Utc>,
) -> Result<(), RegistryError> {
    ensure_owner(list, acting_user)?;
    list.invite_enabled = false;
    list.updated_at = now;
    Ok(())
}

/// Adds the caller to the list resolved from an invite code.
///
/// Membership is checked first, so an existing member gets
/// [`JoinOutcome::AlreadyMember`] even when the code has since been rotated
/// or disabled. Non-members need a code that matches the list's current
/// enabled code, otherwise [`RegistryError::InviteInvalid`].
pub fn join(
    list: &mut ShoppingList,
    code: &str,
    profile: &UserProfile,
    now: DateTime<Utc>,
) -> Result<JoinOutcome, RegistryError> {
    if list.is_member(&profile.id) {
        return Ok(JoinOutcome::AlreadyMember);
    }
    if !list.invite_enabled || list.invite_code.as_deref() != Some(code) {
        return Err(RegistryError::InviteInvalid);
    }
    insert_member(list, profile, MemberRole::Editor, now);
    list.updated_at = now;
    Ok(JoinOutcome::Joined)
}

/// Removes another member from the list. Owner only; the owner cannot be
/// the target.
///
/// Returns `Ok(false)` without touching the list when the target is not a
/// member.
pub fn remove_member(
    list: &mut ShoppingList,
    target: &Id,
    acting_user: &Id,
    now: DateTime<Utc>,
) -> Result<bool, RegistryError> {
    ensure_owner(list, acting_user)?;
    if list.is_owner(target) {
        return Err(RegistryError::CannotRemoveOwner {
            list_id: list.id.clone(),
        });
    }
    Ok(drop_member(list, target, now))
}

/// Removes the caller from the list they are a member of.
///
/// Owners cannot leave; there is no ownership transfer. Returns `Ok(false)`
/// when the caller already was not a member.
pub fn leave(
    list: &mut ShoppingList,
    user_id: &Id,
    now: DateTime<Utc>,
) -> Result<bool, RegistryError> {
    if list.is_owner(user_id) {
        return Err(RegistryError::OwnerCannotLeave {
            list_id: list.id.clone(),
        });
    }
    Ok(drop_member(list, user_id, now))
}

/// Toggles cost splitting and records the display currency. Owner only.
pub fn set_cost_splitting(
    list: &mut ShoppingList,
    enabled: bool,
    currency: Option<String>,
    acting_user: &Id,
    now: DateTime<Utc>,
) -> Result<(), RegistryError> {
    ensure_owner(list, acting_user)?;
    list.cost_splitting_enabled = enabled;
    if currency.is_some() {
        list.currency = currency;
    }
    list.updated_at = now;
    Ok(())
}

fn insert_member(list: &mut ShoppingList, profile: &UserProfile, role: MemberRole, now: DateTime<Utc>) {
    list.members.insert(
        profile.id.clone(),
        ListMember {
            role,
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            joined_at: now,
        },
    );
    if !list.member_ids.contains(&profile.id) {
        list.member_ids.push(profile.id.clone());
    }
}

fn drop_member(list: &mut ShoppingList, user_id: &Id, now: DateTime<Utc>) -> bool {
    if list.members.remove(user_id).is_none() {
        return false;
    }
    list.member_ids.retain(|id| id != user_id);
    list.updated_at = now;
    true
}
