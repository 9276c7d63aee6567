//! List lifecycle and membership operations on the coordinator.
//!
//! Each operation validates through the registry, applies the outcome to the
//! local list set, and stages the list-document write. Deletes cascade to
//! the list's item and presence collections.

use tracing::{debug, info};

use crate::model::{Id, ShoppingList};
use crate::registry::{self, JoinOutcome, RegistryError};
use crate::store::{Query, paths};

use super::state::{self, EngineState, WriteOp};
use super::{CoordinatorInner, SyncCoordinator, feed, upsert_list_op};

fn list_index(st: &EngineState, list_id: &Id) -> Result<usize, RegistryError> {
    st.local
        .lists
        .iter()
        .position(|l| l.id == *list_id)
        .ok_or_else(|| RegistryError::ListNotFound {
            list_id: list_id.clone(),
        })
}

impl SyncCoordinator {
    /// The lists the current user is a member of, in creation order.
    pub fn lists(&self) -> Vec<ShoppingList> {
        self.inner().state.lock().unwrap().local.lists.clone()
    }

    /// The currently active list, if one is selected.
    pub fn active_list(&self) -> Option<ShoppingList> {
        let st = self.inner().state.lock().unwrap();
        let id = st.local.active_list_id.clone()?;
        st.local.list(&id).cloned()
    }

    /// Creates a new list owned by the current user.
    ///
    /// The first list a session creates becomes active automatically.
    pub async fn create_list(&self, name: impl Into<String>) -> crate::Result<ShoppingList> {
        let inner = self.inner();
        let user = inner.current_user()?;
        let (list, seq) = {
            let mut st = inner.state.lock().unwrap();
            let list = registry::new_list(name, &user, inner.now());
            let write = upsert_list_op(&list)?;
            st.local.lists.push(list.clone());
            state::sort_lists(&mut st.local.lists);
            (list, st.ops.stage("create_list", vec![write]))
        };
        inner.persist_staged(seq).await;
        info!(list_id = %list.id, "List created");

        let activate = inner.state.lock().unwrap().local.active_list_id.is_none();
        if activate {
            CoordinatorInner::switch_active(inner, Some(list.id.clone())).await?;
        }
        Ok(list)
    }

    /// Renames a list. Owner only.
    pub async fn rename_list(
        &self,
        list_id: &Id,
        name: impl Into<String>,
    ) -> crate::Result<()> {
        let inner = self.inner();
        let user = inner.current_user()?;
        let seq = {
            let mut st = inner.state.lock().unwrap();
            let idx = list_index(&st, list_id)?;
            let mut updated = st.local.lists[idx].clone();
            registry::rename(&mut updated, name, &user.id, inner.now())?;
            let write = upsert_list_op(&updated)?;
            st.local.lists[idx] = updated;
            st.ops.stage("rename_list", vec![write])
        };
        inner.persist_staged(seq).await;
        Ok(())
    }

    /// Deletes a list and cascades to its items and presence entries.
    /// Owner only.
    pub async fn delete_list(&self, list_id: &Id) -> crate::Result<()> {
        let inner = self.inner();
        let user = inner.current_user()?;
        let (was_active, fallback, seq) = {
            let mut st = inner.state.lock().unwrap();
            let idx = list_index(&st, list_id)?;
            registry::ensure_owner(&st.local.lists[idx], &user.id)?;
            let list = st.local.lists.remove(idx);
            let was_active = st.local.active_list_id.as_ref() == Some(&list.id);
            let fallback = st.local.lists.first().map(|l| l.id.clone());
            let writes = vec![
                WriteOp::Delete {
                    collection: paths::LISTS.to_string(),
                    id: list.id.clone(),
                },
                WriteOp::DeleteAll {
                    collection: paths::items(&list.id),
                },
                WriteOp::DeleteAll {
                    collection: paths::presence(&list.id),
                },
            ];
            (was_active, fallback, st.ops.stage("delete_list", writes))
        };
        // Move off the list before its collections go away, so our own
        // heartbeat stops writing into them.
        if was_active {
            CoordinatorInner::switch_active(inner, fallback).await?;
        }
        inner.persist_staged(seq).await;
        info!(list_id = %list_id, "List deleted");
        Ok(())
    }

    /// Issues a fresh invite code for a list, invalidating any previous
    /// one. Owner only.
    pub async fn generate_invite_code(&self, list_id: &Id) -> crate::Result<String> {
        let inner = self.inner();
        let user = inner.current_user()?;
        let (code, seq) = {
            let mut st = inner.state.lock().unwrap();
            let idx = list_index(&st, list_id)?;
            let mut updated = st.local.lists[idx].clone();
            let code = registry::generate_invite_code(&mut updated, &user.id, inner.now())?;
            let write = upsert_list_op(&updated)?;
            st.local.lists[idx] = updated;
            (code, st.ops.stage("generate_invite", vec![write]))
        };
        inner.persist_staged(seq).await;
        Ok(code)
    }

    /// Turns a list's invite link off. Owner only.
    pub async fn disable_invite_link(&self, list_id: &Id) -> crate::Result<()> {
        let inner = self.inner();
        let user = inner.current_user()?;
        let seq = {
            let mut st = inner.state.lock().unwrap();
            let idx = list_index(&st, list_id)?;
            let mut updated = st.local.lists[idx].clone();
            registry::disable_invite_link(&mut updated, &user.id, inner.now())?;
            let write = upsert_list_op(&updated)?;
            st.local.lists[idx] = updated;
            st.ops.stage("disable_invite", vec![write])
        };
        inner.persist_staged(seq).await;
        Ok(())
    }

    /// Joins the list an invite code resolves to and makes it active.
    ///
    /// Fails with an invalid-invite error when the code matches no list or
    /// the list has invites disabled. Joining a list the user is already a
    /// member of returns that list unchanged.
    pub async fn join_list(&self, code: &str) -> crate::Result<ShoppingList> {
        let inner = self.inner();
        let user = inner.current_user()?;

        // Resolve the code against the store; our own feed only covers
        // lists we are already a member of.
        let docs = inner
            .store
            .fetch(&Query::collection(paths::LISTS).where_eq("invite_code", code))
            .await?;
        let Some(remote) = feed::parse_docs::<ShoppingList>(&docs, "list").into_iter().next()
        else {
            return Err(RegistryError::InviteInvalid.into());
        };

        let (list, seq) = {
            let mut st = inner.state.lock().unwrap();
            let now = inner.now();
            // Prefer the local copy when we already track this list.
            let mut list = st.local.list(&remote.id).cloned().unwrap_or(remote);
            let seq = match registry::join(&mut list, code, &user, now)? {
                JoinOutcome::AlreadyMember => None,
                JoinOutcome::Joined => {
                    let write = upsert_list_op(&list)?;
                    Some(st.ops.stage("join_list", vec![write]))
                }
            };
            st.local.lists.retain(|l| l.id != list.id);
            st.local.lists.push(list.clone());
            state::sort_lists(&mut st.local.lists);
            (list, seq)
        };
        if let Some(seq) = seq {
            inner.persist_staged(seq).await;
            info!(list_id = %list.id, "Joined list");
        } else {
            debug!(list_id = %list.id, "Already a member");
        }

        CoordinatorInner::switch_active(inner, Some(list.id.clone())).await?;
        Ok(list)
    }

    /// Leaves a list. Owners cannot leave; they delete instead.
    ///
    /// Leaving a list the user is not on is a no-op.
    pub async fn leave_list(&self, list_id: &Id) -> crate::Result<()> {
        let inner = self.inner();
        let user = inner.current_user()?;
        let staged = {
            let mut st = inner.state.lock().unwrap();
            let idx = list_index(&st, list_id)?;
            let mut updated = st.local.lists[idx].clone();
            if !registry::leave(&mut updated, &user.id, inner.now())? {
                None
            } else {
                let write = upsert_list_op(&updated)?;
                // The list is no longer ours to see.
                st.local.lists.remove(idx);
                let was_active = st.local.active_list_id.as_ref() == Some(list_id);
                let fallback = st.local.lists.first().map(|l| l.id.clone());
                Some((st.ops.stage("leave_list", vec![write]), was_active, fallback))
            }
        };
        let Some((seq, was_active, fallback)) = staged else {
            return Ok(());
        };
        if was_active {
            CoordinatorInner::switch_active(inner, fallback).await?;
        }
        inner.persist_staged(seq).await;
        info!(list_id = %list_id, "Left list");
        Ok(())
    }

    /// Removes another member from a list. Owner only; removing someone who
    /// is not a member is a no-op.
    pub async fn remove_member(&self, list_id: &Id, member_id: &Id) -> crate::Result<()> {
        let inner = self.inner();
        let user = inner.current_user()?;
        let staged = {
            let mut st = inner.state.lock().unwrap();
            let idx = list_index(&st, list_id)?;
            let mut updated = st.local.lists[idx].clone();
            if !registry::remove_member(&mut updated, member_id, &user.id, inner.now())? {
                None
            } else {
                let write = upsert_list_op(&updated)?;
                st.local.lists[idx] = updated;
                Some(st.ops.stage("remove_member", vec![write]))
            }
        };
        if let Some(seq) = staged {
            inner.persist_staged(seq).await;
            info!(list_id = %list_id, member_id = %member_id, "Member removed");
        }
        Ok(())
    }

    /// Toggles cost splitting for a list and records the display currency.
    /// Owner only.
    pub async fn set_cost_splitting(
        &self,
        list_id: &Id,
        enabled: bool,
        currency: Option<String>,
    ) -> crate::Result<()> {
        let inner = self.inner();
        let user = inner.current_user()?;
        let seq = {
            let mut st = inner.state.lock().unwrap();
            let idx = list_index(&st, list_id)?;
            let mut updated = st.local.lists[idx].clone();
            registry::set_cost_splitting(&mut updated, enabled, currency, &user.id, inner.now())?;
            let write = upsert_list_op(&updated)?;
            st.local.lists[idx] = updated;
            st.ops.stage("set_cost_splitting", vec![write])
        };
        inner.persist_staged(seq).await;
        Ok(())
    }
}
