//! Listener tasks that pump store subscriptions into the engine state.
//!
//! Each task holds only a weak reference to the coordinator, so dropping the
//! engine (or aborting the task on a list switch) lets everything unwind.
//! Item and list snapshots pass through the write-stamp gate before being
//! applied; presence snapshots carry no local optimistic state and are
//! applied as-is.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::model::{Id, ListPresenceEntry, ShoppingItem, ShoppingList};
use crate::store::{Document, Snapshot, Subscription};

use super::CoordinatorInner;
use super::state;

/// Deserializes every parseable document in a set, logging and skipping the
/// rest. One malformed document never takes down a feed.
pub(crate) fn parse_docs<T: DeserializeOwned>(docs: &[Document], kind: &str) -> Vec<T> {
    let mut parsed = Vec::with_capacity(docs.len());
    for doc in docs {
        match doc.parse::<T>() {
            Ok(value) => parsed.push(value),
            Err(e) => warn!(id = %doc.id, "Skipping malformed {kind} document: {e}"),
        }
    }
    parsed
}

/// Pumps the member-lists subscription for the lifetime of the engine.
pub(crate) fn spawn_lists_feed(
    inner: &Arc<CoordinatorInner>,
    mut sub: Subscription,
) -> JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    tokio::spawn(async move {
        while let Some(snap) = sub.recv().await {
            let Some(inner) = weak.upgrade() else {
                break;
            };
            apply_lists_snapshot(&inner, snap).await;
        }
        debug!("List feed closed");
    })
}

/// Pumps one list's item subscription until the active list changes.
pub(crate) fn spawn_items_feed(
    inner: &Arc<CoordinatorInner>,
    list_id: Id,
    mut sub: Subscription,
) -> JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    tokio::spawn(async move {
        while let Some(snap) = sub.recv().await {
            let Some(inner) = weak.upgrade() else {
                break;
            };
            apply_items_snapshot(&inner, &list_id, snap);
        }
        debug!(list_id = %list_id, "Item feed closed");
    })
}

/// Pumps one list's presence subscription until the active list changes.
pub(crate) fn spawn_presence_feed(
    inner: &Arc<CoordinatorInner>,
    list_id: Id,
    mut sub: Subscription,
) -> JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    tokio::spawn(async move {
        while let Some(snap) = sub.recv().await {
            let Some(inner) = weak.upgrade() else {
                break;
            };
            apply_presence_snapshot(&inner, &list_id, snap);
        }
        debug!(list_id = %list_id, "Presence feed closed");
    })
}

async fn apply_lists_snapshot(inner: &Arc<CoordinatorInner>, snap: Snapshot) {
    let vanished_active = {
        let mut st = inner.state.lock().unwrap();
        if !snap.acknowledges(&inner.writer_id, st.ops.required_ack_seq()) {
            debug!("Dropping list snapshot behind our own writes");
            return;
        }
        let mut lists: Vec<ShoppingList> = parse_docs(&snap.docs, "list");
        state::sort_lists(&mut lists);
        st.local.lists = lists;
        debug!(count = st.local.lists.len(), "List snapshot applied");

        match &st.local.active_list_id {
            Some(active) if st.local.list(active).is_none() => {
                Some(st.local.lists.first().map(|l| l.id.clone()))
            }
            _ => None,
        }
    };

    // The active list was deleted remotely or we were removed from it.
    if let Some(fallback) = vanished_active {
        debug!("Active list vanished from the feed");
        if let Err(e) = CoordinatorInner::switch_active(inner, fallback).await {
            warn!("Failed to move off a removed list: {e}");
        }
    }
}

fn apply_items_snapshot(inner: &CoordinatorInner, list_id: &Id, snap: Snapshot) {
    let mut st = inner.state.lock().unwrap();
    // A feed can outlive its list switch by one delivery.
    if st.local.active_list_id.as_ref() != Some(list_id) {
        return;
    }
    if !snap.acknowledges(&inner.writer_id, st.ops.required_ack_seq()) {
        debug!(list_id = %list_id, "Dropping item snapshot behind our own writes");
        return;
    }
    let mut items: Vec<ShoppingItem> = parse_docs(&snap.docs, "item");
    state::sort_items(&mut items);
    st.local.items = items;
    debug!(list_id = %list_id, count = st.local.items.len(), "Item snapshot applied");
}

fn apply_presence_snapshot(inner: &CoordinatorInner, list_id: &Id, snap: Snapshot) {
    let mut st = inner.state.lock().unwrap();
    if st.local.active_list_id.as_ref() != Some(list_id) {
        return;
    }
    st.local.presence = parse_docs::<ListPresenceEntry>(&snap.docs, "presence");
}
