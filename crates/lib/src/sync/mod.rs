//! The sync coordinator: optimistic mutation, asynchronous persistence, and
//! remote-feed reconciliation.
//!
//! Every mutation follows one pattern:
//! 1. Validate (role checks, signed-in check, input checks). Failures return
//!    immediately; nothing has been touched.
//! 2. Apply the change to the in-memory state under a short lock and stage
//!    the corresponding persist calls in the pending-op log, stamped with
//!    this session's next write sequence number.
//! 3. Issue the persist calls. Success drops the op from the log; failure
//!    flags it and records the error in [`SyncStatus`]. The optimistic local
//!    state is never rolled back, and persist errors never propagate out of
//!    the mutation call.
//!
//! Independently, listener tasks consume the store's change feeds for the
//! member's list collection and the active list's item and presence
//! collections. Item and list snapshots are applied only when they
//! acknowledge this session's writes up to the log's current floor; stale
//! echoes of our own writes are dropped. A snapshot from another client that
//! already reflects our latest confirmed write is applied even while a newer
//! write of ours is merely staged, so collaborator edits are not lost to the
//! suppression window.
//!
//! The coordinator is a cheap-to-clone handle; all clones share one engine.

mod errors;
mod feed;
mod items;
mod lists;
mod migrate;
mod state;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::ActiveListCache;
use crate::clock::Clock;
use crate::constants::PRESENCE_HEARTBEAT_INTERVAL;
use crate::identity::{IdentityProvider, UserProfile};
use crate::model::{Id, ListPresenceEntry, ShoppingItem, ShoppingList};
use crate::presence::{self, PresenceTracker};
use crate::registry::RegistryError;
use crate::store::{Document, DocumentStore, Query, StoreError, WriteStamp, paths};

pub use errors::SyncError;
pub use items::RecipeIngredient;
pub use state::{PendingOp, SyncStatus};

use state::{EngineState, WriteOp};

/// Handle to the shopping engine.
///
/// Created with [`SyncCoordinator::open`]; clones share the same underlying
/// state, feeds, and pending-op log.
#[derive(Debug, Clone)]
pub struct SyncCoordinator {
    inner: Arc<CoordinatorInner>,
}

/// Feeds and heartbeat bound to the currently active list.
#[derive(Debug, Default)]
struct ActiveFeeds {
    tracker: Option<PresenceTracker>,
    tasks: Vec<JoinHandle<()>>,
}

#[derive(Debug)]
pub(crate) struct CoordinatorInner {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    cache: Arc<dyn ActiveListCache>,
    clock: Arc<dyn Clock>,
    /// Session-unique writer id carried by every stamped persist call.
    writer_id: Id,
    state: Mutex<EngineState>,
    /// Held across every active-list switch; guards the per-list resources.
    feeds: tokio::sync::Mutex<ActiveFeeds>,
    lists_task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncCoordinator {
    /// Opens the engine for the currently signed-in user.
    ///
    /// Seeds the list collection, runs the one-time legacy migration for
    /// first-time users, subscribes the live list feed, and restores the
    /// last active list from the cache, falling back to the first available
    /// list when the cached id no longer resolves.
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        cache: Arc<dyn ActiveListCache>,
        clock: Arc<dyn Clock>,
    ) -> crate::Result<Self> {
        let user = identity.current_user()?;
        let inner = Arc::new(CoordinatorInner {
            store,
            identity,
            cache,
            clock,
            writer_id: Id::generate(),
            state: Mutex::new(EngineState::default()),
            feeds: tokio::sync::Mutex::new(ActiveFeeds::default()),
            lists_task: Mutex::new(None),
        });
        info!(user_id = %user.id, writer_id = %inner.writer_id, "Opening shopping engine");

        // Seed the list collection before deciding anything else.
        let docs = inner.store.fetch(&member_lists_query(&user.id)).await?;
        let mut lists: Vec<ShoppingList> = feed::parse_docs(&docs, "list");
        state::sort_lists(&mut lists);
        {
            let mut st = inner.state.lock().unwrap();
            st.local.lists = lists;
        }

        migrate::run_if_needed(&inner, &user).await?;

        let sub = inner.store.subscribe(&member_lists_query(&user.id)).await?;
        let handle = feed::spawn_lists_feed(&inner, sub);
        *inner.lists_task.lock().unwrap() = Some(handle);

        let target = {
            let st = inner.state.lock().unwrap();
            match inner.cache.last_active_list() {
                Some(id) if st.local.list(&id).is_some() => Some(id),
                Some(id) => {
                    debug!(list_id = %id, "Cached active list no longer resolves");
                    st.local.lists.first().map(|l| l.id.clone())
                }
                None => st.local.lists.first().map(|l| l.id.clone()),
            }
        };
        CoordinatorInner::switch_active(&inner, target).await?;

        Ok(Self { inner })
    }

    /// Stops the presence heartbeat and all listener tasks.
    ///
    /// Waits until the user's own presence entry has been deleted. Local
    /// state stays readable afterwards.
    pub async fn shutdown(&self) {
        info!("Shutting down shopping engine");
        let mut feeds = self.inner.feeds.lock().await;
        for task in feeds.tasks.drain(..) {
            task.abort();
        }
        if let Some(tracker) = feeds.tracker.take() {
            tracker.stop().await;
        }
        if let Some(task) = self.inner.lists_task.lock().unwrap().take() {
            task.abort();
        }
    }

    /// Makes a list active, or deactivates with `None`.
    ///
    /// Unsubscribes the previous list's item and presence feeds, stops its
    /// heartbeat (deleting our presence entry), then fetches the new list's
    /// items, subscribes its feeds, and starts heartbeating there. The
    /// choice is remembered in the client-side cache.
    pub async fn set_active_list(&self, list_id: Option<Id>) -> crate::Result<()> {
        CoordinatorInner::switch_active(&self.inner, list_id).await
    }

    /// Current sync status: whether stamped writes are in flight and the
    /// most recent persist error, if any.
    pub fn status(&self) -> SyncStatus {
        let st = self.inner.state.lock().unwrap();
        SyncStatus {
            is_syncing: st.ops.is_syncing(),
            last_sync_error: st.local.last_sync_error.clone(),
        }
    }

    /// The pending-op log, oldest first.
    pub fn pending_ops(&self) -> Vec<PendingOp> {
        self.inner.state.lock().unwrap().ops.pending()
    }

    /// Re-issues the persist calls of every failed op, in original order,
    /// under their original write stamps. Returns how many were retried.
    pub async fn retry_failed_ops(&self) -> usize {
        let seqs = {
            let mut st = self.inner.state.lock().unwrap();
            st.ops.take_failed_for_retry()
        };
        for seq in &seqs {
            self.inner.persist_staged(*seq).await;
        }
        seqs.len()
    }

    /// Drops every failed op from the log without re-issuing it.
    ///
    /// The optimistic local state those ops produced is kept; the next
    /// applied snapshot restores the remote truth. Returns how many were
    /// discarded.
    pub fn discard_failed_ops(&self) -> usize {
        self.inner.state.lock().unwrap().ops.discard_failed()
    }

    /// Members actively viewing the current list, excluding the caller.
    ///
    /// Entries older than the staleness threshold are filtered out.
    pub fn active_presence_users(&self) -> crate::Result<Vec<ListPresenceEntry>> {
        let user = self.inner.current_user()?;
        let st = self.inner.state.lock().unwrap();
        Ok(presence::active_users(
            &st.local.presence,
            &user.id,
            self.inner.clock.now(),
        ))
    }

    pub(crate) fn inner(&self) -> &Arc<CoordinatorInner> {
        &self.inner
    }
}

impl CoordinatorInner {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn current_user(&self) -> crate::Result<UserProfile> {
        Ok(self.identity.current_user()?)
    }

    /// Executes the staged writes of one op and settles its fate in the
    /// log. Persist failures are recorded, never returned.
    async fn persist_staged(&self, seq: u64) {
        let writes = {
            let st = self.state.lock().unwrap();
            st.ops.writes_for(seq)
        };
        let Some(writes) = writes else {
            return;
        };
        match self.execute_writes(&writes, seq).await {
            Ok(()) => {
                let mut st = self.state.lock().unwrap();
                st.ops.complete(seq);
                st.local.last_sync_error = None;
                debug!(seq, "Write confirmed");
            }
            Err(e) => {
                let mut st = self.state.lock().unwrap();
                st.ops.fail(seq);
                st.local.last_sync_error = Some(e.to_string());
                error!(seq, "Write failed, keeping optimistic state: {e}");
            }
        }
    }

    async fn execute_writes(&self, writes: &[WriteOp], seq: u64) -> Result<(), StoreError> {
        let stamp = WriteStamp::new(self.writer_id.clone(), seq);
        for write in writes {
            match write {
                WriteOp::Upsert { collection, doc } => {
                    self.store
                        .upsert(collection, doc.clone(), Some(&stamp))
                        .await?;
                }
                WriteOp::Delete { collection, id } => {
                    self.store.delete(collection, id, Some(&stamp)).await?;
                }
                WriteOp::BatchUpsert { collection, docs } => {
                    self.store
                        .batch_upsert(collection, docs.clone(), Some(&stamp))
                        .await?;
                }
                WriteOp::DeleteAll { collection } => {
                    let docs = self.store.fetch(&Query::collection(collection)).await?;
                    for doc in docs {
                        self.store.delete(collection, &doc.id, Some(&stamp)).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Switches the active list. Serialized by the feeds lock; guaranteed to
    /// tear down the previous list's feeds and heartbeat even if that list
    /// was deleted mid-session.
    pub(crate) async fn switch_active(inner: &Arc<Self>, target: Option<Id>) -> crate::Result<()> {
        let mut feeds = inner.feeds.lock().await;

        // Validate before tearing anything down.
        let user = inner.current_user()?;
        if let Some(id) = &target {
            let st = inner.state.lock().unwrap();
            if st.local.list(id).is_none() {
                return Err(RegistryError::ListNotFound {
                    list_id: id.clone(),
                }
                .into());
            }
        }

        for task in feeds.tasks.drain(..) {
            task.abort();
        }
        if let Some(tracker) = feeds.tracker.take() {
            tracker.stop().await;
        }

        {
            let mut st = inner.state.lock().unwrap();
            st.local.active_list_id = target.clone();
            st.local.items.clear();
            st.local.presence.clear();
        }
        inner.cache.set_last_active_list(target.as_ref());

        let Some(list_id) = target else {
            debug!("No active list selected");
            return Ok(());
        };

        // Initial item fetch, then the live feeds.
        let items_query = Query::collection(paths::items(&list_id));
        let docs = inner.store.fetch(&items_query).await?;
        let mut items: Vec<ShoppingItem> = feed::parse_docs(&docs, "item");
        state::sort_items(&mut items);
        {
            let mut st = inner.state.lock().unwrap();
            st.local.items = items;
        }

        let items_sub = inner.store.subscribe(&items_query).await?;
        let presence_sub = inner
            .store
            .subscribe(&Query::collection(paths::presence(&list_id)))
            .await?;
        feeds.tasks.push(feed::spawn_items_feed(inner, list_id.clone(), items_sub));
        feeds
            .tasks
            .push(feed::spawn_presence_feed(inner, list_id.clone(), presence_sub));
        feeds.tracker = Some(PresenceTracker::start(
            inner.store.clone(),
            inner.clock.clone(),
            list_id.clone(),
            user,
            PRESENCE_HEARTBEAT_INTERVAL,
        ));
        info!(list_id = %list_id, "Active list switched");
        Ok(())
    }
}

/// The query every client keeps open over its own lists.
pub(crate) fn member_lists_query(user_id: &Id) -> Query {
    Query::collection(paths::LISTS).where_array_contains("member_ids", user_id.as_str())
}

pub(crate) fn upsert_list_op(list: &ShoppingList) -> Result<WriteOp, StoreError> {
    Ok(WriteOp::Upsert {
        collection: paths::LISTS.to_string(),
        doc: Document::from_model(list.id.clone(), list)?,
    })
}

pub(crate) fn upsert_item_op(list_id: &Id, item: &ShoppingItem) -> Result<WriteOp, StoreError> {
    Ok(WriteOp::Upsert {
        collection: paths::items(list_id),
        doc: Document::from_model(item.id.clone(), item)?,
    })
}
