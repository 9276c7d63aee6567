//! Presence heartbeats and liveness filtering.
//!
//! Entering a list immediately writes the user's presence entry, then a
//! background task refreshes it on a fixed interval. Leaving the list (or
//! shutting the engine down) stops the task, which deletes the entry on its
//! way out, on every exit path.
//!
//! Liveness is a client-side heuristic: [`active_users`] keeps entries whose
//! heartbeat is recent enough and never includes the caller's own entry.
//! There is no ping/ack with other clients.
//!
//! Presence writes are unstamped and best-effort. A missed heartbeat is
//! repaired by the next tick, so failures are logged at `warn` and otherwise
//! ignored.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::constants::PRESENCE_STALE_AFTER;
use crate::identity::UserProfile;
use crate::model::{Id, ListPresenceEntry};
use crate::store::{Document, DocumentStore, paths};

/// Filters presence entries down to members actively viewing the list.
///
/// Excludes the caller's own entry regardless of recency, and any entry
/// whose `last_seen` is older than the staleness threshold.
pub fn active_users(
    entries: &[ListPresenceEntry],
    self_id: &Id,
    now: DateTime<Utc>,
) -> Vec<ListPresenceEntry> {
    let stale_after = chrono::Duration::seconds(PRESENCE_STALE_AFTER.as_secs() as i64);
    entries
        .iter()
        .filter(|entry| entry.user_id != *self_id && now - entry.last_seen <= stale_after)
        .cloned()
        .collect()
}

/// Background heartbeat for one user on one list.
///
/// Owns a tokio task that writes the presence entry immediately and then on
/// every tick. [`stop`](Self::stop) shuts the task down and waits for it to
/// delete the entry.
#[derive(Debug)]
pub struct PresenceTracker {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    list_id: Id,
}

impl PresenceTracker {
    /// Starts heartbeating for `profile` on `list_id` every `period`.
    ///
    /// The first write happens right away, before the first full period
    /// elapses.
    pub fn start(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        list_id: Id,
        profile: UserProfile,
        period: Duration,
    ) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task_list = list_id.clone();
        let task = tokio::spawn(async move {
            let collection = paths::presence(&task_list);
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        beat(store.as_ref(), &collection, &profile, clock.now()).await;
                    }
                    changed = shutdown_rx.changed() => {
                        // A dropped sender counts as shutdown too.
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            // Release the entry so other members stop seeing us.
            if let Err(e) = store.delete(&collection, &profile.id, None).await {
                warn!(list_id = %task_list, "Failed to delete own presence entry: {e}");
            } else {
                debug!(list_id = %task_list, user_id = %profile.id, "Presence released");
            }
        });
        Self {
            shutdown,
            task,
            list_id,
        }
    }

    /// The list this tracker is heartbeating on.
    pub fn list_id(&self) -> &Id {
        &self.list_id
    }

    /// Stops the heartbeat and waits until the presence entry is deleted.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

async fn beat(store: &dyn DocumentStore, collection: &str, profile: &UserProfile, now: DateTime<Utc>) {
    let entry = ListPresenceEntry {
        user_id: profile.id.clone(),
        display_name: profile.display_name.clone(),
        avatar_url: profile.avatar_url.clone(),
        last_seen: now,
    };
    match Document::from_model(profile.id.clone(), &entry) {
        Ok(doc) => {
            if let Err(e) = store.upsert(collection, doc, None).await {
                warn!(user_id = %profile.id, "Presence heartbeat failed: {e}");
            }
        }
        Err(e) => warn!(user_id = %profile.id, "Presence entry not serializable: {e}"),
    }
}
