//! Client-side cache for the last active list.
//!
//! A tiny key-value surface persisted on the client (not in the remote
//! store), used to restore the active list across sessions. Implementations
//! are expected to swallow and log their own I/O problems; the engine treats
//! the cache as best-effort and falls back to the first available list when
//! the cached id no longer resolves.

use std::fmt::Debug;
use std::sync::Mutex;

use crate::model::Id;

/// Stores the id of the list the user last had open.
pub trait ActiveListCache: Send + Sync + Debug {
    /// The cached list id, if any.
    fn last_active_list(&self) -> Option<Id>;

    /// Replaces the cached list id; `None` clears it.
    fn set_last_active_list(&self, id: Option<&Id>);
}

/// Process-local cache, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    last: Mutex<Option<Id>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActiveListCache for InMemoryCache {
    fn last_active_list(&self) -> Option<Id> {
        self.last.lock().unwrap().clone()
    }

    fn set_last_active_list(&self, id: Option<&Id>) {
        *self.last.lock().unwrap() = id.cloned();
    }
}
