//! In-memory document store.
//!
//! The reference [`DocumentStore`] implementation, used by the test suite and
//! by local/offline deployments. State lives in a mutex-guarded map of
//! collections; subscribers get the full matching document set pushed on
//! every write to their collection, built under the same lock as the write so
//! snapshots and their acknowledgement maps are always consistent.
//!
//! Two hooks exist for driving failure and race scenarios from tests:
//! [`InMemoryStore::fail_next_writes`] makes upcoming writes fail with a
//! transient error, and [`InMemoryStore::hold_writes`] parks writers until
//! [`InMemoryStore::release_writes`] opens the gate again.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::model::Id;

use super::{Document, DocumentStore, Query, Snapshot, StoreError, Subscription, WriteStamp};

/// A simple in-memory store backed by a `HashMap` of collections.
///
/// Provides basic persistence via [`save_to_file`](Self::save_to_file) and
/// [`load_from_file`](Self::load_from_file), serializing the collections to
/// JSON. Subscriptions are delivered over unbounded channels and deregister
/// when the receiving half is dropped.
#[derive(Debug)]
pub struct InMemoryStore {
    inner: Mutex<StoreInner>,
    /// Writers wait for `true` before taking the data lock.
    write_gate: watch::Sender<bool>,
}

#[derive(Debug)]
struct StoreInner {
    collections: HashMap<String, BTreeMap<Id, Value>>,
    /// Highest accepted write sequence per writer, echoed into snapshots.
    acks: HashMap<Id, u64>,
    subscribers: Vec<Subscriber>,
    fail_next_writes: u32,
}

#[derive(Debug)]
struct Subscriber {
    query: Query,
    tx: mpsc::UnboundedSender<Snapshot>,
}

/// Serializable image of the store for persistence.
#[derive(Serialize, Deserialize)]
struct PersistedStore {
    collections: HashMap<String, BTreeMap<Id, Value>>,
    #[serde(default)]
    acks: HashMap<Id, u64>,
}

impl Serialize for InMemoryStore {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let inner = self.inner.lock().unwrap();
        let persisted = PersistedStore {
            collections: inner.collections.clone(),
            acks: inner.acks.clone(),
        };
        persisted.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InMemoryStore {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let persisted = PersistedStore::deserialize(deserializer)?;
        let store = InMemoryStore::new();
        {
            let mut inner = store.inner.lock().unwrap();
            inner.collections = persisted.collections;
            inner.acks = persisted.acks;
        }
        Ok(store)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a new, empty store with the write gate open.
    pub fn new() -> Self {
        let (write_gate, _) = watch::channel(true);
        Self {
            inner: Mutex::new(StoreInner {
                collections: HashMap::new(),
                acks: HashMap::new(),
                subscribers: Vec::new(),
                fail_next_writes: 0,
            }),
            write_gate,
        }
    }

    /// Parks all subsequent writes until [`release_writes`](Self::release_writes).
    ///
    /// Reads and subscriptions are unaffected. Used to keep a write "in
    /// flight" for as long as a test needs.
    pub fn hold_writes(&self) {
        self.write_gate.send_replace(false);
    }

    /// Reopens the write gate; parked writers proceed in wakeup order.
    pub fn release_writes(&self) {
        self.write_gate.send_replace(true);
    }

    /// Makes the next `count` writes fail with a transient
    /// [`StoreError::Unavailable`]. Failed writes change nothing and are not
    /// acknowledged.
    pub fn fail_next_writes(&self, count: u32) {
        self.inner.lock().unwrap().fail_next_writes = count;
    }

    /// Number of documents currently in a collection.
    pub fn doc_count(&self, collection: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.collections.get(collection).map_or(0, BTreeMap::len)
    }

    /// Saves the store contents to a file as JSON.
    ///
    /// # Arguments
    /// * `path` - The path to the file where the contents should be saved.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Loads store contents from a JSON file.
    ///
    /// If the file does not exist, a new, empty store is returned.
    ///
    /// # Arguments
    /// * `path` - The path to the file from which to load the contents.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if !path.as_ref().exists() {
            return Ok(Self::new());
        }
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    async fn wait_until_writable(&self) {
        let mut gate = self.write_gate.subscribe();
        while !*gate.borrow_and_update() {
            if gate.changed().await.is_err() {
                return;
            }
        }
    }
}

impl StoreInner {
    fn take_injected_failure(&mut self) -> Result<(), StoreError> {
        if self.fail_next_writes > 0 {
            self.fail_next_writes -= 1;
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }

    fn record_ack(&mut self, stamp: Option<&WriteStamp>) {
        if let Some(stamp) = stamp {
            let acked = self.acks.entry(stamp.writer.clone()).or_insert(0);
            *acked = (*acked).max(stamp.seq);
        }
    }

    /// Pushes the collection's current state to its subscribers and prunes
    /// the ones whose receiver is gone.
    fn publish(&mut self, collection: &str) {
        let StoreInner {
            collections,
            acks,
            subscribers,
            ..
        } = self;
        subscribers.retain(|sub| {
            if sub.query.collection != collection {
                return !sub.tx.is_closed();
            }
            let snapshot = Snapshot {
                docs: docs_matching(collections, &sub.query),
                acks: acks.clone(),
            };
            sub.tx.send(snapshot).is_ok()
        });
    }
}

fn docs_matching(
    collections: &HashMap<String, BTreeMap<Id, Value>>,
    query: &Query,
) -> Vec<Document> {
    collections
        .get(&query.collection)
        .map(|col| {
            col.iter()
                .filter(|(_, data)| query.matches(data))
                .map(|(id, data)| Document::new(id.clone(), data.clone()))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, collection: &str, id: &Id) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .collections
            .get(collection)
            .and_then(|col| col.get(id))
            .map(|data| Document::new(id.clone(), data.clone())))
    }

    async fn fetch(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(docs_matching(&inner.collections, query))
    }

    async fn subscribe(&self, query: &Query) -> Result<Subscription, StoreError> {
        let (tx, subscription) = Subscription::channel();
        let mut inner = self.inner.lock().unwrap();
        let initial = Snapshot {
            docs: docs_matching(&inner.collections, query),
            acks: inner.acks.clone(),
        };
        let _ = tx.send(initial);
        inner.subscribers.push(Subscriber {
            query: query.clone(),
            tx,
        });
        Ok(subscription)
    }

    async fn upsert(
        &self,
        collection: &str,
        doc: Document,
        stamp: Option<&WriteStamp>,
    ) -> Result<(), StoreError> {
        self.wait_until_writable().await;
        let mut inner = self.inner.lock().unwrap();
        inner.take_injected_failure()?;
        inner.record_ack(stamp);
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(doc.id.clone(), doc.data);
        inner.publish(collection);
        Ok(())
    }

    async fn delete(
        &self,
        collection: &str,
        id: &Id,
        stamp: Option<&WriteStamp>,
    ) -> Result<(), StoreError> {
        self.wait_until_writable().await;
        let mut inner = self.inner.lock().unwrap();
        inner.take_injected_failure()?;
        inner.record_ack(stamp);
        if let Some(col) = inner.collections.get_mut(collection) {
            col.remove(id);
        }
        inner.publish(collection);
        Ok(())
    }

    async fn batch_upsert(
        &self,
        collection: &str,
        docs: Vec<Document>,
        stamp: Option<&WriteStamp>,
    ) -> Result<(), StoreError> {
        self.wait_until_writable().await;
        let mut inner = self.inner.lock().unwrap();
        inner.take_injected_failure()?;
        inner.record_ack(stamp);
        let col = inner.collections.entry(collection.to_string()).or_default();
        for doc in docs {
            col.insert(doc.id.clone(), doc.data);
        }
        inner.publish(collection);
        Ok(())
    }
}
