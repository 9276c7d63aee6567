//! Document-store abstraction.
//!
//! The engine consumes a document-oriented store through the
//! [`DocumentStore`] trait: collections of JSON documents addressed by
//! string ids, filtered one-shot reads, and push-based subscriptions that
//! deliver the full matching document set at least once per change.
//!
//! Writes optionally carry a [`WriteStamp`] naming the writing session and
//! its local write counter; stores echo the highest stamp seen per writer in
//! every [`Snapshot`], which is what lets a coordinator tell its own echoes
//! apart from other clients' edits.
//!
//! [`InMemoryStore`] is the bundled implementation, used by tests and
//! local/offline deployments.

mod errors;
mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::model::Id;

pub use errors::StoreError;
pub use memory::InMemoryStore;

/// One stored document: a string id plus a JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Id,
    pub data: Value,
}

impl Document {
    /// Wraps an id and raw JSON payload.
    pub fn new(id: impl Into<Id>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Serializes a model value into a document with the given id.
    pub fn from_model<T: Serialize>(id: impl Into<Id>, model: &T) -> Result<Self, StoreError> {
        Ok(Self {
            id: id.into(),
            data: serde_json::to_value(model)?,
        })
    }

    /// Deserializes the payload into a model value.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// Identifies one client session's write and its position in that session's
/// local write order.
///
/// Sequence numbers start at 1 and increase monotonically per writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteStamp {
    pub writer: Id,
    pub seq: u64,
}

impl WriteStamp {
    pub fn new(writer: impl Into<Id>, seq: u64) -> Self {
        Self {
            writer: writer.into(),
            seq,
        }
    }
}

/// A single-field document filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the value exactly.
    Eq { field: String, value: Value },
    /// Field is an array containing the value.
    ArrayContains { field: String, value: Value },
}

impl Filter {
    /// Evaluates the filter against a document payload.
    ///
    /// Missing fields never match.
    pub fn matches(&self, data: &Value) -> bool {
        match self {
            Filter::Eq { field, value } => data.get(field) == Some(value),
            Filter::ArrayContains { field, value } => data
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|array| array.contains(value)),
        }
    }
}

/// A collection path plus an optional filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filter: Option<Filter>,
}

impl Query {
    /// All documents of a collection.
    pub fn collection(path: impl Into<String>) -> Self {
        Self {
            collection: path.into(),
            filter: None,
        }
    }

    /// Restricts to documents whose field equals the value.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some(Filter::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Restricts to documents whose array field contains the value.
    pub fn where_array_contains(
        mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.filter = Some(Filter::ArrayContains {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Evaluates the query's filter against a document payload.
    pub fn matches(&self, data: &Value) -> bool {
        self.filter.as_ref().is_none_or(|f| f.matches(data))
    }
}

/// One delivery from a subscription: the full matching document set plus the
/// store's per-writer acknowledgement map at emission time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub docs: Vec<Document>,
    /// Highest write sequence number the store has accepted per writer.
    pub acks: HashMap<Id, u64>,
}

impl Snapshot {
    /// Returns true if this snapshot reflects the writer's write with the
    /// given sequence number.
    ///
    /// A `seq` of zero means the writer has issued nothing yet and is always
    /// acknowledged.
    pub fn acknowledges(&self, writer: &Id, seq: u64) -> bool {
        seq == 0 || self.acks.get(writer).is_some_and(|&acked| acked >= seq)
    }
}

/// Receiving half of a collection subscription.
///
/// The store delivers the current matching set immediately on subscribe and
/// again after every write touching the collection, at least once. Dropping
/// the subscription deregisters it.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Snapshot>,
}

impl Subscription {
    /// Creates a connected sender/subscription pair. Store implementations
    /// keep the sender and hand the subscription to the caller.
    pub fn channel() -> (mpsc::UnboundedSender<Snapshot>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Waits for the next snapshot. `None` once the store side is gone.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }
}

/// A document-oriented store with per-document atomic writes, filtered
/// queries, and push-based change feeds.
///
/// The engine assumes last-writer-wins per document and no multi-document
/// transactions. Implementations must echo write stamps back through
/// [`Snapshot::acks`].
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Reads one document, or `None` if it does not exist.
    async fn get(&self, collection: &str, id: &Id) -> Result<Option<Document>, StoreError>;

    /// One-shot read of every document matching the query.
    async fn fetch(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Subscribes to the full matching document set.
    async fn subscribe(&self, query: &Query) -> Result<Subscription, StoreError>;

    /// Creates or replaces one document.
    async fn upsert(
        &self,
        collection: &str,
        doc: Document,
        stamp: Option<&WriteStamp>,
    ) -> Result<(), StoreError>;

    /// Deletes one document. Deleting a missing document succeeds.
    async fn delete(
        &self,
        collection: &str,
        id: &Id,
        stamp: Option<&WriteStamp>,
    ) -> Result<(), StoreError>;

    /// Creates or replaces several documents of one collection. Atomic per
    /// document, not across the batch.
    async fn batch_upsert(
        &self,
        collection: &str,
        docs: Vec<Document>,
        stamp: Option<&WriteStamp>,
    ) -> Result<(), StoreError>;
}

/// Collection paths used by the engine.
pub mod paths {
    use crate::model::Id;

    /// Top-level collection of all shopping lists.
    pub const LISTS: &str = "lists";

    /// Items of one list.
    pub fn items(list_id: &Id) -> String {
        format!("lists/{list_id}/items")
    }

    /// Presence heartbeats of one list.
    pub fn presence(list_id: &Id) -> String {
        format!("lists/{list_id}/presence")
    }

    /// A user's global purchase history.
    pub fn purchase_history(user_id: &Id) -> String {
        format!("users/{user_id}/purchase_history")
    }

    /// A user's pre-collaboration flat item collection.
    pub fn legacy_items(user_id: &Id) -> String {
        format!("users/{user_id}/shopping_items")
    }
}
