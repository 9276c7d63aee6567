//! Locally materialized state and the pending-operation log.
//!
//! Both halves live under one mutex in the coordinator: the optimistic view
//! of lists, items, and presence, and the log of writes issued against the
//! store but not yet confirmed. The log drives echo suppression: a remote
//! snapshot is applied only once it acknowledges everything this session
//! still expects to see reflected.

use std::collections::VecDeque;

use crate::model::{Id, ListPresenceEntry, ShoppingItem, ShoppingList};
use crate::store::Document;

/// The optimistic local view the UI reads.
#[derive(Debug, Default)]
pub(crate) struct LocalState {
    /// Lists the current user is a member of, ordered by creation time.
    pub lists: Vec<ShoppingList>,
    pub active_list_id: Option<Id>,
    /// Items of the active list, ordered by creation time.
    pub items: Vec<ShoppingItem>,
    /// Raw presence entries of the active list, staleness-unfiltered.
    pub presence: Vec<ListPresenceEntry>,
    pub last_sync_error: Option<String>,
}

impl LocalState {
    pub fn list(&self, id: &Id) -> Option<&ShoppingList> {
        self.lists.iter().find(|l| l.id == *id)
    }
}

/// Keeps lists in the stable order snapshots and accessors agree on.
pub(crate) fn sort_lists(lists: &mut [ShoppingList]) {
    lists.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Keeps items in the stable order snapshots and accessors agree on.
pub(crate) fn sort_items(items: &mut [ShoppingItem]) {
    items.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// One persist call recorded in the op log, replayable on retry.
#[derive(Debug, Clone)]
pub(crate) enum WriteOp {
    Upsert { collection: String, doc: Document },
    Delete { collection: String, id: Id },
    BatchUpsert { collection: String, docs: Vec<Document> },
    /// Deletes every document of a collection, resolving ids at execution
    /// time. Used for cascade deletes.
    DeleteAll { collection: String },
}

/// A staged mutation waiting for its persist calls to be confirmed.
#[derive(Debug)]
pub(crate) struct QueuedOp {
    pub seq: u64,
    pub label: &'static str,
    pub writes: Vec<WriteOp>,
    pub failed: bool,
    /// Times this op's persist calls have failed.
    pub attempts: u32,
}

/// Observable view of one queued operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOp {
    pub seq: u64,
    pub label: String,
    pub failed: bool,
    /// Times this op's persist calls have failed.
    pub attempts: u32,
}

/// Passive sync status read by the UI layer.
///
/// `is_syncing` is true while stamped writes are in flight.
/// `last_sync_error` reports the most recent persist failure and clears on
/// the next success.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub last_sync_error: Option<String>,
}

/// Append-only log of stamped mutations issued by this session.
///
/// Sequence numbers start at 1 and are assigned in staging order. A
/// completed op leaves the queue and advances `last_synced_seq`; a failed op
/// stays queued, flagged, until retried or discarded.
#[derive(Debug)]
pub(crate) struct OpLog {
    next_seq: u64,
    last_synced_seq: u64,
    ops: VecDeque<QueuedOp>,
}

impl Default for OpLog {
    fn default() -> Self {
        Self {
            next_seq: 1,
            last_synced_seq: 0,
            ops: VecDeque::new(),
        }
    }
}

impl OpLog {
    /// Records a freshly staged op and assigns its sequence number.
    pub fn stage(&mut self, label: &'static str, writes: Vec<WriteOp>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.ops.push_back(QueuedOp {
            seq,
            label,
            writes,
            failed: false,
            attempts: 0,
        });
        seq
    }

    /// Clones the writes of a queued op for execution.
    pub fn writes_for(&self, seq: u64) -> Option<Vec<WriteOp>> {
        self.ops
            .iter()
            .find(|op| op.seq == seq)
            .map(|op| op.writes.clone())
    }

    /// Marks an op's persist calls confirmed and drops it from the queue.
    pub fn complete(&mut self, seq: u64) {
        self.ops.retain(|op| op.seq != seq);
        self.last_synced_seq = self.last_synced_seq.max(seq);
    }

    /// Flags an op as failed. It stays queued for retry or discard.
    pub fn fail(&mut self, seq: u64) {
        if let Some(op) = self.ops.iter_mut().find(|op| op.seq == seq) {
            op.failed = true;
            op.attempts += 1;
        }
    }

    /// Flips all failed ops back to in-flight and returns their sequence
    /// numbers in issue order.
    pub fn take_failed_for_retry(&mut self) -> Vec<u64> {
        let mut seqs = Vec::new();
        for op in self.ops.iter_mut().filter(|op| op.failed) {
            op.failed = false;
            seqs.push(op.seq);
        }
        seqs
    }

    /// Drops all failed ops. The optimistic state they produced is not
    /// rolled back; the next applied snapshot restores the remote truth.
    pub fn discard_failed(&mut self) -> usize {
        let before = self.ops.len();
        self.ops.retain(|op| !op.failed);
        before - self.ops.len()
    }

    /// True while any op is in flight (failed ops do not count).
    pub fn is_syncing(&self) -> bool {
        self.ops.iter().any(|op| !op.failed)
    }

    /// The write sequence a snapshot must acknowledge to be applied.
    ///
    /// The highest in-flight seq, or the last confirmed seq once the queue
    /// holds nothing in flight. Failed ops are excluded: their writes never
    /// reached the store, so no snapshot could ever acknowledge them, and
    /// holding the floor there would suppress every future snapshot.
    pub fn required_ack_seq(&self) -> u64 {
        self.ops
            .iter()
            .filter(|op| !op.failed)
            .map(|op| op.seq)
            .max()
            .unwrap_or(0)
            .max(self.last_synced_seq)
    }

    /// Observable snapshot of the queue, oldest first.
    pub fn pending(&self) -> Vec<PendingOp> {
        self.ops
            .iter()
            .map(|op| PendingOp {
                seq: op.seq,
                label: op.label.to_string(),
                failed: op.failed,
                attempts: op.attempts,
            })
            .collect()
    }
}

/// Everything the coordinator guards under its one state lock.
#[derive(Debug, Default)]
pub(crate) struct EngineState {
    pub local: LocalState,
    pub ops: OpLog,
}
