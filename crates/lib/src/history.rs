//! Per-user purchase history.
//!
//! An append-only log written whenever an item transitions to bought, capped
//! at the most recent [`PURCHASE_HISTORY_CAP`] entries. Global per user, not
//! per list; un-buying an item does not erase what was recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::PURCHASE_HISTORY_CAP;
use crate::model::{Id, ShoppingItem};
use crate::store::{Document, DocumentStore, Query, StoreError, paths};

/// One recorded purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseHistoryEntry {
    pub item_name: String,
    pub normalized_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub purchased_at: DateTime<Utc>,
}

impl PurchaseHistoryEntry {
    /// Captures an item at the moment it was bought.
    pub fn from_item(item: &ShoppingItem, purchased_at: DateTime<Utc>) -> Self {
        Self {
            item_name: item.name.clone(),
            normalized_name: item.normalized_name.clone(),
            category: item.category.clone(),
            quantity: item.total_quantity,
            unit: item.unit.clone(),
            purchased_at,
        }
    }
}

/// Appends one purchase to the user's history, then trims the log back to
/// the cap, deleting the oldest entries first.
///
/// Writes are unstamped: history never participates in echo suppression.
pub(crate) async fn record_purchase(
    store: &dyn DocumentStore,
    user_id: &Id,
    item: &ShoppingItem,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let collection = paths::purchase_history(user_id);
    let entry = PurchaseHistoryEntry::from_item(item, now);
    let doc = Document::from_model(Id::generate(), &entry)?;
    store.upsert(&collection, doc, None).await?;
    trim(store, &collection).await
}

/// The user's recorded purchases, newest first.
pub async fn recent_purchases(
    store: &dyn DocumentStore,
    user_id: &Id,
) -> Result<Vec<PurchaseHistoryEntry>, StoreError> {
    let collection = paths::purchase_history(user_id);
    let mut entries: Vec<PurchaseHistoryEntry> = store
        .fetch(&Query::collection(&collection))
        .await?
        .iter()
        .filter_map(|doc| doc.parse().ok())
        .collect();
    entries.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at));
    Ok(entries)
}

async fn trim(store: &dyn DocumentStore, collection: &str) -> Result<(), StoreError> {
    let docs = store.fetch(&Query::collection(collection)).await?;
    if docs.len() <= PURCHASE_HISTORY_CAP {
        return Ok(());
    }

    let mut dated: Vec<(DateTime<Utc>, Id)> = docs
        .iter()
        .filter_map(|doc| {
            let entry: PurchaseHistoryEntry = match doc.parse() {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(id = %doc.id, "Skipping unreadable history entry: {e}");
                    return None;
                }
            };
            Some((entry.purchased_at, doc.id.clone()))
        })
        .collect();
    dated.sort();

    let excess = docs.len().saturating_sub(PURCHASE_HISTORY_CAP);
    for (_, id) in dated.into_iter().take(excess) {
        store.delete(collection, &id, None).await?;
    }
    Ok(())
}
