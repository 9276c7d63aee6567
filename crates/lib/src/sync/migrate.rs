//! One-time import of the pre-collaboration flat item collection.
//!
//! Earlier releases kept a single implicit list as flat documents under
//! `users/{uid}/shopping_items`. On first open with no lists, those items
//! are folded into a freshly created default list and the flat collection
//! is deleted. Having any list at all is the marker that the import has
//! already happened.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::constants::MIGRATED_LIST_NAME;
use crate::identity::UserProfile;
use crate::merge;
use crate::model::{Id, ItemSource, ShoppingItem};
use crate::registry;
use crate::store::{Document, Query, paths};

use super::state::WriteOp;
use super::{CoordinatorInner, feed, upsert_list_op};

fn default_quantity() -> f64 {
    1.0
}

/// A document from the legacy flat collection.
#[derive(Debug, Deserialize)]
struct LegacyItem {
    name: String,
    #[serde(default = "default_quantity")]
    quantity: f64,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    bought: bool,
}

impl LegacyItem {
    /// Converts into a list item with a single manual source.
    ///
    /// The legacy format had no buyer attribution, so bought items come
    /// through bought but unattributed.
    fn into_item(self, user: &UserProfile, now: chrono::DateTime<chrono::Utc>) -> ShoppingItem {
        ShoppingItem {
            id: Id::generate(),
            normalized_name: merge::normalize_name(&self.name),
            name: self.name,
            category: self.category,
            total_quantity: self.quantity,
            unit: self.unit.clone(),
            bought: self.bought,
            sources: vec![ItemSource::Manual {
                quantity: self.quantity,
                unit: self.unit,
                added_at: now,
            }],
            notes: None,
            added_by: Some(user.id.clone()),
            price: None,
            bought_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Runs the legacy import when the user has no lists but does have flat
/// items. Persist failures are recorded in the op log like any other
/// mutation; the engine still opens.
pub(super) async fn run_if_needed(
    inner: &Arc<CoordinatorInner>,
    user: &UserProfile,
) -> crate::Result<()> {
    {
        let st = inner.state.lock().unwrap();
        if !st.local.lists.is_empty() {
            return Ok(());
        }
    }
    let legacy_path = paths::legacy_items(&user.id);
    let docs = inner
        .store
        .fetch(&Query::collection(legacy_path.as_str()))
        .await?;
    let legacy = feed::parse_docs::<LegacyItem>(&docs, "legacy item");
    if legacy.is_empty() {
        return Ok(());
    }

    let count = legacy.len();
    let seq = {
        let mut st = inner.state.lock().unwrap();
        let now = inner.now();
        let mut list = registry::new_list(MIGRATED_LIST_NAME, user, now);
        let items: Vec<ShoppingItem> = legacy
            .into_iter()
            .map(|old| old.into_item(user, now))
            .collect();
        list.item_count = items.len() as u32;

        let mut item_docs = Vec::with_capacity(items.len());
        for item in &items {
            item_docs.push(Document::from_model(item.id.clone(), item)?);
        }
        let writes = vec![
            upsert_list_op(&list)?,
            WriteOp::BatchUpsert {
                collection: paths::items(&list.id),
                docs: item_docs,
            },
            WriteOp::DeleteAll {
                collection: legacy_path,
            },
        ];
        st.local.lists.push(list);
        st.ops.stage("migrate", writes)
    };
    info!(count, "Importing legacy items into a new list");
    inner.persist_staged(seq).await;
    Ok(())
}
