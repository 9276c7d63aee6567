//! Item operations on the active list.
//!
//! All mutations stage writes against the active list's item collection and
//! keep the list's denormalized item count current. Quantities and prices
//! are validated before any state changes.

use tracing::warn;

use crate::costsplit::{self, CostSummary};
use crate::history;
use crate::merge::{self, Contribution, MergeOutcome};
use crate::model::{Id, ShoppingItem, ShoppingList};
use crate::registry::RegistryError;
use crate::store::{Document, paths};

use super::errors::SyncError;
use super::state::{self, EngineState, WriteOp};
use super::{SyncCoordinator, upsert_item_op, upsert_list_op};

/// One ingredient of a recipe being synced onto the active list.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeIngredient {
    pub name: String,
    pub quantity: f64,
    pub unit: Option<String>,
    pub category: Option<String>,
}

fn active_index(st: &EngineState) -> crate::Result<usize> {
    let id = st
        .local
        .active_list_id
        .clone()
        .ok_or(SyncError::NoActiveList)?;
    st.local
        .lists
        .iter()
        .position(|l| l.id == id)
        .ok_or_else(|| RegistryError::ListNotFound { list_id: id }.into())
}

fn item_position(st: &EngineState, item_id: &Id) -> Result<usize, SyncError> {
    st.local
        .items
        .iter()
        .position(|i| i.id == *item_id)
        .ok_or_else(|| SyncError::ItemNotFound {
            item_id: item_id.clone(),
        })
}

/// An updated copy of a list whose denormalized item count tracks `items`.
fn counted(list: &ShoppingList, items: &[ShoppingItem], now: chrono::DateTime<chrono::Utc>) -> ShoppingList {
    let mut list = list.clone();
    list.item_count = items.len() as u32;
    list.updated_at = now;
    list
}

impl SyncCoordinator {
    /// The items of the active list, in creation order.
    pub fn items(&self) -> Vec<ShoppingItem> {
        self.inner().state.lock().unwrap().local.items.clone()
    }

    /// Adds a manually entered item to the active list.
    ///
    /// When an unbought item with the same normalized name and unit already
    /// exists, the quantity folds into it instead of creating a duplicate.
    /// Returns the id of the item that was created or extended.
    pub async fn add_manual_item(
        &self,
        name: impl Into<String>,
        quantity: f64,
        unit: Option<&str>,
        category: Option<String>,
        notes: Option<String>,
    ) -> crate::Result<Id> {
        let inner = self.inner();
        let user = inner.current_user()?;
        if !quantity.is_finite() {
            return Err(SyncError::InvalidQuantity.into());
        }
        let (item_id, seq) = {
            let mut st = inner.state.lock().unwrap();
            let now = inner.now();
            let list_idx = active_index(&st)?;
            let list_id = st.local.lists[list_idx].id.clone();

            let mut items = st.local.items.clone();
            let mut contribution = Contribution::manual(name, quantity, unit, now);
            contribution.category = category;
            contribution.notes = notes;
            let outcome = merge::add_contribution(&mut items, contribution, Some(&user.id), now);
            let item_id = outcome.item_id().clone();

            let mut writes = Vec::new();
            if let Some(item) = items.iter().find(|i| i.id == item_id) {
                writes.push(upsert_item_op(&list_id, item)?);
            }
            let mut list_update = None;
            if matches!(outcome, MergeOutcome::Created(_)) {
                let list = counted(&st.local.lists[list_idx], &items, now);
                writes.push(upsert_list_op(&list)?);
                list_update = Some(list);
            }

            if let Some(list) = list_update {
                st.local.lists[list_idx] = list;
            }
            state::sort_items(&mut items);
            st.local.items = items;
            (item_id, st.ops.stage("add_item", writes))
        };
        inner.persist_staged(seq).await;
        Ok(item_id)
    }

    /// Replaces a recipe's contributions on the active list with the given
    /// ingredient set.
    ///
    /// Existing sources from this recipe are withdrawn first, then each
    /// ingredient is merged back in, so re-syncing a scaled recipe adjusts
    /// quantities instead of stacking them. Items left with no sources are
    /// removed; items fed by other sources survive with reduced totals.
    pub async fn sync_recipe_items(
        &self,
        recipe_id: &Id,
        recipe_name: &str,
        ingredients: Vec<RecipeIngredient>,
    ) -> crate::Result<()> {
        let inner = self.inner();
        let user = inner.current_user()?;
        if ingredients.iter().any(|i| !i.quantity.is_finite()) {
            return Err(SyncError::InvalidQuantity.into());
        }
        let seq = {
            let mut st = inner.state.lock().unwrap();
            let now = inner.now();
            let list_idx = active_index(&st)?;
            let list_id = st.local.lists[list_idx].id.clone();

            let mut items = st.local.items.clone();
            let detachment = merge::remove_recipe_sources(&mut items, recipe_id, now);
            let mut touched: Vec<Id> = detachment.modified;
            for ingredient in &ingredients {
                let mut contribution = Contribution::from_recipe(
                    ingredient.name.clone(),
                    recipe_id.clone(),
                    recipe_name,
                    ingredient.quantity,
                    ingredient.unit.as_deref(),
                    now,
                );
                contribution.category = ingredient.category.clone();
                let outcome =
                    merge::add_contribution(&mut items, contribution, Some(&user.id), now);
                touched.push(outcome.item_id().clone());
            }
            touched.sort();
            touched.dedup();

            let mut docs = Vec::new();
            for id in &touched {
                if let Some(item) = items.iter().find(|i| i.id == *id) {
                    docs.push(Document::from_model(item.id.clone(), item)?);
                }
            }
            let mut writes = Vec::new();
            if !docs.is_empty() {
                writes.push(WriteOp::BatchUpsert {
                    collection: paths::items(&list_id),
                    docs,
                });
            }
            for id in &detachment.removed {
                writes.push(WriteOp::Delete {
                    collection: paths::items(&list_id),
                    id: id.clone(),
                });
            }
            if writes.is_empty() {
                return Ok(());
            }
            let mut list_update = None;
            if items.len() != st.local.items.len() {
                let list = counted(&st.local.lists[list_idx], &items, now);
                writes.push(upsert_list_op(&list)?);
                list_update = Some(list);
            }

            if let Some(list) = list_update {
                st.local.lists[list_idx] = list;
            }
            state::sort_items(&mut items);
            st.local.items = items;
            st.ops.stage("sync_recipe", writes)
        };
        inner.persist_staged(seq).await;
        Ok(())
    }

    /// Withdraws all of a recipe's contributions from the active list.
    ///
    /// Items the recipe fed alone are removed; shared items lose only the
    /// recipe's share. A recipe with no contributions is a no-op.
    pub async fn detach_recipe(&self, recipe_id: &Id) -> crate::Result<()> {
        self.sync_recipe_items(recipe_id, "", Vec::new()).await
    }

    /// Marks an item bought or unbought.
    ///
    /// Buying records the current user on the item and appends to their
    /// purchase history; unbuying clears the buyer but keeps any price so
    /// the amount survives an accidental toggle. Setting the flag an item
    /// already has is a no-op.
    pub async fn set_item_bought(&self, item_id: &Id, bought: bool) -> crate::Result<()> {
        let inner = self.inner();
        let user = inner.current_user()?;
        let staged = {
            let mut st = inner.state.lock().unwrap();
            let now = inner.now();
            let list_idx = active_index(&st)?;
            let list_id = st.local.lists[list_idx].id.clone();
            let pos = item_position(&st, item_id)?;
            if st.local.items[pos].bought == bought {
                None
            } else {
                let mut updated = st.local.items[pos].clone();
                updated.bought = bought;
                updated.bought_by = bought.then(|| user.id.clone());
                updated.updated_at = now;
                let write = upsert_item_op(&list_id, &updated)?;
                let purchased = bought.then(|| updated.clone());
                st.local.items[pos] = updated;
                Some((st.ops.stage("set_bought", vec![write]), purchased))
            }
        };
        let Some((seq, purchased)) = staged else {
            return Ok(());
        };
        inner.persist_staged(seq).await;

        if let Some(item) = purchased {
            let now = inner.now();
            if let Err(e) =
                history::record_purchase(inner.store.as_ref(), &user.id, &item, now).await
            {
                warn!(item_id = %item.id, "Purchase history write failed: {e}");
                inner.state.lock().unwrap().local.last_sync_error =
                    Some(format!("Purchase history write failed: {e}"));
            }
        }
        Ok(())
    }

    /// Sets or clears an item's price.
    pub async fn set_item_price(&self, item_id: &Id, price: Option<f64>) -> crate::Result<()> {
        if let Some(p) = price
            && (!p.is_finite() || p < 0.0)
        {
            return Err(SyncError::InvalidPrice.into());
        }
        let inner = self.inner();
        inner.current_user()?;
        let seq = {
            let mut st = inner.state.lock().unwrap();
            let now = inner.now();
            let list_idx = active_index(&st)?;
            let list_id = st.local.lists[list_idx].id.clone();
            let pos = item_position(&st, item_id)?;
            let mut updated = st.local.items[pos].clone();
            updated.price = price;
            updated.updated_at = now;
            let write = upsert_item_op(&list_id, &updated)?;
            st.local.items[pos] = updated;
            st.ops.stage("set_price", vec![write])
        };
        inner.persist_staged(seq).await;
        Ok(())
    }

    /// Sets or clears an item's note.
    pub async fn set_item_notes(&self, item_id: &Id, notes: Option<String>) -> crate::Result<()> {
        let inner = self.inner();
        inner.current_user()?;
        let seq = {
            let mut st = inner.state.lock().unwrap();
            let now = inner.now();
            let list_idx = active_index(&st)?;
            let list_id = st.local.lists[list_idx].id.clone();
            let pos = item_position(&st, item_id)?;
            let mut updated = st.local.items[pos].clone();
            updated.notes = notes;
            updated.updated_at = now;
            let write = upsert_item_op(&list_id, &updated)?;
            st.local.items[pos] = updated;
            st.ops.stage("set_notes", vec![write])
        };
        inner.persist_staged(seq).await;
        Ok(())
    }

    /// Removes a single item from the active list.
    pub async fn remove_item(&self, item_id: &Id) -> crate::Result<()> {
        let inner = self.inner();
        inner.current_user()?;
        let seq = {
            let mut st = inner.state.lock().unwrap();
            let now = inner.now();
            let list_idx = active_index(&st)?;
            let list_id = st.local.lists[list_idx].id.clone();
            let pos = item_position(&st, item_id)?;

            let mut items = st.local.items.clone();
            items.remove(pos);
            let list = counted(&st.local.lists[list_idx], &items, now);
            let writes = vec![
                WriteOp::Delete {
                    collection: paths::items(&list_id),
                    id: item_id.clone(),
                },
                upsert_list_op(&list)?,
            ];
            st.local.lists[list_idx] = list;
            st.local.items = items;
            st.ops.stage("remove_item", writes)
        };
        inner.persist_staged(seq).await;
        Ok(())
    }

    /// Removes every bought item from the active list. No-op when nothing
    /// is bought.
    pub async fn clear_bought_items(&self) -> crate::Result<()> {
        let inner = self.inner();
        inner.current_user()?;
        let seq = {
            let mut st = inner.state.lock().unwrap();
            let now = inner.now();
            let list_idx = active_index(&st)?;
            let list_id = st.local.lists[list_idx].id.clone();

            let bought: Vec<Id> = st
                .local
                .items
                .iter()
                .filter(|i| i.bought)
                .map(|i| i.id.clone())
                .collect();
            if bought.is_empty() {
                return Ok(());
            }
            let mut items = st.local.items.clone();
            items.retain(|i| !i.bought);
            let list = counted(&st.local.lists[list_idx], &items, now);
            let mut writes: Vec<WriteOp> = bought
                .into_iter()
                .map(|id| WriteOp::Delete {
                    collection: paths::items(&list_id),
                    id,
                })
                .collect();
            writes.push(upsert_list_op(&list)?);
            st.local.lists[list_idx] = list;
            st.local.items = items;
            st.ops.stage("clear_bought", writes)
        };
        inner.persist_staged(seq).await;
        Ok(())
    }

    /// Removes every item from the active list. No-op when the list is
    /// already empty.
    pub async fn clear_all_items(&self) -> crate::Result<()> {
        let inner = self.inner();
        inner.current_user()?;
        let seq = {
            let mut st = inner.state.lock().unwrap();
            let now = inner.now();
            let list_idx = active_index(&st)?;
            let list_id = st.local.lists[list_idx].id.clone();
            if st.local.items.is_empty() {
                return Ok(());
            }
            let list = counted(&st.local.lists[list_idx], &[], now);
            let writes = vec![
                WriteOp::DeleteAll {
                    collection: paths::items(&list_id),
                },
                upsert_list_op(&list)?,
            ];
            st.local.lists[list_idx] = list;
            st.local.items.clear();
            st.ops.stage("clear_all", writes)
        };
        inner.persist_staged(seq).await;
        Ok(())
    }

    /// The cost summary of the active list.
    ///
    /// Fails when the list has cost splitting disabled.
    pub fn cost_summary(&self) -> crate::Result<CostSummary> {
        let inner = self.inner();
        let st = inner.state.lock().unwrap();
        let list_idx = active_index(&st)?;
        Ok(costsplit::summarize(
            &st.local.lists[list_idx],
            &st.local.items,
        )?)
    }

    /// Settles the active list: clears the price and buyer from every item
    /// that counted toward the summary, zeroing all balances.
    ///
    /// Items stay on the list and stay bought. No-op when nothing has been
    /// paid for. Fails when the list has cost splitting disabled.
    pub async fn settle_up(&self) -> crate::Result<()> {
        let inner = self.inner();
        inner.current_user()?;
        let seq = {
            let mut st = inner.state.lock().unwrap();
            let now = inner.now();
            let list_idx = active_index(&st)?;
            let list_id = st.local.lists[list_idx].id.clone();
            if !st.local.lists[list_idx].cost_splitting_enabled {
                return Err(costsplit::CostSplitError::Disabled {
                    list_id: list_id.clone(),
                }
                .into());
            }

            let mut items = st.local.items.clone();
            let mut docs = Vec::new();
            for item in items
                .iter_mut()
                .filter(|i| costsplit::qualifies_for_split(i))
            {
                item.price = None;
                item.bought_by = None;
                item.updated_at = now;
                docs.push(Document::from_model(item.id.clone(), &*item)?);
            }
            if docs.is_empty() {
                return Ok(());
            }
            let writes = vec![WriteOp::BatchUpsert {
                collection: paths::items(&list_id),
                docs,
            }];
            st.local.items = items;
            st.ops.stage("settle_up", writes)
        };
        inner.persist_staged(seq).await;
        Ok(())
    }
}
