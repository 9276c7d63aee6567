//! Item identity and multi-source merging.
//!
//! Every addition to a shopping list is a [`Contribution`]: a display name
//! plus one [`ItemSource`] (a manual entry or one recipe's ingredient).
//! Contributions with the same identity key, the normalized name together
//! with the unit, merge into a single [`ShoppingItem`] that accumulates
//! sources and quantity. Different units for the same name stay distinct
//! items.
//!
//! All functions here are pure over the in-memory item set; persistence of
//! the affected documents is the caller's concern, which is why the entry
//! points report exactly which items they touched.

use chrono::{DateTime, Utc};

use crate::model::{Id, ItemSource, ShoppingItem};

/// Canonical identity for a shopping item.
///
/// Two contributions merge into one line item exactly when their keys are
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub normalized_name: String,
    pub unit: Option<String>,
}

impl ItemKey {
    /// Builds the key for a raw display name and unit.
    pub fn new(name: &str, unit: Option<&str>) -> Self {
        Self {
            normalized_name: normalize_name(name),
            unit: unit.map(str::to_string),
        }
    }

    /// The key an existing item is filed under.
    pub fn for_item(item: &ShoppingItem) -> Self {
        Self {
            normalized_name: item.normalized_name.clone(),
            unit: item.unit.clone(),
        }
    }
}

/// Normalizes a display name into its identity component.
///
/// Lowercases, trims, and collapses internal whitespace runs to single
/// spaces. Deterministic and pure.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One addition to the item set: a display name, optional metadata, and the
/// source that contributes the quantity.
///
/// Quantity and unit live on the source so the quantity invariant has a
/// single authority.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub name: String,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub source: ItemSource,
}

impl Contribution {
    /// A plain manual contribution with no category or notes.
    pub fn manual(
        name: impl Into<String>,
        quantity: f64,
        unit: Option<&str>,
        added_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            category: None,
            notes: None,
            source: ItemSource::Manual {
                quantity,
                unit: unit.map(str::to_string),
                added_at,
            },
        }
    }

    /// One recipe ingredient as a contribution.
    pub fn from_recipe(
        name: impl Into<String>,
        recipe_id: Id,
        recipe_name: impl Into<String>,
        quantity: f64,
        unit: Option<&str>,
        added_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            category: None,
            notes: None,
            source: ItemSource::Recipe {
                recipe_id,
                recipe_name: recipe_name.into(),
                quantity,
                unit: unit.map(str::to_string),
                added_at,
            },
        }
    }

    /// Sets the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// What [`add_contribution`] did, carrying the id of the touched item so the
/// caller can persist exactly that document.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// No item matched the identity key; a new one was created.
    Created(Id),
    /// The contribution merged into an existing item.
    Merged(Id),
}

impl MergeOutcome {
    /// Id of the created or merged item.
    pub fn item_id(&self) -> &Id {
        match self {
            MergeOutcome::Created(id) | MergeOutcome::Merged(id) => id,
        }
    }
}

/// Adds one contribution to the item set, merging by identity key.
///
/// When an item with the contribution's key exists, the source is appended,
/// the total quantity grows by the source's quantity, and `updated_at` is
/// refreshed; existing `category` and `bought` state are preserved, and
/// `notes` are taken from the contribution only if the item has none yet.
/// Otherwise a fresh unbought item is created.
///
/// Additive, not idempotent: the same manual input twice yields two sources
/// and a doubled total, since each call represents a distinct real-world
/// addition.
pub fn add_contribution(
    items: &mut Vec<ShoppingItem>,
    contribution: Contribution,
    added_by: Option<&Id>,
    now: DateTime<Utc>,
) -> MergeOutcome {
    let Contribution {
        name,
        category,
        notes,
        source,
    } = contribution;
    let key = ItemKey::new(&name, source.unit());
    let quantity = source.quantity();

    if let Some(item) = items.iter_mut().find(|i| ItemKey::for_item(i) == key) {
        item.sources.push(source);
        item.total_quantity += quantity;
        if item.notes.is_none() && notes.is_some() {
            item.notes = notes;
        }
        item.updated_at = now;
        return MergeOutcome::Merged(item.id.clone());
    }

    let id = Id::generate();
    items.push(ShoppingItem {
        id: id.clone(),
        name,
        normalized_name: key.normalized_name,
        category,
        total_quantity: quantity,
        unit: key.unit,
        bought: false,
        sources: vec![source],
        notes,
        added_by: added_by.cloned(),
        price: None,
        bought_by: None,
        created_at: now,
        updated_at: now,
    });
    MergeOutcome::Created(id)
}

/// Items touched by [`remove_recipe_sources`], split by fate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeDetachment {
    /// Items that lost sources but still have at least one left.
    pub modified: Vec<Id>,
    /// Items whose last source came from the recipe; they no longer exist.
    pub removed: Vec<Id>,
}

impl RecipeDetachment {
    /// True when the recipe had contributed nothing.
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Strips every source contributed by the given recipe, in one atomic pass
/// over the whole item set.
///
/// Items left with no sources are dropped entirely; items with remaining
/// sources get their total recomputed from what is left and a fresh
/// `updated_at`. Untouched items are not reported.
pub fn remove_recipe_sources(
    items: &mut Vec<ShoppingItem>,
    recipe_id: &Id,
    now: DateTime<Utc>,
) -> RecipeDetachment {
    let mut detachment = RecipeDetachment::default();
    items.retain_mut(|item| {
        let before = item.sources.len();
        item.sources.retain(|s| s.recipe_id() != Some(recipe_id));
        if item.sources.len() == before {
            return true;
        }
        if item.sources.is_empty() {
            detachment.removed.push(item.id.clone());
            false
        } else {
            item.total_quantity = item.summed_source_quantity();
            item.updated_at = now;
            detachment.modified.push(item.id.clone());
            true
        }
    });
    detachment
}
