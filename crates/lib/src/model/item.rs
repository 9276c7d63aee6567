//! Shopping item and contribution-source types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// One discrete contribution to a merged shopping item.
///
/// Sources are append-only except when a recipe's contribution is explicitly
/// removed or recomputed. Every consumer matches exhaustively on the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemSource {
    /// Typed in by hand.
    Manual {
        quantity: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
        added_at: DateTime<Utc>,
    },
    /// One recipe's ingredient contribution.
    Recipe {
        recipe_id: Id,
        recipe_name: String,
        quantity: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
        added_at: DateTime<Utc>,
    },
}

impl ItemSource {
    /// Quantity this source contributes to the item total.
    pub fn quantity(&self) -> f64 {
        match self {
            ItemSource::Manual { quantity, .. } => *quantity,
            ItemSource::Recipe { quantity, .. } => *quantity,
        }
    }

    /// Unit this source was expressed in.
    pub fn unit(&self) -> Option<&str> {
        match self {
            ItemSource::Manual { unit, .. } => unit.as_deref(),
            ItemSource::Recipe { unit, .. } => unit.as_deref(),
        }
    }

    /// When this contribution was added.
    pub fn added_at(&self) -> DateTime<Utc> {
        match self {
            ItemSource::Manual { added_at, .. } => *added_at,
            ItemSource::Recipe { added_at, .. } => *added_at,
        }
    }

    /// The contributing recipe's id, or `None` for manual entries.
    pub fn recipe_id(&self) -> Option<&Id> {
        match self {
            ItemSource::Manual { .. } => None,
            ItemSource::Recipe { recipe_id, .. } => Some(recipe_id),
        }
    }
}

/// A single line item on a shopping list, merged from one or more sources.
///
/// Invariants maintained by the merge engine:
/// - `total_quantity` equals the sum of `sources[i].quantity()`.
/// - `sources` is never empty; an item whose last source is removed is
///   deleted instead.
/// - Two items on the same list never share an identity key
///   (`normalized_name` plus `unit`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingItem {
    pub id: Id,
    /// Display name as first entered.
    pub name: String,
    /// Identity component: lowercased, trimmed, whitespace-collapsed `name`.
    pub normalized_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub total_quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub bought: bool,
    pub sources: Vec<ItemSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_by: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bought_by: Option<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShoppingItem {
    /// Sum of the quantities of all sources.
    ///
    /// Equal to `total_quantity` whenever the merge-engine invariant holds;
    /// used to recompute the total after sources are removed.
    pub fn summed_source_quantity(&self) -> f64 {
        self.sources.iter().map(ItemSource::quantity).sum()
    }

    /// Returns true if any source came from the given recipe.
    pub fn has_recipe_source(&self, recipe_id: &Id) -> bool {
        self.sources.iter().any(|s| s.recipe_id() == Some(recipe_id))
    }
}
