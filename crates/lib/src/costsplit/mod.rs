//! Per-member spend, fair share, and minimal settlement transactions.
//!
//! A summary is computed on demand over the locally materialized list and
//! item state; only items that are bought and priced qualify. Settlement uses
//! greedy largest-creditor/largest-debtor matching, which needs at most
//! `members - 1` transactions to zero out every balance.

use std::collections::HashMap;

use thiserror::Error;

use crate::constants::SETTLE_EPSILON;
use crate::model::{Id, ShoppingItem, ShoppingList};

/// Errors from cost-summary computation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CostSplitError {
    /// The list has cost splitting turned off.
    #[error("Cost splitting is not enabled for list {list_id}")]
    Disabled { list_id: Id },
}

impl CostSplitError {
    /// Check if this is the cost-splitting-disabled error.
    pub fn is_disabled(&self) -> bool {
        matches!(self, CostSplitError::Disabled { .. })
    }
}

impl From<CostSplitError> for crate::Error {
    fn from(err: CostSplitError) -> Self {
        crate::Error::CostSplit(err)
    }
}

/// One settlement payment: `from` pays `to` the given amount.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementTransaction {
    pub from: Id,
    pub to: Id,
    pub amount: f64,
}

/// Snapshot of who spent what and who owes whom.
#[derive(Debug, Clone, PartialEq)]
pub struct CostSummary {
    /// Sum of prices over qualifying items.
    pub total: f64,
    /// Qualifying spend attributed to each member via `bought_by`. Every
    /// member appears, including those with zero spend.
    pub per_member: HashMap<Id, f64>,
    /// `total` split equally across all members.
    pub fair_share: f64,
    /// Spend minus fair share per member. Positive is owed money, negative
    /// owes money.
    pub net_balances: HashMap<Id, f64>,
    /// Minimal transaction set that settles all balances.
    pub transactions: Vec<SettlementTransaction>,
    /// Display currency from the list, if set.
    pub currency: Option<String>,
}

/// Returns true if the item counts toward the cost summary.
///
/// Settle-up clears exactly the fields this predicate reads.
pub fn qualifies_for_split(item: &ShoppingItem) -> bool {
    item.bought && item.price.is_some()
}

/// Computes the cost summary for a list over its current items.
///
/// Fails when the list has cost splitting disabled. Qualifying items whose
/// `bought_by` is unset or no longer a member count toward `total` but are
/// not attributed to anyone.
pub fn summarize(
    list: &ShoppingList,
    items: &[ShoppingItem],
) -> Result<CostSummary, CostSplitError> {
    if !list.cost_splitting_enabled {
        return Err(CostSplitError::Disabled {
            list_id: list.id.clone(),
        });
    }

    let mut total = 0.0;
    let mut per_member: HashMap<Id, f64> =
        list.member_ids.iter().map(|id| (id.clone(), 0.0)).collect();
    for item in items.iter().filter(|i| qualifies_for_split(i)) {
        let price = item.price.unwrap_or_default();
        total += price;
        if let Some(spend) = item.bought_by.as_ref().and_then(|uid| per_member.get_mut(uid)) {
            *spend += price;
        }
    }

    let fair_share = total / list.member_ids.len() as f64;
    let net_balances: HashMap<Id, f64> = per_member
        .iter()
        .map(|(id, spend)| (id.clone(), spend - fair_share))
        .collect();
    let transactions = settle(&net_balances, &list.member_ids);

    Ok(CostSummary {
        total,
        per_member,
        fair_share,
        net_balances,
        transactions,
        currency: list.currency.clone(),
    })
}

/// Greedy minimal-transaction settlement.
///
/// Repeatedly matches the largest-magnitude creditor with the
/// largest-magnitude debtor until every balance is within epsilon of zero.
/// `order` fixes the scan order so ties resolve deterministically.
fn settle(net_balances: &HashMap<Id, f64>, order: &[Id]) -> Vec<SettlementTransaction> {
    let mut creditors: Vec<(Id, f64)> = Vec::new();
    let mut debtors: Vec<(Id, f64)> = Vec::new();
    for id in order {
        match net_balances.get(id) {
            Some(&balance) if balance > SETTLE_EPSILON => creditors.push((id.clone(), balance)),
            Some(&balance) if balance < -SETTLE_EPSILON => debtors.push((id.clone(), -balance)),
            _ => {}
        }
    }

    let mut transactions = Vec::new();
    while !creditors.is_empty() && !debtors.is_empty() {
        let ci = largest(&creditors);
        let di = largest(&debtors);
        let amount = creditors[ci].1.min(debtors[di].1);
        transactions.push(SettlementTransaction {
            from: debtors[di].0.clone(),
            to: creditors[ci].0.clone(),
            amount,
        });
        creditors[ci].1 -= amount;
        debtors[di].1 -= amount;
        if creditors[ci].1 <= SETTLE_EPSILON {
            creditors.remove(ci);
        }
        if debtors[di].1 <= SETTLE_EPSILON {
            debtors.remove(di);
        }
    }
    transactions
}

fn largest(balances: &[(Id, f64)]) -> usize {
    let mut best = 0;
    for (i, entry) in balances.iter().enumerate().skip(1) {
        if entry.1 > balances[best].1 {
            best = i;
        }
    }
    best
}
