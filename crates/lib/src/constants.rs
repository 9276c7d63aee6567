//! Constants used throughout the Basket crate.

use std::time::Duration;

/// Interval between presence heartbeat writes for the active list.
pub const PRESENCE_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Age beyond which a presence entry no longer counts as "actively viewing".
pub const PRESENCE_STALE_AFTER: Duration = Duration::from_secs(5 * 60);

/// Maximum number of purchase-history entries retained per user.
pub const PURCHASE_HISTORY_CAP: usize = 100;

/// Length of generated invite codes.
pub const INVITE_CODE_LEN: usize = 10;

/// Balances within this margin of zero are considered settled.
pub const SETTLE_EPSILON: f64 = 0.005;

/// Name given to the list created by the legacy single-list migration.
pub const MIGRATED_LIST_NAME: &str = "My shopping list";
