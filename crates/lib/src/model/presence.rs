//! Presence heartbeat entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// One user's liveness heartbeat for one list.
///
/// Stored in the list's presence collection under the user's id; `last_seen`
/// is refreshed by the heartbeat and read by the staleness filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPresenceEntry {
    pub user_id: Id,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub last_seen: DateTime<Utc>,
}
