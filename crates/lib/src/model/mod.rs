//! Shared data model for lists, items, membership, and presence.
//!
//! Everything here is plain serde-serializable data; behavior lives in the
//! component modules (`merge`, `registry`, `costsplit`, `presence`, `sync`).

mod id;
mod item;
mod list;
mod presence;

pub use id::Id;
pub use item::{ItemSource, ShoppingItem};
pub use list::{ListMember, MemberRole, ShoppingList};
pub use presence::ListPresenceEntry;
