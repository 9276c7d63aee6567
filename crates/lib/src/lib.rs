//!
//! Basket: a collaborative shopping-list engine. Shared, synced, settled.
//! This library provides the core components for multi-user list keeping on
//! top of a pluggable document store.
//!
//! ## Core Concepts
//!
//! * **Models (`model`)**: The shared vocabulary: `Id`, `ShoppingList`, `ShoppingItem` with its contributing `ItemSource`s, and `ListPresenceEntry`.
//! * **Merge engine (`merge`)**: Folds contributions into list items keyed by normalized name plus unit, so "Milk 1 L" twice becomes one item with quantity 2.
//! * **Registry (`registry`)**: List lifecycle, membership roles, and invite codes.
//! * **Cost splitting (`costsplit`)**: Equal-share balances over bought-and-priced items and a greedy settlement plan.
//! * **Stores (`store::DocumentStore`)**: A pluggable document store with filtered queries and push-based change feeds. `store::InMemoryStore` is the bundled implementation.
//! * **Coordinator (`sync::SyncCoordinator`)**: The engine facade: optimistic local mutation, stamped asynchronous persistence with a pending-op log, snapshot reconciliation, and presence heartbeats.
//! * **Identity and cache (`identity`, `cache`)**: Who is signed in, and which list was last active on this device.

pub mod cache;
pub mod clock;
pub mod constants;
pub mod costsplit;
pub mod history;
pub mod identity;
pub mod merge;
pub mod model;
pub mod presence;
pub mod registry;
pub mod store;
pub mod sync;

/// Re-export the engine facade for easier access.
pub use sync::SyncCoordinator;

/// Re-export the id type used by every model.
pub use model::Id;

/// Re-export the time source used for presence and timestamps.
pub use clock::{Clock, FixedClock, SystemClock};

/// Result type used throughout the Basket library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Basket library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structured identity errors from the identity module
    #[error(transparent)]
    Identity(identity::IdentityError),

    /// Structured list lifecycle and membership errors from the registry module
    #[error(transparent)]
    Registry(registry::RegistryError),

    /// Structured storage errors from the store module
    #[error(transparent)]
    Store(store::StoreError),

    /// Structured coordinator errors from the sync module
    #[error(transparent)]
    Sync(sync::SyncError),

    /// Structured cost-splitting errors from the costsplit module
    #[error(transparent)]
    CostSplit(costsplit::CostSplitError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Identity(_) => "identity",
            Error::Registry(_) => "registry",
            Error::Store(_) => "store",
            Error::Sync(_) => "sync",
            Error::CostSplit(_) => "costsplit",
        }
    }

    /// Check if this error indicates nobody is signed in.
    pub fn is_signed_out(&self) -> bool {
        matches!(self, Error::Identity(e) if e.is_signed_out())
    }

    /// Check if this error indicates a list or item was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Registry(e) => e.is_not_found(),
            Error::Sync(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates the acting user lacks the required role.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Error::Registry(e) => e.is_permission_denied(),
            _ => false,
        }
    }

    /// Check if this error indicates a bad or disabled invite code.
    pub fn is_invite_invalid(&self) -> bool {
        match self {
            Error::Registry(e) => e.is_invite_invalid(),
            _ => false,
        }
    }

    /// Check if this error indicates a rejected quantity or price.
    pub fn is_invalid_value(&self) -> bool {
        match self {
            Error::Sync(e) => e.is_invalid_value(),
            _ => false,
        }
    }

    /// Check if this error indicates the store could not be reached.
    pub fn is_store_unavailable(&self) -> bool {
        match self {
            Error::Store(e) => e.is_unavailable(),
            _ => false,
        }
    }

    /// Check if this error indicates cost splitting is off for the list.
    pub fn is_cost_splitting_disabled(&self) -> bool {
        match self {
            Error::CostSplit(e) => e.is_disabled(),
            _ => false,
        }
    }
}
