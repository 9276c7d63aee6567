use std::sync::Arc;
use std::time::Duration;

use basket::cache::{ActiveListCache, InMemoryCache};
use basket::identity::{StaticIdentity, UserProfile};
use basket::model::{ShoppingItem, ShoppingList};
use basket::store::InMemoryStore;
use basket::{FixedClock, Id, SyncCoordinator};

// ==========================
// CORE TEST FACTORIES
// ==========================
// One TestBed per test: a shared store and a shared controllable clock that
// every client engine in the scenario runs against.

/// Shared store and clock for a multi-client scenario.
pub struct TestBed {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
}

impl TestBed {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            clock: Arc::new(FixedClock::default()),
        }
    }

    /// Opens an engine for the given user with a fresh client cache.
    pub async fn open(&self, profile: UserProfile) -> SyncCoordinator {
        self.open_with_cache(profile, Arc::new(InMemoryCache::new()))
            .await
    }

    /// Opens an engine with a specific cache, for restore tests.
    pub async fn open_with_cache(
        &self,
        profile: UserProfile,
        cache: Arc<dyn ActiveListCache>,
    ) -> SyncCoordinator {
        SyncCoordinator::open(
            self.store.clone(),
            Arc::new(StaticIdentity::signed_in(profile)),
            cache,
            self.clock.clone(),
        )
        .await
        .expect("Failed to open engine")
    }
}

pub fn alice() -> UserProfile {
    UserProfile::new("alice", "Alice")
}

pub fn bob() -> UserProfile {
    UserProfile::new("bob", "Bob")
}

pub fn carol() -> UserProfile {
    UserProfile::new("carol", "Carol")
}

/// One engine for Alice on a fresh bed; the common single-client setup.
pub async fn setup_engine() -> (TestBed, SyncCoordinator) {
    let bed = TestBed::new();
    let engine = bed.open(alice()).await;
    (bed, engine)
}

/// Alice's engine with one list already created and active.
pub async fn setup_engine_with_list(name: &str) -> (TestBed, SyncCoordinator, ShoppingList) {
    let (bed, engine) = setup_engine().await;
    let list = engine
        .create_list(name)
        .await
        .expect("Failed to create list");
    (bed, engine, list)
}

/// Opens an engine for `joiner` and joins it to the list via a fresh invite
/// code issued by the owner's engine.
pub async fn join_via_invite(
    bed: &TestBed,
    owner: &SyncCoordinator,
    list_id: &Id,
    joiner: UserProfile,
) -> SyncCoordinator {
    let code = owner
        .generate_invite_code(list_id)
        .await
        .expect("Failed to generate invite code");
    let engine = bed.open(joiner).await;
    engine.join_list(&code).await.expect("Failed to join list");
    engine
}

// ==========================
// ASSERTION HELPERS
// ==========================

/// Polls the condition until it holds, for state that arrives through a
/// feed task rather than the mutation call itself.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("Timed out waiting for: {what}");
}

/// The active list's item with this display name.
pub fn item_named(engine: &SyncCoordinator, name: &str) -> ShoppingItem {
    engine
        .items()
        .into_iter()
        .find(|i| i.name == name)
        .unwrap_or_else(|| panic!("No item named {name}"))
}

/// Float comparison with a tolerance well below the settlement epsilon.
pub fn approx(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-6
}
