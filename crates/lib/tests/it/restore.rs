//! Engine open: session restore from the client-side cache.

use std::sync::Arc;

use basket::Id;
use basket::cache::{ActiveListCache, InMemoryCache};
use basket::identity::StaticIdentity;
use basket::sync::SyncCoordinator;
use chrono::Duration;

use super::helpers::*;

#[tokio::test]
async fn test_cached_active_list_is_restored() {
    let bed = TestBed::new();
    let cache = Arc::new(InMemoryCache::new());

    let engine = bed.open_with_cache(alice(), cache.clone()).await;
    engine.create_list("First").await.unwrap();
    bed.clock.advance(Duration::seconds(1));
    let second = engine.create_list("Second").await.unwrap();
    engine.set_active_list(Some(second.id.clone())).await.unwrap();
    engine.shutdown().await;

    let engine = bed.open_with_cache(alice(), cache.clone()).await;
    assert_eq!(engine.active_list().unwrap().id, second.id);
    assert_eq!(engine.active_list().unwrap().name, "Second");
}

#[tokio::test]
async fn test_unresolvable_cache_falls_back_to_the_first_list() {
    let bed = TestBed::new();

    let engine = bed.open(alice()).await;
    let first = engine.create_list("First").await.unwrap();
    bed.clock.advance(Duration::seconds(1));
    engine.create_list("Second").await.unwrap();
    engine.shutdown().await;

    // A cache entry for a list that was deleted, or was never ours.
    let cache = Arc::new(InMemoryCache::new());
    cache.set_last_active_list(Some(&Id::new("ghost")));

    let engine = bed.open_with_cache(alice(), cache.clone()).await;
    assert_eq!(engine.active_list().unwrap().id, first.id);
    // The cache now remembers the fallback.
    assert_eq!(cache.last_active_list(), Some(first.id));
}

#[tokio::test]
async fn test_no_lists_means_no_active_selection() {
    let bed = TestBed::new();
    let cache = Arc::new(InMemoryCache::new());

    let engine = bed.open_with_cache(alice(), cache.clone()).await;

    assert!(engine.lists().is_empty());
    assert_eq!(engine.active_list(), None);
    assert_eq!(cache.last_active_list(), None);
}

#[tokio::test]
async fn test_open_requires_a_signed_in_user() {
    let bed = TestBed::new();

    let err = SyncCoordinator::open(
        bed.store.clone(),
        Arc::new(StaticIdentity::signed_out()),
        Arc::new(InMemoryCache::new()),
        bed.clock.clone(),
    )
    .await
    .unwrap_err();

    assert!(err.is_signed_out());
}
