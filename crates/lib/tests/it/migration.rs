//! Importing pre-sharing single-user item collections on first open.

use basket::Id;
use basket::constants::MIGRATED_LIST_NAME;
use basket::history;
use basket::model::ItemSource;
use basket::store::{Document, DocumentStore, paths};
use serde_json::json;

use super::helpers::*;

async fn seed_legacy(bed: &TestBed, doc_id: &str, data: serde_json::Value) {
    bed.store
        .upsert(
            &paths::legacy_items(&Id::new("alice")),
            Document::new(Id::new(doc_id), data),
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_legacy_items_become_a_new_list_on_first_open() {
    let bed = TestBed::new();
    seed_legacy(
        &bed,
        "lg1",
        json!({"name": "Milk", "quantity": 2.0, "unit": "L", "category": "Dairy", "bought": true}),
    )
    .await;
    // Old documents often carried only a name.
    seed_legacy(&bed, "lg2", json!({"name": "Bread"})).await;

    let engine = bed.open(alice()).await;

    let lists = engine.lists();
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].name, MIGRATED_LIST_NAME);
    assert_eq!(lists[0].owner_id, Id::new("alice"));
    assert_eq!(lists[0].item_count, 2);
    assert_eq!(engine.active_list().unwrap().id, lists[0].id);

    assert_eq!(engine.items().len(), 2);
    let milk = item_named(&engine, "Milk");
    assert!(approx(milk.total_quantity, 2.0));
    assert_eq!(milk.unit.as_deref(), Some("L"));
    assert_eq!(milk.category.as_deref(), Some("Dairy"));
    assert!(milk.bought);
    // Legacy items never recorded who bought them.
    assert_eq!(milk.bought_by, None);
    assert_eq!(milk.added_by, Some(Id::new("alice")));
    assert_eq!(milk.sources.len(), 1);
    assert!(matches!(milk.sources[0], ItemSource::Manual { .. }));

    let bread = item_named(&engine, "Bread");
    assert!(approx(bread.total_quantity, 1.0));
    assert_eq!(bread.unit, None);
    assert!(!bread.bought);

    // The old collection is gone and nothing leaked into purchase history.
    assert_eq!(
        bed.store.doc_count(&paths::legacy_items(&Id::new("alice"))),
        0
    );
    assert_eq!(bed.store.doc_count(&paths::items(&lists[0].id)), 2);
    let purchases = history::recent_purchases(bed.store.as_ref(), &"alice".into())
        .await
        .unwrap();
    assert!(purchases.is_empty());
}

#[tokio::test]
async fn test_migration_runs_only_once() {
    let bed = TestBed::new();
    seed_legacy(&bed, "lg1", json!({"name": "Milk", "quantity": 1.0})).await;

    let engine = bed.open(alice()).await;
    assert_eq!(engine.lists().len(), 1);
    engine.shutdown().await;

    let engine = bed.open(alice()).await;
    assert_eq!(engine.lists().len(), 1);
    assert_eq!(engine.items().len(), 1);
    assert_eq!(bed.store.doc_count(paths::LISTS), 1);
}

#[tokio::test]
async fn test_no_migration_when_the_user_already_has_lists() {
    let bed = TestBed::new();
    let engine = bed.open(alice()).await;
    engine.create_list("Mine").await.unwrap();
    engine.shutdown().await;

    seed_legacy(&bed, "lg1", json!({"name": "Milk", "quantity": 1.0})).await;

    let engine = bed.open(alice()).await;
    assert_eq!(engine.lists().len(), 1);
    assert_eq!(engine.lists()[0].name, "Mine");
    assert_eq!(
        bed.store.doc_count(&paths::legacy_items(&Id::new("alice"))),
        1
    );
}

#[tokio::test]
async fn test_unreadable_legacy_docs_are_left_in_place() {
    let bed = TestBed::new();
    seed_legacy(&bed, "lg1", json!({"count": 3})).await;

    let engine = bed.open(alice()).await;

    // Nothing readable to import, so nothing is created or deleted.
    assert!(engine.lists().is_empty());
    assert_eq!(
        bed.store.doc_count(&paths::legacy_items(&Id::new("alice"))),
        1
    );
}

#[tokio::test]
async fn test_mixed_legacy_docs_import_the_readable_ones() {
    let bed = TestBed::new();
    seed_legacy(&bed, "lg1", json!({"name": "Milk", "quantity": 1.0})).await;
    seed_legacy(&bed, "lg2", json!({"count": 3})).await;

    let engine = bed.open(alice()).await;

    assert_eq!(engine.lists().len(), 1);
    assert_eq!(engine.items().len(), 1);
    assert_eq!(
        bed.store.doc_count(&paths::legacy_items(&Id::new("alice"))),
        0
    );
}
