//! Pending-op lifecycle when the store rejects writes.

use basket::store::{DocumentStore, paths};

use super::helpers::*;

#[tokio::test]
async fn test_persist_failure_is_recorded_and_state_kept() {
    let (bed, engine, list) = setup_engine_with_list("Groceries").await;

    bed.store.fail_next_writes(1);
    engine
        .add_manual_item("Bread", 1.0, None, None, None)
        .await
        .unwrap();

    // The mutation itself succeeds; only the persist failed.
    assert_eq!(engine.items().len(), 1);
    assert_eq!(bed.store.doc_count(&paths::items(&list.id)), 0);

    let status = engine.status();
    assert!(!status.is_syncing);
    assert!(status.last_sync_error.is_some());

    let pending = engine.pending_ops();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].label, "add_item");
    assert!(pending[0].failed);
    assert_eq!(pending[0].attempts, 1);
}

#[tokio::test]
async fn test_retry_succeeds_after_recovery() {
    let (bed, engine, list) = setup_engine_with_list("Groceries").await;

    bed.store.fail_next_writes(1);
    engine
        .add_manual_item("Bread", 1.0, None, None, None)
        .await
        .unwrap();
    assert_eq!(engine.pending_ops().len(), 1);

    assert_eq!(engine.retry_failed_ops().await, 1);

    assert!(engine.pending_ops().is_empty());
    assert_eq!(engine.status().last_sync_error, None);
    assert_eq!(bed.store.doc_count(&paths::items(&list.id)), 1);
    assert_eq!(engine.items().len(), 1);

    // Nothing left to retry.
    assert_eq!(engine.retry_failed_ops().await, 0);
}

#[tokio::test]
async fn test_discard_keeps_local_state_until_the_next_snapshot() {
    let (bed, alice_engine, list) = setup_engine_with_list("Groceries").await;
    let bob_engine = join_via_invite(&bed, &alice_engine, &list.id, bob()).await;

    bed.store.fail_next_writes(1);
    alice_engine
        .add_manual_item("Bread", 1.0, None, None, None)
        .await
        .unwrap();

    assert_eq!(alice_engine.discard_failed_ops(), 1);
    assert!(alice_engine.pending_ops().is_empty());
    // Discarding gives up on the write without rolling back the view.
    assert_eq!(alice_engine.items().len(), 1);

    // The next snapshot restores the store's truth: Bob's item, no Bread.
    bob_engine
        .add_manual_item("Cheese", 1.0, None, None, None)
        .await
        .unwrap();
    eventually("the discarded item to disappear", || {
        let items = alice_engine.items();
        items.len() == 1 && items[0].name == "Cheese"
    })
    .await;
    assert_eq!(bed.store.doc_count(&paths::items(&list.id)), 1);
}

#[tokio::test]
async fn test_later_ops_proceed_past_a_failed_one() {
    let (bed, engine, list) = setup_engine_with_list("Groceries").await;

    bed.store.fail_next_writes(1);
    engine
        .add_manual_item("Bread", 1.0, None, None, None)
        .await
        .unwrap();
    engine
        .add_manual_item("Cheese", 1.0, None, None, None)
        .await
        .unwrap();

    // Cheese landed; its snapshot overwrote the unsaved Bread.
    assert_eq!(bed.store.doc_count(&paths::items(&list.id)), 1);
    eventually("the failed item to drop out", || {
        let items = engine.items();
        items.len() == 1 && items[0].name == "Cheese"
    })
    .await;
    let pending = engine.pending_ops();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].failed);

    assert_eq!(engine.retry_failed_ops().await, 1);
    eventually("both items to be present", || engine.items().len() == 2).await;
    assert_eq!(bed.store.doc_count(&paths::items(&list.id)), 2);
}

#[tokio::test]
async fn test_retry_replays_every_write_of_the_op() {
    let (bed, engine, list) = setup_engine_with_list("Groceries").await;

    // The first write of the op fails, so the list-count refresh that
    // follows it in the same op is never attempted.
    bed.store.fail_next_writes(1);
    engine
        .add_manual_item("Bread", 1.0, None, None, None)
        .await
        .unwrap();
    assert_eq!(bed.store.doc_count(&paths::items(&list.id)), 0);
    let doc = bed.store.get(paths::LISTS, &list.id).await.unwrap().unwrap();
    let stored: basket::model::ShoppingList = doc.parse().unwrap();
    assert_eq!(stored.item_count, 0);

    assert_eq!(engine.retry_failed_ops().await, 1);

    assert_eq!(bed.store.doc_count(&paths::items(&list.id)), 1);
    let doc = bed.store.get(paths::LISTS, &list.id).await.unwrap().unwrap();
    let stored: basket::model::ShoppingList = doc.parse().unwrap();
    assert_eq!(stored.item_count, 1);
}
