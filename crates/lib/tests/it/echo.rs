//! How locally staged writes interact with incoming store snapshots.

use basket::store::paths;

use super::helpers::*;

#[tokio::test]
async fn test_optimistic_state_survives_while_a_write_is_in_flight() {
    let (bed, engine, list) = setup_engine_with_list("Groceries").await;

    bed.store.hold_writes();
    let task_engine = engine.clone();
    let add = tokio::spawn(async move {
        task_engine
            .add_manual_item("Bread", 1.0, None, None, None)
            .await
    });

    // The mutation is applied locally before the store accepts it.
    eventually("the optimistic item to appear", || {
        engine.items().len() == 1 && engine.status().is_syncing
    })
    .await;
    assert_eq!(bed.store.doc_count(&paths::items(&list.id)), 0);
    assert_eq!(engine.items()[0].name, "Bread");

    bed.store.release_writes();
    add.await.unwrap().unwrap();

    eventually("the write to be acknowledged", || {
        !engine.status().is_syncing
    })
    .await;
    assert_eq!(engine.items().len(), 1);
    assert_eq!(bed.store.doc_count(&paths::items(&list.id)), 1);
    assert!(engine.pending_ops().is_empty());
}

#[tokio::test]
async fn test_failed_write_stops_shielding_local_state() {
    let (bed, alice_engine, list) = setup_engine_with_list("Groceries").await;
    let bob_engine = join_via_invite(&bed, &alice_engine, &list.id, bob()).await;

    bed.store.fail_next_writes(1);
    alice_engine
        .add_manual_item("Bread", 1.0, None, None, None)
        .await
        .unwrap();

    // The write failed but the op is recorded and the item stays visible.
    assert_eq!(alice_engine.items().len(), 1);
    assert_eq!(alice_engine.pending_ops().len(), 1);
    assert!(alice_engine.status().last_sync_error.is_some());

    // A failed op no longer defers snapshots, so Bob's next write replaces
    // Alice's unsaved view with the store's truth.
    bob_engine
        .add_manual_item("Cheese", 1.0, None, None, None)
        .await
        .unwrap();
    eventually("Alice's view to be overwritten", || {
        let items = alice_engine.items();
        items.len() == 1 && items[0].name == "Cheese"
    })
    .await;

    // Retrying replays the staged writes; the snapshot they trigger brings
    // the item back on both sides.
    assert_eq!(alice_engine.retry_failed_ops().await, 1);
    eventually("both engines to converge on both items", || {
        alice_engine.items().len() == 2 && bob_engine.items().len() == 2
    })
    .await;
    assert!(alice_engine.pending_ops().is_empty());
    assert_eq!(alice_engine.status().last_sync_error, None);
    assert_eq!(bed.store.doc_count(&paths::items(&list.id)), 2);
}

#[tokio::test]
async fn test_concurrent_held_writes_converge_after_release() {
    let (bed, alice_engine, list) = setup_engine_with_list("Groceries").await;
    let bob_engine = join_via_invite(&bed, &alice_engine, &list.id, bob()).await;

    bed.store.hold_writes();
    let a = {
        let engine = alice_engine.clone();
        tokio::spawn(async move { engine.add_manual_item("Bread", 1.0, None, None, None).await })
    };
    let b = {
        let engine = bob_engine.clone();
        tokio::spawn(async move { engine.add_manual_item("Cheese", 1.0, None, None, None).await })
    };

    // Each side only sees its own optimistic item while the store is down.
    eventually("both optimistic items to stage", || {
        alice_engine.items().len() == 1 && bob_engine.items().len() == 1
    })
    .await;
    assert_eq!(bed.store.doc_count(&paths::items(&list.id)), 0);

    bed.store.release_writes();
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    eventually("both engines to see both items", || {
        alice_engine.items().len() == 2 && bob_engine.items().len() == 2
    })
    .await;
    assert_eq!(bed.store.doc_count(&paths::items(&list.id)), 2);
}
