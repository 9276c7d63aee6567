use chrono::Duration;

use basket::Id;
use basket::constants::INVITE_CODE_LEN;
use basket::model::MemberRole;
use basket::store::{DocumentStore, paths};

use super::helpers::*;

#[tokio::test]
async fn test_create_list_sets_owner_and_becomes_active() {
    let (bed, engine) = setup_engine().await;

    let list = engine.create_list("Groceries").await.unwrap();

    assert_eq!(list.name, "Groceries");
    assert_eq!(list.owner_id, "alice");
    assert_eq!(list.member_ids, vec![Id::new("alice")]);
    assert_eq!(list.role_of(&"alice".into()), Some(MemberRole::Owner));
    assert_eq!(list.item_count, 0);
    assert!(!list.invite_enabled);

    // The first list becomes active automatically.
    assert_eq!(engine.active_list().unwrap().id, list.id);
    assert_eq!(engine.lists().len(), 1);
    assert_eq!(bed.store.doc_count(paths::LISTS), 1);
}

#[tokio::test]
async fn test_later_lists_do_not_steal_the_active_slot() {
    let (_bed, engine) = setup_engine().await;

    let first = engine.create_list("Groceries").await.unwrap();
    let _second = engine.create_list("Hardware").await.unwrap();

    assert_eq!(engine.active_list().unwrap().id, first.id);
    assert_eq!(engine.lists().len(), 2);
}

#[tokio::test]
async fn test_lists_are_ordered_by_creation() {
    let (bed, engine) = setup_engine().await;

    engine.create_list("Zoo trip").await.unwrap();
    bed.clock.advance(Duration::seconds(1));
    engine.create_list("Apples").await.unwrap();

    let names: Vec<String> = engine.lists().into_iter().map(|l| l.name).collect();
    assert_eq!(names, vec!["Zoo trip", "Apples"]);
}

#[tokio::test]
async fn test_rename_list_updates_store() {
    let (bed, engine, list) = setup_engine_with_list("Groceries").await;

    engine.rename_list(&list.id, "Weekly shop").await.unwrap();

    assert_eq!(engine.active_list().unwrap().name, "Weekly shop");
    let doc = bed.store.get(paths::LISTS, &list.id).await.unwrap().unwrap();
    let stored: basket::model::ShoppingList = doc.parse().unwrap();
    assert_eq!(stored.name, "Weekly shop");
}

#[tokio::test]
async fn test_rename_requires_owner() {
    let (bed, engine, list) = setup_engine_with_list("Groceries").await;
    let bob_engine = join_via_invite(&bed, &engine, &list.id, bob()).await;

    let err = bob_engine
        .rename_list(&list.id, "Bob's list")
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());

    assert_eq!(bob_engine.active_list().unwrap().name, "Groceries");
}

#[tokio::test]
async fn test_invite_code_round_trip() {
    let (bed, engine, list) = setup_engine_with_list("Groceries").await;

    let code = engine.generate_invite_code(&list.id).await.unwrap();
    assert_eq!(code.len(), INVITE_CODE_LEN);
    assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));

    let bob_engine = bed.open(bob()).await;
    let joined = bob_engine.join_list(&code).await.unwrap();

    assert_eq!(joined.id, list.id);
    assert_eq!(joined.role_of(&"bob".into()), Some(MemberRole::Editor));
    // Joining opens the list.
    assert_eq!(bob_engine.active_list().unwrap().id, list.id);

    // The owner sees the new member arrive through the feed.
    eventually("Alice to see Bob as a member", || {
        engine
            .lists()
            .first()
            .is_some_and(|l| l.is_member(&"bob".into()))
    })
    .await;
}

#[tokio::test]
async fn test_rotating_the_invite_code_invalidates_the_old_one() {
    let (bed, engine, list) = setup_engine_with_list("Groceries").await;

    let old_code = engine.generate_invite_code(&list.id).await.unwrap();
    let new_code = engine.generate_invite_code(&list.id).await.unwrap();
    assert_ne!(old_code, new_code);

    let bob_engine = bed.open(bob()).await;
    let err = bob_engine.join_list(&old_code).await.unwrap_err();
    assert!(err.is_invite_invalid());

    bob_engine.join_list(&new_code).await.unwrap();
}

#[tokio::test]
async fn test_disabled_invite_rejects_joins() {
    let (bed, engine, list) = setup_engine_with_list("Groceries").await;

    let code = engine.generate_invite_code(&list.id).await.unwrap();
    engine.disable_invite_link(&list.id).await.unwrap();

    let bob_engine = bed.open(bob()).await;
    let err = bob_engine.join_list(&code).await.unwrap_err();
    assert!(err.is_invite_invalid());

    // Re-enabling issues a fresh code; the revoked one stays dead.
    let fresh = engine.generate_invite_code(&list.id).await.unwrap();
    assert_ne!(fresh, code);
    bob_engine.join_list(&fresh).await.unwrap();
}

#[tokio::test]
async fn test_joining_twice_is_a_noop() {
    let (bed, engine, list) = setup_engine_with_list("Groceries").await;

    let code = engine.generate_invite_code(&list.id).await.unwrap();
    let bob_engine = bed.open(bob()).await;
    bob_engine.join_list(&code).await.unwrap();
    let again = bob_engine.join_list(&code).await.unwrap();

    assert_eq!(again.id, list.id);
    assert_eq!(bob_engine.lists().len(), 1);
    assert_eq!(again.member_ids.len(), 2);
}

#[tokio::test]
async fn test_editor_can_leave_but_owner_cannot() {
    let (bed, engine, list) = setup_engine_with_list("Groceries").await;
    let bob_engine = join_via_invite(&bed, &engine, &list.id, bob()).await;

    let err = engine.leave_list(&list.id).await.unwrap_err();
    assert!(err.is_permission_denied());

    bob_engine.leave_list(&list.id).await.unwrap();
    assert!(bob_engine.lists().is_empty());
    assert!(bob_engine.active_list().is_none());

    eventually("Alice to see Bob gone", || {
        engine
            .lists()
            .first()
            .is_some_and(|l| !l.is_member(&"bob".into()))
    })
    .await;
}

#[tokio::test]
async fn test_owner_can_remove_members() {
    let (bed, engine, list) = setup_engine_with_list("Groceries").await;
    let bob_engine = join_via_invite(&bed, &engine, &list.id, bob()).await;

    // A non-owner cannot remove anyone, and nobody removes the owner.
    let err = bob_engine
        .remove_member(&list.id, &"alice".into())
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());
    let err = engine
        .remove_member(&list.id, &"alice".into())
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());

    engine.remove_member(&list.id, &"bob".into()).await.unwrap();
    assert!(!engine.active_list().unwrap().is_member(&"bob".into()));

    // Removing a non-member again is a quiet no-op.
    engine.remove_member(&list.id, &"bob".into()).await.unwrap();

    // Bob's engine notices the list is gone from his feed and deactivates.
    eventually("Bob to lose the list", || {
        bob_engine.lists().is_empty() && bob_engine.active_list().is_none()
    })
    .await;
}

#[tokio::test]
async fn test_delete_list_cascades_to_items_and_presence() {
    let (bed, engine, list) = setup_engine_with_list("Groceries").await;
    engine
        .add_manual_item("Milk", 1.0, Some("L"), None, None)
        .await
        .unwrap();
    engine
        .add_manual_item("Bread", 1.0, None, None, None)
        .await
        .unwrap();
    let bob_engine = join_via_invite(&bed, &engine, &list.id, bob()).await;

    let items_path = paths::items(&list.id);
    let presence_path = paths::presence(&list.id);
    assert_eq!(bed.store.doc_count(&items_path), 2);
    eventually("both presence heartbeats to land", || {
        bed.store.doc_count(&presence_path) == 2
    })
    .await;

    engine.delete_list(&list.id).await.unwrap();

    assert_eq!(bed.store.doc_count(paths::LISTS), 0);
    assert_eq!(bed.store.doc_count(&items_path), 0);
    assert_eq!(bed.store.doc_count(&presence_path), 0);
    assert!(engine.active_list().is_none());

    eventually("Bob to lose the deleted list", || {
        bob_engine.lists().is_empty() && bob_engine.active_list().is_none()
    })
    .await;

    // Bob's own teardown must not resurrect his presence entry.
    assert_eq!(bed.store.doc_count(&presence_path), 0);
}

#[tokio::test]
async fn test_delete_requires_owner() {
    let (bed, engine, list) = setup_engine_with_list("Groceries").await;
    let bob_engine = join_via_invite(&bed, &engine, &list.id, bob()).await;

    let err = bob_engine.delete_list(&list.id).await.unwrap_err();
    assert!(err.is_permission_denied());
    assert_eq!(engine.lists().len(), 1);
}

#[tokio::test]
async fn test_switching_the_active_list() {
    let (bed, engine) = setup_engine().await;
    let first = engine.create_list("Groceries").await.unwrap();
    bed.clock.advance(Duration::seconds(1));
    let second = engine.create_list("Hardware").await.unwrap();

    engine
        .add_manual_item("Milk", 1.0, Some("L"), None, None)
        .await
        .unwrap();

    engine.set_active_list(Some(second.id.clone())).await.unwrap();
    assert_eq!(engine.active_list().unwrap().id, second.id);
    assert!(engine.items().is_empty());

    // Switching back reloads the first list's items from the store.
    engine.set_active_list(Some(first.id.clone())).await.unwrap();
    assert_eq!(engine.items().len(), 1);

    // An unknown id is rejected without touching the current selection.
    let err = engine
        .set_active_list(Some(Id::generate()))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(engine.active_list().unwrap().id, first.id);

    engine.set_active_list(None).await.unwrap();
    assert!(engine.active_list().is_none());
    assert!(engine.items().is_empty());
}
