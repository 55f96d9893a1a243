#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Holder end of the array many-to-many (`User.lists` over `list_ids`)

mod common;

use common::{create_list, create_user, id_of, new_session, reopen};
use docrel_core::{DocRelError, FindOptions, ScopedFinder, Selector, SortKey};
use serde_json::json;

#[test]
fn test_append_edits_owner_array_in_memory() {
    let mut session = new_session();
    let user = create_user(&mut session, "Juliet");
    let a = create_list(&mut session, "A");
    let b = create_list(&mut session, "B");

    session.in_array(user, "lists").unwrap().append(&[a, b, a]).unwrap();

    let ids = session.in_array(user, "lists").unwrap().ids().unwrap();
    assert_eq!(ids, vec![id_of(&session, a), id_of(&session, b)]);

    // not persisted until the owner is saved
    let holding_a = FindOptions::new().condition("list_ids", json!(id_of(&session, a).as_str()));
    assert_eq!(session.count("User", &holding_a).unwrap(), 0);
    session.save_strict(user).unwrap();
    assert_eq!(session.count("User", &holding_a).unwrap(), 1);
}

#[test]
fn test_append_saves_new_peers_first() {
    let mut session = new_session();
    let user = create_user(&mut session, "Richard");
    let list = session.build("List", json!({"name": "Ageless"})).unwrap();

    session.in_array(user, "lists").unwrap().append(&[list]).unwrap();

    assert!(!session.is_new(list).unwrap());
    assert_eq!(session.id_array(user, "list_ids").unwrap(), vec![id_of(&session, list)]);
}

#[test]
fn test_append_rejects_invalid_new_peer() {
    let mut session = new_session();
    let user = create_user(&mut session, "Ilana");
    let list = session.build("List", json!({})).unwrap();

    let err = session.in_array(user, "lists").unwrap().append(&[list]).unwrap_err();

    assert!(matches!(err, DocRelError::ValidationFailure { .. }));
    assert!(session.id_array(user, "list_ids").unwrap().is_empty());
}

#[test]
fn test_remove_and_replace() {
    let mut session = new_session();
    let user = create_user(&mut session, "Shannon");
    let a = create_list(&mut session, "A");
    let b = create_list(&mut session, "B");
    let c = create_list(&mut session, "C");
    session.in_array(user, "lists").unwrap().append(&[a, b]).unwrap();

    assert!(session.in_array(user, "lists").unwrap().remove(a).unwrap());
    assert!(!session.in_array(user, "lists").unwrap().remove(a).unwrap());
    assert_eq!(session.id_array(user, "list_ids").unwrap(), vec![id_of(&session, b)]);

    session.in_array(user, "lists").unwrap().replace(&[c, c]).unwrap();
    assert_eq!(session.id_array(user, "list_ids").unwrap(), vec![id_of(&session, c)]);
    assert_eq!(session.in_array(user, "lists").unwrap().load().unwrap(), vec![c]);
}

#[test]
fn test_finders_only_see_held_ids() {
    let mut session = new_session();
    let user = create_user(&mut session, "Boone");
    let held = create_list(&mut session, "Held");
    let other = create_list(&mut session, "Other");
    let other_id = id_of(&session, other);
    session.in_array(user, "lists").unwrap().append(&[held]).unwrap();

    let mut lists = session.in_array(user, "lists").unwrap();
    assert_eq!(lists.all(&FindOptions::new()).unwrap(), vec![held]);
    assert_eq!(lists.count(&FindOptions::new()).unwrap(), 1);
    assert_eq!(
        lists
            .find(Selector::Id(other_id.clone()), &FindOptions::new())
            .unwrap()
            .one(),
        None
    );
    assert_eq!(
        lists
            .find_strict(Selector::Id(other_id.clone()), &FindOptions::new())
            .unwrap_err(),
        DocRelError::NotFound {
            model: "List".to_string(),
            ids: vec![other_id],
        }
    );
}

#[test]
fn test_empty_array_yields_empty_results() {
    let mut session = new_session();
    create_list(&mut session, "Unrelated");
    let user = create_user(&mut session, "Vincent");

    let mut lists = session.in_array(user, "lists").unwrap();
    assert!(lists.all(&FindOptions::new()).unwrap().is_empty());
    assert_eq!(lists.count(&FindOptions::new()).unwrap(), 0);
    assert!(lists.is_empty().unwrap());
}

#[test]
fn test_create_records_id_and_saves_owner() {
    let mut session = new_session();
    let user = create_user(&mut session, "Daniel");
    let user_id = id_of(&session, user);

    let list = session
        .in_array(user, "lists")
        .unwrap()
        .create(json!({"name": "Freighter"}))
        .unwrap();
    let list_id = id_of(&session, list);

    let mut fresh = reopen(session);
    let user = fresh
        .find_strict("User", Selector::Id(user_id), &FindOptions::new())
        .unwrap()
        .one()
        .unwrap();
    assert_eq!(fresh.id_array(user, "list_ids").unwrap(), vec![list_id]);
}

#[test]
fn test_create_failure_leaves_owner_untouched() {
    let mut session = new_session();
    let user = create_user(&mut session, "Charlotte");
    let held = create_list(&mut session, "Held");
    session.in_array(user, "lists").unwrap().append(&[held]).unwrap();
    let before = session.document(user).unwrap().fields().clone();

    let invalid = session
        .in_array(user, "lists")
        .unwrap()
        .create(json!({}))
        .unwrap();
    assert!(session.is_new(invalid).unwrap());
    assert_eq!(session.document(user).unwrap().fields(), &before);

    let err = session
        .in_array(user, "lists")
        .unwrap()
        .create_strict(json!({"name": ""}))
        .unwrap_err();
    assert!(matches!(err, DocRelError::ValidationFailure { ref model, .. } if model == "List"));
    assert_eq!(session.document(user).unwrap().fields(), &before);
    assert_eq!(session.store().len("List"), 1);
}

#[test]
fn test_nullify_empties_and_saves_owner() {
    let mut session = new_session();
    let user = create_user(&mut session, "Eloise");
    let user_id = id_of(&session, user);
    let list = create_list(&mut session, "Constants");
    session.in_array(user, "lists").unwrap().append(&[list]).unwrap();
    session.save_strict(user).unwrap();

    session.in_array(user, "lists").unwrap().nullify().unwrap();

    assert_eq!(session.store().len("List"), 1);
    let mut fresh = reopen(session);
    let user = fresh
        .find_strict("User", Selector::Id(user_id), &FindOptions::new())
        .unwrap()
        .one()
        .unwrap();
    assert!(fresh.id_array(user, "list_ids").unwrap().is_empty());
}

#[test]
fn test_destroy_all_drops_ids_and_documents() {
    let mut session = new_session();
    let user = create_user(&mut session, "Ethan");
    let a = create_list(&mut session, "A");
    let b = create_list(&mut session, "B");
    session.in_array(user, "lists").unwrap().append(&[a, b]).unwrap();

    let destroyed = session
        .in_array(user, "lists")
        .unwrap()
        .destroy_all(&FindOptions::new().condition("name", json!("A")))
        .unwrap();

    assert_eq!(destroyed, 1);
    assert!(session.document(a).unwrap().is_destroyed());
    assert_eq!(session.id_array(user, "list_ids").unwrap(), vec![id_of(&session, b)]);
    assert_eq!(session.store().len("List"), 1);
}

#[test]
fn test_delete_all_drops_ids_and_documents() {
    let mut session = new_session();
    let user = create_user(&mut session, "Tom");
    let a = create_list(&mut session, "A");
    let b = create_list(&mut session, "B");
    let spare = create_list(&mut session, "Spare");
    session.in_array(user, "lists").unwrap().append(&[a, b]).unwrap();

    let deleted = session
        .in_array(user, "lists")
        .unwrap()
        .delete_all(&FindOptions::new())
        .unwrap();

    assert_eq!(deleted, 2);
    assert!(session.id_array(user, "list_ids").unwrap().is_empty());
    assert_eq!(session.store().len("List"), 1);
    assert!(!session.document(spare).unwrap().is_destroyed());
}

#[test]
fn test_both_ends_share_identity() {
    let mut session = new_session();
    let list = create_list(&mut session, "Shared");
    let user = session
        .many_to_many(list, "users")
        .unwrap()
        .create(json!({"name": "Nikki"}))
        .unwrap();

    let through_holder = session
        .in_array(user, "lists")
        .unwrap()
        .first(&FindOptions::new().sort(SortKey::asc("name")))
        .unwrap();

    assert_eq!(through_holder, Some(list));
}
