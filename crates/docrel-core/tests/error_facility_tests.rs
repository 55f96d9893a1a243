#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{create_list, id_of, new_session};
use docrel_core::{DocId, DocRelError, ExError, ExErrorKind, FindOptions, ScopedFinder, Selector};
use serde_json::json;

#[test]
fn test_error_codes_are_stable() {
    let cases = [
        (ExErrorKind::ScopeMisconfiguration, "ERR_SCOPE_MISCONFIGURATION"),
        (ExErrorKind::UnknownModel, "ERR_UNKNOWN_MODEL"),
        (ExErrorKind::UnknownAssociation, "ERR_UNKNOWN_ASSOCIATION"),
        (ExErrorKind::AssociationKindMismatch, "ERR_ASSOCIATION_KIND_MISMATCH"),
        (ExErrorKind::ValidationFailure, "ERR_VALIDATION_FAILURE"),
        (ExErrorKind::NotFound, "ERR_NOT_FOUND"),
        (ExErrorKind::Destroyed, "ERR_DESTROYED"),
        (ExErrorKind::NotPersisted, "ERR_NOT_PERSISTED"),
        (ExErrorKind::InvalidField, "ERR_INVALID_FIELD"),
        (ExErrorKind::PartialFlush, "ERR_PARTIAL_FLUSH"),
        (ExErrorKind::Persistence, "ERR_PERSISTENCE"),
        (ExErrorKind::Serialization, "ERR_SERIALIZATION"),
        (ExErrorKind::Internal, "ERR_INTERNAL"),
    ];
    for (kind, code) in cases {
        assert_eq!(kind.code(), code, "Wrong code for {:?}", kind);
    }
}

#[test]
fn test_scoped_not_found_converts_with_entity_id() {
    let mut session = new_session();
    let list = create_list(&mut session, "Scoped");
    let ghost = DocId::from("ghost-user");

    let err = session
        .many_to_many(list, "users")
        .unwrap()
        .find_strict(Selector::Id(ghost.clone()), &FindOptions::new())
        .unwrap_err();
    assert!(err.is_not_found());

    let ex: ExError = err.into();
    assert_eq!(ex.kind(), ExErrorKind::NotFound);
    assert_eq!(ex.model(), Some("User"));
    assert_eq!(ex.entity_id(), Some(ghost.as_str()));
}

#[test]
fn test_invalid_array_field_is_reported() {
    let mut session = new_session();
    let list = create_list(&mut session, "Shape");
    let user = session
        .create_strict("User", json!({"name": "Odd", "list_ids": "not-an-array"}))
        .unwrap();

    let err = session
        .many_to_many(list, "users")
        .unwrap()
        .append(&[user])
        .unwrap_err();

    assert!(matches!(
        err,
        DocRelError::InvalidField { ref field, .. } if field == "list_ids"
    ));
    let ex: ExError = err.into();
    assert_eq!(ex.code(), "ERR_INVALID_FIELD");
}

#[test]
fn test_destroyed_document_converts_with_id() {
    let mut session = new_session();
    let list = create_list(&mut session, "Destroyed");
    let list_id = id_of(&session, list);
    session.destroy(list).unwrap();

    let err = session.destroy(list).unwrap_err();

    assert_eq!(
        err,
        DocRelError::DocumentDestroyed {
            model: "List".to_string(),
            id: list_id.clone(),
        }
    );
    let ex: ExError = err.into();
    assert_eq!(ex.kind(), ExErrorKind::Destroyed);
    assert_eq!(ex.entity_id(), Some(list_id.as_str()));
}

#[test]
fn test_non_object_attributes_are_rejected() {
    let mut session = new_session();

    let err = session.build("User", json!(["name"])).unwrap_err();

    assert!(matches!(err, DocRelError::Serialization { .. }));
}

#[test]
fn test_partial_flush_keeps_source_chain() {
    use std::error::Error;

    let err = DocRelError::PartialFlushFailure {
        association: "users".to_string(),
        persisted: 0,
        peer: None,
        source: Box::new(DocRelError::ValidationFailure {
            model: "User".to_string(),
            missing: vec!["name".to_string()],
        }),
    };

    let source = err.source().unwrap();
    assert_eq!(source.to_string(), "Validation failed for User: name can't be blank");
}
