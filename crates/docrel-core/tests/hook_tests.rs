#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Post-save hooks: ordering, run-once and failure propagation
//!
//! Each test registers its own model names so captured events can be told
//! apart while tests run in parallel.

use std::sync::Arc;

use docrel_core::logging_facility::init_test_capture;
use docrel_core::schema::{EVENT_END, EVENT_START};
use docrel_core::{
    AssociationDecl, DocRelError, MemoryStore, ModelDef, Registry, Session,
};
use serde_json::json;

fn gallery_session(prefix: &str, photo_required: Option<&str>) -> Session {
    let mut photo = ModelDef::new(format!("{prefix}Photo"));
    if let Some(key) = photo_required {
        photo = photo.required(key);
    }
    let registry = Registry::builder()
        .model(
            ModelDef::new(format!("{prefix}Gallery"))
                .association(
                    AssociationDecl::polymorphic("photos", format!("{prefix}Photo"))
                        .as_name("imageable"),
                )
                .association(
                    AssociationDecl::polymorphic("notes", format!("{prefix}Note")).as_name("notable"),
                ),
        )
        .model(photo)
        .model(ModelDef::new(format!("{prefix}Note")))
        .build()
        .unwrap();
    Session::new(MemoryStore::new(), Arc::new(registry))
}

#[test]
fn test_hooks_run_in_registration_order() {
    let capture = init_test_capture();
    let mut session = gallery_session("Ordered", None);
    let gallery = session.build("OrderedGallery", json!({})).unwrap();

    // accessed in the opposite order of declaration
    session.polymorphic(gallery, "notes").unwrap().build(json!({})).unwrap();
    session.polymorphic(gallery, "photos").unwrap().build(json!({})).unwrap();

    session.save_strict(gallery).unwrap();

    let order: Vec<String> = capture
        .events_for_op("post_save_hook")
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_START))
        .filter(|e| e.field("model") == Some("OrderedGallery"))
        .filter_map(|e| e.field("association").map(str::to_string))
        .collect();
    assert_eq!(order, vec!["photos", "notes"]);
}

#[test]
fn test_each_save_flushes_once() {
    let capture = init_test_capture();
    let mut session = gallery_session("Once", None);
    let gallery = session.build("OnceGallery", json!({})).unwrap();
    for _ in 0..2 {
        session.polymorphic(gallery, "photos").unwrap().build(json!({})).unwrap();
    }

    session.save_strict(gallery).unwrap();
    session.save_strict(gallery).unwrap();

    let photo_saves = capture.count_events(|e| {
        e.is("save", EVENT_START) && e.field("model") == Some("OncePhoto")
    });
    assert_eq!(photo_saves, 2);
    assert_eq!(session.store().len("OncePhoto"), 2);

    let hook_starts = capture.count_events(|e| {
        e.is("post_save_hook", EVENT_START) && e.field("model") == Some("OnceGallery")
    });
    assert_eq!(hook_starts, 2);
}

#[test]
fn test_untouched_associations_are_skipped() {
    let capture = init_test_capture();
    let mut session = gallery_session("Untouched", None);

    session.create_strict("UntouchedGallery", json!({})).unwrap();

    let hook_events = capture.count_events(|e| {
        e.op.as_deref() == Some("post_save_hook") && e.field("model") == Some("UntouchedGallery")
    });
    assert_eq!(hook_events, 0);
}

#[test]
fn test_failed_hook_stops_later_hooks() {
    let capture = init_test_capture();
    let mut session = gallery_session("Failing", Some("caption"));
    let gallery = session.build("FailingGallery", json!({})).unwrap();
    session.polymorphic(gallery, "photos").unwrap().build(json!({})).unwrap();
    let note = session.polymorphic(gallery, "notes").unwrap().build(json!({})).unwrap();

    let err = session.save(gallery).unwrap_err();

    assert!(matches!(
        err,
        DocRelError::PartialFlushFailure { ref association, persisted: 0, .. } if association == "photos"
    ));
    assert!(!session.is_new(gallery).unwrap());
    assert!(session.is_new(note).unwrap());
    assert_eq!(session.polymorphic(gallery, "notes").unwrap().pending(), vec![note]);

    let notes_started = capture.count_events(|e| {
        e.is("post_save_hook", EVENT_START)
            && e.field("model") == Some("FailingGallery")
            && e.field("association") == Some("notes")
    });
    assert_eq!(notes_started, 0);
}

#[test]
fn test_hook_end_event_reports_flushed_count() {
    let capture = init_test_capture();
    let registry = Registry::builder()
        .model(
            ModelDef::new("CountedFolder").association(
                AssociationDecl::polymorphic("counted_files", "CountedFile").as_name("container"),
            ),
        )
        .model(ModelDef::new("CountedFile"))
        .build()
        .unwrap();
    let mut session = Session::new(MemoryStore::new(), Arc::new(registry));
    let folder = session.build("CountedFolder", json!({})).unwrap();
    for _ in 0..3 {
        session
            .polymorphic(folder, "counted_files")
            .unwrap()
            .build(json!({}))
            .unwrap();
    }

    session.save_strict(folder).unwrap();

    let flushed: Vec<String> = capture
        .events_for_op("post_save_hook")
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_END))
        .filter(|e| e.field("association") == Some("counted_files"))
        .filter_map(|e| e.field("flushed").map(str::to_string))
        .collect();
    assert_eq!(flushed, vec!["3"]);
}
