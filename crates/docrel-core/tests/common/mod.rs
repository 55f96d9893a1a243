use std::sync::Arc;

use docrel_core::{AssociationDecl, DocId, DocRef, MemoryStore, ModelDef, Registry, Session};
use serde_json::json;

/// Registry used across the integration tests
///
/// - `List.users` / `User.lists`: array many-to-many, users hold `list_ids`
/// - `Post.comments`: polymorphic one-to-many `as: commentable`
/// - `Comment` requires a body so flushes can fail on demand
#[allow(dead_code)]
pub fn registry() -> Arc<Registry> {
    let registry = Registry::builder()
        .model(
            ModelDef::new("List")
                .required("name")
                .association(AssociationDecl::many_to_many("users", "User").source("lists")),
        )
        .model(
            ModelDef::new("User")
                .required("name")
                .association(AssociationDecl::in_array("lists", "List").in_key("list_ids")),
        )
        .model(
            ModelDef::new("Post")
                .required("title")
                .association(AssociationDecl::polymorphic("comments", "Comment").as_name("commentable")),
        )
        .model(ModelDef::new("Comment").required("body"))
        .build()
        .expect("fixture registry is valid");
    Arc::new(registry)
}

/// Fresh session over an empty in-memory store
#[allow(dead_code)]
pub fn new_session() -> Session {
    Session::new(MemoryStore::new(), registry())
}

/// Create a persisted list
#[allow(dead_code)]
pub fn create_list(session: &mut Session, name: &str) -> DocRef {
    session
        .create_strict("List", json!({ "name": name }))
        .expect("list is valid")
}

/// Create a persisted user
#[allow(dead_code)]
pub fn create_user(session: &mut Session, name: &str) -> DocRef {
    session
        .create_strict("User", json!({ "name": name }))
        .expect("user is valid")
}

/// Create a persisted post
#[allow(dead_code)]
pub fn create_post(session: &mut Session, title: &str) -> DocRef {
    session
        .create_strict("Post", json!({ "title": title }))
        .expect("post is valid")
}

#[allow(dead_code)]
pub fn id_of(session: &Session, doc: DocRef) -> DocId {
    session
        .id(doc)
        .expect("handle belongs to session")
        .expect("document is persisted")
}

/// Read a string field, panicking if it is missing
#[allow(dead_code)]
pub fn text(session: &Session, doc: DocRef, key: &str) -> String {
    session
        .field(doc, key)
        .expect("handle belongs to session")
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("{key} is not a string"))
        .to_string()
}

/// Open a second session over the same store contents
///
/// Documents come back fresh from the store, which is how tests check what
/// was actually persisted.
#[allow(dead_code)]
pub fn reopen(session: Session) -> Session {
    let registry = session.registry().clone();
    Session::new(session.into_store(), registry)
}
