//! Association Proxy Demonstration
//!
//! This example walks through both relation kinds against the in-memory store.
#![allow(clippy::unwrap_used, clippy::expect_used)]
//!
//! Key concepts illustrated:
//! 1. Registering models and associations once at startup
//! 2. Deferred foreign keys on a polymorphic relation
//! 3. Mirrored array edits on a many-to-many relation
//! 4. Replace plus the owner's post-save flush

use std::sync::Arc;

use docrel_core::logging_facility::{init, Profile};
use docrel_core::{
    AssociationDecl, FindOptions, MemoryStore, ModelDef, Registry, ScopedFinder, Session,
};
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init(Profile::Development);
    println!("=== docrel Association Demo ===\n");

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
                .association(AssociationDecl::polymorphic("comments", "Comment").as_name("commentable")),
        )
        .model(ModelDef::new("Comment"))
        .build()?;
    let mut session = Session::new(MemoryStore::new(), Arc::new(registry));

    // ===== Part 1: Polymorphic =====
    println!("## Part 1: Deferred foreign key\n");

    let post = session.build("Post", json!({"title": "Pilot"}))?;
    let comment = session
        .polymorphic(post, "comments")?
        .build(json!({"body": "first!"}))?;
    println!(
        "Built comment before saving post: commentable_id = {:?}",
        session.field(comment, "commentable_id")?
    );

    session.save_strict(post)?;
    println!(
        "After saving post: commentable_id = {:?}",
        session.field(comment, "commentable_id")?
    );

    // ===== Part 2: Many-to-many =====
    println!("\n## Part 2: Array many-to-many\n");

    let list = session.create_strict("List", json!({"name": "Tail Section"}))?;
    let echo = session
        .many_to_many(list, "users")?
        .create(json!({"name": "Mr. Echo"}))?;
    println!("Mr. Echo list_ids = {:?}", session.id_array(echo, "list_ids")?);
    println!(
        "Mr. Echo's lists include Tail Section: {}",
        session.in_array(echo, "lists")?.includes(list)?
    );

    // ===== Part 3: Replace =====
    println!("\n## Part 3: Replace and flush\n");

    let libby = session.create_strict("User", json!({"name": "Libby"}))?;
    session.many_to_many(list, "users")?.replace(&[libby])?;
    println!(
        "Queued writes: {} new, {} removed",
        session.many_to_many(list, "users")?.pending_new().len(),
        session.many_to_many(list, "users")?.pending_removed().len()
    );

    session.save_strict(list)?;
    let count = session.many_to_many(list, "users")?.count(&FindOptions::new())?;
    println!("After save: {count} user(s) in Tail Section");
    println!("Mr. Echo list_ids = {:?}", session.id_array(echo, "list_ids")?);

    println!("\n=== Demo complete ===");
    Ok(())
}
