//! docrel core - association proxies for a schemaless document store
//!
//! Two documents stored independently can be related through:
//! - a polymorphic one-to-many (`<as>_type` / `<as>_id` on the peer)
//! - an array many-to-many (the peer holds an array of owner ids, mirrored
//!   by a holder-end association on the peer model)
//!
//! Models and associations are declared once in a [`Registry`]. A
//! [`Session`] owns the loaded documents, hands out [`DocRef`] handles and
//! runs post-save hooks that flush pending peer writes after the owner's own
//! write. There are no cross-document transactions: a flush that fails
//! partway leaves earlier peer writes in place and reports
//! [`DocRelError::PartialFlushFailure`].
//!
//! ```
//! use std::sync::Arc;
//! use docrel_core::{AssociationDecl, MemoryStore, ModelDef, Registry, ScopedFinder, Session};
//! use serde_json::json;
//!
//! let registry = Registry::builder()
//!     .model(ModelDef::new("List").association(AssociationDecl::many_to_many("users", "User").source("lists")))
//!     .model(ModelDef::new("User").association(AssociationDecl::in_array("lists", "List").in_key("list_ids")))
//!     .build()?;
//! let mut session = Session::new(MemoryStore::new(), Arc::new(registry));
//!
//! let list = session.create_strict("List", json!({"name": "Tail Section"}))?;
//! let user = session.many_to_many(list, "users")?.create(json!({"name": "Mr. Echo"}))?;
//!
//! assert_eq!(session.id_array(user, "list_ids")?, vec![session.id(list)?.unwrap()]);
//! assert!(session.in_array(user, "lists")?.includes(list)?);
//! # Ok::<(), docrel_core::DocRelError>(())
//! ```

pub mod association;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod query;
pub mod registry;
pub mod session;
pub mod store;

pub use docrel_core_types::{schema, DocId};

// Re-export commonly used types
pub use association::{
    AssociationConfig, AssociationKind, ArrayEnd, InArrayProxy, ManyToManyProxy,
    PolymorphicProxy, PostSaveHook, ScopedFinder,
};
pub use errors::{DocRelError, ExError, ExErrorKind, Result};
pub use model::{fields_from, DocRef, Document, Fields};
pub use query::{Direction, FindOptions, Found, Page, Pagination, Selector, SortKey};
pub use registry::{AssociationDecl, ModelDef, ModelEntry, Registry, RegistryBuilder};
pub use session::Session;
pub use store::{DocumentStore, MemoryStore, StoredDocument};
