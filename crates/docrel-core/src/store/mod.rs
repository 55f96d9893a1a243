//! Persistence boundary
//!
//! The session talks to storage only through [`DocumentStore`]. Collections
//! are named after models. Implementations assign identities on insert and
//! return query results in natural (insertion) order unless sorted.

pub mod memory;

pub use memory::MemoryStore;

use docrel_core_types::DocId;

use crate::errors::Result;
use crate::model::Fields;
use crate::query::FindOptions;

/// A document as held by a store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: DocId,
    pub fields: Fields,
}

/// Storage engine operations consumed by the session
pub trait DocumentStore {
    /// Insert a new document and return its assigned identity
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the store rejects the write.
    fn insert(&mut self, collection: &str, fields: Fields) -> Result<DocId>;

    /// Overwrite the fields of an existing document
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no document has this identity.
    fn update(&mut self, collection: &str, id: &DocId, fields: Fields) -> Result<()>;

    /// Remove a document
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no document has this identity.
    fn remove(&mut self, collection: &str, id: &DocId) -> Result<()>;

    /// Fetch one document by identity
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the store cannot be read.
    fn fetch(&self, collection: &str, id: &DocId) -> Result<Option<Fields>>;

    /// Run a filtered, sorted, windowed query
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the store cannot be read.
    fn query(&self, collection: &str, options: &FindOptions) -> Result<Vec<StoredDocument>>;

    /// Count documents matching the conditions (limit and skip ignored)
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the store cannot be read.
    fn count(&self, collection: &str, options: &FindOptions) -> Result<usize>;

    /// Remove every document matching the conditions, returning how many
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the store rejects the write.
    fn delete_matching(&mut self, collection: &str, options: &FindOptions) -> Result<usize>;
}
