use std::collections::HashMap;

use docrel_core_types::DocId;

use crate::errors::{DocRelError, Result};
use crate::model::Fields;
use crate::query::matcher::{compare_by, matches_options};
use crate::query::FindOptions;
use crate::store::{DocumentStore, StoredDocument};

/// In-memory document store
///
/// HashMap of collection name to documents kept in insertion order.
/// Not thread-safe; designed to be owned by a single session.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<StoredDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of documents in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn position(&self, collection: &str, id: &DocId) -> Option<usize> {
        self.collections
            .get(collection)
            .and_then(|docs| docs.iter().position(|doc| &doc.id == id))
    }

    fn not_found(collection: &str, id: &DocId) -> DocRelError {
        DocRelError::NotFound {
            model: collection.to_string(),
            ids: vec![id.clone()],
        }
    }

    fn matching<'a>(
        &'a self,
        collection: &str,
        options: &'a FindOptions,
    ) -> impl Iterator<Item = &'a StoredDocument> + 'a {
        self.collections
            .get(collection)
            .into_iter()
            .flatten()
            .filter(move |doc| matches_options(&doc.id, &doc.fields, options))
    }
}

impl DocumentStore for MemoryStore {
    fn insert(&mut self, collection: &str, fields: Fields) -> Result<DocId> {
        let id = DocId::generate();
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(StoredDocument {
                id: id.clone(),
                fields,
            });
        Ok(id)
    }

    fn update(&mut self, collection: &str, id: &DocId, fields: Fields) -> Result<()> {
        let index = self
            .position(collection, id)
            .ok_or_else(|| Self::not_found(collection, id))?;
        if let Some(docs) = self.collections.get_mut(collection) {
            docs[index].fields = fields;
        }
        Ok(())
    }

    fn remove(&mut self, collection: &str, id: &DocId) -> Result<()> {
        let index = self
            .position(collection, id)
            .ok_or_else(|| Self::not_found(collection, id))?;
        if let Some(docs) = self.collections.get_mut(collection) {
            docs.remove(index);
        }
        Ok(())
    }

    fn fetch(&self, collection: &str, id: &DocId) -> Result<Option<Fields>> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| &doc.id == id))
            .map(|doc| doc.fields.clone()))
    }

    fn query(&self, collection: &str, options: &FindOptions) -> Result<Vec<StoredDocument>> {
        let mut found: Vec<&StoredDocument> = self.matching(collection, options).collect();
        if !options.sort.is_empty() {
            // stable: ties keep insertion order
            found.sort_by(|a, b| compare_by(&options.sort, (&a.id, &a.fields), (&b.id, &b.fields)));
        }
        let window = found
            .into_iter()
            .skip(options.skip)
            .take(options.limit.unwrap_or(usize::MAX));
        Ok(window.cloned().collect())
    }

    fn count(&self, collection: &str, options: &FindOptions) -> Result<usize> {
        Ok(self.matching(collection, options).count())
    }

    fn delete_matching(&mut self, collection: &str, options: &FindOptions) -> Result<usize> {
        let Some(docs) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|doc| !matches_options(&doc.id, &doc.fields, options));
        Ok(before - docs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fields_from;
    use crate::query::SortKey;
    use serde_json::json;

    fn seeded() -> (MemoryStore, Vec<DocId>) {
        let mut store = MemoryStore::new();
        let ids = ["carol", "alice", "bob"]
            .iter()
            .map(|name| {
                store
                    .insert("User", fields_from(json!({"name": name})).unwrap())
                    .unwrap()
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn test_query_keeps_insertion_order_without_sort() {
        let (store, ids) = seeded();
        let docs = store.query("User", &FindOptions::new()).unwrap();
        let got: Vec<DocId> = docs.into_iter().map(|d| d.id).collect();
        assert_eq!(got, ids);
    }

    #[test]
    fn test_query_sort_skip_limit() {
        let (store, _) = seeded();
        let options = FindOptions::new().sort(SortKey::asc("name")).skip(1).limit(1);
        let docs = store.query("User", &options).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].fields.get("name"), Some(&json!("bob")));
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let mut store = MemoryStore::new();
        let result = store.update("User", &DocId::from("nope"), Fields::new());
        assert!(matches!(result, Err(DocRelError::NotFound { .. })));
    }

    #[test]
    fn test_delete_matching_counts_removed() {
        let (mut store, _) = seeded();
        let options = FindOptions::new().condition("name", json!("alice"));
        assert_eq!(store.delete_matching("User", &options).unwrap(), 1);
        assert_eq!(store.len("User"), 2);
        assert_eq!(store.delete_matching("Nope", &options).unwrap(), 0);
    }

    #[test]
    fn test_count_ignores_window() {
        let (store, _) = seeded();
        let options = FindOptions::new().limit(1);
        assert_eq!(store.count("User", &options).unwrap(), 3);
    }
}
