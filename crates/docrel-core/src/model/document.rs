use docrel_core_types::DocId;
use serde_json::Value;

use crate::errors::{DocRelError, Result};

/// Schemaless field storage for a document
pub type Fields = serde_json::Map<String, Value>;

/// Reserved condition key addressing a document's identity
pub const ID_KEY: &str = "_id";

/// Convert a JSON object literal into `Fields`
///
/// # Errors
///
/// Returns `Serialization` if `value` is not a JSON object.
pub fn fields_from(value: Value) -> Result<Fields> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DocRelError::Serialization {
            message: format!("expected a JSON object for document fields, got {other}"),
        }),
    }
}

/// Handle to a document held by a `Session`
///
/// Handles are cheap to copy and never keep a document alive on their own.
/// Within one session, a persisted document is reachable through exactly one
/// handle, so handle equality is document identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocRef(pub(crate) usize);

/// In-memory document
///
/// A document belongs to one registered model (its type discriminator).
/// `id` is assigned by the store on first save and is `None` before that.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    model: String,
    id: Option<DocId>,
    fields: Fields,
    destroyed: bool,
    errors: Vec<String>,
}

impl Document {
    /// Create a new, unsaved document
    pub fn new(model: impl Into<String>, fields: Fields) -> Self {
        Self {
            model: model.into(),
            id: None,
            fields,
            destroyed: false,
            errors: Vec::new(),
        }
    }

    pub(crate) fn persisted(model: impl Into<String>, id: DocId, fields: Fields) -> Self {
        Self {
            model: model.into(),
            id: Some(id),
            fields,
            destroyed: false,
            errors: Vec::new(),
        }
    }

    /// Model name (the type discriminator stored by polymorphic peers)
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Identity, present only once persisted
    pub fn id(&self) -> Option<&DocId> {
        self.id.as_ref()
    }

    /// Check whether this document has never been persisted
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Check whether this document was destroyed in this session
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Validation messages from the last failed save
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Get a field value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set a field value by key
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Remove a field value by key
    pub fn unset(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Read an array field as identities
    ///
    /// A missing or null field reads as empty. Non-string items are skipped.
    pub fn id_array(&self, key: &str) -> Vec<DocId> {
        match self.fields.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(DocId::from))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Check whether an array field contains an identity
    pub fn contains_id(&self, key: &str, id: &DocId) -> bool {
        match self.fields.get(key) {
            Some(Value::Array(items)) => items.iter().any(|item| item.as_str() == Some(id.as_str())),
            _ => false,
        }
    }

    /// Push an identity into an array field unless already present
    ///
    /// Returns `true` when the field changed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidField` if the field holds something other than an
    /// array or null.
    pub fn push_id(&mut self, key: &str, id: &DocId) -> Result<bool> {
        let (items, deduped) = self.array_field_mut(key)?;
        if items.iter().any(|item| item.as_str() == Some(id.as_str())) {
            return Ok(deduped);
        }
        items.push(Value::String(id.to_string()));
        Ok(true)
    }

    /// Remove an identity from an array field
    ///
    /// Returns `true` when the field changed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidField` if the field holds something other than an
    /// array or null.
    pub fn remove_id(&mut self, key: &str, id: &DocId) -> Result<bool> {
        let (items, deduped) = self.array_field_mut(key)?;
        let before = items.len();
        items.retain(|item| item.as_str() != Some(id.as_str()));
        Ok(deduped || items.len() != before)
    }

    /// Replace an array field with the given identities, dropping duplicates
    pub fn set_id_array(&mut self, key: &str, ids: &[DocId]) {
        let mut unique: Vec<Value> = Vec::with_capacity(ids.len());
        for id in ids {
            let value = Value::String(id.to_string());
            if !unique.contains(&value) {
                unique.push(value);
            }
        }
        self.fields.insert(key.to_string(), Value::Array(unique));
    }

    /// The array field, created if missing, with repeated items dropped
    ///
    /// The flag reports whether duplicates were dropped.
    fn array_field_mut(&mut self, key: &str) -> Result<(&mut Vec<Value>, bool)> {
        let slot = self
            .fields
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if slot.is_null() {
            *slot = Value::Array(Vec::new());
        }
        match slot {
            Value::Array(items) => {
                let deduped = dedupe(items);
                Ok((items, deduped))
            }
            other => Err(DocRelError::InvalidField {
                model: self.model.clone(),
                field: key.to_string(),
                reason: format!("expected an array of ids, found {other}"),
            }),
        }
    }

    pub(crate) fn assign_id(&mut self, id: DocId) {
        self.id = Some(id);
    }

    pub(crate) fn replace_fields(&mut self, fields: Fields) {
        self.fields = fields;
    }

    pub(crate) fn set_errors(&mut self, errors: Vec<String>) {
        self.errors = errors;
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.destroyed = true;
    }
}

/// Drop repeated items, keeping the first occurrence of each
fn dedupe(items: &mut Vec<Value>) -> bool {
    let before = items.len();
    let mut seen: Vec<Value> = Vec::with_capacity(before);
    items.retain(|item| {
        if seen.contains(item) {
            false
        } else {
            seen.push(item.clone());
            true
        }
    });
    items.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_document_is_new() {
        let doc = Document::new("User", Fields::new());
        assert!(doc.is_new());
        assert!(doc.id().is_none());
        assert!(!doc.is_destroyed());
    }

    #[test]
    fn test_push_id_never_duplicates() {
        let mut doc = Document::new("User", Fields::new());
        let id = DocId::from("l1");

        assert!(doc.push_id("list_ids", &id).unwrap());
        assert!(!doc.push_id("list_ids", &id).unwrap());
        assert_eq!(doc.id_array("list_ids"), vec![id]);
    }

    #[test]
    fn test_push_id_collapses_existing_duplicates() {
        let mut doc = Document::new(
            "User",
            fields_from(json!({"list_ids": ["l1", "l1", "l2", "l1"]})).unwrap(),
        );

        assert!(doc.push_id("list_ids", &DocId::from("l1")).unwrap());
        assert_eq!(doc.get("list_ids"), Some(&json!(["l1", "l2"])));
        assert!(!doc.push_id("list_ids", &DocId::from("l1")).unwrap());
    }

    #[test]
    fn test_remove_id_collapses_duplicates_of_other_ids() {
        let mut doc = Document::new(
            "User",
            fields_from(json!({"list_ids": ["l1", "l2", "l2"]})).unwrap(),
        );

        assert!(doc.remove_id("list_ids", &DocId::from("l1")).unwrap());
        assert_eq!(doc.get("list_ids"), Some(&json!(["l2"])));
    }

    #[test]
    fn test_push_id_replaces_null_with_array() {
        let mut doc = Document::new("User", fields_from(json!({"list_ids": null})).unwrap());
        doc.push_id("list_ids", &DocId::from("l1")).unwrap();
        assert_eq!(doc.get("list_ids"), Some(&json!(["l1"])));
    }

    #[test]
    fn test_push_id_rejects_non_array_field() {
        let mut doc = Document::new("User", fields_from(json!({"list_ids": 7})).unwrap());
        let result = doc.push_id("list_ids", &DocId::from("l1"));
        assert!(matches!(result, Err(DocRelError::InvalidField { .. })));
    }

    #[test]
    fn test_remove_id() {
        let mut doc = Document::new(
            "User",
            fields_from(json!({"list_ids": ["l1", "l2"]})).unwrap(),
        );
        assert!(doc.remove_id("list_ids", &DocId::from("l1")).unwrap());
        assert!(!doc.remove_id("list_ids", &DocId::from("l1")).unwrap());
        assert_eq!(doc.id_array("list_ids"), vec![DocId::from("l2")]);
    }

    #[test]
    fn test_set_id_array_dedupes() {
        let mut doc = Document::new("List", Fields::new());
        let a = DocId::from("a");
        doc.set_id_array("user_ids", &[a.clone(), a.clone(), DocId::from("b")]);
        assert_eq!(doc.get("user_ids"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_fields_from_rejects_non_object() {
        assert!(fields_from(json!([1, 2])).is_err());
    }
}
