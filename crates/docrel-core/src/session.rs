//! Session: identity map, save lifecycle and generic finder
//!
//! The session owns every document it has built or loaded. Callers hold
//! [`DocRef`] handles; a persisted document is materialized at most once, so
//! a peer reached through two different associations is the same in-memory
//! document. Proxy state lives next to its owner document and is discarded on
//! `reload` and `destroy`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use docrel_core_types::DocId;
use serde_json::Value;

use crate::association::config::{KIND_IN_ARRAY, KIND_MANY_TO_MANY, KIND_POLYMORPHIC};
use crate::association::hook::run_post_save_hooks;
use crate::association::{
    AssociationConfig, InArrayProxy, ManyToManyProxy, PolymorphicProxy, ProxyState,
};
use crate::errors::{DocRelError, Result};
use crate::model::{fields_from, DocRef, Document, Fields};
use crate::query::{FindOptions, Found, Page, Pagination, Selector};
use crate::registry::Registry;
use crate::store::{DocumentStore, MemoryStore, StoredDocument};
use crate::{log_op_end, log_op_error, log_op_start};

#[derive(Debug)]
struct Slot {
    doc: Document,
    proxies: HashMap<String, ProxyState>,
}

/// Unit of work over one store
#[derive(Debug)]
pub struct Session<S: DocumentStore = MemoryStore> {
    store: S,
    registry: Arc<Registry>,
    slots: Vec<Slot>,
    identity_map: HashMap<(String, DocId), DocRef>,
}

impl<S: DocumentStore> Session<S> {
    pub fn new(store: S, registry: Arc<Registry>) -> Self {
        Self {
            store,
            registry,
            slots: Vec::new(),
            identity_map: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // ===== Documents =====

    /// Construct an unsaved document
    ///
    /// # Errors
    ///
    /// Returns `UnknownModel`, or `Serialization` if `attrs` is not an object.
    pub fn build(&mut self, model: &str, attrs: Value) -> Result<DocRef> {
        self.registry.model(model)?;
        let fields = fields_from(attrs)?;
        Ok(self.push(Document::new(model, fields)))
    }

    /// # Errors
    ///
    /// Returns `UnknownHandle` if `doc` does not belong to this session.
    pub fn document(&self, doc: DocRef) -> Result<&Document> {
        self.slots
            .get(doc.0)
            .map(|slot| &slot.doc)
            .ok_or(DocRelError::UnknownHandle { handle: doc.0 })
    }

    pub(crate) fn document_mut(&mut self, doc: DocRef) -> Result<&mut Document> {
        self.slot_mut(doc).map(|slot| &mut slot.doc)
    }

    /// # Errors
    ///
    /// Returns `UnknownHandle` if `doc` does not belong to this session.
    pub fn field(&self, doc: DocRef, key: &str) -> Result<Option<&Value>> {
        Ok(self.document(doc)?.get(key))
    }

    /// # Errors
    ///
    /// Returns `UnknownHandle` if `doc` does not belong to this session.
    pub fn set_field(&mut self, doc: DocRef, key: &str, value: Value) -> Result<()> {
        self.document_mut(doc)?.set(key, value);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `UnknownHandle` if `doc` does not belong to this session.
    pub fn unset_field(&mut self, doc: DocRef, key: &str) -> Result<Option<Value>> {
        Ok(self.document_mut(doc)?.unset(key))
    }

    /// Identities held in an array field
    ///
    /// # Errors
    ///
    /// Returns `UnknownHandle` if `doc` does not belong to this session.
    pub fn id_array(&self, doc: DocRef, key: &str) -> Result<Vec<DocId>> {
        Ok(self.document(doc)?.id_array(key))
    }

    /// # Errors
    ///
    /// Returns `UnknownHandle` if `doc` does not belong to this session.
    pub fn id(&self, doc: DocRef) -> Result<Option<DocId>> {
        Ok(self.document(doc)?.id().cloned())
    }

    /// # Errors
    ///
    /// Returns `UnknownHandle` if `doc` does not belong to this session.
    pub fn is_new(&self, doc: DocRef) -> Result<bool> {
        Ok(self.document(doc)?.is_new())
    }

    /// Validation messages from the last failed save
    ///
    /// # Errors
    ///
    /// Returns `UnknownHandle` if `doc` does not belong to this session.
    pub fn errors(&self, doc: DocRef) -> Result<&[String]> {
        Ok(self.document(doc)?.errors())
    }

    // ===== Lifecycle =====

    /// Validate, write, then run the model's post-save hooks
    ///
    /// Returns `false` (with `errors` populated) when required keys are
    /// missing; nothing is written in that case.
    ///
    /// # Errors
    ///
    /// - `DocumentDestroyed` if the document was destroyed
    /// - `PartialFlushFailure` if a hook could not flush every pending peer;
    ///   the owner's own write is kept
    /// - store failures
    pub fn save(&mut self, doc: DocRef) -> Result<bool> {
        let model = self.document(doc)?.model().to_string();
        log_op_start!("save", model = %model);
        let start = Instant::now();

        let saved = self.save_impl(doc).map_err(|e| {
            log_op_error!(
                "save",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                model = %model
            );
            e
        })?;

        log_op_end!(
            "save",
            duration_ms = start.elapsed().as_millis() as u64,
            model = %model,
            saved = saved
        );
        Ok(saved)
    }

    /// Like `save`, failing on validation errors
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailure` listing the blank required keys, plus
    /// every error `save` can return.
    pub fn save_strict(&mut self, doc: DocRef) -> Result<()> {
        if self.save(doc)? {
            return Ok(());
        }
        let document = self.document(doc)?;
        Err(DocRelError::ValidationFailure {
            model: document.model().to_string(),
            missing: self.missing_keys(document)?,
        })
    }

    fn save_impl(&mut self, doc: DocRef) -> Result<bool> {
        self.ensure_live(doc)?;

        let missing = self.missing_keys(self.document(doc)?)?;
        if !missing.is_empty() {
            let errors = missing.iter().map(|key| format!("{key} can't be blank")).collect();
            self.document_mut(doc)?.set_errors(errors);
            return Ok(false);
        }

        self.write(doc)?;
        run_post_save_hooks(self, doc)?;
        Ok(true)
    }

    fn write(&mut self, doc: DocRef) -> Result<()> {
        let document = self.document(doc)?;
        let model = document.model().to_string();
        let fields = document.fields().clone();

        match document.id().cloned() {
            Some(id) => self.store.update(&model, &id, fields)?,
            None => {
                let id = self.store.insert(&model, fields)?;
                tracing::debug!(model = %model, doc_id = %id, "inserted");
                self.identity_map.insert((model, id.clone()), doc);
                self.document_mut(doc)?.assign_id(id);
            }
        }
        self.document_mut(doc)?.set_errors(Vec::new());
        Ok(())
    }

    fn missing_keys(&self, document: &Document) -> Result<Vec<String>> {
        let entry = self.registry.model(document.model())?;
        Ok(entry
            .required_keys
            .iter()
            .filter(|key| is_blank(document.get(key)))
            .cloned()
            .collect())
    }

    /// Re-read fields from the store and discard all proxy state
    ///
    /// # Errors
    ///
    /// Returns `OwnerNotPersisted` for a new document, `NotFound` if the
    /// document is gone from the store.
    pub fn reload(&mut self, doc: DocRef) -> Result<()> {
        let (model, id) = self.persisted_key(doc, "reload")?;
        let fields = self
            .store
            .fetch(&model, &id)?
            .ok_or_else(|| DocRelError::NotFound {
                model,
                ids: vec![id],
            })?;

        let slot = self.slot_mut(doc)?;
        slot.doc.replace_fields(fields);
        slot.doc.set_errors(Vec::new());
        slot.proxies.clear();
        Ok(())
    }

    /// Remove the document from the store and the identity map
    ///
    /// # Errors
    ///
    /// Returns `OwnerNotPersisted` for a new document, `DocumentDestroyed`
    /// if already destroyed, `NotFound` if the store no longer has it.
    pub fn destroy(&mut self, doc: DocRef) -> Result<()> {
        let (model, id) = self.persisted_key(doc, "destroy")?;
        log_op_start!("destroy", model = %model, doc_id = %id);
        let start = Instant::now();

        self.store.remove(&model, &id).map_err(|e| {
            log_op_error!(
                "destroy",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                model = %model
            );
            e
        })?;
        self.forget(doc, &model, &id)?;

        log_op_end!(
            "destroy",
            duration_ms = start.elapsed().as_millis() as u64,
            model = %model
        );
        Ok(())
    }

    /// Build and save; the document is returned even if it failed validation
    ///
    /// # Errors
    ///
    /// See `build` and `save`.
    pub fn create(&mut self, model: &str, attrs: Value) -> Result<DocRef> {
        let doc = self.build(model, attrs)?;
        self.save(doc)?;
        Ok(doc)
    }

    /// # Errors
    ///
    /// See `build` and `save_strict`.
    pub fn create_strict(&mut self, model: &str, attrs: Value) -> Result<DocRef> {
        let doc = self.build(model, attrs)?;
        self.save_strict(doc)?;
        Ok(doc)
    }

    // ===== Finder =====

    /// # Errors
    ///
    /// Returns `UnknownModel`, or propagates store failures.
    pub fn find(&mut self, model: &str, selector: Selector, options: &FindOptions) -> Result<Found> {
        self.registry.model(model)?;
        match selector {
            Selector::Id(id) => {
                let options = options.unbounded().only_ids(vec![id]).limit(1);
                Ok(Found::One(self.query(model, &options)?.into_iter().next()))
            }
            Selector::Ids(ids) => {
                let options = options.clone().only_ids(ids);
                Ok(Found::Many(self.query(model, &options)?))
            }
            Selector::First => {
                let options = options.unbounded().limit(1);
                Ok(Found::One(self.query(model, &options)?.into_iter().next()))
            }
            Selector::Last => {
                let unbounded = options.unbounded();
                if unbounded.sort.is_empty() {
                    return Ok(Found::One(self.query(model, &unbounded)?.pop()));
                }
                let options = FindOptions {
                    sort: unbounded.sort.iter().map(|key| key.reversed()).collect(),
                    ..unbounded
                }
                .limit(1);
                Ok(Found::One(self.query(model, &options)?.into_iter().next()))
            }
            Selector::All => Ok(Found::Many(self.query(model, options)?)),
        }
    }

    /// Like `find`, failing when anything requested is missing
    ///
    /// # Errors
    ///
    /// Returns `NotFound` naming the missing ids (empty for `First`/`Last`).
    pub fn find_strict(
        &mut self,
        model: &str,
        selector: Selector,
        options: &FindOptions,
    ) -> Result<Found> {
        let requested = match &selector {
            Selector::Id(id) => vec![id.clone()],
            Selector::Ids(ids) => ids.clone(),
            _ => Vec::new(),
        };
        let many = selector.returns_many();
        let found = self.find(model, selector, options)?;

        let missing: Vec<DocId> = match &found {
            Found::One(None) => requested,
            Found::One(Some(_)) => Vec::new(),
            Found::Many(docs) if many && !requested.is_empty() => {
                let present: Vec<DocId> = docs
                    .iter()
                    .filter_map(|doc| self.document(*doc).ok().and_then(|d| d.id().cloned()))
                    .collect();
                let mut missing: Vec<DocId> = Vec::new();
                for id in requested {
                    if !present.contains(&id) && !missing.contains(&id) {
                        missing.push(id);
                    }
                }
                missing
            }
            Found::Many(_) => Vec::new(),
        };

        if matches!(found, Found::One(None)) || !missing.is_empty() {
            return Err(DocRelError::NotFound {
                model: model.to_string(),
                ids: missing,
            });
        }
        Ok(found)
    }

    /// # Errors
    ///
    /// Returns `UnknownModel`, or propagates store failures.
    pub fn all(&mut self, model: &str, options: &FindOptions) -> Result<Vec<DocRef>> {
        Ok(self.find(model, Selector::All, options)?.many())
    }

    /// # Errors
    ///
    /// Returns `UnknownModel`, or propagates store failures.
    pub fn first(&mut self, model: &str, options: &FindOptions) -> Result<Option<DocRef>> {
        Ok(self.find(model, Selector::First, options)?.one())
    }

    /// # Errors
    ///
    /// Returns `UnknownModel`, or propagates store failures.
    pub fn last(&mut self, model: &str, options: &FindOptions) -> Result<Option<DocRef>> {
        Ok(self.find(model, Selector::Last, options)?.one())
    }

    /// Count matches, ignoring limit and skip
    ///
    /// # Errors
    ///
    /// Returns `UnknownModel`, or propagates store failures.
    pub fn count(&self, model: &str, options: &FindOptions) -> Result<usize> {
        self.registry.model(model)?;
        self.store.count(model, options)
    }

    /// One page of matches; the page window replaces limit and skip
    ///
    /// # Errors
    ///
    /// Returns `UnknownModel`, or propagates store failures.
    pub fn paginate(
        &mut self,
        model: &str,
        options: &FindOptions,
        pagination: Pagination,
    ) -> Result<Page<DocRef>> {
        let total_entries = self.count(model, options)?;
        let window = FindOptions {
            skip: pagination.offset(),
            limit: Some(pagination.page_size()),
            ..options.clone()
        };
        let items = self.query(model, &window)?;
        Ok(Page::new(items, total_entries, pagination))
    }

    /// Delete matches in bulk, without loading them as documents
    ///
    /// Loaded documents that were deleted are marked destroyed.
    ///
    /// # Errors
    ///
    /// Returns `UnknownModel`, or propagates store failures.
    pub fn delete_all(&mut self, model: &str, options: &FindOptions) -> Result<usize> {
        self.registry.model(model)?;
        log_op_start!("delete_all", model = %model);
        let start = Instant::now();

        let deleted = self.delete_all_impl(model, options).map_err(|e| {
            log_op_error!(
                "delete_all",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                model = %model
            );
            e
        })?;

        log_op_end!(
            "delete_all",
            duration_ms = start.elapsed().as_millis() as u64,
            model = %model,
            deleted = deleted
        );
        Ok(deleted)
    }

    fn delete_all_impl(&mut self, model: &str, options: &FindOptions) -> Result<usize> {
        let doomed: Vec<DocId> = self
            .store
            .query(model, &options.unbounded())?
            .into_iter()
            .map(|stored| stored.id)
            .collect();
        let deleted = self.store.delete_matching(model, options)?;
        for id in doomed {
            if let Some(doc) = self.identity_map.get(&(model.to_string(), id.clone())).copied() {
                self.forget(doc, model, &id)?;
            }
        }
        Ok(deleted)
    }

    fn query(&mut self, model: &str, options: &FindOptions) -> Result<Vec<DocRef>> {
        let stored = self.store.query(model, options)?;
        Ok(stored
            .into_iter()
            .map(|doc| self.materialize(model, doc))
            .collect())
    }

    /// Reuse the loaded document for this identity, or load it
    fn materialize(&mut self, model: &str, stored: StoredDocument) -> DocRef {
        let key = (model.to_string(), stored.id);
        if let Some(existing) = self.identity_map.get(&key) {
            return *existing;
        }
        let doc = self.push(Document::persisted(model, key.1.clone(), stored.fields));
        self.identity_map.insert(key, doc);
        doc
    }

    // ===== Associations =====

    /// # Errors
    ///
    /// Returns `UnknownAssociation`, or `AssociationKindMismatch` if `name`
    /// is not a polymorphic association.
    pub fn polymorphic(&mut self, owner: DocRef, name: &str) -> Result<PolymorphicProxy<'_, S>> {
        let config = self.association_config(owner, name, KIND_POLYMORPHIC)?;
        Ok(PolymorphicProxy::new(self, owner, config))
    }

    /// # Errors
    ///
    /// Returns `UnknownAssociation`, or `AssociationKindMismatch` if `name`
    /// is not the source end of a many-to-many association.
    pub fn many_to_many(&mut self, owner: DocRef, name: &str) -> Result<ManyToManyProxy<'_, S>> {
        let config = self.association_config(owner, name, KIND_MANY_TO_MANY)?;
        Ok(ManyToManyProxy::new(self, owner, config))
    }

    /// # Errors
    ///
    /// Returns `UnknownAssociation`, or `AssociationKindMismatch` if `name`
    /// is not an in-array association.
    pub fn in_array(&mut self, owner: DocRef, name: &str) -> Result<InArrayProxy<'_, S>> {
        let config = self.association_config(owner, name, KIND_IN_ARRAY)?;
        Ok(InArrayProxy::new(self, owner, config))
    }

    fn association_config(
        &self,
        owner: DocRef,
        name: &str,
        expected: &'static str,
    ) -> Result<Arc<AssociationConfig>> {
        let model = self.document(owner)?.model();
        let config = self.registry.association(model, name)?;
        if config.kind_name() != expected {
            return Err(DocRelError::AssociationKindMismatch {
                model: model.to_string(),
                association: name.to_string(),
                expected,
            });
        }
        Ok(config.clone())
    }

    pub(crate) fn proxy_state(&self, owner: DocRef, association: &str) -> Option<&ProxyState> {
        self.slots.get(owner.0)?.proxies.get(association)
    }

    pub(crate) fn proxy_state_mut(
        &mut self,
        owner: DocRef,
        association: &str,
    ) -> Result<&mut ProxyState> {
        Ok(self
            .slot_mut(owner)?
            .proxies
            .entry(association.to_string())
            .or_default())
    }

    pub(crate) fn has_proxy_state(&self, owner: DocRef, association: &str) -> bool {
        self.proxy_state(owner, association).is_some()
    }

    // ===== Internals =====

    fn push(&mut self, doc: Document) -> DocRef {
        self.slots.push(Slot {
            doc,
            proxies: HashMap::new(),
        });
        DocRef(self.slots.len() - 1)
    }

    fn slot_mut(&mut self, doc: DocRef) -> Result<&mut Slot> {
        self.slots
            .get_mut(doc.0)
            .ok_or(DocRelError::UnknownHandle { handle: doc.0 })
    }

    fn ensure_live(&self, doc: DocRef) -> Result<()> {
        let document = self.document(doc)?;
        match document.id() {
            Some(id) if document.is_destroyed() => Err(DocRelError::DocumentDestroyed {
                model: document.model().to_string(),
                id: id.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn persisted_key(&self, doc: DocRef, op: &'static str) -> Result<(String, DocId)> {
        self.ensure_live(doc)?;
        let document = self.document(doc)?;
        let id = document.id().cloned().ok_or_else(|| DocRelError::OwnerNotPersisted {
            model: document.model().to_string(),
            op,
        })?;
        Ok((document.model().to_string(), id))
    }

    fn forget(&mut self, doc: DocRef, model: &str, id: &DocId) -> Result<()> {
        self.identity_map.remove(&(model.to_string(), id.clone()));
        let slot = self.slot_mut(doc)?;
        slot.doc.mark_destroyed();
        slot.proxies.clear();
        Ok(())
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Build fields for a new peer: `attrs` plus relation keys
pub(crate) fn merge_fields(attrs: Value, relation: Fields) -> Result<Fields> {
    let mut fields = fields_from(attrs)?;
    for (key, value) in relation {
        fields.insert(key, value);
    }
    Ok(fields)
}
