//! One owner to many peers keyed by `<as>_type` / `<as>_id`
//!
//! Peers built while the owner is new only get the type key and wait in the
//! pending queue; the owner's post-save hook gives them the id key and saves
//! them. A flush that fails partway keeps the failing peer and every peer
//! after it queued; peers already saved stay saved.

use std::sync::Arc;

use serde_json::Value;

use crate::association::state::enqueue;
use crate::association::{traced, AssociationConfig, ScopedFinder};
use crate::errors::{DocRelError, Result};
use crate::log_op_skip;
use crate::model::{DocRef, Fields};
use crate::query::FindOptions;
use crate::session::{merge_fields, Session};
use crate::store::DocumentStore;

/// Proxy over a polymorphic one-to-many association
pub struct PolymorphicProxy<'s, S: DocumentStore> {
    session: &'s mut Session<S>,
    owner: DocRef,
    config: Arc<AssociationConfig>,
}

impl<'s, S: DocumentStore> ScopedFinder<S> for PolymorphicProxy<'s, S> {
    fn parts(&mut self) -> (&mut Session<S>, DocRef, &AssociationConfig) {
        (&mut *self.session, self.owner, self.config.as_ref())
    }

    /// Save the owner if new, then save a scoped peer
    ///
    /// The peer is returned unsaved, with `errors` populated, if invalid.
    fn create(&mut self, attrs: Value) -> Result<DocRef> {
        let config = self.config.clone();
        traced("polymorphic_create", &config.name, || self.create_impl(attrs, false))
    }
}

impl<'s, S: DocumentStore> PolymorphicProxy<'s, S> {
    pub(crate) fn new(
        session: &'s mut Session<S>,
        owner: DocRef,
        config: Arc<AssociationConfig>,
    ) -> Self {
        Self {
            session,
            owner,
            config,
        }
    }

    pub fn config(&self) -> &AssociationConfig {
        &self.config
    }

    fn keys(&self) -> Result<(String, String)> {
        self.config.require_polymorphic_keys()
    }

    /// Relation keys for a peer of the current owner
    fn relation_fields(&self) -> Result<Fields> {
        let (type_key, id_key) = self.keys()?;
        let owner = self.session.document(self.owner)?;
        let mut fields = Fields::new();
        fields.insert(type_key, Value::String(owner.model().to_string()));
        if let Some(id) = owner.id() {
            fields.insert(id_key, Value::String(id.to_string()));
        }
        Ok(fields)
    }

    fn ensure_owner_saved(&mut self) -> Result<()> {
        if self.session.is_new(self.owner)? {
            self.session.save_strict(self.owner)?;
        }
        Ok(())
    }

    /// Construct an unsaved peer related to the owner
    ///
    /// For a new owner only the type key is set and the peer is queued until
    /// the owner is saved. Never persists anything.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if `attrs` is not an object.
    pub fn build(&mut self, attrs: Value) -> Result<DocRef> {
        let config = self.config.clone();
        traced("polymorphic_build", &config.name, || self.build_impl(attrs))
    }

    fn build_impl(&mut self, attrs: Value) -> Result<DocRef> {
        let fields = merge_fields(attrs, self.relation_fields()?)?;
        let peer = self
            .session
            .build(&self.config.target_model, Value::Object(fields))?;

        let owner_is_new = self.session.is_new(self.owner)?;
        let state = self.session.proxy_state_mut(self.owner, &self.config.name)?;
        if owner_is_new {
            enqueue(&mut state.pending, peer);
        } else {
            state.unload();
        }
        Ok(peer)
    }

    /// Give queued peers the owner's keys and save them, in build order
    ///
    /// Peers that were saved meanwhile, or that now belong to another owner,
    /// leave the queue untouched. Returns how many peers were written.
    ///
    /// # Errors
    ///
    /// Returns `OwnerNotPersisted` if the owner is still new, or
    /// `PartialFlushFailure` wrapping the first peer's save error.
    pub fn flush_pending(&mut self) -> Result<usize> {
        let config = self.config.clone();
        traced("polymorphic_flush", &config.name, || self.flush_pending_impl())
    }

    fn flush_pending_impl(&mut self) -> Result<usize> {
        let owner = self.session.document(self.owner)?;
        let owner_id = owner.id().cloned().ok_or_else(|| DocRelError::OwnerNotPersisted {
            model: owner.model().to_string(),
            op: "flush pending peers",
        })?;
        let (type_key, id_key) = self.keys()?;
        let relation = self.relation_fields()?;
        let mut persisted = 0;

        loop {
            let next = self
                .session
                .proxy_state(self.owner, &self.config.name)
                .and_then(|state| state.pending.first().copied());
            let Some(peer) = next else { break };

            let document = self.session.document(peer)?;
            let claimed_elsewhere = match document.get(&id_key) {
                None | Some(Value::Null) => false,
                Some(value) => value.as_str() != Some(owner_id.as_str()),
            };
            if document.is_new() && !document.is_destroyed() && !claimed_elsewhere {
                for (key, value) in &relation {
                    self.session.set_field(peer, key, value.clone())?;
                }
                tracing::debug!(type_key = %type_key, peer = ?peer, "flushing pending peer");
                if let Err(source) = self.session.save_strict(peer) {
                    return Err(DocRelError::PartialFlushFailure {
                        association: self.config.name.clone(),
                        persisted,
                        peer: self.session.id(peer)?,
                        source: Box::new(source),
                    });
                }
                persisted += 1;
            }

            let state = self.session.proxy_state_mut(self.owner, &self.config.name)?;
            state.pending.retain(|p| *p != peer);
        }

        if persisted > 0 {
            self.session
                .proxy_state_mut(self.owner, &self.config.name)?
                .unload();
        }
        Ok(persisted)
    }

    /// Peers still waiting for the owner's identity
    pub fn pending(&self) -> Vec<DocRef> {
        self.session
            .proxy_state(self.owner, &self.config.name)
            .map(|state| state.pending.clone())
            .unwrap_or_default()
    }

    /// Create a peer, failing if it is invalid
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailure` for an invalid owner or peer.
    pub fn create_strict(&mut self, attrs: Value) -> Result<DocRef> {
        let config = self.config.clone();
        traced("polymorphic_create", &config.name, || self.create_impl(attrs, true))
    }

    fn create_impl(&mut self, attrs: Value, strict: bool) -> Result<DocRef> {
        self.ensure_owner_saved()?;
        let fields = merge_fields(attrs, self.relation_fields()?)?;
        let peer = self
            .session
            .build(&self.config.target_model, Value::Object(fields))?;
        if strict {
            self.session.save_strict(peer)?;
        } else {
            self.session.save(peer)?;
        }
        self.reset()?;
        Ok(peer)
    }

    /// Relate existing peers to the owner and save them
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailure` for an invalid owner or peer; peers before
    /// the failing one stay saved.
    pub fn append(&mut self, peers: &[DocRef]) -> Result<()> {
        let config = self.config.clone();
        traced("polymorphic_append", &config.name, || self.append_impl(peers))
    }

    fn append_impl(&mut self, peers: &[DocRef]) -> Result<()> {
        if peers.is_empty() {
            return Ok(());
        }
        self.ensure_owner_saved()?;
        let relation = self.relation_fields()?;
        for &peer in peers {
            for (key, value) in &relation {
                self.session.set_field(peer, key, value.clone())?;
            }
            self.session.save_strict(peer)?;
        }
        self.reset()
    }

    /// Destroy related peers matching `filter`, returning how many
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn destroy_all(&mut self, filter: &FindOptions) -> Result<usize> {
        let config = self.config.clone();
        traced("polymorphic_destroy_all", &config.name, || {
            let peers = self.all(filter)?;
            for &peer in &peers {
                self.session.destroy(peer)?;
            }
            self.reset()?;
            Ok(peers.len())
        })
    }

    /// Delete related peers matching `filter` in bulk, returning how many
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn delete_all(&mut self, filter: &FindOptions) -> Result<usize> {
        let config = self.config.clone();
        traced("polymorphic_delete_all", &config.name, || {
            let deleted = match self.scoped(filter)? {
                Some(scoped) => self.session.delete_all(&config.target_model, &scoped)?,
                None => 0,
            };
            self.reset()?;
            Ok(deleted)
        })
    }

    /// Unset both relation keys on every related peer and save it
    ///
    /// Best effort: peers that fail validation or are gone are skipped and
    /// logged.
    /// Returns how many peers were detached.
    ///
    /// # Errors
    ///
    /// Propagates store failures other than a missing peer.
    pub fn nullify(&mut self) -> Result<usize> {
        let config = self.config.clone();
        traced("polymorphic_nullify", &config.name, || self.nullify_impl())
    }

    fn nullify_impl(&mut self) -> Result<usize> {
        let (type_key, id_key) = self.keys()?;
        let peers = self.load()?;
        let mut detached = 0;
        for peer in peers {
            self.session.unset_field(peer, &type_key)?;
            self.session.unset_field(peer, &id_key)?;
            match self.session.save_strict(peer) {
                Ok(()) => detached += 1,
                Err(
                    e @ (DocRelError::ValidationFailure { .. }
                    | DocRelError::NotFound { .. }
                    | DocRelError::DocumentDestroyed { .. }),
                ) => {
                    log_op_skip!("polymorphic_nullify", e, peer = ?peer);
                }
                Err(e) => return Err(e),
            }
        }
        self.reset()?;
        Ok(detached)
    }
}
