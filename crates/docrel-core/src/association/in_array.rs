//! Holder end of an array many-to-many: the owner stores `in_key: [ids]`
//!
//! Array edits happen on the owner in memory; the caller saves the owner,
//! except for `create` and `nullify`, which save it themselves.

use std::sync::Arc;

use docrel_core_types::DocId;
use serde_json::Value;

use crate::association::{traced, AssociationConfig, ProxyState, ScopedFinder};
use crate::errors::{DocRelError, Result};
use crate::model::DocRef;
use crate::query::FindOptions;
use crate::session::Session;
use crate::store::DocumentStore;

/// Proxy over the holder end of an array many-to-many association
pub struct InArrayProxy<'s, S: DocumentStore> {
    session: &'s mut Session<S>,
    owner: DocRef,
    config: Arc<AssociationConfig>,
}

impl<'s, S: DocumentStore> ScopedFinder<S> for InArrayProxy<'s, S> {
    fn parts(&mut self) -> (&mut Session<S>, DocRef, &AssociationConfig) {
        (&mut *self.session, self.owner, self.config.as_ref())
    }

    /// Create a peer; its id is recorded on the owner only if it persisted
    ///
    /// An invalid peer is returned unsaved and the owner is left untouched.
    fn create(&mut self, attrs: Value) -> Result<DocRef> {
        let config = self.config.clone();
        traced("in_array_create", &config.name, || self.create_impl(attrs, false))
    }
}

impl<'s, S: DocumentStore> InArrayProxy<'s, S> {
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

    fn in_key(&self) -> Result<String> {
        self.config.require_in_key()
    }

    /// Peer ids currently held by the owner
    ///
    /// # Errors
    ///
    /// Returns `UnknownHandle` if the owner is not in the session.
    pub fn ids(&self) -> Result<Vec<DocId>> {
        self.session.id_array(self.owner, &self.in_key()?)
    }

    /// Save `peer` if new and return its identity
    fn persisted_id(&mut self, peer: DocRef) -> Result<DocId> {
        if self.session.is_new(peer)? {
            self.session.save_strict(peer)?;
        }
        let document = self.session.document(peer)?;
        document
            .id()
            .cloned()
            .ok_or_else(|| DocRelError::OwnerNotPersisted {
                model: document.model().to_string(),
                op: "reference from an id array",
            })
    }

    /// Add peers' ids to the owner's array, saving new peers first
    ///
    /// Ids already present are not added again.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailure` if a new peer cannot be saved, or
    /// `InvalidField` if the owner's array field is not an array.
    pub fn append(&mut self, peers: &[DocRef]) -> Result<()> {
        let config = self.config.clone();
        traced("in_array_append", &config.name, || self.append_impl(peers))
    }

    fn append_impl(&mut self, peers: &[DocRef]) -> Result<()> {
        let in_key = self.in_key()?;
        for &peer in peers {
            let id = self.persisted_id(peer)?;
            self.session.document_mut(self.owner)?.push_id(&in_key, &id)?;
            if let Some(state) = self.loaded_state_mut()? {
                state.add(peer);
            }
        }
        Ok(())
    }

    /// Drop a peer's id from the owner's array
    ///
    /// Returns `true` if the array changed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidField` if the owner's array field is not an array.
    pub fn remove(&mut self, peer: DocRef) -> Result<bool> {
        let config = self.config.clone();
        traced("in_array_remove", &config.name, || {
            let in_key = self.in_key()?;
            let changed = match self.session.id(peer)? {
                Some(id) => self.session.document_mut(self.owner)?.remove_id(&in_key, &id)?,
                None => false,
            };
            if let Some(state) = self.loaded_state_mut()? {
                state.remove(peer);
            }
            Ok(changed)
        })
    }

    /// Set the owner's array to exactly these peers, saving new ones first
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailure` if a new peer cannot be saved.
    pub fn replace(&mut self, peers: &[DocRef]) -> Result<()> {
        let config = self.config.clone();
        traced("in_array_replace", &config.name, || {
            let in_key = self.in_key()?;
            let mut ids = Vec::with_capacity(peers.len());
            for &peer in peers {
                ids.push(self.persisted_id(peer)?);
            }
            self.session.document_mut(self.owner)?.set_id_array(&in_key, &ids);
            self.session
                .proxy_state_mut(self.owner, &config.name)?
                .install(peers.iter().copied());
            Ok(())
        })
    }

    /// Create a peer, failing if it is invalid
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailure` for an invalid peer (the owner is left
    /// untouched) or an invalid owner.
    pub fn create_strict(&mut self, attrs: Value) -> Result<DocRef> {
        let config = self.config.clone();
        traced("in_array_create", &config.name, || self.create_impl(attrs, true))
    }

    fn create_impl(&mut self, attrs: Value, strict: bool) -> Result<DocRef> {
        let peer = self.session.build(&self.config.target_model, attrs)?;
        let saved = if strict {
            self.session.save_strict(peer)?;
            true
        } else {
            self.session.save(peer)?
        };
        if !saved {
            return Ok(peer);
        }

        let id = self.persisted_id(peer)?;
        let in_key = self.in_key()?;
        self.session.document_mut(self.owner)?.push_id(&in_key, &id)?;
        if let Some(state) = self.loaded_state_mut()? {
            state.add(peer);
        }
        self.session.save_strict(self.owner)?;
        Ok(peer)
    }

    /// Empty the owner's array and save the owner
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailure` if the owner cannot be saved.
    pub fn nullify(&mut self) -> Result<()> {
        let config = self.config.clone();
        traced("in_array_nullify", &config.name, || {
            let in_key = self.in_key()?;
            self.session.document_mut(self.owner)?.set_id_array(&in_key, &[]);
            self.session
                .proxy_state_mut(self.owner, &config.name)?
                .install(Vec::new());
            self.session.save_strict(self.owner)
        })
    }

    /// Destroy held peers matching `filter` and drop their ids from the owner
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn destroy_all(&mut self, filter: &FindOptions) -> Result<usize> {
        let config = self.config.clone();
        traced("in_array_destroy_all", &config.name, || {
            let peers = self.all(filter)?;
            let in_key = self.in_key()?;
            for &peer in &peers {
                if let Some(id) = self.session.id(peer)? {
                    self.session.document_mut(self.owner)?.remove_id(&in_key, &id)?;
                }
                self.session.destroy(peer)?;
            }
            self.reset()?;
            Ok(peers.len())
        })
    }

    /// Bulk-delete held peers matching `filter` and drop their ids
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn delete_all(&mut self, filter: &FindOptions) -> Result<usize> {
        let config = self.config.clone();
        traced("in_array_delete_all", &config.name, || {
            let Some(scoped) = self.scoped(filter)? else {
                return Ok(0);
            };
            let in_key = self.in_key()?;
            for peer in self.all(filter)? {
                if let Some(id) = self.session.id(peer)? {
                    self.session.document_mut(self.owner)?.remove_id(&in_key, &id)?;
                }
            }
            let deleted = self.session.delete_all(&config.target_model, &scoped)?;
            self.reset()?;
            Ok(deleted)
        })
    }

    fn loaded_state_mut(&mut self) -> Result<Option<&mut ProxyState>> {
        let state = self.session.proxy_state_mut(self.owner, &self.config.name)?;
        Ok(if state.is_loaded() { Some(state) } else { None })
    }
}
