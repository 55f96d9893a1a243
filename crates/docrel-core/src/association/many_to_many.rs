//! Source end of an array many-to-many relation
//!
//! Peers store the owner's id in their `in_key` array, which is the holder
//! end (`source`) declared on the peer model. Every edit here is mirrored on
//! that holder end in memory. Peers whose arrays changed through `replace`
//! are queued and saved by the owner's post-save hook: first the peers that
//! now reference the owner, then the peers that no longer do. A flush that
//! fails partway keeps the unsaved peers queued and does not undo the saved
//! ones.

use std::sync::Arc;

use serde_json::Value;

use crate::association::state::enqueue;
use crate::association::{traced, AssociationConfig, InArrayProxy, ScopedFinder};
use crate::errors::{DocRelError, Result};
use crate::log_op_skip;
use crate::model::DocRef;
use crate::query::FindOptions;
use crate::session::Session;
use crate::store::DocumentStore;

/// Proxy over the source end of an array many-to-many association
pub struct ManyToManyProxy<'s, S: DocumentStore> {
    session: &'s mut Session<S>,
    owner: DocRef,
    config: Arc<AssociationConfig>,
}

#[derive(Clone, Copy)]
enum Queue {
    New,
    Removed,
}

impl<'s, S: DocumentStore> ScopedFinder<S> for ManyToManyProxy<'s, S> {
    fn parts(&mut self) -> (&mut Session<S>, DocRef, &AssociationConfig) {
        (&mut *self.session, self.owner, self.config.as_ref())
    }

    /// Save the owner if new, then create a peer already referencing it
    ///
    /// The peer joins the cached target only if it persisted. An invalid
    /// peer is returned unsaved with `errors` populated; the cache is left
    /// as it was.
    fn create(&mut self, attrs: Value) -> Result<DocRef> {
        let config = self.config.clone();
        traced("many_to_many_create", &config.name, || self.create_impl(attrs, false))
    }
}

impl<'s, S: DocumentStore> ManyToManyProxy<'s, S> {
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

    /// Holder-end proxy on `peer` pointing back at this owner's model
    fn reciprocal(&mut self, peer: DocRef) -> Result<InArrayProxy<'_, S>> {
        let reciprocal = self
            .session
            .registry()
            .association(&self.config.target_model, self.config.require_source()?)?
            .clone();
        Ok(InArrayProxy::new(&mut *self.session, peer, reciprocal))
    }

    fn ensure_owner_saved(&mut self) -> Result<()> {
        if self.session.is_new(self.owner)? {
            self.session.save_strict(self.owner)?;
        }
        Ok(())
    }

    fn queue(&self, queue: Queue) -> Vec<DocRef> {
        self.session
            .proxy_state(self.owner, &self.config.name)
            .map(|state| match queue {
                Queue::New => state.pending_new.clone(),
                Queue::Removed => state.pending_removed.clone(),
            })
            .unwrap_or_default()
    }

    /// Peers queued to be saved because they now reference the owner
    pub fn pending_new(&self) -> Vec<DocRef> {
        self.queue(Queue::New)
    }

    /// Peers queued to be saved because they no longer reference the owner
    pub fn pending_removed(&self) -> Vec<DocRef> {
        self.queue(Queue::Removed)
    }

    /// Relate peers to the owner
    ///
    /// Saves the owner first if it is new. Each peer not already cached gets
    /// the owner's id in its array (in memory) and joins the cache; peers
    /// already cached are ignored. Peers are not saved.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailure` if the owner cannot be saved, or
    /// `InvalidField` if a peer's array field is not an array.
    pub fn append(&mut self, peers: &[DocRef]) -> Result<usize> {
        let config = self.config.clone();
        traced("many_to_many_append", &config.name, || self.append_impl(peers))
    }

    fn append_impl(&mut self, peers: &[DocRef]) -> Result<usize> {
        if peers.is_empty() {
            return Ok(0);
        }
        self.ensure_owner_saved()?;
        self.load()?;

        let owner = self.owner;
        let mut added = 0;
        for &peer in peers {
            let cached = self
                .session
                .proxy_state(owner, &self.config.name)
                .is_some_and(|state| state.contains(peer));
            if cached {
                continue;
            }
            self.reciprocal(peer)?.append(&[owner])?;
            self.session
                .proxy_state_mut(owner, &self.config.name)?
                .add(peer);
            added += 1;
        }
        Ok(added)
    }

    /// Make `peers` the related set
    ///
    /// Cached peers that are not in `peers` lose the owner's id and are
    /// queued as removed; every peer in `peers` gains the owner's id and is
    /// queued as new. The cache becomes `peers` (deduplicated) at once. The
    /// queued writes happen when the owner is next saved.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailure` if the owner is new, `peers` is non-empty
    /// and the owner cannot be saved.
    pub fn replace(&mut self, peers: &[DocRef]) -> Result<()> {
        let config = self.config.clone();
        traced("many_to_many_replace", &config.name, || self.replace_impl(peers))
    }

    fn replace_impl(&mut self, peers: &[DocRef]) -> Result<()> {
        if !peers.is_empty() {
            self.ensure_owner_saved()?;
        }
        let previous = self.load()?;
        let owner = self.owner;

        for &old in &previous {
            if peers.contains(&old) {
                continue;
            }
            self.reciprocal(old)?.remove(owner)?;
            let state = self.session.proxy_state_mut(owner, &self.config.name)?;
            enqueue(&mut state.pending_removed, old);
        }

        for &new in peers {
            self.reciprocal(new)?.append(&[owner])?;
            let state = self.session.proxy_state_mut(owner, &self.config.name)?;
            state.pending_removed.retain(|p| *p != new);
            enqueue(&mut state.pending_new, new);
        }

        self.session
            .proxy_state_mut(owner, &self.config.name)?
            .install(peers.iter().copied());
        Ok(())
    }

    /// Save queued peers: new references first, then removed ones
    ///
    /// Returns how many peers were written.
    ///
    /// # Errors
    ///
    /// Returns `PartialFlushFailure` wrapping the first failing save; that
    /// peer and every peer after it stay queued.
    pub fn flush(&mut self) -> Result<usize> {
        let config = self.config.clone();
        traced("many_to_many_flush", &config.name, || self.flush_impl())
    }

    fn flush_impl(&mut self) -> Result<usize> {
        let mut persisted = 0;
        for queue in [Queue::New, Queue::Removed] {
            loop {
                let next = self
                    .session
                    .proxy_state(self.owner, &self.config.name)
                    .and_then(|state| match queue {
                        Queue::New => state.pending_new.first().copied(),
                        Queue::Removed => state.pending_removed.first().copied(),
                    });
                let Some(peer) = next else { break };

                if !self.session.document(peer)?.is_destroyed() {
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
                match queue {
                    Queue::New => state.pending_new.retain(|p| *p != peer),
                    Queue::Removed => state.pending_removed.retain(|p| *p != peer),
                }
            }
        }
        Ok(persisted)
    }

    /// Create a peer, failing if it is invalid
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailure` for an invalid owner or peer. On peer
    /// failure the cache is unchanged; an owner saved beforehand stays saved.
    pub fn create_strict(&mut self, attrs: Value) -> Result<DocRef> {
        let config = self.config.clone();
        traced("many_to_many_create", &config.name, || self.create_impl(attrs, true))
    }

    fn create_impl(&mut self, attrs: Value, strict: bool) -> Result<DocRef> {
        self.ensure_owner_saved()?;
        self.load()?;

        let owner_id = self
            .session
            .id(self.owner)?
            .ok_or_else(|| DocRelError::OwnerNotPersisted {
                model: self.config.owner_model.clone(),
                op: "create a related document",
            })?;
        let peer = self.session.build(&self.config.target_model, attrs)?;
        let in_key = self.in_key()?;
        self.session.document_mut(peer)?.push_id(&in_key, &owner_id)?;

        let saved = if strict {
            self.session.save_strict(peer)?;
            true
        } else {
            self.session.save(peer)?
        };
        if saved {
            self.session
                .proxy_state_mut(self.owner, &self.config.name)?
                .add(peer);
        }
        Ok(peer)
    }

    /// Destroy related peers matching `filter`, returning how many
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn destroy_all(&mut self, filter: &FindOptions) -> Result<usize> {
        let config = self.config.clone();
        traced("many_to_many_destroy_all", &config.name, || {
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
        traced("many_to_many_delete_all", &config.name, || {
            let deleted = match self.scoped(filter)? {
                Some(scoped) => self.session.delete_all(&config.target_model, &scoped)?,
                None => 0,
            };
            self.reset()?;
            Ok(deleted)
        })
    }

    /// Remove the owner's id from every related peer and save it
    ///
    /// Best effort: peers that fail validation or are gone are skipped and
    /// logged. Returns how many peers were detached.
    ///
    /// # Errors
    ///
    /// Propagates store failures other than a missing peer.
    pub fn nullify(&mut self) -> Result<usize> {
        let config = self.config.clone();
        traced("many_to_many_nullify", &config.name, || self.nullify_impl())
    }

    fn nullify_impl(&mut self) -> Result<usize> {
        let owner = self.owner;
        let peers = self.load()?;
        let mut detached = 0;
        for peer in peers {
            self.reciprocal(peer)?.remove(owner)?;
            match self.session.save_strict(peer) {
                Ok(()) => detached += 1,
                Err(
                    e @ (DocRelError::ValidationFailure { .. }
                    | DocRelError::NotFound { .. }
                    | DocRelError::DocumentDestroyed { .. }),
                ) => {
                    log_op_skip!("many_to_many_nullify", e, peer = ?peer);
                }
                Err(e) => return Err(e),
            }
        }
        self.reset()?;
        Ok(detached)
    }
}
