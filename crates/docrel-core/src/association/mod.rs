//! Association proxies
//!
//! A proxy is a short-lived view over one owner document and one declared
//! association. It borrows the [`Session`], which holds the owner, its
//! peers and the per-association [`ProxyState`] between calls.
//!
//! Scoped reads shared by every kind live on [`ScopedFinder`].

pub mod config;
pub mod hook;
pub mod in_array;
pub mod many_to_many;
pub mod polymorphic;
pub mod scope;
pub mod state;

pub use config::{ArrayEnd, AssociationConfig, AssociationKind};
pub use hook::PostSaveHook;
pub use in_array::InArrayProxy;
pub use many_to_many::ManyToManyProxy;
pub use polymorphic::PolymorphicProxy;
pub use state::{ProxyState, Target};

use std::time::Instant;

use docrel_core_types::DocId;
use serde_json::Value;

use crate::errors::{DocRelError, Result};
use crate::model::{fields_from, DocRef};
use crate::query::{FindOptions, Found, Page, Pagination, Selector};
use crate::session::Session;
use crate::store::DocumentStore;
use crate::{log_op_end, log_op_error, log_op_start};

/// Relation-scoped reads
///
/// Every query applies the association's relation filter after merging its
/// declared finder options with the caller's. An owner that cannot have
/// persisted peers yields empty results without querying the store.
pub trait ScopedFinder<S: DocumentStore> {
    /// Session, owner handle and association declaration behind this proxy
    fn parts(&mut self) -> (&mut Session<S>, DocRef, &AssociationConfig);

    /// Create a peer related to the owner, returning it even if invalid
    ///
    /// # Errors
    ///
    /// Kind-specific; see the implementing proxy.
    fn create(&mut self, attrs: Value) -> Result<DocRef>;

    /// Scoped options for a caller's options, `None` when nothing can match
    ///
    /// # Errors
    ///
    /// Returns `UnknownHandle` if the owner is not in the session.
    fn scoped(&mut self, options: &FindOptions) -> Result<Option<FindOptions>> {
        let (session, owner, config) = self.parts();
        Ok(scope::scoped_options(config, session.document(owner)?, options))
    }

    /// # Errors
    ///
    /// Propagates store failures.
    fn all(&mut self, options: &FindOptions) -> Result<Vec<DocRef>> {
        let Some(scoped) = self.scoped(options)? else {
            return Ok(Vec::new());
        };
        let (session, _, config) = self.parts();
        session.all(&config.target_model, &scoped)
    }

    /// # Errors
    ///
    /// Propagates store failures.
    fn first(&mut self, options: &FindOptions) -> Result<Option<DocRef>> {
        Ok(self.find(Selector::First, options)?.one())
    }

    /// # Errors
    ///
    /// Propagates store failures.
    fn last(&mut self, options: &FindOptions) -> Result<Option<DocRef>> {
        Ok(self.find(Selector::Last, options)?.one())
    }

    /// # Errors
    ///
    /// Propagates store failures.
    fn count(&mut self, options: &FindOptions) -> Result<usize> {
        let Some(scoped) = self.scoped(options)? else {
            return Ok(0);
        };
        let (session, _, config) = self.parts();
        session.count(&config.target_model, &scoped)
    }

    /// # Errors
    ///
    /// Propagates store failures.
    fn paginate(&mut self, options: &FindOptions, pagination: Pagination) -> Result<Page<DocRef>> {
        let Some(scoped) = self.scoped(options)? else {
            return Ok(Page::new(Vec::new(), 0, pagination));
        };
        let (session, _, config) = self.parts();
        session.paginate(&config.target_model, &scoped, pagination)
    }

    /// Find within the relation; ids outside it are treated as missing
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn find(&mut self, selector: Selector, options: &FindOptions) -> Result<Found> {
        let Some(scoped) = self.scoped(options)? else {
            return Ok(empty_found(&selector));
        };
        let (session, _, config) = self.parts();
        session.find(&config.target_model, selector, &scoped)
    }

    /// Like `find`, failing when requested documents are not in the relation
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for ids outside the relation, even if they exist
    /// globally, and for an empty `First`/`Last`.
    fn find_strict(&mut self, selector: Selector, options: &FindOptions) -> Result<Found> {
        let Some(scoped) = self.scoped(options)? else {
            let (_, _, config) = self.parts();
            return match selector {
                Selector::All => Ok(Found::Many(Vec::new())),
                other => Err(DocRelError::NotFound {
                    model: config.target_model.clone(),
                    ids: requested_ids(&other),
                }),
            };
        };
        let (session, _, config) = self.parts();
        session.find_strict(&config.target_model, selector, &scoped)
    }

    /// First peer whose fields equal every given key
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if `conditions` is not an object.
    fn find_by(&mut self, conditions: Value) -> Result<Option<DocRef>> {
        let options = FindOptions {
            conditions: fields_from(conditions)?,
            ..FindOptions::default()
        };
        self.first(&options)
    }

    /// # Errors
    ///
    /// Returns `NotFound` if no peer matches.
    fn find_by_strict(&mut self, conditions: Value) -> Result<DocRef> {
        match self.find_by(conditions)? {
            Some(peer) => Ok(peer),
            None => {
                let (_, _, config) = self.parts();
                Err(DocRelError::NotFound {
                    model: config.target_model.clone(),
                    ids: Vec::new(),
                })
            }
        }
    }

    /// Return the matching peer, or create one related to the owner
    ///
    /// # Errors
    ///
    /// Propagates errors from `find_by` and `create`.
    fn find_or_create_by(&mut self, conditions: Value) -> Result<DocRef> {
        match self.find_by(conditions.clone())? {
            Some(peer) => Ok(peer),
            None => self.create(conditions),
        }
    }

    /// Cached peer set, loading it on first use
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn load(&mut self) -> Result<Vec<DocRef>> {
        {
            let (session, owner, config) = self.parts();
            if let Some(peers) = session
                .proxy_state(owner, &config.name)
                .and_then(|state| state.loaded())
            {
                return Ok(peers.to_vec());
            }
        }
        let peers = self.all(&FindOptions::default())?;
        let (session, owner, config) = self.parts();
        session
            .proxy_state_mut(owner, &config.name)?
            .install(peers.iter().copied());
        tracing::debug!(association = %config.name, target_len = peers.len(), "loaded target");
        Ok(peers)
    }

    /// Drop the cached peer set; the next read reloads it
    ///
    /// # Errors
    ///
    /// Returns `UnknownHandle` if the owner is not in the session.
    fn reset(&mut self) -> Result<()> {
        let (session, owner, config) = self.parts();
        session.proxy_state_mut(owner, &config.name)?.unload();
        Ok(())
    }

    /// # Errors
    ///
    /// Propagates store failures.
    fn len(&mut self) -> Result<usize> {
        Ok(self.load()?.len())
    }

    /// # Errors
    ///
    /// Propagates store failures.
    fn is_empty(&mut self) -> Result<bool> {
        Ok(self.load()?.is_empty())
    }

    /// # Errors
    ///
    /// Propagates store failures.
    fn includes(&mut self, peer: DocRef) -> Result<bool> {
        Ok(self.load()?.contains(&peer))
    }
}

fn empty_found(selector: &Selector) -> Found {
    if selector.returns_many() {
        Found::Many(Vec::new())
    } else {
        Found::One(None)
    }
}

fn requested_ids(selector: &Selector) -> Vec<DocId> {
    match selector {
        Selector::Id(id) => vec![id.clone()],
        Selector::Ids(ids) => ids.clone(),
        _ => Vec::new(),
    }
}

/// Run a proxy mutation with start/end/error logging
pub(crate) fn traced<T>(
    op: &'static str,
    association: &str,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    log_op_start!(op, association = %association);
    let start = Instant::now();

    let result = f().map_err(|e| {
        log_op_error!(
            op,
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            association = %association
        );
        e
    })?;

    log_op_end!(
        op,
        duration_ms = start.elapsed().as_millis() as u64,
        association = %association
    );
    Ok(result)
}
