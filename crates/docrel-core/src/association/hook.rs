//! Post-save persistence hooks
//!
//! Each model carries an ordered list of hooks, one per association whose
//! pending peer writes must be flushed after the owner's own write. The list
//! is fixed when the registry is built.

use std::time::Instant;

use crate::association::config::{ArrayEnd, AssociationKind};
use crate::association::many_to_many::ManyToManyProxy;
use crate::association::polymorphic::PolymorphicProxy;
use crate::errors::Result;
use crate::model::DocRef;
use crate::session::Session;
use crate::store::DocumentStore;
use crate::{log_op_end, log_op_error, log_op_start};

/// Hook bound to one association of the owning model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSaveHook {
    pub association: String,
}

/// Run the owner's hooks in registration order, stopping at the first failure
///
/// Associations never accessed on this owner have no proxy state and are
/// skipped without touching the store.
pub(crate) fn run_post_save_hooks<S: DocumentStore>(
    session: &mut Session<S>,
    owner: DocRef,
) -> Result<()> {
    let model = session.document(owner)?.model().to_string();
    let registry = session.registry().clone();
    let entry = registry.model(&model)?;

    for hook in &entry.post_save_hooks {
        if !session.has_proxy_state(owner, &hook.association) {
            continue;
        }
        let config = registry.association(&model, &hook.association)?;

        log_op_start!("post_save_hook", model = %model, association = %hook.association);
        let start = Instant::now();

        let result = match &config.kind {
            AssociationKind::PolymorphicOneToMany { .. } => {
                PolymorphicProxy::new(session, owner, config.clone()).flush_pending()
            }
            AssociationKind::ArrayManyToMany(ArrayEnd::Source { .. }) => {
                ManyToManyProxy::new(session, owner, config.clone()).flush()
            }
            AssociationKind::ArrayManyToMany(ArrayEnd::Holder { .. }) => Ok(0),
        };

        let flushed = result.map_err(|e| {
            log_op_error!(
                "post_save_hook",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                association = %hook.association
            );
            e
        })?;

        log_op_end!(
            "post_save_hook",
            duration_ms = start.elapsed().as_millis() as u64,
            association = %hook.association,
            flushed = flushed
        );
    }
    Ok(())
}
