use crate::model::DocRef;

/// Cached peer set of one association on one owner
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Target {
    #[default]
    Unloaded,
    Loaded(Vec<DocRef>),
}

/// Per-owner, per-association proxy state held by the session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyState {
    pub target: Target,
    /// Polymorphic peers built before the owner had an identity
    pub pending: Vec<DocRef>,
    /// Many-to-many peers to save because they now reference the owner
    pub pending_new: Vec<DocRef>,
    /// Many-to-many peers to save because they no longer reference the owner
    pub pending_removed: Vec<DocRef>,
}

impl ProxyState {
    pub fn loaded(&self) -> Option<&[DocRef]> {
        match &self.target {
            Target::Loaded(peers) => Some(peers),
            Target::Unloaded => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.target, Target::Loaded(_))
    }

    /// Install a peer set, keeping the first occurrence of each handle
    pub fn install(&mut self, peers: impl IntoIterator<Item = DocRef>) {
        let mut unique: Vec<DocRef> = Vec::new();
        for peer in peers {
            if !unique.contains(&peer) {
                unique.push(peer);
            }
        }
        self.target = Target::Loaded(unique);
    }

    /// Add a peer to a loaded target; returns `false` if already present or
    /// the target is not loaded
    pub fn add(&mut self, peer: DocRef) -> bool {
        match &mut self.target {
            Target::Loaded(peers) if !peers.contains(&peer) => {
                peers.push(peer);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, peer: DocRef) -> bool {
        match &mut self.target {
            Target::Loaded(peers) => {
                let before = peers.len();
                peers.retain(|p| *p != peer);
                peers.len() != before
            }
            Target::Unloaded => false,
        }
    }

    pub fn contains(&self, peer: DocRef) -> bool {
        self.loaded().is_some_and(|peers| peers.contains(&peer))
    }

    /// Whether a flush has writes to perform
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty() || !self.pending_new.is_empty() || !self.pending_removed.is_empty()
    }

    /// Drop the cached target; pending queues are kept
    pub fn unload(&mut self) {
        self.target = Target::Unloaded;
    }
}

/// Queue a peer unless it is already queued
pub(crate) fn enqueue(queue: &mut Vec<DocRef>, peer: DocRef) {
    if !queue.contains(&peer) {
        queue.push(peer);
    }
}
