//! Pane-level state synchronization between tmux and the host.
//!
//! Maps tmux pane IDs to the host's local session IDs, one session per pane.

use crate::tmux::types::{PaneId, SessionId};
use std::collections::{BTreeMap, HashMap};

/// Bidirectional tmux pane ↔ local session mapping.
#[derive(Debug, Default)]
pub struct PaneSessionMap {
    pane_to_session: BTreeMap<PaneId, SessionId>,
    session_to_pane: HashMap<SessionId, PaneId>,
}

impl PaneSessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `session_id` to `pane_id`, replacing whatever either was bound to.
    /// Returns the session that previously backed the pane, if it differs.
    pub fn map_pane(&mut self, pane_id: PaneId, session_id: SessionId) -> Option<SessionId> {
        if let Some(old_pane) = self.session_to_pane.remove(&session_id) {
            self.pane_to_session.remove(&old_pane);
        }
        let previous = self.pane_to_session.insert(pane_id, session_id.clone());
        if let Some(previous) = &previous {
            self.session_to_pane.remove(previous);
        }
        self.session_to_pane.insert(session_id.clone(), pane_id);
        previous.filter(|p| *p != session_id)
    }

    /// Remove a pane, returning the session that backed it.
    pub fn unmap_pane(&mut self, pane_id: PaneId) -> Option<SessionId> {
        let session_id = self.pane_to_session.remove(&pane_id)?;
        self.session_to_pane.remove(&session_id);
        Some(session_id)
    }

    pub fn session_for(&self, pane_id: PaneId) -> Option<&SessionId> {
        self.pane_to_session.get(&pane_id)
    }

    pub fn pane_for(&self, session_id: &str) -> Option<PaneId> {
        self.session_to_pane.get(session_id).copied()
    }

    pub fn contains_pane(&self, pane_id: PaneId) -> bool {
        self.pane_to_session.contains_key(&pane_id)
    }

    pub fn pane_ids(&self) -> impl Iterator<Item = PaneId> + '_ {
        self.pane_to_session.keys().copied()
    }

    /// Snapshot of the pane → session direction, ordered by pane.
    pub fn to_map(&self) -> BTreeMap<PaneId, SessionId> {
        self.pane_to_session.clone()
    }

    pub fn len(&self) -> usize {
        self.pane_to_session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pane_to_session.is_empty()
    }

    pub fn clear(&mut self) {
        self.pane_to_session.clear();
        self.session_to_pane.clear();
    }
}
