//! Messages exchanged with the host application
//!
//! The host owns the visible terminal sessions. The controller publishes
//! [`HostEvent`]s to it and receives [`HostRequest`]s from it; both are
//! serializable so they can cross an IPC boundary as JSON.

use crate::sync::local_layout::LocalLayoutNode;
use crate::tmux::commands::Size;
use crate::tmux::types::{LayoutSnapshot, Pane, PaneId, SessionId, SplitDirection, Window, WindowId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Remote layout published after every successful sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLayoutMessage {
    pub panes: BTreeMap<PaneId, Pane>,
    pub windows: Vec<Window>,
    pub pane_to_session: BTreeMap<PaneId, SessionId>,
}

impl SyncLayoutMessage {
    pub fn new(snapshot: LayoutSnapshot, pane_to_session: BTreeMap<PaneId, SessionId>) -> Self {
        Self {
            panes: snapshot.panes,
            windows: snapshot.windows,
            pane_to_session,
        }
    }
}

/// Ask the host to create a local session for a pane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSessionMessage {
    pub pane_id: PaneId,
    /// Window containing the pane, when the window listing knows it
    pub tmux_window_id: Option<WindowId>,
    /// Host window the controller is attached to
    pub host_window_id: String,
    /// Direction of the split directly containing the pane
    pub split_direction: Option<SplitDirection>,
}

/// A local session changed size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeMessage {
    pub session_id: SessionId,
    pub pane_cols: u64,
    pub pane_rows: u64,
    pub window_cols: Option<u64>,
    pub window_rows: Option<u64>,
}

impl ResizeMessage {
    /// Build a resize for `session_id`, taking the window size from the
    /// host's split tree when one is available.
    pub fn from_local_layout(
        session_id: impl Into<SessionId>,
        pane: Size,
        layout: Option<&LocalLayoutNode>,
    ) -> Self {
        let window = layout.map(LocalLayoutNode::aggregate_size);
        Self {
            session_id: session_id.into(),
            pane_cols: pane.cols,
            pane_rows: pane.rows,
            window_cols: window.map(|w| w.cols),
            window_rows: window.map(|w| w.rows),
        }
    }

    /// Requested window size, if both dimensions are known and non-zero.
    pub fn window_size(&self) -> Option<Size> {
        match (self.window_cols, self.window_rows) {
            (Some(cols), Some(rows)) if cols > 0 && rows > 0 => Some(Size::new(cols, rows)),
            _ => None,
        }
    }

    pub fn pane_size(&self) -> Size {
        Size::new(self.pane_cols, self.pane_rows)
    }
}

/// Events published to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum HostEvent {
    #[serde(rename = "tmux:sync")]
    SyncLayout(SyncLayoutMessage),
    #[serde(rename = "tmux:request:session")]
    RequestSession(RequestSessionMessage),
    #[serde(rename = "tmux:change:pane", rename_all = "camelCase")]
    ActiveSessionChanged { session_id: SessionId },
    #[serde(rename = "tmux:session:output", rename_all = "camelCase")]
    SessionOutput { session_id: SessionId, data: Vec<u8> },
    #[serde(rename = "tmux:session:exit", rename_all = "camelCase")]
    SessionExited { session_id: SessionId },
}

/// Requests received from the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum HostRequest {
    #[serde(rename = "tmux:request:sync")]
    RequestSync,
    #[serde(rename = "tmux:change:pane", rename_all = "camelCase")]
    PaneChanged { session_id: SessionId },
    #[serde(rename = "tmux:change:window", rename_all = "camelCase")]
    WindowChanged { window_id: WindowId },
    #[serde(rename = "tmux:resize")]
    Resize(ResizeMessage),
}

/// Logical event names the suppression registry is keyed by.
///
/// `Remote*` events originate in tmux notifications, `Local*` events in
/// host requests. Mirroring a change in one direction blocks the matching
/// event of the other direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEvent {
    RemoteLayoutChange,
    RemoteWindowAdd,
    RemoteWindowPaneChanged,
    RemoteSessionWindowChanged,
    LocalRequestSync,
    LocalPaneChanged,
    LocalWindowChanged,
    LocalResize,
}

impl HostEvent {
    /// Encode for the host's JSON IPC channel.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl HostRequest {
    /// Decode a request received over the host's JSON IPC channel.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn sync_event(&self) -> SyncEvent {
        match self {
            HostRequest::RequestSync => SyncEvent::LocalRequestSync,
            HostRequest::PaneChanged { .. } => SyncEvent::LocalPaneChanged,
            HostRequest::WindowChanged { .. } => SyncEvent::LocalWindowChanged,
            HostRequest::Resize(_) => SyncEvent::LocalResize,
        }
    }
}
