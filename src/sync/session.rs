//! A host session whose I/O is backed by one tmux pane.

use crate::error::Result;
use crate::sync::messages::HostEvent;
use crate::tmux::client::TmuxCtrl;
use crate::tmux::commands::{Size, escape_keys_for_tmux};
use crate::tmux::types::{PaneId, SessionId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Local session bound to a tmux pane.
///
/// Pane output is forwarded to the host as [`HostEvent::SessionOutput`];
/// input written to the session is sent to the pane with `send-keys`.
pub struct ControlledSession {
    ctrl: Arc<TmuxCtrl>,
    pane_id: PaneId,
    session_id: SessionId,
    host_events: mpsc::UnboundedSender<HostEvent>,
    ended: AtomicBool,
}

impl ControlledSession {
    /// Bind `session_id` to `pane_id` and start forwarding its output.
    pub fn new(
        ctrl: Arc<TmuxCtrl>,
        pane_id: PaneId,
        session_id: SessionId,
        host_events: mpsc::UnboundedSender<HostEvent>,
    ) -> Self {
        crate::debug_info!("SESSION", "New controlled session %{} -> {}", pane_id, session_id);

        let sink = host_events.clone();
        let output_session = session_id.clone();
        ctrl.register_output_receiver(pane_id, move |data| {
            let _ = sink.send(HostEvent::SessionOutput {
                session_id: output_session.clone(),
                data: data.to_vec(),
            });
        });

        Self {
            ctrl,
            pane_id,
            session_id,
            host_events,
            ended: AtomicBool::new(false),
        }
    }

    pub fn pane_id(&self) -> PaneId {
        self.pane_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// Send user input to the pane.
    ///
    /// A lone carriage return becomes the `Enter` key, plain text is typed
    /// literally and anything containing control bytes is sent as key names.
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if data == b"\r" {
            return self.ctrl.send_special(self.pane_id, "Enter").await;
        }
        match std::str::from_utf8(data) {
            Ok(text) if !text.chars().any(char::is_control) => {
                self.ctrl.send_literal(self.pane_id, text).await
            }
            _ => {
                self.ctrl
                    .send_special(self.pane_id, &escape_keys_for_tmux(data))
                    .await
            }
        }
    }

    /// Make this session's pane the active one in tmux.
    pub async fn set_active(&self) -> Result<()> {
        self.ctrl.select_pane(self.pane_id).await
    }

    /// Sizing is driven by the controller from the host's whole split tree.
    pub fn resize(&self, _size: Size) {}

    /// Stop forwarding output and tell the host the session is gone.
    pub fn destroy(&self) {
        if !self.detach() {
            return;
        }
        crate::debug_info!("SESSION", "Session {} (%{}) destroyed", self.session_id, self.pane_id);
        let _ = self.host_events.send(HostEvent::SessionExited {
            session_id: self.session_id.clone(),
        });
    }

    /// Unbind from the pane without telling the host, for a session id that
    /// lives on behind a different pane. Returns false if already ended.
    pub(crate) fn detach(&self) -> bool {
        if self.ended.swap(true, Ordering::SeqCst) {
            return false;
        }
        crate::debug_log!("SESSION", "Session {} detached from %{}", self.session_id, self.pane_id);
        self.ctrl.unregister_output_receiver(self.pane_id);
        true
    }
}

impl std::fmt::Debug for ControlledSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlledSession")
            .field("pane_id", &self.pane_id)
            .field("session_id", &self.session_id)
            .field("ended", &self.is_ended())
            .finish()
    }
}
