//! Reconciliation between tmux's layout and the host's local sessions
//!
//! The controller keeps one host session per tmux pane. It re-reads the
//! whole layout on every layout change, asks the host to create sessions
//! for panes it has not seen, propagates host resizes to tmux and mirrors
//! active pane/window changes in both directions.
//!
//! Every event that can be an echo of a change the controller made itself
//! is keyed by a [`SyncEvent`] and checked against one [`EventBlocker`]
//! before it is handled.

use crate::error::Result;
use crate::sync::blocker::{BlockOptions, EventBlocker};
use crate::sync::messages::{
    HostEvent, HostRequest, RequestSessionMessage, ResizeMessage, SyncEvent, SyncLayoutMessage,
};
use crate::sync::pane_sync::PaneSessionMap;
use crate::sync::session::ControlledSession;
use crate::tmux::client::{TmuxCtrl, TmuxEvent};
use crate::tmux::types::{LayoutSnapshot, Pane, PaneId, SessionId, WindowId};
use par_tmux_config::TmuxConfig;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[derive(Default)]
struct ControllerState {
    panes: PaneSessionMap,
    sessions: HashMap<SessionId, Arc<ControlledSession>>,
    snapshot: LayoutSnapshot,
    /// Outstanding session requests; `true` is sent once the host created it
    session_requests: HashMap<PaneId, watch::Sender<bool>>,
}

/// Keeps tmux panes and host sessions consistent.
pub struct TmuxController {
    ctrl: Arc<TmuxCtrl>,
    config: TmuxConfig,
    host_window_id: String,
    host_events: mpsc::UnboundedSender<HostEvent>,
    blocker: EventBlocker<SyncEvent>,
    state: Mutex<ControllerState>,
}

/// Suppression key for a tmux notification, if it can be an echo.
fn remote_sync_event(event: &TmuxEvent) -> Option<SyncEvent> {
    match event {
        TmuxEvent::LayoutChange => Some(SyncEvent::RemoteLayoutChange),
        TmuxEvent::WindowAdd { .. } => Some(SyncEvent::RemoteWindowAdd),
        TmuxEvent::WindowPaneChanged { .. } => Some(SyncEvent::RemoteWindowPaneChanged),
        TmuxEvent::SessionWindowChanged { .. } => Some(SyncEvent::RemoteSessionWindowChanged),
        TmuxEvent::Disconnected => None,
    }
}

impl TmuxController {
    /// Create a controller for the host window `host_window_id`.
    ///
    /// Events for the host are delivered on the returned channel.
    pub fn new(
        ctrl: Arc<TmuxCtrl>,
        config: TmuxConfig,
        host_window_id: impl Into<String>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<HostEvent>) {
        crate::debug::init(config.log_level);
        let (host_events, rx) = mpsc::unbounded_channel();
        let controller = Arc::new(Self {
            ctrl,
            config,
            host_window_id: host_window_id.into(),
            host_events,
            blocker: EventBlocker::new(),
            state: Mutex::new(ControllerState::default()),
        });
        (controller, rx)
    }

    pub fn ctrl(&self) -> &Arc<TmuxCtrl> {
        &self.ctrl
    }

    /// The suppression registry shared by both directions.
    pub fn blocker(&self) -> &EventBlocker<SyncEvent> {
        &self.blocker
    }

    /// Remote state as of the last successful sync.
    pub fn snapshot(&self) -> LayoutSnapshot {
        self.state.lock().snapshot.clone()
    }

    pub fn session(&self, session_id: &str) -> Option<Arc<ControlledSession>> {
        self.state.lock().sessions.get(session_id).cloned()
    }

    pub fn session_for_pane(&self, pane_id: PaneId) -> Option<SessionId> {
        self.state.lock().panes.session_for(pane_id).cloned()
    }

    pub fn pane_to_session(&self) -> BTreeMap<PaneId, SessionId> {
        self.state.lock().panes.to_map()
    }

    fn publish(&self, event: HostEvent) {
        if self.host_events.send(event).is_err() {
            crate::debug_log!("SYNC", "Host event dropped, host channel closed");
        }
    }

    /// Block `event` for one trigger within the echo window.
    fn block_echo(&self, event: SyncEvent) {
        self.blocker.block(
            event,
            BlockOptions::count(1).with_time(self.config.echo_block()),
        );
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Re-read panes and windows, create sessions for new panes, drop
    /// sessions whose panes are gone and publish the result.
    pub async fn sync(&self) -> Result<()> {
        self.blocker.block(
            SyncEvent::LocalResize,
            BlockOptions::count(self.config.sync_resize_block_count)
                .with_time(self.config.sync_resize_block()),
        );

        let mut panes = self.ctrl.list_panes().await?;
        let windows = self.ctrl.list_windows(&panes).await?;

        let mut pane_windows: HashMap<PaneId, WindowId> = HashMap::new();
        for window in &windows {
            window.root.for_each_pane(&mut |leaf| {
                if let Some(pane) = panes.get_mut(&leaf.id) {
                    pane.parent_direction = leaf.parent_direction;
                }
                pane_windows.insert(leaf.id, window.id);
            });
        }

        for pane in panes.values() {
            self.request_session(pane, pane_windows.get(&pane.id).copied())
                .await;
        }

        let stale: Vec<Arc<ControlledSession>> = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let gone: Vec<PaneId> = state
                .panes
                .pane_ids()
                .filter(|id| !panes.contains_key(id))
                .collect();
            let mut stale = Vec::with_capacity(gone.len());
            for pane_id in gone {
                if let Some(session_id) = state.panes.unmap_pane(pane_id)
                    && let Some(session) = state.sessions.remove(&session_id)
                {
                    stale.push(session);
                }
            }
            stale
        };
        for session in stale {
            session.destroy();
        }

        let message = {
            let mut state = self.state.lock();
            state.snapshot = LayoutSnapshot { panes, windows };
            SyncLayoutMessage::new(state.snapshot.clone(), state.panes.to_map())
        };
        crate::debug_log!(
            "SYNC",
            "Synced {} panes in {} windows",
            message.panes.len(),
            message.windows.len()
        );
        self.publish(HostEvent::SyncLayout(message));
        Ok(())
    }

    /// Ask the host for a session backing `pane` and wait until it exists.
    ///
    /// Concurrent syncs discovering the same pane share one request.
    async fn request_session(&self, pane: &Pane, window_id: Option<WindowId>) {
        let mut created = {
            let mut state = self.state.lock();
            if state.panes.contains_pane(pane.id) {
                return;
            }
            match state.session_requests.get(&pane.id) {
                Some(request) => request.subscribe(),
                None => {
                    let (request, created) = watch::channel(false);
                    state.session_requests.insert(pane.id, request);
                    crate::debug_info!("SYNC", "Requesting session for %{}", pane.id);
                    self.publish(HostEvent::RequestSession(RequestSessionMessage {
                        pane_id: pane.id,
                        tmux_window_id: window_id,
                        host_window_id: self.host_window_id.clone(),
                        split_direction: pane.parent_direction,
                    }));
                    created
                }
            }
        };

        match self.config.session_request_timeout() {
            Some(limit) => {
                let timed_out = tokio::time::timeout(limit, created.wait_for(|done| *done))
                    .await
                    .is_err();
                if timed_out {
                    crate::debug_error!(
                        "SYNC",
                        "Host did not create a session for %{} within {:?}",
                        pane.id,
                        limit
                    );
                    self.state.lock().session_requests.remove(&pane.id);
                }
            }
            None => {
                if created.wait_for(|done| *done).await.is_err() {
                    crate::debug_log!("SYNC", "Session request for %{} was abandoned", pane.id);
                }
            }
        }
    }

    /// Called by the host once it has created the session for `pane_id`.
    pub fn create_controlled_session(
        &self,
        session_id: impl Into<SessionId>,
        pane_id: PaneId,
    ) -> Arc<ControlledSession> {
        let session_id = session_id.into();

        let (moved, replaced) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let mut moved = None;
            if let Some(old_pane) = state.panes.pane_for(&session_id)
                && old_pane != pane_id
            {
                state.panes.unmap_pane(old_pane);
                moved = state.sessions.remove(&session_id);
            }
            let replaced = match state.panes.unmap_pane(pane_id) {
                Some(old) if old != session_id => state.sessions.remove(&old),
                _ => None,
            };
            (moved, replaced)
        };
        // The id lives on behind the new pane, so the host is not told it exited
        if let Some(moved) = moved {
            moved.detach();
        }
        if let Some(old) = replaced {
            old.destroy();
        }

        let session = Arc::new(ControlledSession::new(
            Arc::clone(&self.ctrl),
            pane_id,
            session_id.clone(),
            self.host_events.clone(),
        ));

        let request = {
            let mut state = self.state.lock();
            state.panes.map_pane(pane_id, session_id.clone());
            state.sessions.insert(session_id, Arc::clone(&session));
            state.session_requests.remove(&pane_id)
        };
        if let Some(request) = request {
            let _ = request.send(true);
        }
        session
    }

    // =========================================================================
    // Resize
    // =========================================================================

    /// Propagate a host resize to tmux.
    ///
    /// Layout changes tmux reports while this runs (and for the settle
    /// delay after) are echoes of this resize and are suppressed.
    pub async fn on_host_resize(&self, message: ResizeMessage) -> Result<()> {
        let block = self
            .blocker
            .block(SyncEvent::RemoteLayoutChange, BlockOptions::default());
        let result = self.apply_resize(&message).await;
        tokio::time::sleep(self.config.resize_settle()).await;
        block.cancel();
        result
    }

    async fn apply_resize(&self, message: &ResizeMessage) -> Result<()> {
        if let Some(target) = message.window_size() {
            let current = self.ctrl.window_size().await?;
            if current != target {
                crate::debug_log!("SYNC", "Resizing window {:?} -> {:?}", current, target);
                self.ctrl.resize_window(target).await?;
            }
        }

        let pane_id = self.state.lock().panes.pane_for(&message.session_id);
        match pane_id {
            Some(pane_id) => self.ctrl.resize_pane(pane_id, message.pane_size()).await,
            None => {
                crate::debug_trace!("SYNC", "Resize for unknown session {}", message.session_id);
                Ok(())
            }
        }
    }

    // =========================================================================
    // Active pane / window
    // =========================================================================

    /// First active leaf of `window_id` in the last snapshot.
    pub fn find_active_pane(&self, window_id: WindowId) -> Option<Pane> {
        let state = self.state.lock();
        state
            .snapshot
            .window(window_id)?
            .root
            .find_active_pane()
            .cloned()
    }

    /// Tell the host which session is active, blocking the host's echo.
    fn mirror_active_pane(&self, pane_id: PaneId) {
        let Some(session_id) = self.session_for_pane(pane_id) else {
            crate::debug_trace!("SYNC", "No session for active pane %{}", pane_id);
            return;
        };
        self.block_echo(SyncEvent::LocalPaneChanged);
        self.publish(HostEvent::ActiveSessionChanged { session_id });
    }

    // =========================================================================
    // Event handling
    // =========================================================================

    /// Handle a tmux notification. Suppression is applied by the caller.
    pub async fn handle_tmux_event(&self, event: TmuxEvent) -> Result<()> {
        match event {
            TmuxEvent::LayoutChange | TmuxEvent::WindowAdd { .. } => self.sync().await,
            TmuxEvent::WindowPaneChanged { pane_id, .. } => {
                self.mirror_active_pane(pane_id);
                Ok(())
            }
            TmuxEvent::SessionWindowChanged { window_id } => {
                match self.find_active_pane(window_id) {
                    Some(pane) => self.mirror_active_pane(pane.id),
                    None => {
                        crate::debug_trace!("SYNC", "No active pane known for @{}", window_id)
                    }
                }
                Ok(())
            }
            TmuxEvent::Disconnected => {
                crate::debug_info!("SYNC", "tmux control mode ended");
                Ok(())
            }
        }
    }

    /// Handle a host request. Suppression is applied by the caller.
    pub async fn handle_host_request(&self, request: HostRequest) -> Result<()> {
        match request {
            HostRequest::RequestSync => self.sync().await,
            HostRequest::PaneChanged { session_id } => {
                let Some(session) = self.session(&session_id) else {
                    crate::debug_trace!("SYNC", "Pane change for unknown session {}", session_id);
                    return Ok(());
                };
                self.block_echo(SyncEvent::RemoteWindowPaneChanged);
                session.set_active().await
            }
            HostRequest::WindowChanged { window_id } => {
                self.block_echo(SyncEvent::RemoteSessionWindowChanged);
                self.ctrl.select_window(window_id).await
            }
            HostRequest::Resize(message) => self.on_host_resize(message).await,
        }
    }

    /// Admit or suppress a tmux notification, then handle it on its own task.
    fn dispatch_tmux(self: &Arc<Self>, event: TmuxEvent) {
        if let Some(key) = remote_sync_event(&event)
            && self.blocker.is_blocked(&key)
        {
            crate::debug_log!("SYNC", "Suppressed {:?}", event);
            return;
        }
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = controller.handle_tmux_event(event.clone()).await {
                crate::debug_error!("SYNC", "Handling {:?} failed: {}", event, e);
            }
        });
    }

    /// Admit or suppress a host request, then handle it on its own task.
    fn dispatch_host(self: &Arc<Self>, request: HostRequest) {
        if self.blocker.is_blocked(&request.sync_event()) {
            crate::debug_log!("SYNC", "Suppressed {:?}", request);
            return;
        }
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let event = request.sync_event();
            if let Err(e) = controller.handle_host_request(request).await {
                crate::debug_error!("SYNC", "Handling {:?} failed: {}", event, e);
            }
        });
    }

    /// Consume both event streams until tmux disconnects.
    ///
    /// Suppression is checked synchronously in arrival order; each admitted
    /// event is then handled on its own task so a slow sync never holds up
    /// the stream.
    pub fn spawn_event_loop(
        self: &Arc<Self>,
        mut tmux_events: mpsc::UnboundedReceiver<TmuxEvent>,
        mut host_requests: mpsc::UnboundedReceiver<HostRequest>,
    ) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let mut host_open = true;
            loop {
                tokio::select! {
                    biased;
                    event = tmux_events.recv() => match event {
                        Some(TmuxEvent::Disconnected) | None => {
                            log::info!("tmux controller stopped: control mode disconnected");
                            crate::debug_info!("SYNC", "Event loop stopped: tmux disconnected");
                            break;
                        }
                        Some(event) => controller.dispatch_tmux(event),
                    },
                    request = host_requests.recv(), if host_open => match request {
                        Some(request) => controller.dispatch_host(request),
                        None => host_open = false,
                    },
                }
            }
        })
    }

    /// Run the event loop and an initial sync.
    pub fn start(
        self: &Arc<Self>,
        tmux_events: mpsc::UnboundedReceiver<TmuxEvent>,
        host_requests: mpsc::UnboundedReceiver<HostRequest>,
    ) -> JoinHandle<()> {
        log::info!("tmux controller started for host window {}", self.host_window_id);
        let handle = self.spawn_event_loop(tmux_events, host_requests);
        self.dispatch_host(HostRequest::RequestSync);
        handle
    }
}
