//! Reconciliation between a tmux server and the host's local sessions
//!
//! - [`blocker`]: time/count-bounded suppression of echoed events
//! - [`controller`]: the reconciliation loop
//! - [`session`]: a host session backed by one tmux pane
//! - [`messages`]: the host-facing message protocol

pub mod blocker;
pub mod controller;
pub mod local_layout;
pub mod messages;
pub mod pane_sync;
pub mod session;

pub use blocker::{BlockHandle, BlockOptions, EventBlocker};
pub use controller::TmuxController;
pub use local_layout::LocalLayoutNode;
pub use messages::{
    HostEvent, HostRequest, RequestSessionMessage, ResizeMessage, SyncEvent, SyncLayoutMessage,
};
pub use pane_sync::PaneSessionMap;
pub use session::ControlledSession;
