// Library exports
//
// # Mutex Usage Policy
//
//   - `tokio::sync::Mutex`: the control-mode writer only. It is held across
//     the write `.await` so commands reach tmux in the order they were queued.
//
//   - `parking_lot::Mutex`: everything else (protocol state, controller
//     state, blocker registry). Never held across an `.await`.

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[macro_use]
pub mod debug;

pub mod error;
pub mod queue;
pub mod scanner;
pub mod sync;
pub mod tmux;

pub use par_tmux_config as config;

pub use error::{LayoutError, Result, ScanError, TmuxError};
pub use queue::CommandQueue;
pub use scanner::Scanner;
pub use sync::{
    ControlledSession, EventBlocker, HostEvent, HostRequest, ResizeMessage, SyncEvent,
    TmuxController,
};
pub use tmux::{LayoutNode, LayoutSnapshot, Pane, SplitDirection, TmuxCtrl, TmuxEvent, Window};
