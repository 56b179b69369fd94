//! tmux Control Mode Protocol
//!
//! Client side of tmux's control mode (`tmux -CC`): a line-oriented
//! request/reply protocol with out-of-band notifications.
//!
//! ## Architecture
//!
//! - `client.rs`: TmuxCtrl, the block state machine and command correlation
//! - `commands.rs`: Command builders for the control protocol
//! - `notification.rs`: Notification lines and `%output` unescaping
//! - `listing.rs`: Pane/window listing reply parsers
//! - `layout.rs`: Window layout string parser
//! - `types.rs`: Core data types (Pane, Split, LayoutNode, Window)
//!
//! ## Control Mode Protocol
//!
//! - Commands are written one per line
//! - Each command is answered by a `%begin` ... `%end` or `%error` block
//! - Notifications from tmux start with `%` and arrive between blocks
//! - The first line may carry the DCS prefix `ESC P 1000 p`

pub mod client;
pub mod commands;
pub mod layout;
pub mod listing;
pub mod notification;
pub mod types;

pub use client::{OutputReceiver, TmuxCtrl, TmuxEvent};
pub use commands::{Size, TmuxCommand, escape_keys_for_tmux};
pub use layout::parse_window_layout;
pub use notification::{CONTROL_MODE_PREFIX, Notification, is_control_mode_start, unescape_output};
pub use types::{
    LayoutNode, LayoutSnapshot, Pane, PaneId, SessionId, Split, SplitDirection, Window, WindowId,
};
