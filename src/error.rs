//! Typed error types for par-tmux.
//!
//! Three layers, matching how far a failure travels:
//! - [`ScanError`]: a single protocol line did not have the expected shape
//! - [`LayoutError`]: a window layout string violated the layout grammar
//! - [`TmuxError`]: everything a command or sync can fail with

use crate::tmux::types::PaneId;
use thiserror::Error;

/// A lexing failure inside one protocol line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// Fewer characters remain than the operation needs.
    #[error("Scan error: not enough characters to take at position {pos}:{end}")]
    UnexpectedEnd { pos: usize, end: usize },

    /// `read_number` found no digit at the cursor.
    #[error("Scan error: no number to be read at position {pos}")]
    NoNumber { pos: usize },

    /// The digits at the cursor do not fit the numeric type.
    #[error("Scan error: number '{digits}' at position {pos} is out of range")]
    NumberOverflow { pos: usize, digits: String },

    /// `expect` found different text than the literal it was given.
    #[error("Scan error: expected '{expected}' but got {found} at position {pos}")]
    Mismatch {
        expected: String,
        found: String,
        pos: usize,
    },
}

/// A window layout string that does not match the layout grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// A token was missing or malformed.
    #[error("layout '{layout}': {source}")]
    Scan {
        layout: String,
        #[source]
        source: ScanError,
    },

    /// The character after a node's geometry is not `,`, `[` or `{`.
    #[error("layout '{layout}': unexpected {found} at position {pos}")]
    UnexpectedToken {
        layout: String,
        found: String,
        pos: usize,
    },

    /// A leaf references a pane that the pane listing did not contain.
    #[error("layout '{layout}': unknown pane %{pane_id}")]
    UnknownPane { layout: String, pane_id: PaneId },

    /// The top level produced zero or several sibling nodes.
    #[error("layout '{layout}': expected exactly one root node, found {count}")]
    RootCount { layout: String, count: usize },

    /// Characters remain after the root node.
    #[error("layout '{layout}': trailing input at position {pos}")]
    TrailingInput { layout: String, pos: usize },
}

/// Top-level error type for the control mode client and controller.
#[derive(Debug, Error)]
pub enum TmuxError {
    /// More commands are outstanding than the queue allows.
    #[error("Command queue is full ({capacity} commands outstanding)")]
    QueueFull { capacity: usize },

    /// tmux answered the command with `%error`.
    #[error("tmux command '{command}' failed: {}", lines.join(" / "))]
    Command { command: String, lines: Vec<String> },

    /// No reply arrived within the configured timeout.
    #[error("tmux command '{command}' timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    /// The control mode stream closed before the reply arrived.
    #[error("tmux control mode disconnected")]
    Disconnected,

    /// A reply arrived but its content could not be interpreted.
    #[error("unexpected reply to '{command}': {reason}")]
    UnexpectedReply { command: String, reason: String },

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("I/O error on control mode stream: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = TmuxError> = std::result::Result<T, E>;
