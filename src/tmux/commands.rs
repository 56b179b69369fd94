//! tmux command builders for control mode
//!
//! Type-safe builders for the commands the client sends. Commands are
//! written as newline-terminated lines; tmux answers each with exactly one
//! `%begin`/`%end` (or `%error`) block.

use super::types::{PaneId, WindowId};

/// Format of one `list-panes` line; parsed by `listing::parse_pane_line`.
pub(crate) const PANE_FORMAT: &str = "#{pane_id} #{pane_width} #{pane_height} \"#{pane_title}\" #{pane_pid} #{pane_tty} #{pane_active} #{cursor_x} #{cursor_y}";

/// Format of one `list-windows` line; parsed by `listing::parse_window_line`.
pub(crate) const WINDOW_FORMAT: &str = "#{window_id} #{window_layout} #{window_width} #{window_height} \"#{window_name}\" #{window_active}";

/// Terminal dimensions in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub cols: u64,
    pub rows: u64,
}

impl Size {
    pub fn new(cols: u64, rows: u64) -> Self {
        Self { cols, rows }
    }
}

/// A tmux command ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmuxCommand {
    /// The command string (without trailing newline)
    command: String,
}

impl TmuxCommand {
    /// Create a command from a raw string
    pub fn raw(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Get the command string
    pub fn as_str(&self) -> &str {
        &self.command
    }

    /// Get the command as bytes for writing to the control mode stream
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut bytes = self.command.as_bytes().to_vec();
        bytes.push(b'\n');
        bytes
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// List every pane of the session, one `PANE_FORMAT` line each
    pub fn list_panes() -> Self {
        Self::raw(format!("list-panes -s -F '{}'", PANE_FORMAT))
    }

    /// List every window of the session, one `WINDOW_FORMAT` line each
    pub fn list_windows() -> Self {
        Self::raw(format!("list-windows -F '{}'", WINDOW_FORMAT))
    }

    /// Query window dimensions as `rows cols`
    pub fn window_size() -> Self {
        Self::raw("list-windows -F '#{window_height} #{window_width}'")
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Select a pane by ID
    pub fn select_pane(pane_id: PaneId) -> Self {
        Self::raw(format!("select-pane -t %{}", pane_id))
    }

    /// Select a window by ID
    pub fn select_window(window_id: WindowId) -> Self {
        Self::raw(format!("select-window -t @{}", window_id))
    }

    // =========================================================================
    // Sizing
    // =========================================================================

    /// Resize the current window
    pub fn resize_window(size: Size) -> Self {
        Self::raw(format!("resize-window -x {} -y {}", size.cols, size.rows))
    }

    /// Resize a pane
    pub fn resize_pane(pane_id: PaneId, size: Size) -> Self {
        Self::raw(format!(
            "resize-pane -t %{} -x {} -y {}",
            pane_id, size.cols, size.rows
        ))
    }

    /// Set the control client size
    ///
    /// In control mode, tmux doesn't know the terminal size unless we tell it.
    pub fn refresh_client_size(size: Size) -> Self {
        // tmux requires -C XxY format (lowercase x), not comma
        Self::raw(format!("refresh-client -C {}x{}", size.cols, size.rows))
    }

    // =========================================================================
    // Input
    // =========================================================================

    /// Send key names (e.g. `Enter`, `C-c`) to a pane
    pub fn send_keys(pane_id: PaneId, keys: &str) -> Self {
        Self::raw(format!("send-keys -t %{} -- {}", pane_id, keys))
    }

    /// Send literal text to a pane. `--` ends option parsing so text
    /// starting with `-` is not read as a flag.
    pub fn send_literal(pane_id: PaneId, text: &str) -> Self {
        Self::raw(format!("send-keys -t %{} -l -- {}", pane_id, quote(text)))
    }
}

/// Single-quote `text` for the tmux command parser.
fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "'\\''"))
}

/// Escape a byte sequence as `send-keys` arguments.
///
/// Printable runs become quoted literals, control bytes become key names
/// and bytes outside ASCII are sent as hex keys.
pub fn escape_keys_for_tmux(data: &[u8]) -> String {
    let mut result = String::new();
    let mut in_literal = false;

    for &byte in data {
        match byte {
            0x00 => {
                close_literal(&mut result, &mut in_literal);
                result.push_str("C-Space ");
            }
            0x0d => {
                close_literal(&mut result, &mut in_literal);
                result.push_str("Enter ");
            }
            0x09 => {
                close_literal(&mut result, &mut in_literal);
                result.push_str("Tab ");
            }
            0x01..=0x1a => {
                close_literal(&mut result, &mut in_literal);
                // Ctrl+A through Ctrl+Z
                result.push_str(&format!("C-{} ", (b'a' + byte - 1) as char));
            }
            0x1b => {
                close_literal(&mut result, &mut in_literal);
                result.push_str("Escape ");
            }
            0x7f => {
                close_literal(&mut result, &mut in_literal);
                result.push_str("BSpace ");
            }
            b'\'' => {
                open_literal(&mut result, &mut in_literal);
                result.push_str("'\\''");
            }
            b' ' => {
                close_literal(&mut result, &mut in_literal);
                result.push_str("Space ");
            }
            0x21..=0x7e => {
                open_literal(&mut result, &mut in_literal);
                result.push(byte as char);
            }
            _ => {
                close_literal(&mut result, &mut in_literal);
                result.push_str(&format!("0x{:02x} ", byte));
            }
        }
    }

    close_literal(&mut result, &mut in_literal);
    result.trim().to_string()
}

fn open_literal(result: &mut String, in_literal: &mut bool) {
    if !*in_literal {
        result.push('\'');
        *in_literal = true;
    }
}

fn close_literal(result: &mut String, in_literal: &mut bool) {
    if *in_literal {
        result.push_str("' ");
        *in_literal = false;
    }
}
