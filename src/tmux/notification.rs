//! Control mode notification lines
//!
//! tmux writes notifications as single lines starting with `%`. Only the
//! kinds the reconciliation layer reacts to get their own variant; every
//! other line maps to [`Notification::Ignored`] so callers match exhaustively.

use crate::error::ScanError;
use crate::scanner::Scanner;
use crate::tmux::types::{PaneId, WindowId};

/// DCS sequence tmux -CC emits before its first control mode line
pub const CONTROL_MODE_PREFIX: &str = "\x1bP1000p";

/// A parsed out-of-band notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// `%window-add @W`
    WindowAdd { window_id: WindowId },
    /// `%output %P data` with the payload already unescaped
    Output { pane_id: PaneId, data: Vec<u8> },
    /// `%window-pane-changed @W %P`
    WindowPaneChanged { window_id: WindowId, pane_id: PaneId },
    /// `%session-window-changed $S @W`
    SessionWindowChanged { window_id: WindowId },
    /// `%layout-change ...` (payload unused, a full sync follows)
    LayoutChange,
    /// Any other line; carries the leading word
    Ignored(String),
}

impl Notification {
    /// Parse the fields following `command`, which the caller has already
    /// read from `scanner` (and stripped of [`CONTROL_MODE_PREFIX`]).
    pub fn parse(command: &str, scanner: &mut Scanner<'_>) -> Result<Self, ScanError> {
        let notification = match command {
            "%window-add" => Notification::WindowAdd {
                window_id: scanner.skip(1).read_number()?,
            },
            "%output" => {
                let pane_id = scanner.skip(1).read_number()?;
                Notification::Output {
                    pane_id,
                    data: unescape_output(scanner.read_all()),
                }
            }
            "%window-pane-changed" => {
                let window_id = scanner.skip(1).read_number()?;
                let pane_id = scanner.skip(1).read_number()?;
                Notification::WindowPaneChanged { window_id, pane_id }
            }
            "%session-window-changed" => Notification::SessionWindowChanged {
                window_id: scanner.skip_word()?.skip(1).read_number()?,
            },
            "%layout-change" => Notification::LayoutChange,
            other => Notification::Ignored(other.to_string()),
        };
        Ok(notification)
    }

    /// Parse a complete notification line.
    pub fn parse_line(line: &str) -> Result<Self, ScanError> {
        Self::parse_bytes(line.as_bytes())
    }

    /// Parse a raw notification line.
    ///
    /// `%output` payloads are unescaped from the raw bytes: tmux only escapes
    /// bytes below 0x20 and `\`, so anything else (including halves of a
    /// multi-byte character split across two lines) arrives verbatim.
    pub fn parse_bytes(line: &[u8]) -> Result<Self, ScanError> {
        let line = line
            .strip_prefix(CONTROL_MODE_PREFIX.as_bytes())
            .unwrap_or(line);
        if let Some(rest) = line.strip_prefix(b"%output ") {
            return Self::parse_output(rest);
        }
        let text = String::from_utf8_lossy(line);
        let mut scanner = Scanner::new(&text);
        let command = scanner.read_word()?;
        Self::parse(command, &mut scanner)
    }

    /// `%P payload`, the part of an `%output` line after the command word.
    fn parse_output(rest: &[u8]) -> Result<Self, ScanError> {
        let id_end = rest.iter().position(|&b| b == b' ').unwrap_or(rest.len());
        let header = String::from_utf8_lossy(&rest[..id_end]);
        let pane_id = Scanner::new(&header).skip(1).read_number()?;
        let payload = rest.get(id_end + 1..).unwrap_or_default();
        Ok(Notification::Output {
            pane_id,
            data: unescape_output(payload),
        })
    }
}

/// Remove the DCS control mode prefix from the first word of a line.
pub fn strip_control_mode_prefix(word: &str) -> &str {
    word.strip_prefix(CONTROL_MODE_PREFIX).unwrap_or(word)
}

/// Whether a chunk read from a terminal contains the start of control mode.
pub fn is_control_mode_start(data: &[u8]) -> bool {
    let prefix = CONTROL_MODE_PREFIX.as_bytes();
    data.windows(prefix.len()).any(|w| w == prefix)
}

/// Decode tmux's `\ooo` octal escapes in `%output` payloads into raw bytes.
///
/// Anything that is not a backslash followed by three octal digits (with a
/// value that fits in a byte) is passed through unchanged.
pub fn unescape_output(data: impl AsRef<[u8]>) -> Vec<u8> {
    let bytes = data.as_ref();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && let Some(value) = bytes.get(i + 1..i + 4).and_then(octal_byte)
        {
            out.push(value);
            i += 4;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

fn octal_byte(digits: &[u8]) -> Option<u8> {
    let mut value: u16 = 0;
    for &d in digits {
        if !(b'0'..=b'7').contains(&d) {
            return None;
        }
        value = value * 8 + u16::from(d - b'0');
    }
    u8::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape_octal() {
        assert_eq!(unescape_output("a\\062b"), b"a2b");
    }

    #[test]
    fn test_unescape_control_sequences() {
        assert_eq!(unescape_output("\\033[0m\\015\\012"), b"\x1b[0m\r\n");
    }

    #[test]
    fn test_unescape_leaves_non_octal() {
        assert_eq!(unescape_output("\\089"), b"\\089");
        assert_eq!(unescape_output("\\777"), b"\\777");
        assert_eq!(unescape_output("tail\\01"), b"tail\\01");
        assert_eq!(unescape_output("\\\\134"), b"\\\\");
    }

    #[test]
    fn test_output_bytes_kept_raw() {
        // A multi-byte character split across two lines, then invalid UTF-8
        let mut data = Vec::new();
        for line in [&b"%output %3 \xc3"[..], b"%output %3 \xa9", b"%output %3 \xff\\015"] {
            match Notification::parse_bytes(line).unwrap() {
                Notification::Output { pane_id: 3, data: chunk } => data.extend(chunk),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(data, b"\xc3\xa9\xff\r");
    }

    #[test]
    fn test_unescape_utf8_passthrough() {
        assert_eq!(unescape_output("héllo"), "héllo".as_bytes());
    }

    #[test]
    fn test_parse_window_add() {
        assert_eq!(
            Notification::parse_line("%window-add @3").unwrap(),
            Notification::WindowAdd { window_id: 3 }
        );
    }

    #[test]
    fn test_parse_output() {
        assert_eq!(
            Notification::parse_line("%output %1 ls\\015\\012").unwrap(),
            Notification::Output {
                pane_id: 1,
                data: b"ls\r\n".to_vec()
            }
        );
    }

    #[test]
    fn test_parse_output_keeps_leading_spaces() {
        assert_eq!(
            Notification::parse_line("%output %2   x").unwrap(),
            Notification::Output {
                pane_id: 2,
                data: b"  x".to_vec()
            }
        );
    }

    #[test]
    fn test_parse_window_pane_changed() {
        assert_eq!(
            Notification::parse_line("%window-pane-changed @1 %4").unwrap(),
            Notification::WindowPaneChanged {
                window_id: 1,
                pane_id: 4
            }
        );
    }

    #[test]
    fn test_parse_session_window_changed() {
        assert_eq!(
            Notification::parse_line("%session-window-changed $0 @2").unwrap(),
            Notification::SessionWindowChanged { window_id: 2 }
        );
    }

    #[test]
    fn test_parse_layout_change() {
        assert_eq!(
            Notification::parse_line("%layout-change @1 b25d,80x24,0,0,1 b25d,80x24,0,0,1 *")
                .unwrap(),
            Notification::LayoutChange
        );
    }

    #[test]
    fn test_unknown_is_ignored() {
        assert_eq!(
            Notification::parse_line("%sessions-changed").unwrap(),
            Notification::Ignored("%sessions-changed".to_string())
        );
    }

    #[test]
    fn test_prefix_stripped() {
        assert_eq!(
            Notification::parse_line("\x1bP1000p%window-add @0").unwrap(),
            Notification::WindowAdd { window_id: 0 }
        );
    }

    #[test]
    fn test_malformed_fields_fail() {
        assert!(Notification::parse_line("%window-pane-changed @x %1").is_err());
        assert!(Notification::parse_line("%output").is_err());
    }

    #[test]
    fn test_control_mode_start_detection() {
        assert!(is_control_mode_start(b"garbage\x1bP1000p%begin 1 1 0"));
        assert!(!is_control_mode_start(b"%begin 1 1 0"));
    }
}
