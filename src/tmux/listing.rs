//! Parsers for `list-panes` / `list-windows` reply lines
//!
//! The line formats are fixed by `commands::PANE_FORMAT` and
//! `commands::WINDOW_FORMAT`. Lines that do not match are dropped with a
//! debug log entry; a single odd line never fails a whole listing.

use crate::tmux::commands::Size;
use crate::tmux::types::{Pane, PaneId, WindowId};
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// One `list-windows` line before its layout string is parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowLine {
    pub id: WindowId,
    pub layout: String,
    pub cols: u64,
    pub rows: u64,
    pub name: String,
    pub active: bool,
}

fn pane_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^%(\d+) (\d+) (\d+) "(.*)" (\d+) (\S+) ([01]) (\d+) (\d+)$"#)
            .expect("pane_regex: pattern is valid and should always compile")
    })
}

fn window_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^@(\d+) (\S+) (\d+) (\d+) "(.*)" ([01])$"#)
            .expect("window_regex: pattern is valid and should always compile")
    })
}

fn size_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+) (\d+)$").expect("size_regex: pattern is valid and should always compile")
    })
}

fn number(caps: &Captures<'_>, i: usize) -> Option<u64> {
    caps.get(i)?.as_str().parse().ok()
}

fn text(caps: &Captures<'_>, i: usize) -> String {
    caps.get(i).map_or_else(String::new, |m| m.as_str().to_string())
}

/// Parse one pane line.
pub fn parse_pane_line(line: &str) -> Option<Pane> {
    let caps = pane_regex().captures(line.trim())?;
    Some(Pane {
        id: number(&caps, 1)?,
        cols: number(&caps, 2)?,
        rows: number(&caps, 3)?,
        title: text(&caps, 4),
        pid: number(&caps, 5)?,
        tty: text(&caps, 6),
        active: &caps[7] == "1",
        cursor_x: number(&caps, 8)?,
        cursor_y: number(&caps, 9)?,
        parent_direction: None,
    })
}

/// Parse a full `list-panes` reply, keyed by pane id.
pub fn parse_pane_listing(lines: &[String]) -> BTreeMap<PaneId, Pane> {
    lines
        .iter()
        .filter_map(|line| {
            let pane = parse_pane_line(line);
            if pane.is_none() {
                crate::debug_log!("TMUX", "Dropping malformed pane line: {:?}", line);
            }
            pane
        })
        .map(|pane| (pane.id, pane))
        .collect()
}

/// Parse one window line.
pub fn parse_window_line(line: &str) -> Option<WindowLine> {
    let caps = window_regex().captures(line.trim())?;
    Some(WindowLine {
        id: number(&caps, 1)?,
        layout: text(&caps, 2),
        cols: number(&caps, 3)?,
        rows: number(&caps, 4)?,
        name: text(&caps, 5),
        active: &caps[6] == "1",
    })
}

/// Parse a full `list-windows` reply.
pub fn parse_window_listing(lines: &[String]) -> Vec<WindowLine> {
    lines
        .iter()
        .filter_map(|line| {
            let window = parse_window_line(line);
            if window.is_none() {
                crate::debug_log!("TMUX", "Dropping malformed window line: {:?}", line);
            }
            window
        })
        .collect()
}

/// Parse the first `rows cols` line of a window-size reply.
pub fn parse_window_size(lines: &[String]) -> Option<Size> {
    let caps = size_regex().captures(lines.first()?.trim())?;
    Some(Size {
        rows: number(&caps, 1)?,
        cols: number(&caps, 2)?,
    })
}
