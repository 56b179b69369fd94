//! Core types for the tmux layout model
//!
//! A window's layout is a tree: splits are interior nodes, panes are leaves.
//! Every sync replaces the whole snapshot, so these are plain values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// tmux pane ID (e.g., %0, %1)
pub type PaneId = u64;

/// tmux window ID (e.g., @0, @1)
pub type WindowId = u64;

/// Identifier of the host's local session object bound to a pane
pub type SessionId = String;

/// Arrangement of a split's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitDirection {
    /// `[...]`: children stacked top to bottom
    Horizontal,
    /// `{...}`: children side by side
    Vertical,
}

/// A tmux pane as reported by `list-panes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pane {
    /// Pane ID (e.g., %0)
    pub id: PaneId,
    /// Width in characters
    pub cols: u64,
    /// Height in characters
    pub rows: u64,
    /// Pane title (from OSC sequences)
    pub title: String,
    /// PID of the pane's foreground process
    pub pid: u64,
    /// Terminal device path (e.g., /dev/ttys003)
    pub tty: String,
    /// Whether this pane is active in its window
    pub active: bool,
    pub cursor_x: u64,
    pub cursor_y: u64,
    /// Direction of the split directly containing this pane, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_direction: Option<SplitDirection>,
}

impl Pane {
    /// Create a pane with default geometry and no process information
    pub fn new(id: PaneId) -> Self {
        Self {
            id,
            cols: 80,
            rows: 24,
            title: String::new(),
            pid: 0,
            tty: String::new(),
            active: false,
            cursor_x: 0,
            cursor_y: 0,
            parent_direction: None,
        }
    }
}

/// An interior layout node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Split {
    pub direction: SplitDirection,
    /// Total width
    pub cols: u64,
    /// Total height
    pub rows: u64,
    pub x: u64,
    pub y: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_direction: Option<SplitDirection>,
    /// Child nodes in layout order
    pub children: Vec<LayoutNode>,
}

/// A node in the tmux layout tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LayoutNode {
    /// A leaf pane
    Pane(Pane),
    /// A split container
    Split(Split),
}

impl LayoutNode {
    pub fn cols(&self) -> u64 {
        match self {
            LayoutNode::Pane(pane) => pane.cols,
            LayoutNode::Split(split) => split.cols,
        }
    }

    pub fn rows(&self) -> u64 {
        match self {
            LayoutNode::Pane(pane) => pane.rows,
            LayoutNode::Split(split) => split.rows,
        }
    }

    pub fn parent_direction(&self) -> Option<SplitDirection> {
        match self {
            LayoutNode::Pane(pane) => pane.parent_direction,
            LayoutNode::Split(split) => split.parent_direction,
        }
    }

    pub(crate) fn set_parent_direction(&mut self, direction: Option<SplitDirection>) {
        match self {
            LayoutNode::Pane(pane) => pane.parent_direction = direction,
            LayoutNode::Split(split) => split.parent_direction = direction,
        }
    }

    /// Get all pane IDs in the tree, in layout order
    pub fn pane_ids(&self) -> Vec<PaneId> {
        let mut ids = Vec::new();
        self.collect_pane_ids(&mut ids);
        ids
    }

    fn collect_pane_ids(&self, ids: &mut Vec<PaneId>) {
        match self {
            LayoutNode::Pane(pane) => ids.push(pane.id),
            LayoutNode::Split(split) => {
                for child in &split.children {
                    child.collect_pane_ids(ids);
                }
            }
        }
    }

    /// Depth-first search for the first active leaf.
    pub fn find_active_pane(&self) -> Option<&Pane> {
        match self {
            LayoutNode::Pane(pane) => pane.active.then_some(pane),
            LayoutNode::Split(split) => split.children.iter().find_map(|c| c.find_active_pane()),
        }
    }

    /// Visit every leaf pane.
    pub fn for_each_pane(&self, f: &mut impl FnMut(&Pane)) {
        match self {
            LayoutNode::Pane(pane) => f(pane),
            LayoutNode::Split(split) => {
                for child in &split.children {
                    child.for_each_pane(f);
                }
            }
        }
    }
}

/// A tmux window with its parsed layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    /// Window ID (e.g., @0)
    pub id: WindowId,
    pub cols: u64,
    pub rows: u64,
    /// Window name/title
    pub name: String,
    /// Whether this is the active window
    pub active: bool,
    /// Root of the layout tree
    pub root: LayoutNode,
}

/// Remote state as of one sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    pub panes: BTreeMap<PaneId, Pane>,
    pub windows: Vec<Window>,
}

impl LayoutSnapshot {
    pub fn window(&self, id: WindowId) -> Option<&Window> {
        self.windows.iter().find(|w| w.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pane(id: PaneId, active: bool) -> LayoutNode {
        LayoutNode::Pane(Pane {
            active,
            ..Pane::new(id)
        })
    }

    fn split(direction: SplitDirection, children: Vec<LayoutNode>) -> LayoutNode {
        LayoutNode::Split(Split {
            direction,
            cols: 80,
            rows: 24,
            x: 0,
            y: 0,
            parent_direction: None,
            children,
        })
    }

    #[test]
    fn test_pane_ids_in_layout_order() {
        let tree = split(
            SplitDirection::Vertical,
            vec![
                split(SplitDirection::Horizontal, vec![pane(1, false), pane(2, false)]),
                pane(3, false),
            ],
        );
        assert_eq!(tree.pane_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_find_active_pane_nested() {
        let tree = split(
            SplitDirection::Vertical,
            vec![
                pane(1, false),
                split(SplitDirection::Horizontal, vec![pane(2, false), pane(3, true)]),
            ],
        );
        assert_eq!(tree.find_active_pane().map(|p| p.id), Some(3));
    }

    #[test]
    fn test_find_active_pane_none() {
        let tree = split(SplitDirection::Vertical, vec![pane(1, false), pane(2, false)]);
        assert!(tree.find_active_pane().is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(pane(4, true)).unwrap();
        assert_eq!(json["kind"], "pane");
        assert_eq!(json["cursorX"], 0);
        assert!(json.get("parentDirection").is_none());

        let json = serde_json::to_value(SplitDirection::Horizontal).unwrap();
        assert_eq!(json, "HORIZONTAL");
    }
}
