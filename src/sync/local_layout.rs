//! Host-side split tree used to compute the window size sent with a resize.

use crate::tmux::commands::Size;
use crate::tmux::types::{SessionId, SplitDirection};
use serde::{Deserialize, Serialize};

/// A node of the host's local split tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LocalLayoutNode {
    /// A terminal session with its current size
    #[serde(rename_all = "camelCase")]
    Session {
        session_id: SessionId,
        cols: u64,
        rows: u64,
    },
    /// A group of sessions or groups
    Group {
        direction: SplitDirection,
        children: Vec<LocalLayoutNode>,
    },
}

impl LocalLayoutNode {
    /// Total size of this subtree.
    ///
    /// A horizontal group stacks its children, so rows add up and the
    /// width is that of the last child. A vertical group is the transpose.
    pub fn aggregate_size(&self) -> Size {
        match self {
            LocalLayoutNode::Session { cols, rows, .. } => Size::new(*cols, *rows),
            LocalLayoutNode::Group {
                direction,
                children,
            } => children
                .iter()
                .map(LocalLayoutNode::aggregate_size)
                .fold(Size::new(0, 0), |acc, child| match direction {
                    SplitDirection::Horizontal => Size::new(child.cols, acc.rows + child.rows),
                    SplitDirection::Vertical => Size::new(acc.cols + child.cols, child.rows),
                }),
        }
    }
}
