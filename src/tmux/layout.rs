//! Recursive-descent parser for tmux window layout strings
//!
//! Format example: "b25d,89x24,0,0{44x24,0,0,1,44x24,45,0,2}"
//! - `b25d,` = optional checksum, skipped
//! - `89x24,0,0` = dimensions and position
//! - `{...}` = vertical split (panes side by side)
//! - `[...]` = horizontal split (panes stacked)
//! - `,N` after the position = leaf pane %N
//!
//! Leaves are resolved against the pane listing from the same sync, and
//! every node records the direction of the split that directly contains it.

use crate::error::{LayoutError, ScanError};
use crate::scanner::Scanner;
use crate::tmux::types::{LayoutNode, Pane, PaneId, Split, SplitDirection};
use std::collections::BTreeMap;

/// Parse one window layout string into a tree.
pub fn parse_window_layout(
    raw: &str,
    panes: &BTreeMap<PaneId, Pane>,
) -> Result<LayoutNode, LayoutError> {
    let result = LayoutParser::new(raw, panes).parse();
    if let Err(e) = &result {
        crate::debug_error!("LAYOUT", "{}", e);
    }
    result
}

/// Drop the `xxxx,` checksum tmux puts in front of `#{window_layout}`.
fn strip_checksum(layout: &str) -> &str {
    let layout = layout.trim();
    match layout.get(..5) {
        Some(prefix)
            if prefix.ends_with(',') && prefix[..4].chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            &layout[5..]
        }
        _ => layout,
    }
}

fn scan_error(layout: &str) -> impl FnOnce(ScanError) -> LayoutError + '_ {
    move |source| LayoutError::Scan {
        layout: layout.to_string(),
        source,
    }
}

struct LayoutParser<'a> {
    raw: &'a str,
    scanner: Scanner<'a>,
    panes: &'a BTreeMap<PaneId, Pane>,
}

impl<'a> LayoutParser<'a> {
    fn new(raw: &'a str, panes: &'a BTreeMap<PaneId, Pane>) -> Self {
        Self {
            raw,
            scanner: Scanner::new(strip_checksum(raw)),
            panes,
        }
    }

    fn parse(mut self) -> Result<LayoutNode, LayoutError> {
        let mut nodes = self.parse_siblings(None)?;
        if !self.scanner.is_at_end() {
            return Err(LayoutError::TrailingInput {
                layout: self.raw.to_string(),
                pos: self.scanner.position(),
            });
        }
        if nodes.len() != 1 {
            return Err(LayoutError::RootCount {
                layout: self.raw.to_string(),
                count: nodes.len(),
            });
        }
        Ok(nodes.remove(0))
    }

    /// Parse a comma-separated run of nodes sharing the parent `direction`.
    fn parse_siblings(
        &mut self,
        direction: Option<SplitDirection>,
    ) -> Result<Vec<LayoutNode>, LayoutError> {
        let mut nodes = vec![self.parse_node(direction)?];
        while self.scanner.peek_at(0) == Some(',') {
            self.scanner.skip(1);
            nodes.push(self.parse_node(direction)?);
        }
        Ok(nodes)
    }

    fn parse_node(&mut self, direction: Option<SplitDirection>) -> Result<LayoutNode, LayoutError> {
        let raw = self.raw;
        let cols = self.scanner.read_number().map_err(scan_error(raw))?;
        self.scanner.expect("x").map_err(scan_error(raw))?;
        let rows = self.scanner.read_number().map_err(scan_error(raw))?;
        self.scanner.expect(",").map_err(scan_error(raw))?;
        let x = self.scanner.read_number().map_err(scan_error(raw))?;
        self.scanner.expect(",").map_err(scan_error(raw))?;
        let y = self.scanner.read_number().map_err(scan_error(raw))?;

        let mut node = match self.scanner.peek_at(0) {
            Some(',') => {
                self.scanner.skip(1);
                let id = self.scanner.read_number().map_err(scan_error(raw))?;
                let pane = self.panes.get(&id).ok_or_else(|| LayoutError::UnknownPane {
                    layout: raw.to_string(),
                    pane_id: id,
                })?;
                LayoutNode::Pane(pane.clone())
            }
            Some(open @ ('[' | '{')) => {
                let (split_direction, close) = if open == '[' {
                    (SplitDirection::Horizontal, "]")
                } else {
                    (SplitDirection::Vertical, "}")
                };
                self.scanner.skip(1);
                let children = self.parse_siblings(Some(split_direction))?;
                self.scanner.expect(close).map_err(scan_error(raw))?;
                LayoutNode::Split(Split {
                    direction: split_direction,
                    cols,
                    rows,
                    x,
                    y,
                    parent_direction: None,
                    children,
                })
            }
            other => {
                return Err(LayoutError::UnexpectedToken {
                    layout: raw.to_string(),
                    found: other.map_or_else(|| "end of input".to_string(), |c| format!("'{c}'")),
                    pos: self.scanner.position(),
                });
            }
        };

        node.set_parent_direction(direction);
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panes(ids: &[PaneId]) -> BTreeMap<PaneId, Pane> {
        ids.iter().map(|&id| (id, Pane::new(id))).collect()
    }

    fn expect_split(node: &LayoutNode) -> &Split {
        match node {
            LayoutNode::Split(split) => split,
            LayoutNode::Pane(pane) => panic!("Expected split, got pane %{}", pane.id),
        }
    }

    fn expect_pane(node: &LayoutNode) -> &Pane {
        match node {
            LayoutNode::Pane(pane) => pane,
            LayoutNode::Split(_) => panic!("Expected pane, got split"),
        }
    }

    #[test]
    fn test_parse_single_pane() {
        let root = parse_window_layout("89x24,0,0,1", &panes(&[1])).unwrap();
        let pane = expect_pane(&root);
        assert_eq!(pane.id, 1);
        assert_eq!(pane.parent_direction, None);
    }

    #[test]
    fn test_parse_horizontal_split() {
        let root =
            parse_window_layout("80x24,0,0[40x24,0,0,5,40x24,41,0,6]", &panes(&[5, 6])).unwrap();
        let split = expect_split(&root);
        assert_eq!(split.direction, SplitDirection::Horizontal);
        assert_eq!((split.cols, split.rows), (80, 24));
        assert_eq!(root.pane_ids(), vec![5, 6]);
        for child in &split.children {
            assert_eq!(child.parent_direction(), Some(SplitDirection::Horizontal));
        }
    }

    #[test]
    fn test_parse_vertical_split() {
        let root = parse_window_layout("89x24,0,0{44x24,0,0,1,44x24,45,0,2}", &panes(&[1, 2]))
            .unwrap();
        let split = expect_split(&root);
        assert_eq!(split.direction, SplitDirection::Vertical);
        assert_eq!(split.children.len(), 2);
        assert_eq!(expect_pane(&split.children[1]).id, 2);
    }

    #[test]
    fn test_parse_with_checksum() {
        let root = parse_window_layout("f865,89x24,0,0,1", &panes(&[1])).unwrap();
        assert_eq!(expect_pane(&root).id, 1);
    }

    #[test]
    fn test_nested_splits_tag_immediate_parent() {
        let root = parse_window_layout(
            "89x24,0,0{44x24,0,0[44x12,0,0,1,44x11,0,13,2],44x24,45,0,3}",
            &panes(&[1, 2, 3]),
        )
        .unwrap();
        let outer = expect_split(&root);
        assert_eq!(outer.parent_direction, None);

        let inner = expect_split(&outer.children[0]);
        assert_eq!(inner.direction, SplitDirection::Horizontal);
        assert_eq!(inner.parent_direction, Some(SplitDirection::Vertical));
        assert_eq!(
            expect_pane(&inner.children[0]).parent_direction,
            Some(SplitDirection::Horizontal)
        );
        assert_eq!(
            expect_pane(&outer.children[1]).parent_direction,
            Some(SplitDirection::Vertical)
        );
        assert_eq!(root.pane_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_leaf_uses_listing_data() {
        let mut map = panes(&[9]);
        if let Some(p) = map.get_mut(&9) {
            p.title = "vim".to_string();
            p.active = true;
        }
        let root = parse_window_layout("80x24,0,0,9", &map).unwrap();
        let pane = expect_pane(&root);
        assert_eq!(pane.title, "vim");
        assert!(pane.active);
    }

    #[test]
    fn test_unknown_pane() {
        let err = parse_window_layout("80x24,0,0,7", &panes(&[1])).unwrap_err();
        assert!(matches!(err, LayoutError::UnknownPane { pane_id: 7, .. }));
    }

    #[test]
    fn test_multiple_roots_rejected() {
        let err = parse_window_layout("80x24,0,0,1,80x24,0,0,2", &panes(&[1, 2])).unwrap_err();
        assert!(matches!(err, LayoutError::RootCount { count: 2, .. }));
    }

    #[test]
    fn test_trailing_input_rejected() {
        let err = parse_window_layout("80x24,0,0,1]", &panes(&[1])).unwrap_err();
        assert!(matches!(err, LayoutError::TrailingInput { pos: 11, .. }));
    }

    #[test]
    fn test_unexpected_token() {
        let err = parse_window_layout("80x24,0,0;1", &panes(&[1])).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::UnexpectedToken { ref found, pos: 9, .. } if found == "';'"
        ));
    }

    #[test]
    fn test_missing_close_bracket() {
        let err = parse_window_layout("80x24,0,0[40x24,0,0,1", &panes(&[1])).unwrap_err();
        match err {
            LayoutError::Scan { source, .. } => {
                assert!(matches!(source, ScanError::Mismatch { ref expected, .. } if expected == "]"));
            }
            other => panic!("Expected scan error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_dimension_separator() {
        let err = parse_window_layout("80,24,0,0,1", &panes(&[1])).unwrap_err();
        assert!(err.to_string().contains("expected 'x'"));
    }

    #[test]
    fn test_empty_layout() {
        assert!(parse_window_layout("", &panes(&[])).is_err());
    }
}
