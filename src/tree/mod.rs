//! Issue forest and the operations the presentation layer drives.
//!
//! Every operation here is a pure function: updates clone the forest and
//! return the new one, leaving the caller's forest untouched. Derived fields
//! (`depth`, `parent_key`, `is_visible`) are restored by [`assign_depths`]
//! after each structural or expansion change.

use crate::model::Issue;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// One issue placed in the forest.
///
/// Parent chains from a tracker can be arbitrarily long, so `Clone`,
/// `PartialEq`, `Debug` and `Drop` are written with explicit stacks rather
/// than derived.
pub struct TreeNode {
    pub issue: Issue,
    pub children: Vec<TreeNode>,
    /// Distance from the root (roots are 0).
    pub depth: usize,
    pub is_expanded: bool,
    /// Key of the owning node; back-reference only.
    pub parent_key: Option<String>,
    /// True when every ancestor is expanded.
    pub is_visible: bool,
}

impl TreeNode {
    #[must_use]
    pub fn new(issue: Issue) -> Self {
        Self {
            issue,
            children: Vec::new(),
            depth: 0,
            is_expanded: false,
            parent_key: None,
            is_visible: true,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.issue.key
    }

    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    fn without_children(&self) -> Self {
        Self {
            issue: self.issue.clone(),
            children: Vec::with_capacity(self.children.len()),
            depth: self.depth,
            is_expanded: self.is_expanded,
            parent_key: self.parent_key.clone(),
            is_visible: self.is_visible,
        }
    }

    fn same_fields(&self, other: &Self) -> bool {
        self.issue == other.issue
            && self.depth == other.depth
            && self.is_expanded == other.is_expanded
            && self.parent_key == other.parent_key
            && self.is_visible == other.is_visible
            && self.children.len() == other.children.len()
    }
}

impl Clone for TreeNode {
    fn clone(&self) -> Self {
        let mut root = self.without_children();
        // `cursor` walks the source; `building` holds the copies of every
        // node on the current path below the root.
        let mut cursor: Vec<(&Self, usize)> = vec![(self, 0)];
        let mut building: Vec<Self> = Vec::new();

        while let Some(&(node, next)) = cursor.last() {
            if let Some(child) = node.children.get(next) {
                if let Some(top) = cursor.last_mut() {
                    top.1 = next + 1;
                }
                cursor.push((child, 0));
                building.push(child.without_children());
                continue;
            }
            cursor.pop();
            if cursor.is_empty() {
                break;
            }
            if let Some(done) = building.pop() {
                building.last_mut().unwrap_or(&mut root).children.push(done);
            }
        }

        root
    }
}

impl PartialEq for TreeNode {
    fn eq(&self, other: &Self) -> bool {
        let mut stack = vec![(self, other)];
        while let Some((a, b)) = stack.pop() {
            if !a.same_fields(b) {
                return false;
            }
            stack.extend(a.children.iter().zip(&b.children));
        }
        true
    }
}

impl fmt::Debug for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let child_keys: Vec<&str> = self.children.iter().map(Self::key).collect();
        f.debug_struct("TreeNode")
            .field("key", &self.issue.key)
            .field("children", &child_keys)
            .field("depth", &self.depth)
            .field("is_expanded", &self.is_expanded)
            .field("parent_key", &self.parent_key)
            .field("is_visible", &self.is_visible)
            .finish_non_exhaustive()
    }
}

impl Drop for TreeNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Aggregate numbers over a forest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub total_issues: usize,
    pub root_count: usize,
    pub max_depth: usize,
    pub counts_by_type: BTreeMap<String, usize>,
    pub counts_by_status: BTreeMap<String, usize>,
}

/// Recompute `depth`, `parent_key` and `is_visible` top-down.
pub fn assign_depths(forest: &mut [TreeNode]) {
    let mut stack: Vec<(&mut TreeNode, usize, Option<String>, bool)> = forest
        .iter_mut()
        .map(|root| (root, 0, None, true))
        .collect();

    while let Some((node, depth, parent_key, visible)) = stack.pop() {
        node.depth = depth;
        node.parent_key = parent_key;
        node.is_visible = visible;

        let child_visible = visible && node.is_expanded;
        let key = &node.issue.key;
        stack.extend(
            node.children
                .iter_mut()
                .map(|child| (child, depth + 1, Some(key.clone()), child_visible)),
        );
    }
}

/// Visible nodes in display order.
///
/// Depth-first pre-order; a node's children are included only when the node
/// is expanded. Re-derived on every call.
#[must_use]
pub fn flatten(forest: &[TreeNode]) -> Vec<&TreeNode> {
    let mut out = Vec::new();
    let mut stack: Vec<&TreeNode> = forest.iter().rev().collect();

    while let Some(node) = stack.pop() {
        out.push(node);
        if node.is_expanded {
            stack.extend(node.children.iter().rev());
        }
    }

    out
}

/// Every node in pre-order, regardless of expansion.
#[must_use]
pub fn all_nodes(forest: &[TreeNode]) -> Vec<&TreeNode> {
    let mut out = Vec::new();
    let mut stack: Vec<&TreeNode> = forest.iter().rev().collect();

    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(node.children.iter().rev());
    }

    out
}

/// Depth-first search by key.
#[must_use]
pub fn find<'a>(forest: &'a [TreeNode], key: &str) -> Option<&'a TreeNode> {
    let mut stack: Vec<&TreeNode> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if node.issue.key == key {
            return Some(node);
        }
        stack.extend(node.children.iter().rev());
    }
    None
}

/// Child indices leading from the forest to the node with `key`.
fn path_to(forest: &[TreeNode], key: &str) -> Option<Vec<usize>> {
    let mut levels: Vec<&[TreeNode]> = vec![forest];
    let mut path: Vec<usize> = vec![0];

    while let (Some(&level), Some(&idx)) = (levels.last(), path.last()) {
        if let Some(node) = level.get(idx) {
            if node.issue.key == key {
                return Some(path);
            }
            levels.push(node.children.as_slice());
            path.push(0);
        } else {
            levels.pop();
            path.pop();
            if let Some(last) = path.last_mut() {
                *last += 1;
            }
        }
    }
    None
}

fn find_mut<'a>(forest: &'a mut [TreeNode], key: &str) -> Option<&'a mut TreeNode> {
    let path = path_to(forest, key)?;
    let (&first, rest) = path.split_first()?;
    let mut node = forest.get_mut(first)?;
    for &idx in rest {
        node = node.children.get_mut(idx)?;
    }
    Some(node)
}

/// Flip `is_expanded` on the node with `key`.
///
/// Returns an unchanged copy when the key is not in the forest.
#[must_use]
pub fn toggle(forest: &[TreeNode], key: &str) -> Vec<TreeNode> {
    let mut next = forest.to_vec();
    if let Some(node) = find_mut(&mut next, key) {
        node.is_expanded = !node.is_expanded;
    }
    assign_depths(&mut next);
    next
}

/// Set `is_expanded` on the node with `key` to an explicit value.
#[must_use]
pub fn set_expanded(forest: &[TreeNode], key: &str, expanded: bool) -> Vec<TreeNode> {
    let mut next = forest.to_vec();
    if let Some(node) = find_mut(&mut next, key) {
        node.is_expanded = expanded;
    }
    assign_depths(&mut next);
    next
}

/// Expand every ancestor of `key` so that it becomes visible.
///
/// The node itself keeps its expansion state. Unknown keys yield an
/// unchanged copy.
#[must_use]
pub fn expand_to(forest: &[TreeNode], key: &str) -> Vec<TreeNode> {
    let mut next = forest.to_vec();
    if let Some(path) = path_to(&next, key) {
        let ancestors = &path[..path.len() - 1];
        let mut level: &mut [TreeNode] = &mut next;
        for &idx in ancestors {
            let Some(node) = level.get_mut(idx) else {
                break;
            };
            node.is_expanded = true;
            level = node.children.as_mut_slice();
        }
    }
    assign_depths(&mut next);
    next
}

#[must_use]
pub fn expand_all(forest: &[TreeNode]) -> Vec<TreeNode> {
    set_all(forest, true)
}

#[must_use]
pub fn collapse_all(forest: &[TreeNode]) -> Vec<TreeNode> {
    set_all(forest, false)
}

fn set_all(forest: &[TreeNode], expanded: bool) -> Vec<TreeNode> {
    let mut next = forest.to_vec();
    let mut stack: Vec<&mut TreeNode> = next.iter_mut().collect();
    while let Some(node) = stack.pop() {
        node.is_expanded = expanded;
        stack.extend(node.children.iter_mut());
    }
    assign_depths(&mut next);
    next
}

/// Keys of all expanded nodes, for persisting expand state across reloads.
#[must_use]
pub fn collect_expanded_keys(forest: &[TreeNode]) -> HashSet<String> {
    all_nodes(forest)
        .into_iter()
        .filter(|node| node.is_expanded)
        .map(|node| node.issue.key.clone())
        .collect()
}

/// Totals, roots, deepest level, and per-type / per-status counts.
#[must_use]
pub fn compute_stats(forest: &[TreeNode]) -> TreeStats {
    let mut stats = TreeStats {
        root_count: forest.len(),
        ..TreeStats::default()
    };

    let mut stack: Vec<(&TreeNode, usize)> = forest.iter().map(|root| (root, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        stats.total_issues += 1;
        stats.max_depth = stats.max_depth.max(depth);
        *stats
            .counts_by_type
            .entry(node.issue.issue_type_name().to_string())
            .or_insert(0) += 1;
        *stats
            .counts_by_status
            .entry(node.issue.status_name().to_string())
            .or_insert(0) += 1;
        stack.extend(node.children.iter().map(|child| (child, depth + 1)));
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(key: &str, children: Vec<TreeNode>) -> TreeNode {
        let mut node = TreeNode::new(
            Issue::new(key)
                .with_type("Story", false)
                .with_status("Open", "new"),
        );
        node.children = children;
        node
    }

    fn sample_forest() -> Vec<TreeNode> {
        let mut forest = vec![
            node(
                "P-1",
                vec![node("P-2", vec![node("P-3", vec![])]), node("P-4", vec![])],
            ),
            node("P-5", vec![]),
        ];
        assign_depths(&mut forest);
        forest
    }

    fn keys(nodes: &[&TreeNode]) -> Vec<String> {
        nodes.iter().map(|n| n.key().to_string()).collect()
    }

    #[test]
    fn test_assign_depths_sets_parent_and_visibility() {
        let forest = sample_forest();
        let p3 = find(&forest, "P-3").unwrap();
        assert_eq!(p3.depth, 2);
        assert_eq!(p3.parent_key.as_deref(), Some("P-2"));
        assert!(!p3.is_visible);
        assert!(find(&forest, "P-5").unwrap().is_visible);
    }

    #[test]
    fn test_flatten_collapsed_shows_roots_only() {
        let forest = sample_forest();
        assert_eq!(keys(&flatten(&forest)), vec!["P-1", "P-5"]);
    }

    #[test]
    fn test_flatten_respects_expansion() {
        let forest = toggle(&sample_forest(), "P-1");
        assert_eq!(keys(&flatten(&forest)), vec!["P-1", "P-2", "P-4", "P-5"]);

        let forest = expand_all(&forest);
        assert_eq!(
            keys(&flatten(&forest)),
            vec!["P-1", "P-2", "P-3", "P-4", "P-5"]
        );
        assert!(flatten(&forest).iter().all(|n| n.is_visible));
    }

    #[test]
    fn test_toggle_does_not_touch_original() {
        let original = sample_forest();
        let toggled = toggle(&original, "P-1");
        assert!(!find(&original, "P-1").unwrap().is_expanded);
        assert!(find(&toggled, "P-1").unwrap().is_expanded);
    }

    #[test]
    fn test_double_toggle_restores_flag() {
        let original = expand_all(&sample_forest());
        let twice = toggle(&toggle(&original, "P-2"), "P-2");
        assert_eq!(twice, original);
    }

    #[test]
    fn test_toggle_unknown_key_is_noop() {
        let original = sample_forest();
        assert_eq!(toggle(&original, "NOPE-1"), original);
    }

    #[test]
    fn test_expand_to_reveals_deep_node() {
        let forest = expand_to(&sample_forest(), "P-3");
        assert!(find(&forest, "P-3").unwrap().is_visible);
        assert!(!find(&forest, "P-3").unwrap().is_expanded);
        assert!(!find(&forest, "P-5").unwrap().is_expanded);
        let expanded = collect_expanded_keys(&forest);
        assert_eq!(
            expanded,
            ["P-1", "P-2"].iter().map(ToString::to_string).collect()
        );
    }

    #[test]
    fn test_collapse_all_clears_expanded_keys() {
        let forest = collapse_all(&expand_all(&sample_forest()));
        assert!(collect_expanded_keys(&forest).is_empty());
    }

    #[test]
    fn test_all_nodes_ignores_expansion() {
        let forest = sample_forest();
        assert_eq!(
            keys(&all_nodes(&forest)),
            vec!["P-1", "P-2", "P-3", "P-4", "P-5"]
        );
    }

    #[test]
    fn test_compute_stats() {
        let stats = compute_stats(&sample_forest());
        assert_eq!(stats.total_issues, 5);
        assert_eq!(stats.root_count, 2);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(stats.counts_by_type.get("Story"), Some(&5));
        assert_eq!(stats.counts_by_status.get("Open"), Some(&5));
    }

    #[test]
    fn test_compute_stats_empty() {
        assert_eq!(compute_stats(&[]), TreeStats::default());
    }
}
