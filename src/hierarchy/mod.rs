//! Hierarchy reconstruction from a flat issue list.
//!
//! The tracker returns query results as a flat, arbitrarily ordered list.
//! [`build_hierarchy`] turns that list into a forest by resolving one parent
//! per issue, first match wins:
//!
//! 1. the native `parent` field (subtasks and next-gen parent links)
//! 2. the configured epic-link custom field, when it holds a string
//! 3. the first issue link, in list order, whose label marks a parent
//!    relationship and whose other end is part of the result set
//!
//! Building never fails. Issues whose parent is outside the result set
//! become additional roots and are reported as orphans; an edge that would
//! close a cycle is dropped and the issue processed later becomes a root.

mod sort;

pub use sort::{SortConfig, SortDirection, SortField, compare_issues, hierarchy_rank};

use crate::model::{Issue, LinkDirection};
use crate::tree::{TreeNode, assign_depths};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Inputs that shape the forest besides the issues themselves.
#[derive(Debug, Clone, Default)]
pub struct HierarchyOptions {
    /// Custom field id holding the epic key (e.g. `customfield_10014`).
    pub epic_link_field: Option<String>,
    /// Keys whose nodes start expanded.
    pub expanded_keys: HashSet<String>,
    pub sort: SortConfig,
}

/// Which relationship signal produced a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentSource {
    ParentField,
    EpicLink,
    IssueLink,
}

/// An issue whose resolved parent is not among the fetched issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanRecord {
    pub key: String,
    pub missing_parent: String,
    pub source: ParentSource,
}

/// A parent edge dropped because it would have closed a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleBreak {
    pub key: String,
    pub parent: String,
}

/// Diagnostics gathered while building.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub total_issues: usize,
    pub root_count: usize,
    pub orphans: Vec<OrphanRecord>,
    pub cycle_breaks: Vec<CycleBreak>,
    pub duplicate_keys: Vec<String>,
}

impl BuildReport {
    #[must_use]
    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }
}

/// A built forest together with its diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    pub roots: Vec<TreeNode>,
    pub report: BuildReport,
}

/// Build the issue forest. See the module docs for the resolution rules.
#[must_use]
pub fn build_hierarchy(issues: &[Issue], options: &HierarchyOptions) -> Vec<TreeNode> {
    build_hierarchy_with_report(issues, options).roots
}

/// Build the issue forest and report orphans, cycle breaks and duplicates.
#[must_use]
pub fn build_hierarchy_with_report(issues: &[Issue], options: &HierarchyOptions) -> Hierarchy {
    let mut report = BuildReport::default();

    // Index by key; a repeated key keeps its first position but the last
    // record seen.
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(issues.len());
    let mut unique: Vec<&Issue> = Vec::with_capacity(issues.len());
    for issue in issues {
        if let Some(&pos) = index.get(issue.key.as_str()) {
            unique[pos] = issue;
            report.duplicate_keys.push(issue.key.clone());
        } else {
            index.insert(issue.key.as_str(), unique.len());
            unique.push(issue);
        }
    }
    if !report.duplicate_keys.is_empty() {
        warn!(
            count = report.duplicate_keys.len(),
            "Duplicate issue keys in result set; keeping last occurrence"
        );
    }

    let epic_field = options.epic_link_field.as_deref();
    let mut parent: Vec<Option<usize>> = vec![None; unique.len()];
    let mut chains = ChainRoots::new(unique.len());

    for (idx, issue) in unique.iter().enumerate() {
        let Some((parent_key, source)) =
            resolve_parent(issue, epic_field, |key| index.contains_key(key))
        else {
            continue;
        };

        let Some(&parent_idx) = index.get(parent_key) else {
            debug!(
                key = %issue.key,
                missing_parent = parent_key,
                ?source,
                "Parent not in result set; promoting to root"
            );
            report.orphans.push(OrphanRecord {
                key: issue.key.clone(),
                missing_parent: parent_key.to_string(),
                source,
            });
            continue;
        };

        if parent_idx == idx || chains.root(parent_idx) == idx {
            warn!(
                key = %issue.key,
                parent = parent_key,
                "Parent chain loops back to issue; promoting to root"
            );
            report.cycle_breaks.push(CycleBreak {
                key: issue.key.clone(),
                parent: parent_key.to_string(),
            });
            continue;
        }

        parent[idx] = Some(parent_idx);
        chains.attach(idx, parent_idx);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); unique.len()];
    let mut roots: Vec<usize> = Vec::new();
    for (idx, parent_idx) in parent.iter().enumerate() {
        match parent_idx {
            Some(p) => children[*p].push(idx),
            None => roots.push(idx),
        }
    }

    let compare = |a: &usize, b: &usize| compare_issues(unique[*a], unique[*b], &options.sort);
    roots.sort_by(compare);
    for list in &mut children {
        list.sort_by(compare);
    }

    let mut forest = materialize(&unique, &children, &roots, &options.expanded_keys);
    assign_depths(&mut forest);

    report.total_issues = unique.len();
    report.root_count = forest.len();
    debug!(
        total = report.total_issues,
        roots = report.root_count,
        orphans = report.orphans.len(),
        cycle_breaks = report.cycle_breaks.len(),
        "Built issue hierarchy"
    );

    Hierarchy {
        roots: forest,
        report,
    }
}

/// Resolve the parent key of an issue, first signal wins.
///
/// `is_present` tells whether a key is part of the fetched set; it only
/// gates the issue-link signal. The parent field and the epic link are
/// returned even when the parent is absent so the caller can report an
/// orphan.
pub fn resolve_parent<'a>(
    issue: &'a Issue,
    epic_link_field: Option<&str>,
    is_present: impl Fn(&str) -> bool,
) -> Option<(&'a str, ParentSource)> {
    if let Some(key) = issue.parent_key() {
        return Some((key, ParentSource::ParentField));
    }

    if let Some(key) = epic_link_field.and_then(|field| issue.custom_field_str(field)) {
        return Some((key, ParentSource::EpicLink));
    }

    issue.fields.issuelinks.iter().find_map(|link| {
        let (direction, label, linked_key) = link.resolve()?;
        let label = label.to_lowercase();
        let marks_parent = match direction {
            LinkDirection::Inward => label.contains("child") || label.contains("parent"),
            LinkDirection::Outward => label.contains("parent"),
        };
        (marks_parent && linked_key != issue.key && is_present(linked_key))
            .then_some((linked_key, ParentSource::IssueLink))
    })
}

/// Topmost ancestor of every issue over the parent edges accepted so far.
///
/// Each issue gets its parent edge at most once, while it is still the top
/// of its own chain, so `child -> parent` closes a loop exactly when
/// `root(parent) == child`. Path compression keeps long chains near-linear.
struct ChainRoots {
    up: Vec<usize>,
}

impl ChainRoots {
    fn new(len: usize) -> Self {
        Self {
            up: (0..len).collect(),
        }
    }

    fn root(&mut self, idx: usize) -> usize {
        let mut top = idx;
        while self.up[top] != top {
            top = self.up[top];
        }
        let mut current = idx;
        while self.up[current] != top {
            let next = self.up[current];
            self.up[current] = top;
            current = next;
        }
        top
    }

    fn attach(&mut self, child: usize, parent: usize) {
        let top = self.root(parent);
        self.up[child] = top;
    }
}

/// Turn the index structure into owned nodes, bottom-up.
fn materialize(
    issues: &[&Issue],
    children: &[Vec<usize>],
    roots: &[usize],
    expanded_keys: &HashSet<String>,
) -> Vec<TreeNode> {
    let mut order = Vec::with_capacity(issues.len());
    let mut stack: Vec<(usize, bool)> = roots.iter().rev().map(|&idx| (idx, false)).collect();
    while let Some((idx, expanded)) = stack.pop() {
        if expanded {
            order.push(idx);
        } else {
            stack.push((idx, true));
            stack.extend(children[idx].iter().rev().map(|&child| (child, false)));
        }
    }

    let mut slots: Vec<Option<TreeNode>> = vec![None; issues.len()];
    for idx in order {
        let mut node = TreeNode::new(issues[idx].clone());
        node.is_expanded = expanded_keys.contains(&node.issue.key);
        node.children = children[idx]
            .iter()
            .filter_map(|&child| slots[child].take())
            .collect();
        slots[idx] = Some(node);
    }

    roots.iter().filter_map(|&idx| slots[idx].take()).collect()
}
