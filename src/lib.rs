//! `canopy`: issue hierarchy and change tracking for saved tracker queries.
//!
//! A query result (a flat list of issues) is turned into a parent/child
//! forest using the parent field, an epic-link custom field, or hierarchy
//! issue links. Each query gets a checkpoint so later results can be diffed
//! against it for new, removed and status-changed issues.
//!
//! The library is split so the CLI is a thin shell:
//!
//! - [`hierarchy`] builds the forest from issues
//! - [`tree`] holds pure operations on the forest (expand, flatten, stats)
//! - [`changes`] snapshots results and detects changes
//! - [`storage`] persists tracker state as JSON documents
//! - [`session`] ties a source, the forest and the tracker together
//! - [`rebuild`] keeps only the newest of overlapping rebuilds

pub mod changes;
pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod hierarchy;
pub mod logging;
pub mod model;
pub mod rebuild;
pub mod session;
pub mod source;
pub mod storage;
pub mod tree;
pub mod util;

pub use changes::{ChangeDetection, ChangeTracker, QueryCheckpoint, TrackingSettings};
pub use error::{CanopyError, ErrorCode, Result, StructuredError};
pub use hierarchy::{HierarchyOptions, build_hierarchy, build_hierarchy_with_report};
pub use model::Issue;
pub use session::Session;
pub use tree::TreeNode;
