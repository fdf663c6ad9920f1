//! Per-view state the presentation layer drives.
//!
//! A [`Session`] owns the current forest, its build report, the change
//! tracker and the rebuild scheduler. Every update replaces the forest as a
//! whole value; nothing is mutated in place.

use crate::changes::{ChangeDetection, ChangeTracker, is_recently_updated};
use crate::error::Result;
use crate::hierarchy::{BuildReport, HierarchyOptions, build_hierarchy_with_report};
use crate::model::Issue;
use crate::rebuild::{RebuildRequest, RebuildScheduler, RebuildTicket};
use crate::source::IssueSource;
use crate::storage::{KeyValueStore, load_expanded_keys, save_expanded_keys};
use crate::tree::{self, TreeNode, TreeStats};
use tracing::{debug, warn};

/// Result of handing a finished fetch back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Whether the fetched issues replaced the current forest.
    pub applied: bool,
    /// A deferred rebuild that should be fetched next.
    pub next: Option<RebuildTicket>,
}

#[derive(Debug)]
pub struct Session<S: KeyValueStore> {
    options: HierarchyOptions,
    tracker: ChangeTracker<S>,
    scheduler: RebuildScheduler,
    query_id: Option<String>,
    issues: Vec<Issue>,
    forest: Vec<TreeNode>,
    report: BuildReport,
    detection: ChangeDetection,
    /// Rebuild handed out by the scheduler during [`Session::load`] that the
    /// caller has not started yet.
    deferred: Option<RebuildTicket>,
}

impl<S: KeyValueStore> Session<S> {
    /// Create a session. Expanded keys persisted in the tracker's store are
    /// merged into `options`.
    pub fn new(tracker: ChangeTracker<S>, mut options: HierarchyOptions) -> Self {
        options
            .expanded_keys
            .extend(load_expanded_keys(tracker.store()));
        Self {
            options,
            tracker,
            scheduler: RebuildScheduler::new(),
            query_id: None,
            issues: Vec::new(),
            forest: Vec::new(),
            report: BuildReport::default(),
            detection: ChangeDetection::default(),
            deferred: None,
        }
    }

    /// Ask to rebuild for `query_id`. See [`RebuildScheduler::request`].
    pub fn begin_load(&mut self, query_id: &str) -> RebuildRequest {
        self.scheduler.request(query_id)
    }

    /// Hand back the issues fetched for `ticket`.
    ///
    /// Superseded results are dropped. Applied results rebuild the forest
    /// (keeping the current expand state) and run change detection.
    pub fn complete_load(&mut self, ticket: &RebuildTicket, issues: Vec<Issue>) -> LoadOutcome {
        let completion = self.scheduler.complete(ticket);
        if completion.apply {
            self.apply(ticket.query_id(), issues);
        }
        LoadOutcome {
            applied: completion.apply,
            next: completion.next,
        }
    }

    /// Fetch and apply synchronously.
    ///
    /// Returns `Ok(false)` when another load is in flight; the request is
    /// then deferred until that load completes.
    ///
    /// A load started here holds `&mut self` until it finishes, so no other
    /// request can queue behind it and the scheduler normally has nothing to
    /// hand out afterwards. If it does, the ticket is kept for
    /// [`Session::take_deferred_load`] instead of being dropped; a dropped
    /// ticket would leave the scheduler busy for good.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails. The scheduler slot is released
    /// and the current forest is kept.
    pub fn load(&mut self, source: &dyn IssueSource, query: &str, query_id: &str) -> Result<bool> {
        let RebuildRequest::Start(ticket) = self.begin_load(query_id) else {
            return Ok(false);
        };
        match source.fetch_all(query) {
            Ok(issues) => {
                let outcome = self.complete_load(&ticket, issues);
                self.hold_deferred(outcome.next);
                Ok(outcome.applied)
            }
            Err(err) => {
                let completion = self.scheduler.complete(&ticket);
                self.hold_deferred(completion.next);
                Err(err)
            }
        }
    }

    fn hold_deferred(&mut self, next: Option<RebuildTicket>) {
        if let Some(ticket) = next {
            warn!(
                query_id = ticket.query_id(),
                "Rebuild queued behind a synchronous load; waiting for the caller"
            );
            self.deferred = Some(ticket);
        }
    }

    /// Rebuild the scheduler handed out at the end of [`Session::load`], to
    /// be fetched and passed to [`Session::complete_load`].
    pub fn take_deferred_load(&mut self) -> Option<RebuildTicket> {
        self.deferred.take()
    }

    /// Whether a rebuild is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.scheduler.is_busy()
    }

    fn apply(&mut self, query_id: &str, issues: Vec<Issue>) {
        if !self.forest.is_empty() {
            self.options.expanded_keys = tree::collect_expanded_keys(&self.forest);
        }
        let hierarchy = build_hierarchy_with_report(&issues, &self.options);
        let detection = self.tracker.detect_changes(query_id, &issues);

        debug!(
            query_id,
            issues = issues.len(),
            roots = hierarchy.roots.len(),
            changes = detection.change_count(),
            "Applied rebuild"
        );

        self.forest = hierarchy.roots;
        self.report = hierarchy.report;
        self.detection = detection;
        self.issues = issues;
        self.query_id = Some(query_id.to_string());
    }

    #[must_use]
    pub fn forest(&self) -> &[TreeNode] {
        &self.forest
    }

    #[must_use]
    pub const fn report(&self) -> &BuildReport {
        &self.report
    }

    #[must_use]
    pub const fn detection(&self) -> &ChangeDetection {
        &self.detection
    }

    #[must_use]
    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }

    #[must_use]
    pub const fn tracker(&self) -> &ChangeTracker<S> {
        &self.tracker
    }

    pub const fn tracker_mut(&mut self) -> &mut ChangeTracker<S> {
        &mut self.tracker
    }

    /// Visible rows in display order.
    #[must_use]
    pub fn visible_rows(&self) -> Vec<&TreeNode> {
        tree::flatten(&self.forest)
    }

    #[must_use]
    pub fn stats(&self) -> TreeStats {
        tree::compute_stats(&self.forest)
    }

    pub fn toggle(&mut self, key: &str) {
        self.forest = tree::toggle(&self.forest, key);
    }

    pub fn set_expanded(&mut self, key: &str, expanded: bool) {
        self.forest = tree::set_expanded(&self.forest, key, expanded);
    }

    pub fn expand_to(&mut self, key: &str) {
        self.forest = tree::expand_to(&self.forest, key);
    }

    pub fn expand_all(&mut self) {
        self.forest = tree::expand_all(&self.forest);
    }

    pub fn collapse_all(&mut self) {
        self.forest = tree::collapse_all(&self.forest);
    }

    /// Whether the issue was updated within the tracker's activity period.
    #[must_use]
    pub fn is_recent(&self, issue: &Issue) -> bool {
        is_recently_updated(issue, self.tracker.settings().activity_period)
    }

    /// Whether the issue is new or changed status since the checkpoint.
    #[must_use]
    pub fn is_changed(&self, key: &str) -> bool {
        self.detection.new_issues.iter().any(|k| k == key)
            || self.detection.status_changes.iter().any(|c| c.key == key)
    }

    /// Save the current result set as the checkpoint for the loaded query.
    ///
    /// Returns `false` when nothing has been loaded yet.
    pub fn acknowledge(&mut self) -> bool {
        let Some(query_id) = self.query_id.clone() else {
            return false;
        };
        self.tracker.save_checkpoint(&query_id, &self.issues);
        self.detection = ChangeDetection::default();
        true
    }

    /// Persist the current expand state. Failures are logged.
    pub fn persist_expanded(&mut self) {
        let keys = tree::collect_expanded_keys(&self.forest);
        if let Err(err) = save_expanded_keys(self.tracker.store_mut(), &keys) {
            warn!(error = %err, "Failed to persist expanded nodes");
        }
    }
}
