//! Per-query change tracking against saved checkpoints.
//!
//! A checkpoint is the snapshot of a query's result set that the user last
//! acknowledged. Detection diffs the current result set against it by key;
//! only an explicit save moves the baseline forward.
//!
//! State lives in memory and is flushed to a [`KeyValueStore`] after every
//! mutation. Persistence is best-effort: failures are logged and the
//! in-memory state stays authoritative for the rest of the session.

mod period;

pub use period::{ActivityPeriod, TrackingSettings, is_recently_updated, is_recently_updated_at};

use crate::model::{Issue, StatusCategory};
use crate::storage::{CHECKPOINTS_KEY, KeyValueStore, PENDING_CHANGES_KEY};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Minimal projection of an issue kept in a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueSnapshot {
    pub key: String,
    pub status: String,
    #[serde(default)]
    pub status_category: StatusCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

impl IssueSnapshot {
    #[must_use]
    pub fn from_issue(issue: &Issue) -> Self {
        Self {
            key: issue.key.clone(),
            status: issue.status_name().to_string(),
            status_category: issue.status_category(),
            updated: issue.fields.updated,
            summary: issue.fields.summary.clone(),
            assignee: issue.assignee_name().map(str::to_string),
        }
    }
}

/// Saved baseline for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCheckpoint {
    pub timestamp: DateTime<Utc>,
    pub issues: Vec<IssueSnapshot>,
}

impl QueryCheckpoint {
    /// Snapshot `issues` at `timestamp`. Repeated keys keep the last record.
    #[must_use]
    pub fn capture(issues: &[Issue], timestamp: DateTime<Utc>) -> Self {
        let mut positions: HashMap<&str, usize> = HashMap::with_capacity(issues.len());
        let mut snapshots: Vec<IssueSnapshot> = Vec::with_capacity(issues.len());
        for issue in issues {
            let snapshot = IssueSnapshot::from_issue(issue);
            if let Some(&pos) = positions.get(issue.key.as_str()) {
                snapshots[pos] = snapshot;
            } else {
                positions.insert(issue.key.as_str(), snapshots.len());
                snapshots.push(snapshot);
            }
        }
        Self {
            timestamp,
            issues: snapshots,
        }
    }
}

/// An issue that was in the checkpoint but is no longer returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedIssue {
    pub key: String,
    pub last_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// An issue whose status name differs from the checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub key: String,
    pub previous_status: String,
    pub current_status: String,
    pub previous_category: StatusCategory,
    pub current_category: StatusCategory,
}

/// Result of diffing a result set against its checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeDetection {
    pub new_issues: Vec<String>,
    pub removed_issues: Vec<RemovedIssue>,
    pub status_changes: Vec<StatusChange>,
    pub has_changes: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_timestamp: Option<DateTime<Utc>>,
}

impl ChangeDetection {
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.new_issues.len() + self.removed_issues.len() + self.status_changes.len()
    }

    /// Diff `issues` against `checkpoint`.
    #[must_use]
    pub fn between(checkpoint: &QueryCheckpoint, issues: &[Issue]) -> Self {
        let previous: HashMap<&str, &IssueSnapshot> = checkpoint
            .issues
            .iter()
            .map(|snap| (snap.key.as_str(), snap))
            .collect();

        let mut current: HashMap<&str, &Issue> = HashMap::with_capacity(issues.len());
        let mut order: Vec<&str> = Vec::with_capacity(issues.len());
        for issue in issues {
            if current.insert(issue.key.as_str(), issue).is_none() {
                order.push(issue.key.as_str());
            }
        }

        let mut detection = Self {
            checkpoint_timestamp: Some(checkpoint.timestamp),
            ..Self::default()
        };

        for key in order {
            let issue = current[key];
            match previous.get(key) {
                None => detection.new_issues.push(key.to_string()),
                Some(snap) if snap.status != issue.status_name() => {
                    detection.status_changes.push(StatusChange {
                        key: key.to_string(),
                        previous_status: snap.status.clone(),
                        current_status: issue.status_name().to_string(),
                        previous_category: snap.status_category.clone(),
                        current_category: issue.status_category(),
                    });
                }
                Some(_) => {}
            }
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for snap in &checkpoint.issues {
            if !current.contains_key(snap.key.as_str()) && seen.insert(snap.key.as_str()) {
                detection.removed_issues.push(RemovedIssue {
                    key: snap.key.clone(),
                    last_status: snap.status.clone(),
                    summary: snap.summary.clone(),
                });
            }
        }

        detection.has_changes = detection.change_count() > 0;
        detection
    }
}

/// Tracks checkpoints and unacknowledged changes per query id.
#[derive(Debug)]
pub struct ChangeTracker<S: KeyValueStore> {
    settings: TrackingSettings,
    store: S,
    checkpoints: BTreeMap<String, QueryCheckpoint>,
    pending: BTreeMap<String, bool>,
    last_detection: HashMap<String, ChangeDetection>,
}

impl<S: KeyValueStore> ChangeTracker<S> {
    /// Load persisted checkpoints and pending flags from `store`.
    ///
    /// Unreadable or corrupt data is logged and treated as empty.
    pub fn load(store: S, settings: TrackingSettings) -> Self {
        let checkpoints = read_map(&store, CHECKPOINTS_KEY);
        let pending = read_map(&store, PENDING_CHANGES_KEY);
        debug!(
            checkpoints = checkpoints.len(),
            pending = pending.len(),
            enabled = settings.enabled,
            "Loaded change tracker state"
        );
        Self {
            settings,
            store,
            checkpoints,
            pending,
            last_detection: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &TrackingSettings {
        &self.settings
    }

    pub const fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
    }

    pub const fn set_activity_period(&mut self, period: ActivityPeriod) {
        self.settings.activity_period = period;
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Direct access for state that shares the store, such as expanded keys.
    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Diff `issues` against the checkpoint for `query_id`.
    pub fn detect_changes(&mut self, query_id: &str, issues: &[Issue]) -> ChangeDetection {
        self.detect_changes_at(query_id, issues, Utc::now())
    }

    /// [`Self::detect_changes`] with an explicit clock.
    ///
    /// Disabled tracking returns an empty result without touching any
    /// state. The first detection for a query saves the current set as its
    /// baseline and reports no changes.
    pub fn detect_changes_at(
        &mut self,
        query_id: &str,
        issues: &[Issue],
        now: DateTime<Utc>,
    ) -> ChangeDetection {
        if !self.settings.enabled {
            return ChangeDetection::default();
        }

        let Some(checkpoint) = self.checkpoints.get(query_id) else {
            info!(query_id, issues = issues.len(), "Created baseline checkpoint");
            self.save_checkpoint_at(query_id, issues, now);
            return ChangeDetection::default();
        };

        let detection = ChangeDetection::between(checkpoint, issues);
        debug!(
            query_id,
            new = detection.new_issues.len(),
            removed = detection.removed_issues.len(),
            status_changed = detection.status_changes.len(),
            "Detected changes"
        );

        if detection.has_changes && !self.has_pending_changes(query_id) {
            let mut pending = self.pending.clone();
            pending.insert(query_id.to_string(), true);
            self.pending = pending;
            self.persist_pending();
        }
        self.last_detection
            .insert(query_id.to_string(), detection.clone());
        detection
    }

    /// Replace the checkpoint for `query_id` with the current issues.
    pub fn save_checkpoint(&mut self, query_id: &str, issues: &[Issue]) {
        self.save_checkpoint_at(query_id, issues, Utc::now());
    }

    /// [`Self::save_checkpoint`] with an explicit clock.
    ///
    /// Clears the pending flag and the remembered detection. No-op while
    /// tracking is disabled.
    pub fn save_checkpoint_at(&mut self, query_id: &str, issues: &[Issue], now: DateTime<Utc>) {
        if !self.settings.enabled {
            return;
        }

        let mut checkpoints = self.checkpoints.clone();
        checkpoints.insert(query_id.to_string(), QueryCheckpoint::capture(issues, now));
        self.checkpoints = checkpoints;
        self.persist_checkpoints();

        self.clear_pending(query_id);
        self.last_detection.remove(query_id);
        debug!(query_id, issues = issues.len(), "Saved checkpoint");
    }

    /// Forget the checkpoint for `query_id`; the next detection starts a new
    /// baseline. Returns whether a checkpoint existed.
    pub fn clear_checkpoint(&mut self, query_id: &str) -> bool {
        if !self.checkpoints.contains_key(query_id) {
            return false;
        }
        let mut checkpoints = self.checkpoints.clone();
        checkpoints.remove(query_id);
        self.checkpoints = checkpoints;
        self.persist_checkpoints();

        self.clear_pending(query_id);
        self.last_detection.remove(query_id);
        true
    }

    /// Forget every checkpoint and pending flag. Returns how many
    /// checkpoints were dropped.
    pub fn clear_all(&mut self) -> usize {
        let count = self.checkpoints.len();
        self.checkpoints = BTreeMap::new();
        self.pending = BTreeMap::new();
        self.last_detection.clear();
        self.persist_checkpoints();
        self.persist_pending();
        count
    }

    #[must_use]
    pub fn has_checkpoint(&self, query_id: &str) -> bool {
        self.checkpoints.contains_key(query_id)
    }

    #[must_use]
    pub fn checkpoint(&self, query_id: &str) -> Option<&QueryCheckpoint> {
        self.checkpoints.get(query_id)
    }

    /// All checkpoints, ordered by query id.
    pub fn checkpoints(&self) -> impl Iterator<Item = (&str, &QueryCheckpoint)> {
        self.checkpoints.iter().map(|(id, cp)| (id.as_str(), cp))
    }

    #[must_use]
    pub fn time_since_checkpoint(&self, query_id: &str) -> Option<Duration> {
        self.time_since_checkpoint_at(query_id, Utc::now())
    }

    #[must_use]
    pub fn time_since_checkpoint_at(&self, query_id: &str, now: DateTime<Utc>) -> Option<Duration> {
        self.checkpoints
            .get(query_id)
            .map(|cp| now.signed_duration_since(cp.timestamp))
    }

    #[must_use]
    pub fn has_pending_changes(&self, query_id: &str) -> bool {
        self.pending.get(query_id).copied().unwrap_or(false)
    }

    /// Query ids with unacknowledged changes.
    #[must_use]
    pub fn pending_queries(&self) -> Vec<&str> {
        self.pending
            .iter()
            .filter(|(_, flag)| **flag)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// The most recent detection for `query_id` in this session.
    #[must_use]
    pub fn last_detection(&self, query_id: &str) -> Option<&ChangeDetection> {
        self.last_detection.get(query_id)
    }

    fn clear_pending(&mut self, query_id: &str) {
        if !self.pending.contains_key(query_id) {
            return;
        }
        let mut pending = self.pending.clone();
        pending.remove(query_id);
        self.pending = pending;
        self.persist_pending();
    }

    fn persist_checkpoints(&mut self) {
        persist(&mut self.store, CHECKPOINTS_KEY, &self.checkpoints);
    }

    fn persist_pending(&mut self) {
        persist(&mut self.store, PENDING_CHANGES_KEY, &self.pending);
    }
}

fn read_map<S, T>(store: &S, key: &str) -> BTreeMap<String, T>
where
    S: KeyValueStore,
    T: DeserializeOwned,
{
    match store.get(key) {
        Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|err| {
            warn!(key, error = %err, "Ignoring malformed tracker state");
            BTreeMap::new()
        }),
        Ok(None) => BTreeMap::new(),
        Err(err) => {
            warn!(key, error = %err, "Failed to read tracker state");
            BTreeMap::new()
        }
    }
}

fn persist<S: KeyValueStore, T: Serialize>(store: &mut S, key: &str, value: &T) {
    let result = serde_json::to_value(value)
        .map_err(crate::error::CanopyError::from)
        .and_then(|json| store.set(key, &json));
    if let Err(err) = result {
        warn!(key, error = %err, "Failed to persist tracker state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;
    use serde_json::json;

    fn issue(key: &str, status: &str) -> Issue {
        let category = if status == "Done" { "done" } else { "new" };
        Issue::new(key).with_status(status, category)
    }

    fn tracker() -> ChangeTracker<MemoryStore> {
        ChangeTracker::load(MemoryStore::new(), TrackingSettings::default())
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_first_detection_creates_baseline() {
        let mut tracker = tracker();
        let issues = vec![issue("A", "Open")];

        let detection = tracker.detect_changes_at("q", &issues, t0());

        assert!(!detection.has_changes);
        assert!(tracker.has_checkpoint("q"));
        assert!(!tracker.has_pending_changes("q"));
        assert_eq!(tracker.checkpoint("q").unwrap().timestamp, t0());
        assert!(tracker.store().get(CHECKPOINTS_KEY).unwrap().is_some());
    }

    #[test]
    fn test_new_removed_and_status_changes() {
        let mut tracker = tracker();
        tracker.save_checkpoint_at("q", &[issue("A", "Open"), issue("B", "Open")], t0());

        let detection =
            tracker.detect_changes_at("q", &[issue("A", "Done"), issue("C", "Open")], t0());

        assert!(detection.has_changes);
        assert_eq!(detection.new_issues, vec!["C".to_string()]);
        assert_eq!(
            detection.removed_issues,
            vec![RemovedIssue {
                key: "B".to_string(),
                last_status: "Open".to_string(),
                summary: None,
            }]
        );
        assert_eq!(detection.status_changes.len(), 1);
        let change = &detection.status_changes[0];
        assert_eq!(change.key, "A");
        assert_eq!(change.previous_status, "Open");
        assert_eq!(change.current_status, "Done");
        assert_eq!(change.previous_category, StatusCategory::New);
        assert_eq!(change.current_category, StatusCategory::Done);
        assert_eq!(detection.checkpoint_timestamp, Some(t0()));
    }

    #[test]
    fn test_detection_does_not_move_baseline() {
        let mut tracker = tracker();
        tracker.save_checkpoint_at("q", &[issue("A", "Open")], t0());

        let current = vec![issue("A", "Open"), issue("B", "Open")];
        tracker.detect_changes_at("q", &current, t0());
        let again = tracker.detect_changes_at("q", &current, t0());

        assert_eq!(again.new_issues, vec!["B".to_string()]);
        assert_eq!(tracker.checkpoint("q").unwrap().issues.len(), 1);
    }

    #[test]
    fn test_pending_flag_lifecycle() {
        let mut tracker = tracker();
        tracker.save_checkpoint_at("q", &[issue("A", "Open")], t0());

        tracker.detect_changes_at("q", &[issue("A", "Done")], t0());
        assert!(tracker.has_pending_changes("q"));
        assert_eq!(tracker.pending_queries(), vec!["q"]);
        assert!(tracker.last_detection("q").is_some());
        assert_eq!(
            tracker.store().get(PENDING_CHANGES_KEY).unwrap(),
            Some(json!({"q": true}))
        );

        tracker.save_checkpoint_at("q", &[issue("A", "Done")], t0());
        assert!(!tracker.has_pending_changes("q"));
        assert!(tracker.last_detection("q").is_none());
        assert!(!tracker.detect_changes_at("q", &[issue("A", "Done")], t0()).has_changes);
    }

    #[test]
    fn test_disabled_tracking_is_inert() {
        let mut tracker = ChangeTracker::load(
            MemoryStore::new(),
            TrackingSettings {
                enabled: false,
                ..TrackingSettings::default()
            },
        );

        let detection = tracker.detect_changes_at("q", &[issue("A", "Open")], t0());
        assert_eq!(detection, ChangeDetection::default());
        tracker.save_checkpoint_at("q", &[issue("A", "Open")], t0());
        assert!(!tracker.has_checkpoint("q"));
        assert!(tracker.store().get(CHECKPOINTS_KEY).unwrap().is_none());
    }

    #[test]
    fn test_state_survives_reload() {
        let mut tracker = tracker();
        tracker.save_checkpoint_at("q", &[issue("A", "Open")], t0());
        tracker.detect_changes_at("q", &[issue("A", "Done")], t0());

        let reloaded = ChangeTracker::load(tracker.into_store(), TrackingSettings::default());
        assert!(reloaded.has_checkpoint("q"));
        assert!(reloaded.has_pending_changes("q"));
        assert!(reloaded.last_detection("q").is_none());
        assert_eq!(
            reloaded.time_since_checkpoint_at("q", t0() + Duration::hours(2)),
            Some(Duration::hours(2))
        );
    }

    #[test]
    fn test_corrupt_state_loads_empty() {
        let store = MemoryStore::new()
            .with_value(CHECKPOINTS_KEY, json!(["not", "a", "map"]))
            .with_value(PENDING_CHANGES_KEY, json!({"q": "yes"}));
        let tracker = ChangeTracker::load(store, TrackingSettings::default());
        assert!(!tracker.has_checkpoint("q"));
        assert!(!tracker.has_pending_changes("q"));
    }

    #[test]
    fn test_write_failures_keep_memory_state() {
        let mut tracker = ChangeTracker::load(MemoryStore::failing(), TrackingSettings::default());
        tracker.save_checkpoint_at("q", &[issue("A", "Open")], t0());
        assert!(tracker.has_checkpoint("q"));

        tracker.detect_changes_at("q", &[issue("B", "Open")], t0());
        assert!(tracker.has_pending_changes("q"));
    }

    #[test]
    fn test_clear_checkpoint_and_all() {
        let mut tracker = tracker();
        tracker.save_checkpoint_at("q1", &[issue("A", "Open")], t0());
        tracker.save_checkpoint_at("q2", &[issue("A", "Open")], t0());
        tracker.detect_changes_at("q2", &[], t0());

        assert!(tracker.clear_checkpoint("q2"));
        assert!(!tracker.clear_checkpoint("q2"));
        assert!(!tracker.has_pending_changes("q2"));
        assert!(tracker.has_checkpoint("q1"));

        assert_eq!(tracker.clear_all(), 1);
        assert!(!tracker.has_checkpoint("q1"));
        assert_eq!(tracker.checkpoints().count(), 0);
    }

    #[test]
    fn test_duplicate_keys_in_current_set() {
        let checkpoint = QueryCheckpoint::capture(&[issue("A", "Open")], t0());
        let detection = ChangeDetection::between(
            &checkpoint,
            &[issue("B", "Open"), issue("B", "Open"), issue("A", "Open")],
        );
        assert_eq!(detection.new_issues, vec!["B".to_string()]);
        assert!(detection.status_changes.is_empty());
    }
}
