//! Issue sets shared by the integration tests.

use canopy::model::Issue;
use chrono::{Duration, Utc};

/// Epic with two stories, one subtask, and a bug outside the epic.
///
/// ```text
/// SHOP-1 Epic
///   SHOP-2 Story
///     SHOP-4 Sub-task
///   SHOP-3 Story
/// SHOP-5 Bug
/// ```
pub fn shop_board() -> Vec<Issue> {
    let now = Utc::now();
    vec![
        Issue::new("SHOP-1")
            .with_summary("Checkout redesign")
            .with_type("Epic", false)
            .with_status("In Progress", "indeterminate")
            .with_updated(now - Duration::days(3)),
        Issue::new("SHOP-2")
            .with_summary("Cart page")
            .with_type("Story", false)
            .with_status("Open", "new")
            .with_parent("SHOP-1")
            .with_updated(now - Duration::hours(2)),
        Issue::new("SHOP-3")
            .with_summary("Payment page")
            .with_type("Story", false)
            .with_status("Open", "new")
            .with_parent("SHOP-1")
            .with_updated(now - Duration::days(10)),
        Issue::new("SHOP-4")
            .with_summary("Cart totals")
            .with_type("Sub-task", true)
            .with_status("Open", "new")
            .with_parent("SHOP-2")
            .with_updated(now - Duration::days(2)),
        Issue::new("SHOP-5")
            .with_summary("Broken coupon field")
            .with_type("Bug", false)
            .with_status("Open", "new")
            .with_updated(now - Duration::days(5)),
    ]
}

/// Replace the status of `key` in `issues`.
pub fn with_status(mut issues: Vec<Issue>, key: &str, status: &str, category: &str) -> Vec<Issue> {
    for issue in &mut issues {
        if issue.key == key {
            *issue = issue.clone().with_status(status, category);
        }
    }
    issues
}
