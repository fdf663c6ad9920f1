//! Recency window for highlighting recently updated issues.

use crate::error::CanopyError;
use crate::model::Issue;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActivityPeriod {
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "off")]
    Off,
}

impl ActivityPeriod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::Week => "7d",
            Self::Off => "off",
        }
    }

    /// Window length in milliseconds; `None` when highlighting is off.
    #[must_use]
    pub const fn threshold_ms(&self) -> Option<i64> {
        match self {
            Self::Day => Some(86_400_000),
            Self::Week => Some(604_800_000),
            Self::Off => None,
        }
    }

    #[must_use]
    pub fn threshold(&self) -> Option<Duration> {
        self.threshold_ms().map(Duration::milliseconds)
    }
}

impl fmt::Display for ActivityPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActivityPeriod {
    type Err = CanopyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "24h" | "1d" | "day" => Ok(Self::Day),
            "7d" | "1w" | "week" => Ok(Self::Week),
            "off" | "none" => Ok(Self::Off),
            _ => Err(CanopyError::InvalidActivityPeriod {
                period: s.to_string(),
            }),
        }
    }
}

/// User-facing tracking preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSettings {
    pub enabled: bool,
    pub activity_period: ActivityPeriod,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            activity_period: ActivityPeriod::Day,
        }
    }
}

/// Whether `issue` was updated within `period` of now.
#[must_use]
pub fn is_recently_updated(issue: &Issue, period: ActivityPeriod) -> bool {
    is_recently_updated_at(issue, period, Utc::now())
}

/// Whether `issue` was updated within `period` of `now`.
///
/// The window is inclusive: an issue updated exactly one period ago is
/// recent. Issues without an `updated` timestamp never are; timestamps in
/// the future always are.
#[must_use]
pub fn is_recently_updated_at(issue: &Issue, period: ActivityPeriod, now: DateTime<Utc>) -> bool {
    let Some(threshold) = period.threshold() else {
        return false;
    };
    issue
        .fields
        .updated
        .is_some_and(|updated| now.signed_duration_since(updated) <= threshold)
}
