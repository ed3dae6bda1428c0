//! Health metric types and the records read from the data source

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of health metric the engine can read and forward.
///
/// Declaration order is the natural sync order used by `BTreeSet`/`BTreeMap`
/// collections of metric types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricType {
    Steps,
    Sleep,
    HeartRate,
    Distance,
    ActiveCaloriesBurned,
    TotalCaloriesBurned,
    Weight,
    Exercise,
}

impl MetricType {
    /// Every supported metric type, in natural order.
    pub const ALL: [Self; 8] = [
        Self::Steps,
        Self::Sleep,
        Self::HeartRate,
        Self::Distance,
        Self::ActiveCaloriesBurned,
        Self::TotalCaloriesBurned,
        Self::Weight,
        Self::Exercise,
    ];

    /// Stable read-permission identifier granted by the health data provider.
    pub fn capability(self) -> &'static str {
        match self {
            Self::Steps => "android.permission.health.READ_STEPS",
            Self::Sleep => "android.permission.health.READ_SLEEP",
            Self::HeartRate => "android.permission.health.READ_HEART_RATE",
            Self::Distance => "android.permission.health.READ_DISTANCE",
            Self::ActiveCaloriesBurned => "android.permission.health.READ_ACTIVE_CALORIES_BURNED",
            Self::TotalCaloriesBurned => "android.permission.health.READ_TOTAL_CALORIES_BURNED",
            Self::Weight => "android.permission.health.READ_WEIGHT",
            Self::Exercise => "android.permission.health.READ_EXERCISE",
        }
    }

    /// Label shown to users and used in sync summaries.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Steps => "Steps",
            Self::Sleep => "Sleep",
            Self::HeartRate => "Heart Rate",
            Self::Distance => "Distance",
            Self::ActiveCaloriesBurned => "Active Calories",
            Self::TotalCaloriesBurned => "Total Calories",
            Self::Weight => "Weight",
            Self::Exercise => "Exercise",
        }
    }

    /// snake_case key used in payloads and settings keys.
    pub fn key(self) -> &'static str {
        match self {
            Self::Steps => "steps",
            Self::Sleep => "sleep",
            Self::HeartRate => "heart_rate",
            Self::Distance => "distance",
            Self::ActiveCaloriesBurned => "active_calories_burned",
            Self::TotalCaloriesBurned => "total_calories_burned",
            Self::Weight => "weight",
            Self::Exercise => "exercise",
        }
    }

    /// Resolve a metric type from its capability identifier.
    pub fn from_capability(capability: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|metric| metric.capability() == capability)
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for MetricType {
    type Err = String;

    /// Accepts the snake_case key or the persisted SCREAMING_SNAKE_CASE name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|metric| metric.key() == normalized)
            .ok_or_else(|| format!("Invalid MetricType: {s}"))
    }
}

/// One record read from the health data source.
///
/// The engine never interprets `fields`; it forwards them verbatim. Only
/// `recorded_at` matters for incremental fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Event time compared against the type's checkpoint.
    pub recorded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields: serde_json::Value,
}

impl MetricRecord {
    pub fn new(recorded_at: DateTime<Utc>, fields: serde_json::Value) -> Self {
        Self { recorded_at, end_time: None, fields }
    }

    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }
}

/// Installation state of the health data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceAvailability {
    Available,
    NotInstalled,
    UpdateRequired,
}

impl SourceAvailability {
    pub fn is_available(self) -> bool {
        matches!(self, Self::Available)
    }

    /// Message surfaced through `SyncError::SourceUnavailable`.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Available => "health data provider is available",
            Self::NotInstalled => "health data provider is not installed",
            Self::UpdateRequired => "health data provider needs an update",
        }
    }
}
