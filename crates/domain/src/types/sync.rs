//! Results of a sync pass

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metric::MetricType;
use crate::constants::{NO_DATA_MESSAGE, SYNC_COMPLETED_MESSAGE};

/// Outcome of a successful sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    /// No enabled type had records newer than its checkpoint.
    NoData,
    /// Per-type counts of records delivered in this pass.
    Success(BTreeMap<MetricType, usize>),
}

impl SyncResult {
    /// `"<count> <type-name-lowercase>"` joined by `", "`.
    pub fn summary(&self) -> String {
        match self {
            Self::NoData => String::new(),
            Self::Success(counts) => counts
                .iter()
                .map(|(metric, count)| {
                    format!("{count} {}", metric.display_name().to_lowercase())
                })
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// User-facing message for the pass.
    pub fn message(&self) -> String {
        match self {
            Self::NoData => NO_DATA_MESSAGE.to_string(),
            Self::Success(counts) if counts.is_empty() => SYNC_COMPLETED_MESSAGE.to_string(),
            Self::Success(_) => format!("Synced {}", self.summary()),
        }
    }

    pub fn total_records(&self) -> usize {
        match self {
            Self::NoData => 0,
            Self::Success(counts) => counts.values().sum(),
        }
    }
}

/// Timestamp and summary of the last sync that delivered anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSync {
    pub at: DateTime<Utc>,
    pub summary: String,
}
