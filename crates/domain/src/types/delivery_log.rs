//! Delivery log entries and the capped, newest-first log buffer

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metric::MetricType;
use crate::constants::MAX_DELIVERY_LOG_ENTRIES;

/// Metric context attached to every log entry written for one delivery call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryContext {
    pub metric_type: Option<MetricType>,
    pub record_count: Option<usize>,
}

impl DeliveryContext {
    /// Context for a delivery carrying `record_count` records of one type.
    pub fn for_metric(metric_type: MetricType, record_count: usize) -> Self {
        Self { metric_type: Some(metric_type), record_count: Some(record_count) }
    }
}

/// Final outcome of one endpoint's attempt sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub status_code: Option<u16>,
    pub success: bool,
    pub error_message: Option<String>,
    pub data_type: Option<MetricType>,
    pub record_count: Option<usize>,
}

impl DeliveryLogEntry {
    /// Entry for a successful attempt sequence.
    pub fn success(
        url: impl Into<String>,
        started_at: DateTime<Utc>,
        status_code: u16,
        context: DeliveryContext,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: started_at,
            url: url.into(),
            status_code: Some(status_code),
            success: true,
            error_message: None,
            data_type: context.metric_type,
            record_count: context.record_count,
        }
    }

    /// Entry for an attempt sequence that exhausted its retries.
    pub fn failure(
        url: impl Into<String>,
        started_at: DateTime<Utc>,
        status_code: Option<u16>,
        error_message: impl Into<String>,
        context: DeliveryContext,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: started_at,
            url: url.into(),
            status_code,
            success: false,
            error_message: Some(error_message.into()),
            data_type: context.metric_type,
            record_count: context.record_count,
        }
    }
}

/// Append-only delivery log, newest first, bounded to a fixed capacity.
///
/// Pushing beyond capacity silently evicts the oldest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryLog {
    entries: VecDeque<DeliveryLogEntry>,
    capacity: usize,
}

impl Default for DeliveryLog {
    fn default() -> Self {
        Self::with_capacity(MAX_DELIVERY_LOG_ENTRIES)
    }
}

impl DeliveryLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: VecDeque::with_capacity(capacity), capacity }
    }

    /// Rebuild a log from entries already ordered newest first.
    pub fn from_entries(entries: Vec<DeliveryLogEntry>) -> Self {
        let mut log = Self::default();
        log.entries = entries.into_iter().take(log.capacity).collect();
        log
    }

    /// Append an entry, evicting the oldest once full.
    pub fn push(&mut self, entry: DeliveryLogEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &DeliveryLogEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<DeliveryLogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
