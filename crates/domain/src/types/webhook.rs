//! Webhook endpoint configuration and outbound payloads

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metric::{MetricRecord, MetricType};

/// A user-configured webhook destination.
///
/// Header names are unique; insertion order is irrelevant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl WebhookEndpoint {
    /// Endpoint without custom headers.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self { url: url.into(), headers: BTreeMap::new() }
    }

    /// Add or replace a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Remove a header if present.
    pub fn without_header(mut self, key: &str) -> Self {
        self.headers.remove(key);
        self
    }

    pub fn header_count(&self) -> usize {
        self.headers.len()
    }
}

/// JSON body POSTed to every endpoint for one metric type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub timestamp: DateTime<Utc>,
    pub data_type: MetricType,
    pub record_count: usize,
    pub records: Vec<MetricRecord>,
}

impl WebhookPayload {
    pub fn new(
        data_type: MetricType,
        records: Vec<MetricRecord>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self { timestamp, data_type, record_count: records.len(), records }
    }
}
