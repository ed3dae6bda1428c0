//! Error types used throughout the engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main infrastructure-facing error type for HealthHook
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum HealthHookError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Data source error: {0}")]
    Source(String),

    #[error("Scheduling error: {0}")]
    Scheduling(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for HealthHook infrastructure operations
pub type Result<T> = std::result::Result<T, HealthHookError>;

/// Outcome of a single HTTP attempt that did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptFailure {
    /// The endpoint answered with a non-2xx status.
    #[error("HTTP {code}: {reason}")]
    Status { code: u16, reason: String },

    /// Connect, read or write exceeded the per-attempt timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Any other transport failure (DNS, refused connection, TLS, ...).
    #[error("{0}")]
    Transport(String),
}

impl AttemptFailure {
    /// HTTP status code carried by the failure, if the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            Self::Timeout(_) | Self::Transport(_) => None,
        }
    }
}

/// Failure of a whole delivery call across all configured endpoints.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("No webhook URLs configured")]
    NoEndpoints,

    /// Every endpoint exhausted its retries; carries the last endpoint's
    /// last error.
    #[error("Delivery to {url} failed: {last_error}")]
    EndpointDeliveryFailed { url: String, last_error: AttemptFailure },
}

/// Errors surfaced by a sync pass or by the trigger configuration paths.
///
/// `NoData` is deliberately absent: an empty pass is a successful
/// [`crate::SyncResult::NoData`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("No webhook endpoints configured")]
    NoEndpointsConfigured,

    #[error("Health data source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Permission to read health data is missing")]
    PermissionMissing,

    #[error(transparent)]
    EndpointDeliveryFailed(DeliveryError),

    #[error("All deliveries failed ({failed_types} metric type(s)); last error: {last}")]
    AllDeliveriesFailed { failed_types: usize, last: DeliveryError },

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("A sync is already in progress")]
    SyncInProgress,

    #[error(transparent)]
    Infrastructure(HealthHookError),
}

impl SyncError {
    /// Stable label suitable for structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoEndpointsConfigured => "no_endpoints",
            Self::SourceUnavailable(_) => "source_unavailable",
            Self::PermissionMissing => "permission_missing",
            Self::EndpointDeliveryFailed(_) => "endpoint_delivery_failed",
            Self::AllDeliveriesFailed { .. } => "all_deliveries_failed",
            Self::ConfigInvalid(_) => "config_invalid",
            Self::SyncInProgress => "sync_in_progress",
            Self::Infrastructure(_) => "infrastructure",
        }
    }
}

impl From<HealthHookError> for SyncError {
    fn from(err: HealthHookError) -> Self {
        match err {
            HealthHookError::Config(message) | HealthHookError::InvalidInput(message) => {
                Self::ConfigInvalid(message)
            }
            HealthHookError::Source(message) => Self::SourceUnavailable(message),
            other => Self::Infrastructure(other),
        }
    }
}

impl From<DeliveryError> for SyncError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::NoEndpoints => Self::NoEndpointsConfigured,
            other => Self::EndpointDeliveryFailed(other),
        }
    }
}

/// Errors returned by a metric source when reading records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Read permission missing for {0}")]
    PermissionMissing(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}
