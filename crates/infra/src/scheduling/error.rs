//! Trigger backend error types

use std::time::Duration;

use healthhook_domain::HealthHookError;
use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

use crate::errors::InfraError;

/// Backend-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Backend is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Backend is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// Failed to create the job scheduler
    #[error("Failed to create scheduler: {source}")]
    CreationFailed { source: JobSchedulerError },

    /// Failed to start the job scheduler
    #[error("Failed to start scheduler: {source}")]
    StartFailed { source: JobSchedulerError },

    /// Failed to shut the job scheduler down
    #[error("Failed to stop scheduler: {source}")]
    StopFailed { source: JobSchedulerError },

    /// Failed to add or remove a job
    #[error("Failed to register job for {key}: {source}")]
    JobRegistrationFailed { key: String, source: JobSchedulerError },

    /// Requested instant or period cannot be represented
    #[error("Invalid schedule for {key}: {reason}")]
    InvalidSchedule { key: String, reason: String },

    /// Operation timed out
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let domain_err = match err {
            SchedulerError::InvalidSchedule { .. } => {
                HealthHookError::InvalidInput(err.to_string())
            }
            _ => HealthHookError::Scheduling(err.to_string()),
        };
        InfraError(domain_err)
    }
}

impl From<SchedulerError> for HealthHookError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for backend lifecycle operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
