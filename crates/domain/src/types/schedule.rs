//! Sync modes and fixed-time scheduled triggers

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{MIN_SYNC_INTERVAL_MINUTES, SCHEDULED_TRIGGER_KEY_PREFIX};
use crate::errors::SyncError;
use crate::impl_domain_enum_conversions;

/// Which of the two mutually exclusive trigger strategies is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SyncMode {
    /// One recurring trigger every `period_minutes` (at least 15).
    Interval { period_minutes: u32 },
    /// One daily single-shot trigger per enabled [`ScheduledTrigger`].
    Scheduled,
}

impl SyncMode {
    /// Interval mode with a validated period.
    pub fn interval(period_minutes: u32) -> Result<Self, SyncError> {
        validate_interval_minutes(period_minutes)?;
        Ok(Self::Interval { period_minutes })
    }

    pub fn kind(&self) -> SyncModeKind {
        match self {
            Self::Interval { .. } => SyncModeKind::Interval,
            Self::Scheduled => SyncModeKind::Scheduled,
        }
    }

    /// Reject interval periods outside the allowed range.
    pub fn validate(&self) -> Result<(), SyncError> {
        match self {
            Self::Interval { period_minutes } => validate_interval_minutes(*period_minutes),
            Self::Scheduled => Ok(()),
        }
    }
}

/// Persisted tag of [`SyncMode`]; the interval length is stored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncModeKind {
    #[default]
    Interval,
    Scheduled,
}

impl_domain_enum_conversions!(SyncModeKind {
    Interval => "interval",
    Scheduled => "scheduled",
});

/// Reject interval periods shorter than the platform minimum.
pub fn validate_interval_minutes(minutes: u32) -> Result<(), SyncError> {
    if minutes < MIN_SYNC_INTERVAL_MINUTES {
        return Err(SyncError::ConfigInvalid(format!(
            "sync interval must be at least {MIN_SYNC_INTERVAL_MINUTES} minutes (got {minutes})"
        )));
    }
    Ok(())
}

/// A user-defined daily sync time.
///
/// `id` is permanent and is the handle used for registration and
/// cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTrigger {
    pub id: String,
    pub hour: u32,
    pub minute: u32,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ScheduledTrigger {
    /// Create an enabled trigger with a fresh id.
    pub fn new(hour: u32, minute: u32, label: impl Into<String>) -> Result<Self, SyncError> {
        let trigger = Self {
            id: Uuid::new_v4().to_string(),
            hour,
            minute,
            label: label.into(),
            enabled: true,
        };
        trigger.validate()?;
        Ok(trigger)
    }

    /// Reject out-of-range hours or minutes and an empty id.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.hour > 23 || self.minute > 59 {
            return Err(SyncError::ConfigInvalid(format!(
                "invalid trigger time {:02}:{:02}",
                self.hour, self.minute
            )));
        }
        if self.id.trim().is_empty() {
            return Err(SyncError::ConfigInvalid("trigger id must not be empty".into()));
        }
        Ok(())
    }

    /// `HH:MM`
    pub fn display_time(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }

    pub fn display_label(&self) -> String {
        if self.label.trim().is_empty() {
            self.display_time()
        } else {
            self.label.clone()
        }
    }

    /// Registration key used with trigger backends.
    pub fn registration_key(&self) -> String {
        scheduled_trigger_key(&self.id)
    }
}

/// Backend key for a scheduled trigger.
pub fn scheduled_trigger_key(id: &str) -> String {
    format!("{SCHEDULED_TRIGGER_KEY_PREFIX}{id}")
}

/// Inverse of [`scheduled_trigger_key`].
pub fn scheduled_trigger_id(key: &str) -> Option<&str> {
    key.strip_prefix(SCHEDULED_TRIGGER_KEY_PREFIX)
}
