//! Engine configuration structures
//!
//! Values here describe the process (where state lives, how HTTP and
//! triggers behave, how logs are emitted). User-facing sync settings such
//! as endpoints and schedules live in the settings store instead.

use serde::{Deserialize, Serialize};

use crate::constants::HTTP_TIMEOUT_SECS;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// SQLite settings store location and pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "healthhook.db".to_string(), pool_size: default_pool_size() }
    }
}

fn default_pool_size() -> u32 {
    4
}

/// Outbound webhook client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Connect, read and write timeout applied to each attempt.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: default_timeout_secs(), user_agent: None }
    }
}

fn default_timeout_secs() -> u64 {
    HTTP_TIMEOUT_SECS
}

/// How exactly triggers fire relative to their wall-clock target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirePrecision {
    /// Fire at the wall-clock instant, re-checking the clock while waiting.
    #[default]
    Precise,
    /// Hand the delay to a job scheduler and accept its jitter.
    BestEffort,
}

/// Trigger backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default)]
    pub precision: FirePrecision,
}

/// Tracing subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_log_filter(), json: false }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}
