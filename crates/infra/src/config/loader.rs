//! Configuration loader
//!
//! Loads engine configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Seeds the process environment from a `.env` file when one exists
//! 2. Attempts to load from environment variables (`HEALTHHOOK_DB_PATH` must
//!    be set for this to apply)
//! 3. Otherwise searches several paths for a JSON or TOML config file
//! 4. Falls back to built-in defaults when no file is found
//!
//! ## Environment Variables
//! - `HEALTHHOOK_DB_PATH`: Settings database file path (required)
//! - `HEALTHHOOK_DB_POOL_SIZE`: Connection pool size
//! - `HEALTHHOOK_HTTP_TIMEOUT_SECS`: Per-attempt webhook timeout
//! - `HEALTHHOOK_HTTP_USER_AGENT`: User-Agent header for webhook requests
//! - `HEALTHHOOK_FIRE_PRECISION`: `precise` or `best_effort`
//! - `HEALTHHOOK_LOG_FILTER`: Default tracing filter directive
//! - `HEALTHHOOK_LOG_JSON`: Emit JSON log lines (true/false)
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./healthhook.{toml,json}` or `./config.{toml,json}`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names relative to the executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use healthhook_domain::{
    DatabaseConfig, EngineConfig, FirePrecision, HealthHookError, HttpConfig, LoggingConfig,
    Result, SchedulingConfig,
};

const FILE_NAMES: [&str; 4] = ["healthhook.toml", "healthhook.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `HealthHookError::Config` if an environment value or the chosen
/// file is malformed, or if the resulting configuration fails [`validate`].
pub fn load() -> Result<EngineConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = %e, "Environment incomplete, trying file");
            match discover_config_path() {
                Some(path) => load_from_file(Some(path))?,
                None => {
                    tracing::info!("No config file found, using defaults");
                    EngineConfig::default()
                }
            }
        }
    };

    validate(&config)?;
    Ok(config)
}

/// Load configuration from `HEALTHHOOK_*` environment variables
///
/// Only the database path is required; every other value falls back to its
/// default.
///
/// # Errors
/// Returns `HealthHookError::Config` if `HEALTHHOOK_DB_PATH` is missing or a
/// value does not parse.
pub fn load_from_env() -> Result<EngineConfig> {
    let path = env_var("HEALTHHOOK_DB_PATH")?;
    let defaults = EngineConfig::default();

    let pool_size = env_parse("HEALTHHOOK_DB_POOL_SIZE")?.unwrap_or(defaults.database.pool_size);
    let timeout_secs =
        env_parse("HEALTHHOOK_HTTP_TIMEOUT_SECS")?.unwrap_or(defaults.http.timeout_secs);
    let user_agent = std::env::var("HEALTHHOOK_HTTP_USER_AGENT").ok();
    let precision = match std::env::var("HEALTHHOOK_FIRE_PRECISION") {
        Ok(value) => parse_precision(&value)?,
        Err(_) => defaults.scheduling.precision,
    };
    let filter = std::env::var("HEALTHHOOK_LOG_FILTER").unwrap_or(defaults.logging.filter);
    let json = env_bool("HEALTHHOOK_LOG_JSON", defaults.logging.json);

    Ok(EngineConfig {
        database: DatabaseConfig { path, pool_size },
        http: HttpConfig { timeout_secs, user_agent },
        scheduling: SchedulingConfig { precision },
        logging: LoggingConfig { filter, json },
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations. Format is detected
/// by file extension.
///
/// # Errors
/// Returns `HealthHookError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<EngineConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(HealthHookError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => discover_config_path().ok_or_else(|| {
            HealthHookError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| HealthHookError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Reject values the engine cannot run with.
///
/// # Errors
/// Returns `HealthHookError::Config` naming the offending field.
pub fn validate(config: &EngineConfig) -> Result<()> {
    if config.database.path.trim().is_empty() {
        return Err(HealthHookError::Config("database.path must not be empty".into()));
    }
    if config.database.pool_size == 0 {
        return Err(HealthHookError::Config("database.pool_size must be at least 1".into()));
    }
    if config.http.timeout_secs == 0 {
        return Err(HealthHookError::Config("http.timeout_secs must be at least 1".into()));
    }
    Ok(())
}

fn parse_config(contents: &str, path: &Path) -> Result<EngineConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| HealthHookError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| HealthHookError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(HealthHookError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Search the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn discover_config_path() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend([exe_dir.to_path_buf(), exe_dir.join(".."), exe_dir.join("../..")]);
        }
    }

    search_roots(&roots)
}

fn search_roots(roots: &[PathBuf]) -> Option<PathBuf> {
    roots
        .iter()
        .flat_map(|root| FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn parse_precision(value: &str) -> Result<FirePrecision> {
    match value.trim().to_ascii_lowercase().as_str() {
        "precise" => Ok(FirePrecision::Precise),
        "best_effort" | "best-effort" => Ok(FirePrecision::BestEffort),
        other => Err(HealthHookError::Config(format!("Invalid fire precision: {other}"))),
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        HealthHookError::Config(format!("Missing required environment variable: {key}"))
    })
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| HealthHookError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
