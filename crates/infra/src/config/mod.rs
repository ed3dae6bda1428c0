//! Configuration loading
//!
//! Loads [`healthhook_domain::EngineConfig`] from environment variables
//! (optionally seeded from a `.env` file) or from a JSON/TOML file.

pub mod loader;

pub use loader::{discover_config_path, load, load_from_env, load_from_file, validate};
