//! SQLite persistence

pub mod manager;
pub mod settings_store;

pub use manager::{DbManager, SqliteConnection, SqlitePool};
pub use settings_store::SqliteSettingsStore;
