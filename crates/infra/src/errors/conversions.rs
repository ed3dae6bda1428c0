//! Conversions from external infrastructure errors into domain errors.

use healthhook_domain::HealthHookError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub HealthHookError);

impl From<InfraError> for HealthHookError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<HealthHookError> for InfraError {
    fn from(value: HealthHookError) -> Self {
        InfraError(value)
    }
}

trait IntoHealthHookError {
    fn into_healthhook(self) -> HealthHookError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → HealthHookError */
/* -------------------------------------------------------------------------- */

impl IntoHealthHookError for SqlError {
    fn into_healthhook(self) -> HealthHookError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => HealthHookError::Storage("database is busy".into()),
                    ErrorCode::DatabaseLocked => {
                        HealthHookError::Storage("database is locked".into())
                    }
                    ErrorCode::NotADatabase => {
                        HealthHookError::Storage("file is not a SQLite database".into())
                    }
                    _ => HealthHookError::Storage(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                HealthHookError::NotFound("no rows returned by query".into())
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                HealthHookError::Storage(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                HealthHookError::Storage(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => HealthHookError::Config(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => HealthHookError::Storage(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_healthhook())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → HealthHookError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(HealthHookError::Storage(format!("connection pool: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → HealthHookError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(HealthHookError::Internal(format!("json encoding failed: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* tokio::task::JoinError → HealthHookError */
/* -------------------------------------------------------------------------- */

impl From<tokio::task::JoinError> for InfraError {
    fn from(value: tokio::task::JoinError) -> Self {
        InfraError(HealthHookError::Internal(format!("blocking task failed: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → HealthHookError */
/* -------------------------------------------------------------------------- */

impl IntoHealthHookError for HttpError {
    fn into_healthhook(self) -> HealthHookError {
        if self.is_timeout() {
            return HealthHookError::Network("HTTP request timed out".into());
        }

        if self.is_builder() {
            return HealthHookError::Config(format!("invalid HTTP client setup: {self}"));
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return HealthHookError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            return HealthHookError::Network(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status")
            ));
        }

        HealthHookError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_healthhook())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
