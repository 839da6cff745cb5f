//! Error types for the `PostgreSQL` adapters.
//!
//! [`DbError`] wraps the underlying [`sqlx`] errors. The supervisor only sees
//! [`StoreError`], so every adapter converts on the way out.

use tanktwin_core::store::StoreError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row holds a value the domain types cannot represent.
    #[error("Invalid stored value in {column}: {value}")]
    Decode {
        /// Column the value came from.
        column: &'static str,
        /// The offending value.
        value: String,
    },

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Postgres(
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_),
            ) => Self::Unavailable {
                reason: err.to_string(),
            },
            DbError::Decode { .. } => Self::Corrupt {
                reason: err.to_string(),
            },
            DbError::Postgres(_) | DbError::Migration(_) | DbError::Config(_) => Self::Backend {
                reason: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_exhaustion_is_unavailable() {
        let err: StoreError = DbError::Postgres(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }

    #[test]
    fn bad_rows_are_corrupt() {
        let err: StoreError = DbError::Decode {
            column: "alerts.kind",
            value: "flood".to_owned(),
        }
        .into();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(err.to_string().contains("flood"));
    }

    #[test]
    fn other_failures_are_backend_errors() {
        let err: StoreError = DbError::Config("bad url".to_owned()).into();
        assert!(matches!(err, StoreError::Backend { .. }));
    }
}
