//! `PostgreSQL` persistence for the Tank Twin.
//!
//! Provides [`PgHistoryStore`] and [`PgAlertStore`], the database-backed
//! implementations of the store traits in `tanktwin-core`. The binary
//! selects them when `infrastructure.postgres_url` is configured and falls
//! back to the in-memory stores otherwise.
//!
//! # Modules
//!
//! - [`postgres`] -- Connection pool, configuration, and migrations
//! - [`history_store`] -- `tank_readings` table
//! - [`alert_store`] -- `alerts` table
//! - [`error`] -- [`DbError`] and its conversion into `StoreError`

pub mod alert_store;
pub mod error;
pub mod history_store;
pub mod postgres;

// Re-export primary types for convenience.
pub use alert_store::{AlertRow, PgAlertStore};
pub use error::DbError;
pub use history_store::{PgHistoryStore, ReadingRow};
pub use postgres::{PostgresConfig, PostgresPool};
