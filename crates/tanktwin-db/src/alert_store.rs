//! [`AlertStore`] over the `alerts` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tanktwin_core::store::{AlertQuery, AlertStore, StoreError};
use tanktwin_types::{AlertId, AlertKind, AlertRecord, AlertSeverity};
use uuid::Uuid;

use crate::error::DbError;

/// `PostgreSQL`-backed alert records.
#[derive(Clone)]
pub struct PgAlertStore {
    pool: PgPool,
}

impl PgAlertStore {
    /// Bind the store to a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, alert: &AlertRecord) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO alerts (id, kind, severity, message, raised_at, resolved)
              VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(alert.id.into_inner())
        .bind(alert.kind.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(alert.timestamp)
        .bind(alert.resolved)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn select(&self, query: &AlertQuery) -> Result<Vec<AlertRecord>, DbError> {
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, AlertRow>(
            r"SELECT id, kind, severity, message, raised_at, resolved
              FROM alerts
              WHERE (NOT $1 OR NOT resolved)
                AND ($2::TEXT IS NULL OR severity = $2)
              ORDER BY raised_at DESC, id DESC
              LIMIT $3",
        )
        .bind(query.unresolved_only)
        .bind(query.severity.map(AlertSeverity::as_str))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AlertRecord::try_from).collect()
    }

    async fn mark_resolved(&self, id: AlertId) -> Result<bool, DbError> {
        let result = sqlx::query(r"UPDATE alerts SET resolved = TRUE WHERE id = $1")
            .bind(id.into_inner())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_resolved(&self) -> Result<u64, DbError> {
        let result = sqlx::query(r"UPDATE alerts SET resolved = TRUE WHERE NOT resolved")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AlertStore for PgAlertStore {
    async fn append(&self, alert: &AlertRecord) -> Result<(), StoreError> {
        Ok(self.insert(alert).await?)
    }

    async fn list(&self, query: &AlertQuery) -> Result<Vec<AlertRecord>, StoreError> {
        Ok(self.select(query).await?)
    }

    async fn resolve(&self, id: AlertId) -> Result<bool, StoreError> {
        Ok(self.mark_resolved(id).await?)
    }

    async fn resolve_all(&self) -> Result<u64, StoreError> {
        Ok(self.mark_all_resolved().await?)
    }
}

/// A row from the `alerts` table.
///
/// Kind and severity are stored as their wire names.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AlertRow {
    /// Alert id.
    pub id: Uuid,
    /// Alert kind, e.g. `leak_detected`.
    pub kind: String,
    /// Severity, e.g. `critical`.
    pub severity: String,
    /// Human-readable message.
    pub message: String,
    /// When the alert was raised.
    pub raised_at: DateTime<Utc>,
    /// Whether the alert has been acknowledged.
    pub resolved: bool,
}

impl TryFrom<AlertRow> for AlertRecord {
    type Error = DbError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        let kind = AlertKind::parse(&row.kind).ok_or_else(|| DbError::Decode {
            column: "alerts.kind",
            value: row.kind.clone(),
        })?;
        let severity = AlertSeverity::parse(&row.severity).ok_or_else(|| DbError::Decode {
            column: "alerts.severity",
            value: row.severity.clone(),
        })?;
        Ok(Self {
            id: AlertId::from(row.id),
            kind,
            severity,
            message: row.message,
            timestamp: row.raised_at,
            resolved: row.resolved,
        })
    }
}
