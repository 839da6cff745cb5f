//! [`HistoryStore`] over the `tank_readings` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tanktwin_core::store::{HistoryQuery, HistoryStore, SortOrder, StoreError};
use tanktwin_types::TankState;

use crate::error::DbError;

const SELECT_NEWEST_FIRST: &str = r"SELECT recorded_at, water_level, water_volume, temperature, pressure, ph_level, turbidity, is_filling, is_draining, leak_detected, flow_rate, capacity
  FROM tank_readings
  WHERE $1::TIMESTAMPTZ IS NULL OR recorded_at >= $1
  ORDER BY recorded_at DESC, id DESC
  LIMIT $2";

/// `PostgreSQL`-backed reading log.
#[derive(Clone)]
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    /// Bind the store to a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, reading: &TankState) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO tank_readings (recorded_at, water_level, water_volume, temperature, pressure, ph_level, turbidity, is_filling, is_draining, leak_detected, flow_rate, capacity)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(reading.last_update)
        .bind(reading.water_level)
        .bind(reading.water_volume)
        .bind(reading.temperature)
        .bind(reading.pressure)
        .bind(reading.ph_level)
        .bind(reading.turbidity)
        .bind(reading.is_filling)
        .bind(reading.is_draining)
        .bind(reading.leak_detected)
        .bind(reading.flow_rate)
        .bind(reading.capacity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn select(&self, query: &HistoryQuery) -> Result<Vec<TankState>, DbError> {
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, ReadingRow>(SELECT_NEWEST_FIRST)
            .bind(query.since)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let mut readings: Vec<TankState> = rows.into_iter().map(TankState::from).collect();
        if query.order == SortOrder::OldestFirst {
            readings.reverse();
        }
        Ok(readings)
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append(&self, reading: &TankState) -> Result<(), StoreError> {
        Ok(self.insert(reading).await?)
    }

    async fn query(&self, query: &HistoryQuery) -> Result<Vec<TankState>, StoreError> {
        Ok(self.select(query).await?)
    }
}

/// A row from the `tank_readings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReadingRow {
    /// When the reading was taken.
    pub recorded_at: DateTime<Utc>,
    /// Fill level in percent.
    pub water_level: f64,
    /// Volume in litres.
    pub water_volume: f64,
    /// Water temperature in degrees Celsius.
    pub temperature: f64,
    /// Bottom pressure in bar.
    pub pressure: f64,
    /// pH.
    pub ph_level: f64,
    /// Turbidity in NTU.
    pub turbidity: f64,
    /// Pump filling.
    pub is_filling: bool,
    /// Valve draining.
    pub is_draining: bool,
    /// Leak flag.
    pub leak_detected: bool,
    /// Pump flow rate in L/min.
    pub flow_rate: f64,
    /// Tank capacity in litres.
    pub capacity: f64,
}

impl From<ReadingRow> for TankState {
    fn from(row: ReadingRow) -> Self {
        Self {
            water_level: row.water_level,
            water_volume: row.water_volume,
            temperature: row.temperature,
            pressure: row.pressure,
            ph_level: row.ph_level,
            turbidity: row.turbidity,
            is_filling: row.is_filling,
            is_draining: row.is_draining,
            leak_detected: row.leak_detected,
            flow_rate: row.flow_rate,
            capacity: row.capacity,
            last_update: row.recorded_at,
        }
    }
}
