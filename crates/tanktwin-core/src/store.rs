//! Persistence collaborator traits and their in-memory implementations.
//!
//! The supervisor only ever talks to [`HistoryStore`] and [`AlertStore`]
//! trait objects. The in-memory stores here back tests and database-less
//! runs; `tanktwin-db` provides the `PostgreSQL` implementations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tanktwin_types::{AlertId, AlertRecord, AlertSeverity, TankState};
use tokio::sync::RwLock;

/// Readings kept by [`MemoryHistoryStore`] by default.
pub const DEFAULT_MEMORY_HISTORY_CAPACITY: usize = 10_000;

/// Alerts kept by [`MemoryAlertStore`] by default.
pub const DEFAULT_MEMORY_ALERT_CAPACITY: usize = 10_000;

/// Errors reported by store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Backend-specific description.
        reason: String,
    },

    /// The backend rejected or failed the operation.
    #[error("store operation failed: {reason}")]
    Backend {
        /// Backend-specific description.
        reason: String,
    },

    /// Stored data could not be decoded.
    #[error("stored data is corrupt: {reason}")]
    Corrupt {
        /// What could not be decoded.
        reason: String,
    },
}

/// Result ordering for history queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Most recent first.
    #[default]
    NewestFirst,
    /// Oldest first.
    OldestFirst,
}

/// Parameters of a history query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Maximum readings returned.
    pub limit: usize,
    /// Only readings with `last_update` at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Result ordering.
    pub order: SortOrder,
}

impl HistoryQuery {
    /// Newest-first query for up to `limit` readings.
    pub const fn latest(limit: usize) -> Self {
        Self {
            limit,
            since: None,
            order: SortOrder::NewestFirst,
        }
    }
}

/// Parameters of an alert listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertQuery {
    /// Skip resolved alerts.
    pub unresolved_only: bool,
    /// Maximum alerts returned.
    pub limit: usize,
    /// Only alerts of this severity.
    pub severity: Option<AlertSeverity>,
}

impl Default for AlertQuery {
    fn default() -> Self {
        Self {
            unresolved_only: true,
            limit: 100,
            severity: None,
        }
    }
}

impl AlertQuery {
    /// Whether `alert` passes the filters (the limit is applied separately).
    pub fn matches(&self, alert: &AlertRecord) -> bool {
        (!self.unresolved_only || !alert.resolved)
            && self.severity.is_none_or(|severity| alert.severity == severity)
    }
}

/// Durable log of tank readings.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one reading.
    async fn append(&self, reading: &TankState) -> Result<(), StoreError>;

    /// Query stored readings.
    async fn query(&self, query: &HistoryQuery) -> Result<Vec<TankState>, StoreError>;
}

/// Durable alert records.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Append one alert.
    async fn append(&self, alert: &AlertRecord) -> Result<(), StoreError>;

    /// List alerts newest first.
    async fn list(&self, query: &AlertQuery) -> Result<Vec<AlertRecord>, StoreError>;

    /// Mark one alert resolved. Returns `false` if the id is unknown.
    async fn resolve(&self, id: AlertId) -> Result<bool, StoreError>;

    /// Mark every alert resolved. Returns how many changed.
    async fn resolve_all(&self) -> Result<u64, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

fn injected_failure() -> StoreError {
    StoreError::Unavailable {
        reason: "in-memory store set to fail".to_owned(),
    }
}

/// Bounded in-memory [`HistoryStore`].
#[derive(Debug)]
pub struct MemoryHistoryStore {
    readings: RwLock<VecDeque<TankState>>,
    capacity: usize,
    failing: AtomicBool,
    append_delay_ms: AtomicU64,
}

impl MemoryHistoryStore {
    /// Create a store that keeps at most `capacity` readings.
    pub fn new(capacity: usize) -> Self {
        Self {
            readings: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
            failing: AtomicBool::new(false),
            append_delay_ms: AtomicU64::new(0),
        }
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    /// Stall every subsequent `append` for `delay`, like a slow backend.
    pub fn set_append_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.append_delay_ms.store(millis, Ordering::Release);
    }

    /// Number of stored readings.
    pub async fn len(&self) -> usize {
        self.readings.read().await.len()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::Acquire) {
            return Err(injected_failure());
        }
        Ok(())
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_HISTORY_CAPACITY)
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, reading: &TankState) -> Result<(), StoreError> {
        let delay = self.append_delay_ms.load(Ordering::Acquire);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.check()?;
        let mut readings = self.readings.write().await;
        if readings.len() >= self.capacity {
            let _ = readings.pop_front();
        }
        readings.push_back(reading.clone());
        Ok(())
    }

    async fn query(&self, query: &HistoryQuery) -> Result<Vec<TankState>, StoreError> {
        self.check()?;
        let readings = self.readings.read().await;
        let since = query.since;
        let newest_first = readings
            .iter()
            .rev()
            .filter(|r| since.is_none_or(|t| r.last_update >= t))
            .take(query.limit)
            .cloned();
        Ok(match query.order {
            SortOrder::NewestFirst => newest_first.collect(),
            SortOrder::OldestFirst => {
                let mut out: Vec<TankState> = newest_first.collect();
                out.reverse();
                out
            }
        })
    }
}

/// Bounded in-memory [`AlertStore`].
///
/// A standing condition such as a leak raises one alert per tick, so the
/// store keeps at most `capacity` records and evicts the oldest on overflow,
/// resolved or not. `list`, `resolve`, and `resolve_all` scan every kept
/// record.
#[derive(Debug)]
pub struct MemoryAlertStore {
    alerts: RwLock<VecDeque<AlertRecord>>,
    capacity: usize,
    failing: AtomicBool,
}

impl MemoryAlertStore {
    /// Create an empty store with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_ALERT_CAPACITY)
    }

    /// Create an empty store that keeps at most `capacity` alerts.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            alerts: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
            failing: AtomicBool::new(false),
        }
    }

    /// Number of stored alerts.
    pub async fn len(&self) -> usize {
        self.alerts.read().await.len()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::Acquire) {
            return Err(injected_failure());
        }
        Ok(())
    }
}

impl Default for MemoryAlertStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn append(&self, alert: &AlertRecord) -> Result<(), StoreError> {
        self.check()?;
        let mut alerts = self.alerts.write().await;
        if alerts.len() >= self.capacity {
            let _ = alerts.pop_front();
        }
        alerts.push_back(alert.clone());
        Ok(())
    }

    async fn list(&self, query: &AlertQuery) -> Result<Vec<AlertRecord>, StoreError> {
        self.check()?;
        let alerts = self.alerts.read().await;
        Ok(alerts
            .iter()
            .rev()
            .filter(|a| query.matches(a))
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn resolve(&self, id: AlertId) -> Result<bool, StoreError> {
        self.check()?;
        let mut alerts = self.alerts.write().await;
        Ok(alerts
            .iter_mut()
            .find(|a| a.id == id)
            .map(|a| a.resolved = true)
            .is_some())
    }

    async fn resolve_all(&self) -> Result<u64, StoreError> {
        self.check()?;
        let mut alerts = self.alerts.write().await;
        let mut changed: u64 = 0;
        for alert in alerts.iter_mut().filter(|a| !a.resolved) {
            alert.resolved = true;
            changed = changed.saturating_add(1);
        }
        Ok(changed)
    }
}
