//! Shared type definitions for the Tank Twin.
//!
//! This crate is the single source of truth for all types used across the
//! Tank Twin workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrapper for alert identifiers
//! - [`enums`] -- Enumeration types (actions, alert kinds, severities, log kinds)
//! - [`structs`] -- Core entity structs (tank, controller settings, alerts, log)
//! - [`analysis`] -- Decision, trend forecast, and anomaly types
//! - [`events`] -- Events pushed to live subscribers

pub mod analysis;
pub mod enums;
pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use analysis::{Anomaly, Decision, DecisionDetails, TrendForecast, TrendPrediction};
pub use enums::{
    AlertKind, AlertSeverity, AnomalyKind, DecisionLogKind, TankAction, TankActivity,
    TrendDirection,
};
pub use events::TwinEvent;
pub use ids::AlertId;
pub use structs::{
    AlertRecord, ControlConfig, DEFAULT_FLOW_RATE_LPM, DecisionLogEntry, MAX_FLOW_RATE_LPM, MAX_PH,
    MAX_TURBIDITY_NTU, MIN_FLOW_RATE_LPM, MIN_PH, TankConfig, TankState,
};
