//! Controller output types: decisions, trend forecasts, and anomalies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{AlertSeverity, AnomalyKind, DecisionLogKind, TankAction, TrendDirection};
use crate::structs::DecisionLogEntry;

/// Structured explanation attached to a [`Decision`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "status", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DecisionDetails {
    /// A leak forced an emergency stop.
    Emergency,
    /// Level is inside the tolerance band.
    Stable,
    /// Level is under the band; `difference` is the distance to target.
    BelowTarget {
        /// Absolute distance to the target, in percent.
        difference: f64,
    },
    /// Level is over the band; `difference` is the distance to target.
    AboveTarget {
        /// Absolute distance to the target, in percent.
        difference: f64,
    },
    /// An operation already in progress keeps running.
    Continuing,
    /// Nothing to do.
    Idle,
}

/// The controller's verdict for one state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Decision {
    /// Action to apply.
    pub action: TankAction,
    /// Human-readable explanation.
    pub message: String,
    /// Structured explanation.
    pub details: DecisionDetails,
    /// If set, the message is worth recording in the decision log under this kind.
    pub log_kind: Option<DecisionLogKind>,
    /// Efficiency of an ongoing fill or drain over the last 10 samples, when computed.
    pub efficiency: Option<f64>,
    /// Degraded-operation warning raised alongside the action.
    pub warning: Option<String>,
}

impl Decision {
    /// Build the log entry this decision asks for, if any.
    ///
    /// A warning takes precedence over the plain message.
    pub fn log_entry(&self, timestamp: DateTime<Utc>) -> Option<DecisionLogEntry> {
        let kind = self.log_kind?;
        let message = self.warning.as_ref().unwrap_or(&self.message).clone();
        Some(DecisionLogEntry {
            timestamp,
            message,
            kind,
        })
    }
}

/// Linear extrapolation of the water level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TrendForecast {
    /// Predicted levels for the next steps, each clamped to `0.0..=100.0`.
    pub predicted_levels: Vec<f64>,
    /// Direction of the trend.
    pub trend: TrendDirection,
    /// Mean level change per sample over the last five samples.
    pub rate_of_change: f64,
    /// `1 - |rate| / 10`, clamped to `0.0..=1.0`.
    pub confidence: f64,
    /// Seconds until the target is reached, `None` if the level is flat.
    pub time_to_target: Option<f64>,
}

/// Result of a trend prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "prediction", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TrendPrediction {
    /// Fewer than five samples of history.
    InsufficientData,
    /// A forecast over the requested number of steps.
    Forecast(TrendForecast),
}

/// A detected anomaly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Anomaly {
    /// What was detected.
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    /// How urgent it is.
    pub severity: AlertSeverity,
    /// Human-readable description.
    pub message: String,
}
