//! Core entity structs: tank geometry, the live tank state, controller
//! settings, alert records, and decision log entries.
//!
//! Field names match the JSON the dashboard consumes (`water_level`,
//! `flow_rate`, ...); units are documented per field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{AlertKind, AlertSeverity, DecisionLogKind, TankActivity};
use crate::ids::AlertId;

/// Default inlet/outlet flow rate in litres per minute.
pub const DEFAULT_FLOW_RATE_LPM: f64 = 20.0;

/// Lower bound of the flow rate in litres per minute.
pub const MIN_FLOW_RATE_LPM: f64 = 5.0;

/// Upper bound of the flow rate in litres per minute.
pub const MAX_FLOW_RATE_LPM: f64 = 50.0;

/// Lower bound of the pH reading.
pub const MIN_PH: f64 = 6.5;

/// Upper bound of the pH reading.
pub const MAX_PH: f64 = 8.5;

/// Upper bound of the turbidity reading in NTU.
pub const MAX_TURBIDITY_NTU: f64 = 100.0;

// ---------------------------------------------------------------------------
// TankConfig
// ---------------------------------------------------------------------------

/// Physical description of the tank. Fixed for the lifetime of a twin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TankConfig {
    /// Maximum capacity in litres.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: f64,

    /// Minimum capacity in litres.
    #[serde(default)]
    pub min_capacity: f64,

    /// Starting water level as a percentage of `max_capacity`.
    #[serde(default = "default_initial_level")]
    pub initial_level: f64,

    /// Inner diameter in metres.
    #[serde(default = "default_diameter")]
    pub diameter: f64,

    /// Wall height in metres.
    #[serde(default = "default_height")]
    pub height: f64,

    /// Wall material, informational.
    #[serde(default = "default_material")]
    pub material: String,

    /// Insulation factor in `0.0..=1.0`, informational.
    #[serde(default = "default_insulation_factor")]
    pub insulation_factor: f64,
}

impl Default for TankConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            min_capacity: 0.0,
            initial_level: default_initial_level(),
            diameter: default_diameter(),
            height: default_height(),
            material: default_material(),
            insulation_factor: default_insulation_factor(),
        }
    }
}

const fn default_max_capacity() -> f64 {
    1000.0
}

const fn default_initial_level() -> f64 {
    60.0
}

const fn default_diameter() -> f64 {
    1.5
}

const fn default_height() -> f64 {
    2.0
}

fn default_material() -> String {
    String::from("steel")
}

const fn default_insulation_factor() -> f64 {
    0.8
}

// ---------------------------------------------------------------------------
// TankState
// ---------------------------------------------------------------------------

/// Point-in-time state of the tank.
///
/// The supervisor owns the only mutable instance; everything else sees
/// copies of it (snapshots, history entries, broadcast payloads).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TankState {
    /// Fill level in percent, `0.0..=100.0`.
    pub water_level: f64,
    /// Stored volume in litres, always `water_level / 100 * capacity`.
    pub water_volume: f64,
    /// Water temperature in degrees Celsius.
    pub temperature: f64,
    /// Absolute pressure at the tank floor in bar.
    pub pressure: f64,
    /// pH reading, `6.5..=8.5`.
    pub ph_level: f64,
    /// Turbidity in NTU, `0.0..=100.0`.
    pub turbidity: f64,
    /// Inlet open. Never true together with `is_draining`.
    pub is_filling: bool,
    /// Outlet open. Never true together with `is_filling`.
    pub is_draining: bool,
    /// Leak hazard flag.
    pub leak_detected: bool,
    /// Flow rate in litres per minute, `5.0..=50.0`.
    pub flow_rate: f64,
    /// Maximum capacity in litres (echo of the tank configuration).
    pub capacity: f64,
    /// Time of the last physics update.
    pub last_update: DateTime<Utc>,
}

impl TankState {
    /// Build the initial state for a tank: level from the configuration,
    /// valves closed, no leak, nominal water quality.
    pub fn initial(config: &TankConfig, now: DateTime<Utc>) -> Self {
        let level = config.initial_level.clamp(0.0, 100.0);
        Self {
            water_level: level,
            water_volume: level / 100.0 * config.max_capacity,
            temperature: 25.0,
            pressure: 1.0,
            ph_level: 7.0,
            turbidity: 5.0,
            is_filling: false,
            is_draining: false,
            leak_detected: false,
            flow_rate: DEFAULT_FLOW_RATE_LPM,
            capacity: config.max_capacity,
            last_update: now,
        }
    }

    /// Derive the valve activity from the fill/drain flags.
    pub const fn activity(&self) -> TankActivity {
        if self.is_filling {
            TankActivity::Filling
        } else if self.is_draining {
            TankActivity::Draining
        } else {
            TankActivity::Idle
        }
    }
}

// ---------------------------------------------------------------------------
// ControlConfig
// ---------------------------------------------------------------------------

/// Runtime-adjustable controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ControlConfig {
    /// Level the controller steers toward, in percent.
    #[serde(default = "default_target_level")]
    pub target_level: f64,

    /// Half-width of the "at target" band, in percent.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Level drop rate (percent per second) operators treat as a leak.
    #[serde(default = "default_leak_threshold")]
    pub leak_threshold: f64,

    /// Whether controller decisions are applied each tick.
    #[serde(default = "default_auto_mode")]
    pub auto_mode: bool,

    /// Default number of steps for trend prediction.
    #[serde(default = "default_prediction_horizon")]
    pub prediction_horizon: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            target_level: default_target_level(),
            tolerance: default_tolerance(),
            leak_threshold: default_leak_threshold(),
            auto_mode: default_auto_mode(),
            prediction_horizon: default_prediction_horizon(),
        }
    }
}

const fn default_target_level() -> f64 {
    80.0
}

const fn default_tolerance() -> f64 {
    1.0
}

const fn default_leak_threshold() -> f64 {
    0.3
}

const fn default_auto_mode() -> bool {
    true
}

const fn default_prediction_horizon() -> usize {
    10
}

// ---------------------------------------------------------------------------
// AlertRecord
// ---------------------------------------------------------------------------

/// An alert raised by a rule. Only `resolved` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AlertRecord {
    /// Unique alert identifier.
    pub id: AlertId,
    /// The rule that fired.
    pub kind: AlertKind,
    /// Severity of the rule.
    pub severity: AlertSeverity,
    /// Message formatted with the state values at the time of firing.
    pub message: String,
    /// When the rule fired.
    pub timestamp: DateTime<Utc>,
    /// Whether an operator acknowledged or cleared the alert.
    pub resolved: bool,
}

// ---------------------------------------------------------------------------
// DecisionLogEntry
// ---------------------------------------------------------------------------

/// One line in the controller's decision log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DecisionLogEntry {
    /// When the entry was written.
    pub timestamp: DateTime<Utc>,
    /// Human-readable message.
    pub message: String,
    /// Entry category.
    #[serde(rename = "type")]
    pub kind: DecisionLogKind,
}
