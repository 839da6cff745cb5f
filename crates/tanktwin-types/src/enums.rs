//! Enumeration types for the Tank Twin.
//!
//! All enums serialize in `snake_case` so the wire format matches the
//! dashboard and the `alerts.kind` / `alerts.severity` database columns.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

/// An action produced by the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TankAction {
    /// Open the inlet: start (or keep) filling.
    Fill,
    /// Open the outlet: start (or keep) draining.
    Drain,
    /// Close both inlet and outlet.
    Stop,
    /// Raise an operator alert without touching the valves.
    Alert,
}

impl TankAction {
    /// Return the lowercase wire name of the action.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fill => "fill",
            Self::Drain => "drain",
            Self::Stop => "stop",
            Self::Alert => "alert",
        }
    }
}

/// Valve activity of the tank. `Leak` is tracked separately as a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TankActivity {
    /// Neither filling nor draining.
    Idle,
    /// Inlet open.
    Filling,
    /// Outlet open.
    Draining,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// The rule that produced an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AlertKind {
    /// Water level below 20%.
    LowWaterLevel,
    /// Water level above 90%.
    HighWaterLevel,
    /// Temperature above 40 C.
    HighTemperature,
    /// Temperature below 5 C.
    LowTemperature,
    /// Pressure above 2.0 bar.
    HighPressure,
    /// pH outside 6.5..=8.5.
    PhOutOfRange,
    /// Leak flag raised.
    LeakDetected,
}

impl AlertKind {
    /// Return the `snake_case` name used on the wire and in storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LowWaterLevel => "low_water_level",
            Self::HighWaterLevel => "high_water_level",
            Self::HighTemperature => "high_temperature",
            Self::LowTemperature => "low_temperature",
            Self::HighPressure => "high_pressure",
            Self::PhOutOfRange => "ph_out_of_range",
            Self::LeakDetected => "leak_detected",
        }
    }

    /// Parse a stored kind name. Returns `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "low_water_level" => Some(Self::LowWaterLevel),
            "high_water_level" => Some(Self::HighWaterLevel),
            "high_temperature" => Some(Self::HighTemperature),
            "low_temperature" => Some(Self::LowTemperature),
            "high_pressure" => Some(Self::HighPressure),
            "ph_out_of_range" => Some(Self::PhOutOfRange),
            "leak_detected" => Some(Self::LeakDetected),
            _ => None,
        }
    }
}

/// Relative urgency of an alert or anomaly, ordered `Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AlertSeverity {
    /// Needs attention soon.
    Medium,
    /// Needs attention now.
    High,
    /// Immediate hazard.
    Critical,
}

impl AlertSeverity {
    /// Return the lowercase name used on the wire and in storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parse a severity name (case-insensitive). Returns `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Decision log
// ---------------------------------------------------------------------------

/// Category of a decision log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DecisionLogKind {
    /// Leak or other hazard forced a stop.
    Emergency,
    /// Informational, e.g. target reached.
    Info,
    /// The controller started a fill or drain.
    Action,
    /// Degraded operation, e.g. low fill efficiency.
    Warning,
    /// Lifecycle messages (simulation started/stopped).
    System,
}

// ---------------------------------------------------------------------------
// Advisory analysis
// ---------------------------------------------------------------------------

/// Kind of anomaly reported by anomaly detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AnomalyKind {
    /// Level moved more than 5 points between consecutive samples.
    SuddenChange,
    /// Temperature above 40 C.
    HighTemperature,
    /// Pressure above 2.0 bar.
    HighPressure,
}

/// Direction of the extrapolated level trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TrendDirection {
    /// Average change is positive.
    Increasing,
    /// Average change is zero or negative.
    Decreasing,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_by_urgency() {
        assert!(AlertSeverity::Medium < AlertSeverity::High);
        assert!(AlertSeverity::High < AlertSeverity::Critical);
    }

    #[test]
    fn alert_kind_names_round_trip() {
        for kind in [
            AlertKind::LowWaterLevel,
            AlertKind::HighWaterLevel,
            AlertKind::HighTemperature,
            AlertKind::LowTemperature,
            AlertKind::HighPressure,
            AlertKind::PhOutOfRange,
            AlertKind::LeakDetected,
        ] {
            assert_eq!(AlertKind::parse(kind.as_str()), Some(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn severity_parse_is_case_insensitive() {
        assert_eq!(AlertSeverity::parse("CRITICAL"), Some(AlertSeverity::Critical));
        assert_eq!(AlertSeverity::parse("low"), None);
    }

    #[test]
    fn action_serializes_lowercase() {
        let json = serde_json::to_string(&TankAction::Drain).unwrap();
        assert_eq!(json, "\"drain\"");
    }
}
