//! Alert rule table and evaluator.
//!
//! Rules are plain data: a kind, a severity, a predicate, and a message
//! formatter, each a function of an immutable state snapshot. Every rule is
//! evaluated on every call and all matches fire, in table order.

use chrono::{DateTime, Utc};
use tanktwin_types::{AlertId, AlertKind, AlertRecord, AlertSeverity, MAX_PH, MIN_PH, TankState};

/// One entry in the alert rule table.
#[derive(Clone, Copy)]
pub struct AlertRule {
    /// Kind recorded on alerts produced by this rule.
    pub kind: AlertKind,
    /// Severity recorded on alerts produced by this rule.
    pub severity: AlertSeverity,
    /// Whether the rule fires for a snapshot.
    pub predicate: fn(&TankState) -> bool,
    /// Formats the alert message from the snapshot that fired it.
    pub message: fn(&TankState) -> String,
}

/// The fixed rule set, in evaluation order.
pub static ALERT_RULES: [AlertRule; 7] = [
    AlertRule {
        kind: AlertKind::LowWaterLevel,
        severity: AlertSeverity::High,
        predicate: |s| s.water_level < 20.0,
        message: |s| format!("Water level critically low: {:.1}%", s.water_level),
    },
    AlertRule {
        kind: AlertKind::HighWaterLevel,
        severity: AlertSeverity::High,
        predicate: |s| s.water_level > 90.0,
        message: |s| format!("Water level critically high: {:.1}%", s.water_level),
    },
    AlertRule {
        kind: AlertKind::HighTemperature,
        severity: AlertSeverity::Medium,
        predicate: |s| s.temperature > 40.0,
        message: |s| format!("High temperature: {:.1}°C", s.temperature),
    },
    AlertRule {
        kind: AlertKind::LowTemperature,
        severity: AlertSeverity::Medium,
        predicate: |s| s.temperature < 5.0,
        message: |s| format!("Low temperature: {:.1}°C", s.temperature),
    },
    AlertRule {
        kind: AlertKind::HighPressure,
        severity: AlertSeverity::High,
        predicate: |s| s.pressure > 2.0,
        message: |s| format!("High pressure: {:.2} bar", s.pressure),
    },
    AlertRule {
        kind: AlertKind::PhOutOfRange,
        severity: AlertSeverity::Medium,
        predicate: |s| s.ph_level < MIN_PH || s.ph_level > MAX_PH,
        message: |s| format!("pH out of range: {:.2}", s.ph_level),
    },
    AlertRule {
        kind: AlertKind::LeakDetected,
        severity: AlertSeverity::Critical,
        predicate: |s| s.leak_detected,
        message: |_| "Water leak detected!".to_owned(),
    },
];

/// Evaluate every rule against `state` and build a record for each match.
pub fn evaluate(state: &TankState, now: DateTime<Utc>) -> Vec<AlertRecord> {
    ALERT_RULES
        .iter()
        .filter(|rule| (rule.predicate)(state))
        .map(|rule| AlertRecord {
            id: AlertId::new(),
            kind: rule.kind,
            severity: rule.severity,
            message: (rule.message)(state),
            timestamp: now,
            resolved: false,
        })
        .collect()
}
