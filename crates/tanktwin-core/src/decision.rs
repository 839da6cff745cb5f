//! Rule-based level controller and its advisory analyses.
//!
//! [`analyze`] walks a strict priority chain and returns the first matching
//! [`Decision`]:
//!
//! 1. Leak detected: emergency stop
//! 2. Inside the tolerance band: stop
//! 3. Below the band: fill (or keep filling, checking efficiency)
//! 4. Above the band: drain (or keep draining, checking efficiency)
//! 5. Otherwise continue the running operation, or idle
//!
//! [`predict_trend`] and [`detect_anomalies`] are advisory and never change
//! the tank.

use tanktwin_types::{
    AlertSeverity, Anomaly, AnomalyKind, ControlConfig, Decision, DecisionDetails,
    DecisionLogKind, TankAction, TankActivity, TankState, TrendDirection, TrendForecast,
    TrendPrediction,
};

use crate::history::HistoryBuffer;

/// Samples used to judge fill or drain efficiency.
pub const EFFICIENCY_WINDOW: usize = 10;

/// Level change (percent) expected across [`EFFICIENCY_WINDOW`] samples.
pub const EXPECTED_WINDOW_CHANGE: f64 = 1.0;

/// Efficiency below which a warning is attached.
pub const LOW_EFFICIENCY: f64 = 0.5;

/// Minimum samples before a trend can be predicted.
pub const MIN_TREND_SAMPLES: usize = 5;

/// Samples considered by trend prediction.
const TREND_WINDOW: usize = 20;

/// Upper bound on requested prediction steps.
pub const MAX_PREDICTION_STEPS: usize = 1000;

/// Level jump (percent) between consecutive samples flagged as sudden.
const SUDDEN_CHANGE: f64 = 5.0;

/// Temperature above which an anomaly is reported, in degrees Celsius.
const ANOMALY_TEMPERATURE: f64 = 40.0;

/// Pressure above which an anomaly is reported, in bar.
const ANOMALY_PRESSURE: f64 = 2.0;

/// Decide what the tank should do next.
pub fn analyze(state: &TankState, history: &HistoryBuffer, control: &ControlConfig) -> Decision {
    let level = state.water_level;
    let target = control.target_level;

    if state.leak_detected {
        return decision(
            TankAction::Stop,
            "Emergency: water leak detected!".to_owned(),
            DecisionDetails::Emergency,
            Some(DecisionLogKind::Emergency),
        );
    }

    let diff = level - target;

    if diff.abs() <= control.tolerance {
        if state.is_filling || state.is_draining {
            return decision(
                TankAction::Stop,
                format!("Reached target level ({level:.1}%)"),
                DecisionDetails::Stable,
                Some(DecisionLogKind::Info),
            );
        }
        return decision(TankAction::Stop, "Stable".to_owned(), DecisionDetails::Stable, None);
    }

    if diff < -control.tolerance {
        if !state.is_filling {
            return decision(
                TankAction::Fill,
                format!("Starting fill from {level:.1}% to {target:.1}%"),
                DecisionDetails::BelowTarget { difference: diff.abs() },
                Some(DecisionLogKind::Action),
            );
        }
        let efficiency = fill_efficiency(history);
        return continuing(TankAction::Fill, "fill", efficiency);
    }

    if diff > control.tolerance {
        if !state.is_draining {
            return decision(
                TankAction::Drain,
                format!("Starting drain from {level:.1}% to {target:.1}%"),
                DecisionDetails::AboveTarget { difference: diff.abs() },
                Some(DecisionLogKind::Action),
            );
        }
        let efficiency = drain_efficiency(history);
        return continuing(TankAction::Drain, "drain", efficiency);
    }

    // Only reachable when the comparison is undefined (NaN level or target).
    match state.activity() {
        TankActivity::Filling => decision(
            TankAction::Fill,
            "Continuing fill".to_owned(),
            DecisionDetails::Continuing,
            None,
        ),
        TankActivity::Draining => decision(
            TankAction::Drain,
            "Continuing drain".to_owned(),
            DecisionDetails::Continuing,
            None,
        ),
        TankActivity::Idle => {
            decision(TankAction::Stop, "No action".to_owned(), DecisionDetails::Idle, None)
        }
    }
}

fn decision(
    action: TankAction,
    message: String,
    details: DecisionDetails,
    log_kind: Option<DecisionLogKind>,
) -> Decision {
    Decision {
        action,
        message,
        details,
        log_kind,
        efficiency: None,
        warning: None,
    }
}

fn continuing(action: TankAction, verb: &str, efficiency: f64) -> Decision {
    let warning = (efficiency < LOW_EFFICIENCY)
        .then(|| format!("Low {verb} efficiency ({:.0}%)", efficiency * 100.0));
    Decision {
        action,
        message: format!("Continuing {verb}"),
        details: DecisionDetails::Continuing,
        log_kind: warning.as_ref().map(|_| DecisionLogKind::Warning),
        efficiency: Some(efficiency),
        warning,
    }
}

/// Level rise over the last [`EFFICIENCY_WINDOW`] samples relative to
/// [`EXPECTED_WINDOW_CHANGE`], clamped to `0.0..=1.0`. Short histories
/// count as fully efficient.
pub fn fill_efficiency(history: &HistoryBuffer) -> f64 {
    window_change(history).map_or(1.0, ratio)
}

/// Drain counterpart of [`fill_efficiency`]: measured on the level drop.
pub fn drain_efficiency(history: &HistoryBuffer) -> f64 {
    window_change(history).map_or(1.0, |change| ratio(-change))
}

fn window_change(history: &HistoryBuffer) -> Option<f64> {
    if history.len() < EFFICIENCY_WINDOW {
        return None;
    }
    let levels = history.recent_levels(EFFICIENCY_WINDOW);
    Some(levels.last()? - levels.first()?)
}

fn ratio(change: f64) -> f64 {
    let efficiency = change / EXPECTED_WINDOW_CHANGE;
    if efficiency.is_nan() { 0.0 } else { efficiency.clamp(0.0, 1.0) }
}

// ---------------------------------------------------------------------------
// Trend prediction
// ---------------------------------------------------------------------------

/// Linearly extrapolate the level `steps` samples ahead.
///
/// The slope is the mean of the first differences over the last five
/// samples. `time_to_target` assumes the slope is in percent per minute.
pub fn predict_trend(history: &HistoryBuffer, steps: usize, target: f64) -> TrendPrediction {
    if history.len() < MIN_TREND_SAMPLES {
        return TrendPrediction::InsufficientData;
    }
    let levels = history.recent_levels(TREND_WINDOW);
    let tail_start = levels.len().saturating_sub(MIN_TREND_SAMPLES);
    let diffs: Vec<f64> = levels
        .iter()
        .skip(tail_start)
        .zip(levels.iter().skip(tail_start.saturating_add(1)))
        .map(|(a, b)| b - a)
        .collect();
    let (Some(avg_change), Some(&current)) = (mean(&diffs), levels.last()) else {
        return TrendPrediction::InsufficientData;
    };

    let mut predicted_levels = Vec::with_capacity(steps.min(MAX_PREDICTION_STEPS));
    let mut projected = current;
    for _ in 0..steps.min(MAX_PREDICTION_STEPS) {
        projected += avg_change;
        predicted_levels.push(projected.clamp(0.0, 100.0));
    }

    let time_to_target =
        (avg_change.abs() >= 0.001).then(|| ((target - current) / avg_change).abs() * 60.0);

    TrendPrediction::Forecast(TrendForecast {
        predicted_levels,
        trend: if avg_change > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        },
        rate_of_change: avg_change,
        confidence: (1.0 - avg_change.abs() / 10.0).clamp(0.0, 1.0),
        time_to_target,
    })
}

fn mean(values: &[f64]) -> Option<f64> {
    let count = u32::try_from(values.len()).ok().filter(|n| *n > 0)?;
    Some(values.iter().sum::<f64>() / f64::from(count))
}

// ---------------------------------------------------------------------------
// Anomaly detection
// ---------------------------------------------------------------------------

/// Report sudden level jumps and out-of-band temperature or pressure.
pub fn detect_anomalies(state: &TankState, history: &HistoryBuffer) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    if history.len() >= 3 {
        let recent = history.recent_levels(3);
        let sudden = recent
            .iter()
            .zip(recent.iter().skip(1))
            .any(|(a, b)| (b - a).abs() > SUDDEN_CHANGE);
        if sudden {
            anomalies.push(Anomaly {
                kind: AnomalyKind::SuddenChange,
                severity: AlertSeverity::High,
                message: "Sudden change in water level".to_owned(),
            });
        }
    }

    if state.temperature > ANOMALY_TEMPERATURE {
        anomalies.push(Anomaly {
            kind: AnomalyKind::HighTemperature,
            severity: AlertSeverity::Medium,
            message: format!("High temperature: {:.1}°C", state.temperature),
        });
    }

    if state.pressure > ANOMALY_PRESSURE {
        anomalies.push(Anomaly {
            kind: AnomalyKind::HighPressure,
            severity: AlertSeverity::High,
            message: format!("High pressure: {:.2} bar", state.pressure),
        });
    }

    anomalies
}
