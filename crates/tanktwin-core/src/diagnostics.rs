//! Advisory engineering diagnostics computed from a state snapshot.
//!
//! Nothing here feeds back into the control loop. The report groups four
//! analyses (fluid dynamics, heat transfer, water quality, structural
//! integrity) and folds them into an overall risk score. The models are
//! illustrative, not validated.

use std::f64::consts::PI;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tanktwin_types::{TankConfig, TankState};

use crate::physics::water_height;

/// Reynolds number below which flow is laminar.
const LAMINAR_LIMIT: f64 = 2000.0;

/// Reynolds number above which flow is turbulent.
const TURBULENT_LIMIT: f64 = 4000.0;

/// Safety factor reported when a stress is zero.
const UNSTRESSED_SAFETY_FACTOR: f64 = 999.0;

/// Constants for the diagnostic models.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsConstants {
    /// Inlet/outlet pipe diameter in metres.
    pub pipe_diameter: f64,
    /// Kinematic viscosity of water in m2/s.
    pub kinematic_viscosity: f64,
    /// Water density in kg/m3.
    pub water_density: f64,
    /// Gravitational acceleration in m/s2.
    pub gravity: f64,
    /// Specific heat of water in J/(kg K).
    pub specific_heat: f64,
    /// Ambient air temperature in degrees Celsius.
    pub ambient_temperature: f64,
    /// Insulation thickness in metres.
    pub insulation_thickness: f64,
    /// Insulation thermal conductivity in W/(m K).
    pub insulation_conductivity: f64,
    /// Solar irradiance in W/m2.
    pub solar_irradiance: f64,
    /// Fraction of incident solar energy absorbed.
    pub solar_absorption: f64,
    /// Fraction of the surface exposed to the sun.
    pub solar_exposure: f64,
    /// Wall thickness in metres.
    pub wall_thickness: f64,
    /// Wall yield strength in pascals.
    pub yield_strength: f64,
    /// Estimated fill/drain cycles per day.
    pub cycles_per_day: f64,
    /// Rated fatigue life in cycles.
    pub fatigue_life_cycles: f64,
}

impl Default for DiagnosticsConstants {
    fn default() -> Self {
        Self {
            pipe_diameter: 0.05,
            kinematic_viscosity: 0.000_001,
            water_density: 997.0,
            gravity: 9.81,
            specific_heat: 4182.0,
            ambient_temperature: 20.0,
            insulation_thickness: 0.05,
            insulation_conductivity: 0.04,
            solar_irradiance: 1000.0,
            solar_absorption: 0.7,
            solar_exposure: 0.5,
            wall_thickness: 0.005,
            yield_strength: 250.0e6,
            cycles_per_day: 10.0,
            fatigue_life_cycles: 10_000.0,
        }
    }
}

/// Pipe flow regime derived from the Reynolds number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowRegime {
    /// Re < 2000.
    Laminar,
    /// 2000 <= Re <= 4000.
    Transitional,
    /// Re > 4000.
    Turbulent,
}

/// Water quality grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStatus {
    /// Score >= 90.
    Excellent,
    /// Score >= 75.
    Good,
    /// Score >= 60.
    Fair,
    /// Score >= 40.
    Poor,
    /// Score < 40.
    Unfit,
}

/// Structural grade from the minimum safety factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralStatus {
    /// Safety factor >= 3.
    Safe,
    /// Safety factor >= 2.
    Acceptable,
    /// Safety factor >= 1.5.
    Monitor,
    /// Safety factor < 1.5.
    Danger,
}

/// Overall risk grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Risk >= 0.7.
    VeryHigh,
    /// Risk >= 0.5.
    High,
    /// Risk >= 0.3.
    Medium,
    /// Risk >= 0.1.
    Low,
    /// Risk < 0.1.
    Acceptable,
}

/// Pipe flow figures, present only when water is flowing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipeFlow {
    /// Mean velocity in the pipe, m/s.
    pub velocity: f64,
    /// Reynolds number.
    pub reynolds_number: f64,
    /// Regime classification.
    pub regime: FlowRegime,
}

/// Fluid dynamics section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FluidDynamics {
    /// Pipe flow at the current flow rate.
    pub pipe_flow: Option<PipeFlow>,
    /// Height of the water column in metres.
    pub water_height: f64,
    /// Hydrostatic force on the wall, N per metre of circumference.
    pub hydrostatic_force: f64,
    /// Overturning moment, N m per metre.
    pub overturning_moment: f64,
}

/// Heat transfer section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatTransfer {
    /// Heat lost through the insulation in watts (negative means gain).
    pub heat_loss_rate: f64,
    /// Temperature change per second from that loss.
    pub temperature_change_rate: f64,
    /// Thermal time constant in seconds, when there is water to heat.
    pub time_constant: Option<f64>,
    /// Solar heat gain in watts.
    pub solar_heat_gain: f64,
    /// Solar gain minus heat loss, in watts.
    pub net_heat_flow: f64,
}

/// Water quality section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterQuality {
    /// Score in `0.0..=100.0`.
    pub score: f64,
    /// Grade derived from the score.
    pub status: QualityStatus,
}

/// Structural integrity section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralIntegrity {
    /// Hoop stress in MPa.
    pub hoop_stress_mpa: f64,
    /// Longitudinal stress in MPa.
    pub longitudinal_stress_mpa: f64,
    /// Yield strength over hoop stress.
    pub safety_factor_hoop: f64,
    /// Yield strength over longitudinal stress.
    pub safety_factor_longitudinal: f64,
    /// Grade derived from the smaller safety factor.
    pub status: StructuralStatus,
    /// Integrity score: 100, 75, 50, or 25 by grade.
    pub integrity_score: u8,
    /// Fatigue life remaining after one year of cycling, in percent.
    pub fatigue_life_remaining: f64,
}

/// Full diagnostics report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsReport {
    /// When the report was computed.
    pub timestamp: DateTime<Utc>,
    /// Fluid dynamics figures.
    pub fluid_dynamics: FluidDynamics,
    /// Heat transfer figures.
    pub heat_transfer: HeatTransfer,
    /// Water quality figures.
    pub water_quality: WaterQuality,
    /// Structural figures.
    pub structural_integrity: StructuralIntegrity,
    /// Overall risk in percent.
    pub overall_risk_score: f64,
    /// Overall risk grade.
    pub risk_level: RiskLevel,
}

/// Compute the full report for a snapshot.
pub fn diagnose(
    state: &TankState,
    tank: &TankConfig,
    constants: &DiagnosticsConstants,
    now: DateTime<Utc>,
) -> DiagnosticsReport {
    let fluid_dynamics = fluid_dynamics(state, tank, constants);
    let heat_transfer = heat_transfer(state, tank, constants);
    let water_quality = water_quality(state);
    let structural_integrity = structural_integrity(state, tank, constants);

    let mut factors: Vec<f64> = Vec::new();
    if fluid_dynamics
        .pipe_flow
        .as_ref()
        .is_some_and(|flow| flow.regime == FlowRegime::Turbulent)
    {
        factors.push(0.3);
    }
    if heat_transfer.net_heat_flow.abs() > 1000.0 {
        factors.push(0.2);
    }
    if matches!(water_quality.status, QualityStatus::Poor | QualityStatus::Unfit) {
        factors.push(0.4);
    }
    if matches!(
        structural_integrity.status,
        StructuralStatus::Monitor | StructuralStatus::Danger
    ) {
        factors.push(0.5);
    }
    let risk = mean(&factors).unwrap_or(0.1);

    DiagnosticsReport {
        timestamp: now,
        fluid_dynamics,
        heat_transfer,
        water_quality,
        structural_integrity,
        overall_risk_score: risk * 100.0,
        risk_level: risk_level(risk),
    }
}

fn fluid_dynamics(state: &TankState, tank: &TankConfig, c: &DiagnosticsConstants) -> FluidDynamics {
    let flow_m3s = state.flow_rate / 60.0 / 1000.0;
    let pipe_flow = (flow_m3s > 0.0).then(|| {
        let pipe_radius = c.pipe_diameter / 2.0;
        let velocity = flow_m3s / (PI * pipe_radius * pipe_radius);
        let reynolds_number = velocity * c.pipe_diameter / c.kinematic_viscosity;
        let regime = if reynolds_number < LAMINAR_LIMIT {
            FlowRegime::Laminar
        } else if reynolds_number > TURBULENT_LIMIT {
            FlowRegime::Turbulent
        } else {
            FlowRegime::Transitional
        };
        PipeFlow {
            velocity,
            reynolds_number,
            regime,
        }
    });

    let height = water_height(state.water_volume, tank);
    let hydrostatic_force = 0.5 * c.water_density * c.gravity * height * height * tank.diameter;
    FluidDynamics {
        pipe_flow,
        water_height: height,
        hydrostatic_force,
        overturning_moment: hydrostatic_force * height / 3.0,
    }
}

fn heat_transfer(state: &TankState, tank: &TankConfig, c: &DiagnosticsConstants) -> HeatTransfer {
    let radius = tank.diameter / 2.0;
    let surface_area = PI * tank.diameter * tank.height + 2.0 * PI * radius * radius;
    let delta_t = state.temperature - c.ambient_temperature;
    // Thermal resistance of the insulation shell, K/W.
    let resistance = c.insulation_thickness / (c.insulation_conductivity * surface_area);
    // One litre is taken as one kilogram.
    let heat_capacity = state.water_volume * c.specific_heat;

    let (heat_loss_rate, temperature_change_rate, time_constant) = if delta_t.abs() > 0.1 {
        let loss = delta_t / resistance;
        if heat_capacity > 0.0 {
            (loss, -loss / heat_capacity, Some(heat_capacity * resistance))
        } else {
            (loss, 0.0, None)
        }
    } else {
        (0.0, 0.0, None)
    };

    let solar_heat_gain = c.solar_irradiance * surface_area * c.solar_absorption * c.solar_exposure;
    HeatTransfer {
        heat_loss_rate,
        temperature_change_rate,
        time_constant,
        solar_heat_gain,
        net_heat_flow: solar_heat_gain - heat_loss_rate,
    }
}

fn water_quality(state: &TankState) -> WaterQuality {
    let score = (100.0 - state.turbidity * 0.5 - (state.ph_level - 7.0).abs() * 10.0)
        .clamp(0.0, 100.0);
    let status = if score >= 90.0 {
        QualityStatus::Excellent
    } else if score >= 75.0 {
        QualityStatus::Good
    } else if score >= 60.0 {
        QualityStatus::Fair
    } else if score >= 40.0 {
        QualityStatus::Poor
    } else {
        QualityStatus::Unfit
    };
    WaterQuality { score, status }
}

fn structural_integrity(
    state: &TankState,
    tank: &TankConfig,
    c: &DiagnosticsConstants,
) -> StructuralIntegrity {
    let internal_pressure = state.pressure * 100_000.0;
    let hoop = internal_pressure * tank.diameter / (2.0 * c.wall_thickness);
    let longitudinal = internal_pressure * tank.diameter / (4.0 * c.wall_thickness);
    let safety = |stress: f64| {
        if stress > 0.0 {
            c.yield_strength / stress
        } else {
            UNSTRESSED_SAFETY_FACTOR
        }
    };
    let safety_factor_hoop = safety(hoop);
    let safety_factor_longitudinal = safety(longitudinal);

    let min_factor = safety_factor_hoop.min(safety_factor_longitudinal);
    let (status, integrity_score) = if min_factor >= 3.0 {
        (StructuralStatus::Safe, 100)
    } else if min_factor >= 2.0 {
        (StructuralStatus::Acceptable, 75)
    } else if min_factor >= 1.5 {
        (StructuralStatus::Monitor, 50)
    } else {
        (StructuralStatus::Danger, 25)
    };

    let remaining = (c.fatigue_life_cycles - c.cycles_per_day * 365.0).max(0.0);
    let fatigue_life_remaining = if c.fatigue_life_cycles > 0.0 {
        remaining / c.fatigue_life_cycles * 100.0
    } else {
        0.0
    };

    StructuralIntegrity {
        hoop_stress_mpa: hoop / 1.0e6,
        longitudinal_stress_mpa: longitudinal / 1.0e6,
        safety_factor_hoop,
        safety_factor_longitudinal,
        status,
        integrity_score,
        fatigue_life_remaining,
    }
}

fn risk_level(risk: f64) -> RiskLevel {
    if risk >= 0.7 {
        RiskLevel::VeryHigh
    } else if risk >= 0.5 {
        RiskLevel::High
    } else if risk >= 0.3 {
        RiskLevel::Medium
    } else if risk >= 0.1 {
        RiskLevel::Low
    } else {
        RiskLevel::Acceptable
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    let count = u32::try_from(values.len()).ok().filter(|n| *n > 0)?;
    Some(values.iter().sum::<f64>() / f64::from(count))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn report_for(state: &TankState) -> DiagnosticsReport {
        diagnose(state, &TankConfig::default(), &DiagnosticsConstants::default(), Utc::now())
    }

    fn nominal() -> TankState {
        TankState::initial(&TankConfig::default(), Utc::now())
    }

    #[test]
    fn nominal_flow_is_turbulent() {
        // 20 L/min through a 50 mm pipe: v ~ 0.17 m/s, Re ~ 8500.
        let report = report_for(&nominal());
        let flow = report.fluid_dynamics.pipe_flow.unwrap();
        assert!((flow.velocity - 0.1698).abs() < 1e-3, "{}", flow.velocity);
        assert_eq!(flow.regime, FlowRegime::Turbulent);
    }

    #[test]
    fn nominal_water_is_excellent() {
        // 100 - 5 * 0.5 - 0 = 97.5
        let report = report_for(&nominal());
        assert!((report.water_quality.score - 97.5).abs() < 1e-9);
        assert_eq!(report.water_quality.status, QualityStatus::Excellent);
    }

    #[test]
    fn murky_water_is_graded_down() {
        let mut state = nominal();
        state.turbidity = 100.0;
        state.ph_level = 8.5;
        let report = report_for(&state);
        // 100 - 50 - 15 = 35
        assert_eq!(report.water_quality.status, QualityStatus::Unfit);
    }

    #[test]
    fn steel_tank_is_structurally_safe() {
        let report = report_for(&nominal());
        assert_eq!(report.structural_integrity.status, StructuralStatus::Safe);
        assert_eq!(report.structural_integrity.integrity_score, 100);
        // 10 cycles/day for a year out of 10 000 cycles.
        assert!((report.structural_integrity.fatigue_life_remaining - 63.5).abs() < 1e-9);
    }

    #[test]
    fn risk_averages_triggered_factors() {
        let mut state = nominal();
        state.turbidity = 100.0;
        let report = report_for(&state);
        // Turbulent flow (0.3), net solar gain above 1 kW (0.2), poor quality (0.4).
        assert!((report.overall_risk_score - 30.0).abs() < 1e-9);
        assert_eq!(report.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn empty_tank_has_no_time_constant() {
        let mut state = nominal();
        state.water_volume = 0.0;
        let report = report_for(&state);
        assert!(report.heat_transfer.time_constant.is_none());
        assert!(report.heat_transfer.temperature_change_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn report_serializes_snake_case() {
        let json = serde_json::to_value(report_for(&nominal())).unwrap();
        assert_eq!(json["water_quality"]["status"], "excellent");
        assert_eq!(json["fluid_dynamics"]["pipe_flow"]["regime"], "turbulent");
    }
}
