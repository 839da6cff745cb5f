//! Per-tick physical model of the tank.
//!
//! [`PhysicsEngine::update`] is a pure function of the previous state, the
//! tank geometry, the elapsed simulated time, and a random source. It never
//! fails: every output is clamped into its documented range.
//!
//! Update order within one step:
//!
//! 1. Ambient cooling toward the ambient temperature
//! 2. Evaporation loss (scaled by temperature)
//! 3. Leak loss, when the leak flag is set
//! 4. Inflow or outflow at the configured flow rate
//! 5. Loss applied, volume clamped to `[0, max_capacity]`
//! 6. Level recomputed from volume
//! 7. Hydrostatic pressure recomputed from the water column
//! 8. Bounded random drift of pH and turbidity
//! 9. `last_update` stamped

use std::f64::consts::PI;

use chrono::{DateTime, Utc};
use rand::Rng;
use tanktwin_types::{MAX_PH, MAX_TURBIDITY_NTU, MIN_PH, TankConfig, TankState};

/// Physical constants used by the per-tick model.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsConstants {
    /// Temperature the water relaxes toward, in degrees Celsius.
    pub ambient_temperature: f64,
    /// Fraction of the ambient difference closed per second.
    pub cooling_coefficient: f64,
    /// Evaporation rate at the reference temperature, in litres per hour.
    pub evaporation_rate_lph: f64,
    /// Temperature at which evaporation runs at the nominal rate.
    pub evaporation_reference_temperature: f64,
    /// Outflow through a simulated leak, in litres per minute.
    pub leak_rate_lpm: f64,
    /// Water density in kg/m3.
    pub water_density: f64,
    /// Gravitational acceleration in m/s2.
    pub gravity: f64,
    /// Maximum pH change per step.
    pub ph_jitter: f64,
    /// Maximum turbidity change per step, in NTU.
    pub turbidity_jitter: f64,
}

impl Default for PhysicsConstants {
    fn default() -> Self {
        Self {
            ambient_temperature: 20.0,
            cooling_coefficient: 0.01,
            evaporation_rate_lph: 0.05,
            evaporation_reference_temperature: 30.0,
            leak_rate_lpm: 5.0,
            water_density: 1000.0,
            gravity: 9.81,
            ph_jitter: 0.01,
            turbidity_jitter: 0.1,
        }
    }
}

/// Advances a [`TankState`] through simulated time.
#[derive(Debug, Clone, Default)]
pub struct PhysicsEngine {
    constants: PhysicsConstants,
}

impl PhysicsEngine {
    /// Create an engine with the given constants.
    pub const fn new(constants: PhysicsConstants) -> Self {
        Self { constants }
    }

    /// Return the constants in use.
    pub const fn constants(&self) -> &PhysicsConstants {
        &self.constants
    }

    /// Advance `state` by `dt` simulated seconds and return the new state.
    ///
    /// A non-finite or non-positive `dt` is treated as zero: no time passes,
    /// but ranges are still enforced and `last_update` is still stamped.
    pub fn update<R: Rng>(
        &self,
        state: &TankState,
        tank: &TankConfig,
        dt: f64,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> TankState {
        let c = &self.constants;
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        let mut next = state.clone();

        next.temperature +=
            (c.ambient_temperature - next.temperature) * c.cooling_coefficient * dt;

        let evaporation_lph =
            c.evaporation_rate_lph * next.temperature / c.evaporation_reference_temperature;
        let mut loss = evaporation_lph / 3600.0 * dt;
        if next.leak_detected {
            loss += c.leak_rate_lpm / 60.0 * dt;
        }
        // Evaporation goes negative below 0 C; it never adds water.
        let loss = loss.max(0.0);

        let mut volume = state.water_volume;
        let flow = next.flow_rate / 60.0 * dt;
        if next.is_filling {
            volume += flow;
        } else if next.is_draining {
            volume -= flow;
        }

        let capacity = tank.max_capacity.max(0.0);
        next.water_volume = clamp_finite(volume - loss, 0.0, capacity);
        next.water_level = if capacity > 0.0 {
            clamp_finite(next.water_volume / capacity * 100.0, 0.0, 100.0)
        } else {
            0.0
        };
        next.capacity = capacity;

        let head = water_height(next.water_volume, tank);
        next.pressure = 1.0 + c.water_density * c.gravity * head / 100_000.0;

        let ph_jitter = c.ph_jitter.abs();
        let turbidity_jitter = c.turbidity_jitter.abs();
        next.ph_level = clamp_finite(
            next.ph_level + rng.random_range(-ph_jitter..=ph_jitter),
            MIN_PH,
            MAX_PH,
        );
        next.turbidity = clamp_finite(
            next.turbidity + rng.random_range(-turbidity_jitter..=turbidity_jitter),
            0.0,
            MAX_TURBIDITY_NTU,
        );

        next.last_update = now;
        next
    }
}

/// Height of the water column in metres for a cylindrical tank.
pub fn water_height(volume_litres: f64, tank: &TankConfig) -> f64 {
    let radius = tank.diameter / 2.0;
    let area = PI * radius * radius;
    if area > 0.0 {
        (volume_litres / 1000.0) / area
    } else {
        0.0
    }
}

/// Clamp into `[min, max]`, mapping NaN to `min`.
fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() { min } else { value.clamp(min, max) }
}
