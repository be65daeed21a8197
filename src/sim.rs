//! Simulated vehicle for the demo binary.
//!
//! A deliberately crude stand-in behind the capability seams: per-axis
//! critical gains define where the closed loop would start to oscillate, and
//! the reported oscillation metric rises sharply as the live P or D gain
//! approaches its critical value. Good enough to watch a full tune run at
//! the real cadence; not a vehicle model.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::PersistError;
use crate::params::{Axis, Param, Stage};
use crate::vehicle::{GainStore, RateController, VehicleStatus};

// ---------------------------------------------------------------------------
// SimRates — attitude-rate controller stand-in
// ---------------------------------------------------------------------------

/// Simulated rate controller: a gain table plus an oscillation-onset model.
///
/// Call [`step`](Self::step) once per tick to refresh the measurement noise
/// before handing the tick to the tuner.
pub struct SimRates {
    gains: [f32; Param::COUNT],
    critical_p: [f32; Axis::COUNT],
    critical_d: [f32; Axis::COUNT],
    rng: StdRng,
    noise: f32,
}

impl SimRates {
    pub fn new(seed: u64) -> Self {
        let mut gains = [0.0; Param::COUNT];
        for &axis in Axis::all() {
            let (p, i, d) = match axis {
                Axis::Roll | Axis::Pitch => (0.135, 0.135, 0.0036),
                Axis::Yaw => (0.18, 0.018, 0.0),
            };
            gains[Param::new(axis, Stage::P).ordinal()] = p;
            gains[Param::new(axis, Stage::I).ordinal()] = i;
            gains[Param::new(axis, Stage::D).ordinal()] = d;
        }
        SimRates {
            gains,
            critical_p: [0.26, 0.23, 0.9],
            critical_d: [0.0062, 0.0055, 0.02],
            rng: StdRng::seed_from_u64(seed),
            noise: 1.0,
        }
    }

    /// Refresh measurement noise for this tick.
    pub fn step(&mut self) {
        self.noise = self.rng.gen_range(0.9..1.1);
    }

    /// How hard the loop is being driven relative to oscillation onset.
    fn load(&self, axis: Axis) -> f32 {
        let p = self.gains[Param::new(axis, Stage::P).ordinal()];
        let d = self.gains[Param::new(axis, Stage::D).ordinal()];
        let lp = p / self.critical_p[axis.index()];
        let ld = d / self.critical_d[axis.index()];
        lp.max(ld).max(0.0)
    }
}

impl RateController for SimRates {
    fn gain(&self, param: Param) -> f32 {
        self.gains[param.ordinal()]
    }

    fn set_gain(&mut self, param: Param, value: f32) {
        self.gains[param.ordinal()] = value;
    }

    fn slew_rate(&self, axis: Axis) -> f32 {
        // Quiet well below critical, rising fast past it.
        6.0 * self.load(axis).powi(4) * self.noise
    }

    fn attitude_error_deg(&self) -> f32 {
        2.0 * self.noise
    }
}

// ---------------------------------------------------------------------------
// SimStatus — vehicle status stand-in
// ---------------------------------------------------------------------------

/// Simulated vehicle status; flip the public fields to exercise the gates.
pub struct SimStatus {
    pub armed: bool,
    pub flying: bool,
    pub pilot_input: bool,
    pub mode_ok: bool,
    pub gyro_filter_hz: f32,
}

impl Default for SimStatus {
    fn default() -> Self {
        SimStatus { armed: true, flying: true, pilot_input: false, mode_ok: true, gyro_filter_hz: 20.0 }
    }
}

impl VehicleStatus for SimStatus {
    fn armed(&self) -> bool {
        self.armed
    }

    fn likely_flying(&self) -> bool {
        self.flying
    }

    fn pilot_input_active(&self) -> bool {
        self.pilot_input
    }

    fn mode_supports_tuning(&self) -> bool {
        self.mode_ok
    }

    fn gyro_filter_hz(&self) -> f32 {
        self.gyro_filter_hz
    }
}

// ---------------------------------------------------------------------------
// SimStore — persistent store stand-in
// ---------------------------------------------------------------------------

/// In-memory "flash": records what a real store would persist.
#[derive(Debug, Default)]
pub struct SimStore {
    flash: HashMap<Param, f32>,
}

impl SimStore {
    pub fn persisted(&self) -> &HashMap<Param, f32> {
        &self.flash
    }
}

impl GainStore for SimStore {
    fn persist(&mut self, param: Param, value: f32) -> Result<(), PersistError> {
        self.flash.insert(param, value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
