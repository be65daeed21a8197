//! # Vehicle capability seams
//!
//! ## Responsibility
//! The traits the tuner consumes from the rest of the flight stack: live gain
//! access on the attitude-rate controller, vehicle/flight status, and the
//! persistent parameter store. Implementations are injected at construction
//! so tests and the demo binary can substitute fakes.
//!
//! ## NOT Responsible For
//! - Flight-mode state machines, mixing, sensor drivers, storage internals;
//!   those live behind these seams on the vehicle side

use crate::error::PersistError;
use crate::params::{Axis, Param};

// ---------------------------------------------------------------------------
// SwitchPos
// ---------------------------------------------------------------------------

/// Position of the pilot's tuning switch, pushed in by the RC/aux handler.
///
/// With a 3-position switch: low aborts, mid tunes, high saves. With the
/// two-position option: high tunes, anything else idles/aborts, and saving
/// is handled by the auto-save timer instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPos {
    Low,
    Mid,
    High,
}

// ---------------------------------------------------------------------------
// RateController
// ---------------------------------------------------------------------------

/// Live gain access on the attitude-rate controller.
///
/// `set_gain` is the in-memory write; it takes effect on the control loop
/// immediately and is lost on reboot unless persisted via [`GainStore`].
pub trait RateController {
    fn gain(&self, param: Param) -> f32;

    fn set_gain(&mut self, param: Param, value: f32);

    /// Live oscillation metric for an axis. Values above the configured
    /// threshold indicate the closed loop is approaching instability.
    fn slew_rate(&self, axis: Axis) -> f32;

    /// Magnitude of the current attitude error, degrees.
    fn attitude_error_deg(&self) -> f32;
}

// ---------------------------------------------------------------------------
// VehicleStatus
// ---------------------------------------------------------------------------

/// Vehicle-level status flags sampled once per tick.
pub trait VehicleStatus {
    fn armed(&self) -> bool;

    fn likely_flying(&self) -> bool;

    /// True when the pilot commanded the vehicle this tick. Gain stepping is
    /// paused for a quiet period after pilot input so pilot-induced rate
    /// excursions are not mistaken for oscillation.
    fn pilot_input_active(&self) -> bool;

    /// Whether the active flight mode permits in-flight tuning.
    fn mode_supports_tuning(&self) -> bool;

    /// Gyro low-pass filter cutoff, Hz. Source for the per-axis filter setup.
    fn gyro_filter_hz(&self) -> f32;
}

// ---------------------------------------------------------------------------
// GainStore
// ---------------------------------------------------------------------------

/// Persistent parameter store. One call per gain, no transactions; a crash
/// mid-commit leaves a partially persisted tune, which is acceptable because
/// gains are re-initialized from storage on boot.
pub trait GainStore {
    fn persist(&mut self, param: Param, value: f32) -> Result<(), PersistError>;
}
