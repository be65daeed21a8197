//! Tuner configuration.
//!
//! Mirrors the recognized option surface: which axes to tune, how fast to
//! raise gains, how hard to back off, the yaw ceilings, PI coupling ratios,
//! filter and save automation, and the switch mapping policy. Loadable from
//! TOML; every field has a flight-sensible default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TuneError;
use crate::params::{Axis, AxisSet};

/// Configuration for [`RateTuner`](crate::tuner::RateTuner).
///
/// Defaults are conservative for a mid-size multirotor; raise
/// `double_time_s` or `gain_margin_pct` for a slower, safer tune.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TuneConfig {
    /// Master enable. When false the tick aborts any in-progress session and
    /// does nothing else.
    pub enabled: bool,
    /// Axes to tune, in Roll -> Pitch -> Yaw order regardless of listing order.
    pub axes: Vec<Axis>,
    /// Seconds for a gain to double while ramping. Raise for a slower tune.
    pub double_time_s: f32,
    /// Percentage backed off a gain after oscillation is detected.
    pub gain_margin_pct: f32,
    /// Oscillation-metric threshold. Lower is more conservative.
    pub osc_threshold: f32,
    /// Hard ceiling for Yaw P.
    pub yaw_p_max: f32,
    /// Hard ceiling for Yaw D.
    pub yaw_d_max: f32,
    /// P-to-I ratio applied on roll/pitch P writes. Raise for a lower I gain.
    pub rp_pi_ratio: f32,
    /// P-to-I ratio applied on yaw P writes.
    pub yaw_pi_ratio: f32,
    /// Derive per-axis filter cutoffs from the gyro filter before tuning.
    pub auto_filter: bool,
    /// Seconds after tune completion before an automatic save. 0 disables.
    /// Needed when running with a two-position switch, which has no save
    /// position.
    pub auto_save_s: u32,
    /// Maximum allowed reduction from a gain's pre-tune value, percent.
    /// Bounds how far a false-positive oscillation at low gain can drag the
    /// tune down.
    pub reduce_max_pct: f32,
    /// Two-position switch mapping: high tunes, anything else idles/aborts.
    pub two_position_switch: bool,
}

impl Default for TuneConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            axes: Axis::all().to_vec(),
            double_time_s: 10.0,
            gain_margin_pct: 60.0,
            osc_threshold: 5.0,
            yaw_p_max: 0.5,
            yaw_d_max: 0.01,
            rp_pi_ratio: 1.0,
            yaw_pi_ratio: 10.0,
            auto_filter: true,
            auto_save_s: 0,
            reduce_max_pct: 20.0,
            two_position_switch: false,
        }
    }
}

impl TuneConfig {
    /// Parse from a TOML string. Unknown keys are rejected.
    pub fn from_toml_str(s: &str) -> Result<Self, TuneError> {
        let cfg: TuneConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TuneError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// The enabled axes as a bitset, in tuning order.
    pub fn axis_set(&self) -> AxisSet {
        self.axes.iter().copied().collect()
    }

    /// Range-check every field. Called by the loaders; call directly after
    /// constructing a config by hand.
    pub fn validate(&self) -> Result<(), TuneError> {
        if self.double_time_s <= 0.0 {
            return Err(TuneError::Config(format!(
                "double_time_s must be positive, got {}",
                self.double_time_s
            )));
        }
        if !(0.0..100.0).contains(&self.gain_margin_pct) {
            return Err(TuneError::Config(format!(
                "gain_margin_pct must be in [0, 100), got {}",
                self.gain_margin_pct
            )));
        }
        if self.osc_threshold <= 0.0 {
            return Err(TuneError::Config(format!(
                "osc_threshold must be positive, got {}",
                self.osc_threshold
            )));
        }
        if self.yaw_p_max <= 0.0 || self.yaw_d_max <= 0.0 {
            return Err(TuneError::Config(format!(
                "yaw gain ceilings must be positive, got P max {} / D max {}",
                self.yaw_p_max, self.yaw_d_max
            )));
        }
        if self.rp_pi_ratio <= 0.0 || self.yaw_pi_ratio <= 0.0 {
            return Err(TuneError::Config(format!(
                "PI ratios must be positive, got roll/pitch {} / yaw {}",
                self.rp_pi_ratio, self.yaw_pi_ratio
            )));
        }
        if !(0.0..=100.0).contains(&self.reduce_max_pct) {
            return Err(TuneError::Config(format!(
                "reduce_max_pct must be in [0, 100], got {}",
                self.reduce_max_pct
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
