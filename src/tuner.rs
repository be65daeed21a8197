//! # Tune controller
//!
//! ## Responsibility
//! The switch-driven state machine that raises rate-controller gains in
//! flight. An external scheduler calls [`RateTuner::tick`] at a fixed 40 Hz;
//! each tick applies safety gating and then performs exactly one of:
//! abort/revert, commit/save, one slew step, or one adjustment step of the
//! active gain. Gains ramp by a fixed per-tick growth factor until the axis
//! oscillates or hits a configured ceiling, then back off by the safety
//! margin, slew smoothly to the reduced target, and the cursor advances
//! D -> P -> next axis.
//!
//! ## Guarantees
//! - Safe to call every tick even when it does nothing; all waiting is a
//!   fresh monotonic-timestamp comparison
//! - Aborts take effect on the very next tick: switch low, disable, mode
//!   change, disarm, loss of flight, or attitude error past the ceiling all
//!   revert every touched gain to its snapshot
//! - No gain is ever reduced below the configured fraction of its snapshot
//!
//! ## NOT Responsible For
//! - Computing rates or the oscillation metric (rate controller seam)
//! - Switch debouncing (RC handler pushes positions in)
//! - Storage internals (store seam)

use crate::config::TuneConfig;
use crate::error::TuneError;
use crate::params::{Axis, Param, Stage};
use crate::safety;
use crate::session::{Slew, TuneSession};
use crate::telemetry::{GainRecord, Severity, TelemetrySink};
use crate::vehicle::{GainStore, RateController, SwitchPos, VehicleStatus};

// ---------------------------------------------------------------------------
// Cadence and fixed policy constants
// ---------------------------------------------------------------------------

/// Nominal tick rate the external scheduler drives [`RateTuner::tick`] at.
pub const TICK_RATE_HZ: u32 = 40;

/// Hold-off after a stage change before the next gain is stepped. The
/// back-off slew (half a second) always completes inside this window.
pub const STAGE_DELAY_MS: u64 = 4000;

/// Quiet period after pilot input before gain stepping resumes.
pub const PILOT_INPUT_DELAY_MS: u64 = 4000;

/// Minimum spacing of repeated warning messages.
pub const WARNING_INTERVAL_MS: u64 = 5000;

/// Minimum spacing of ramp progress reports.
pub const GAIN_REPORT_INTERVAL_MS: u64 = 3000;

/// Ceiling applied to the yaw error-filter cutoff during filter setup.
pub const YAW_FILTER_E_MAX_HZ: f32 = 2.0;

/// Target- and derivative-filter cutoffs are set to this fraction of the
/// gyro filter cutoff.
pub const FILTER_T_MUL: f32 = 0.5;
pub const FILTER_D_MUL: f32 = 0.5;

/// Slew-limit value seeded on axes that have none configured.
pub const DEFAULT_SLEW_MAX: f32 = 50.0;

// ---------------------------------------------------------------------------
// RateTuner
// ---------------------------------------------------------------------------

/// The in-flight gain tuner. Owns one [`TuneSession`] and the injected
/// vehicle capabilities; construct once and call [`tick`](Self::tick) from
/// the scheduler with the current monotonic time in milliseconds.
pub struct RateTuner<C, V, S, T> {
    cfg: TuneConfig,
    session: TuneSession,
    sw_pos: SwitchPos,
    ctrl: C,
    vehicle: V,
    store: S,
    telemetry: T,
}

impl<C, V, S, T> RateTuner<C, V, S, T>
where
    C: RateController,
    V: VehicleStatus,
    S: GainStore,
    T: TelemetrySink,
{
    /// Build a tuner around the injected capabilities. Fails only on an
    /// out-of-range configuration.
    pub fn new(cfg: TuneConfig, ctrl: C, vehicle: V, store: S, telemetry: T) -> Result<Self, TuneError> {
        cfg.validate()?;
        Ok(RateTuner {
            cfg,
            session: TuneSession::new(),
            sw_pos: SwitchPos::Low,
            ctrl,
            vehicle,
            store,
            telemetry,
        })
    }

    // -----------------------------------------------------------------------
    // External surface
    // -----------------------------------------------------------------------

    /// Push the latest switch position in. Called by the RC/aux handler.
    pub fn set_switch_pos(&mut self, pos: SwitchPos) {
        self.sw_pos = pos;
    }

    pub fn switch_pos(&self) -> SwitchPos {
        self.sw_pos
    }

    pub fn config(&self) -> &TuneConfig {
        &self.cfg
    }

    pub fn session(&self) -> &TuneSession {
        &self.session
    }

    pub fn controller(&self) -> &C {
        &self.ctrl
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.ctrl
    }

    pub fn vehicle(&self) -> &V {
        &self.vehicle
    }

    pub fn vehicle_mut(&mut self) -> &mut V {
        &mut self.vehicle
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut T {
        &mut self.telemetry
    }

    /// Abort the tune if one has started: revert every touched gain, clear
    /// progress, and force the switch to the abort position so a stale Tune
    /// reading cannot immediately restart it.
    pub fn abort(&mut self) {
        if self.session.need_restore() {
            self.session.set_need_restore(false);
            self.session.restore(&mut self.ctrl);
        }
        self.session.set_tune_done_time(None);
        self.session.reset_progress();
        self.sw_pos = SwitchPos::Low;
    }

    /// One scheduler tick. `now` is monotonic milliseconds since boot.
    pub fn tick(&mut self, now: u64) {
        if !self.cfg.enabled {
            if self.session.need_restore() {
                self.telemetry.status(Severity::Emergency, "Tuning: disabled");
                self.abort();
            }
            return;
        }

        if !self.vehicle.mode_supports_tuning() {
            // Pilot switched to a mode that does not support tuning; any
            // pending gain changes must not survive it.
            if self.session.need_restore() {
                self.telemetry.status(Severity::Emergency, "Tuning: aborted");
            }
            self.abort();
            return;
        }

        if self.session.need_restore() {
            let att_error = self.ctrl.attitude_error_deg();
            if safety::attitude_error_exceeded(att_error) {
                self.telemetry.status(
                    Severity::Emergency,
                    &format!("Tuning: attitude error {att_error:.1}deg - aborting"),
                );
                self.abort();
                return;
            }
        }

        if self.vehicle.pilot_input_active() {
            self.session.last_pilot_input = now;
        }

        let (tune_pos, save_pos) = self.switch_targets();
        let flying = safety::armed_and_flying(&self.vehicle);

        if self.sw_pos == tune_pos && !flying && now > self.session.last_warning + WARNING_INTERVAL_MS {
            self.telemetry.status(Severity::Emergency, "Tuning: must be flying to tune");
            self.session.last_warning = now;
            return;
        }

        if self.sw_pos == SwitchPos::Low || !flying {
            // Abort requested, or the flight gate dropped.
            if self.session.need_restore() {
                self.session.set_need_restore(false);
                self.session.restore(&mut self.ctrl);
                self.telemetry.status(Severity::Emergency, "Tuning: reverted");
                self.session.set_tune_done_time(None);
            }
            self.session.reset_progress();
            return;
        }

        if save_pos == Some(self.sw_pos) && self.session.need_restore() {
            self.try_save(now);
        }

        if self.sw_pos != tune_pos {
            return;
        }

        if now.saturating_sub(self.session.last_stage_change) < STAGE_DELAY_MS {
            self.run_slew(now);
            return;
        }

        let Some(axis) = self.session.current_axis(self.cfg.axis_set()) else {
            // Sequence complete; hold gains and wait out the auto-save timer.
            if let Some(done_at) = self.session.tune_done_time() {
                if self.cfg.auto_save_s > 0
                    && now.saturating_sub(done_at) > u64::from(self.cfg.auto_save_s) * 1000
                    && self.try_save(now)
                {
                    self.session.set_tune_done_time(None);
                }
            }
            return;
        };

        if !self.session.need_restore() {
            // First active tick: capture the revert baseline, then seed a
            // slew limit on any axis that has none so the oscillation metric
            // is live during the ramp.
            self.session.set_need_restore(true);
            self.telemetry.status(Severity::Notice, "Tuning: starting tune");
            self.session.snapshot(&self.ctrl);
            for &a in Axis::all() {
                let smax = Param::new(a, Stage::SlewMax);
                if self.ctrl.gain(smax) <= 0.0 {
                    self.adjust_gain(smax, DEFAULT_SLEW_MAX);
                }
            }
        }

        if now.saturating_sub(self.session.last_pilot_input) < PILOT_INPUT_DELAY_MS {
            return;
        }

        if !self.session.filters_done().contains(axis) {
            self.telemetry.status(Severity::Info, &format!("Starting {} tune", axis.name()));
            self.setup_filters(axis);
        }

        let pname = Param::new(axis, self.session.current_stage());
        let pval = self.ctrl.gain(pname);
        let limit = self.gain_limit(pname);
        let limited = limit.is_some_and(|l| pval >= l);
        let srate = self.ctrl.slew_rate(axis);
        let oscillating = srate > self.cfg.osc_threshold;

        if limited || oscillating {
            self.back_off(now, axis, pname, pval, limit, srate, oscillating);
        } else {
            self.ramp(now, pname, pval, srate);
        }
    }

    // -----------------------------------------------------------------------
    // Tick internals
    // -----------------------------------------------------------------------

    /// Which switch positions request Tune and Save under the configured
    /// mapping. The two-position mapping has no save position; saving is
    /// the auto-save timer's job there.
    fn switch_targets(&self) -> (SwitchPos, Option<SwitchPos>) {
        if self.cfg.two_position_switch {
            (SwitchPos::High, None)
        } else {
            (SwitchPos::Mid, Some(SwitchPos::High))
        }
    }

    /// Per-tick growth factor: doubles the gain every `double_time_s`
    /// seconds of ramping at the nominal tick rate.
    fn gain_mul(&self) -> f32 {
        2.0_f32.powf(1.0 / (TICK_RATE_HZ as f32 * self.cfg.double_time_s))
    }

    /// Hard ceiling for a param, if it has one. Only the yaw P and D gains
    /// are capped; everything else is bounded by oscillation alone.
    fn gain_limit(&self, param: Param) -> Option<f32> {
        match (param.axis, param.stage) {
            (Axis::Yaw, Stage::P) => Some(self.cfg.yaw_p_max),
            (Axis::Yaw, Stage::D) => Some(self.cfg.yaw_d_max),
            _ => None,
        }
    }

    /// Ramp the active gain one step and report progress at most every
    /// [`GAIN_REPORT_INTERVAL_MS`].
    fn ramp(&mut self, now: u64, pname: Param, pval: f32, srate: f32) {
        let mut new_gain = pval * self.gain_mul();
        if new_gain <= 1e-4 {
            // A zero or denormal starting gain would never grow by
            // multiplication; kick it to a small working value.
            new_gain = 1e-3;
        }
        self.adjust_gain_limited(pname, new_gain);
        self.telemetry.gain_step(&GainRecord::new(now, srate, pval, pname));
        if now.saturating_sub(self.session.last_gain_report) > GAIN_REPORT_INTERVAL_MS {
            self.session.last_gain_report = now;
            self.telemetry
                .status(Severity::Info, &format!("{} {:.4} sr:{:.2}", pname.name(), new_gain, srate));
        }
    }

    /// The active gain oscillated or hit its ceiling: compute the reduced
    /// target, couple the paired P down when a D gain drops below its
    /// snapshot, begin the slew, and advance the cursor.
    fn back_off(
        &mut self,
        now: u64,
        axis: Axis,
        pname: Param,
        pval: f32,
        limit: Option<f32>,
        srate: f32,
        oscillating: bool,
    ) {
        // Full margin when oscillating; an exact clamp when only limited.
        let reduction = if oscillating {
            (100.0 - self.cfg.gain_margin_pct) * 0.01
        } else {
            1.0
        };
        let mut new_gain = pval * reduction;
        if let Some(l) = limit {
            if new_gain > l {
                new_gain = l;
            }
        }

        let old_gain = self.session.saved(pname);
        if new_gain < old_gain && pname.stage == Stage::D {
            // Lowering a D gain below its pre-tune value: lower the paired P
            // by the same ratio so the upcoming P stage does not start in
            // oscillation. Never drop P by more than a factor of two.
            let ratio = (new_gain / old_gain).max(0.5);
            let p_name = Param::new(axis, Stage::P);
            let old_pval = self.ctrl.gain(p_name);
            let new_pval = old_pval * ratio;
            self.telemetry.status(
                Severity::Info,
                &format!("Adjusting {} {:.3} -> {:.3}", p_name.name(), old_pval, new_pval),
            );
            self.adjust_gain_limited(p_name, new_pval);
        }

        let target = self.limit_gain(pname, new_gain);
        let steps = TICK_RATE_HZ / 2;
        let delta = (target - self.ctrl.gain(pname)) / steps as f32;
        self.session.set_slew(Some(Slew { param: pname, target, steps_left: steps, delta }));

        self.telemetry.gain_step(&GainRecord::new(now, srate, pval, pname));
        self.telemetry.status(Severity::Info, &format!("Tuning: {} done", pname.name()));
        self.advance_stage(axis);
        self.session.last_stage_change = now;
    }

    /// Advance an in-progress slew by one step. On the final step, log the
    /// settled value and, if that closed out the last axis, stamp the
    /// completion time that arms auto-save.
    fn run_slew(&mut self, now: u64) {
        let Some(mut slew) = self.session.slew() else {
            return;
        };
        let pval = self.ctrl.gain(slew.param);
        self.adjust_gain(slew.param, pval + slew.delta);
        slew.steps_left -= 1;
        let srate = self.ctrl.slew_rate(slew.param.axis);
        self.telemetry.gain_step(&GainRecord::new(now, srate, pval, slew.param));
        if slew.steps_left == 0 {
            self.telemetry
                .status(Severity::Info, &format!("{} {:.4}", slew.param.name(), pval));
            self.session.set_slew(None);
            if self.session.current_axis(self.cfg.axis_set()).is_none() {
                self.telemetry.status(Severity::Notice, "Tuning: done");
                self.session.set_tune_done_time(Some(now));
            }
        } else {
            self.session.set_slew(Some(slew));
        }
    }

    /// Move the stage cursor: D -> P, then P closes the axis out and the
    /// cursor resets to D for the next one.
    fn advance_stage(&mut self, axis: Axis) {
        if self.session.current_stage() == Stage::D {
            self.session.set_stage(Stage::P);
        } else {
            self.session.mark_axis_done(axis);
            self.telemetry.status(Severity::Notice, &format!("Tuning: {} done", axis.name()));
            self.session.set_stage(Stage::D);
        }
    }

    /// Write one gain, tracking it for revert. Writing a P gain also couples
    /// the axis's I gain: skipped entirely when the axis has feed-forward
    /// (there I stays at the trim value), otherwise I is marked changed and,
    /// when the configured ratio is at least one, set to `P / ratio`.
    fn adjust_gain(&mut self, param: Param, value: f32) {
        self.session.set_need_restore(true);
        self.session.mark_changed(param);
        self.ctrl.set_gain(param, value);

        if param.stage == Stage::P {
            let ff = self.ctrl.gain(Param::new(param.axis, Stage::FeedForward));
            if ff > 0.0 {
                return;
            }
            let iname = Param::new(param.axis, Stage::I);
            self.session.mark_changed(iname);
            let pi_ratio = match param.axis {
                Axis::Yaw => self.cfg.yaw_pi_ratio,
                Axis::Roll | Axis::Pitch => self.cfg.rp_pi_ratio,
            };
            if pi_ratio >= 1.0 {
                self.ctrl.set_gain(iname, value / pi_ratio);
            }
        }
    }

    /// [`adjust_gain`](Self::adjust_gain) with the reduction cap applied.
    fn adjust_gain_limited(&mut self, param: Param, value: f32) {
        let limited = self.limit_gain(param, value);
        self.adjust_gain(param, limited);
    }

    /// Apply the maximum-reduction cap, logging the clamp when it fires.
    fn limit_gain(&mut self, param: Param, value: f32) -> f32 {
        let saved = self.session.saved(param);
        match safety::cap_reduction(saved, value, self.cfg.reduce_max_pct) {
            Some(floor) => {
                self.telemetry.status(
                    Severity::Info,
                    &format!("Limiting {} {:.3} -> {:.3}", param.name(), value, floor),
                );
                floor
            }
            None => value,
        }
    }

    /// One-time per-axis filter setup: derive the target and derivative
    /// filter cutoffs from the gyro filter, clamp the yaw error filter, and
    /// mark the axis done. With auto-filter off the axis is marked done
    /// without any write.
    fn setup_filters(&mut self, axis: Axis) {
        if !self.cfg.auto_filter {
            self.session.mark_filters_done(axis);
            return;
        }
        let gyro_filter = self.vehicle.gyro_filter_hz();
        self.adjust_gain(Param::new(axis, Stage::FilterT), gyro_filter * FILTER_T_MUL);
        self.adjust_gain(Param::new(axis, Stage::FilterD), gyro_filter * FILTER_D_MUL);
        if axis == Axis::Yaw {
            let flte = Param::new(Axis::Yaw, Stage::FilterE);
            let value = self.ctrl.gain(flte);
            if value < 0.0 || value > YAW_FILTER_E_MAX_HZ {
                self.adjust_gain(flte, YAW_FILTER_E_MAX_HZ);
            }
        }
        self.session.mark_filters_done(axis);
    }

    /// Commit all changed gains. On success clears the restore flag; on
    /// failure leaves everything marked for a later retry or revert and
    /// emits a throttled error.
    fn try_save(&mut self, now: u64) -> bool {
        match self.session.commit(&self.ctrl, &mut self.store) {
            Ok(()) => {
                self.session.set_need_restore(false);
                self.telemetry.status(Severity::Notice, "Tuning: saved");
                true
            }
            Err(err) => {
                if now > self.session.last_warning + WARNING_INTERVAL_MS {
                    self.session.last_warning = now;
                    self.telemetry
                        .status(Severity::Emergency, &format!("Tuning: save failed: {err}"));
                }
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
