//! End-to-end tuning scenarios: the tuner driven tick by tick against fake
//! vehicle capabilities with a simulated clock.

use rate_autotune::{
    Axis, GainStore, MemorySink, Param, PersistError, RateController, RateTuner, Stage, SwitchPos,
    TuneConfig, VehicleStatus, TICK_RATE_HZ,
};

// ---------------------------------------------------------------------------
// Fake vehicle capabilities
// ---------------------------------------------------------------------------

struct FakeRates {
    gains: [f32; Param::COUNT],
    srate: [f32; Axis::COUNT],
    att_error: f32,
}

impl FakeRates {
    /// Typical mid-size multirotor starting gains.
    fn new() -> Self {
        let mut gains = [0.0; Param::COUNT];
        for &axis in Axis::all() {
            gains[Param::new(axis, Stage::P).ordinal()] = 0.135;
            gains[Param::new(axis, Stage::I).ordinal()] = 0.135;
            gains[Param::new(axis, Stage::D).ordinal()] = 0.0036;
            gains[Param::new(axis, Stage::SlewMax).ordinal()] = 50.0;
        }
        FakeRates { gains, srate: [0.0; Axis::COUNT], att_error: 1.0 }
    }
}

impl RateController for FakeRates {
    fn gain(&self, param: Param) -> f32 {
        self.gains[param.ordinal()]
    }
    fn set_gain(&mut self, param: Param, value: f32) {
        self.gains[param.ordinal()] = value;
    }
    fn slew_rate(&self, axis: Axis) -> f32 {
        self.srate[axis.index()]
    }
    fn attitude_error_deg(&self) -> f32 {
        self.att_error
    }
}

struct FakeStatus {
    armed: bool,
    flying: bool,
    pilot_input: bool,
    mode_ok: bool,
}

impl Default for FakeStatus {
    fn default() -> Self {
        FakeStatus { armed: true, flying: true, pilot_input: false, mode_ok: true }
    }
}

impl VehicleStatus for FakeStatus {
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
        20.0
    }
}

#[derive(Default)]
struct FakeStore {
    persisted: Vec<(Param, f32)>,
}

impl GainStore for FakeStore {
    fn persist(&mut self, param: Param, value: f32) -> Result<(), PersistError> {
        self.persisted.push((param, value));
        Ok(())
    }
}

type Tuner = RateTuner<FakeRates, FakeStatus, FakeStore, MemorySink>;

const TICK_MS: u64 = 1000 / TICK_RATE_HZ as u64;
/// Clock start: well after "boot", as on a real vehicle mid-flight.
const T0: u64 = 60_000;

fn harness(cfg: TuneConfig) -> Tuner {
    RateTuner::new(cfg, FakeRates::new(), FakeStatus::default(), FakeStore::default(), MemorySink::new(1 << 16))
        .unwrap()
}

fn roll_only_cfg() -> TuneConfig {
    TuneConfig { enabled: true, axes: vec![Axis::Roll], ..Default::default() }
}

fn all_axes_cfg() -> TuneConfig {
    TuneConfig { enabled: true, ..Default::default() }
}

fn statuses(t: &Tuner) -> Vec<String> {
    t.telemetry().statuses().iter().map(|s| s.message.clone()).collect()
}

// ---------------------------------------------------------------------------
// Scenario A — monotonic ramp at the configured doubling rate
// ---------------------------------------------------------------------------

#[test]
fn ramp_follows_growth_factor_without_oscillation() {
    let mut t = harness(roll_only_cfg());
    t.set_switch_pos(SwitchPos::Mid);

    let d = Param::new(Axis::Roll, Stage::D);
    let d0 = t.controller().gain(d);
    let growth = 2.0_f32.powf(1.0 / (TICK_RATE_HZ as f32 * 10.0));
    assert!((growth - 1.001_734).abs() < 1e-5);

    let n = 200;
    let mut now = T0;
    for _ in 0..n {
        t.tick(now);
        now += TICK_MS;
    }

    let expected = d0 * growth.powi(n);
    let actual = t.controller().gain(d);
    assert!(
        (actual / expected - 1.0).abs() < 1e-3,
        "after {n} quiet ticks expected {expected}, got {actual}"
    );
}

#[test]
fn ramp_records_strictly_increase() {
    let mut t = harness(roll_only_cfg());
    t.set_switch_pos(SwitchPos::Mid);
    let mut now = T0;
    for _ in 0..100 {
        t.tick(now);
        now += TICK_MS;
    }
    let d = Param::new(Axis::Roll, Stage::D);
    let ramp: Vec<f32> = t
        .telemetry()
        .records()
        .iter()
        .filter(|r| r.param == d)
        .map(|r| r.gain)
        .collect();
    assert!(ramp.len() > 50);
    assert!(ramp.windows(2).all(|w| w[1] > w[0]), "ramp values must strictly increase");
}

// ---------------------------------------------------------------------------
// Scenario B — oscillation back-off and D->P coupling
// ---------------------------------------------------------------------------

#[test]
fn first_tick_oscillation_backs_off_forty_pct_and_halves_p() {
    // Cap disabled so the raw margin is observable.
    let mut t = harness(TuneConfig {
        axes: vec![Axis::Roll],
        reduce_max_pct: 100.0,
        ..all_axes_cfg()
    });
    t.controller_mut().srate[Axis::Roll.index()] = 10.0; // above threshold from the start
    t.set_switch_pos(SwitchPos::Mid);

    let d = Param::new(Axis::Roll, Stage::D);
    let p = Param::new(Axis::Roll, Stage::P);
    let d0 = t.controller().gain(d);
    let p0 = t.controller().gain(p);

    t.tick(T0);

    // gain_margin 60 => target = 0.40 * current D
    let slew = t.session().slew().expect("back-off starts a slew");
    assert_eq!(slew.param, d);
    assert!((slew.target - 0.40 * d0).abs() < 1e-7);

    // D dropped below its snapshot: P follows by the same ratio, floored at half
    assert!((t.controller().gain(p) - p0 * 0.5).abs() < 1e-7);
    assert_eq!(t.session().current_stage(), Stage::P);
}

#[test]
fn backoff_target_respects_reduction_cap() {
    let mut t = harness(roll_only_cfg()); // reduce_max 20%
    t.controller_mut().srate[Axis::Roll.index()] = 10.0;
    t.set_switch_pos(SwitchPos::Mid);
    let d = Param::new(Axis::Roll, Stage::D);
    let d0 = t.controller().gain(d);

    t.tick(T0);

    let slew = t.session().slew().unwrap();
    assert!((slew.target - d0 * 0.8).abs() < 1e-7, "target floored at 80% of snapshot");
}

// ---------------------------------------------------------------------------
// Scenario C — abort mid-slew reverts everything
// ---------------------------------------------------------------------------

#[test]
fn abort_mid_slew_restores_saved_values_and_resets_cursor() {
    let mut t = harness(roll_only_cfg());
    t.set_switch_pos(SwitchPos::Mid);

    let before: Vec<f32> = Param::all().map(|p| t.controller().gain(p)).collect();

    // Ramp a little, then trip oscillation to start a slew.
    let mut now = T0;
    for _ in 0..10 {
        t.tick(now);
        now += TICK_MS;
    }
    t.controller_mut().srate[Axis::Roll.index()] = 10.0;
    t.tick(now);
    now += TICK_MS;

    // A few slew steps in, the pilot bails out.
    for _ in 0..5 {
        t.tick(now);
        now += TICK_MS;
    }
    assert!(t.session().slew().is_some(), "mid-slew precondition");

    t.set_switch_pos(SwitchPos::Low);
    t.tick(now);

    let after: Vec<f32> = Param::all().map(|p| t.controller().gain(p)).collect();
    assert_eq!(before, after, "every touched gain reverts to its snapshot");
    assert!(!t.session().need_restore());
    assert!(t.session().changed().is_empty());
    assert!(t.session().slew().is_none());
    assert!(t.session().axes_done().is_empty());
    assert_eq!(t.session().current_stage(), Stage::D);
}

#[test]
fn revert_is_idempotent() {
    let mut t = harness(roll_only_cfg());
    t.set_switch_pos(SwitchPos::Mid);
    t.tick(T0);
    t.set_switch_pos(SwitchPos::Low);
    t.tick(T0 + TICK_MS);
    let gains: Vec<f32> = Param::all().map(|p| t.controller().gain(p)).collect();
    t.tick(T0 + 2 * TICK_MS); // second revert tick with nothing to restore
    let gains2: Vec<f32> = Param::all().map(|p| t.controller().gain(p)).collect();
    assert_eq!(gains, gains2);
    assert!(!t.session().need_restore());
}

// ---------------------------------------------------------------------------
// Scenario D — full sequence and auto-save
// ---------------------------------------------------------------------------

/// Drive a complete tune with the oscillation metric pinned high, so every
/// evaluation backs off immediately: D then P on each enabled axis.
fn run_to_done(t: &mut Tuner, start: u64) -> u64 {
    for &axis in Axis::all() {
        t.controller_mut().srate[axis.index()] = 10.0;
    }
    t.set_switch_pos(SwitchPos::Mid);
    let mut now = start;
    for _ in 0..4000 {
        t.tick(now);
        now += TICK_MS;
        if t.session().tune_done_time().is_some() {
            return now;
        }
    }
    panic!("tune did not complete in 4000 ticks");
}

#[test]
fn full_sequence_marks_axes_done_in_order() {
    let mut t = harness(all_axes_cfg());
    run_to_done(&mut t, T0);
    for &axis in Axis::all() {
        assert!(t.session().axes_done().contains(axis), "{axis} not done");
    }
    let msgs = statuses(&t);
    let order: Vec<usize> = ["Tuning: Roll done", "Tuning: Pitch done", "Tuning: Yaw done"]
        .iter()
        .map(|m| msgs.iter().position(|s| s.as_str() == *m).expect(m))
        .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]), "axes finish in tuning order");
    assert!(msgs.contains(&"Tuning: done".to_string()));
}

#[test]
fn auto_save_commits_without_switch_move() {
    let mut t = harness(TuneConfig { auto_save_s: 5, ..all_axes_cfg() });
    let mut now = run_to_done(&mut t, T0);

    assert!(t.session().need_restore(), "gains still un-persisted at completion");
    assert!(t.store().persisted.is_empty());

    // 5 simulated seconds later, with the switch untouched, the commit fires.
    for _ in 0..6 * TICK_RATE_HZ as u64 {
        t.tick(now);
        now += TICK_MS;
    }

    assert!(!t.session().need_restore());
    assert!(t.session().changed().is_empty());
    assert!(t.session().tune_done_time().is_none());
    assert!(!t.store().persisted.is_empty());
    assert!(statuses(&t).contains(&"Tuning: saved".to_string()));

    // Persisted values match the live gains.
    for &(p, v) in &t.store().persisted {
        assert_eq!(v, t.controller().gain(p), "{p} persisted at a stale value");
    }
}

#[test]
fn auto_save_disabled_keeps_waiting() {
    let mut t = harness(all_axes_cfg()); // auto_save_s = 0
    let mut now = run_to_done(&mut t, T0);
    for _ in 0..20 * TICK_RATE_HZ as u64 {
        t.tick(now);
        now += TICK_MS;
    }
    assert!(t.session().need_restore(), "nothing saves without a save request");
    assert!(t.store().persisted.is_empty());
}

#[test]
fn switch_save_after_done_commits() {
    let mut t = harness(all_axes_cfg());
    let now = run_to_done(&mut t, T0);
    t.set_switch_pos(SwitchPos::High);
    t.tick(now);
    assert!(!t.session().need_restore());
    assert!(!t.store().persisted.is_empty());
}

// ---------------------------------------------------------------------------
// Two-position switch mapping
// ---------------------------------------------------------------------------

#[test]
fn two_position_high_tunes_and_low_aborts() {
    let mut t = harness(TuneConfig {
        two_position_switch: true,
        axes: vec![Axis::Roll],
        ..all_axes_cfg()
    });
    t.set_switch_pos(SwitchPos::High);
    t.tick(T0);
    assert!(t.session().need_restore(), "high starts the tune");

    t.set_switch_pos(SwitchPos::Low);
    t.tick(T0 + TICK_MS);
    assert!(!t.session().need_restore(), "low reverts");
}

#[test]
fn two_position_high_never_saves() {
    let mut t = harness(TuneConfig {
        two_position_switch: true,
        axes: vec![Axis::Roll],
        ..all_axes_cfg()
    });
    t.controller_mut().srate[Axis::Roll.index()] = 10.0;
    t.set_switch_pos(SwitchPos::High);
    let mut now = T0;
    for _ in 0..2000 {
        t.tick(now);
        now += TICK_MS;
    }
    assert!(t.session().tune_done_time().is_some(), "sequence completes");
    assert!(t.store().persisted.is_empty(), "no save position, no auto-save configured");
    assert!(t.session().need_restore());
}

// ---------------------------------------------------------------------------
// Session invariants across arbitrary flows
// ---------------------------------------------------------------------------

#[test]
fn restore_flag_clear_implies_changed_empty() {
    let mut t = harness(all_axes_cfg());
    let mut now = T0;

    fn run_checked(t: &mut Tuner, now: &mut u64) {
        for _ in 0..50 {
            t.tick(*now);
            *now += TICK_MS;
            if !t.session().need_restore() {
                assert!(t.session().changed().is_empty());
            }
        }
    }

    t.set_switch_pos(SwitchPos::Mid);
    run_checked(&mut t, &mut now);
    t.controller_mut().srate[Axis::Roll.index()] = 10.0;
    run_checked(&mut t, &mut now);
    t.set_switch_pos(SwitchPos::Low);
    run_checked(&mut t, &mut now);
    t.set_switch_pos(SwitchPos::Mid);
    run_checked(&mut t, &mut now);
}

#[test]
fn pilot_input_defers_stepping_but_not_session_start() {
    let mut t = harness(roll_only_cfg());
    t.vehicle_mut().pilot_input = true;
    t.set_switch_pos(SwitchPos::Mid);
    let d = Param::new(Axis::Roll, Stage::D);
    let d0 = t.controller().gain(d);

    let mut now = T0;
    for _ in 0..100 {
        t.tick(now);
        now += TICK_MS;
    }
    assert!(t.session().need_restore(), "snapshot taken");
    assert_eq!(t.controller().gain(d), d0, "no stepping while the pilot is active");

    t.vehicle_mut().pilot_input = false;
    // Quiet period runs from the last pilot input.
    for _ in 0..200 {
        t.tick(now);
        now += TICK_MS;
    }
    assert!(t.controller().gain(d) > d0, "stepping resumes after the quiet period");
}
