//! # Tune session + persistence bridge
//!
//! ## Responsibility
//! The mutable state of one tuning attempt: the pre-tune snapshot of every
//! gain, the set of gains touched since that snapshot, per-axis progress
//! bitsets, the stage cursor, the in-progress slew (if any), and the
//! timestamps the tick's throttles compare against. Also owns the three
//! operations against the external stores: snapshot, selective restore, and
//! selective commit.
//!
//! ## Guarantees
//! - Selective: restore and commit only ever touch gains recorded in
//!   `changed`; untouched gains are never written
//! - `!need_restore` implies `changed` is empty
//! - At most one slew is in progress at any tick
//!
//! ## NOT Responsible For
//! - Deciding when to snapshot/restore/commit (tuner state machine)
//! - The store implementations behind the seams

use crate::error::PersistError;
use crate::params::{Axis, AxisSet, Param, ParamSet, Stage};
use crate::vehicle::{GainStore, RateController};

// ---------------------------------------------------------------------------
// Slew — smoothed transition sub-state
// ---------------------------------------------------------------------------

/// An in-progress multi-tick transition of one gain to a computed target,
/// applied in equal steps to avoid an instantaneous gain change in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slew {
    pub param: Param,
    pub target: f32,
    pub steps_left: u32,
    pub delta: f32,
}

// ---------------------------------------------------------------------------
// TuneSession
// ---------------------------------------------------------------------------

/// State of one tuning attempt. Created empty; populated on the first active
/// tick; cleared on abort or after a save. Purely in-memory.
#[derive(Debug, Clone)]
pub struct TuneSession {
    /// Snapshot of every gain at tune start, indexed by param ordinal.
    saved: [f32; Param::COUNT],
    /// Gains touched since the snapshot.
    changed: ParamSet,
    axes_done: AxisSet,
    filters_done: AxisSet,
    /// Tuning stage cursor; only ever D or P.
    current_stage: Stage,
    slew: Option<Slew>,
    /// Set when every enabled axis completed; drives auto-save.
    tune_done_time: Option<u64>,
    /// True iff any gain has been modified and not yet reverted/committed.
    need_restore: bool,
    pub(crate) last_stage_change: u64,
    pub(crate) last_pilot_input: u64,
    pub(crate) last_warning: u64,
    pub(crate) last_gain_report: u64,
}

impl TuneSession {
    pub fn new() -> Self {
        TuneSession {
            saved: [0.0; Param::COUNT],
            changed: ParamSet::empty(),
            axes_done: AxisSet::empty(),
            filters_done: AxisSet::empty(),
            current_stage: Stage::D,
            slew: None,
            tune_done_time: None,
            need_restore: false,
            last_stage_change: 0,
            last_pilot_input: 0,
            last_warning: 0,
            last_gain_report: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn need_restore(&self) -> bool {
        self.need_restore
    }

    pub fn changed(&self) -> ParamSet {
        self.changed
    }

    pub fn axes_done(&self) -> AxisSet {
        self.axes_done
    }

    pub fn filters_done(&self) -> AxisSet {
        self.filters_done
    }

    pub fn current_stage(&self) -> Stage {
        self.current_stage
    }

    pub fn slew(&self) -> Option<Slew> {
        self.slew
    }

    pub fn tune_done_time(&self) -> Option<u64> {
        self.tune_done_time
    }

    /// The snapshotted pre-tune value of a gain.
    pub fn saved(&self, param: Param) -> f32 {
        self.saved[param.ordinal()]
    }

    /// The first enabled axis not yet done, or `None` when the sequence is
    /// complete. Derived fresh each call; this is the `current_axis` cursor.
    pub fn current_axis(&self, enabled: AxisSet) -> Option<Axis> {
        Axis::all()
            .iter()
            .copied()
            .find(|&a| enabled.contains(a) && !self.axes_done.contains(a))
    }

    // -----------------------------------------------------------------------
    // Cursor / progress mutation (tuner-internal)
    // -----------------------------------------------------------------------

    pub(crate) fn set_need_restore(&mut self, v: bool) {
        self.need_restore = v;
    }

    pub(crate) fn mark_changed(&mut self, param: Param) {
        self.changed.insert(param);
    }

    pub(crate) fn mark_axis_done(&mut self, axis: Axis) {
        self.axes_done.insert(axis);
    }

    pub(crate) fn mark_filters_done(&mut self, axis: Axis) {
        self.filters_done.insert(axis);
    }

    pub(crate) fn set_stage(&mut self, stage: Stage) {
        debug_assert!(matches!(stage, Stage::D | Stage::P));
        self.current_stage = stage;
    }

    pub(crate) fn set_slew(&mut self, slew: Option<Slew>) {
        self.slew = slew;
    }

    pub(crate) fn set_tune_done_time(&mut self, t: Option<u64>) {
        self.tune_done_time = t;
    }

    /// Reset axis progress, the stage cursor, and any in-progress slew.
    /// Used on abort and whenever the sequence restarts from scratch.
    pub(crate) fn reset_progress(&mut self) {
        self.axes_done.clear();
        self.filters_done.clear();
        self.current_stage = Stage::D;
        self.slew = None;
    }

    // -----------------------------------------------------------------------
    // Persistence bridge
    // -----------------------------------------------------------------------

    /// Capture the current value of every gain as the revert baseline.
    pub(crate) fn snapshot(&mut self, ctrl: &impl RateController) {
        for p in Param::all() {
            self.saved[p.ordinal()] = ctrl.gain(p);
        }
    }

    /// Write every changed gain back to its snapshotted value and clear the
    /// changed set. A second call with nothing changed is a no-op.
    pub(crate) fn restore(&mut self, ctrl: &mut impl RateController) {
        for p in self.changed.iter() {
            ctrl.set_gain(p, self.saved[p.ordinal()]);
            self.changed.remove(p);
        }
    }

    /// Persist every changed gain at its current live value, folding each
    /// into the snapshot as it succeeds.
    ///
    /// On failure the failed and remaining gains stay marked changed, so a
    /// later save retries only the remainder and an abort still reverts them.
    pub(crate) fn commit(
        &mut self,
        ctrl: &impl RateController,
        store: &mut impl GainStore,
    ) -> Result<(), PersistError> {
        for p in self.changed.iter() {
            let value = ctrl.gain(p);
            store.persist(p, value)?;
            self.saved[p.ordinal()] = value;
            self.changed.remove(p);
        }
        Ok(())
    }
}

impl Default for TuneSession {
    fn default() -> Self {
        TuneSession::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
