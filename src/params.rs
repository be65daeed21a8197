//! # Parameter Model
//!
//! ## Responsibility
//! The enumerated, ordered catalogue of tunable rate-controller gains: three
//! rotation axes x eight gain stages = 24 addressable parameters. Provides
//! ordinal layout, axis/stage derivation, display names for telemetry, and
//! the small fixed bitsets (`AxisSet`, `ParamSet`) used to track per-axis and
//! per-parameter progress.
//!
//! ## Guarantees
//! - Total: every (axis, stage) pair is addressable; every dispatch match is
//!   exhaustive, so there is no unmapped-input path to fail on
//! - Ordinal-stable: `ordinal = axis * 8 + stage`, axis-major. Within an
//!   axis, I always follows P and P sits two slots below D; the tuner's
//!   gain-coupling logic relies on this layout
//!
//! ## NOT Responsible For
//! - Gain values or ceilings (tuner reads those from config + controller)
//! - Persistence (session / store seam)

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Axis
// ---------------------------------------------------------------------------

/// One of the vehicle's three rotational control axes.
///
/// Iteration order is Roll -> Pitch -> Yaw and is also the default tuning
/// sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Roll,
    Pitch,
    Yaw,
}

impl Axis {
    pub const COUNT: usize = 3;

    /// All axes in tuning order.
    pub fn all() -> &'static [Axis] {
        &[Axis::Roll, Axis::Pitch, Axis::Yaw]
    }

    /// Human-readable name for status messages.
    pub fn name(self) -> &'static str {
        match self {
            Axis::Roll  => "Roll",
            Axis::Pitch => "Pitch",
            Axis::Yaw   => "Yaw",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Axis::Roll  => 0,
            Axis::Pitch => 1,
            Axis::Yaw   => 2,
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// A tunable characteristic of one axis's rate controller.
///
/// Only `D` and `P` are stepped by the tuning sequence. `I` is derived from
/// `P` via the configured PI ratio, the filters are set once per axis before
/// tuning begins, and `FeedForward`/`SlewMax` are inputs to policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    P,
    I,
    D,
    SlewMax,
    FilterT,
    FilterD,
    FilterE,
    FeedForward,
}

impl Stage {
    pub const COUNT: usize = 8;

    /// All stages in ordinal (per-axis layout) order.
    pub fn all() -> &'static [Stage] {
        &[
            Stage::P,
            Stage::I,
            Stage::D,
            Stage::SlewMax,
            Stage::FilterT,
            Stage::FilterD,
            Stage::FilterE,
            Stage::FeedForward,
        ]
    }

    /// Short suffix used in parameter display names.
    pub fn suffix(self) -> &'static str {
        match self {
            Stage::P           => "P",
            Stage::I           => "I",
            Stage::D           => "D",
            Stage::SlewMax     => "SMAX",
            Stage::FilterT     => "FLTT",
            Stage::FilterD     => "FLTD",
            Stage::FilterE     => "FLTE",
            Stage::FeedForward => "FF",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Stage::P           => 0,
            Stage::I           => 1,
            Stage::D           => 2,
            Stage::SlewMax     => 3,
            Stage::FilterT     => 4,
            Stage::FilterD     => 5,
            Stage::FilterE     => 6,
            Stage::FeedForward => 7,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

// ---------------------------------------------------------------------------
// Param — one addressable gain (axis, stage)
// ---------------------------------------------------------------------------

/// One addressable gain of the attitude-rate controller.
///
/// Params are totally ordered axis-major, stage-minor; the ordinal is stable
/// and is what telemetry records and the session's snapshot array index by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    pub axis: Axis,
    pub stage: Stage,
}

impl Param {
    pub const COUNT: usize = Axis::COUNT * Stage::COUNT;

    pub fn new(axis: Axis, stage: Stage) -> Self {
        Param { axis, stage }
    }

    /// Position in the axis-major, stage-minor layout.
    pub fn ordinal(self) -> usize {
        self.axis.index() * Stage::COUNT + self.stage.index()
    }

    /// Inverse of [`ordinal`](Self::ordinal). `None` for out-of-range input;
    /// a `None` here is a logic defect in the caller, never valid data.
    pub fn from_ordinal(ordinal: usize) -> Option<Param> {
        if ordinal >= Self::COUNT {
            return None;
        }
        Some(Param {
            axis: Axis::all()[ordinal / Stage::COUNT],
            stage: Stage::all()[ordinal % Stage::COUNT],
        })
    }

    /// All 24 params in ordinal order.
    pub fn all() -> impl Iterator<Item = Param> {
        (0..Self::COUNT).map(|i| Param::from_ordinal(i).unwrap())
    }

    /// Display name, e.g. `"Roll P"`, `"Yaw FLTE"`.
    pub fn name(self) -> &'static str {
        match (self.axis, self.stage) {
            (Axis::Roll,  Stage::P)           => "Roll P",
            (Axis::Roll,  Stage::I)           => "Roll I",
            (Axis::Roll,  Stage::D)           => "Roll D",
            (Axis::Roll,  Stage::SlewMax)     => "Roll SMAX",
            (Axis::Roll,  Stage::FilterT)     => "Roll FLTT",
            (Axis::Roll,  Stage::FilterD)     => "Roll FLTD",
            (Axis::Roll,  Stage::FilterE)     => "Roll FLTE",
            (Axis::Roll,  Stage::FeedForward) => "Roll FF",
            (Axis::Pitch, Stage::P)           => "Pitch P",
            (Axis::Pitch, Stage::I)           => "Pitch I",
            (Axis::Pitch, Stage::D)           => "Pitch D",
            (Axis::Pitch, Stage::SlewMax)     => "Pitch SMAX",
            (Axis::Pitch, Stage::FilterT)     => "Pitch FLTT",
            (Axis::Pitch, Stage::FilterD)     => "Pitch FLTD",
            (Axis::Pitch, Stage::FilterE)     => "Pitch FLTE",
            (Axis::Pitch, Stage::FeedForward) => "Pitch FF",
            (Axis::Yaw,   Stage::P)           => "Yaw P",
            (Axis::Yaw,   Stage::I)           => "Yaw I",
            (Axis::Yaw,   Stage::D)           => "Yaw D",
            (Axis::Yaw,   Stage::SlewMax)     => "Yaw SMAX",
            (Axis::Yaw,   Stage::FilterT)     => "Yaw FLTT",
            (Axis::Yaw,   Stage::FilterD)     => "Yaw FLTD",
            (Axis::Yaw,   Stage::FilterE)     => "Yaw FLTE",
            (Axis::Yaw,   Stage::FeedForward) => "Yaw FF",
        }
    }
}

impl std::fmt::Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// AxisSet — fixed bitset over Axis
// ---------------------------------------------------------------------------

/// A set of axes, backed by a small bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisSet(u8);

impl AxisSet {
    pub fn empty() -> Self {
        AxisSet(0)
    }

    /// The set containing all three axes.
    pub fn all() -> Self {
        let mut s = AxisSet::empty();
        for &a in Axis::all() {
            s.insert(a);
        }
        s
    }

    pub fn insert(&mut self, axis: Axis) {
        self.0 |= 1 << axis.index();
    }

    pub fn remove(&mut self, axis: Axis) {
        self.0 &= !(1 << axis.index());
    }

    pub fn contains(self, axis: Axis) -> bool {
        self.0 & (1 << axis.index()) != 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = Axis> {
        Axis::all().iter().copied().filter(move |&a| self.contains(a))
    }
}

impl FromIterator<Axis> for AxisSet {
    fn from_iter<I: IntoIterator<Item = Axis>>(iter: I) -> Self {
        let mut s = AxisSet::empty();
        for a in iter {
            s.insert(a);
        }
        s
    }
}

// ---------------------------------------------------------------------------
// ParamSet — fixed bitset over Param
// ---------------------------------------------------------------------------

/// A set of params, backed by one word (24 of 32 bits used).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParamSet(u32);

impl ParamSet {
    pub fn empty() -> Self {
        ParamSet(0)
    }

    pub fn insert(&mut self, param: Param) {
        self.0 |= 1 << param.ordinal();
    }

    pub fn remove(&mut self, param: Param) {
        self.0 &= !(1 << param.ordinal());
    }

    pub fn contains(self, param: Param) -> bool {
        self.0 & (1 << param.ordinal()) != 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = Param> {
        Param::all().filter(move |&p| self.contains(p))
    }
}

impl FromIterator<Param> for ParamSet {
    fn from_iter<I: IntoIterator<Item = Param>>(iter: I) -> Self {
        let mut s = ParamSet::empty();
        for p in iter {
            s.insert(p);
        }
        s
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ===== ordinal layout =====

    #[test]
    fn test_param_count_is_24() {
        assert_eq!(Param::COUNT, 24);
        assert_eq!(Param::all().count(), 24);
    }

    #[test]
    fn test_ordinal_roundtrip_all_params() {
        for p in Param::all() {
            assert_eq!(Param::from_ordinal(p.ordinal()), Some(p));
        }
    }

    #[test]
    fn test_from_ordinal_out_of_range_is_none() {
        assert!(Param::from_ordinal(Param::COUNT).is_none());
        assert!(Param::from_ordinal(usize::MAX).is_none());
    }

    #[test]
    fn test_axis_derivable_from_ordinal_ranges() {
        for p in Param::all() {
            let expected = match p.ordinal() {
                0..=7   => Axis::Roll,
                8..=15  => Axis::Pitch,
                16..=23 => Axis::Yaw,
                _ => unreachable!(),
            };
            assert_eq!(p.axis, expected);
        }
    }

    #[test]
    fn test_i_follows_p_within_axis() {
        for &axis in Axis::all() {
            let p = Param::new(axis, Stage::P);
            let i = Param::new(axis, Stage::I);
            assert_eq!(i.ordinal(), p.ordinal() + 1);
        }
    }

    #[test]
    fn test_p_is_two_below_d_within_axis() {
        for &axis in Axis::all() {
            let d = Param::new(axis, Stage::D);
            let p = Param::new(axis, Stage::P);
            assert_eq!(p.ordinal(), d.ordinal() - 2);
        }
    }

    #[test]
    fn test_ff_is_seven_above_p_within_axis() {
        for &axis in Axis::all() {
            let p = Param::new(axis, Stage::P);
            let ff = Param::new(axis, Stage::FeedForward);
            assert_eq!(ff.ordinal(), p.ordinal() + 7);
        }
    }

    // ===== names =====

    #[test]
    fn test_param_names_unique() {
        let names: std::collections::HashSet<&str> = Param::all().map(|p| p.name()).collect();
        assert_eq!(names.len(), Param::COUNT);
    }

    #[test]
    fn test_param_name_combines_axis_and_stage() {
        for p in Param::all() {
            assert_eq!(p.name(), format!("{} {}", p.axis.name(), p.stage.suffix()));
        }
    }

    #[test]
    fn test_display_matches_name() {
        let p = Param::new(Axis::Yaw, Stage::FilterE);
        assert_eq!(p.to_string(), "Yaw FLTE");
    }

    // ===== AxisSet =====

    #[test]
    fn test_axis_set_insert_contains() {
        let mut s = AxisSet::empty();
        assert!(!s.contains(Axis::Pitch));
        s.insert(Axis::Pitch);
        assert!(s.contains(Axis::Pitch));
        assert!(!s.contains(Axis::Roll));
    }

    #[test]
    fn test_axis_set_all_has_three() {
        assert_eq!(AxisSet::all().len(), 3);
    }

    #[test]
    fn test_axis_set_remove() {
        let mut s = AxisSet::all();
        s.remove(Axis::Yaw);
        assert!(!s.contains(Axis::Yaw));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_axis_set_clear_empties() {
        let mut s = AxisSet::all();
        s.clear();
        assert!(s.is_empty());
    }

    #[test]
    fn test_axis_set_iter_in_tuning_order() {
        let s: AxisSet = [Axis::Yaw, Axis::Roll].into_iter().collect();
        let axes: Vec<Axis> = s.iter().collect();
        assert_eq!(axes, vec![Axis::Roll, Axis::Yaw]);
    }

    // ===== ParamSet =====

    #[test]
    fn test_param_set_insert_remove() {
        let mut s = ParamSet::empty();
        let p = Param::new(Axis::Roll, Stage::D);
        s.insert(p);
        assert!(s.contains(p));
        s.remove(p);
        assert!(!s.contains(p));
        assert!(s.is_empty());
    }

    #[test]
    fn test_param_set_len_counts_members() {
        let s: ParamSet = Param::all().collect();
        assert_eq!(s.len(), Param::COUNT);
    }

    #[test]
    fn test_param_set_iter_yields_inserted() {
        let a = Param::new(Axis::Pitch, Stage::P);
        let b = Param::new(Axis::Yaw, Stage::D);
        let s: ParamSet = [a, b].into_iter().collect();
        let members: Vec<Param> = s.iter().collect();
        assert_eq!(members, vec![a, b]);
    }

    #[test]
    fn test_param_set_insert_is_idempotent() {
        let mut s = ParamSet::empty();
        let p = Param::new(Axis::Yaw, Stage::P);
        s.insert(p);
        s.insert(p);
        assert_eq!(s.len(), 1);
    }
}
