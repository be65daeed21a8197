//! # Safety monitor
//!
//! ## Responsibility
//! The checks that can stop or bound the tune independent of the switch:
//! the hard attitude-error ceiling, the armed-and-flying gate, and the
//! global cap on how far any gain may be reduced below its pre-tune value.
//!
//! ## Guarantees
//! - Pure: every check is a function of its inputs; the tuner decides what
//!   to do (abort, clamp, log) with the verdicts

use crate::vehicle::VehicleStatus;

/// Attitude error (degrees) beyond which an in-progress tune aborts.
pub const MAX_ATTITUDE_ERROR_DEG: f32 = 25.0;

/// True when the live attitude error requires an abort.
pub fn attitude_error_exceeded(error_deg: f32) -> bool {
    error_deg > MAX_ATTITUDE_ERROR_DEG
}

/// The flight gate: tuning may only run, and stepped gains only survive,
/// while the vehicle is both armed and likely flying.
pub fn armed_and_flying(status: &impl VehicleStatus) -> bool {
    status.armed() && status.likely_flying()
}

/// Apply the maximum-reduction cap to a candidate gain value.
///
/// Returns `Some(floor)` when `candidate` would reduce the gain more than
/// `reduce_max_pct` percent below `saved`; the caller writes the floor
/// instead and logs the clamp. Returns `None` when no clamping is needed,
/// when the cap is disabled (`reduce_max_pct >= 100`), or when `saved` is
/// not positive.
pub fn cap_reduction(saved: f32, candidate: f32, reduce_max_pct: f32) -> Option<f32> {
    if !(0.0..100.0).contains(&reduce_max_pct) || saved <= 0.0 {
        return None;
    }
    let reduction_pct = 100.0 * (saved - candidate) / saved;
    if reduction_pct > reduce_max_pct {
        Some(saved * (100.0 - reduce_max_pct) * 0.01)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attitude_error_at_ceiling_does_not_trip() {
        assert!(!attitude_error_exceeded(MAX_ATTITUDE_ERROR_DEG));
    }

    #[test]
    fn test_attitude_error_above_ceiling_trips() {
        assert!(attitude_error_exceeded(25.1));
    }

    #[test]
    fn test_cap_allows_small_reduction() {
        // 10% below saved with a 20% cap: untouched
        assert_eq!(cap_reduction(1.0, 0.9, 20.0), None);
    }

    #[test]
    fn test_cap_floors_large_reduction() {
        // 50% below saved with a 20% cap: floored to 0.8 * saved
        let floor = cap_reduction(1.0, 0.5, 20.0).unwrap();
        assert!((floor - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_cap_exactly_at_limit_untouched() {
        assert_eq!(cap_reduction(1.0, 0.8, 20.0), None);
    }

    #[test]
    fn test_cap_zero_prevents_any_reduction() {
        let floor = cap_reduction(2.0, 1.9, 0.0).unwrap();
        assert!((floor - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cap_disabled_at_hundred_pct() {
        assert_eq!(cap_reduction(1.0, 0.0001, 100.0), None);
    }

    #[test]
    fn test_cap_ignores_nonpositive_saved() {
        assert_eq!(cap_reduction(0.0, -1.0, 20.0), None);
        assert_eq!(cap_reduction(-1.0, -2.0, 20.0), None);
    }

    #[test]
    fn test_cap_ignores_increases() {
        assert_eq!(cap_reduction(1.0, 1.5, 20.0), None);
    }
}
