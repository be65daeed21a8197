//! # rate-autotune
//!
//! An in-flight automatic tuner for closed-loop attitude-rate controllers.
//! Driven by a pilot-operated switch, it incrementally raises rate gains per
//! axis and per term until an oscillation or a configured ceiling is
//! detected, backs off by a safety margin, slews smoothly to the reduced
//! value, and moves on. Everything reverts the instant the switch, the
//! flight mode, or the vehicle's attitude says to stop.
//!
//! The crate is vehicle-agnostic: the tuner consumes narrow capability
//! traits ([`RateController`], [`VehicleStatus`], [`GainStore`],
//! [`TelemetrySink`]) injected at construction, and an external scheduler
//! calls [`RateTuner::tick`] at a fixed 40 Hz with the monotonic time.
//!
//! ```no_run
//! use rate_autotune::{RateTuner, TuneConfig, SwitchPos, TracingSink};
//! use rate_autotune::sim::{SimRates, SimStatus, SimStore};
//!
//! let cfg = TuneConfig { enabled: true, ..Default::default() };
//! let mut tuner = RateTuner::new(
//!     cfg,
//!     SimRates::new(7),
//!     SimStatus::default(),
//!     SimStore::default(),
//!     TracingSink,
//! ).unwrap();
//!
//! tuner.set_switch_pos(SwitchPos::Mid);
//! let mut now_ms = 60_000;
//! loop {
//!     tuner.tick(now_ms);
//!     now_ms += 25;
//!     # break;
//! }
//! ```

pub mod config;
pub mod error;
pub mod params;
pub mod safety;
pub mod session;
pub mod sim;
pub mod telemetry;
pub mod tuner;
pub mod vehicle;

pub use config::TuneConfig;
pub use error::{PersistError, TuneError};
pub use params::{Axis, AxisSet, Param, ParamSet, Stage};
pub use session::{Slew, TuneSession};
pub use telemetry::{GainRecord, MemorySink, Severity, StatusMsg, TelemetrySink, TracingSink};
pub use tuner::{RateTuner, TICK_RATE_HZ};
pub use vehicle::{GainStore, RateController, SwitchPos, VehicleStatus};
