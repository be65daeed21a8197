//! # Telemetry sink
//!
//! ## Responsibility
//! The structured record emitted for every adjustment step (the tuning
//! stream a ground station plots), plus free-text status messages with a
//! severity level. Two implementations: [`TracingSink`] forwards everything
//! to `tracing`, [`MemorySink`] keeps a capped in-memory log for tests and
//! the demo binary's JSONL export.
//!
//! ## NOT Responsible For
//! - Transport (MAVLink, radio, disk); that is a sink implementation's problem
//! - Deciding when to emit; throttling lives in the tuner

use serde::Serialize;

use crate::params::Param;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Severity attached to free-text status messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Notice,
    Warning,
    Emergency,
}

impl Severity {
    pub fn name(self) -> &'static str {
        match self {
            Severity::Info      => "info",
            Severity::Notice    => "notice",
            Severity::Warning   => "warning",
            Severity::Emergency => "emergency",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// GainRecord — one adjustment step
// ---------------------------------------------------------------------------

/// One adjustment step of the active gain.
///
/// `gain` is the value read before the step was applied, and `slew_rate` the
/// oscillation metric observed at the same instant, so a plot of records
/// shows the ramp that led into each oscillation back-off.
#[derive(Debug, Clone, Serialize)]
pub struct GainRecord {
    /// Milliseconds since boot.
    pub time_ms: u64,
    /// Oscillation metric for the param's axis at this step.
    pub slew_rate: f32,
    /// Gain value before this step.
    pub gain: f32,
    /// The gain being adjusted.
    pub param: Param,
    /// The param's stable ordinal, for compact downstream storage.
    pub ordinal: u8,
}

impl GainRecord {
    pub fn new(time_ms: u64, slew_rate: f32, gain: f32, param: Param) -> Self {
        GainRecord {
            time_ms,
            slew_rate,
            gain,
            param,
            ordinal: param.ordinal() as u8,
        }
    }
}

// ---------------------------------------------------------------------------
// TelemetrySink
// ---------------------------------------------------------------------------

/// Consumer of tuning telemetry. Injected into the tuner at construction.
pub trait TelemetrySink {
    fn gain_step(&mut self, record: &GainRecord);

    fn status(&mut self, severity: Severity, message: &str);
}

// ---------------------------------------------------------------------------
// TracingSink
// ---------------------------------------------------------------------------

/// Default sink: forwards to `tracing` under the `autotune` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn gain_step(&mut self, record: &GainRecord) {
        tracing::debug!(
            target: "autotune",
            time_ms = record.time_ms,
            param = record.param.name(),
            ordinal = record.ordinal,
            gain = record.gain,
            slew_rate = record.slew_rate,
            "gain step"
        );
    }

    fn status(&mut self, severity: Severity, message: &str) {
        match severity {
            Severity::Info | Severity::Notice => {
                tracing::info!(target: "autotune", severity = severity.name(), "{message}");
            }
            Severity::Warning => {
                tracing::warn!(target: "autotune", "{message}");
            }
            Severity::Emergency => {
                tracing::error!(target: "autotune", "{message}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// A status message as captured by [`MemorySink`].
#[derive(Debug, Clone, Serialize)]
pub struct StatusMsg {
    pub severity: Severity,
    pub message: String,
}

/// Capped in-memory sink. Oldest entries are evicted first.
#[derive(Debug)]
pub struct MemorySink {
    records: Vec<GainRecord>,
    statuses: Vec<StatusMsg>,
    cap: usize,
}

impl MemorySink {
    pub fn new(cap: usize) -> Self {
        MemorySink {
            records: Vec::new(),
            statuses: Vec::new(),
            cap: cap.max(1),
        }
    }

    pub fn records(&self) -> &[GainRecord] {
        &self.records
    }

    pub fn statuses(&self) -> &[StatusMsg] {
        &self.statuses
    }

    pub fn last_status(&self) -> Option<&StatusMsg> {
        self.statuses.last()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.statuses.clear();
    }

    /// Serialize the gain records as JSON values, one per step.
    pub fn records_json(&self) -> Vec<serde_json::Value> {
        self.records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "time_ms": r.time_ms,
                    "param": r.param.name(),
                    "ordinal": r.ordinal,
                    "gain": r.gain,
                    "slew_rate": r.slew_rate,
                })
            })
            .collect()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        MemorySink::new(4096)
    }
}

impl TelemetrySink for MemorySink {
    fn gain_step(&mut self, record: &GainRecord) {
        if self.records.len() >= self.cap {
            self.records.remove(0);
        }
        self.records.push(record.clone());
    }

    fn status(&mut self, severity: Severity, message: &str) {
        if self.statuses.len() >= self.cap {
            self.statuses.remove(0);
        }
        self.statuses.push(StatusMsg { severity, message: message.to_string() });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
