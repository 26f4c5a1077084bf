//! Offline check of a captured snapshot log.
//!
//! Two properties are checked:
//!
//! - **Timing**: every gap between adjacent snapshots lies within
//!   `interval ± tolerance`. All violations are collected.
//! - **Causality**: out3 latches the expected actuator state (exactly
//!   `latch_high` latches high, exactly `latch_low` latches low, anything else
//!   keeps the latch). `propagation_delay` ticks later, out1 must have
//!   exceeded `excitation_magnitude` at least once while latched high, and
//!   must never exceed it while latched low.
//!
//! Absent readings compare as NaN and so never satisfy either threshold.

use crate::config::ValidationConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::report::{or_nan, Snapshot};
use serde::Serialize;
use std::io::{BufRead, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Validator inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationParams {
    /// Expected gap between snapshots
    pub interval_ms: u64,
    /// Accepted deviation from `interval_ms`
    pub tolerance_ms: u64,
    /// Ticks between an out3 latch and its effect on out1
    pub propagation_delay: usize,
    /// |out1| above this counts as excitation
    pub excitation_magnitude: f32,
    /// out3 value latching high
    pub latch_high: f32,
    /// out3 value latching low
    pub latch_low: f32,
}

impl ValidationParams {
    /// Default thresholds for the given interval.
    #[must_use]
    pub fn new(interval_ms: u64) -> Self {
        Self::from_config(&ValidationConfig::default(), interval_ms)
    }

    /// Thresholds from the `[validation]` section.
    #[must_use]
    pub fn from_config(config: &ValidationConfig, interval_ms: u64) -> Self {
        Self {
            interval_ms,
            tolerance_ms: config.tolerance_ms,
            propagation_delay: config.propagation_delay,
            excitation_magnitude: config.excitation_magnitude,
            latch_high: config.latch_high,
            latch_low: config.latch_low,
        }
    }

    fn gap_ok(&self, gap_ms: i64) -> bool {
        let deviation = (i128::from(gap_ms) - i128::from(self.interval_ms)).unsigned_abs();
        deviation <= u128::from(self.tolerance_ms)
    }
}

/// An adjacent pair whose gap left the tolerance window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimingViolation {
    /// Index of the earlier snapshot among parsed snapshots
    pub index: usize,
    /// Observed gap
    pub gap_ms: i64,
    /// Earlier timestamp
    pub earlier: i64,
    /// Later timestamp
    pub later: i64,
}

/// Outcome of a validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Snapshot lines decoded
    pub parsed: usize,
    /// Non-blank lines that failed to decode
    pub rejected: usize,
    /// Every timing violation, in log order
    pub timing_violations: Vec<TimingViolation>,
    /// No timing violation was found
    pub timing_met: bool,
    /// out1 was excited at least once while latched high
    pub excitation_observed: bool,
    /// out1 never exceeded the magnitude while latched low
    pub quiescence_held: bool,
}

impl ValidationReport {
    /// Overall verdict.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.timing_met && self.excitation_observed && self.quiescence_held
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Latch {
    Unknown,
    High,
    Low,
}

/// Validate already-decoded snapshots.
#[must_use]
pub fn validate_snapshots(snapshots: &[Snapshot], params: &ValidationParams) -> ValidationReport {
    let mut timing_violations = Vec::new();
    for (index, pair) in snapshots.windows(2).enumerate() {
        let (earlier, later) = (pair[0].timestamp, pair[1].timestamp);
        let gap_ms = later.saturating_sub(earlier);
        if !params.gap_ok(gap_ms) {
            warn!(
                index,
                gap_ms,
                expected_ms = params.interval_ms,
                tolerance_ms = params.tolerance_ms,
                "timing violation"
            );
            timing_violations.push(TimingViolation {
                index,
                gap_ms,
                earlier,
                later,
            });
        }
    }

    let mut latch = Latch::Unknown;
    let mut excitation_observed = false;
    let mut quiescence_held = true;
    let delay = params.propagation_delay;
    for i in 0..snapshots.len().saturating_sub(delay) {
        let trigger = or_nan(snapshots[i].out3);
        if trigger == params.latch_high {
            latch = Latch::High;
        } else if trigger == params.latch_low {
            latch = Latch::Low;
        }

        let response = or_nan(snapshots[i + delay].out1).abs();
        let excited = response > params.excitation_magnitude;
        match latch {
            Latch::High if excited => excitation_observed = true,
            Latch::Low if excited => {
                if quiescence_held {
                    warn!(index = i + delay, response, "output excited while latched low");
                }
                quiescence_held = false;
            }
            _ => {}
        }
    }

    ValidationReport {
        parsed: snapshots.len(),
        rejected: 0,
        timing_met: timing_violations.is_empty(),
        timing_violations,
        excitation_observed,
        quiescence_held,
    }
}

/// Decode and validate a captured log held in memory.
///
/// Blank lines are ignored. Lines that do not decode are counted in
/// `rejected` and otherwise skipped.
#[must_use]
pub fn validate_log(text: &str, params: &ValidationParams) -> ValidationReport {
    let mut snapshots = Vec::new();
    let mut rejected = 0;
    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match Snapshot::from_line(line) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(e) => {
                rejected += 1;
                debug!(line = lineno + 1, error = %e, "skipping line");
            }
        }
    }

    let mut report = validate_snapshots(&snapshots, params);
    report.rejected = rejected;
    info!(
        passed = report.passed(),
        parsed = report.parsed,
        rejected = report.rejected,
        timing_violations = report.timing_violations.len(),
        excitation_observed = report.excitation_observed,
        quiescence_held = report.quiescence_held,
        "validation finished"
    );
    report
}

/// Validate a log read from any buffered reader.
///
/// # Errors
/// [`BridgeError::Io`] if reading fails.
pub fn validate_reader<R: BufRead>(
    mut reader: R,
    params: &ValidationParams,
) -> BridgeResult<ValidationReport> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(validate_log(&text, params))
}

/// Validate a log file.
///
/// # Errors
/// [`BridgeError::Io`] if the file cannot be read.
pub fn validate_file<P: AsRef<Path>>(
    path: P,
    params: &ValidationParams,
) -> BridgeResult<ValidationReport> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        BridgeError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    Ok(validate_log(&text, params))
}
