//! # DAQ Bridge Core Library
//!
//! This crate polls three live telemetry streams at a fixed cadence, publishes
//! one combined JSON snapshot per tick, and drives an actuator with fixed-format
//! UDP control frames whenever the trigger channel crosses its threshold. A
//! validator replays captured snapshot logs offline and checks inter-tick timing
//! and the causal link between the trigger and the actuated output.
//!
//! ## Crate Structure
//!
//! - **`config`**: Figment-based configuration (defaults, TOML file, environment).
//! - **`error`**: The `BridgeError` enum shared by every module.
//! - **`logging`**: `tracing` subscriber setup. All diagnostics go to stderr.
//! - **`stream`**: Non-blocking latest-line extraction from the TCP producers.
//! - **`control`**: The 8-byte big-endian control frame and its UDP channel.
//! - **`report`**: Snapshots, trigger hysteresis, shutdown signalling and the
//!   `ReportScheduler` loop.
//! - **`validator`**: Offline timing and causality checks over captured logs.

pub mod config;
pub mod control;
pub mod error;
pub mod logging;
pub mod report;
pub mod stream;
pub mod validator;

pub use error::{BridgeError, BridgeResult};
