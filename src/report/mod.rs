//! Snapshot reporting.
//!
//! - **`snapshot`**: the per-tick record and its line format.
//! - **`trigger`**: hysteresis on out3 that selects a control pair.
//! - **`shutdown`**: stop notification shared with signal handlers.
//! - **`scheduler`**: the fixed-cadence loop tying the above together.

pub mod scheduler;
pub mod shutdown;
pub mod snapshot;
pub mod trigger;

pub use scheduler::{ReportScheduler, RunSummary, SchedulerSettings, SchedulerState, StopReason};
pub use shutdown::{install_signal_handlers, shutdown_channel, ShutdownListener, ShutdownTrigger};
pub use snapshot::{or_nan, parse_reading, Snapshot};
pub use trigger::{Crossing, TriggerState};
