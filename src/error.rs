//! Custom error types for the bridge.
//!
//! This module defines the primary error type, `BridgeError`, for the whole crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the different failures that can occur while polling the stream channels, driving
//! the actuator, and replaying captured logs.
//!
//! ## Error Hierarchy
//!
//! `BridgeError` consolidates the following error sources:
//!
//! - **`Connection`**: A stream channel could not be reached or read (closed, reset,
//!   or never connected). Fatal only on the priming read right after connect;
//!   afterwards the scheduler degrades that channel to the sentinel for the tick.
//! - **`Protocol`**: A line exceeded the accepted length, or a control frame had the
//!   wrong size. Aborts the current read or decode, never the polling loop.
//! - **`Transmit`**: A control datagram could not be sent. Logged, never retried.
//! - **`TimerSetup`**: The clock or the interrupt listener could not be registered.
//!   Fatal, aborts startup before any tick runs.
//! - **`Config`** / **`InvalidConfig`**: Figment extraction failures and semantic
//!   validation failures of the loaded configuration.
//! - **`Io`**: Wraps `std::io::Error` from the snapshot sink and log files.
//! - **`Parse`**: A captured snapshot line that cannot be decoded.
//!
//! By using `#[from]`, `BridgeError` can be created from underlying error types,
//! simplifying error handling throughout the crate with the `?` operator.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Primary error type for the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A stream channel is closed, reset or was never connected
    #[error("Connection error on {channel}: {message}")]
    Connection {
        /// Channel name (out1..out3)
        channel: String,
        /// What went wrong
        message: String,
    },

    /// A line outgrew the buffer, or a control frame had the wrong size
    #[error("Protocol error on {channel}: {message}")]
    Protocol {
        /// Channel name, or "control" for frames
        channel: String,
        /// What went wrong
        message: String,
    },

    /// A control datagram could not be sent
    #[error("Control transmit error: {0}")]
    Transmit(String),

    /// The tick clock or the signal listener could not be set up
    #[error("Timer setup error: {0}")]
    TimerSetup(String),

    /// Figment could not extract the configuration
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// The loaded configuration is semantically invalid
    #[error("Configuration validation error: {0}")]
    InvalidConfig(String),

    /// Snapshot sink or log file I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A captured snapshot line could not be decoded
    #[error("Snapshot parse error: {0}")]
    Parse(String),
}

impl BridgeError {
    /// Build a `Connection` error for the named channel.
    pub fn connection(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Build a `Protocol` error for the named channel.
    pub fn protocol(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Whether the scheduler may absorb this error and keep ticking.
    ///
    /// Steady-state failures (a flaky channel, a dropped datagram, a bad line)
    /// are recoverable. Setup and configuration failures are not.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BridgeError::Connection { .. }
                | BridgeError::Protocol { .. }
                | BridgeError::Transmit(_)
                | BridgeError::Parse(_)
        )
    }
}

impl From<figment::Error> for BridgeError {
    fn from(value: figment::Error) -> Self {
        BridgeError::Config(Box::new(value))
    }
}
