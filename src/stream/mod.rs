//! Telemetry stream input.
//!
//! - **`line_extractor`**: drains a non-blocking source and keeps the freshest
//!   complete line, using a buffer owned by each connection.
//! - **`connection`**: TCP connections to the producers, with connect failures
//!   deferred to the first read.

pub mod connection;
pub mod line_extractor;

pub use connection::{connect_channels, StreamChannel, StreamConnection};
pub use line_extractor::{read_last_line, LineBuffer, NonBlockingRead, SENTINEL};
