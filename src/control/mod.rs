//! Actuator control: the binary frame and the channel that carries it.

pub mod channel;
pub mod message;

pub use channel::{ControlSink, UdpControlChannel};
pub use message::{ControlMessage, FRAME_LEN};
