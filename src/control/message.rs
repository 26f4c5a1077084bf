//! Fixed-size actuator control frame.
//!
//! Wire layout, all fields big-endian:
//!
//! ```text
//! 0       2       4        6       8
//! +-------+-------+--------+-------+
//! | op    | obj   | prop   | value |
//! +-------+-------+--------+-------+
//! ```

use crate::error::{BridgeError, BridgeResult};
use bytes::{Buf, BufMut};

/// Encoded frame length in bytes.
pub const FRAME_LEN: usize = 8;

/// Read a property.
pub const OPERATION_READ: u16 = 1;
/// Write a property.
pub const OPERATION_WRITE: u16 = 2;

/// Signal generator behind out1.
pub const OBJECT_OUT1: u16 = 1;
/// Signal generator behind out2.
pub const OBJECT_OUT2: u16 = 2;
/// Signal generator behind out3.
pub const OBJECT_OUT3: u16 = 3;

/// Output frequency, value in mHz.
pub const PROPERTY_FREQUENCY: u16 = 255;
/// Output amplitude, value unscaled (8000 would not fit once scaled).
pub const PROPERTY_AMPLITUDE: u16 = 170;

/// 1 Hz in mHz.
pub const FREQUENCY_1_HZ: u16 = 1000;
/// 2 Hz in mHz.
pub const FREQUENCY_2_HZ: u16 = 2000;
/// High amplitude setting.
pub const AMPLITUDE_8000: u16 = 8000;
/// Low amplitude setting.
pub const AMPLITUDE_4000: u16 = 4000;

/// One actuator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlMessage {
    /// `OPERATION_READ` or `OPERATION_WRITE`
    pub operation: u16,
    /// Target object
    pub object: u16,
    /// Target property
    pub property: u16,
    /// Property value
    pub value: u16,
}

impl ControlMessage {
    /// out1 frequency to 1 Hz.
    pub const RAISE_FREQUENCY_1HZ: Self =
        Self::write(OBJECT_OUT1, PROPERTY_FREQUENCY, FREQUENCY_1_HZ);
    /// out1 amplitude to 8000.
    pub const RAISE_AMPLITUDE_8000: Self =
        Self::write(OBJECT_OUT1, PROPERTY_AMPLITUDE, AMPLITUDE_8000);
    /// out1 frequency to 2 Hz.
    pub const LOWER_FREQUENCY_2HZ: Self =
        Self::write(OBJECT_OUT1, PROPERTY_FREQUENCY, FREQUENCY_2_HZ);
    /// out1 amplitude to 4000.
    pub const LOWER_AMPLITUDE_4000: Self =
        Self::write(OBJECT_OUT1, PROPERTY_AMPLITUDE, AMPLITUDE_4000);

    /// Sent, in order, when the trigger crosses upward.
    pub const HIGH_PAIR: [Self; 2] = [Self::RAISE_FREQUENCY_1HZ, Self::RAISE_AMPLITUDE_8000];
    /// Sent, in order, when the trigger crosses downward.
    pub const LOW_PAIR: [Self; 2] = [Self::LOWER_FREQUENCY_2HZ, Self::LOWER_AMPLITUDE_4000];

    /// Build a message from its four fields.
    #[must_use]
    pub const fn new(operation: u16, object: u16, property: u16, value: u16) -> Self {
        Self {
            operation,
            object,
            property,
            value,
        }
    }

    /// Build a `WRITE` message.
    #[must_use]
    pub const fn write(object: u16, property: u16, value: u16) -> Self {
        Self::new(OPERATION_WRITE, object, property, value)
    }

    /// Serialize into the 8-byte big-endian frame.
    #[must_use]
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut frame = [0u8; FRAME_LEN];
        let mut out = &mut frame[..];
        out.put_u16(self.operation);
        out.put_u16(self.object);
        out.put_u16(self.property);
        out.put_u16(self.value);
        frame
    }

    /// Parse an 8-byte big-endian frame.
    ///
    /// # Errors
    /// [`BridgeError::Protocol`] if `frame` is not exactly [`FRAME_LEN`] bytes.
    pub fn decode(frame: &[u8]) -> BridgeResult<Self> {
        if frame.len() != FRAME_LEN {
            return Err(BridgeError::protocol(
                "control",
                format!("expected {} byte frame, got {}", FRAME_LEN, frame.len()),
            ));
        }
        let mut input = frame;
        Ok(Self {
            operation: input.get_u16(),
            object: input.get_u16(),
            property: input.get_u16(),
            value: input.get_u16(),
        })
    }
}

impl std::fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self.operation {
            OPERATION_READ => "READ",
            OPERATION_WRITE => "WRITE",
            _ => "OP?",
        };
        write!(
            f,
            "{} obj={} prop={} value={}",
            op, self.object, self.property, self.value
        )
    }
}
