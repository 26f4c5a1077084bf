//! The combined per-tick record and its one-line text form.

use crate::error::{BridgeError, BridgeResult};
use crate::stream::SENTINEL;
use serde::Deserialize;
use std::fmt;

/// Readings of the three channels at one tick.
///
/// A channel with no data is `None` in memory. The sentinel text only appears
/// in the serialized line.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Snapshot {
    /// Wall-clock milliseconds since the Unix epoch, taken at the tick
    pub timestamp: i64,
    /// First channel, the actuated output
    pub out1: Option<f32>,
    /// Second channel
    pub out2: Option<f32>,
    /// Third channel, the trigger
    pub out3: Option<f32>,
}

/// Wire shape of a snapshot line. Channel values are always strings.
#[derive(Deserialize)]
struct RawSnapshot {
    timestamp: i64,
    out1: String,
    out2: String,
    out3: String,
}

impl Snapshot {
    /// Build a snapshot from three readings.
    #[must_use]
    pub fn new(timestamp: i64, readings: [Option<f32>; 3]) -> Self {
        let [out1, out2, out3] = readings;
        Self {
            timestamp,
            out1,
            out2,
            out3,
        }
    }

    /// The three readings in channel order.
    #[must_use]
    pub fn readings(&self) -> [Option<f32>; 3] {
        [self.out1, self.out2, self.out3]
    }

    /// Render the snapshot line, without the trailing newline.
    ///
    /// `{"timestamp": 1700000000000, "out1": "4.2", "out2": "--", "out3": "5.0"}`
    #[must_use]
    pub fn to_line(&self) -> String {
        self.to_string()
    }

    /// Parse one snapshot line.
    ///
    /// The sentinel maps to `None`, as does any channel text that is not a
    /// finite number.
    ///
    /// # Errors
    /// [`BridgeError::Parse`] if the line is not a JSON object with a numeric
    /// `timestamp` and string `out1`, `out2` and `out3` fields.
    pub fn from_line(line: &str) -> BridgeResult<Self> {
        let raw: RawSnapshot = serde_json::from_str(line.trim())
            .map_err(|e| BridgeError::Parse(format!("{}: {:?}", e, line)))?;
        Ok(Self {
            timestamp: raw.timestamp,
            out1: parse_reading(&raw.out1),
            out2: parse_reading(&raw.out2),
            out3: parse_reading(&raw.out3),
        })
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"{{"timestamp": {}, "out1": "{}", "out2": "{}", "out3": "{}"}}"#,
            self.timestamp,
            Reading(self.out1),
            Reading(self.out2),
            Reading(self.out3)
        )
    }
}

struct Reading(Option<f32>);

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:?}", v),
            None => f.write_str(SENTINEL),
        }
    }
}

/// Convert one channel's text to a reading.
///
/// Returns `None` for the sentinel and for anything that is not a finite
/// number.
#[must_use]
pub fn parse_reading(text: &str) -> Option<f32> {
    let text = text.trim();
    if text == SENTINEL {
        return None;
    }
    text.parse::<f32>().ok().filter(|v| v.is_finite())
}

/// A reading as a float, with absence as NaN.
///
/// Every ordered comparison against the result is false when the reading is
/// absent, so absent data never satisfies a threshold.
#[must_use]
pub fn or_nan(reading: Option<f32>) -> f32 {
    reading.unwrap_or(f32::NAN)
}
