//! Hysteresis on the trigger channel.

use crate::control::ControlMessage;

/// Default trigger level.
pub const DEFAULT_THRESHOLD: f64 = 3.0;

/// A detected threshold crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    /// From unknown or below the threshold to at or above it
    High,
    /// From unknown or at/above the threshold to below it
    Low,
}

impl Crossing {
    /// The control pair to send, in send order.
    #[must_use]
    pub fn messages(self) -> [ControlMessage; 2] {
        match self {
            Crossing::High => ControlMessage::HIGH_PAIR,
            Crossing::Low => ControlMessage::LOW_PAIR,
        }
    }
}

/// Remembers the last trigger value that caused a crossing.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerState {
    threshold: f64,
    previous: Option<f64>,
}

impl TriggerState {
    /// Start with no previous observation.
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            previous: None,
        }
    }

    /// Configured trigger level.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Value recorded by the last crossing, `None` before the first.
    #[must_use]
    pub fn previous(&self) -> Option<f64> {
        self.previous
    }

    /// Feed one trigger reading.
    ///
    /// An absent or NaN reading is ignored. The stored value only changes when
    /// a crossing is reported.
    pub fn evaluate(&mut self, value: Option<f64>) -> Option<Crossing> {
        let value = value.filter(|v| !v.is_nan())?;
        let below = |v: f64| v < self.threshold;

        let crossing = match self.previous {
            None if below(value) => Crossing::Low,
            None => Crossing::High,
            Some(prev) if below(prev) && !below(value) => Crossing::High,
            Some(prev) if !below(prev) && below(value) => Crossing::Low,
            Some(_) => return None,
        };
        self.previous = Some(value);
        Some(crossing)
    }
}

impl Default for TriggerState {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
