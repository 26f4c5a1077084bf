//! Scripted stand-ins for the stream producers and the actuator.

#![allow(dead_code)]

use async_trait::async_trait;
use daq_bridge::control::{ControlMessage, ControlSink};
use daq_bridge::error::{BridgeError, BridgeResult};
use daq_bridge::stream::{NonBlockingRead, StreamChannel};
use std::collections::VecDeque;
use std::io::{self, ErrorKind};
use std::sync::{Arc, Mutex};

/// What a producer has buffered at one poll.
#[derive(Debug, Clone)]
pub enum Step {
    /// One complete line (newline appended)
    Line(&'static str),
    /// Raw bytes, sent as is
    Raw(&'static str),
    /// Nothing buffered
    Idle,
    /// Peer closed the stream
    Close,
    /// Read fails with this kind
    Fail(ErrorKind),
}

/// Serves one [`Step`] per poll.
///
/// A step longer than the reader's buffer is handed out over several reads
/// within the same poll.
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    pending: Vec<u8>,
    end_of_poll: bool,
}

impl ScriptedSource {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            pending: Vec::new(),
            end_of_poll: false,
        }
    }
}

impl NonBlockingRead for ScriptedSource {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            if self.end_of_poll {
                self.end_of_poll = false;
                return Err(ErrorKind::WouldBlock.into());
            }
            self.pending = match self.steps.pop_front() {
                None | Some(Step::Idle) => return Err(ErrorKind::WouldBlock.into()),
                Some(Step::Close) => return Ok(0),
                Some(Step::Fail(kind)) => return Err(kind.into()),
                Some(Step::Line(text)) => format!("{}\n", text).into_bytes(),
                Some(Step::Raw(text)) => text.as_bytes().to_vec(),
            };
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        self.end_of_poll = self.pending.is_empty();
        Ok(n)
    }
}

/// Three channels named out1..out3 fed from scripts.
pub fn scripted_channels(out1: Vec<Step>, out2: Vec<Step>, out3: Vec<Step>) -> [StreamChannel; 3] {
    scripted_channels_with_capacity(1024, out1, out2, out3)
}

/// Like [`scripted_channels`] with a custom line capacity.
pub fn scripted_channels_with_capacity(
    capacity: usize,
    out1: Vec<Step>,
    out2: Vec<Step>,
    out3: Vec<Step>,
) -> [StreamChannel; 3] {
    [("out1", out1), ("out2", out2), ("out3", out3)].map(|(name, steps)| {
        StreamChannel::new(name, Box::new(ScriptedSource::new(steps)), capacity)
    })
}

/// `n` idle polls.
pub fn idle(n: usize) -> Vec<Step> {
    vec![Step::Idle; n]
}

/// Records every control message; optionally rejects them all.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<ControlMessage>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn sent(&self) -> Vec<ControlMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ControlSink for RecordingSink {
    async fn send(&self, message: &ControlMessage) -> BridgeResult<usize> {
        if self.fail {
            return Err(BridgeError::Transmit("actuator unreachable".into()));
        }
        self.sent.lock().unwrap().push(*message);
        Ok(daq_bridge::control::FRAME_LEN)
    }
}

/// Snapshot lines written to a `Vec<u8>` sink.
pub fn lines(sink: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(sink)
        .lines()
        .map(str::to_owned)
        .collect()
}
