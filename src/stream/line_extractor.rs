//! Latest-line extraction from a non-blocking byte stream.
//!
//! Producers write one newline-terminated record at a time, much faster than
//! the scheduler polls. A poll wants the freshest record, not a queue, so
//! [`read_last_line`] drains everything currently buffered by the transport and
//! keeps only the last complete line.

use crate::error::{BridgeError, BridgeResult};
use std::io::{self, ErrorKind};

/// Text standing in for "no data" at the serialization boundary.
pub const SENTINEL: &str = "--";

/// Default longest accepted line, newline excluded.
pub const DEFAULT_LINE_CAPACITY: usize = 1024;

/// A byte source whose reads return immediately.
///
/// `Ok(0)` means the peer closed the stream, `ErrorKind::WouldBlock` means no
/// bytes are buffered right now.
pub trait NonBlockingRead {
    /// Read whatever is buffered into `buf` without waiting.
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl NonBlockingRead for tokio::net::TcpStream {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        tokio::net::TcpStream::try_read(self, buf)
    }
}

impl<T: NonBlockingRead + ?Sized> NonBlockingRead for Box<T> {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).try_read(buf)
    }
}

/// Per-connection read state.
///
/// Owns the scratch space used while draining, the bytes of a line whose
/// newline has not arrived yet, and the result of the last drain. After an
/// over-length line the buffer skips input up to the next newline, so the
/// tail of the oversized record is never mistaken for a record of its own.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    capacity: usize,
    scratch: Vec<u8>,
    partial: Vec<u8>,
    discarding: bool,
    latest: Option<String>,
}

impl LineBuffer {
    /// Create a buffer accepting lines of up to `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            scratch: vec![0u8; capacity.max(1)],
            partial: Vec::with_capacity(capacity),
            discarding: false,
            latest: None,
        }
    }

    /// Longest accepted line in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The line found by the last drain, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&str> {
        self.latest.as_deref()
    }

    /// The line found by the last drain, or [`SENTINEL`].
    #[must_use]
    pub fn as_text(&self) -> &str {
        self.latest().unwrap_or(SENTINEL)
    }

    /// Bytes of an unterminated line carried into the next drain.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.partial.len()
    }

    /// Whether input is being skipped up to the end of an over-length line.
    #[must_use]
    pub fn is_discarding(&self) -> bool {
        self.discarding
    }

    /// Forget everything, including a carried partial line.
    pub fn clear(&mut self) {
        self.partial.clear();
        self.discarding = false;
        self.latest = None;
    }

    /// Split `len` scratch bytes into lines. Returns true if a line outgrew
    /// the capacity; the rest of the chunk is still processed.
    fn absorb(&mut self, len: usize) -> bool {
        let mut overflowed = false;
        let mut rest = &self.scratch[..len];
        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if self.partial.len() + head.len() > self.capacity {
                self.partial.clear();
                overflowed = true;
                continue;
            }
            self.partial.extend_from_slice(head);
            if self.partial.last() == Some(&b'\r') {
                self.partial.pop();
            }
            if !self.partial.is_empty() {
                self.latest = Some(String::from_utf8_lossy(&self.partial).into_owned());
            }
            self.partial.clear();
        }

        if self.discarding {
            return overflowed;
        }
        if self.partial.len() + rest.len() > self.capacity {
            self.partial.clear();
            self.discarding = true;
            return true;
        }
        self.partial.extend_from_slice(rest);
        overflowed
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LINE_CAPACITY)
    }
}

/// Drain `source` without blocking and keep the most recent complete line.
///
/// On return `buf` holds either that line or nothing (rendered as
/// [`SENTINEL`]): no bytes buffered and no line completed in this drain are
/// both "no data", not errors. Earlier lines of the same drain are dropped.
/// Bytes of an unterminated line are carried over, and are only ever used to
/// complete the line they belong to.
///
/// # Errors
/// - [`BridgeError::Connection`] if the stream is closed, reset or was never
///   connected.
/// - [`BridgeError::Protocol`] if a line outgrows the buffer capacity. The
///   drain still runs to completion and the oversized line is skipped up to
///   its newline, but no line is reported for this drain.
pub fn read_last_line<R>(channel: &str, source: &mut R, buf: &mut LineBuffer) -> BridgeResult<()>
where
    R: NonBlockingRead + ?Sized,
{
    buf.latest = None;
    let mut overflowed = false;

    loop {
        match source.try_read(&mut buf.scratch) {
            Ok(0) => {
                buf.clear();
                return Err(BridgeError::connection(channel, "stream closed by peer"));
            }
            Ok(n) => overflowed |= buf.absorb(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                buf.clear();
                return Err(BridgeError::connection(channel, e.to_string()));
            }
        }
    }

    if overflowed {
        buf.latest = None;
        return Err(BridgeError::protocol(
            channel,
            format!("line exceeds {} bytes", buf.capacity),
        ));
    }

    tracing::trace!(
        channel,
        latest = buf.as_text(),
        pending = buf.pending_len(),
        "drained stream"
    );
    Ok(())
}
