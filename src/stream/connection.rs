//! TCP connections to the three telemetry producers.

use super::line_extractor::{read_last_line, LineBuffer, NonBlockingRead};
use crate::error::BridgeResult;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Upper bound on a single connect attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// A stream connection that may have failed to establish.
///
/// Connecting never fails outright: a refused or timed-out connect is kept
/// and reported by the first read, the same way a non-blocking socket only
/// reveals a failed handshake when it is read.
#[derive(Debug)]
pub enum StreamConnection {
    /// Handshake completed.
    Connected(TcpStream),
    /// Handshake failed with this error kind and message.
    Failed {
        /// Kind of the connect error
        kind: io::ErrorKind,
        /// Text of the connect error
        message: String,
    },
}

impl StreamConnection {
    /// Connect to `addr`, keeping any failure for the first read.
    pub async fn connect(addr: SocketAddr) -> Self {
        match timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(%addr, error = %e, "could not disable Nagle");
                }
                tracing::info!(%addr, "connected to producer");
                StreamConnection::Connected(stream)
            }
            Ok(Err(e)) => {
                tracing::warn!(%addr, error = %e, "connect failed");
                StreamConnection::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
            Err(_) => {
                tracing::warn!(%addr, "connect timed out");
                StreamConnection::Failed {
                    kind: io::ErrorKind::TimedOut,
                    message: format!("connect timed out after {:?}", CONNECT_TIMEOUT),
                }
            }
        }
    }

    /// Whether the handshake completed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, StreamConnection::Connected(_))
    }
}

impl NonBlockingRead for StreamConnection {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            StreamConnection::Connected(stream) => NonBlockingRead::try_read(stream, buf),
            StreamConnection::Failed { kind, message } => {
                Err(io::Error::new(*kind, message.clone()))
            }
        }
    }
}

/// One named telemetry channel: its connection plus its own read buffer.
pub struct StreamChannel {
    name: String,
    source: Box<dyn NonBlockingRead + Send>,
    buffer: LineBuffer,
}

impl StreamChannel {
    /// Wrap any non-blocking source.
    pub fn new(
        name: impl Into<String>,
        source: Box<dyn NonBlockingRead + Send>,
        line_capacity: usize,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            buffer: LineBuffer::with_capacity(line_capacity),
        }
    }

    /// Connect to a producer over TCP.
    pub async fn connect(name: impl Into<String>, addr: SocketAddr, line_capacity: usize) -> Self {
        let connection = StreamConnection::connect(addr).await;
        Self::new(name, Box::new(connection), line_capacity)
    }

    /// Channel name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drain the connection and return its freshest line, if one completed.
    pub fn poll_latest(&mut self) -> BridgeResult<Option<&str>> {
        read_last_line(&self.name, &mut self.source, &mut self.buffer)?;
        Ok(self.buffer.latest())
    }
}

impl std::fmt::Debug for StreamChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamChannel")
            .field("name", &self.name)
            .field("buffer", &self.buffer)
            .finish()
    }
}

/// Connect the out1, out2 and out3 producers, in that order.
pub async fn connect_channels(addrs: [SocketAddr; 3], line_capacity: usize) -> [StreamChannel; 3] {
    let [a1, a2, a3] = addrs;
    let (c1, c2, c3) = tokio::join!(
        StreamChannel::connect("out1", a1, line_capacity),
        StreamChannel::connect("out2", a2, line_capacity),
        StreamChannel::connect("out3", a3, line_capacity),
    );
    [c1, c2, c3]
}
