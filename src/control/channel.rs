//! Datagram transport for control messages.

use super::message::ControlMessage;
use crate::error::{BridgeError, BridgeResult};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Destination for control messages.
///
/// The scheduler only depends on this trait, so tests can record sends
/// instead of opening a socket.
#[async_trait]
pub trait ControlSink: Send + Sync {
    /// Transmit one message, returning the number of bytes written.
    ///
    /// No reply is awaited and a failed send is not retried.
    async fn send(&self, message: &ControlMessage) -> BridgeResult<usize>;
}

/// Sends control frames as single UDP datagrams to a fixed destination.
#[derive(Debug)]
pub struct UdpControlChannel {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl UdpControlChannel {
    /// Bind an ephemeral local socket for sending to `destination`.
    pub async fn open(destination: SocketAddr) -> BridgeResult<Self> {
        let local: SocketAddr = if destination.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| BridgeError::Transmit(format!("bind {}: {}", local, e)))?;
        tracing::debug!(%destination, "control channel ready");
        Ok(Self {
            socket,
            destination,
        })
    }

    /// Where datagrams are sent.
    #[must_use]
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }
}

#[async_trait]
impl ControlSink for UdpControlChannel {
    async fn send(&self, message: &ControlMessage) -> BridgeResult<usize> {
        let frame = message.encode();
        let sent = self
            .socket
            .send_to(&frame, self.destination)
            .await
            .map_err(|e| BridgeError::Transmit(format!("{} to {}: {}", message, self.destination, e)))?;
        tracing::trace!(%message, bytes = sent, "control datagram sent");
        Ok(sent)
    }
}
