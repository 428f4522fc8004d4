//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! UDP datagram connection.
//!
//! A datagram connection works in one of two addressing modes:
//!
//! - **Connected**: a peer is bound at construction, either passed in or
//!   taken from an OS-connected socket. Every write goes to that peer and
//!   every read reports it.
//! - **Unconnected**: no peer is bound. Each read reports the datagram's
//!   source and each write must name its destination.
//!
//! Compression is not applied to datagrams. The selected type is only
//! recorded for the layer above, which owns payload encoding.

use super::state::ConnectionState;
use super::traits::Connection;
use super::types::ConnectionKind;
use crate::codec::CompressType;
use crate::config::SocketOptions;
use crate::TransportError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "observability")]
use tracing::{debug, instrument};

/// One outbound datagram and its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpContext {
    /// Datagram payload
    pub payload: Vec<u8>,
    /// Destination; ignored when the connection has a bound peer
    pub peer: Option<SocketAddr>,
}

impl UdpContext {
    /// Creates a datagram addressed to `peer`.
    pub fn new(payload: impl Into<Vec<u8>>, peer: SocketAddr) -> Self {
        Self {
            payload: payload.into(),
            peer: Some(peer),
        }
    }

    /// Creates a datagram for the connection's bound peer.
    pub fn unaddressed(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            peer: None,
        }
    }
}

/// Datagram connection over UDP.
///
/// # Examples
///
/// ```rust,no_run
/// use polyconn::{Connection, DatagramConnection, UdpContext};
/// use tokio::net::UdpSocket;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let socket = UdpSocket::bind("0.0.0.0:9000").await?;
/// let conn = DatagramConnection::new(socket, None)?;
///
/// let mut buffer = [0u8; 1500];
/// let (n, peer) = conn.read(&mut buffer).await?;
/// if let Some(peer) = peer {
///     conn.write(UdpContext::new(&buffer[..n], peer)).await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct DatagramConnection {
    state: ConnectionState,
    socket: Mutex<Option<Arc<UdpSocket>>>,
    /// Peer every datagram is exchanged with, in connected mode
    peer: Option<SocketAddr>,
    /// Whether the OS socket itself is connected
    os_connected: bool,
    shutdown: CancellationToken,
}

impl DatagramConnection {
    /// Wraps a bound UDP socket.
    ///
    /// `peer` binds the connection to one remote address. An OS-connected
    /// socket is bound to its remote address when `peer` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the socket accepts packet-info
    /// delivery for neither IPv4 nor IPv6.
    #[cfg_attr(
        feature = "observability",
        instrument(skip(socket), fields(connection_id))
    )]
    pub fn new(socket: UdpSocket, peer: Option<SocketAddr>) -> Result<Self, TransportError> {
        enable_packet_info(&socket)?;

        let connected_to = socket.peer_addr().ok();
        let peer = peer.or(connected_to);
        let state = ConnectionState::new(ConnectionKind::Datagram, socket.local_addr().ok(), peer);

        #[cfg(feature = "observability")]
        {
            tracing::Span::current().record("connection_id", state.id().as_u32());
            debug!(?peer, "Created UDP connection");
        }

        Ok(Self {
            state,
            socket: Mutex::new(Some(Arc::new(socket))),
            peer,
            os_connected: connected_to.is_some(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Applies the buffer sizes in `options` and wraps the socket.
    pub fn with_socket_options(
        socket: UdpSocket,
        peer: Option<SocketAddr>,
        options: &SocketOptions,
    ) -> Result<Self, TransportError> {
        options.apply_datagram(&socket)?;
        Self::new(socket, peer)
    }

    /// Returns `true` if a peer is bound.
    pub fn is_connected(&self) -> bool {
        self.peer.is_some()
    }

    /// Receives one datagram into `buf`.
    ///
    /// Returns the datagram length and its source. In connected mode the
    /// bound peer is reported.
    pub async fn read(
        &self,
        buf: &mut [u8],
    ) -> Result<(usize, Option<SocketAddr>), TransportError> {
        let socket = self.socket()?;

        let (count, source) = self
            .state
            .read_timer()
            .guard(&self.shutdown, async {
                let received = match self.peer {
                    Some(peer) => socket.recv(buf).await.map(|count| (count, Some(peer))),
                    None => socket
                        .recv_from(buf)
                        .await
                        .map(|(count, source)| (count, Some(source))),
                };
                received.map_err(|source| TransportError::ReadFailed { source })
            })
            .await?;

        self.state.add_read_bytes(count);
        Ok((count, source))
    }

    fn socket(&self) -> Result<Arc<UdpSocket>, TransportError> {
        self.socket.lock().clone().ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl Connection for DatagramConnection {
    type Packet = UdpContext;

    fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Records `compress` without touching the payloads.
    fn set_compress_type(&mut self, compress: CompressType) -> Result<(), TransportError> {
        self.state.record_compress_type(compress);
        Ok(())
    }

    async fn write(&self, packet: UdpContext) -> Result<usize, TransportError> {
        let destination = self
            .peer
            .or(packet.peer)
            .ok_or(TransportError::MissingPeerAddress)?;
        let socket = self.socket()?;
        let target = if self.os_connected {
            None
        } else {
            Some(destination)
        };

        self.state.add_write_bytes(packet.payload.len());
        self.state
            .write_timer()
            .guard(&self.shutdown, async {
                send(&socket, &packet.payload, target)
                    .await
                    .map_err(|source| TransportError::WriteFailed { source })
            })
            .await
    }

    async fn close(&self, _linger: Option<Duration>) -> Result<(), TransportError> {
        self.shutdown.cancel();
        if self.socket.lock().take().is_some() {
            #[cfg(feature = "observability")]
            debug!(connection_id = %self.state.id(), "Closed UDP connection");
        }
        Ok(())
    }
}

impl std::fmt::Debug for DatagramConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatagramConnection")
            .field("id", &self.state.id())
            .field("peer", &self.peer)
            .field("os_connected", &self.os_connected)
            .finish()
    }
}

/// Requests destination-address and interface delivery for both families.
///
/// Succeeds if at least one family accepts the request.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn enable_packet_info(socket: &UdpSocket) -> io::Result<()> {
    use nix::sys::socket::{setsockopt, sockopt};

    let ipv6 = setsockopt(socket, sockopt::Ipv6RecvPacketInfo, &true);
    let ipv4 = setsockopt(socket, sockopt::Ipv4PacketInfo, &true);
    match (ipv6, ipv4) {
        (Err(_), Err(e)) => Err(io::Error::from(e)),
        _ => Ok(()),
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn enable_packet_info(_socket: &UdpSocket) -> io::Result<()> {
    Ok(())
}

/// Sends one datagram through `sendmsg`, with room for control messages.
#[cfg(any(target_os = "linux", target_os = "android"))]
async fn send(socket: &UdpSocket, payload: &[u8], target: Option<SocketAddr>) -> io::Result<usize> {
    use nix::sys::socket::{sendmsg, ControlMessage, MsgFlags, SockaddrStorage};
    use std::io::IoSlice;
    use std::os::fd::AsRawFd;
    use tokio::io::Interest;

    let address = target.map(SockaddrStorage::from);
    let control: [ControlMessage<'_>; 0] = [];
    socket
        .async_io(Interest::WRITABLE, || {
            sendmsg(
                socket.as_raw_fd(),
                &[IoSlice::new(payload)],
                &control,
                MsgFlags::empty(),
                address.as_ref(),
            )
            .map_err(io::Error::from)
        })
        .await
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
async fn send(socket: &UdpSocket, payload: &[u8], target: Option<SocketAddr>) -> io::Result<usize> {
    match target {
        Some(target) => socket.send_to(payload, target).await,
        None => socket.send(payload).await,
    }
}
