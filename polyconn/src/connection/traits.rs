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

use super::state::ConnectionState;
use super::types::{ConnectionId, ConnectionKind, ConnectionStats};
use crate::codec::CompressType;
use crate::TransportError;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Capability set shared by every connection variant.
///
/// The session layer drives a connection exclusively through this trait and
/// never touches transport internals. Reading is variant specific (a byte
/// stream, a whole message, or a datagram with its source) and therefore
/// lives on the concrete types.
///
/// # Implementations
///
/// - [`StreamConnection`](crate::StreamConnection): TCP byte streams
/// - [`MessageConnection`](crate::MessageConnection): WebSocket messages
/// - [`DatagramConnection`](crate::DatagramConnection): UDP datagrams
///
/// # Examples
///
/// ```rust,no_run
/// use polyconn::{Connection, StreamConnection};
/// use std::time::Duration;
/// use tokio::net::TcpStream;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let stream = TcpStream::connect("127.0.0.1:8080").await?;
/// let conn = StreamConnection::new(stream);
///
/// conn.set_read_deadline(Duration::from_secs(5));
/// assert_eq!(conn.write_deadline(), Duration::from_secs(5));
///
/// let written = conn.write(b"hello".to_vec()).await?;
/// assert_eq!(written, 5);
///
/// conn.close(Some(Duration::from_secs(1))).await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Connection: Send + Sync {
    /// Payload accepted by [`write`](Connection::write).
    type Packet: Send;

    /// Returns the shared state block.
    fn state(&self) -> &ConnectionState;

    /// Installs the compression codec.
    ///
    /// Must be called before any traffic flows.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfiguration`] if the transport
    /// cannot use `compress`, or if a codec is already installed.
    fn set_compress_type(&mut self, compress: CompressType) -> Result<(), TransportError>;

    /// Writes one packet and returns the number of payload bytes written.
    ///
    /// The write byte counter is advanced by the payload length before the
    /// transport is called, so it counts attempted bytes.
    async fn write(&self, packet: Self::Packet) -> Result<usize, TransportError>;

    /// Closes the connection.
    ///
    /// `linger` controls `SO_LINGER` on transports that support it; `None`
    /// leaves the OS default. Pending reads and writes resolve with
    /// [`TransportError::Closed`]. Closing an already closed connection is a
    /// no-op.
    async fn close(&self, linger: Option<Duration>) -> Result<(), TransportError>;

    /// Returns the connection ID.
    fn id(&self) -> ConnectionId {
        self.state().id()
    }

    /// Returns the transport kind.
    fn kind(&self) -> ConnectionKind {
        self.state().kind()
    }

    /// Returns the local address, if known.
    fn local_addr(&self) -> Option<SocketAddr> {
        self.state().local_addr()
    }

    /// Returns the peer address, if known.
    fn peer_addr(&self) -> Option<SocketAddr> {
        self.state().peer_addr()
    }

    /// Returns the recorded compression type.
    fn compress_type(&self) -> CompressType {
        self.state().compress_type()
    }

    /// Returns the read deadline magnitude, or zero when unset.
    fn read_deadline(&self) -> Duration {
        self.state().read_deadline()
    }

    /// Sets the read deadline magnitude. See
    /// [`ConnectionState::set_read_deadline`].
    fn set_read_deadline(&self, deadline: Duration) {
        self.state().set_read_deadline(deadline)
    }

    /// Returns the write deadline magnitude, or zero when unset.
    fn write_deadline(&self) -> Duration {
        self.state().write_deadline()
    }

    /// Sets the write deadline magnitude. See
    /// [`ConnectionState::set_write_deadline`].
    fn set_write_deadline(&self, deadline: Duration) {
        self.state().set_write_deadline(deadline)
    }

    /// Records activity at the current time.
    fn update_active(&self) {
        self.state().update_active()
    }

    /// Returns the time of the last recorded activity.
    fn get_active(&self) -> Instant {
        self.state().get_active()
    }

    /// Increments the read package counter.
    fn inc_read_pkg_count(&self) {
        self.state().inc_read_pkg_count()
    }

    /// Increments the write package counter.
    fn inc_write_pkg_count(&self) {
        self.state().inc_write_pkg_count()
    }

    /// Takes a snapshot of the traffic counters.
    fn stats(&self) -> ConnectionStats {
        self.state().stats()
    }
}
