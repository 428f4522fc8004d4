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

//! Typed connection configuration.
//!
//! Loading configuration from files or the environment is left to the
//! application. This module only defines the already-parsed values and how
//! they are applied to sockets and connections.
//!
//! # Examples
//!
//! ```rust
//! use polyconn::{CompressType, ConnectionConfig};
//! use std::time::Duration;
//!
//! let config = ConnectionConfig::default()
//!     .with_read_deadline(Duration::from_secs(5))
//!     .with_compression(CompressType::BestSpeed)
//!     .with_max_message_length(1024 * 1024);
//!
//! assert!(config.compression_enabled);
//! assert_eq!(config.websocket_config().max_message_size, Some(1024 * 1024));
//! ```

use crate::codec::CompressType;
use crate::connection::{Connection, MessageConnection, MessageTransport};
use crate::TransportError;
use socket2::{SockRef, TcpKeepalive};
use std::io;
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

/// Default interval between session heartbeats.
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_secs(30);

/// Default idle time after which a session is considered dead.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default upper bound for a single message.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 16 * 1024 * 1024;

/// Per-connection settings consumed by the session layer.
///
/// Deadlines and compression are installed on a connection by
/// [`apply`](Self::apply). Heartbeat period and session timeout are carried
/// for the session layer, which owns keepalive scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConnectionConfig {
    /// Read deadline magnitude; `None` or zero leaves reads unbounded
    pub read_deadline: Option<Duration>,

    /// Write deadline magnitude; `None` or zero leaves writes unbounded
    pub write_deadline: Option<Duration>,

    /// Whether to install `compress_type` on the connection
    pub compression_enabled: bool,

    /// Compression codec used when `compression_enabled` is set
    pub compress_type: CompressType,

    /// Interval between heartbeats sent by the session layer
    pub heartbeat_period: Duration,

    /// Idle time after which the session layer closes the connection
    pub session_timeout: Duration,

    /// Largest message the session layer accepts
    pub max_message_length: usize,

    /// Socket-level options
    pub socket: SocketOptions,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_deadline: None,
            write_deadline: None,
            compression_enabled: false,
            compress_type: CompressType::None,
            heartbeat_period: DEFAULT_HEARTBEAT_PERIOD,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            socket: SocketOptions::default(),
        }
    }
}

impl ConnectionConfig {
    /// Sets the read deadline.
    pub fn with_read_deadline(mut self, deadline: Duration) -> Self {
        self.read_deadline = Some(deadline);
        self
    }

    /// Sets the write deadline.
    pub fn with_write_deadline(mut self, deadline: Duration) -> Self {
        self.write_deadline = Some(deadline);
        self
    }

    /// Enables compression with `compress`.
    pub fn with_compression(mut self, compress: CompressType) -> Self {
        self.compression_enabled = true;
        self.compress_type = compress;
        self
    }

    /// Sets the heartbeat period.
    pub fn with_heartbeat_period(mut self, period: Duration) -> Self {
        self.heartbeat_period = period;
        self
    }

    /// Sets the session idle timeout.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Sets the maximum message length.
    pub fn with_max_message_length(mut self, length: usize) -> Self {
        self.max_message_length = length;
        self
    }

    /// Sets the socket options.
    pub fn with_socket_options(mut self, socket: SocketOptions) -> Self {
        self.socket = socket;
        self
    }

    /// Installs deadlines and compression on `conn`.
    ///
    /// Zero deadlines are skipped.
    ///
    /// # Errors
    ///
    /// Propagates the error from
    /// [`Connection::set_compress_type`](crate::Connection::set_compress_type).
    pub fn apply<C: Connection>(&self, conn: &mut C) -> Result<(), TransportError> {
        if let Some(deadline) = self.read_deadline.filter(|d| !d.is_zero()) {
            conn.set_read_deadline(deadline);
        }
        if let Some(deadline) = self.write_deadline.filter(|d| !d.is_zero()) {
            conn.set_write_deadline(deadline);
        }
        if self.compression_enabled {
            conn.set_compress_type(self.compress_type)?;
        }
        Ok(())
    }

    /// Installs the maximum message length, deadlines and compression on a
    /// message connection.
    ///
    /// The length limit bounds inflated messages as well as the wire frames
    /// limited by [`websocket_config`](Self::websocket_config).
    ///
    /// # Errors
    ///
    /// Same as [`apply`](Self::apply).
    pub fn apply_message<S: MessageTransport>(
        &self,
        conn: &mut MessageConnection<S>,
    ) -> Result<(), TransportError> {
        conn.set_max_message_length(self.max_message_length);
        self.apply(conn)
    }

    /// Derives the WebSocket protocol limits from this configuration.
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig {
            max_message_size: Some(self.max_message_length),
            max_frame_size: Some(self.max_message_length),
            ..WebSocketConfig::default()
        }
    }
}

/// Options applied to a socket before it is wrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SocketOptions {
    /// Disable Nagle's algorithm (TCP only)
    pub no_delay: bool,

    /// Idle time before TCP keepalive probes start; `None` disables them
    pub keep_alive: Option<Duration>,

    /// `SO_RCVBUF` size in bytes
    pub recv_buffer_size: Option<usize>,

    /// `SO_SNDBUF` size in bytes
    pub send_buffer_size: Option<usize>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            no_delay: true,
            keep_alive: None,
            recv_buffer_size: None,
            send_buffer_size: None,
        }
    }
}

impl SocketOptions {
    /// Applies every option to a TCP stream.
    pub fn apply(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(self.no_delay)?;
        let socket = SockRef::from(stream);
        if let Some(idle) = self.keep_alive {
            socket.set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))?;
        }
        self.apply_buffers(&socket)
    }

    /// Applies the buffer sizes to a UDP socket.
    pub fn apply_datagram(&self, socket: &UdpSocket) -> io::Result<()> {
        self.apply_buffers(&SockRef::from(socket))
    }

    fn apply_buffers(&self, socket: &SockRef<'_>) -> io::Result<()> {
        if let Some(size) = self.recv_buffer_size {
            socket.set_recv_buffer_size(size)?;
        }
        if let Some(size) = self.send_buffer_size {
            socket.set_send_buffer_size(size)?;
        }
        Ok(())
    }
}
