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

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Global counter for generating unique connection IDs.
///
/// Starts at zero and is only ever advanced by [`ConnectionId::next`].
static NEXT_CONNECTION_ID: AtomicU32 = AtomicU32::new(0);

/// Unique identifier for a connection.
///
/// IDs are handed out in construction order and never reused for the
/// lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u32);

impl ConnectionId {
    /// Creates a connection ID from a raw value.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Allocates the next process-unique ID. The first allocated ID is 1.
    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed).wrapping_add(1))
    }

    /// Returns the raw ID value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection({})", self.0)
    }
}

/// The transport backing a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    /// Byte stream over TCP
    Stream,
    /// Framed messages over WebSocket
    Message,
    /// Datagrams over UDP
    Datagram,
}

impl ConnectionKind {
    /// Returns the string name of this connection kind.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use polyconn::ConnectionKind;
    ///
    /// assert_eq!(ConnectionKind::Stream.as_str(), "tcp");
    /// assert_eq!(ConnectionKind::Message.as_str(), "websocket");
    /// assert_eq!(ConnectionKind::Datagram.as_str(), "udp");
    /// ```
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stream => "tcp",
            Self::Message => "websocket",
            Self::Datagram => "udp",
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time copy of a connection's traffic counters.
///
/// Byte counters wrap at `u32::MAX`, matching the underlying atomics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Connection the counters belong to
    pub id: ConnectionId,
    /// Bytes read from the transport
    pub read_bytes: u32,
    /// Bytes handed to the transport for writing
    pub write_bytes: u32,
    /// Packages read
    pub read_packages: u32,
    /// Packages written
    pub write_packages: u32,
}
