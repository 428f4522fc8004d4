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

//! Connection layer error types.
//!
//! Every fallible operation on a connection returns a [`TransportError`]. The
//! connection layer never retries on its own; the classification helpers on
//! the error let the session layer decide whether to retry, reconnect or tear
//! the connection down.
//!
//! # Error Categories
//!
//! - **Contract violations**: invalid compression setup, unknown raw values
//! - **I/O errors**: read/write failures reported by the socket
//! - **Deadline errors**: an armed read or write deadline elapsed
//! - **Lifecycle errors**: the connection was closed or lost
//!
//! Zero deadline magnitudes are not represented here: they are rejected by a
//! panic at the setter, because no caller can meaningfully recover from one.

use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that can occur on a connection.
///
/// # Examples
///
/// ```rust
/// use polyconn::TransportError;
/// use std::io;
///
/// let error = TransportError::ReadFailed {
///     source: io::Error::new(io::ErrorKind::Interrupted, "interrupted"),
/// };
///
/// assert!(error.is_temporary());
/// assert!(!error.should_close_transport());
/// ```
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to read from the underlying socket.
    #[error("read failed: {source}")]
    ReadFailed {
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Failed to write to the underlying socket.
    #[error("write failed: {source}")]
    WriteFailed {
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The armed read or write deadline elapsed before the operation completed.
    #[error("operation timed out after {duration:?}")]
    Timeout {
        /// The configured deadline magnitude
        duration: Duration,
    },

    /// The peer went away, either with a close frame or by ending the stream.
    #[error("connection lost: {reason}")]
    ConnectionLost {
        /// Description of why the connection was lost
        reason: String,
    },

    /// The connection was configured in a way its transport cannot honour.
    ///
    /// This indicates a caller contract violation, not a runtime condition.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
    },

    /// An unconnected datagram write carried no destination address.
    #[error("datagram write requires a peer address on an unconnected socket")]
    MissingPeerAddress,

    /// The connection has been closed locally.
    #[error("connection is closed")]
    Closed,

    /// An I/O error outside of a read or write call, e.g. while setting
    /// socket options.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// WebSocket protocol or framing error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

impl TransportError {
    pub(crate) fn invalid_configuration(reason: impl Into<String>) -> Self {
        TransportError::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Returns `true` for conditions expected to clear on their own.
    ///
    /// Deadline expiry and the interrupted/would-block family of I/O errors
    /// count as temporary. A keepalive reply that hits one of these is
    /// treated as delivered.
    pub fn is_temporary(&self) -> bool {
        match self {
            TransportError::Timeout { .. } => true,
            TransportError::ReadFailed { source }
            | TransportError::WriteFailed { source }
            | TransportError::Io { source } => is_transient_kind(source.kind()),
            TransportError::WebSocket(tungstenite::Error::Io(source)) => {
                is_transient_kind(source.kind())
            }
            _ => false,
        }
    }

    /// Returns `true` if the error means the connection is already on its way
    /// down, locally or through the closing handshake.
    pub fn is_closing(&self) -> bool {
        matches!(
            self,
            TransportError::Closed
                | TransportError::WebSocket(
                    tungstenite::Error::AlreadyClosed
                        | tungstenite::Error::ConnectionClosed
                        | tungstenite::Error::Protocol(
                            tungstenite::error::ProtocolError::SendAfterClosing
                        )
                )
        )
    }

    /// Returns `true` if the session layer may retry the failed operation on
    /// the same connection.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TransportError::Timeout { .. } => true,
            TransportError::ReadFailed { .. }
            | TransportError::WriteFailed { .. }
            | TransportError::Io { .. }
            | TransportError::WebSocket(_) => self.is_temporary(),
            TransportError::ConnectionLost { .. }
            | TransportError::InvalidConfiguration { .. }
            | TransportError::MissingPeerAddress
            | TransportError::Closed => false,
        }
    }

    /// Returns `true` if the error indicates the connection should be closed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use polyconn::TransportError;
    ///
    /// assert!(TransportError::Closed.should_close_transport());
    /// assert!(!TransportError::MissingPeerAddress.should_close_transport());
    /// ```
    pub fn should_close_transport(&self) -> bool {
        match self {
            TransportError::ConnectionLost { .. } | TransportError::Closed => true,

            // Caller mistakes leave the socket itself healthy.
            TransportError::InvalidConfiguration { .. } | TransportError::MissingPeerAddress => {
                false
            }

            TransportError::ReadFailed { source }
            | TransportError::WriteFailed { source }
            | TransportError::Io { source } => !matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),

            TransportError::Timeout { .. } => true,

            TransportError::WebSocket(_) => true,
        }
    }
}

fn is_transient_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        TransportError::Io { source: error }
    }
}
