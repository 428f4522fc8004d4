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

//! WebSocket message connection.
//!
//! A [`MessageConnection`] reads and writes whole binary messages over a
//! `tokio-tungstenite` [`WebSocketStream`]. Control frames are handled inside
//! [`read`](MessageConnection::read): a ping is answered with a pong carrying
//! the same payload and a pong refreshes the activity timestamp. Pings are
//! only answered while some task is reading.

use super::state::ConnectionState;
use super::traits::Connection;
use super::types::ConnectionKind;
use crate::codec::{CompressType, MessageCompression};
use crate::config::DEFAULT_MAX_MESSAGE_LENGTH;
use crate::TransportError;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use socket2::SockRef;
use std::borrow::Cow;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "observability")]
use tokio_tungstenite::tungstenite::{self, error::ProtocolError};
#[cfg(feature = "observability")]
use tracing::{debug, instrument, warn};

/// Reason sent with the close frame.
const CLOSE_REASON: &str = "bye-bye!!!";

/// Byte stream a WebSocket can run over.
///
/// Besides reading and writing, the stream reports its addresses and knows
/// how to release itself when the connection closes: plain TCP applies
/// `SO_LINGER`, TLS performs a write-side half-close instead.
pub trait MessageTransport: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    /// Returns the local socket address.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Returns the remote socket address.
    fn peer_addr(&self) -> io::Result<SocketAddr>;

    /// Prepares the stream for being dropped.
    fn release(
        &mut self,
        linger: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>>;
}

impl MessageTransport for TcpStream {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::local_addr(self)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }

    fn release(
        &mut self,
        linger: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
        Box::pin(async move {
            if let Some(linger) = linger {
                SockRef::from(&*self).set_linger(Some(linger))?;
            }
            Ok(())
        })
    }
}

#[cfg(feature = "tls")]
impl MessageTransport for tokio_rustls::client::TlsStream<TcpStream> {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.get_ref().0.local_addr()
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.get_ref().0.peer_addr()
    }

    fn release(
        &mut self,
        _linger: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
        // Linger has no meaning under TLS; send close_notify and FIN.
        Box::pin(tokio::io::AsyncWriteExt::shutdown(self))
    }
}

#[cfg(feature = "tls")]
impl MessageTransport for tokio_rustls::server::TlsStream<TcpStream> {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.get_ref().0.local_addr()
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.get_ref().0.peer_addr()
    }

    fn release(
        &mut self,
        _linger: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
        Box::pin(tokio::io::AsyncWriteExt::shutdown(self))
    }
}

/// Message connection over a WebSocket.
///
/// # Compression
///
/// Compression is off after construction. Enabling it through
/// [`set_compress_type`](Connection::set_compress_type) deflates every
/// outbound message. Inbound messages that hold one complete raw DEFLATE
/// stream are inflated, up to the maximum message length; anything else is
/// delivered as sent, so a peer that never compresses can still talk to a
/// compressing one. The reverse direction needs compression enabled on the
/// reading side. Snappy is rejected.
///
/// # Examples
///
/// ```rust,no_run
/// use polyconn::{Connection, MessageConnection};
/// use tokio::net::TcpListener;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let listener = TcpListener::bind("127.0.0.1:8080").await?;
/// let (stream, _) = listener.accept().await?;
/// let ws = tokio_tungstenite::accept_async(stream).await?;
///
/// let conn = MessageConnection::new(ws);
/// let message = conn.read().await?;
/// conn.write(message).await?;
/// conn.close(None).await?;
/// # Ok(())
/// # }
/// ```
pub struct MessageConnection<S: MessageTransport = TcpStream> {
    state: ConnectionState,
    sink: Mutex<Option<SplitSink<WebSocketStream<S>, Message>>>,
    stream: Mutex<Option<SplitStream<WebSocketStream<S>>>>,
    compression: Option<MessageCompression>,
    max_message_length: usize,
    shutdown: CancellationToken,
}

impl<S: MessageTransport> MessageConnection<S> {
    /// Wraps an established WebSocket.
    #[cfg_attr(
        feature = "observability",
        instrument(skip(socket), fields(connection_id, peer_addr))
    )]
    pub fn new(socket: WebSocketStream<S>) -> Self {
        let state = ConnectionState::new(
            ConnectionKind::Message,
            socket.get_ref().local_addr().ok(),
            socket.get_ref().peer_addr().ok(),
        );

        #[cfg(feature = "observability")]
        {
            tracing::Span::current().record("connection_id", state.id().as_u32());
            tracing::Span::current().record("peer_addr", tracing::field::debug(state.peer_addr()));
            debug!("Created WebSocket connection");
        }

        let (sink, stream) = socket.split();
        Self {
            state,
            sink: Mutex::new(Some(sink)),
            stream: Mutex::new(Some(stream)),
            compression: None,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            shutdown: CancellationToken::new(),
        }
    }

    /// Reads the next data message.
    ///
    /// Text and binary messages are both returned as bytes. Control frames
    /// received while waiting are handled and do not end the call. The read
    /// deadline is armed once per call and covers every frame handled in it,
    /// so a stream of pings cannot hold a read open past its deadline.
    ///
    /// # Errors
    ///
    /// - [`TransportError::ConnectionLost`] when the peer closes
    /// - [`TransportError::Timeout`] if the read deadline elapses
    /// - [`TransportError::WebSocket`] on protocol errors
    /// - [`TransportError::ReadFailed`] if an inflated message exceeds the
    ///   maximum message length
    pub async fn read(&self) -> Result<Vec<u8>, TransportError> {
        let mut stream = self.stream.lock().await;
        let stream = stream.as_mut().ok_or(TransportError::Closed)?;

        self.state
            .read_timer()
            .guard(&self.shutdown, self.next_message(stream))
            .await
    }

    /// Sets the largest message an inflated inbound message may grow to.
    ///
    /// Only compressed messages are checked here; the WebSocket layer
    /// enforces its own limit on the wire size.
    pub fn set_max_message_length(&mut self, length: usize) {
        self.max_message_length = length;
        if let Some(codec) = self.compression.as_mut() {
            *codec = codec.with_max_length(length);
        }
    }

    async fn next_message(
        &self,
        stream: &mut SplitStream<WebSocketStream<S>>,
    ) -> Result<Vec<u8>, TransportError> {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return self.deliver(data).await,
                Some(Ok(Message::Text(text))) => return self.deliver(text.into_bytes()).await,
                Some(Ok(Message::Ping(payload))) => self.handle_ping(payload).await?,
                Some(Ok(Message::Pong(_))) => self.handle_pong(),
                Some(Ok(Message::Close(frame))) => return Err(self.peer_closed(frame)),
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(e)) => {
                    #[cfg(feature = "observability")]
                    {
                        if is_unexpected_close(&e) {
                            warn!(
                                connection_id = %self.state.id(),
                                "WebSocket unexpected close error: {}",
                                e
                            );
                        }
                    }
                    return Err(TransportError::WebSocket(e));
                }
                None => {
                    return Err(TransportError::ConnectionLost {
                        reason: "WebSocket stream ended".to_string(),
                    })
                }
            }
        }
    }

    /// Sends an empty ping.
    ///
    /// Keepalive probes are not subject to the write deadline.
    pub async fn write_ping(&self) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        let sink = sink.as_mut().ok_or(TransportError::Closed)?;

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(TransportError::Closed),
            result = sink.send(Message::Ping(Vec::new())) => result.map_err(TransportError::from),
        }
    }

    /// Inflates `payload` when compression is on. Messages from a peer that
    /// does not compress pass through unchanged.
    async fn deliver(&self, payload: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let inflated = match &self.compression {
            Some(codec) => codec
                .decompress(&payload)
                .await
                .map_err(|source| TransportError::ReadFailed { source })?,
            None => None,
        };
        let payload = inflated.unwrap_or(payload);
        self.state.inc_read_pkg_count();
        Ok(payload)
    }

    /// Answers a ping with a pong carrying the same payload.
    ///
    /// A reply that races a close or hits a temporary condition counts as
    /// delivered.
    async fn handle_ping(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        let result = {
            let mut sink = self.sink.lock().await;
            match sink.as_mut() {
                Some(sink) => {
                    self.state
                        .write_timer()
                        .guard(&self.shutdown, async {
                            sink.send(Message::Pong(payload))
                                .await
                                .map_err(TransportError::from)
                        })
                        .await
                }
                None => Err(TransportError::Closed),
            }
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_closing() || e.is_temporary() => {}
            Err(e) => return Err(e),
        }
        self.state.update_active();
        Ok(())
    }

    fn handle_pong(&self) {
        self.state.update_active();
    }

    fn peer_closed(&self, frame: Option<CloseFrame<'static>>) -> TransportError {
        let reason = match &frame {
            Some(frame) => format!("peer closed with {}: {}", frame.code, frame.reason),
            None => "peer closed without status".to_string(),
        };

        #[cfg(feature = "observability")]
        {
            if !matches!(&frame, Some(frame) if frame.code == CloseCode::Away) {
                warn!(connection_id = %self.state.id(), "WebSocket unexpected close: {}", reason);
            }
        }

        TransportError::ConnectionLost { reason }
    }
}

#[async_trait]
impl<S: MessageTransport> Connection for MessageConnection<S> {
    type Packet = Vec<u8>;

    fn state(&self) -> &ConnectionState {
        &self.state
    }

    fn set_compress_type(&mut self, compress: CompressType) -> Result<(), TransportError> {
        let codec = MessageCompression::new(compress)?.with_max_length(self.max_message_length);
        self.compression = Some(codec);
        self.state.record_compress_type(compress);
        Ok(())
    }

    async fn write(&self, packet: Vec<u8>) -> Result<usize, TransportError> {
        let mut sink = self.sink.lock().await;
        let sink = sink.as_mut().ok_or(TransportError::Closed)?;

        let length = packet.len();
        self.state.add_write_bytes(length);
        let payload = match &self.compression {
            Some(codec) => codec
                .compress(&packet)
                .await
                .map_err(|source| TransportError::WriteFailed { source })?,
            None => packet,
        };

        self.state
            .write_timer()
            .guard(&self.shutdown, async {
                sink.send(Message::Binary(payload))
                    .await
                    .map_err(TransportError::from)
            })
            .await?;

        Ok(length)
    }

    #[cfg_attr(feature = "observability", instrument(skip(self)))]
    async fn close(&self, linger: Option<Duration>) -> Result<(), TransportError> {
        self.shutdown.cancel();

        // Same lock order as `read`, which takes the sink to answer pings.
        let stream = self.stream.lock().await.take();
        let Some(mut sink) = self.sink.lock().await.take() else {
            return Ok(());
        };

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: Cow::Borrowed(CLOSE_REASON),
        };
        if let Err(_e) = self
            .state
            .write_timer()
            .bounded(async {
                sink.send(Message::Close(Some(frame)))
                    .await
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
            })
            .await
        {
            #[cfg(feature = "observability")]
            debug!(connection_id = %self.state.id(), "Close frame not sent: {}", _e);
        }

        if let Some(stream) = stream {
            let mut socket = stream.reunite(sink).map_err(|e| TransportError::Io {
                source: io::Error::new(io::ErrorKind::Other, e.to_string()),
            })?;
            socket.get_mut().release(linger).await?;
        }

        #[cfg(feature = "observability")]
        debug!(connection_id = %self.state.id(), "Closed WebSocket connection");

        Ok(())
    }
}

impl<S: MessageTransport> std::fmt::Debug for MessageConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageConnection")
            .field("id", &self.state.id())
            .field("peer_addr", &self.state.peer_addr())
            .field("compress_type", &self.state.compress_type())
            .finish()
    }
}

/// Returns `true` if the peer vanished without a closing handshake.
#[cfg(feature = "observability")]
fn is_unexpected_close(error: &tungstenite::Error) -> bool {
    match error {
        tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        tungstenite::Error::Io(e) => matches!(
            e.kind(),
            io::ErrorKind::UnexpectedEof
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
        ),
        _ => false,
    }
}
