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

//! TCP stream connection.

use super::state::ConnectionState;
use super::traits::Connection;
use super::types::ConnectionKind;
use crate::codec::{CompressType, StreamReader, StreamWriter};
use crate::config::SocketOptions;
use crate::TransportError;
use async_trait::async_trait;
use socket2::SockRef;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "observability")]
use tracing::{debug, error, instrument};

/// Byte-stream connection over TCP.
///
/// The socket is split into independently locked read and write halves, so
/// a reader loop and writers on other tasks never contend. Calls in the same
/// direction are serialized.
///
/// # Compression
///
/// [`set_compress_type`](Connection::set_compress_type) replaces the raw
/// halves with a compressing pair. Deflate output is flushed after every
/// write; Snappy output is buffered until [`flush`](Self::flush) or
/// [`close`](Connection::close).
///
/// # Examples
///
/// ```rust,no_run
/// use polyconn::{CompressType, Connection, StreamConnection};
/// use tokio::net::TcpStream;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let stream = TcpStream::connect("127.0.0.1:8080").await?;
/// let mut conn = StreamConnection::new(stream);
/// conn.set_compress_type(CompressType::Zip)?;
///
/// conn.write(b"hello".to_vec()).await?;
///
/// let mut buffer = [0u8; 1024];
/// let n = conn.read(&mut buffer).await?;
/// println!("received {} bytes", n);
/// # Ok(())
/// # }
/// ```
pub struct StreamConnection {
    state: ConnectionState,
    reader: Mutex<Option<StreamReader<OwnedReadHalf>>>,
    writer: Mutex<Option<StreamWriter<OwnedWriteHalf>>>,
    shutdown: CancellationToken,
}

impl StreamConnection {
    /// Wraps a connected TCP stream.
    ///
    /// Addresses the socket cannot report are recorded as unknown.
    #[cfg_attr(
        feature = "observability",
        instrument(skip(stream), fields(connection_id, peer_addr))
    )]
    pub fn new(stream: TcpStream) -> Self {
        let state = ConnectionState::new(
            ConnectionKind::Stream,
            stream.local_addr().ok(),
            stream.peer_addr().ok(),
        );

        #[cfg(feature = "observability")]
        {
            tracing::Span::current().record("connection_id", state.id().as_u32());
            tracing::Span::current().record("peer_addr", tracing::field::debug(state.peer_addr()));
            debug!("Created TCP connection");
        }

        let (read_half, write_half) = stream.into_split();
        Self {
            state,
            reader: Mutex::new(Some(StreamReader::Raw(read_half))),
            writer: Mutex::new(Some(StreamWriter::Raw(write_half))),
            shutdown: CancellationToken::new(),
        }
    }

    /// Applies `options` to the socket and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if an option cannot be set.
    pub fn with_socket_options(
        stream: TcpStream,
        options: &SocketOptions,
    ) -> Result<Self, TransportError> {
        options.apply(&stream)?;
        Ok(Self::new(stream))
    }

    /// Reads bytes into `buf`, returning how many were read.
    ///
    /// Returns `Ok(0)` once the peer has closed its side.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Timeout`] if the read deadline elapses
    /// - [`TransportError::Closed`] if the connection is closed
    /// - [`TransportError::ReadFailed`] on socket or decoding errors
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut reader = self.reader.lock().await;
        let reader = reader.as_mut().ok_or(TransportError::Closed)?;

        let count = self
            .state
            .read_timer()
            .guard(&self.shutdown, async {
                reader
                    .read(buf)
                    .await
                    .map_err(|source| TransportError::ReadFailed { source })
            })
            .await?;

        self.state.add_read_bytes(count);
        Ok(count)
    }

    /// Pushes any buffered compressed output to the socket.
    pub async fn flush(&self) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(TransportError::Closed)?;

        self.state
            .write_timer()
            .guard(&self.shutdown, async {
                writer.flush().await.map_err(write_failed)
            })
            .await
    }
}

#[async_trait]
impl Connection for StreamConnection {
    type Packet = Vec<u8>;

    fn state(&self) -> &ConnectionState {
        &self.state
    }

    fn set_compress_type(&mut self, compress: CompressType) -> Result<(), TransportError> {
        let reader = self.reader.get_mut();
        let writer = self.writer.get_mut();

        match (reader.take(), writer.take()) {
            (Some(StreamReader::Raw(read_half)), Some(StreamWriter::Raw(write_half))) => {
                *reader = Some(StreamReader::with_compression(read_half, compress));
                *writer = Some(StreamWriter::with_compression(write_half, compress));
                self.state.record_compress_type(compress);

                #[cfg(feature = "observability")]
                debug!(connection_id = %self.state.id(), %compress, "Installed stream codec");

                Ok(())
            }
            (None, previous_writer) => {
                *writer = previous_writer;
                Err(TransportError::Closed)
            }
            (previous_reader, previous_writer) => {
                *reader = previous_reader;
                *writer = previous_writer;
                Err(TransportError::invalid_configuration(format!(
                    "compression already installed as {}",
                    self.state.compress_type()
                )))
            }
        }
    }

    async fn write(&self, packet: Vec<u8>) -> Result<usize, TransportError> {
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(TransportError::Closed)?;

        self.state.add_write_bytes(packet.len());
        self.state
            .write_timer()
            .guard(&self.shutdown, async {
                writer.write_all(&packet).await.map_err(write_failed)?;
                if writer.flushes_per_write() {
                    writer.flush().await.map_err(write_failed)?;
                }
                Ok(())
            })
            .await?;

        Ok(packet.len())
    }

    #[cfg_attr(feature = "observability", instrument(skip(self)))]
    async fn close(&self, linger: Option<Duration>) -> Result<(), TransportError> {
        self.shutdown.cancel();

        let Some(reader) = self.reader.lock().await.take() else {
            return Ok(());
        };
        let Some(mut writer) = self.writer.lock().await.take() else {
            return Ok(());
        };

        if !matches!(writer, StreamWriter::Raw(_)) {
            // Finish the codec stream so the peer sees a clean end of input.
            if let Err(_e) = self.state.write_timer().bounded(writer.shutdown()).await {
                #[cfg(feature = "observability")]
                error!(
                    connection_id = %self.state.id(),
                    "Failed to finish {} writer: {}",
                    self.state.compress_type(),
                    _e
                );
            }
        }

        let stream = reader
            .into_inner()
            .reunite(writer.into_inner())
            .map_err(|e| TransportError::Io {
                source: io::Error::new(io::ErrorKind::Other, e),
            })?;

        if let Some(linger) = linger {
            SockRef::from(&stream).set_linger(Some(linger))?;
        }

        #[cfg(feature = "observability")]
        debug!(connection_id = %self.state.id(), "Closed TCP connection");

        drop(stream);
        Ok(())
    }
}

impl std::fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnection")
            .field("id", &self.state.id())
            .field("peer_addr", &self.state.peer_addr())
            .field("compress_type", &self.state.compress_type())
            .finish()
    }
}

fn write_failed(source: io::Error) -> TransportError {
    TransportError::WriteFailed { source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    #[tokio::test]
    async fn test_addresses_captured() {
        let (client, server) = pair().await;
        let server_addr = server.local_addr().unwrap();
        let conn = StreamConnection::new(client);

        assert_eq!(conn.kind(), ConnectionKind::Stream);
        assert_eq!(conn.peer_addr(), Some(server_addr));
        assert!(conn.local_addr().is_some());
    }

    #[tokio::test]
    async fn test_write_counts_bytes() {
        let (client, server) = pair().await;
        let client = StreamConnection::new(client);
        let server = StreamConnection::new(server);

        for payload in [&b"abc"[..], b"defgh", b"ij"] {
            let written = client.write(payload.to_vec()).await.unwrap();
            assert_eq!(written, payload.len());
        }
        assert_eq!(client.stats().write_bytes, 10);

        let mut received = Vec::new();
        let mut buffer = [0u8; 64];
        while received.len() < 10 {
            let n = server.read(&mut buffer).await.unwrap();
            received.extend_from_slice(&buffer[..n]);
        }
        assert_eq!(received, b"abcdefghij");
        assert_eq!(server.stats().read_bytes, 10);
    }

    #[tokio::test]
    async fn test_second_compress_type_rejected() {
        let (client, _server) = pair().await;
        let mut conn = StreamConnection::new(client);

        conn.set_compress_type(CompressType::Zip).unwrap();
        let error = conn.set_compress_type(CompressType::Snappy).unwrap_err();
        assert!(matches!(error, TransportError::InvalidConfiguration { .. }));
        assert_eq!(conn.compress_type(), CompressType::Zip);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (client, _server) = pair().await;
        let conn = StreamConnection::new(client);

        conn.close(Some(Duration::from_secs(0))).await.unwrap();
        conn.close(None).await.unwrap();

        let mut buffer = [0u8; 8];
        assert!(matches!(conn.read(&mut buffer).await, Err(TransportError::Closed)));
        assert!(matches!(conn.write(vec![1]).await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_read_deadline_elapses() {
        let (client, _server) = pair().await;
        let conn = StreamConnection::new(client);
        conn.set_read_deadline(Duration::from_millis(50));

        let mut buffer = [0u8; 8];
        let error = conn.read(&mut buffer).await.unwrap_err();
        assert!(matches!(error, TransportError::Timeout { .. }));
        assert!(error.is_temporary());
    }

    #[tokio::test]
    async fn test_closely_spaced_reads_arm_deadline_once() {
        let (client, server) = pair().await;
        let client = StreamConnection::new(client);
        let server = StreamConnection::new(server);
        client.set_read_deadline(Duration::from_secs(2));

        let mut buffer = [0u8; 8];
        for round in 0..5u8 {
            server.write(vec![round]).await.unwrap();
            let n = client.read(&mut buffer).await.unwrap();
            assert_eq!(&buffer[..n], &[round]);
            // Well inside the 500ms quarter of the deadline.
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(client.state().read_timer().rearm_count(), 1);
        assert_eq!(client.state().write_timer().rearm_count(), 0);
    }

    #[tokio::test]
    async fn test_close_unblocks_pending_read() {
        let (client, _server) = pair().await;
        let conn = Arc::new(StreamConnection::new(client));

        let reader = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move {
                let mut buffer = [0u8; 8];
                conn.read(&mut buffer).await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        conn.close(None).await.unwrap();

        let result = reader.await.unwrap();
        assert!(matches!(result, Err(TransportError::Closed)));
    }
}
