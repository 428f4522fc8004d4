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

//! Snappy framing format over async byte streams.
//!
//! The `snap` crate implements the framing format for blocking I/O only.
//! [`SnappyFrameWriter`] drives its encoder into an in-memory buffer and
//! pushes complete chunks to the inner writer; [`SnappyFrameReader`] splits
//! the inbound byte stream into chunks and hands each data chunk to the
//! `snap` decoder, which checks the masked CRC.
//!
//! The writer is buffered: data reaches the wire when the encoder completes a
//! 64 KiB block, on `flush`, or on `shutdown`.

use snap::read::FrameDecoder;
use snap::write::FrameEncoder;
use std::io::{self, Read, Write};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Stream identifier chunk that opens every snappy framed stream.
const STREAM_IDENTIFIER: &[u8] = b"\xff\x06\x00\x00sNaPpY";

const CHUNK_HEADER_LEN: usize = 4;
const READ_CHUNK: usize = 8 * 1024;

/// Compressing writer emitting the snappy framing format.
pub struct SnappyFrameWriter<W> {
    inner: W,
    encoder: FrameEncoder<Vec<u8>>,
    /// Encoded bytes not yet accepted by `inner`
    pending: Vec<u8>,
    offset: usize,
}

impl<W> SnappyFrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Wraps `inner`.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            encoder: FrameEncoder::new(Vec::new()),
            pending: Vec::new(),
            offset: 0,
        }
    }

    /// Returns the inner writer, discarding anything not yet flushed.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Moves encoder output into the pending buffer.
    fn collect(&mut self) {
        let encoded = self.encoder.get_mut();
        if !encoded.is_empty() {
            self.pending.extend_from_slice(encoded);
            encoded.clear();
        }
    }

    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.offset < self.pending.len() {
            let written =
                ready!(Pin::new(&mut self.inner).poll_write(cx, &self.pending[self.offset..]))?;
            if written == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.offset += written;
        }
        self.pending.clear();
        self.offset = 0;
        Poll::Ready(Ok(()))
    }
}

impl<W> AsyncWrite for SnappyFrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        this.encoder.write_all(buf)?;
        this.collect();
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.encoder.flush()?;
        this.collect();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.as_mut().poll_flush(cx))?;
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Decompressing reader for the snappy framing format.
///
/// Cancel safe: partially received chunks are kept across polls.
pub struct SnappyFrameReader<R> {
    inner: R,
    /// Received bytes not yet parsed into chunks
    raw: Vec<u8>,
    /// Decoded bytes not yet handed to the caller
    decoded: Vec<u8>,
    position: usize,
    identified: bool,
    eof: bool,
}

impl<R> SnappyFrameReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            raw: Vec::new(),
            decoded: Vec::new(),
            position: 0,
            identified: false,
            eof: false,
        }
    }

    /// Returns the inner reader, discarding buffered data.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Parses the next complete chunk out of `raw`.
    ///
    /// Returns `Ok(false)` when `raw` does not yet hold a complete chunk.
    fn next_chunk(&mut self) -> io::Result<bool> {
        if self.raw.len() < CHUNK_HEADER_LEN {
            return Ok(false);
        }
        let kind = self.raw[0];
        let len = usize::from(self.raw[1])
            | usize::from(self.raw[2]) << 8
            | usize::from(self.raw[3]) << 16;
        let total = CHUNK_HEADER_LEN + len;
        if self.raw.len() < total {
            return Ok(false);
        }

        match kind {
            0xff => {
                if &self.raw[CHUNK_HEADER_LEN..total] != b"sNaPpY" {
                    return Err(invalid_data("bad snappy stream identifier"));
                }
                self.identified = true;
            }
            0x00 | 0x01 => {
                if !self.identified {
                    return Err(invalid_data("snappy data chunk before stream identifier"));
                }
                self.decoded = decode_chunk(&self.raw[..total])?;
                self.position = 0;
            }
            0x80..=0xfe => {}
            other => {
                return Err(invalid_data(&format!(
                    "unsupported snappy chunk type 0x{:02x}",
                    other
                )));
            }
        }

        self.raw.drain(..total);
        Ok(true)
    }
}

impl<R> AsyncRead for SnappyFrameReader<R>
where
    R: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if this.position < this.decoded.len() {
                let available = &this.decoded[this.position..];
                let count = available.len().min(buf.remaining());
                buf.put_slice(&available[..count]);
                this.position += count;
                return Poll::Ready(Ok(()));
            }

            if this.next_chunk()? {
                continue;
            }

            if this.eof {
                return if this.raw.is_empty() {
                    Poll::Ready(Ok(()))
                } else {
                    Poll::Ready(Err(io::ErrorKind::UnexpectedEof.into()))
                };
            }

            let mut scratch = [0u8; READ_CHUNK];
            let mut read = ReadBuf::new(&mut scratch);
            ready!(Pin::new(&mut this.inner).poll_read(cx, &mut read))?;
            if read.filled().is_empty() {
                this.eof = true;
            } else {
                this.raw.extend_from_slice(read.filled());
            }
        }
    }
}

/// Decodes one data chunk, verifying its checksum.
fn decode_chunk(chunk: &[u8]) -> io::Result<Vec<u8>> {
    let mut framed = Vec::with_capacity(STREAM_IDENTIFIER.len() + chunk.len());
    framed.extend_from_slice(STREAM_IDENTIFIER);
    framed.extend_from_slice(chunk);

    let mut decoded = Vec::new();
    FrameDecoder::new(framed.as_slice()).read_to_end(&mut decoded)?;
    Ok(decoded)
}

fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}
