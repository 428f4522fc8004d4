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

//! Codec substitution for byte streams.
//!
//! A stream connection owns one [`StreamReader`] and one [`StreamWriter`].
//! Both start out raw and are swapped for a compressing pair when a
//! compression type is installed. Both peers must install the same type.

use super::snappy::{SnappyFrameReader, SnappyFrameWriter};
use super::types::CompressType;
use async_compression::tokio::bufread::DeflateDecoder;
use async_compression::tokio::write::DeflateEncoder;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, BufReader, ReadBuf};

/// Read side of a stream connection.
pub enum StreamReader<R> {
    /// Bytes pass through untouched
    Raw(R),
    /// Raw DEFLATE decompression
    Deflate(DeflateDecoder<BufReader<R>>),
    /// Snappy framing format decompression
    Snappy(SnappyFrameReader<R>),
}

impl<R> StreamReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Wraps `inner` with the decoder matching `compress`.
    pub fn with_compression(inner: R, compress: CompressType) -> Self {
        if compress.is_deflate() {
            StreamReader::Deflate(DeflateDecoder::new(BufReader::new(inner)))
        } else {
            StreamReader::Snappy(SnappyFrameReader::new(inner))
        }
    }

    /// Returns `true` unless this is the raw reader.
    pub fn is_compressed(&self) -> bool {
        !matches!(self, StreamReader::Raw(_))
    }

    /// Unwraps the underlying reader. Buffered input is discarded.
    pub fn into_inner(self) -> R {
        match self {
            StreamReader::Raw(inner) => inner,
            StreamReader::Deflate(decoder) => decoder.into_inner().into_inner(),
            StreamReader::Snappy(reader) => reader.into_inner(),
        }
    }
}

impl<R> AsyncRead for StreamReader<R>
where
    R: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            StreamReader::Raw(r) => Pin::new(r).poll_read(cx, buf),
            StreamReader::Deflate(d) => Pin::new(d).poll_read(cx, buf),
            StreamReader::Snappy(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

/// Write side of a stream connection.
pub enum StreamWriter<W> {
    /// Bytes pass through untouched
    Raw(W),
    /// Raw DEFLATE compression, flushed after every write
    Deflate(DeflateEncoder<W>),
    /// Buffered snappy framing format compression
    Snappy(SnappyFrameWriter<W>),
}

impl<W> StreamWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Wraps `inner` with the encoder matching `compress`.
    pub fn with_compression(inner: W, compress: CompressType) -> Self {
        match compress.deflate_level() {
            Some(level) => StreamWriter::Deflate(DeflateEncoder::with_quality(inner, level)),
            None => StreamWriter::Snappy(SnappyFrameWriter::new(inner)),
        }
    }

    /// Returns `true` if each write must be followed by a flush so the peer
    /// can decode it without waiting for more data.
    pub fn flushes_per_write(&self) -> bool {
        matches!(self, StreamWriter::Deflate(_))
    }

    /// Returns `true` if this writer holds data until flushed.
    pub fn is_buffered(&self) -> bool {
        matches!(self, StreamWriter::Snappy(_))
    }

    /// Unwraps the underlying writer. Unflushed output is discarded.
    pub fn into_inner(self) -> W {
        match self {
            StreamWriter::Raw(inner) => inner,
            StreamWriter::Deflate(encoder) => encoder.into_inner(),
            StreamWriter::Snappy(writer) => writer.into_inner(),
        }
    }
}

impl<W> AsyncWrite for StreamWriter<W>
where
    W: AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            StreamWriter::Raw(w) => Pin::new(w).poll_write(cx, buf),
            StreamWriter::Deflate(e) => Pin::new(e).poll_write(cx, buf),
            StreamWriter::Snappy(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            StreamWriter::Raw(w) => Pin::new(w).poll_flush(cx),
            StreamWriter::Deflate(e) => Pin::new(e).poll_flush(cx),
            StreamWriter::Snappy(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            StreamWriter::Raw(w) => Pin::new(w).poll_shutdown(cx),
            StreamWriter::Deflate(e) => Pin::new(e).poll_shutdown(cx),
            StreamWriter::Snappy(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}
