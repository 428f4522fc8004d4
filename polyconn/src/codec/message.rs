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

//! Per-message compression for message connections.

use super::types::CompressType;
use crate::config::DEFAULT_MAX_MESSAGE_LENGTH;
use crate::TransportError;
use async_compression::tokio::bufread::DeflateDecoder;
use async_compression::tokio::write::DeflateEncoder;
use async_compression::Level;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Compresses each message as an independent raw DEFLATE stream.
///
/// Every outbound binary message is deflated on its own and every inbound
/// message is inflated on its own, so messages never depend on each other.
/// The setting is not negotiated. Inbound payloads that are not a complete
/// DEFLATE stream are reported as uncompressed, which lets a compressing
/// connection read from a peer that does not compress. Only the deflate
/// family is available.
///
/// Inflation stops once the output passes the maximum message length, so a
/// small frame cannot expand without bound.
#[derive(Debug, Clone, Copy)]
pub struct MessageCompression {
    compress: CompressType,
    level: Level,
    max_length: usize,
}

impl MessageCompression {
    /// Creates the codec for `compress`, limited to
    /// [`DEFAULT_MAX_MESSAGE_LENGTH`] inflated bytes.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfiguration`] for
    /// [`CompressType::Snappy`].
    pub fn new(compress: CompressType) -> Result<Self, TransportError> {
        let level = compress.deflate_level().ok_or_else(|| {
            TransportError::invalid_configuration(format!(
                "{} compression is not available on message connections",
                compress
            ))
        })?;
        Ok(Self {
            compress,
            level,
            max_length: DEFAULT_MAX_MESSAGE_LENGTH,
        })
    }

    /// Returns a copy limited to `max_length` inflated bytes per message.
    pub fn with_max_length(self, max_length: usize) -> Self {
        Self { max_length, ..self }
    }

    /// Returns the configured compression type.
    pub fn compress_type(&self) -> CompressType {
        self.compress
    }

    /// Returns the inflated size limit.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Compresses one outbound message.
    pub async fn compress(&self, payload: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::with_quality(Vec::with_capacity(payload.len()), self.level);
        encoder.write_all(payload).await?;
        encoder.shutdown().await?;
        Ok(encoder.into_inner())
    }

    /// Decompresses one inbound message.
    ///
    /// Returns `Ok(None)` if `payload` is not exactly one complete raw
    /// DEFLATE stream; such a payload was sent uncompressed.
    ///
    /// # Errors
    ///
    /// Returns an [`io::ErrorKind::InvalidData`] error if the inflated
    /// message is longer than the maximum length.
    pub async fn decompress(&self, payload: &[u8]) -> io::Result<Option<Vec<u8>>> {
        let limit = u64::try_from(self.max_length).unwrap_or(u64::MAX);
        let mut decoder = DeflateDecoder::new(payload).take(limit.saturating_add(1));
        let mut decoded = Vec::new();
        if decoder.read_to_end(&mut decoded).await.is_err() {
            return Ok(None);
        }

        if decoded.len() > self.max_length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("inflated message exceeds {} bytes", self.max_length),
            ));
        }

        // Trailing bytes after the end of the stream mean it was never deflated.
        let remaining = decoder.into_inner().into_inner();
        if !remaining.is_empty() {
            return Ok(None);
        }
        Ok(Some(decoded))
    }
}
