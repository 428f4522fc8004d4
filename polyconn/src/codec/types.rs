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

//! Compression type selection.

use crate::TransportError;
use async_compression::Level;
use std::fmt;

/// Compression codec applied to a connection's payload bytes.
///
/// The deflate family (`None`, `Zip`, `BestSpeed`, `BestCompression`,
/// `Huffman`) shares one raw DEFLATE wire format and differs only in the
/// encoder level. `Snappy` uses the snappy framing format and is only
/// available on stream connections.
///
/// Raw values are stable and match the levels exchanged with peers that
/// configure compression numerically.
///
/// # Examples
///
/// ```rust
/// use polyconn::CompressType;
///
/// assert_eq!(CompressType::default(), CompressType::None);
/// assert_eq!(CompressType::BestCompression.as_raw(), 9);
/// assert_eq!(CompressType::try_from(10).unwrap(), CompressType::Snappy);
/// assert!(CompressType::try_from(42).is_err());
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CompressType {
    /// Deflate framing at level 0 (stored blocks)
    #[default]
    None,
    /// Deflate at the default level
    Zip,
    /// Deflate favouring speed
    BestSpeed,
    /// Deflate favouring ratio
    BestCompression,
    /// Deflate with Huffman-only intent
    Huffman,
    /// Snappy framing format
    Snappy,
}

impl CompressType {
    /// Returns the raw numeric value of this compression type.
    pub fn as_raw(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Zip => -1,
            Self::BestSpeed => 1,
            Self::BestCompression => 9,
            Self::Huffman => -2,
            Self::Snappy => 10,
        }
    }

    /// Returns `true` for the types that produce raw DEFLATE.
    pub fn is_deflate(self) -> bool {
        !matches!(self, Self::Snappy)
    }

    /// Returns the DEFLATE encoder level, or `None` for Snappy.
    ///
    /// `Huffman` maps to the fastest level. The level API cannot select the
    /// Huffman-only strategy, but the output remains plain DEFLATE and is
    /// read back by any deflate peer.
    pub fn deflate_level(self) -> Option<Level> {
        match self {
            Self::None => Some(Level::Precise(0)),
            Self::Zip => Some(Level::Precise(6)),
            Self::BestSpeed => Some(Level::Precise(1)),
            Self::BestCompression => Some(Level::Precise(9)),
            Self::Huffman => Some(Level::Precise(1)),
            Self::Snappy => None,
        }
    }

    /// Returns the name of this compression type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Zip => "zip",
            Self::BestSpeed => "best_speed",
            Self::BestCompression => "best_compression",
            Self::Huffman => "huffman",
            Self::Snappy => "snappy",
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Zip,
            2 => Self::BestSpeed,
            3 => Self::BestCompression,
            4 => Self::Huffman,
            5 => Self::Snappy,
            _ => Self::None,
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Zip => 1,
            Self::BestSpeed => 2,
            Self::BestCompression => 3,
            Self::Huffman => 4,
            Self::Snappy => 5,
        }
    }
}

impl TryFrom<i32> for CompressType {
    type Error = TransportError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::None),
            -1 => Ok(Self::Zip),
            1 => Ok(Self::BestSpeed),
            9 => Ok(Self::BestCompression),
            -2 => Ok(Self::Huffman),
            10 => Ok(Self::Snappy),
            other => Err(TransportError::invalid_configuration(format!(
                "unknown compression type {}",
                other
            ))),
        }
    }
}

impl fmt::Display for CompressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
