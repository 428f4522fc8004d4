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

#![doc = include_str!("../../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! ## Architecture
//!
//! - **[`connection`]**: the [`Connection`] trait, the shared state block and
//!   the TCP, WebSocket and UDP variants
//! - **[`codec`]**: compression types and the stream/message codecs
//! - **[`config`]**: typed configuration applied to sockets and connections
//! - **[`error`]**: [`TransportError`] and its classification helpers
//!
//! ## Feature Flags
//!
//! - `observability` (default): `tracing` spans and events
//! - `serde` (default): `Serialize`/`Deserialize` for configuration types
//! - `tls`: WebSocket connections over `tokio-rustls` streams

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;

pub use codec::{CompressType, MessageCompression};
pub use config::{ConnectionConfig, SocketOptions};
pub use connection::{
    Connection, ConnectionId, ConnectionKind, ConnectionState, ConnectionStats,
    DatagramConnection, DeadlineTimer, MessageConnection, MessageTransport, StreamConnection,
    UdpContext,
};
pub use error::TransportError;
