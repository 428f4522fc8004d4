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

//! Connections over TCP, WebSocket and UDP.
//!
//! Every connection variant embeds a [`ConnectionState`] and implements the
//! [`Connection`] trait. The variants differ in how they read:
//!
//! | Variant                 | Transport  | `read` returns                |
//! |-------------------------|------------|-------------------------------|
//! | [`StreamConnection`]    | TCP        | bytes copied into a buffer    |
//! | [`MessageConnection`]   | WebSocket  | one whole message             |
//! | [`DatagramConnection`]  | UDP        | one datagram and its source   |
//!
//! All three enforce read and write deadlines through a [`DeadlineTimer`]
//! per direction.

mod deadline;
mod state;
mod tcp;
mod traits;
mod types;
mod udp;
mod websocket;

pub use deadline::DeadlineTimer;
pub use state::ConnectionState;
pub use tcp::StreamConnection;
pub use traits::Connection;
pub use types::{ConnectionId, ConnectionKind, ConnectionStats};
pub use udp::{DatagramConnection, UdpContext};
pub use websocket::{MessageConnection, MessageTransport};
