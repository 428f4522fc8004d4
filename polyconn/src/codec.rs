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

//! Compression codecs.
//!
//! Stream connections swap their reader and writer for a compressing pair
//! ([`StreamReader`], [`StreamWriter`]); message connections compress each
//! message on its own ([`MessageCompression`]). Datagram connections only
//! record the selected [`CompressType`].

mod message;
mod snappy;
mod stream;
mod types;

pub use message::MessageCompression;
pub use snappy::{SnappyFrameReader, SnappyFrameWriter};
pub use stream::{StreamReader, StreamWriter};
pub use types::CompressType;
