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

//! Identity and bookkeeping shared by every connection variant.

use super::deadline::DeadlineTimer;
use super::types::{ConnectionId, ConnectionKind, ConnectionStats};
use crate::codec::CompressType;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static LAUNCH: OnceLock<Instant> = OnceLock::new();

/// Reference point for activity timestamps.
fn launch() -> Instant {
    *LAUNCH.get_or_init(Instant::now)
}

/// State block embedded in every connection.
///
/// All accessors take `&self` and are safe to call concurrently. Counters
/// and the activity timestamp are lock-free atomics; counters wrap at
/// `u32::MAX`.
///
/// # Deadlines
///
/// Read and write deadlines are magnitudes, not absolute times. Setting one
/// direction while the other is unset initializes both, so a connection is
/// never guarded in one direction only. A zero magnitude is rejected with a
/// panic before any state changes.
#[derive(Debug)]
pub struct ConnectionState {
    id: ConnectionId,
    kind: ConnectionKind,
    compress_type: AtomicU8,
    read_bytes: AtomicU32,
    write_bytes: AtomicU32,
    read_packages: AtomicU32,
    write_packages: AtomicU32,
    /// Nanoseconds since [`launch`] of the last observed activity
    active: AtomicU64,
    read_deadline: DeadlineTimer,
    write_deadline: DeadlineTimer,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
    created_at: Instant,
}

impl ConnectionState {
    /// Creates the state block for a new connection, allocating its ID.
    ///
    /// The activity timestamp starts at the construction time.
    pub fn new(
        kind: ConnectionKind,
        local_addr: Option<SocketAddr>,
        peer_addr: Option<SocketAddr>,
    ) -> Self {
        let state = Self {
            id: ConnectionId::next(),
            kind,
            compress_type: AtomicU8::new(CompressType::None.as_u8()),
            read_bytes: AtomicU32::new(0),
            write_bytes: AtomicU32::new(0),
            read_packages: AtomicU32::new(0),
            write_packages: AtomicU32::new(0),
            active: AtomicU64::new(0),
            read_deadline: DeadlineTimer::new(),
            write_deadline: DeadlineTimer::new(),
            local_addr,
            peer_addr,
            created_at: Instant::now(),
        };
        state.update_active();
        state
    }

    /// Returns the connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the transport kind.
    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// Returns the local address, if the transport reported one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Returns the peer address, if known.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Returns when the connection was constructed.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Returns the recorded compression type.
    pub fn compress_type(&self) -> CompressType {
        CompressType::from_u8(self.compress_type.load(Ordering::Acquire))
    }

    pub(crate) fn record_compress_type(&self, compress: CompressType) {
        self.compress_type.store(compress.as_u8(), Ordering::Release);
    }

    /// Records activity at the current time.
    pub fn update_active(&self) {
        let elapsed = Instant::now().saturating_duration_since(launch());
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.active.store(nanos, Ordering::Release);
    }

    /// Returns the time of the last recorded activity.
    pub fn get_active(&self) -> Instant {
        launch() + Duration::from_nanos(self.active.load(Ordering::Acquire))
    }

    /// Returns the read deadline magnitude, or zero when unset.
    pub fn read_deadline(&self) -> Duration {
        self.read_deadline.magnitude()
    }

    /// Returns the write deadline magnitude, or zero when unset.
    pub fn write_deadline(&self) -> Duration {
        self.write_deadline.magnitude()
    }

    /// Sets the read deadline magnitude.
    ///
    /// Also initializes the write deadline if it is unset.
    ///
    /// # Panics
    ///
    /// Panics if `deadline` is zero.
    pub fn set_read_deadline(&self, deadline: Duration) {
        assert!(!deadline.is_zero(), "read deadline must be positive");
        self.read_deadline.set(deadline);
        self.write_deadline.set_if_unset(deadline);
    }

    /// Sets the write deadline magnitude.
    ///
    /// Also initializes the read deadline if it is unset.
    ///
    /// # Panics
    ///
    /// Panics if `deadline` is zero.
    pub fn set_write_deadline(&self, deadline: Duration) {
        assert!(!deadline.is_zero(), "write deadline must be positive");
        self.write_deadline.set(deadline);
        self.read_deadline.set_if_unset(deadline);
    }

    /// Timer guarding the read direction.
    pub fn read_timer(&self) -> &DeadlineTimer {
        &self.read_deadline
    }

    /// Timer guarding the write direction.
    pub fn write_timer(&self) -> &DeadlineTimer {
        &self.write_deadline
    }

    pub(crate) fn add_read_bytes(&self, count: usize) {
        self.read_bytes.fetch_add(counter_delta(count), Ordering::Relaxed);
    }

    pub(crate) fn add_write_bytes(&self, count: usize) {
        self.write_bytes.fetch_add(counter_delta(count), Ordering::Relaxed);
    }

    /// Increments the read package counter.
    pub fn inc_read_pkg_count(&self) {
        self.read_packages.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the write package counter.
    pub fn inc_write_pkg_count(&self) {
        self.write_packages.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a snapshot of the traffic counters.
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            id: self.id,
            read_bytes: self.read_bytes.load(Ordering::Relaxed),
            write_bytes: self.write_bytes.load(Ordering::Relaxed),
            read_packages: self.read_packages.load(Ordering::Relaxed),
            write_packages: self.write_packages.load(Ordering::Relaxed),
        }
    }
}

/// Clamps a byte count to one counter step. The counters themselves wrap.
fn counter_delta(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}
