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

//! Amortized read/write deadlines.
//!
//! Every connection keeps one [`DeadlineTimer`] per direction. A timer holds
//! the configured magnitude and the deadline that is currently armed. Before
//! each I/O call the timer is consulted: the armed deadline is moved to
//! `now + magnitude` only once more than a quarter of the magnitude has passed
//! since the last arming. Under high packet rates this cuts the re-arming
//! work by up to 4x, and the effective timeout may be up to 25% shorter than
//! the nominal magnitude (never longer).
//!
//! # Examples
//!
//! ```rust
//! use polyconn::connection::DeadlineTimer;
//! use std::time::Duration;
//! use tokio::time::Instant;
//!
//! let timer = DeadlineTimer::new();
//! timer.set(Duration::from_secs(4));
//!
//! let start = Instant::now();
//! let first = timer.arm(start).unwrap();
//!
//! // Within a quarter of the magnitude the armed deadline is reused.
//! assert_eq!(timer.arm(start + Duration::from_millis(900)), Some(first));
//! assert_eq!(timer.rearm_count(), 1);
//! ```

use crate::TransportError;
use parking_lot::Mutex;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-direction deadline with amortized re-arming.
#[derive(Debug, Default)]
pub struct DeadlineTimer {
    /// Configured magnitude in nanoseconds; zero means unset
    magnitude: AtomicU64,
    /// Last arming, if any
    armed: Mutex<Option<Armed>>,
    /// Number of times the deadline was actually re-armed
    rearms: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    at: Instant,
    expires: Instant,
}

impl DeadlineTimer {
    /// Creates an unset timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the configured magnitude, or [`Duration::ZERO`] when unset.
    pub fn magnitude(&self) -> Duration {
        Duration::from_nanos(self.magnitude.load(Ordering::Acquire))
    }

    /// Returns `true` once a magnitude has been configured.
    pub fn is_set(&self) -> bool {
        self.magnitude.load(Ordering::Acquire) != 0
    }

    /// Sets the magnitude. A zero magnitude disables the deadline.
    pub fn set(&self, magnitude: Duration) {
        self.magnitude.store(as_nanos(magnitude), Ordering::Release);
    }

    /// Sets the magnitude only if none is configured yet.
    ///
    /// Returns `true` if the magnitude was installed.
    pub fn set_if_unset(&self, magnitude: Duration) -> bool {
        self.magnitude
            .compare_exchange(0, as_nanos(magnitude), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns the deadline to enforce for an operation starting at `now`.
    ///
    /// Returns `None` when no magnitude is configured. The armed deadline is
    /// only moved when more than a quarter of the magnitude has elapsed since
    /// it was last armed.
    pub fn arm(&self, now: Instant) -> Option<Instant> {
        let magnitude = self.magnitude();
        if magnitude.is_zero() {
            return None;
        }

        let mut armed = self.armed.lock();
        if let Some(current) = *armed {
            if now.saturating_duration_since(current.at) <= magnitude / 4 {
                return Some(current.expires);
            }
        }

        let expires = now + magnitude;
        *armed = Some(Armed { at: now, expires });
        self.rearms.fetch_add(1, Ordering::Relaxed);
        Some(expires)
    }

    /// Returns how many times the deadline has been re-armed.
    pub fn rearm_count(&self) -> u64 {
        self.rearms.load(Ordering::Relaxed)
    }

    /// Runs `operation` under this deadline.
    ///
    /// Resolves with [`TransportError::Timeout`] when the armed deadline
    /// elapses first and with [`TransportError::Closed`] when `shutdown` is
    /// cancelled first.
    pub(crate) async fn guard<F, T>(
        &self,
        shutdown: &CancellationToken,
        operation: F,
    ) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        if shutdown.is_cancelled() {
            return Err(TransportError::Closed);
        }

        let expires = self.arm(Instant::now());
        let duration = self.magnitude();

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => Err(TransportError::Closed),
            result = until(expires, duration, operation) => result,
        }
    }

    /// Runs a teardown step bounded by the configured magnitude.
    ///
    /// Unlike [`guard`](Self::guard) this ignores the shutdown token, so it
    /// can drain a codec after the connection has started closing.
    pub(crate) async fn bounded<F, T>(&self, operation: F) -> io::Result<T>
    where
        F: Future<Output = io::Result<T>>,
    {
        let magnitude = self.magnitude();
        if magnitude.is_zero() {
            return operation.await;
        }
        match tokio::time::timeout(magnitude, operation).await {
            Ok(result) => result,
            Err(_) => Err(io::ErrorKind::TimedOut.into()),
        }
    }
}

async fn until<F, T>(
    expires: Option<Instant>,
    duration: Duration,
    operation: F,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match expires {
        Some(at) => match tokio::time::timeout_at(at, operation).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout { duration }),
        },
        None => operation.await,
    }
}

fn as_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
