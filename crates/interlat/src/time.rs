// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Monotonic time abstraction for deterministic testing.
//!
//! Every timestamp in the crate is a `Duration` measured from an arbitrary,
//! fixed origin (an "uptime"). `FakeClock` lets tests move that uptime forward
//! without wall-clock delays.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Clock trait for time abstraction
pub trait Clock: Send + Sync {
    /// Current monotonic uptime
    fn now(&self) -> Duration;

    /// Current uptime in whole milliseconds
    fn now_millis(&self) -> u64 {
        saturating_millis(self.now())
    }
}

pub(crate) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn saturating_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Real monotonic clock anchored at the first use in this process
#[derive(Clone, Debug, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock
    pub fn new() -> Self {
        Self
    }

    fn origin() -> Instant {
        static ORIGIN: OnceLock<Instant> = OnceLock::new();
        *ORIGIN.get_or_init(Instant::now)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        Self::origin().elapsed()
    }
}

/// Fake clock for testing with controllable time
///
/// Clones share the same underlying time, so a clone handed to a client can
/// be advanced from the test.
#[derive(Clone, Debug)]
pub struct FakeClock {
    current_nanos: Arc<AtomicU64>,
}

impl FakeClock {
    /// Create a new fake clock starting at a given uptime
    pub fn new(start: Duration) -> Self {
        Self {
            current_nanos: Arc::new(AtomicU64::new(saturating_nanos(start))),
        }
    }

    /// Create a fake clock starting at a given uptime in milliseconds
    pub fn at_millis(start_millis: u64) -> Self {
        Self::new(Duration::from_millis(start_millis))
    }

    /// Create a fake clock starting at zero
    pub fn at_zero() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Advance time by a duration
    pub fn advance(&self, duration: Duration) {
        self.current_nanos
            .fetch_add(saturating_nanos(duration), Ordering::SeqCst);
    }

    /// Advance time by milliseconds
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Set absolute uptime. Moving backwards is ignored; the clock is monotonic.
    pub fn set(&self, uptime: Duration) {
        self.current_nanos
            .fetch_max(saturating_nanos(uptime), Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::at_zero()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.current_nanos.load(Ordering::SeqCst))
    }
}

/// Clock handle that can be either real or fake
#[derive(Clone, Debug)]
pub enum ClockHandle {
    System(SystemClock),
    Fake(FakeClock),
}

impl ClockHandle {
    /// Create a system clock handle
    pub fn system() -> Self {
        Self::System(SystemClock)
    }

    /// Create a fake clock handle at zero
    pub fn fake() -> Self {
        Self::Fake(FakeClock::at_zero())
    }

    /// Create a fake clock handle at a specific uptime in milliseconds
    pub fn fake_at(millis: u64) -> Self {
        Self::Fake(FakeClock::at_millis(millis))
    }

    /// Get as fake clock for manipulation (returns None for system clock)
    pub fn as_fake(&self) -> Option<&FakeClock> {
        match self {
            Self::Fake(f) => Some(f),
            Self::System(_) => None,
        }
    }

    /// Check if this is a fake clock
    pub fn is_fake(&self) -> bool {
        matches!(self, Self::Fake(_))
    }
}

impl Clock for ClockHandle {
    fn now(&self) -> Duration {
        match self {
            Self::System(c) => c.now(),
            Self::Fake(c) => c.now(),
        }
    }
}

impl From<FakeClock> for ClockHandle {
    fn from(clock: FakeClock) -> Self {
        Self::Fake(clock)
    }
}

impl Default for ClockHandle {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
#[path = "time_tests.rs"]
mod tests;
