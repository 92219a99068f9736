// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Time utilities for the mesh control plane
//!
//! The control plane has no clock of its own. Every event (API call, timer
//! evaluation, received frame) is stamped by the caller with a monotonic
//! millisecond [`Instant`]. Protocol timers are expressed as [`Millis`]
//! durations; key rotation policy is expressed in hours.

use core::ops::{Add, Sub};

/// Milliseconds per second
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Milliseconds per hour
pub const MILLIS_PER_HOUR: u64 = 3_600 * MILLIS_PER_SEC;

/// Monotonic point in time, in milliseconds since an arbitrary epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Instant(u64);

impl Instant {
    /// The epoch
    pub const ZERO: Self = Self(0);

    /// Create from a raw millisecond count
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Create from seconds
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(MILLIS_PER_SEC))
    }

    /// Raw millisecond count
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed since this instant (0 if `now` is earlier)
    #[must_use]
    pub const fn elapsed(&self, now: Self) -> Millis {
        Millis(now.0.saturating_sub(self.0))
    }

    /// Check if `duration` has passed since this instant
    #[must_use]
    pub const fn has_elapsed(&self, now: Self, duration: Millis) -> bool {
        self.elapsed(now).0 >= duration.0
    }
}

impl From<u64> for Instant {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Add<Millis> for Instant {
    type Output = Self;

    fn add(self, rhs: Millis) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub<Instant> for Instant {
    type Output = Millis;

    fn sub(self, rhs: Instant) -> Self::Output {
        Millis(self.0.saturating_sub(rhs.0))
    }
}

/// Duration in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Millis(u64);

impl Millis {
    /// Zero duration
    pub const ZERO: Self = Self(0);

    /// Create from milliseconds
    #[must_use]
    pub const fn new(ms: u64) -> Self {
        Self(ms)
    }

    /// Create from seconds
    #[must_use]
    pub const fn from_secs(secs: u32) -> Self {
        Self((secs as u64).saturating_mul(MILLIS_PER_SEC))
    }

    /// Create from hours
    #[must_use]
    pub const fn from_hours(hours: u32) -> Self {
        Self((hours as u64).saturating_mul(MILLIS_PER_HOUR))
    }

    /// Get as milliseconds
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Get as whole seconds (truncated)
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.0 / MILLIS_PER_SEC
    }

    /// Get as whole hours (truncated)
    #[must_use]
    pub const fn as_hours(&self) -> u64 {
        self.0 / MILLIS_PER_HOUR
    }

    /// Half of this duration, rounded down
    #[must_use]
    pub const fn half(&self) -> Self {
        Self(self.0 / 2)
    }

    /// Double this duration, saturating at `cap`
    #[must_use]
    pub const fn doubled_up_to(&self, cap: Self) -> Self {
        let d = self.0.saturating_mul(2);
        if d > cap.0 {
            cap
        } else {
            Self(d)
        }
    }
}

impl Add for Millis {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Millis {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

/// One-shot deadline tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    start: Instant,
    timeout: Millis,
}

impl Deadline {
    /// Create a deadline `timeout` after `start`
    #[must_use]
    pub const fn new(start: Instant, timeout: Millis) -> Self {
        Self { start, timeout }
    }

    /// Instant at which the deadline fires
    #[must_use]
    pub fn at(&self) -> Instant {
        self.start + self.timeout
    }

    /// Check if the deadline has expired
    #[must_use]
    pub const fn is_expired(&self, now: Instant) -> bool {
        self.start.has_elapsed(now, self.timeout)
    }

    /// Remaining time until the deadline (0 if expired)
    #[must_use]
    pub const fn remaining(&self, now: Instant) -> Millis {
        let elapsed = self.start.elapsed(now).0;
        if elapsed >= self.timeout.0 {
            Millis::ZERO
        } else {
            Millis(self.timeout.0 - elapsed)
        }
    }
}
