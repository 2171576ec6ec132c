//! Wall-clock primitives
//!
//! The device keeps a single best-effort estimate of Unix time in
//! milliseconds. A value of zero is reserved as the "never acquired" sentinel.

use std::ops::Add;
use std::time::Duration;

/// Unix time in milliseconds
/// INVARIANT: `UNSET` (0) means no estimate has been acquired yet
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimestampMillis(pub u64);

impl TimestampMillis {
    pub const UNSET: TimestampMillis = TimestampMillis(0);

    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        TimestampMillis(millis)
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Has a real timestamp been acquired?
    #[inline]
    pub fn is_set(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        TimestampMillis(self.0.saturating_add(millis))
    }
}

impl Add<Duration> for TimestampMillis {
    type Output = TimestampMillis;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl std::fmt::Debug for TimestampMillis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_set() {
            write!(f, "unix({}ms)", self.0)
        } else {
            write!(f, "unix(unset)")
        }
    }
}

impl std::fmt::Display for TimestampMillis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
