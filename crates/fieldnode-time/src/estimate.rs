//! Shared time estimate
//!
//! One writer (the clock sync) and any number of readers. Readers only ever
//! see a snapshot; there is no way to write through a reader.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fieldnode_core::TimestampMillis;

/// Writer side of the time estimate
/// Deliberately not `Clone`: exactly one owner may write.
#[derive(Debug, Default)]
pub struct TimeEstimate {
    value: Arc<AtomicU64>,
}

impl TimeEstimate {
    /// Create an estimate holding the unset sentinel
    pub fn new() -> Self {
        TimeEstimate {
            value: Arc::new(AtomicU64::new(TimestampMillis::UNSET.as_millis())),
        }
    }

    /// Current value, `UNSET` if never acquired
    #[inline]
    pub fn load(&self) -> TimestampMillis {
        TimestampMillis(self.value.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn store(&self, value: TimestampMillis) {
        self.value.store(value.as_millis(), Ordering::Release);
    }

    /// Create a read-only handle
    pub fn reader(&self) -> ClockReader {
        ClockReader {
            value: Arc::clone(&self.value),
        }
    }
}

/// Read-only snapshot handle to the time estimate
#[derive(Clone, Debug)]
pub struct ClockReader {
    value: Arc<AtomicU64>,
}

impl ClockReader {
    /// Raw value, including the unset sentinel
    #[inline]
    pub fn raw(&self) -> TimestampMillis {
        TimestampMillis(self.value.load(Ordering::Acquire))
    }

    /// Current estimate, if one has been acquired
    pub fn now(&self) -> Option<TimestampMillis> {
        let t = self.raw();
        t.is_set().then_some(t)
    }

    pub fn is_synced(&self) -> bool {
        self.raw().is_set()
    }
}
