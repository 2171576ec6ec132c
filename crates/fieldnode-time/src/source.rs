//! Time source collaborator

use std::sync::Arc;

use fieldnode_core::{ErrorCode, TimestampMillis};

/// Network time source (NTP, cellular network time, ...)
pub trait TimeSource: Send + Sync {
    /// Ask the source to refresh in the background
    /// Fire-and-forget: returns immediately, the result is not reported.
    fn update(&self);

    /// Fetch the current Unix time
    /// Bounded: must not wait on the network.
    fn now(&self) -> Result<TimestampMillis, ErrorCode>;
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn update(&self) {
        (**self).update()
    }

    fn now(&self) -> Result<TimestampMillis, ErrorCode> {
        (**self).now()
    }
}
