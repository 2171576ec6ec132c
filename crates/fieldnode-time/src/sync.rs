//! Clock sync - the per-tick acquisition and extrapolation policy

use std::str::FromStr;
use std::time::Duration;

use fieldnode_core::{ErrorCode, FieldnodeError, FieldnodeResult, TimestampMillis};
use serde::{Deserialize, Serialize};

use crate::{ClockReader, TimeEstimate, TimeSource};

/// How the scheduler re-arms after its first firing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockSyncPolicy {
    /// Fire every reload interval: fetch while unset, extrapolate afterwards
    Extrapolating,
    /// Fire once after the initial delay and never again
    OneShot,
}

impl FromStr for ClockSyncPolicy {
    type Err = FieldnodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "extrapolating" | "periodic" => Ok(ClockSyncPolicy::Extrapolating),
            "one-shot" | "oneshot" | "once" => Ok(ClockSyncPolicy::OneShot),
            other => Err(FieldnodeError::InvalidConfig(format!(
                "unknown clock sync policy '{}'",
                other
            ))),
        }
    }
}

/// Clock sync configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSyncConfig {
    pub policy: ClockSyncPolicy,
    /// Delay before the first firing, gives the async update time to land
    pub initial_delay: Duration,
    /// Period between firings, also the extrapolation step
    pub reload_interval: Duration,
}

impl Default for ClockSyncConfig {
    fn default() -> Self {
        Self::extrapolating()
    }
}

impl ClockSyncConfig {
    /// Periodic sync, first firing after 10s, then every 10s
    pub fn extrapolating() -> Self {
        ClockSyncConfig {
            policy: ClockSyncPolicy::Extrapolating,
            initial_delay: Duration::from_secs(10),
            reload_interval: Duration::from_millis(10_000),
        }
    }

    /// Single fetch 10s after start
    pub fn one_shot() -> Self {
        ClockSyncConfig {
            policy: ClockSyncPolicy::OneShot,
            ..Self::extrapolating()
        }
    }

    /// Check the config against the extrapolating policy
    ///
    /// The estimate is kept in whole milliseconds, so the reload interval must
    /// be at least 1 ms with no sub-millisecond part for each tick to add it
    /// exactly.
    pub fn validate(&self) -> FieldnodeResult<()> {
        if self.policy != ClockSyncPolicy::Extrapolating {
            return Ok(());
        }
        if self.reload_interval < Duration::from_millis(1) {
            return Err(FieldnodeError::InvalidConfig(format!(
                "reload interval must be at least 1ms for the extrapolating policy, got {:?}",
                self.reload_interval
            )));
        }
        if self.reload_interval.subsec_nanos() % 1_000_000 != 0 {
            return Err(FieldnodeError::InvalidConfig(format!(
                "reload interval must be a whole number of milliseconds, got {:?}",
                self.reload_interval
            )));
        }
        Ok(())
    }
}

/// What a single firing did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// First successful fetch
    Acquired(TimestampMillis),
    /// Cached value advanced by the reload interval
    Extrapolated(TimestampMillis),
    /// Fetch failed, estimate still unset
    FetchFailed(ErrorCode),
    /// Source answered but has no time yet
    NotAvailable,
}

/// Clock sync state machine
///
/// Owns the writer side of the estimate. Each `tick` either fetches (while
/// the estimate is unset) or extrapolates by exactly one reload interval.
/// Once acquired the source is never queried again.
#[derive(Debug)]
pub struct ClockSync {
    estimate: TimeEstimate,
    reload_interval: Duration,
    ticks: u64,
}

impl ClockSync {
    pub fn new(reload_interval: Duration) -> Self {
        ClockSync {
            estimate: TimeEstimate::new(),
            reload_interval,
            ticks: 0,
        }
    }

    pub fn with_config(config: &ClockSyncConfig) -> Self {
        Self::new(config.reload_interval)
    }

    /// Run one firing against the time source
    pub fn tick(&mut self, source: &dyn TimeSource) -> TickOutcome {
        self.ticks += 1;
        let cached = self.estimate.load();

        let outcome = if cached.is_set() {
            let next = cached + self.reload_interval;
            self.estimate.store(next);
            TickOutcome::Extrapolated(next)
        } else {
            tracing::info!("Attempting to acquire time and date from time source...");
            match source.now() {
                Ok(t) if t.is_set() => {
                    self.estimate.store(t);
                    TickOutcome::Acquired(t)
                }
                Ok(_) => TickOutcome::NotAvailable,
                Err(code) => TickOutcome::FetchFailed(code),
            }
        };

        match outcome {
            TickOutcome::Acquired(t) | TickOutcome::Extrapolated(t) => {
                tracing::info!(unix_time_ms = t.as_millis(), "Time update: unix time ms {}", t);
            }
            TickOutcome::FetchFailed(code) => {
                tracing::warn!(code = code.code(), "Error getting date_time ({})", code);
            }
            TickOutcome::NotAvailable => {
                tracing::warn!("Time source has no time yet");
            }
        }
        outcome
    }

    /// Current estimate
    pub fn estimate(&self) -> TimestampMillis {
        self.estimate.load()
    }

    pub fn reader(&self) -> ClockReader {
        self.estimate.reader()
    }

    /// Number of firings so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
