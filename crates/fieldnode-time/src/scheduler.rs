//! Clock sync scheduler - drives `ClockSync` from a timer task

use std::sync::Arc;

use fieldnode_core::FieldnodeResult;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::{ClockReader, ClockSync, ClockSyncConfig, ClockSyncPolicy, TimeSource};

/// Clock sync scheduler
///
/// `start` triggers an async update on the source right away, then fires
/// `ClockSync::tick` from a spawned task: first after `initial_delay`, then
/// every `reload_interval` (extrapolating policy) or never again (one-shot).
pub struct ClockSyncScheduler {
    config: ClockSyncConfig,
    sync: ClockSync,
    source: Arc<dyn TimeSource>,
}

impl ClockSyncScheduler {
    pub fn new(config: ClockSyncConfig, source: Arc<dyn TimeSource>) -> FieldnodeResult<Self> {
        config.validate()?;
        Ok(ClockSyncScheduler {
            sync: ClockSync::with_config(&config),
            config,
            source,
        })
    }

    pub fn config(&self) -> &ClockSyncConfig {
        &self.config
    }

    /// Read handle, valid before and after `start`
    pub fn reader(&self) -> ClockReader {
        self.sync.reader()
    }

    /// Start the timer task
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> ClockSyncHandle {
        let reader = self.sync.reader();
        let first_fire = Instant::now() + self.config.initial_delay;

        self.source.update();
        tracing::debug!(
            policy = ?self.config.policy,
            initial_delay = ?self.config.initial_delay,
            reload_interval = ?self.config.reload_interval,
            "clock sync armed"
        );

        let task = tokio::spawn(self.run(first_fire));
        ClockSyncHandle { reader, task }
    }

    async fn run(mut self, first_fire: Instant) {
        match self.config.policy {
            ClockSyncPolicy::OneShot => {
                time::sleep_until(first_fire).await;
                self.sync.tick(self.source.as_ref());
            }
            ClockSyncPolicy::Extrapolating => {
                let mut timer = time::interval_at(first_fire, self.config.reload_interval);
                // Each elapsed period counts once toward the extrapolated value
                timer.set_missed_tick_behavior(MissedTickBehavior::Burst);
                loop {
                    timer.tick().await;
                    self.sync.tick(self.source.as_ref());
                }
            }
        }
    }
}

impl std::fmt::Debug for ClockSyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockSyncScheduler")
            .field("config", &self.config)
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}

/// Handle to a running scheduler
#[derive(Debug)]
pub struct ClockSyncHandle {
    reader: ClockReader,
    task: JoinHandle<()>,
}

impl ClockSyncHandle {
    pub fn reader(&self) -> ClockReader {
        self.reader.clone()
    }

    /// Has the timer task stopped (one-shot fired, or stopped)?
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the timer task at process end
    pub fn stop(self) -> ClockReader {
        self.task.abort();
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use fieldnode_core::{ErrorCode, TimestampMillis};

    use crate::sync::tests::ScriptSource;

    const RELOAD: Duration = Duration::from_millis(10_000);

    fn config(policy: ClockSyncPolicy) -> ClockSyncConfig {
        ClockSyncConfig {
            policy,
            initial_delay: Duration::from_secs(10),
            reload_interval: RELOAD,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_fired_on_start() {
        let source = Arc::new(ScriptSource::fails_then(0, 1));
        let scheduler =
            ClockSyncScheduler::new(config(ClockSyncPolicy::Extrapolating), source.clone())
                .unwrap();

        let handle = scheduler.start();
        assert_eq!(source.updates.load(Ordering::SeqCst), 1);
        // Nothing fetched before the initial delay elapses
        time::sleep(Duration::from_secs(9)).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(handle.reader().raw(), TimestampMillis::UNSET);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_extrapolating_timeline() {
        let source = Arc::new(ScriptSource::fails_then(2, 1_700_000_000_000));
        let scheduler =
            ClockSyncScheduler::new(config(ClockSyncPolicy::Extrapolating), source.clone())
                .unwrap();
        let reader = scheduler.reader();
        let handle = scheduler.start();

        let mut seen = Vec::new();
        time::sleep(Duration::from_millis(1)).await;
        for _ in 0..5 {
            time::sleep(RELOAD).await;
            seen.push(reader.raw().as_millis());
        }

        assert_eq!(
            seen,
            vec![
                0,
                0,
                1_700_000_000_000,
                1_700_000_010_000,
                1_700_000_020_000
            ]
        );
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
        assert!(!handle.is_finished());
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_success_never_rearms() {
        let source = Arc::new(ScriptSource::fails_then(0, 42_000));
        let scheduler =
            ClockSyncScheduler::new(config(ClockSyncPolicy::OneShot), source.clone()).unwrap();
        let handle = scheduler.start();

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(handle.reader().now(), Some(TimestampMillis(42_000)));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_failure_is_not_retried() {
        let source = Arc::new(ScriptSource::new(vec![Err(ErrorCode(-60))]));
        let scheduler =
            ClockSyncScheduler::new(config(ClockSyncPolicy::OneShot), source.clone()).unwrap();
        let handle = scheduler.start();

        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(handle.reader().now(), None);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_zero_reload_rejected() {
        let source = Arc::new(ScriptSource::fails_then(0, 1));
        let mut bad = config(ClockSyncPolicy::Extrapolating);
        bad.reload_interval = Duration::ZERO;
        assert!(ClockSyncScheduler::new(bad, source).is_err());
    }
}
