//! Session supervisor - the broker session run loop

use async_trait::async_trait;
use fieldnode_core::{ErrorCode, FieldnodeError, FieldnodeResult, IterationOutcome};

/// Broker session collaborator (MQTT client or similar)
#[async_trait]
pub trait BrokerSession: Send {
    /// Establish the session
    async fn init(&mut self) -> Result<(), ErrorCode>;

    /// Advance the session by one iteration
    /// Waits a bounded time for broker traffic, then reports whether to go on.
    async fn run_iteration(&mut self) -> IterationOutcome;

    /// Tear the session down
    async fn disconnect(&mut self);
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub iterations: u64,
    pub last_outcome: Option<IterationOutcome>,
    pub initialised: bool,
}

/// Why the run loop ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopSummary {
    /// Iterations run, including the one that stopped the loop
    pub iterations: u64,
    /// First non-continue outcome
    pub stopped_by: IterationOutcome,
}

/// Session supervisor
///
/// Runs iterations until the first non-zero outcome. All stop outcomes are
/// equivalent: no retry, no backoff, no classification. `cleanup` consumes
/// the supervisor, so the session is disconnected at most once.
pub struct SessionSupervisor {
    session: Box<dyn BrokerSession>,
    stats: SessionStats,
}

impl SessionSupervisor {
    pub fn new<S>(session: S) -> Self
    where
        S: BrokerSession + 'static,
    {
        SessionSupervisor {
            session: Box::new(session),
            stats: SessionStats::default(),
        }
    }

    /// Establish the broker session
    pub async fn init(&mut self) -> FieldnodeResult<()> {
        self.session.init().await.map_err(|code| {
            tracing::error!(code = %code, "broker session init failed");
            FieldnodeError::SessionInit(code)
        })?;
        self.stats.initialised = true;
        tracing::info!("broker session initialised");
        Ok(())
    }

    /// Drive iterations until one returns a non-zero outcome
    pub async fn run_loop(&mut self) -> LoopSummary {
        let start = self.stats.iterations;
        loop {
            let outcome = self.session.run_iteration().await;
            self.stats.iterations += 1;
            self.stats.last_outcome = Some(outcome);

            if !outcome.is_continue() {
                let summary = LoopSummary {
                    iterations: self.stats.iterations - start,
                    stopped_by: outcome,
                };
                tracing::info!(
                    iterations = summary.iterations,
                    outcome = outcome.code(),
                    "broker session loop stopped"
                );
                return summary;
            }
        }
    }

    /// Disconnect the session
    /// Runs regardless of how many iterations ran or why the loop stopped.
    pub async fn cleanup(mut self) -> SessionStats {
        self.session.disconnect().await;
        tracing::info!(iterations = self.stats.iterations, "broker session disconnected");
        self.stats
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}

impl std::fmt::Debug for SessionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSupervisor")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
