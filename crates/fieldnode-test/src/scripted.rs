//! Scripted collaborators
//!
//! Each collaborator replays a fixed script and records every call so tests
//! can assert on exact call sequences after the collaborator has been moved
//! into a `Device`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fieldnode_core::{ErrorCode, IterationOutcome, TimestampMillis};
use fieldnode_link::LinkController;
use fieldnode_runtime::BrokerSession;
use fieldnode_time::TimeSource;
use parking_lot::Mutex;

// ============================================================================
// LINK
// ============================================================================

/// Modem link control with a fixed connect result
#[derive(Clone, Debug)]
pub struct ScriptedLink {
    result: Result<(), ErrorCode>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedLink {
    pub fn connects() -> Self {
        Self::with_result(Ok(()))
    }

    pub fn fails(code: i32) -> Self {
        Self::with_result(Err(ErrorCode(code)))
    }

    fn with_result(result: Result<(), ErrorCode>) -> Self {
        ScriptedLink {
            result,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of connect attempts across all clones
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LinkController for ScriptedLink {
    fn init_and_connect(&mut self) -> Result<(), ErrorCode> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
    }
}

// ============================================================================
// TIME SOURCE
// ============================================================================

/// Time source replaying a script of fetch results
/// The last entry repeats once the script is exhausted.
#[derive(Debug)]
pub struct ScriptedTimeSource {
    script: Mutex<VecDeque<Result<TimestampMillis, ErrorCode>>>,
    fetches: AtomicUsize,
    updates: AtomicUsize,
}

impl ScriptedTimeSource {
    pub fn new(script: Vec<Result<TimestampMillis, ErrorCode>>) -> Self {
        ScriptedTimeSource {
            script: Mutex::new(script.into()),
            fetches: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
        }
    }

    /// `failures` failed fetches, then `value` forever
    pub fn fails_then(failures: usize, value: u64) -> Self {
        let mut script = vec![Err(ErrorCode(-61)); failures];
        script.push(Ok(TimestampMillis(value)));
        Self::new(script)
    }

    /// Never produces a time
    pub fn unavailable() -> Self {
        Self::new(vec![Err(ErrorCode(-61))])
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

impl TimeSource for ScriptedTimeSource {
    fn update(&self) {
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn now(&self) -> Result<TimestampMillis, ErrorCode> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock();
        match script.len() {
            0 => Err(ErrorCode(-61)),
            1 => script[0],
            _ => script.pop_front().unwrap_or(Err(ErrorCode(-61))),
        }
    }
}

// ============================================================================
// BROKER SESSION
// ============================================================================

/// A call made on a scripted session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionCall {
    Init,
    Iteration(IterationOutcome),
    Disconnect,
}

/// Shared view of a scripted session's call log
#[derive(Clone, Debug, Default)]
pub struct SessionProbe {
    calls: Arc<Mutex<Vec<SessionCall>>>,
}

impl SessionProbe {
    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().clone()
    }

    pub fn iterations(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, SessionCall::Iteration(_)))
            .count()
    }

    pub fn disconnects(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, SessionCall::Disconnect))
            .count()
    }

    fn record(&self, call: SessionCall) {
        self.calls.lock().push(call);
    }
}

/// Broker session replaying a script of iteration outcomes
/// Once the script runs out every iteration returns `-1` (stop).
#[derive(Debug)]
pub struct ScriptedSession {
    outcomes: VecDeque<IterationOutcome>,
    init_result: Result<(), ErrorCode>,
    iteration_time: Duration,
    probe: SessionProbe,
}

impl ScriptedSession {
    pub fn new(outcomes: &[i32]) -> Self {
        ScriptedSession {
            outcomes: outcomes.iter().copied().map(IterationOutcome::from).collect(),
            init_result: Ok(()),
            iteration_time: Duration::ZERO,
            probe: SessionProbe::default(),
        }
    }

    /// Make `init` fail with the given code
    pub fn failing_init(mut self, code: i32) -> Self {
        self.init_result = Err(ErrorCode(code));
        self
    }

    /// Make each iteration take this long (tokio time)
    pub fn with_iteration_time(mut self, iteration_time: Duration) -> Self {
        self.iteration_time = iteration_time;
        self
    }

    pub fn probe(&self) -> SessionProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl BrokerSession for ScriptedSession {
    async fn init(&mut self) -> Result<(), ErrorCode> {
        self.probe.record(SessionCall::Init);
        self.init_result
    }

    async fn run_iteration(&mut self) -> IterationOutcome {
        if !self.iteration_time.is_zero() {
            tokio::time::sleep(self.iteration_time).await;
        }
        let outcome = self.outcomes.pop_front().unwrap_or(IterationOutcome(-1));
        self.probe.record(SessionCall::Iteration(outcome));
        outcome
    }

    async fn disconnect(&mut self) {
        self.probe.record(SessionCall::Disconnect);
    }
}
