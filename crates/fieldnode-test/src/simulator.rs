//! Simulated collaborators
//!
//! Seeded, randomised stand-ins for the modem, carrier service, network time
//! source and broker. Same seed, same run.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use fieldnode_core::{CarrierEvent, ErrorCode, IterationOutcome, TimestampMillis};
use fieldnode_link::{recoverable_error, CarrierEventHandler, LinkController};
use fieldnode_runtime::BrokerSession;
use fieldnode_time::TimeSource;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// errno values reported by the simulated collaborators
pub const ENODATA: i32 = -61;
pub const ETIMEDOUT: i32 = -110;
pub const ENOTCONN: i32 = -128;

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

// ============================================================================
// MODEM
// ============================================================================

/// Simulated modem attach
#[derive(Debug)]
pub struct SimulatedModem {
    rng: StdRng,
    /// Probability that the attach fails
    pub failure_rate: f64,
    /// Probability that the modem library reports a recoverable error first
    pub recoverable_rate: f64,
}

impl SimulatedModem {
    pub fn new(failure_rate: f64, seed: u64) -> Self {
        SimulatedModem {
            rng: StdRng::seed_from_u64(seed),
            failure_rate: failure_rate.clamp(0.0, 1.0),
            recoverable_rate: 0.0,
        }
    }

    pub fn with_recoverable_errors(mut self, rate: f64) -> Self {
        self.recoverable_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Modem that always attaches
    pub fn reliable() -> Self {
        Self::new(0.0, 0)
    }
}

impl LinkController for SimulatedModem {
    fn init_and_connect(&mut self) -> Result<(), ErrorCode> {
        if self.rng.gen_bool(self.recoverable_rate) {
            recoverable_error(self.rng.gen_range(1..=64));
        }
        if self.rng.gen_bool(self.failure_rate) {
            tracing::debug!("simulated modem attach failed");
            Err(ErrorCode(ETIMEDOUT))
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// CARRIER SERVICE
// ============================================================================

/// Play a carrier registration sequence into `handler`
///
/// Emits InitDone, Connect and Ready, one per `step`. A FOTA notification is
/// thrown in before Ready when `with_fota` is set; it must not affect
/// bring-up.
pub fn spawn_carrier(
    handler: CarrierEventHandler,
    step: Duration,
    with_fota: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut events = vec![CarrierEvent::InitDone, CarrierEvent::Connect];
        if with_fota {
            events.push(CarrierEvent::FotaStart);
        }
        events.push(CarrierEvent::Ready);

        for event in events {
            tokio::time::sleep(step).await;
            handler.handle(event);
        }
    })
}

// ============================================================================
// TIME SOURCE
// ============================================================================

/// Simulated network time source
///
/// Has no time until `update` was called and `sync_latency` has passed, then
/// answers with the wall clock at creation plus elapsed tokio time. Each
/// fetch can still fail at random.
#[derive(Debug)]
pub struct SimulatedTimeSource {
    base: TimestampMillis,
    created: Instant,
    sync_latency: Duration,
    failure_rate: f64,
    state: Mutex<SourceState>,
}

#[derive(Debug)]
struct SourceState {
    rng: StdRng,
    synced_at: Option<Instant>,
}

impl SimulatedTimeSource {
    pub fn new(sync_latency: Duration, failure_rate: f64, seed: u64) -> Self {
        Self::with_base(TimestampMillis(unix_now_ms()), sync_latency, failure_rate, seed)
    }

    pub fn with_base(
        base: TimestampMillis,
        sync_latency: Duration,
        failure_rate: f64,
        seed: u64,
    ) -> Self {
        SimulatedTimeSource {
            base,
            created: Instant::now(),
            sync_latency,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            state: Mutex::new(SourceState {
                rng: StdRng::seed_from_u64(seed),
                synced_at: None,
            }),
        }
    }
}

impl TimeSource for SimulatedTimeSource {
    fn update(&self) {
        let mut state = self.state.lock();
        if state.synced_at.is_none() {
            state.synced_at = Some(Instant::now() + self.sync_latency);
        }
    }

    fn now(&self) -> Result<TimestampMillis, ErrorCode> {
        let mut state = self.state.lock();
        let now = Instant::now();

        match state.synced_at {
            Some(ready) if now >= ready => {}
            _ => return Err(ErrorCode(ENODATA)),
        }
        if state.rng.gen_bool(self.failure_rate) {
            return Err(ErrorCode(ETIMEDOUT));
        }
        Ok(self.base + now.duration_since(self.created))
    }
}

// ============================================================================
// BROKER
// ============================================================================

/// Simulated broker session
///
/// Each iteration waits `poll_time` for traffic, then continues unless the
/// connection drops (random) or `max_iterations` is reached.
#[derive(Debug)]
pub struct SimulatedBroker {
    rng: StdRng,
    poll_time: Duration,
    drop_rate: f64,
    max_iterations: Option<u64>,
    iterations: u64,
    connected: bool,
}

impl SimulatedBroker {
    pub fn new(poll_time: Duration, drop_rate: f64, seed: u64) -> Self {
        SimulatedBroker {
            rng: StdRng::seed_from_u64(seed),
            poll_time,
            drop_rate: drop_rate.clamp(0.0, 1.0),
            max_iterations: None,
            iterations: 0,
            connected: false,
        }
    }

    /// Stop with `ENOTCONN` after this many iterations
    pub fn with_max_iterations(mut self, max: u64) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

#[async_trait]
impl BrokerSession for SimulatedBroker {
    async fn init(&mut self) -> Result<(), ErrorCode> {
        self.connected = true;
        tracing::debug!("simulated broker connected");
        Ok(())
    }

    async fn run_iteration(&mut self) -> IterationOutcome {
        tokio::time::sleep(self.poll_time).await;
        self.iterations += 1;

        if self.max_iterations.is_some_and(|max| self.iterations >= max) {
            return IterationOutcome(ENOTCONN);
        }
        if self.rng.gen_bool(self.drop_rate) {
            tracing::debug!(
                iteration = self.iterations,
                "simulated broker dropped the connection"
            );
            return IterationOutcome(ENOTCONN);
        }
        IterationOutcome::CONTINUE
    }

    async fn disconnect(&mut self) {
        self.connected = false;
        tracing::debug!("simulated broker disconnected");
    }
}
