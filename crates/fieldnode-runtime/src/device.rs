//! Fieldnode device - lifecycle orchestration

use std::sync::Arc;

use fieldnode_core::{ConnectivityState, FieldnodeResult, IterationOutcome, TimestampMillis};
use fieldnode_link::{CarrierEventHandler, ConnectivityManager, LinkController, LinkStrategy};
use fieldnode_time::{ClockReader, ClockSyncConfig, ClockSyncScheduler, TimeSource};
use serde::{Deserialize, Serialize};

use crate::{BrokerSession, SessionSupervisor};

/// Device configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Link bring-up strategy
    #[serde(default)]
    pub link: LinkStrategy,
    /// Clock sync policy and timing
    #[serde(default)]
    pub clock: ClockSyncConfig,
}

impl DeviceConfig {
    pub fn validate(&self) -> FieldnodeResult<()> {
        self.clock.validate()
    }
}

/// What a completed lifecycle did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LifecycleReport {
    pub link: ConnectivityState,
    /// Broker session iterations run
    pub iterations: u64,
    /// Outcome that stopped the session loop
    pub stopped_by: IterationOutcome,
    /// Time estimate when the loop ended
    pub time: TimestampMillis,
}

/// Fieldnode device - the runtime entity
pub struct Device {
    config: DeviceConfig,
    link: ConnectivityManager,
    clock: ClockSyncScheduler,
    session: SessionSupervisor,
}

impl Device {
    /// Assemble a device from its collaborators
    pub fn new<C, S>(
        config: DeviceConfig,
        controller: C,
        time_source: Arc<dyn TimeSource>,
        session: S,
    ) -> FieldnodeResult<Self>
    where
        C: LinkController + Send + 'static,
        S: BrokerSession + 'static,
    {
        config.validate()?;
        Ok(Device {
            link: ConnectivityManager::new(config.link, controller),
            clock: ClockSyncScheduler::new(config.clock.clone(), time_source)?,
            session: SessionSupervisor::new(session),
            config,
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Carrier event handler, for the carrier-managed strategy
    pub fn carrier_events(&self) -> Option<CarrierEventHandler> {
        self.link.carrier_events()
    }

    /// Read handle to the time estimate
    pub fn clock(&self) -> ClockReader {
        self.clock.reader()
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.link.state()
    }

    /// Run the full lifecycle
    ///
    /// Fatal bring-up and session init errors are returned to the caller.
    /// Once the session loop has started, the only way out is a stop outcome
    /// followed by disconnect.
    pub async fn run(self) -> FieldnodeResult<LifecycleReport> {
        let Device {
            config,
            mut link,
            clock,
            mut session,
        } = self;

        tracing::info!(
            strategy = ?config.link,
            policy = ?config.clock.policy,
            "Fieldnode device started"
        );

        let link_state = link.bring_up().await?;

        if let Err(err) = session.init().await {
            session.cleanup().await;
            return Err(err);
        }

        let clock = clock.start();
        let summary = session.run_loop().await;
        session.cleanup().await;
        let time = clock.stop().raw();

        Ok(LifecycleReport {
            link: link_state,
            iterations: summary.iterations,
            stopped_by: summary.stopped_by,
            time,
        })
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("config", &self.config)
            .field("link", &self.link)
            .field("clock", &self.clock)
            .field("session", &self.session)
            .finish()
    }
}
