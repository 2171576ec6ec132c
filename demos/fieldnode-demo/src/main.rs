//! Fieldnode Demo
//!
//! Runs the full device lifecycle against simulated collaborators:
//! - Link bring-up (strategy from build features or FIELDNODE_LINK)
//! - Clock sync against a flaky simulated time source
//! - Broker session loop until the simulated broker drops
//!
//! Environment overrides:
//!   FIELDNODE_LINK            auto | carrier | lte
//!   FIELDNODE_CLOCK           extrapolating | one-shot
//!   FIELDNODE_RELOAD          e.g. 10s
//!   FIELDNODE_INITIAL_DELAY   e.g. 10s
//!   FIELDNODE_MAX_ITERATIONS  stop the broker after N iterations
//!   FIELDNODE_SEED            seed for the simulators
//!   FIELDNODE_LOG             pretty | json

use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use fieldnode_core::{FieldnodeError, FieldnodeResult};
use fieldnode_link::LinkStrategy;
use fieldnode_runtime::{init_logging, Device, DeviceConfig, LogFormat};
use fieldnode_test::{spawn_carrier, SimulatedBroker, SimulatedModem, SimulatedTimeSource};
use fieldnode_time::ClockSyncPolicy;

struct DemoOptions {
    config: DeviceConfig,
    max_iterations: u64,
    seed: u64,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> FieldnodeResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var(name)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| FieldnodeError::InvalidConfig(format!("{}: {}", name, e)))
        })
        .transpose()
}

fn env_duration(name: &str) -> FieldnodeResult<Option<Duration>> {
    env_var(name)
        .map(|v| {
            humantime::parse_duration(v.trim())
                .map_err(|e| FieldnodeError::InvalidConfig(format!("{}: {}", name, e)))
        })
        .transpose()
}

fn load_options() -> FieldnodeResult<DemoOptions> {
    let mut config = DeviceConfig::default();

    if let Some(link) = env_parse::<LinkStrategy>("FIELDNODE_LINK")? {
        config.link = link;
    }
    if let Some(policy) = env_parse::<ClockSyncPolicy>("FIELDNODE_CLOCK")? {
        config.clock.policy = policy;
    }
    if let Some(reload) = env_duration("FIELDNODE_RELOAD")? {
        config.clock.reload_interval = reload;
    }
    if let Some(delay) = env_duration("FIELDNODE_INITIAL_DELAY")? {
        config.clock.initial_delay = delay;
    }
    config.validate()?;

    Ok(DemoOptions {
        config,
        max_iterations: env_parse("FIELDNODE_MAX_ITERATIONS")?.unwrap_or(60),
        seed: env_parse("FIELDNODE_SEED")?.unwrap_or(0x5EED),
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let format = env_parse::<LogFormat>("FIELDNODE_LOG")
        .ok()
        .flatten()
        .unwrap_or_default();
    init_logging(format);

    let options = match load_options() {
        Ok(options) => options,
        Err(err) => {
            tracing::error!("{}", err);
            return ExitCode::from(2);
        }
    };

    match serde_json::to_string(&options.config) {
        Ok(json) => tracing::info!(config = %json, "effective configuration"),
        Err(err) => tracing::warn!("could not render configuration: {}", err),
    }

    let strategy = options.config.link;
    let device = match Device::new(
        options.config,
        SimulatedModem::new(0.0, options.seed).with_recoverable_errors(0.1),
        Arc::new(SimulatedTimeSource::new(
            Duration::from_secs(3),
            0.25,
            options.seed,
        )),
        SimulatedBroker::new(Duration::from_secs(1), 0.0, options.seed)
            .with_max_iterations(options.max_iterations),
    ) {
        Ok(device) => device,
        Err(err) => {
            tracing::error!("{}", err);
            return ExitCode::from(2);
        }
    };

    let carrier = match (strategy, device.carrier_events()) {
        (LinkStrategy::ExternallyManaged, Some(events)) => {
            Some(spawn_carrier(events, Duration::from_millis(500), false))
        }
        _ => None,
    };

    let result = device.run().await;
    if let Some(carrier) = carrier {
        carrier.abort();
    }

    match result {
        Ok(report) => {
            tracing::info!(
                iterations = report.iterations,
                outcome = report.stopped_by.code(),
                unix_time_ms = report.time.as_millis(),
                "device lifecycle complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
