//! Logging setup

use std::str::FromStr;

use fieldnode_core::FieldnodeError;
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines, the console equivalent of the device UART
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = FieldnodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(FieldnodeError::InvalidConfig(format!(
                "unknown log format '{}'",
                other
            ))),
        }
    }
}

/// Install the global subscriber
///
/// Honours `RUST_LOG`, defaulting to `info`. Returns `false` if a subscriber
/// was already installed.
pub fn init_logging(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}
