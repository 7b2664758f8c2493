use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt};

use crate::{LoggingConfig, ScoutError};

static TELEMETRY_GUARD: OnceLock<()> = OnceLock::new();

const QUIET_FILTER: &str = "warn";
const VERBOSE_FILTER: &str = "info,scout_core=debug,scout_agents=debug,scout=debug";

/// Configuration options when initialising telemetry.
#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    pub env_filter: Option<String>,
    pub verbose: bool,
    pub with_ansi: bool,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            env_filter: None,
            verbose: false,
            with_ansi: true,
        }
    }
}

impl From<&LoggingConfig> for TelemetryOptions {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            env_filter: config.filter.clone(),
            verbose: config.verbose,
            ..Self::default()
        }
    }
}

impl TelemetryOptions {
    /// Filter directive in effect: `RUST_LOG`, then explicit filter, then verbosity default.
    pub fn directive(&self) -> String {
        std::env::var("RUST_LOG")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.env_filter.clone())
            .unwrap_or_else(|| {
                if self.verbose {
                    VERBOSE_FILTER.to_string()
                } else {
                    QUIET_FILTER.to_string()
                }
            })
    }
}

/// Initialise the global tracing subscriber. Logs go to stderr.
///
/// Safe to call multiple times; only the first invocation installs the subscriber.
pub fn init_telemetry(options: TelemetryOptions) -> Result<(), ScoutError> {
    if TELEMETRY_GUARD.get().is_some() {
        return Ok(());
    }

    let filter = EnvFilter::try_new(options.directive())
        .map_err(|err| ScoutError::InvalidConfiguration(format!("invalid log filter: {err}")))?;

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_ansi(options.with_ansi)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ScoutError::InvalidConfiguration(format!("telemetry init failed: {err}")))?;

    TELEMETRY_GUARD.get_or_init(|| ());
    Ok(())
}
