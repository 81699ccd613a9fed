//! Global tracing subscriber setup

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use croupier_core::{CroupierError, CroupierResult};

use crate::{LogConfig, LogFormat};

/// Build the filter from config directives
pub fn build_filter(config: &LogConfig) -> CroupierResult<EnvFilter> {
    EnvFilter::try_new(&config.level).map_err(|e| {
        CroupierError::InvalidConfig(format!("invalid log filter '{}': {}", config.level, e))
    })
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LogConfig) -> CroupierResult<()> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    result.map_err(|e| CroupierError::InvalidConfig(format!("logging already initialised: {}", e)))
}
