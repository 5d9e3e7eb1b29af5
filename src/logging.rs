//! Tracing subscriber setup for the `olh` binary.
//!
//! Events go to stderr so command output on stdout stays parseable. The
//! filter comes from `OLH_LOG` when set, otherwise from `[logging].filter`.

use anyhow::{anyhow, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};

pub const LOG_ENV: &str = "OLH_LOG";

pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config, std::env::var(LOG_ENV).ok().as_deref())?;

    Registry::default()
        .with(build_layer(config.format))
        .with(filter)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}

fn build_filter(config: &LoggingConfig, env: Option<&str>) -> Result<EnvFilter> {
    let directives = env
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(&config.filter);
    EnvFilter::try_new(directives)
        .map_err(|e| anyhow!("invalid log filter '{}': {}", directives, e))
}

fn build_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Compact => Box::new(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(true),
        ),
        LogFormat::Pretty => Box::new(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_target(true),
        ),
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true),
        ),
    }
}
