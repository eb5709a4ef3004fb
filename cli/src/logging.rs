//! Tracing subscriber setup.
//!
//! Logs go to stderr so response bodies on stdout stay pipeable.

use std::str::FromStr;

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init(log_filter: &str, json_logs: bool) -> Result<()> {
    let env_filter = EnvFilter::from_str(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    tracing::debug!(log_filter, json_logs, "logging initialized");
    Ok(())
}
