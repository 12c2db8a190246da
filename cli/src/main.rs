//! tether CLI - runs the bridge scenarios against simulated collaborators.
//!
//! ```text
//! tether [continuation|publisher|actor|group|all]
//! ```
//!
//! Configuration comes from `~/.tether/config.toml` (or `TETHER_CONFIG`).
//! Each scenario is bounded by `scenarios.timeout_ms`; the bridge itself never
//! times out, so this is where a hung primitive gets caught.

mod collaborators;
mod scenarios;

use std::env;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tether_config::TetherConfig;

use crate::scenarios::{Scenario, ScenarioContext};

const DEFAULT_LOG_FILTER: &str = "info";

/// `RUST_LOG` wins, then the config's `log.filter`, then `info`.
fn init_tracing(config_filter: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // stdout carries scenario output; keep logs off it.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let loaded = TetherConfig::load();
    let config_filter = loaded
        .as_ref()
        .ok()
        .and_then(Option::as_ref)
        .and_then(|config| config.log.filter.clone());
    init_tracing(config_filter.as_deref());

    let config = match loaded {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            tracing::warn!("{err}; falling back to defaults");
            TetherConfig::default()
        }
    };
    tracing::debug!(
        misuse_policy = config.bridge.misuse_policy.as_str(),
        "configuration loaded"
    );

    let scenario: Scenario = env::args()
        .nth(1)
        .as_deref()
        .unwrap_or("all")
        .parse()?;
    let ctx = ScenarioContext::from_config(config);

    for one in scenario.expand() {
        tokio::time::timeout(ctx.timeout(), scenarios::run(one, &ctx))
            .await
            .with_context(|| {
                format!(
                    "scenario '{}' did not finish within {:?}",
                    one.as_str(),
                    ctx.timeout()
                )
            })??;
    }

    Ok(())
}
