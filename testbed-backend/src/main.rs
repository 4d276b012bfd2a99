//! Testbed backend
//!
//! Entry point: loads configuration, installs tracing, starts the server
//! context and runs until interrupted.

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use testbed_backend::ServerContext;

mod cli;
mod tracing_setup;

use cli::CliArgs;
use tracing_setup::{install_tracing_from_config, TracingHandles};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config_path = args.config_path.as_deref();

    let config = load_config(config_path)?;
    testbed_config::validate_config(&config).context("invalid configuration")?;
    if args.check_config {
        println!("configuration ok");
        return Ok(());
    }

    let tracing = install_tracing_from_config(&config.logging);
    info!(
        config_path = config_path.unwrap_or("-"),
        store = %config.store.path,
        tick_ms = config.queue.tick_ms,
        cache_ttl_secs = config.cache.ttl_secs,
        "testbed starting"
    );

    let ctx = ServerContext::from_config(&config).context("unable to build server context")?;
    ctx.start().await.context("unable to start server context")?;

    wait_for_shutdown(config_path, &tracing).await?;
    ctx.stop().await;
    Ok(())
}

/// Load configuration from file, defaults and the environment.
fn load_config(path: Option<&str>) -> anyhow::Result<testbed_config::Config> {
    testbed_config::load_config(path).context("failed to load configuration")
}

/// Re-read the configuration and apply its log level.
fn reload_log_level(path: Option<&str>, tracing: &TracingHandles) {
    let config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "keeping current log level");
            return;
        }
    };
    match (tracing.reload)(EnvFilter::new(&config.logging.level)) {
        Ok(()) => info!(level = %config.logging.level, "log level reloaded"),
        Err(e) => warn!(error = %e, "unable to reload log level"),
    }
}

#[cfg(unix)]
async fn wait_for_shutdown(path: Option<&str>, tracing: &TracingHandles) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                info!("interrupt received, shutting down");
                return Ok(());
            }
            _ = terminate.recv() => {
                info!("terminate received, shutting down");
                return Ok(());
            }
            _ = hangup.recv() => reload_log_level(path, tracing),
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_path: Option<&str>, _tracing: &TracingHandles) -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_failure_keeps_the_cause() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");

        let err = load_config(path.to_str()).unwrap_err();
        assert_eq!(err.to_string(), "failed to load configuration");
        assert!(err.chain().count() >= 2);
        assert!(err
            .downcast_ref::<testbed_config::ConfigError>()
            .is_some());
    }
}
