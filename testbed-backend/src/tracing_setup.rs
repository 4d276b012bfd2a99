use std::sync::Arc;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter};

/// Type alias for the reload handle returned by tracing initialization.
pub type ReloadHandle = Arc<dyn Fn(EnvFilter) -> Result<(), String> + Send + Sync>;

/// Keeps the subscriber's background writer alive and allows filter reloads.
pub struct TracingHandles {
    pub reload: ReloadHandle,
    _guard: Option<WorkerGuard>,
}

/// Initialize tracing from configuration.
///
/// `RUST_LOG` takes precedence over `logging.level`. With `logging.log_dir`
/// set, output goes to a daily rotated file in that directory instead of
/// stderr.
pub fn install_tracing_from_config(cfg: &testbed_config::LoggingConfig) -> TracingHandles {
    let env_filter_str = std::env::var("RUST_LOG").unwrap_or_else(|_| cfg.level.clone());
    let (filter, handle) = reload::Layer::new(EnvFilter::new(&env_filter_str));

    let (writer, guard) = match &cfg.log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "testbed.log"));
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    // The fmt layers differ in type, so each branch installs its own stack.
    if cfg.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(cfg.log_dir.is_none())
                    .with_writer(writer),
            )
            .init();
    }

    TracingHandles {
        reload: Arc::new(move |filter| {
            handle
                .reload(filter)
                .map_err(|e| format!("reload failed: {e}"))
        }),
        _guard: guard,
    }
}
