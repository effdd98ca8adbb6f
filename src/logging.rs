use crate::config::LoggingConfig;
use crate::error::Result;
use std::fs;
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

const DEFAULT_DIRECTIVE: &str = "bank_etl=info";

/// Builds the run's log dispatcher: a file layer (plain text or JSON) plus an
/// optional console layer, filtered by `RUST_LOG` with `bank_etl=info` as the
/// fallback.
///
/// Nothing is installed globally; callers scope the returned dispatcher with
/// `tracing::dispatcher::with_default`. The guard must outlive the run so
/// buffered lines are flushed.
pub fn build_dispatch(config: &LoggingConfig) -> Result<(Dispatch, WorkerGuard)> {
    fs::create_dir_all(&config.dir)?;

    let file_appender = tracing_appender::rolling::never(&config.dir, &config.file);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = if config.json {
        fmt::layer()
            .json()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .boxed()
    };

    let console_layer = config
        .console
        .then(|| fmt::layer().with_writer(std::io::stdout).boxed());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer);

    Ok((Dispatch::new(subscriber), guard))
}
