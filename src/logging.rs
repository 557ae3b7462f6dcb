// ABOUTME: tracing-subscriber setup: EnvFilter, human or JSON output, optional log file
// ABOUTME: The returned guard must stay alive for the file writer to flush

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when RUST_LOG is unset: info, minus matrix-sdk crypto noise.
pub const DEFAULT_FILTER: &str =
    "info,matrix_sdk_crypto::backups=error,matrix_sdk_crypto::session_manager::sessions=error";

const LOG_FILE_NAME: &str = "athenais.log";

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub json: bool,
    /// Also write logs into this directory (never rotated)
    pub file_dir: Option<std::path::PathBuf>,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn file_writer(dir: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    Ok(tracing_appender::non_blocking(appender))
}

/// Install the global subscriber.
pub fn init(options: &LogOptions) -> Result<Option<WorkerGuard>> {
    let stdout_layer = if options.json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    let (file_layer, guard) = match &options.file_dir {
        Some(dir) => {
            let (writer, guard) = file_writer(dir)?;
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
