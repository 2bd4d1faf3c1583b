use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crossrelay_core::config::LoggingSettings;

const LOG_FILE_PREFIX: &str = "crossrelay.log";

/// `RUST_LOG` wins; otherwise `--verbose`, then `logging.level`, then `info`.
fn env_filter(settings: &LoggingSettings, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose {
            "debug"
        } else {
            settings.level.as_deref().unwrap_or("info")
        };
        EnvFilter::new(level)
    })
}

/// Install the global subscriber: stderr always, plus a daily-rolling file
/// when `logging.dir` is set.
///
/// The returned guard flushes the file writer on drop; keep it alive in `main`.
pub fn init(settings: &LoggingSettings, verbose: bool) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match &settings.dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir).with_context(|| {
                format!("Failed to create log directory {}", log_dir.display())
            })?;
            let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .with_level(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(settings, verbose))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .init();
    Ok(guard)
}
