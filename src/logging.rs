use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

const LOG_FILE_PREFIX: &str = "studyai.log";

/// Keeps the non-blocking file writer flushing. Hold it for the lifetime of
/// the process when file logging is on, or buffered lines are lost.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// Installs the tracing subscriber for the embedding shell: stdout always,
/// plus a daily-rolling file in `config.log_dir` when `config.file_logs` is
/// set.
pub fn init_tracing(config: &Config) -> Option<FileLogGuard> {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout = fmt::layer().with_target(true);
    let base = tracing_subscriber::registry().with(filter).with(stdout);

    if !config.file_logs {
        base.init();
        return None;
    }

    if let Err(err) = std::fs::create_dir_all(&config.log_dir) {
        base.init();
        tracing::warn!(error = %err, dir = %config.log_dir, "log directory unavailable; file logging disabled");
        return None;
    }

    let appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file = fmt::layer().with_writer(writer).with_ansi(false).with_target(true);

    base.with(file).init();
    Some(FileLogGuard { _guard: guard })
}
