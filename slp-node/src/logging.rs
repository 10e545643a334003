//! Log setup: console plus a daily-rotated file, 7 days retained

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::NodeError;

/// Installs the global subscriber. The returned guard must outlive the
/// node: dropping it flushes and closes the file writer.
pub fn init_tracing(
    data_dir: &Path,
    database_name: &str,
    level: &str,
) -> Result<WorkerGuard, NodeError> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(database_name)
        .filename_suffix("log")
        .max_log_files(7)
        .build(data_dir.join(".log"))
        .map_err(|e| NodeError::Logging(e.to_string()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()
        .map_err(|e| NodeError::Logging(e.to_string()))?;

    Ok(guard)
}
