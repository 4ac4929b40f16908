//! Tracing setup with file-based logging
//!
//! - JSON formatted logs to file
//! - Console output for development
//! - Size-based rotation (10MB per file) plus daily rotation

use anyhow::Result;
use rolling_file::{RollingConditionBasic, RollingFileAppender};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const DEFAULT_FILTER: &str = "orchestrate_proxy=debug,orchestrate_rs=debug,actix_web=info";

/// Install the global subscriber, logging under `log_dir`.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the life of the process.
pub fn init_telemetry(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    // orchestrate-proxy.log, rotated daily or at 10MB
    let file_appender = RollingFileAppender::new(
        log_dir.join("orchestrate-proxy.log"),
        RollingConditionBasic::new()
            .daily()
            .max_size(10 * 1024 * 1024),
        9,
    )?;
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = fmt::layer()
        .json()
        .with_writer(non_blocking_file)
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_target(true)
        .with_thread_ids(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    tracing::info!(log_dir = ?log_dir, "telemetry initialized");
    Ok(guard)
}
