use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log to stderr, filtered by `OPENCHAT_LOG` (default `info`). When
/// `OPENCHAT_LOG_FILE` is set the same events are also appended to that file.
pub fn init_tracing() -> Result<()> {
    let filter =
        EnvFilter::try_from_env("OPENCHAT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let registry = tracing_subscriber::registry().with(filter).with(stderr_layer);

    if let Ok(log_path) = std::env::var("OPENCHAT_LOG_FILE") {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file: {}", log_path))?;

        let file_layer = fmt::layer()
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true);

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
    Ok(())
}
