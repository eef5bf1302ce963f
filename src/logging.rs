//! Logging via tracing. Output goes to a daily file so the terminal UI keeps
//! the screen; the level comes from `ELEVATE_LOG`.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init(data_dir: &Path) -> Result<PathBuf> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "elevate.log");

    let env_filter = EnvFilter::try_from_env("ELEVATE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("elevate=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_timer(fmt::time::ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string())),
        )
        .try_init()?;

    tracing::debug!("Log directory: {}", log_dir.display());
    Ok(log_dir)
}
