// File: ./src/logging.rs
//! Process-wide logger setup.
//!
//! Warnings and errors go to stderr; everything at or above the configured
//! level is appended to `<data>/remindful.log`. Initialization happens at most
//! once per process and never panics.
use crate::context::AppContext;
use anyhow::{Context, Result};
use log::LevelFilter;
use once_cell::sync::OnceCell;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::OpenOptions;
use std::path::PathBuf;

static LOG_FILE: OnceCell<PathBuf> = OnceCell::new();

/// Installs the global logger. Later calls are no-ops and return the path
/// chosen by the first one.
pub fn init(ctx: &dyn AppContext, level: LevelFilter) -> Result<PathBuf> {
    LOG_FILE
        .get_or_try_init(|| -> Result<PathBuf> {
            let path = ctx.get_log_path()?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            let config = ConfigBuilder::new()
                .set_time_format_rfc3339()
                .set_target_level(LevelFilter::Error)
                .build();

            let loggers: Vec<Box<dyn SharedLogger>> = vec![
                TermLogger::new(
                    LevelFilter::Warn,
                    config.clone(),
                    TerminalMode::Stderr,
                    ColorChoice::Auto,
                ),
                WriteLogger::new(level, config, file),
            ];
            CombinedLogger::init(loggers).context("A global logger is already installed")?;

            log::info!(
                "remindful v{} logging to {} at {}",
                env!("CARGO_PKG_VERSION"),
                path.display(),
                level
            );
            Ok(path)
        })
        .cloned()
}
