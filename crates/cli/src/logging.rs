//! Logging setup
//!
//! Console output goes to stderr (stdout carries command output such as
//! stats). Format is `pretty` or `json`, from `FANOUT_LOG_FORMAT` or the
//! `log.format` setting. With `log.directory` set, a daily rolling file is
//! written as well.

use crate::settings::{expand_path, LogFormat, LogSettings};
use anyhow::{Context, Result};
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FORMAT_ENV: &str = "FANOUT_LOG_FORMAT";
const DEFAULT_FILTER: &str = "fanout=info";
const LOG_FILE_PREFIX: &str = "fanout.log";

/// Keeps the file writer alive; dropping it flushes the log file
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

fn resolve_format(settings: &LogSettings) -> LogFormat {
    match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => LogFormat::Json,
        Ok("pretty") => LogFormat::Pretty,
        _ => settings.format,
    }
}

pub fn init_logging(settings: &LogSettings) -> Result<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    let (file_layer, file_guard) = match &settings.directory {
        Some(dir) => {
            let dir = expand_path(dir);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);
    match resolve_format(settings) {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(io::stderr))
            .try_init(),
    }
    .context("Failed to install tracing subscriber")?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
