//! Logging setup.
//!
//! Log output goes to stderr so that stdout stays reserved for check output.
//! A daily rolling log file can be added on top.

use std::path::PathBuf;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::{Error, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "service_discovery=info,autochecks=info,disco=info";

/// File name prefix of rolled log files.
const LOG_FILE_PREFIX: &str = "discovery.log";

/// Timer that formats timestamps in the local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Logging options.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Filter directive; falls back to `RUST_LOG`, then [`DEFAULT_LOG_FILTER`].
    pub filter: Option<String>,
    /// Emit JSON lines instead of human readable text.
    pub json: bool,
    /// Also write a daily rolling log file into this directory.
    pub log_dir: Option<PathBuf>,
}

impl LogOptions {
    /// Filter directive for a `-v` count: 1 enables debug, 2 and more trace.
    pub fn verbosity_filter(verbose: u8) -> Option<String> {
        match verbose {
            0 => None,
            1 => Some("service_discovery=debug,autochecks=debug,disco=debug".to_string()),
            _ => Some("service_discovery=trace,autochecks=trace,disco=trace".to_string()),
        }
    }
}

/// Install the global subscriber.
///
/// Returns the guard of the file writer, if any; keep it alive for the
/// lifetime of the process.
pub fn init_logging(options: &LogOptions) -> Result<Option<WorkerGuard>> {
    let filter = match &options.filter {
        Some(directive) => EnvFilter::try_new(directive)
            .map_err(|e| Error::config(format!("Invalid filter directive: {e}")))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };

    let (file_writer, guard) = match &options.log_dir {
        Some(dir) => {
            crate::utils::fs::ensure_dir_all_with_op("creating log directory", dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let text_layer = (!options.json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(LocalTimer)
    });
    let json_layer = options.json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_timer(LocalTimer)
    });
    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_timer(LocalTimer)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to set global default subscriber: {e}")))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert!(DEFAULT_LOG_FILTER.contains("service_discovery=info"));
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn test_verbosity_filter() {
        assert_eq!(LogOptions::verbosity_filter(0), None);
        assert!(LogOptions::verbosity_filter(1).unwrap().contains("=debug"));
        assert!(LogOptions::verbosity_filter(5).unwrap().contains("=trace"));
    }
}
