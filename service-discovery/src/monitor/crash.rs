//! Crash reports of the discovery check.

use std::error::Error as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::utils::fs::{ensure_dir_all_with_op, io_error};
use crate::{Error, Result};

/// Diagnostic record of an unexpected failure.
#[derive(Debug, Clone, Serialize)]
pub struct CrashReport {
    pub crash_type: String,
    pub host: String,
    pub time: DateTime<Local>,
    pub exc_type: String,
    pub exc_value: String,
    /// Source chain of the error, outermost first.
    pub details: Vec<String>,
    pub version: String,
}

impl CrashReport {
    pub fn new(crash_type: &str, host: &str, err: &Error, time: DateTime<Local>) -> Self {
        let mut details = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            details.push(cause.to_string());
            source = cause.source();
        }

        Self {
            crash_type: crash_type.to_string(),
            host: host.to_string(),
            time,
            exc_type: err.kind().to_string(),
            exc_value: err.to_string(),
            details,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Write the report below `var_dir/crashes/<crash_type>/`.
    pub fn write(&self, var_dir: &Path) -> Result<PathBuf> {
        let dir = var_dir.join("crashes").join(&self.crash_type);
        ensure_dir_all_with_op("creating crash directory", &dir)?;

        let path = dir.join(format!(
            "{}-{}.json",
            self.host,
            self.time.format("%Y%m%dT%H%M%S%.3f")
        ));
        let content = serde_json::to_vec_pretty(self)?;
        std::fs::write(&path, content).map_err(|e| io_error("writing", &path, e))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_crash_report() {
        let dir = tempfile::tempdir().unwrap();
        let err = Error::plugin("df", "index out of range");
        let report = CrashReport::new("discovery", "host1", &err, Local::now());
        let path = report.write(dir.path()).unwrap();

        assert!(path.starts_with(dir.path().join("crashes").join("discovery")));
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["host"], "host1");
        assert_eq!(json["exc_type"], "plugin");
        assert_eq!(
            json["exc_value"],
            "Exception in check plugin 'df': index out of range"
        );
    }
}
