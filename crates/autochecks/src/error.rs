//! Autochecks error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::literal::LiteralError;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, AutochecksError>;

/// Errors raised while reading or writing autochecks files.
#[derive(Error, Debug)]
pub enum AutochecksError {
    /// Filesystem errors with operation and path context
    #[error("IO error while {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record line that does not follow the file grammar
    #[error("Invalid line {line} in autochecks file {}: {reason}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A record whose file line would not read back as the same record
    #[error("Refusing to write record {key} for host {host}: {reason}")]
    InvalidRecord {
        host: String,
        key: String,
        reason: String,
    },

    /// Literal decoding errors outside of a file context
    #[error("Literal error: {0}")]
    Literal(#[from] LiteralError),
}

impl AutochecksError {
    /// Create an IO error with operation + path context.
    pub fn io(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Create a parse error for a line of a file.
    pub fn parse(path: &Path, line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            line,
            reason: reason.into(),
        }
    }
}
