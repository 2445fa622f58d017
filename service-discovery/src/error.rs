//! Discovery error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by discovery, the health check and the scheduler.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Autochecks(#[from] autochecks::AutochecksError),

    /// The agent of a host could not be queried.
    #[error("{0}")]
    Agent(String),

    /// An SNMP device could not be queried.
    #[error("{0}")]
    Snmp(String),

    #[error("Cannot parse section {section}: {message}")]
    SectionParse { section: String, message: String },

    /// Probing took longer than allowed. Kept apart from other failures so
    /// that long-running callers can react to it.
    #[error("Timed out")]
    CheckTimeout,

    #[error("SNMP scan aborted: {0}")]
    ScanAborted(String),

    #[error("Exception in check plugin '{check_type}': {message}")]
    Plugin { check_type: String, message: String },

    #[error("No such check type '{0}'")]
    UnknownCheckType(String),

    #[error("Host '{0}' is not configured")]
    UnknownHost(String),

    /// A check source outside of the known classification. Never recovered.
    #[error("Unknown check source '{0}'")]
    UnknownCheckSource(String),

    #[error("Invalid check parameter string '{paramstring}': {reason}")]
    InvalidParameters { paramstring: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error while {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn agent(msg: impl Into<String>) -> Self {
        Self::Agent(msg.into())
    }

    pub fn snmp(msg: impl Into<String>) -> Self {
        Self::Snmp(msg.into())
    }

    pub fn plugin(check_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            check_type: check_type.into(),
            message: message.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Short name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Autochecks(_) => "autochecks",
            Self::Agent(_) => "agent",
            Self::Snmp(_) => "snmp",
            Self::SectionParse { .. } => "section_parse",
            Self::CheckTimeout => "check_timeout",
            Self::ScanAborted(_) => "scan_aborted",
            Self::Plugin { .. } => "plugin",
            Self::UnknownCheckType(_) => "unknown_check_type",
            Self::UnknownHost(_) => "unknown_host",
            Self::UnknownCheckSource(_) => "unknown_check_source",
            Self::InvalidParameters { .. } => "invalid_parameters",
            Self::Configuration(_) => "configuration",
            Self::Io { .. } => "io",
            Self::Serialization(_) => "serialization",
            Self::Other(_) => "other",
        }
    }

    /// Agent or SNMP communication failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Agent(_) | Self::Snmp(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::CheckTimeout)
    }

    /// Internal invariant violations that must never be converted into a
    /// status or a log line.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownCheckSource(_))
    }
}
