//! Service discovery.
//!
//! - [`collector`] runs the discovery functions of a host's check types
//! - [`snmp_scan`] decides which SNMP check types apply to a device
//! - [`table`] classifies discovered, persisted and configured services
//! - [`mutator`] applies a discovery mode to the persisted autochecks
//! - [`bulk`] is the command line discovery over many hosts

pub mod bulk;
pub mod collector;
pub mod mutator;
pub mod snmp_scan;
pub mod table;

pub use bulk::{BulkDiscoveryReport, BulkHostResult};
pub use mutator::{DiscoveryCounts, DiscoveryFailure, DiscoveryOutcome};
pub use table::{PersistedView, merge_node_entry};

use tracing::{debug, warn};

use crate::{Error, Result};

/// What to do with a failure inside scanning or a discovery function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    /// Drop the failure silently.
    Ignore,
    /// Record the failure as a diagnostic and continue.
    #[default]
    Warn,
    /// Abort discovery of the host with the failure.
    Raise,
}

impl OnError {
    /// Apply the policy. Returns the error when it has to propagate.
    pub fn handle(self, diag: &mut Diagnostics, context: &str, err: Error) -> Result<()> {
        match self {
            Self::Ignore => {
                debug!(%err, "{context}");
                Ok(())
            }
            Self::Warn => {
                diag.warn(format!("{context}: {err}"));
                Ok(())
            }
            Self::Raise => Err(err),
        }
    }
}

/// Diagnostics collected during one discovery run.
///
/// Every message is also logged as a warning.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Options of a discovery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Accept cached agent data.
    pub use_caches: bool,
    /// Scan SNMP devices for applicable check types.
    pub do_snmp_scan: bool,
    pub on_error: OnError,
}

impl DiscoveryOptions {
    pub fn new(use_caches: bool, do_snmp_scan: bool, on_error: OnError) -> Self {
        Self {
            use_caches,
            do_snmp_scan,
            on_error,
        }
    }
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self::new(false, true, OnError::Warn)
    }
}
