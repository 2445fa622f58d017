//! Service discovery and autochecks reconciliation.
//!
//! Discovery asks the check plugins of a host which services the host could
//! have, compares the result with the services persisted in the host's
//! autochecks and with the services configured manually or by rules, and
//! updates the autochecks according to a discovery mode.
//!
//! ## Core Types
//!
//! - [`DiscoveryEngine`] - Entry point; all operations are methods on it
//! - [`CheckRegistry`] - The known check types and their discovery functions
//! - [`ServiceTable`] - Classification of every service of a host
//! - [`DiscoveryMode`] - How discovery results are applied to the autochecks
//!
//! ## Operations
//!
//! - [`DiscoveryEngine::discover_hosts`] - Bulk discovery from the command line
//! - [`DiscoveryEngine::discover_on_host`] - One discovery pass in a given mode
//! - [`DiscoveryEngine::check_discovery`] - The discovery check
//! - [`DiscoveryEngine::discover_marked_hosts`] - Automatic rediscovery
//! - [`DiscoveryEngine::check_preview`] - Service preview with check results
//!
//! Host configuration, rules, data transport and core control are consumed
//! through the traits in [`ports`]. [`site`] provides file based
//! implementations.

pub mod config;
pub mod discovery;
pub mod domain;
pub mod engine;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod ports;
pub mod preview;
pub mod registry;
pub mod scheduler;
pub mod site;
pub mod utils;

pub use config::{DiscoveryCheckParams, DiscoverySettings, ExitCodeSpec, MonitoringCore, RediscoveryParams};
pub use discovery::{
    BulkDiscoveryReport, BulkHostResult, Diagnostics, DiscoveryCounts, DiscoveryFailure, DiscoveryOptions,
    DiscoveryOutcome, OnError,
};
pub use domain::{
    CheckSource, DiscoveryMode, Host, RediscoveryMode, ServiceCandidate, ServiceEntry, ServiceTable, State,
    TimeWindow,
};
pub use engine::{DiscoveryEngine, DiscoveryEngineBuilder};
pub use error::{Error, Result};
pub use monitor::{CheckOutcome, CrashReport};
pub use preview::PreviewRow;
pub use registry::{CheckRegistry, CheckResult, CheckTypeDescriptor, DiscoveryContext, ScanContext, Section, SectionInput};
pub use scheduler::{Activation, HostRediscovery, MarkedHostsReport, SkipReason};
