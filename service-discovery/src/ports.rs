//! Collaborator interfaces.
//!
//! Discovery consumes host configuration, rule evaluation, data transport and
//! core control through these traits. The file-backed implementations live in
//! [`crate::site`]; tests use in-memory fakes.

use autochecks::{ServiceKey, Value};
use chrono::{DateTime, Local};

use crate::Result;
use crate::config::{DiscoveryCheckParams, ExitCodeSpec};
use crate::domain::Host;
use crate::registry::Section;

/// Host configuration queries.
pub trait HostInventory: Send + Sync {
    /// A configured host or cluster.
    fn host(&self, name: &str) -> Option<Host>;

    /// Non-cluster hosts that are currently monitored.
    fn active_realhosts(&self) -> Vec<String>;

    /// Every configured host and cluster.
    fn all_configured_hosts(&self) -> Vec<String>;

    fn is_active_realhost(&self, name: &str) -> bool {
        self.active_realhosts().iter().any(|h| h == name)
    }

    fn is_configured(&self, name: &str) -> bool {
        self.all_configured_hosts().iter().any(|h| h == name)
    }

    /// Nodes of a cluster; empty for plain or unknown hosts.
    fn nodes_of(&self, name: &str) -> Vec<String> {
        self.host(name).map(|h| h.nodes).unwrap_or_default()
    }
}

/// A check configured explicitly for a host.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualCheck {
    pub key: ServiceKey,
    pub params: Value,
}

/// One service generated by an active check rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveCheck {
    pub check_type: String,
    pub description: String,
    pub params: Value,
}

/// Rule evaluation for hosts and services.
pub trait RuleSet: Send + Sync {
    /// Check types disabled for a host.
    fn ignored_checks(&self, host: &str) -> Vec<String>;

    /// Whether a service of a host is disabled by an ignore rule.
    fn service_ignored(&self, host: &str, description: &str) -> bool;

    fn manual_checks(&self, host: &str) -> Vec<ManualCheck>;

    /// Service descriptions of the legacy checks of a host.
    fn legacy_checks(&self, host: &str) -> Vec<String>;

    /// Service descriptions of the custom checks of a host.
    fn custom_checks(&self, host: &str) -> Vec<String>;

    /// Active checks, one entry per generated service.
    fn active_checks(&self, host: &str) -> Vec<ActiveCheck>;

    /// Host a service of `node` is assigned to: the node itself or one of
    /// its clusters.
    fn host_of_clustered_service(&self, node: &str, description: &str) -> String;

    /// Value of the first matching periodic discovery rule.
    fn periodic_discovery(&self, host: &str) -> Option<DiscoveryCheckParams>;

    /// Hosts whose system description must not be queried.
    fn snmp_without_sys_descr(&self, host: &str) -> bool;

    fn exit_code_spec(&self, host: &str) -> ExitCodeSpec;
}

/// Agent and SNMP data transport.
pub trait DataSource: Send + Sync {
    /// Parsed content of a section, `None` when the host sends no such
    /// section. Cached data older than `max_cache_age` seconds must not be
    /// used; `0` asks for live data.
    fn fetch_section(&self, host: &Host, section: &str, max_cache_age: u64) -> Result<Option<Section>>;

    /// Value of a single OID, `None` when the device has none.
    fn get_single_oid(&self, host: &Host, oid: &str) -> Result<Option<String>>;

    /// Whether other hosts deliver piggyback data for this host.
    fn has_piggyback_data(&self, host: &str) -> bool;
}

/// Activation of changed configuration in the monitoring core.
pub trait CoreControl: Send + Sync {
    fn reload(&self) -> Result<()>;
    fn restart(&self) -> Result<()>;
}

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
