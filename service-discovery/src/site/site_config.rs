//! Host and rule configuration read from a TOML file.
//!
//! ```toml
//! [[hosts]]
//! name = "switch01"
//! snmp = true
//! tcp = false
//!
//! [[clusters]]
//! name = "db-cluster"
//! nodes = ["db01", "db02"]
//! services = ["Filesystem /data", "Postgres"]
//!
//! [[ignored_services]]
//! hosts = ["~web"]
//! services = ["Interface 1$"]
//!
//! [[periodic_discovery]]
//! check_interval = 720
//! severity_unmonitored = 1
//! inventory_rediscovery = { mode = 2, group_time = 900 }
//! ```
//!
//! Host conditions match a host name exactly, or by regular expression when
//! prefixed with `~`. Rules without host conditions apply to all hosts.
//! Service conditions are regular expressions matched at the start of the
//! service description. For single valued rules the first match wins.

use std::path::Path;

use autochecks::{ServiceKey, Value};
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::config::{DiscoveryCheckParams, ExitCodeSpec};
use crate::domain::Host;
use crate::ports::{ActiveCheck, HostInventory, ManualCheck, RuleSet};
use crate::{Error, Result};

/// Host condition of a rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub enum HostMatcher {
    Exact(String),
    Pattern(Regex),
}

impl HostMatcher {
    pub fn matches(&self, host: &str) -> bool {
        match self {
            Self::Exact(name) => name == host,
            Self::Pattern(regex) => regex.is_match(host),
        }
    }
}

impl TryFrom<String> for HostMatcher {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.strip_prefix('~') {
            Some(pattern) => anchored(pattern).map(Self::Pattern),
            None => Ok(Self::Exact(value)),
        }
    }
}

/// Service condition of a rule, matched at the start of the description.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct ServicePattern(Regex);

impl ServicePattern {
    pub fn matches(&self, description: &str) -> bool {
        self.0.is_match(description)
    }
}

impl TryFrom<String> for ServicePattern {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        anchored(&value).map(Self)
    }
}

fn anchored(pattern: &str) -> std::result::Result<Regex, String> {
    Regex::new(&format!("^(?:{pattern})")).map_err(|e| format!("invalid pattern '{pattern}': {e}"))
}

/// Check parameters written as a literal.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Literal(pub Value);

impl TryFrom<String> for Literal {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Value::parse(&value)
            .map(Self)
            .map_err(|e| format!("invalid literal '{value}': {e}"))
    }
}

/// A rule value with its host conditions.
#[derive(Debug, Clone, Deserialize)]
pub struct Rule<T> {
    #[serde(default)]
    pub hosts: Vec<HostMatcher>,
    #[serde(flatten)]
    pub value: T,
}

impl<T> Rule<T> {
    pub fn applies_to(&self, host: &str) -> bool {
        self.hosts.is_empty() || self.hosts.iter().any(|m| m.matches(host))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostSpec {
    pub name: String,
    #[serde(default)]
    pub snmp: bool,
    #[serde(default = "default_true")]
    pub tcp: bool,
    /// Monitored; inactive hosts are not discovered.
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterSpec {
    pub name: String,
    pub nodes: Vec<String>,
    /// Services of the nodes that belong to the cluster.
    #[serde(default)]
    pub services: Vec<ServicePattern>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IgnoredServices {
    pub services: Vec<ServicePattern>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IgnoredChecks {
    pub check_types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualCheckSpec {
    pub check_type: String,
    #[serde(default)]
    pub item: Option<String>,
    pub params: Literal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DescribedCheck {
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveCheckSpec {
    pub check_type: String,
    pub description: String,
    #[serde(default)]
    pub params: Option<Literal>,
}

/// Contents of the site file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub hosts: Vec<HostSpec>,
    pub clusters: Vec<ClusterSpec>,
    pub ignored_services: Vec<Rule<IgnoredServices>>,
    pub ignored_checks: Vec<Rule<IgnoredChecks>>,
    pub manual_checks: Vec<Rule<ManualCheckSpec>>,
    pub legacy_checks: Vec<Rule<DescribedCheck>>,
    pub custom_checks: Vec<Rule<DescribedCheck>>,
    pub active_checks: Vec<Rule<ActiveCheckSpec>>,
    pub periodic_discovery: Vec<Rule<DiscoveryCheckParams>>,
    pub snmp_without_sys_descr: Vec<HostMatcher>,
    pub exit_codes: Vec<Rule<ExitCodeSpec>>,
}

impl SiteConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::io_path("reading", path, e))?;
        let config = Self::from_toml_str(&content)?;
        debug!(
            path = %path.display(),
            hosts = config.hosts.len(),
            clusters = config.clusters.len(),
            "Loaded site configuration"
        );
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::config(format!("invalid site configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for rule in &self.periodic_discovery {
            rule.value.validate()?;
        }
        for cluster in &self.clusters {
            if let Some(node) = cluster
                .nodes
                .iter()
                .find(|n| !self.hosts.iter().any(|h| &h.name == *n))
            {
                return Err(Error::config(format!(
                    "cluster '{}' has unknown node '{node}'",
                    cluster.name
                )));
            }
        }
        Ok(())
    }

    fn rules_for<'a, T>(rules: &'a [Rule<T>], host: &'a str) -> impl Iterator<Item = &'a T> + 'a {
        rules.iter().filter(move |r| r.applies_to(host)).map(|r| &r.value)
    }
}

impl HostInventory for SiteConfig {
    fn host(&self, name: &str) -> Option<Host> {
        if let Some(spec) = self.hosts.iter().find(|h| h.name == name) {
            return Some(
                Host::agent(spec.name.as_str())
                    .with_snmp(spec.snmp)
                    .with_tcp(spec.tcp),
            );
        }
        self.clusters
            .iter()
            .find(|c| c.name == name)
            .map(|c| Host::cluster(c.name.as_str(), c.nodes.iter().map(String::as_str)))
    }

    fn active_realhosts(&self) -> Vec<String> {
        self.hosts
            .iter()
            .filter(|h| h.active)
            .map(|h| h.name.clone())
            .collect()
    }

    fn all_configured_hosts(&self) -> Vec<String> {
        self.hosts
            .iter()
            .map(|h| h.name.clone())
            .chain(self.clusters.iter().map(|c| c.name.clone()))
            .collect()
    }
}

impl RuleSet for SiteConfig {
    fn ignored_checks(&self, host: &str) -> Vec<String> {
        Self::rules_for(&self.ignored_checks, host)
            .flat_map(|r| r.check_types.iter().cloned())
            .collect()
    }

    fn service_ignored(&self, host: &str, description: &str) -> bool {
        Self::rules_for(&self.ignored_services, host)
            .any(|r| r.services.iter().any(|p| p.matches(description)))
    }

    fn manual_checks(&self, host: &str) -> Vec<ManualCheck> {
        Self::rules_for(&self.manual_checks, host)
            .map(|m| ManualCheck {
                key: ServiceKey::new(m.check_type.as_str(), m.item.clone()),
                params: m.params.0.clone(),
            })
            .collect()
    }

    fn legacy_checks(&self, host: &str) -> Vec<String> {
        Self::rules_for(&self.legacy_checks, host)
            .map(|c| c.description.clone())
            .collect()
    }

    fn custom_checks(&self, host: &str) -> Vec<String> {
        Self::rules_for(&self.custom_checks, host)
            .map(|c| c.description.clone())
            .collect()
    }

    fn active_checks(&self, host: &str) -> Vec<ActiveCheck> {
        Self::rules_for(&self.active_checks, host)
            .map(|a| ActiveCheck {
                check_type: a.check_type.clone(),
                description: a.description.clone(),
                params: a.params.as_ref().map_or(Value::None, |p| p.0.clone()),
            })
            .collect()
    }

    fn host_of_clustered_service(&self, node: &str, description: &str) -> String {
        self.clusters
            .iter()
            .filter(|c| c.nodes.iter().any(|n| n == node))
            .find(|c| c.services.iter().any(|p| p.matches(description)))
            .map_or_else(|| node.to_string(), |c| c.name.clone())
    }

    fn periodic_discovery(&self, host: &str) -> Option<DiscoveryCheckParams> {
        Self::rules_for(&self.periodic_discovery, host).next().cloned()
    }

    fn snmp_without_sys_descr(&self, host: &str) -> bool {
        self.snmp_without_sys_descr.iter().any(|m| m.matches(host))
    }

    fn exit_code_spec(&self, host: &str) -> ExitCodeSpec {
        Self::rules_for(&self.exit_codes, host)
            .next()
            .copied()
            .unwrap_or_default()
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RediscoveryMode, State};

    const SITE: &str = r#"
        snmp_without_sys_descr = ["~old-"]

        [[hosts]]
        name = "web01"

        [[hosts]]
        name = "switch01"
        snmp = true
        tcp = false

        [[hosts]]
        name = "db01"

        [[hosts]]
        name = "db02"
        active = false

        [[clusters]]
        name = "db"
        nodes = ["db01", "db02"]
        services = ["Postgres", "Filesystem /data"]

        [[ignored_services]]
        hosts = ["~web"]
        services = ["Interface 1$"]

        [[ignored_checks]]
        check_types = ["ntp"]

        [[manual_checks]]
        hosts = ["web01"]
        check_type = "df"
        item = "/"
        params = "{'levels': (80.0, 90.0)}"

        [[legacy_checks]]
        hosts = ["web01"]
        description = "Backup"

        [[active_checks]]
        hosts = ["web01"]
        check_type = "http"
        description = "HTTP shop"
        params = "{'port': 443}"

        [[periodic_discovery]]
        hosts = ["~web"]
        check_interval = 720
        severity_unmonitored = 2
        inventory_rediscovery = { mode = 1, group_time = 600 }

        [[periodic_discovery]]
        check_interval = 120

        [[exit_codes]]
        hosts = ["switch01"]
        connection = 2
    "#;

    fn site() -> SiteConfig {
        SiteConfig::from_toml_str(SITE).unwrap()
    }

    #[test]
    fn test_hosts() {
        let site = site();
        assert_eq!(site.active_realhosts(), vec!["web01", "switch01", "db01"]);
        assert_eq!(site.all_configured_hosts().len(), 5);

        let switch = site.host("switch01").unwrap();
        assert!(switch.snmp && !switch.tcp);

        let cluster = site.host("db").unwrap();
        assert!(cluster.is_cluster);
        assert_eq!(cluster.nodes, vec!["db01", "db02"]);
        assert!(site.host("nope").is_none());
    }

    #[test]
    fn test_clustered_services() {
        let site = site();
        assert_eq!(site.host_of_clustered_service("db01", "Postgres main"), "db");
        assert_eq!(site.host_of_clustered_service("db01", "Filesystem /"), "db01");
        assert_eq!(site.host_of_clustered_service("web01", "Postgres main"), "web01");
    }

    #[test]
    fn test_ignore_rules() {
        let site = site();
        assert!(site.service_ignored("web01", "Interface 1"));
        assert!(!site.service_ignored("web01", "Interface 10"));
        assert!(!site.service_ignored("db01", "Interface 1"));
        assert_eq!(site.ignored_checks("db01"), vec!["ntp"]);
    }

    #[test]
    fn test_static_checks() {
        let site = site();
        let manual = site.manual_checks("web01");
        assert_eq!(manual.len(), 1);
        assert_eq!(manual[0].params.repr(), "{'levels': (80.0, 90.0)}");
        assert!(site.manual_checks("db01").is_empty());
        assert_eq!(site.legacy_checks("web01"), vec!["Backup"]);
        assert_eq!(site.active_checks("web01")[0].params.repr(), "{'port': 443}");
    }

    #[test]
    fn test_single_valued_rules() {
        let site = site();
        let web = site.periodic_discovery("web01").unwrap();
        assert_eq!(web.severity_unmonitored, Some(State::Crit));
        assert_eq!(
            web.inventory_rediscovery.unwrap().mode,
            RediscoveryMode::Remove
        );
        let db = site.periodic_discovery("db01").unwrap();
        assert_eq!(db.check_interval, Some(120));
        assert!(db.inventory_rediscovery.is_none());

        assert_eq!(site.exit_code_spec("switch01").connection, State::Crit);
        assert_eq!(site.exit_code_spec("web01"), ExitCodeSpec::default());
        assert!(site.snmp_without_sys_descr("old-switch"));
        assert!(!site.snmp_without_sys_descr("switch01"));
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(SiteConfig::from_toml_str("[[clusters]]\nname = 'c'\nnodes = ['x']\n").is_err());
        assert!(SiteConfig::from_toml_str("snmp_without_sys_descr = ['~(']").is_err());
        assert!(
            SiteConfig::from_toml_str(
                "[[manual_checks]]\ncheck_type = 'df'\nparams = 'open('\n"
            )
            .is_err()
        );
    }
}
