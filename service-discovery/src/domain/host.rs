//! Monitored hosts as seen by discovery.

use serde::{Deserialize, Serialize};

/// A host or cluster known to the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    /// Clusters own no autochecks themselves; their services live on the nodes.
    pub is_cluster: bool,
    /// Node host names in configured order. Empty for plain hosts.
    pub nodes: Vec<String>,
    /// Monitored via SNMP.
    pub snmp: bool,
    /// Monitored via the TCP agent.
    pub tcp: bool,
}

impl Host {
    /// A plain host monitored by its agent.
    pub fn agent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_cluster: false,
            nodes: Vec::new(),
            snmp: false,
            tcp: true,
        }
    }

    /// A plain host monitored via SNMP only.
    pub fn snmp(name: impl Into<String>) -> Self {
        Self {
            snmp: true,
            tcp: false,
            ..Self::agent(name)
        }
    }

    /// A cluster of the given nodes.
    pub fn cluster(name: impl Into<String>, nodes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            is_cluster: true,
            nodes: nodes.into_iter().map(Into::into).collect(),
            snmp: false,
            tcp: false,
        }
    }

    pub fn with_snmp(mut self, snmp: bool) -> Self {
        self.snmp = snmp;
        self
    }

    pub fn with_tcp(mut self, tcp: bool) -> Self {
        self.tcp = tcp;
        self
    }
}
