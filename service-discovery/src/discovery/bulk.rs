//! Command line discovery over many hosts.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use autochecks::AutocheckRecord;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{Diagnostics, DiscoveryOptions, OnError};
use crate::Result;
use crate::engine::DiscoveryEngine;

/// Result of discovery on one host of a bulk run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BulkHostResult {
    /// Number of added services per check type.
    Discovered(BTreeMap<String, usize>),
    Failed(String),
}

/// Result of [`DiscoveryEngine::discover_hosts`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkDiscoveryReport {
    /// Cached agent data was used.
    pub use_caches: bool,
    pub hosts: Vec<(String, BulkHostResult)>,
}

impl BulkDiscoveryReport {
    pub fn failed(&self) -> usize {
        self.hosts
            .iter()
            .filter(|(_, r)| matches!(r, BulkHostResult::Failed(_)))
            .count()
    }
}

impl DiscoveryEngine {
    /// Discover services on a list of hosts and update their autochecks.
    ///
    /// An empty list means all monitored hosts, using cached data. Clusters
    /// are replaced by their nodes. With `only_new` existing services are
    /// kept and new ones added. Otherwise the services of `check_types`, or
    /// all services when no check types are given, are replaced.
    pub fn discover_hosts(
        &self,
        hosts: &[String],
        check_types: &[String],
        only_new: bool,
    ) -> Result<BulkDiscoveryReport> {
        let use_caches = hosts.is_empty();
        let mut names: Vec<String> = if use_caches {
            self.hosts.active_realhosts()
        } else {
            hosts.to_vec()
        };

        let nodes: Vec<String> = names.iter().flat_map(|h| self.hosts.nodes_of(h)).collect();
        names.extend(nodes);
        let names: BTreeSet<String> = names
            .into_iter()
            .filter(|h| !self.hosts.host(h).is_some_and(|host| host.is_cluster))
            .collect();
        info!(hosts = names.len(), use_caches, "Discovering services");

        let on_error = if self.settings.debug {
            OnError::Raise
        } else {
            OnError::Warn
        };

        let mut report = BulkDiscoveryReport {
            use_caches,
            hosts: Vec::with_capacity(names.len()),
        };
        for name in names {
            match self.discover_host(&name, check_types, only_new, use_caches, on_error) {
                Ok(stats) => {
                    if stats.is_empty() {
                        info!(host = %name, "nothing{}", if only_new { " new" } else { "" });
                    }
                    for (check_type, count) in &stats {
                        info!(host = %name, check_type = %check_type, count, "Discovered services");
                    }
                    report.hosts.push((name, BulkHostResult::Discovered(stats)));
                }
                Err(e) if self.settings.debug => return Err(e),
                Err(e) => {
                    warn!(host = %name, error = %e, "Discovery failed");
                    report.hosts.push((name, BulkHostResult::Failed(e.to_string())));
                }
            }
        }
        Ok(report)
    }

    /// Discover one plain host and merge the result into its autochecks.
    /// Returns the number of added services per check type.
    pub fn discover_host(
        &self,
        host_name: &str,
        check_types: &[String],
        only_new: bool,
        use_caches: bool,
        on_error: OnError,
    ) -> Result<BTreeMap<String, usize>> {
        let host = self.host(host_name)?;
        // Hosts never discovered before are scanned even with cached data.
        let do_snmp_scan = !use_caches || !self.store.exists(host_name);
        let opts = DiscoveryOptions::new(use_caches, do_snmp_scan, on_error);
        let mut diag = Diagnostics::new();

        let filter = (!check_types.is_empty()).then_some(check_types);
        let discovered = self.discover_services(&host, filter, &opts, &mut diag)?;

        let mut result = BTreeMap::new();
        if only_new || !check_types.is_empty() {
            for record in self.store.read(host_name)? {
                if only_new || !check_types.iter().any(|ct| ct == record.check_type()) {
                    result.insert(record.key, record.paramstring);
                }
            }
        }

        let mut stats = BTreeMap::new();
        for candidate in discovered {
            if let Entry::Vacant(slot) = result.entry(candidate.key) {
                *stats.entry(slot.key().check_type.clone()).or_insert(0) += 1;
                slot.insert(candidate.paramstring);
            }
        }

        let records = result
            .into_iter()
            .map(|(key, params)| AutocheckRecord::new(key, params))
            .collect();
        self.store.write(host_name, records)?;
        debug!(host = host_name, diagnostics = diag.messages().len(), "Wrote autochecks");
        Ok(stats)
    }
}
