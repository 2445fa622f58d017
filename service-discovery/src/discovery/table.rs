//! Service table reconciliation.
//!
//! The service table of a host classifies every service the host has or
//! could have: discovered, persisted, configured manually or by rules, and
//! ignored. Clusters combine the tables of their nodes.

use std::collections::btree_map::Entry;

use autochecks::{AutocheckRecord, ServiceKey};
use tracing::{debug, trace};

use super::{Diagnostics, DiscoveryOptions};
use crate::Result;
use crate::domain::{CheckSource, Host, ServiceEntry, ServiceTable};
use crate::engine::DiscoveryEngine;

/// Which persisted records take part in a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistedView<'a> {
    /// Everything in the autochecks files.
    #[default]
    AsStored,
    /// The autochecks files without the records owned by a host, as if they
    /// had been removed before the pass.
    WithoutOwnedBy(&'a str),
}

impl DiscoveryEngine {
    /// Compute the service table of a host or cluster.
    pub fn get_host_services(
        &self,
        host_name: &str,
        opts: &DiscoveryOptions,
        diag: &mut Diagnostics,
    ) -> Result<ServiceTable> {
        let host = self.host(host_name)?;
        self.host_services(&host, opts, diag, PersistedView::AsStored)
    }

    pub(crate) fn host_services(
        &self,
        host: &Host,
        opts: &DiscoveryOptions,
        diag: &mut Diagnostics,
        view: PersistedView<'_>,
    ) -> Result<ServiceTable> {
        let mut table = if host.is_cluster {
            self.cluster_services(host, opts, diag, view)?
        } else {
            self.node_services(host, opts, diag, view)?
        };
        self.merge_manual_services(&mut table, &host.name);
        debug!(host = %host.name, services = table.len(), "Computed service table");
        Ok(table)
    }

    /// Persisted records of `node` visible in a pass.
    pub(crate) fn persisted_records(
        &self,
        node: &str,
        view: PersistedView<'_>,
    ) -> Result<Vec<AutocheckRecord>> {
        let records = self.store.read(node)?;
        Ok(match view {
            PersistedView::AsStored => records,
            PersistedView::WithoutOwnedBy(owner) => records
                .into_iter()
                .filter(|r| !self.owns_record(owner, node, r))
                .collect(),
        })
    }

    /// Whether a record persisted on `node` belongs to `owner`.
    pub(crate) fn owns_record(&self, owner: &str, node: &str, record: &AutocheckRecord) -> bool {
        let description = self.service_description(record.check_type(), record.item());
        self.owned_by(owner, node, &description)
    }

    /// Discovered and persisted services of a plain host, classified as
    /// `new`, `old` or `vanished`.
    fn discovered_services(
        &self,
        host: &Host,
        opts: &DiscoveryOptions,
        diag: &mut Diagnostics,
        view: PersistedView<'_>,
    ) -> Result<ServiceTable> {
        let mut table = ServiceTable::new();
        for candidate in self.discover_services(host, None, opts, diag)? {
            table.insert(
                candidate.key,
                ServiceEntry::new(CheckSource::New, candidate.paramstring),
            );
        }

        for record in self.persisted_records(&host.name, view)? {
            match table.entry(record.key) {
                Entry::Occupied(mut slot) => {
                    *slot.get_mut() = ServiceEntry::new(CheckSource::Old, record.paramstring);
                }
                Entry::Vacant(slot) => {
                    slot.insert(ServiceEntry::new(CheckSource::Vanished, record.paramstring));
                }
            }
        }
        Ok(table)
    }

    fn node_services(
        &self,
        host: &Host,
        opts: &DiscoveryOptions,
        diag: &mut Diagnostics,
        view: PersistedView<'_>,
    ) -> Result<ServiceTable> {
        let discovered = self.discovered_services(host, opts, diag, view)?;

        let mut table = ServiceTable::new();
        for (key, mut entry) in discovered {
            let description = self.service_description(&key.check_type, key.item());
            if !self.owned_by(&host.name, &host.name, &description) {
                if entry.source == CheckSource::Vanished {
                    continue;
                }
                entry.source = entry.source.clustered();
            }
            table.insert(key, entry);
        }
        Ok(table)
    }

    /// Union of the node tables, restricted to services assigned to the
    /// cluster. Nodes are merged in configured order.
    fn cluster_services(
        &self,
        cluster: &Host,
        opts: &DiscoveryOptions,
        diag: &mut Diagnostics,
        view: PersistedView<'_>,
    ) -> Result<ServiceTable> {
        let mut table = ServiceTable::new();
        for node_name in &cluster.nodes {
            let node = self.host(node_name)?;
            for (key, entry) in self.discovered_services(&node, opts, diag, view)? {
                let description = self.service_description(&key.check_type, key.item());
                if !self.owned_by(&cluster.name, node_name, &description) {
                    continue;
                }
                match table.entry(key) {
                    Entry::Vacant(slot) => {
                        slot.insert(entry);
                    }
                    Entry::Occupied(mut slot) => merge_node_entry(slot.get_mut(), entry),
                }
            }
        }
        Ok(table)
    }

    /// Add manual and rule based checks, then apply ignore rules.
    fn merge_manual_services(&self, table: &mut ServiceTable, host: &str) {
        for manual in self.rules.manual_checks(host) {
            table.insert(
                manual.key,
                ServiceEntry::new(CheckSource::Manual, manual.params.repr()),
            );
        }

        for description in self.rules.legacy_checks(host) {
            table.insert(
                ServiceKey::with_item("legacy", description),
                ServiceEntry::new(CheckSource::Legacy, "None"),
            );
        }

        for description in self.rules.custom_checks(host) {
            table.insert(
                ServiceKey::with_item("custom", description),
                ServiceEntry::new(CheckSource::Custom, "None"),
            );
        }

        for active in self.rules.active_checks(host) {
            table.insert(
                ServiceKey::with_item(active.check_type, active.description),
                ServiceEntry::new(CheckSource::Active, active.params.repr()),
            );
        }

        // Rule based services are marked ignored by the preview only.
        for (key, entry) in table.iter_mut().filter(|(_, e)| !e.source.is_rule_based()) {
            let description = self.service_description(&key.check_type, key.item());
            if self.service_ignored(host, Some(&key.check_type), Some(&description)) {
                trace!(host, service = %description, "Service is ignored");
                entry.source = entry.source.ignored();
            }
        }
    }
}

/// Combine the entries two nodes report for the same service.
///
/// An `old` entry already in place stays. Otherwise an incoming `old` entry
/// replaces it. A `vanished` and a `new` entry make an `old` one with the
/// parameters of the `vanished` entry. In all other cases the entry already
/// in place stays.
pub fn merge_node_entry(existing: &mut ServiceEntry, incoming: ServiceEntry) {
    use CheckSource::{New, Old, Vanished};

    match (existing.source, incoming.source) {
        (Old, _) => {}
        (_, Old) => *existing = incoming,
        (Vanished, New) => existing.source = Old,
        (New, Vanished) => *existing = ServiceEntry::new(Old, incoming.paramstring),
        _ => {}
    }
}
