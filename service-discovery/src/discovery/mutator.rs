//! Discovery modes applied to the persisted autochecks.

use std::collections::BTreeMap;
use std::fmt;

use autochecks::{AutocheckRecord, ServiceKey};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::table::PersistedView;
use super::{Diagnostics, DiscoveryOptions, OnError};
use crate::Result;
use crate::domain::{CheckSource, DiscoveryMode, Host};
use crate::engine::DiscoveryEngine;

/// Changes made by one discovery pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DiscoveryCounts {
    pub added: usize,
    pub removed: usize,
    pub kept: usize,
    /// `added + kept`.
    pub total: usize,
}

impl DiscoveryCounts {
    pub fn new(added: usize, removed: usize, kept: usize) -> Self {
        Self {
            added,
            removed,
            kept,
            total: added + kept,
        }
    }

    /// Whether the pass changed the monitored services.
    pub fn changed(&self) -> bool {
        self.added > 0 || self.removed > 0
    }
}

impl fmt::Display for DiscoveryCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} new, {} removed, {} kept, {} total services",
            self.added, self.removed, self.kept, self.total
        )
    }
}

/// Why a discovery pass did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DiscoveryFailure {
    /// The host is not monitored.
    HostOffline,
    Failed(String),
}

impl fmt::Display for DiscoveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostOffline => f.write_str("host is offline"),
            Self::Failed(message) => f.write_str(message),
        }
    }
}

/// Result of [`DiscoveryEngine::discover_on_host`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryOutcome {
    pub counts: DiscoveryCounts,
    pub failure: Option<DiscoveryFailure>,
}

impl DiscoveryOutcome {
    fn failed(failure: DiscoveryFailure) -> Self {
        Self {
            counts: DiscoveryCounts::default(),
            failure: Some(failure),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }

    pub fn into_result(self) -> std::result::Result<DiscoveryCounts, DiscoveryFailure> {
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(self.counts),
        }
    }
}

impl DiscoveryEngine {
    /// Run one discovery pass in `mode` and persist the result.
    ///
    /// Failures are reported in the outcome with zeroed counts and nothing
    /// written. Internal invariant violations, and every error in debug
    /// mode, are returned instead. So is a timeout when running as a
    /// keepalive helper.
    pub fn discover_on_host(
        &self,
        mode: DiscoveryMode,
        host_name: &str,
        do_snmp_scan: bool,
        use_caches: bool,
    ) -> Result<DiscoveryOutcome> {
        let is_cluster = self.hosts.host(host_name).is_some_and(|h| h.is_cluster);
        if !is_cluster && !self.hosts.is_active_realhost(host_name) {
            debug!(host = host_name, "Host is not monitored");
            return Ok(DiscoveryOutcome::failed(DiscoveryFailure::HostOffline));
        }

        let opts = DiscoveryOptions::new(use_caches, do_snmp_scan, OnError::Ignore);
        let mut diag = Diagnostics::new();
        match self.apply_discovery(mode, host_name, &opts, &mut diag) {
            Ok(counts) => {
                info!(host = host_name, %mode, %counts, "Discovery finished");
                Ok(DiscoveryOutcome {
                    counts,
                    failure: None,
                })
            }
            Err(e) if e.is_fatal() || self.settings.debug => Err(e),
            Err(e) if e.is_timeout() && self.settings.keepalive => Err(e),
            Err(e) => {
                warn!(host = host_name, %mode, error = %e, "Discovery failed");
                Ok(DiscoveryOutcome::failed(DiscoveryFailure::Failed(e.to_string())))
            }
        }
    }

    fn apply_discovery(
        &self,
        mode: DiscoveryMode,
        host_name: &str,
        opts: &DiscoveryOptions,
        diag: &mut Diagnostics,
    ) -> Result<DiscoveryCounts> {
        let host = self.host(host_name)?;

        // Refresh starts from the autochecks without the host's own records.
        // They are dropped when the result is written.
        let (view, removed) = match mode {
            DiscoveryMode::Refresh => (
                PersistedView::WithoutOwnedBy(&host.name),
                self.count_owned_records(&host)?,
            ),
            _ => (PersistedView::AsStored, 0),
        };

        let table = self.host_services(&host, opts, diag, view)?;

        let mut added = 0;
        let mut removed = removed;
        let mut kept = 0;
        let mut items = BTreeMap::new();

        for (key, entry) in table {
            match entry.source {
                CheckSource::Manual | CheckSource::Legacy | CheckSource::Active | CheckSource::Custom => {}
                CheckSource::New => {
                    if mode != DiscoveryMode::Remove {
                        added += 1;
                        items.insert(key, entry.paramstring);
                    }
                }
                CheckSource::Old | CheckSource::Ignored => {
                    kept += 1;
                    items.insert(key, entry.paramstring);
                }
                CheckSource::Vanished | CheckSource::Obsolete => {
                    if matches!(mode, DiscoveryMode::FixAll | DiscoveryMode::Remove) {
                        removed += 1;
                    } else {
                        kept += 1;
                        items.insert(key, entry.paramstring);
                    }
                }
                CheckSource::ClusteredNew
                | CheckSource::ClusteredOld
                | CheckSource::ClusteredVanished
                | CheckSource::ClusteredIgnored => {
                    items.insert(key, entry.paramstring);
                }
            }
        }

        self.write_autochecks(&host, items, view)?;
        Ok(DiscoveryCounts::new(added, removed, kept))
    }

    fn count_owned_records(&self, host: &Host) -> Result<usize> {
        let nodes = self.owning_files(host);
        let mut count = 0;
        for node in nodes {
            count += self
                .store
                .read(node)?
                .iter()
                .filter(|r| self.owns_record(&host.name, node, r))
                .count();
        }
        Ok(count)
    }

    /// Hosts whose autochecks files hold the services of `host`.
    fn owning_files<'a>(&self, host: &'a Host) -> Vec<&'a str> {
        if host.is_cluster {
            host.nodes.iter().map(String::as_str).collect()
        } else {
            vec![host.name.as_str()]
        }
    }

    /// Replace the autochecks of a host or cluster with `items`.
    ///
    /// A cluster has no file of its own: every node keeps the records not
    /// assigned to the cluster and receives all of `items`. A plain host
    /// keeps the persisted parameters of records that stay.
    pub fn set_autochecks_of(&self, host_name: &str, items: BTreeMap<ServiceKey, String>) -> Result<()> {
        let host = self.host(host_name)?;
        self.write_autochecks(&host, items, PersistedView::AsStored)
    }

    fn write_autochecks(
        &self,
        host: &Host,
        items: BTreeMap<ServiceKey, String>,
        view: PersistedView<'_>,
    ) -> Result<()> {
        if host.is_cluster {
            for node in &host.nodes {
                let mut records: Vec<_> = self
                    .store
                    .read(node)?
                    .into_iter()
                    .filter(|r| !self.owns_record(&host.name, node, r))
                    .collect();
                records.extend(
                    items
                        .iter()
                        .map(|(key, params)| AutocheckRecord::new(key.clone(), params.clone())),
                );
                self.store.write(node, records)?;
            }
            return Ok(());
        }

        let mut remaining = items;
        let mut records = Vec::new();
        for record in self.persisted_records(&host.name, view)? {
            if remaining.remove(&record.key).is_some() {
                records.push(record);
            }
        }
        records.extend(
            remaining
                .into_iter()
                .map(|(key, params)| AutocheckRecord::new(key, params)),
        );
        self.store.write(&host.name, records)?;
        Ok(())
    }

    /// Remove the autochecks owned by a host or cluster. Returns the number
    /// of removed records.
    pub fn remove_autochecks_of(&self, host_name: &str) -> Result<usize> {
        let host = self.host(host_name)?;
        let mut removed = 0;
        for node in self.owning_files(&host) {
            removed += self
                .store
                .remove_matching(node, |r| self.owns_record(&host.name, node, r))?;
        }
        debug!(host = host_name, removed, "Removed autochecks");
        Ok(removed)
    }
}
