//! Processing of hosts queued for automatic rediscovery.

use std::fmt;

use chrono::{DateTime, Local, TimeDelta};
use serde::Serialize;
use tracing::{info, warn};

use crate::Result;
use crate::config::{DiscoveryCheckParams, MonitoringCore, RediscoveryParams};
use crate::discovery::{DiscoveryCounts, DiscoveryFailure};
use crate::domain::DiscoveryMode;
use crate::engine::DiscoveryEngine;

/// Why a queued host was not rediscovered in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    Disabled,
    ExcludedTime,
    GroupTime,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disabled => "automatic discovery disabled for this host",
            Self::ExcludedTime => "we are currently in a disallowed time of day",
            Self::GroupTime => "last activation is too recent",
        })
    }
}

/// What happened to one queued host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HostRediscovery {
    /// The host no longer exists; its mark was dropped.
    Removed,
    /// Not processed now; the mark stays.
    Skipped(SkipReason),
    Discovered {
        mode: DiscoveryMode,
        counts: DiscoveryCounts,
    },
    Failed(DiscoveryFailure),
}

/// How changed configuration was activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Activation {
    Reload,
    Restart,
}

/// Result of [`DiscoveryEngine::discover_marked_hosts`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct MarkedHostsReport {
    pub hosts: Vec<(String, HostRediscovery)>,
    /// The time budget ran out before all hosts were processed.
    pub budget_exhausted: bool,
    pub activation: Option<Activation>,
}

impl DiscoveryEngine {
    /// Rediscover the hosts queued by the discovery check.
    ///
    /// Hosts are processed in name order until the time budget is used up.
    /// The budget is checked before each host, so a started host always
    /// finishes. The mark of a processed host is removed whatever the
    /// outcome. When any host changed and asks for activation, the core is
    /// reloaded or restarted once at the end.
    pub fn discover_marked_hosts(&self) -> Result<MarkedHostsReport> {
        let mut report = MarkedHostsReport::default();

        if !self.marks.dir_exists() {
            info!(dir = %self.marks.dir().display(), "Nothing to do, mark directory is missing");
            return Ok(report);
        }

        let started = self.clock.now();
        let budget = TimeDelta::seconds(
            i64::try_from(self.settings.marked_host_discovery_timeout).unwrap_or(i64::MAX),
        );
        let oldest_queued = self
            .marks
            .oldest()?
            .map(DateTime::<Local>::from)
            .map_or(started, |oldest| oldest.min(started));

        let hosts = self.marks.hosts()?;
        if hosts.is_empty() {
            info!("Nothing to do, no hosts marked by the discovery check");
            return Ok(report);
        }

        let mut activation_required = false;
        for host in hosts {
            if !self.hosts.is_configured(&host) {
                self.marks.remove(&host)?;
                info!(host = %host, "Host does not exist in configuration, removing mark");
                report.hosts.push((host, HostRediscovery::Removed));
                continue;
            }

            if self.clock.now() - started >= budget {
                warn!(
                    timeout = self.settings.marked_host_discovery_timeout,
                    "Time budget used up, remaining hosts are processed next time"
                );
                report.budget_exhausted = true;
                break;
            }

            let params = self.effective_check_parameters(&host);
            let redisc = match may_rediscover(&params, started, oldest_queued) {
                Ok(redisc) => redisc,
                Err(reason) => {
                    info!(host = %host, %reason, "Skipped");
                    report.hosts.push((host, HostRediscovery::Skipped(reason)));
                    continue;
                }
            };

            let mode = redisc.mode.discovery_mode();
            info!(host = %host, %mode, "Doing discovery");
            let outcome = self.discover_on_host(mode, &host, params.inventory_check_do_scan, true);
            // A failing host must not be retried forever.
            self.marks.remove(&host)?;

            let result = match outcome?.into_result() {
                Err(failure) => {
                    warn!(host = %host, %failure, "Rediscovery failed");
                    HostRediscovery::Failed(failure)
                }
                Ok(counts) => {
                    if counts.changed() {
                        info!(host = %host, %counts, "Rediscovered");
                        activation_required |= redisc.activation;
                    } else {
                        info!(host = %host, "Nothing changed");
                    }
                    HostRediscovery::Discovered { mode, counts }
                }
            };
            report.hosts.push((host, result));
        }

        if activation_required {
            let activation = match self.settings.monitoring_core {
                MonitoringCore::Cmc => {
                    info!("Reloading monitoring core with updated configuration");
                    self.core.reload()?;
                    Activation::Reload
                }
                MonitoringCore::Nagios => {
                    info!("Restarting monitoring core with updated configuration");
                    self.core.restart()?;
                    Activation::Restart
                }
            };
            report.activation = Some(activation);
        }
        Ok(report)
    }
}

/// Decide whether a queued host may be rediscovered at `now`.
pub fn may_rediscover(
    params: &DiscoveryCheckParams,
    now: DateTime<Local>,
    oldest_queued: DateTime<Local>,
) -> std::result::Result<&RediscoveryParams, SkipReason> {
    let Some(redisc) = &params.inventory_rediscovery else {
        return Err(SkipReason::Disabled);
    };
    if redisc.excluded_time.iter().any(|window| window.contains(&now)) {
        return Err(SkipReason::ExcludedTime);
    }
    if (now - oldest_queued).num_seconds() < i64::try_from(redisc.group_time).unwrap_or(i64::MAX) {
        return Err(SkipReason::GroupTime);
    }
    Ok(redisc)
}
