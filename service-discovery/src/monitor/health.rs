//! The discovery check.
//!
//! An active check that compares the current discovery result with the
//! monitored services and reports unmonitored and vanished services. When
//! automatic rediscovery is configured it queues the host for the scheduler.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, error, warn};

use super::crash::CrashReport;
use crate::config::DiscoveryCheckParams;
use crate::discovery::{Diagnostics, DiscoveryOptions, OnError, PersistedView};
use crate::domain::{CheckSource, ServiceTable, State};
use crate::engine::DiscoveryEngine;
use crate::{Error, Result};

/// Status and plugin output of the discovery check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub state: State,
    /// Summary line, then one line per affected service, newline terminated.
    pub output: String,
}

impl CheckOutcome {
    pub fn new(state: State, output: impl Into<String>) -> Self {
        Self {
            state,
            output: output.into(),
        }
    }

    /// Output in plugin convention: `<STATUS> - <summary>`.
    pub fn render(&self) -> String {
        format!("{} - {}", self.state.as_str(), self.output)
    }
}

impl DiscoveryEngine {
    /// Run the discovery check of a host.
    ///
    /// Failures are mapped to the states of the host's exit code rule.
    /// Unexpected failures also write a crash report. In debug mode those
    /// are returned instead, as is a timeout when running as a keepalive
    /// helper.
    pub fn check_discovery(&self, host_name: &str, use_caches: bool) -> Result<CheckOutcome> {
        let params = self.effective_check_parameters(host_name);
        match self.evaluate_discovery(host_name, use_caches, &params) {
            Ok(outcome) => Ok(outcome),
            Err(e) => self.discovery_check_failure(host_name, e),
        }
    }

    fn evaluate_discovery(
        &self,
        host_name: &str,
        use_caches: bool,
        params: &DiscoveryCheckParams,
    ) -> Result<CheckOutcome> {
        let host = self.host(host_name)?;
        let opts = DiscoveryOptions::new(use_caches, params.inventory_check_do_scan, OnError::Raise);
        let mut diag = Diagnostics::new();
        let table = self.host_services(&host, &opts, &mut diag, PersistedView::AsStored)?;

        let axes = [
            (
                CheckSource::New,
                "unmonitored",
                params
                    .severity_unmonitored
                    .unwrap_or(self.settings.inventory_check_severity),
            ),
            (
                CheckSource::Vanished,
                "vanished",
                params.severity_vanished.unwrap_or(State::Ok),
            ),
        ];

        let mut state = State::Ok;
        let mut infotexts = Vec::new();
        let mut details = Vec::new();
        let mut need_rediscovery = false;

        for (source, title, severity) in axes {
            let affected = self.affected_services(&table, source, title, &mut details);
            if affected.is_empty() {
                infotexts.push(format!("no {title} services found"));
                continue;
            }

            let count: usize = affected.values().sum();
            let per_type = affected
                .iter()
                .map(|(check_type, n)| format!("{check_type}:{n}"))
                .collect::<Vec<_>>()
                .join(", ");
            state = state.worst(severity);
            infotexts.push(format!(
                "{count} {title} services ({per_type}){}",
                severity.marker()
            ));

            if let Some(redisc) = &params.inventory_rediscovery {
                let triggers = match source {
                    CheckSource::New => redisc.mode.triggers_on_new(),
                    _ => redisc.mode.triggers_on_vanished(),
                };
                need_rediscovery |= triggers;
            }
        }

        self.marks.set(host_name, need_rediscovery)?;
        if need_rediscovery {
            infotexts.push("rediscovery scheduled".to_string());
        }

        let mut output = infotexts.join(", ");
        if !details.is_empty() {
            output.push('\n');
            output.push_str(&details.join("\n"));
        }
        output.push('\n');

        debug!(host = host_name, %state, "Discovery check finished");
        Ok(CheckOutcome::new(state, output))
    }

    /// Count the services with `source` per check type and add a detail
    /// line for each.
    fn affected_services<'t>(
        &self,
        table: &'t ServiceTable,
        source: CheckSource,
        title: &str,
        details: &mut Vec<String>,
    ) -> BTreeMap<&'t str, usize> {
        let mut affected = BTreeMap::new();
        for (key, entry) in table.iter().filter(|(_, e)| e.source == source) {
            *affected.entry(key.check_type.as_str()).or_insert(0) += 1;
            details.push(format!(
                "{title}: {}: {}",
                key.check_type,
                self.service_description(&key.check_type, key.item())
            ));
        }
        affected
    }

    fn discovery_check_failure(&self, host_name: &str, err: Error) -> Result<CheckOutcome> {
        let spec = self.rules.exit_code_spec(host_name);

        if err.is_transport() || matches!(err, Error::UnknownHost(_)) {
            warn!(host = host_name, error = %err, "Discovery failed");
            return Ok(CheckOutcome::new(
                spec.connection,
                format!("Discovery failed: {err}\n"),
            ));
        }

        if err.is_timeout() {
            if self.settings.keepalive {
                return Err(err);
            }
            return Ok(CheckOutcome::new(spec.timeout, "Discovery failed: Timed out\n"));
        }

        let report = CrashReport::new("discovery", host_name, &err, self.clock.now());
        let written = report.write(&self.settings.var_dir);
        if self.settings.debug || err.is_fatal() {
            return Err(err);
        }

        error!(host = host_name, error = %err, "Discovery crashed");
        let output = match written {
            Ok(path) => format!(
                "Discovery failed: {err} (crash report: {})\n",
                path.display()
            ),
            Err(write_err) => {
                warn!(host = host_name, error = %write_err, "Cannot write crash report");
                format!("Discovery failed: {err}\n")
            }
        };
        Ok(CheckOutcome::new(spec.exception, output))
    }
}
