//! Service preview.
//!
//! Joins the service table of a host with check type metadata and the result
//! of one offline check run per service, as shown before discovery results
//! are accepted.

use autochecks::Value;
use serde::Serialize;
use tracing::debug;

use crate::discovery::{Diagnostics, DiscoveryOptions, PersistedView};
use crate::domain::{CheckSource, Host, State};
use crate::engine::DiscoveryEngine;
use crate::registry::{CheckResult, CheckTypeDescriptor, SectionInput};
use crate::{Error, Result};

/// One row of the service preview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewRow {
    pub source: CheckSource,
    pub check_type: String,
    /// Rule group of the check parameters.
    pub group: Option<String>,
    pub item: Option<String>,
    pub paramstring: String,
    /// Decoded parameters, when they form a literal.
    #[serde(skip)]
    pub params: Option<Value>,
    pub description: String,
    /// `None` while the service cannot be checked offline.
    pub state: Option<State>,
    pub output: String,
    pub perfdata: Vec<String>,
}

impl DiscoveryEngine {
    /// Build the service preview of a host or cluster.
    ///
    /// Services of unregistered check types are left out.
    pub fn check_preview(&self, host_name: &str, opts: &DiscoveryOptions) -> Result<Vec<PreviewRow>> {
        let host = self.host(host_name)?;
        let mut diag = Diagnostics::new();
        let table = self.host_services(&host, opts, &mut diag, PersistedView::AsStored)?;

        let mut rows = Vec::with_capacity(table.len());
        for (key, entry) in table {
            let item = key.item().map(str::to_string);

            if entry.source.is_rule_based() {
                let description = item.clone().unwrap_or_default();
                let params = match entry.source {
                    CheckSource::Active => Value::parse(&entry.paramstring).ok(),
                    _ => None,
                };
                let output = format!(
                    "WAITING - {} check, cannot be done offline",
                    title_case(entry.source.as_str())
                );
                let source = if self.service_ignored(&host.name, None, Some(&description)) {
                    CheckSource::Ignored
                } else {
                    entry.source
                };
                rows.push(PreviewRow {
                    source,
                    check_type: key.check_type,
                    group: None,
                    item,
                    paramstring: entry.paramstring,
                    params,
                    description,
                    state: None,
                    output,
                    perfdata: Vec::new(),
                });
                continue;
            }

            let Some(descriptor) = self.registry.get(&key.check_type) else {
                debug!(host = host_name, check_type = %key.check_type, "Skipping unregistered check type");
                continue;
            };
            let description = descriptor.describe(item.as_deref());

            let (params, result) = match Value::parse(&entry.paramstring) {
                Ok(params) => {
                    let result = self.preview_check(&host, descriptor, item.as_deref(), &params)?;
                    (Some(params), result)
                }
                Err(e) => {
                    let err = Error::InvalidParameters {
                        paramstring: entry.paramstring.clone(),
                        reason: e.to_string(),
                    };
                    (None, CheckResult::new(State::Unknown, format!("UNKNOWN - {err}")))
                }
            };

            rows.push(PreviewRow {
                source: entry.source,
                check_type: key.check_type,
                group: descriptor.group.clone(),
                item,
                paramstring: entry.paramstring,
                params,
                description,
                state: Some(result.state),
                output: result.output,
                perfdata: result.perfdata,
            });
        }
        Ok(rows)
    }

    /// Run the check function of a service once on current data.
    fn preview_check(
        &self,
        host: &Host,
        descriptor: &CheckTypeDescriptor,
        item: Option<&str>,
        params: &Value,
    ) -> Result<CheckResult> {
        let Some(check) = &descriptor.check else {
            return Ok(CheckResult::new(
                State::Unknown,
                "UNKNOWN - Check has no check function",
            ));
        };

        let section = autochecks::record::section_name(&descriptor.name);
        let input = match self.preview_input(host, descriptor) {
            Ok(input) => input.unwrap_or_default(),
            Err(e) if e.is_timeout() => return Err(e),
            Err(e @ Error::Agent(_)) => {
                return Ok(CheckResult::new(
                    State::Unknown,
                    format!("Error getting data from agent: {e}"),
                ));
            }
            Err(e @ Error::Snmp(_)) => {
                return Ok(CheckResult::new(
                    State::Unknown,
                    format!("Error getting data from agent for {section} via SNMP: {e}"),
                ));
            }
            Err(e) => {
                return Ok(CheckResult::new(
                    State::Unknown,
                    format!("Error getting data for {section}: {e}"),
                ));
            }
        };

        match check(item, params, &input) {
            Ok(result) => Ok(result),
            Err(e) if self.settings.debug || e.is_timeout() => Err(e),
            Err(e) => {
                debug!(host = %host.name, check_type = %descriptor.name, error = %e, "Check failed");
                Ok(CheckResult::new(
                    State::Unknown,
                    "UNKNOWN - invalid output from agent or error in check implementation",
                ))
            }
        }
    }

    /// Cached data of a check type. A cluster uses the first node that has
    /// the section.
    fn preview_input(&self, host: &Host, descriptor: &CheckTypeDescriptor) -> Result<Option<SectionInput>> {
        if !host.is_cluster {
            return self.section_input(host, descriptor, true);
        }
        for node_name in &host.nodes {
            let node = self.host(node_name)?;
            if let Some(input) = self.section_input(&node, descriptor, true)? {
                return Ok(Some(input));
            }
        }
        Ok(None)
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
