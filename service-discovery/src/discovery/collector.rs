//! Candidate collection.
//!
//! Resolves the check types of a host, fetches their sections and runs the
//! discovery functions. The result is the list of services the host could
//! have right now, independent of what is persisted.

use autochecks::Value;
use autochecks::record::section_name;
use tracing::{debug, trace};

use super::{Diagnostics, DiscoveryOptions};
use crate::domain::{Host, ServiceCandidate};
use crate::engine::DiscoveryEngine;
use crate::registry::{CheckRegistry, CheckTypeDescriptor, DiscoveryContext, SectionInput, Transport};
use crate::{Error, Result};

impl DiscoveryEngine {
    /// Discover the services of a plain host.
    ///
    /// Without `check_types` the types are determined automatically: by an
    /// SNMP scan (or the SNMP types already persisted when scanning is not
    /// allowed) for SNMP hosts, plus all discoverable agent types for agent
    /// and piggyback hosts.
    pub fn discover_services(
        &self,
        host: &Host,
        check_types: Option<&[String]>,
        opts: &DiscoveryOptions,
        diag: &mut Diagnostics,
    ) -> Result<Vec<ServiceCandidate>> {
        let check_types = match check_types {
            Some(types) if !types.is_empty() => types.to_vec(),
            _ => self.default_check_types(host, opts, diag)?,
        };
        debug!(host = %host.name, check_types = ?check_types, "Discovering services");

        let ctx = DiscoveryContext {
            host: &host.name,
            use_caches: opts.use_caches,
        };

        let mut found = Vec::new();
        for check_type in &check_types {
            match self.discover_check_type(host, check_type, &ctx, opts, diag) {
                Ok(candidates) => found.extend(candidates),
                Err(e) if self.settings.debug || passes_through(&e) => return Err(e),
                Err(e) => return Err(Error::plugin(check_type.as_str(), e.to_string())),
            }
        }
        Ok(found)
    }

    fn default_check_types(
        &self,
        host: &Host,
        opts: &DiscoveryOptions,
        diag: &mut Diagnostics,
    ) -> Result<Vec<String>> {
        let mut check_types = Vec::new();

        if host.snmp {
            if opts.do_snmp_scan {
                match self.snmp_scan(host, opts.on_error, diag) {
                    Ok(types) => check_types = types,
                    Err(e) if e.is_timeout() => return Err(e),
                    Err(e) => opts.on_error.handle(diag, "SNMP scan failed", e)?,
                }
            } else {
                for record in self.store.read(&host.name)? {
                    let check_type = record.check_type();
                    if self.registry.uses_snmp(check_type)
                        && !check_types.iter().any(|ct| ct == check_type)
                    {
                        check_types.push(check_type.to_string());
                    }
                }
            }
        }

        if host.tcp || self.data.has_piggyback_data(&host.name) {
            check_types.extend(self.registry.discoverable(Transport::Tcp));
        }
        Ok(check_types)
    }

    fn discover_check_type(
        &self,
        host: &Host,
        check_type: &str,
        ctx: &DiscoveryContext<'_>,
        opts: &DiscoveryOptions,
        diag: &mut Diagnostics,
    ) -> Result<Vec<ServiceCandidate>> {
        if self.service_ignored(&host.name, Some(check_type), None) {
            trace!(host = %host.name, check_type, "Check type is ignored");
            return Ok(Vec::new());
        }

        let uses_snmp = self.registry.uses_snmp(check_type);
        if uses_snmp && !host.snmp {
            return Ok(Vec::new());
        }

        let descriptor = self
            .registry
            .get(check_type)
            .ok_or_else(|| Error::UnknownCheckType(check_type.to_string()))?;
        let Some(discovery) = &descriptor.discovery else {
            return Ok(Vec::new());
        };

        let Some(input) = self.section_input(host, descriptor, opts.use_caches)? else {
            trace!(host = %host.name, check_type, "No data");
            return Ok(Vec::new());
        };
        if input.primary.is_empty() && uses_snmp && !descriptor.handles_empty_data {
            return Ok(Vec::new());
        }

        let entries = match discovery.call(ctx, check_type, &input) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(e) if e.is_timeout() => return Err(e),
            Err(e) => {
                let context = format!("Exception in discovery function of check type '{check_type}'");
                opts.on_error.handle(diag, &context, e)?;
                return Ok(Vec::new());
            }
        };

        let mut candidates = Vec::with_capacity(entries.len());
        for entry in entries {
            match candidate_from_entry(&self.registry, check_type, entry) {
                Ok(candidate) => candidates.push(candidate),
                Err(reason) => diag.warn(format!(
                    "{}: Check {check_type} returned invalid discovery data ({reason})",
                    host.name
                )),
            }
        }
        Ok(candidates)
    }

    /// Fetch the primary and auxiliary sections of a check type.
    ///
    /// `None` means the host has no data for the check type. Auxiliary
    /// sections that cannot be fetched are passed as `None`.
    pub(crate) fn section_input(
        &self,
        host: &Host,
        descriptor: &CheckTypeDescriptor,
        use_caches: bool,
    ) -> Result<Option<SectionInput>> {
        let section = section_name(&descriptor.name);
        let max_age = self.settings.max_cache_age(use_caches);

        let primary = match self.data.fetch_section(host, section, max_age) {
            Ok(primary) => primary,
            Err(e @ Error::SectionParse { .. }) if !self.settings.debug => {
                debug!(host = %host.name, %e, "Ignoring unparsable section");
                None
            }
            Err(e) => return Err(e),
        };
        let Some(primary) = primary else {
            return Ok(None);
        };

        let extra_sections = self
            .registry
            .get(section)
            .map_or(&descriptor.extra_sections, |d| &d.extra_sections);

        let mut input = SectionInput::new(primary);
        for extra in extra_sections {
            let data = match self.data.fetch_section(host, extra, max_age) {
                Ok(data) => data,
                Err(e) if e.is_timeout() => return Err(e),
                Err(e) if e.is_transport() => None,
                Err(e) if self.settings.debug => return Err(e),
                Err(e) => {
                    debug!(host = %host.name, section = %extra, %e, "Auxiliary section unavailable");
                    None
                }
            };
            input.extra.push(data);
        }
        Ok(Some(input))
    }
}

/// Errors that leave candidate collection unchanged.
fn passes_through(err: &Error) -> bool {
    err.is_transport() || err.is_timeout() || err.is_fatal() || matches!(err, Error::ScanAborted(_))
}

/// Validate one entry returned by a discovery function.
///
/// Accepted are `(item, params)` and `(item, comment, params)` with a text
/// or `None` item. Text parameters are taken as the parameter literal with
/// surrounding whitespace removed, anything else is serialized. The result
/// must survive a write and read of the autochecks file.
pub(crate) fn candidate_from_entry(
    registry: &CheckRegistry,
    check_type: &str,
    entry: Value,
) -> std::result::Result<ServiceCandidate, String> {
    let fields = match entry {
        Value::Tuple(fields) => fields,
        other => return Err(format!("entry not a tuple: {other}")),
    };
    let (item, params) = match fields.as_slice() {
        [item, params] | [item, _, params] => (item, params),
        _ => {
            return Err(format!(
                "not 2 or 3 elements: {}",
                Value::Tuple(fields.clone())
            ));
        }
    };

    let item = match item {
        Value::Str(s) => Some(s.clone()),
        Value::None => None,
        other => return Err(format!("item of type {} is not text", other.type_name())),
    };
    let paramstring = match params {
        Value::Str(s) if s.trim().is_empty() => return Err("empty parameter text".to_string()),
        Value::Str(s) if s.contains(['\n', '\r']) => {
            return Err("line break in parameter text".to_string());
        }
        Value::Str(s) => s.trim().to_string(),
        other => other.repr(),
    };

    if registry
        .service_description(check_type, item.as_deref())
        .is_empty()
    {
        return Err("empty service description".to_string());
    }

    let candidate = ServiceCandidate::new(check_type, item, paramstring);
    candidate.clone().into_record().validate()?;
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CheckTypeDescriptor;

    fn registry() -> CheckRegistry {
        CheckRegistry::new()
            .with(CheckTypeDescriptor::new("df", "Filesystem %s"))
            .with(CheckTypeDescriptor::new("ps", "%s"))
    }

    #[test]
    fn test_two_and_three_tuples() {
        let r = registry();
        let c = candidate_from_entry(
            &r,
            "df",
            Value::tuple([Value::str("/"), Value::str("{}")]),
        )
        .unwrap();
        assert_eq!(c.key.item(), Some("/"));
        assert_eq!(c.paramstring, "{}");

        let c = candidate_from_entry(
            &r,
            "df",
            Value::tuple([Value::str("/var"), Value::str("comment"), Value::dict([("levels", Value::Int(80))])]),
        )
        .unwrap();
        assert_eq!(c.paramstring, "{'levels': 80}");
    }

    #[test]
    fn test_none_item() {
        let r = registry();
        let c = candidate_from_entry(&r, "df", Value::tuple([Value::None, Value::None])).unwrap();
        assert_eq!(c.key.item(), None);
        assert_eq!(c.paramstring, "None");
    }

    #[test]
    fn test_contract_violations() {
        let r = registry();
        assert!(candidate_from_entry(&r, "df", Value::str("x")).is_err());
        assert!(candidate_from_entry(&r, "df", Value::tuple([Value::str("x")])).is_err());
        assert!(candidate_from_entry(&r, "df", Value::tuple([Value::Int(1), Value::None])).is_err());

        let err = candidate_from_entry(&r, "ps", Value::tuple([Value::str(""), Value::None])).unwrap_err();
        assert!(err.contains("empty service description"));
    }

    #[test]
    fn test_unwritable_parameter_text() {
        let r = registry();
        let entry = |params: &str| Value::tuple([Value::str("x"), Value::str(params)]);

        let err = candidate_from_entry(&r, "df", entry("")).unwrap_err();
        assert!(err.contains("empty parameter text"));
        assert!(candidate_from_entry(&r, "df", entry("  ")).is_err());

        let err = candidate_from_entry(&r, "df", entry("{'a': 1,\n'b': 2}")).unwrap_err();
        assert!(err.contains("line break"));
        assert!(candidate_from_entry(&r, "df", entry("{}\r")).is_err());
        assert!(candidate_from_entry(&r, "df", entry("5 # five")).is_err());

        let c = candidate_from_entry(&r, "df", entry(" df_default_levels ")).unwrap();
        assert_eq!(c.paramstring, "df_default_levels");
    }
}
