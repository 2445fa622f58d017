//! Check type registry.
//!
//! The registry describes the check plugins that discovery can invoke: their
//! discovery function, SNMP scan function, service description template and
//! a few flags. Plugins are registered once at startup; discovery only reads.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use autochecks::Value;

use crate::Result;
use crate::domain::{Host, State};
use crate::ports::DataSource;

/// Parsed section content: lines of words.
pub type Section = Vec<Vec<String>>;

/// Data handed to discovery and check functions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SectionInput {
    pub primary: Section,
    /// Auxiliary sections in declaration order; `None` when unavailable.
    pub extra: Vec<Option<Section>>,
}

impl SectionInput {
    pub fn new(primary: Section) -> Self {
        Self {
            primary,
            extra: Vec::new(),
        }
    }
}

/// Context of one discovery function call.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryContext<'a> {
    /// Host being discovered.
    pub host: &'a str,
    pub use_caches: bool,
}

/// Discovery function. Returns `None` or a list of `(item, params)` or
/// `(item, comment, params)` tuples.
pub type DiscoverFn =
    dyn Fn(&DiscoveryContext<'_>, &SectionInput) -> Result<Option<Vec<Value>>> + Send + Sync;

/// Discovery function of the older interface that also receives the check type.
pub type LegacyDiscoverFn =
    dyn Fn(&DiscoveryContext<'_>, &str, &SectionInput) -> Result<Option<Vec<Value>>> + Send + Sync;

/// SNMP scan function. Must return a bool, a string (non-empty means found)
/// or `None`.
pub type ScanFn = dyn Fn(&ScanContext<'_>) -> Result<Value> + Send + Sync;

/// Check function, used for the offline preview only.
pub type CheckFn =
    dyn Fn(Option<&str>, &Value, &SectionInput) -> Result<CheckResult> + Send + Sync;

/// Discovery function in one of the two supported interfaces. The variant is
/// fixed at registration.
#[derive(Clone)]
pub enum DiscoveryFunction {
    Legacy(Arc<LegacyDiscoverFn>),
    Modern(Arc<DiscoverFn>),
}

impl DiscoveryFunction {
    pub fn call(
        &self,
        ctx: &DiscoveryContext<'_>,
        check_type: &str,
        input: &SectionInput,
    ) -> Result<Option<Vec<Value>>> {
        match self {
            Self::Legacy(f) => f(ctx, check_type, input),
            Self::Modern(f) => f(ctx, input),
        }
    }
}

/// Result of a check function.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub state: State,
    pub output: String,
    pub perfdata: Vec<String>,
}

impl CheckResult {
    pub fn new(state: State, output: impl Into<String>) -> Self {
        Self {
            state,
            output: output.into(),
            perfdata: Vec::new(),
        }
    }

    pub fn with_perfdata(mut self, perfdata: impl Into<String>) -> Self {
        self.perfdata.push(perfdata.into());
        self
    }
}

/// OID access for scan functions.
///
/// Values are fetched at most once per scan. Preset values shadow the device.
pub struct ScanContext<'a> {
    host: &'a Host,
    data: &'a dyn DataSource,
    cache: RefCell<HashMap<String, Option<String>>>,
}

impl<'a> ScanContext<'a> {
    pub fn new(host: &'a Host, data: &'a dyn DataSource) -> Self {
        Self {
            host,
            data,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn host_name(&self) -> &str {
        &self.host.name
    }

    /// Fix the value of an OID for the rest of the scan.
    pub fn preset(&self, oid: &str, value: Option<String>) {
        self.cache.borrow_mut().insert(oid.to_string(), value);
    }

    /// Value of an OID, or `None` when the device has none.
    pub fn oid(&self, oid: &str) -> Result<Option<String>> {
        if let Some(value) = self.cache.borrow().get(oid) {
            return Ok(value.clone());
        }
        let value = self.data.get_single_oid(self.host, oid)?;
        self.cache
            .borrow_mut()
            .insert(oid.to_string(), value.clone());
        Ok(value)
    }

    /// Value of an OID with a fallback.
    pub fn oid_or(&self, oid: &str, default: &str) -> Result<String> {
        Ok(self.oid(oid)?.unwrap_or_else(|| default.to_string()))
    }
}

/// Which transport a check type uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Snmp,
    All,
}

/// Registry entry of one check type.
#[derive(Clone)]
pub struct CheckTypeDescriptor {
    pub name: String,
    pub discovery: Option<DiscoveryFunction>,
    pub scan: Option<Arc<ScanFn>>,
    pub check: Option<Arc<CheckFn>>,
    /// Service description template; `%s` is replaced by the item.
    pub service_description: String,
    /// Rule group of the check parameters.
    pub group: Option<String>,
    pub uses_snmp: bool,
    /// Call discovery even when an SNMP section is empty.
    pub handles_empty_data: bool,
    /// Sections passed in addition to the primary one.
    pub extra_sections: Vec<String>,
}

impl CheckTypeDescriptor {
    pub fn new(name: impl Into<String>, service_description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            discovery: None,
            scan: None,
            check: None,
            service_description: service_description.into(),
            group: None,
            uses_snmp: false,
            handles_empty_data: false,
            extra_sections: Vec::new(),
        }
    }

    pub fn discover<F>(mut self, f: F) -> Self
    where
        F: Fn(&DiscoveryContext<'_>, &SectionInput) -> Result<Option<Vec<Value>>>
            + Send
            + Sync
            + 'static,
    {
        self.discovery = Some(DiscoveryFunction::Modern(Arc::new(f)));
        self
    }

    pub fn discover_legacy<F>(mut self, f: F) -> Self
    where
        F: Fn(&DiscoveryContext<'_>, &str, &SectionInput) -> Result<Option<Vec<Value>>>
            + Send
            + Sync
            + 'static,
    {
        self.discovery = Some(DiscoveryFunction::Legacy(Arc::new(f)));
        self
    }

    /// Mark the check type as SNMP based.
    pub fn snmp(mut self) -> Self {
        self.uses_snmp = true;
        self
    }

    pub fn snmp_scan<F>(mut self, f: F) -> Self
    where
        F: Fn(&ScanContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.uses_snmp = true;
        self.scan = Some(Arc::new(f));
        self
    }

    pub fn check<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&str>, &Value, &SectionInput) -> Result<CheckResult> + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(f));
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn handles_empty_data(mut self) -> Self {
        self.handles_empty_data = true;
        self
    }

    pub fn extra_section(mut self, section: impl Into<String>) -> Self {
        self.extra_sections.push(section.into());
        self
    }

    /// Service description of an item of this check type.
    pub fn describe(&self, item: Option<&str>) -> String {
        if self.service_description.contains("%s") {
            self.service_description
                .replace("%s", item.unwrap_or_default())
        } else {
            self.service_description.clone()
        }
    }
}

impl fmt::Debug for CheckTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckTypeDescriptor")
            .field("name", &self.name)
            .field("service_description", &self.service_description)
            .field("group", &self.group)
            .field("uses_snmp", &self.uses_snmp)
            .field("handles_empty_data", &self.handles_empty_data)
            .field("extra_sections", &self.extra_sections)
            .field("has_discovery", &self.discovery.is_some())
            .field("has_scan", &self.scan.is_some())
            .finish()
    }
}

/// All known check types.
#[derive(Clone, Default)]
pub struct CheckRegistry {
    checks: BTreeMap<String, CheckTypeDescriptor>,
    /// Scan functions of inventory plugins, consulted by base name.
    inventory_scans: BTreeMap<String, Arc<ScanFn>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a check type, replacing an earlier one of the same name.
    pub fn register(&mut self, descriptor: CheckTypeDescriptor) -> &mut Self {
        self.checks.insert(descriptor.name.clone(), descriptor);
        self
    }

    pub fn with(mut self, descriptor: CheckTypeDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Add the scan function of an inventory plugin.
    pub fn register_inventory_scan<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&ScanContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.inventory_scans.insert(name.into(), Arc::new(f));
        self
    }

    pub fn get(&self, check_type: &str) -> Option<&CheckTypeDescriptor> {
        self.checks.get(check_type)
    }

    pub fn contains(&self, check_type: &str) -> bool {
        self.checks.contains_key(check_type)
    }

    /// Check types in name order.
    pub fn iter(&self) -> impl Iterator<Item = &CheckTypeDescriptor> {
        self.checks.values()
    }

    pub fn uses_snmp(&self, check_type: &str) -> bool {
        self.get(check_type).is_some_and(|d| d.uses_snmp)
    }

    /// Sorted names of check types with a discovery function for a transport.
    pub fn discoverable(&self, transport: Transport) -> Vec<String> {
        self.checks
            .values()
            .filter(|d| d.discovery.is_some())
            .filter(|d| match transport {
                Transport::All => true,
                Transport::Snmp => d.uses_snmp,
                Transport::Tcp => !d.uses_snmp,
            })
            .map(|d| d.name.clone())
            .collect()
    }

    /// Scan function of a check type: its own, else the one of its base
    /// name, else the one of an inventory plugin of that base name.
    pub fn scan_function(&self, check_type: &str) -> Option<&Arc<ScanFn>> {
        let base = autochecks::record::section_name(check_type);
        self.get(check_type)
            .and_then(|d| d.scan.as_ref())
            .or_else(|| self.get(base).and_then(|d| d.scan.as_ref()))
            .or_else(|| self.inventory_scans.get(base))
    }

    /// Service description of a service of a registered check type.
    pub fn service_description(&self, check_type: &str, item: Option<&str>) -> String {
        match (self.get(check_type), item) {
            (Some(descriptor), item) => descriptor.describe(item),
            (None, Some(item)) => format!("Unimplemented check {check_type} / {item}"),
            (None, None) => format!("Unimplemented check {check_type}"),
        }
    }
}

impl fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckRegistry")
            .field("checks", &self.checks.keys().collect::<Vec<_>>())
            .field("inventory_scans", &self.inventory_scans.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &DiscoveryContext<'_>, _: &SectionInput) -> Result<Option<Vec<Value>>> {
        Ok(None)
    }

    fn registry() -> CheckRegistry {
        CheckRegistry::new()
            .with(CheckTypeDescriptor::new("df", "Filesystem %s").discover(noop))
            .with(CheckTypeDescriptor::new("uptime", "Uptime").discover(noop))
            .with(
                CheckTypeDescriptor::new("hr_fs", "Filesystem %s")
                    .discover(noop)
                    .snmp_scan(|_| Ok(Value::Bool(true))),
            )
            .with(CheckTypeDescriptor::new("hr_fs.usage", "FS usage %s").snmp().discover(noop))
            .with(CheckTypeDescriptor::new("if", "Interface %s").snmp())
    }

    #[test]
    fn test_discoverable_by_transport() {
        let r = registry();
        assert_eq!(r.discoverable(Transport::Tcp), vec!["df", "uptime"]);
        assert_eq!(r.discoverable(Transport::Snmp), vec!["hr_fs", "hr_fs.usage"]);
        assert_eq!(r.discoverable(Transport::All).len(), 4);
    }

    #[test]
    fn test_scan_function_lookup() {
        let mut r = registry();
        assert!(r.scan_function("hr_fs").is_some());
        assert!(r.scan_function("hr_fs.usage").is_some());
        assert!(r.scan_function("if").is_none());

        r.register_inventory_scan("if", |_| Ok(Value::Bool(false)));
        assert!(r.scan_function("if").is_some());
    }

    #[test]
    fn test_service_description() {
        let r = registry();
        assert_eq!(r.service_description("df", Some("/var")), "Filesystem /var");
        assert_eq!(r.service_description("uptime", None), "Uptime");
        assert_eq!(r.service_description("df", Some("")), "Filesystem ");
        assert_eq!(r.service_description("nope", Some("x")), "Unimplemented check nope / x");
    }
}
