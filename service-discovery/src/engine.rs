//! The discovery engine.
//!
//! [`DiscoveryEngine`] bundles the settings, the check registry, the
//! autochecks store and the collaborators. The operations are implemented in
//! [`crate::discovery`], [`crate::preview`], [`crate::monitor`] and
//! [`crate::scheduler`].

use std::sync::Arc;

use autochecks::AutochecksStore;
use tracing::debug;

use crate::config::{DiscoveryCheckParams, DiscoverySettings};
use crate::domain::Host;
use crate::ports::{Clock, CoreControl, DataSource, HostInventory, RuleSet, SystemClock};
use crate::registry::CheckRegistry;
use crate::scheduler::MarkStore;
use crate::{Error, Result};

/// Service discovery for the hosts of one site.
pub struct DiscoveryEngine {
    pub(crate) settings: DiscoverySettings,
    pub(crate) registry: Arc<CheckRegistry>,
    pub(crate) store: AutochecksStore,
    pub(crate) marks: MarkStore,
    pub(crate) hosts: Arc<dyn HostInventory>,
    pub(crate) rules: Arc<dyn RuleSet>,
    pub(crate) data: Arc<dyn DataSource>,
    pub(crate) core: Arc<dyn CoreControl>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl DiscoveryEngine {
    pub fn builder(settings: DiscoverySettings) -> DiscoveryEngineBuilder {
        DiscoveryEngineBuilder::new(settings)
    }

    pub fn settings(&self) -> &DiscoverySettings {
        &self.settings
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    pub fn store(&self) -> &AutochecksStore {
        &self.store
    }

    pub fn marks(&self) -> &MarkStore {
        &self.marks
    }

    /// Look up a configured host.
    pub fn host(&self, name: &str) -> Result<Host> {
        self.hosts
            .host(name)
            .ok_or_else(|| Error::UnknownHost(name.to_string()))
    }

    /// Service description of a service.
    pub fn service_description(&self, check_type: &str, item: Option<&str>) -> String {
        self.registry.service_description(check_type, item)
    }

    /// Whether a check type is disabled globally or for a host.
    pub fn checktype_ignored(&self, host: &str, check_type: &str) -> bool {
        self.settings.ignored_checktypes.contains(check_type)
            || self
                .rules
                .ignored_checks(host)
                .iter()
                .any(|ct| ct == check_type)
    }

    /// Whether a service is disabled by check type or by description.
    pub fn service_ignored(
        &self,
        host: &str,
        check_type: Option<&str>,
        description: Option<&str>,
    ) -> bool {
        if check_type.is_some_and(|ct| self.settings.ignored_checktypes.contains(ct)) {
            return true;
        }
        if description.is_some_and(|d| self.rules.service_ignored(host, d)) {
            return true;
        }
        check_type.is_some_and(|ct| self.checktype_ignored(host, ct))
    }

    /// Whether the service with `description` found on `node` belongs to `host`.
    pub(crate) fn owned_by(&self, host: &str, node: &str, description: &str) -> bool {
        self.rules.host_of_clustered_service(node, description) == host
    }

    /// Parameters of the discovery check of a host: the first matching
    /// periodic discovery rule, else defaults when the legacy global interval
    /// is configured, else `None`.
    pub fn discovery_check_parameters(&self, host: &str) -> Option<DiscoveryCheckParams> {
        if let Some(params) = self.rules.periodic_discovery(host) {
            return Some(params);
        }
        self.settings
            .inventory_check_interval
            .map(|_| self.settings.default_check_parameters())
    }

    /// Like [`Self::discovery_check_parameters`] but never empty.
    pub fn effective_check_parameters(&self, host: &str) -> DiscoveryCheckParams {
        self.discovery_check_parameters(host).unwrap_or_else(|| {
            debug!(host, "No periodic discovery rule, using defaults");
            self.settings.default_check_parameters()
        })
    }
}

/// Builder for [`DiscoveryEngine`].
pub struct DiscoveryEngineBuilder {
    settings: DiscoverySettings,
    registry: Option<Arc<CheckRegistry>>,
    store: Option<AutochecksStore>,
    hosts: Option<Arc<dyn HostInventory>>,
    rules: Option<Arc<dyn RuleSet>>,
    data: Option<Arc<dyn DataSource>>,
    core: Option<Arc<dyn CoreControl>>,
    clock: Option<Arc<dyn Clock>>,
}

impl DiscoveryEngineBuilder {
    fn new(settings: DiscoverySettings) -> Self {
        Self {
            settings,
            registry: None,
            store: None,
            hosts: None,
            rules: None,
            data: None,
            core: None,
            clock: None,
        }
    }

    pub fn registry(mut self, registry: impl Into<Arc<CheckRegistry>>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    /// Override the store derived from the settings.
    pub fn store(mut self, store: AutochecksStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn hosts(mut self, hosts: Arc<dyn HostInventory>) -> Self {
        self.hosts = Some(hosts);
        self
    }

    pub fn rules(mut self, rules: Arc<dyn RuleSet>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn data_source(mut self, data: Arc<dyn DataSource>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn core(mut self, core: Arc<dyn CoreControl>) -> Self {
        self.core = Some(core);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<DiscoveryEngine> {
        let missing = |what: &str| Error::config(format!("discovery engine needs {what}"));
        let store = self.store.unwrap_or_else(|| {
            AutochecksStore::new(&self.settings.var_dir).strict(self.settings.debug)
        });
        let marks = MarkStore::new(self.settings.var_dir.join("autodiscovery"));

        Ok(DiscoveryEngine {
            registry: self.registry.ok_or_else(|| missing("a check registry"))?,
            hosts: self.hosts.ok_or_else(|| missing("a host inventory"))?,
            rules: self.rules.ok_or_else(|| missing("a rule set"))?,
            data: self.data.ok_or_else(|| missing("a data source"))?,
            core: self.core.ok_or_else(|| missing("core control"))?,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            store,
            marks,
            settings: self.settings,
        })
    }
}
