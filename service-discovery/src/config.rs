//! Discovery settings and rule values.
//!
//! Global settings are read from a TOML file. Every field has a default, so
//! an empty file is a valid configuration.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{RediscoveryMode, State, TimeWindow};
use crate::{Error, Result};

/// Default budget for processing marked hosts, in seconds.
pub const DEFAULT_MARKED_HOST_DISCOVERY_TIMEOUT: u64 = 120;

/// Default maximum age of cached agent data used by discovery, in seconds.
pub const DEFAULT_MAX_CACHEFILE_AGE: u64 = 120;

/// Kind of monitoring core; decides how changed configuration is activated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MonitoringCore {
    /// Needs a full restart.
    #[default]
    Nagios,
    /// Supports reloading its configuration.
    Cmc,
}

/// Global discovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Root of the persisted state (autochecks, marks, crash reports).
    pub var_dir: PathBuf,
    /// Host and rule configuration file.
    pub site_config: PathBuf,
    /// Legacy global switch: when set, hosts without a periodic discovery
    /// rule get default discovery check parameters.
    pub inventory_check_interval: Option<u64>,
    /// Status for unmonitored services when no rule says otherwise.
    pub inventory_check_severity: State,
    pub inventory_check_do_scan: bool,
    /// Maximum age of cached agent data when discovery uses caches.
    pub inventory_max_cachefile_age: u64,
    /// Wall-clock budget of one run over the marked hosts, in seconds.
    pub marked_host_discovery_timeout: u64,
    pub monitoring_core: MonitoringCore,
    /// Check types never discovered on any host.
    pub ignored_checktypes: BTreeSet<String>,
    /// Command used to reload the core configuration.
    pub reload_command: Vec<String>,
    /// Command used to restart the core.
    pub restart_command: Vec<String>,
    /// Propagate errors unmodified instead of mapping them to messages.
    pub debug: bool,
    /// Running inside a long-lived check helper.
    pub keepalive: bool,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            var_dir: PathBuf::from("var"),
            site_config: PathBuf::from("site.toml"),
            inventory_check_interval: None,
            inventory_check_severity: State::Warn,
            inventory_check_do_scan: true,
            inventory_max_cachefile_age: DEFAULT_MAX_CACHEFILE_AGE,
            marked_host_discovery_timeout: DEFAULT_MARKED_HOST_DISCOVERY_TIMEOUT,
            monitoring_core: MonitoringCore::default(),
            ignored_checktypes: BTreeSet::new(),
            reload_command: vec!["omd".into(), "reload".into(), "core".into()],
            restart_command: vec!["omd".into(), "restart".into(), "core".into()],
            debug: false,
            keepalive: false,
        }
    }
}

impl DiscoverySettings {
    /// Load settings from a TOML file. Relative paths inside the file are
    /// resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::io_path("reading", path, e))?;
        let mut settings = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            settings.var_dir = base.join(&settings.var_dir);
            settings.site_config = base.join(&settings.site_config);
        }
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("invalid settings: {e}")))
    }

    /// Discovery check parameters used when no rule applies to a host.
    pub fn default_check_parameters(&self) -> DiscoveryCheckParams {
        DiscoveryCheckParams {
            check_interval: self.inventory_check_interval,
            severity_unmonitored: Some(self.inventory_check_severity),
            severity_vanished: Some(State::Ok),
            inventory_check_do_scan: self.inventory_check_do_scan,
            inventory_rediscovery: None,
        }
    }

    /// Maximum accepted age of cached data for a discovery run.
    pub fn max_cache_age(&self, use_caches: bool) -> u64 {
        if use_caches {
            self.inventory_max_cachefile_age
        } else {
            0
        }
    }
}

/// Value of a periodic discovery rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryCheckParams {
    /// Interval of the discovery check in minutes.
    #[serde(default)]
    pub check_interval: Option<u64>,
    #[serde(default)]
    pub severity_unmonitored: Option<State>,
    #[serde(default)]
    pub severity_vanished: Option<State>,
    #[serde(default = "default_true")]
    pub inventory_check_do_scan: bool,
    /// Automatic rediscovery; disabled when absent.
    #[serde(default)]
    pub inventory_rediscovery: Option<RediscoveryParams>,
}

impl DiscoveryCheckParams {
    pub fn validate(&self) -> Result<()> {
        if let Some(redisc) = &self.inventory_rediscovery {
            for window in &redisc.excluded_time {
                window.validate().map_err(Error::config)?;
            }
        }
        Ok(())
    }
}

/// Automatic rediscovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RediscoveryParams {
    pub mode: RediscoveryMode,
    /// Minimum age of the oldest queued mark before hosts are processed, in seconds.
    #[serde(default)]
    pub group_time: u64,
    /// Times of day during which no rediscovery happens.
    #[serde(default)]
    pub excluded_time: Vec<TimeWindow>,
    /// Activate changes in the core after a successful rediscovery.
    #[serde(default = "default_true")]
    pub activation: bool,
}

/// States reported when discovery itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitCodeSpec {
    pub connection: State,
    pub timeout: State,
    pub exception: State,
}

impl Default for ExitCodeSpec {
    fn default() -> Self {
        Self {
            connection: State::Warn,
            timeout: State::Crit,
            exception: State::Unknown,
        }
    }
}

fn default_true() -> bool {
    true
}
