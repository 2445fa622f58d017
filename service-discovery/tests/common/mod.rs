//! Shared fixtures for the integration tests.
//!
//! Hosts and rules come from a TOML site description. Agent and SNMP data,
//! core control and the clock are in-memory fakes.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use autochecks::{AutocheckRecord, ServiceKey, Value};
use chrono::{DateTime, Local, TimeDelta};
use parking_lot::{Mutex, RwLock};
use service_discovery::ports::{Clock, CoreControl, DataSource};
use service_discovery::site::SiteConfig;
use service_discovery::{
    CheckRegistry, CheckResult, CheckTypeDescriptor, DiscoveryEngine, DiscoverySettings, Error, Host, Result,
    Section, State,
};
use tempfile::TempDir;

/// Failure injected into [`FakeData`] for one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Agent,
    Snmp,
    Timeout,
}

impl Failure {
    fn error(self, host: &str) -> Error {
        match self {
            Self::Agent => Error::agent(format!("Cannot get information from agent of {host}")),
            Self::Snmp => Error::snmp(format!("No response from SNMP agent of {host}")),
            Self::Timeout => Error::CheckTimeout,
        }
    }
}

/// In-memory agent and SNMP data.
#[derive(Debug, Default)]
pub struct FakeData {
    sections: RwLock<BTreeMap<(String, String), Section>>,
    oids: RwLock<BTreeMap<(String, String), String>>,
    piggyback: RwLock<BTreeSet<String>>,
    failures: RwLock<BTreeMap<String, Failure>>,
    fetches: Mutex<Vec<(String, String, u64)>>,
}

impl FakeData {
    pub fn section(&self, host: &str, section: &str, rows: &[&[&str]]) -> &Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|w| w.to_string()).collect())
            .collect();
        self.sections
            .write()
            .insert((host.to_string(), section.to_string()), rows);
        self
    }

    pub fn clear_section(&self, host: &str, section: &str) -> &Self {
        self.sections
            .write()
            .remove(&(host.to_string(), section.to_string()));
        self
    }

    pub fn oid(&self, host: &str, oid: &str, value: &str) -> &Self {
        self.oids
            .write()
            .insert((host.to_string(), oid.to_string()), value.to_string());
        self
    }

    pub fn piggyback(&self, host: &str) -> &Self {
        self.piggyback.write().insert(host.to_string());
        self
    }

    pub fn fail(&self, host: &str, failure: Failure) -> &Self {
        self.failures.write().insert(host.to_string(), failure);
        self
    }

    pub fn recover(&self, host: &str) -> &Self {
        self.failures.write().remove(host);
        self
    }

    /// `(host, section, max_cache_age)` of every section fetch so far.
    pub fn fetches(&self) -> Vec<(String, String, u64)> {
        self.fetches.lock().clone()
    }
}

impl DataSource for FakeData {
    fn fetch_section(&self, host: &Host, section: &str, max_cache_age: u64) -> Result<Option<Section>> {
        self.fetches
            .lock()
            .push((host.name.clone(), section.to_string(), max_cache_age));
        if let Some(failure) = self.failures.read().get(&host.name) {
            return Err(failure.error(&host.name));
        }
        Ok(self
            .sections
            .read()
            .get(&(host.name.clone(), section.to_string()))
            .cloned())
    }

    fn get_single_oid(&self, host: &Host, oid: &str) -> Result<Option<String>> {
        if let Some(failure) = self.failures.read().get(&host.name) {
            return Err(failure.error(&host.name));
        }
        Ok(self
            .oids
            .read()
            .get(&(host.name.clone(), oid.to_string()))
            .cloned())
    }

    fn has_piggyback_data(&self, host: &str) -> bool {
        self.piggyback.read().contains(host)
    }
}

/// Core control that records the requested activations.
#[derive(Debug, Default)]
pub struct RecordingCore {
    calls: Mutex<Vec<&'static str>>,
}

impl RecordingCore {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

impl CoreControl for RecordingCore {
    fn reload(&self) -> Result<()> {
        self.calls.lock().push("reload");
        Ok(())
    }

    fn restart(&self) -> Result<()> {
        self.calls.lock().push("restart");
        Ok(())
    }
}

/// Clock at a settable time. It stands still unless told to advance on
/// every read.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
    step: Mutex<TimeDelta>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
            step: Mutex::new(TimeDelta::zero()),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock() = now;
    }

    /// Move the clock forward by `step` after each reading.
    pub fn advance_on_read(&self, step: TimeDelta) {
        *self.step.lock() = step;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        let step = *self.step.lock();
        let mut now = self.now.lock();
        let current = *now;
        *now = current + step;
        current
    }
}

fn one_per_row(
    section: &Section,
    item: impl Fn(&[String]) -> Option<String>,
    params: &str,
) -> Vec<Value> {
    section
        .iter()
        .map(|row| {
            let item = item(row.as_slice()).map_or(Value::None, Value::Str);
            Value::tuple([item, Value::str(params)])
        })
        .collect()
}

/// Check plugins used by most tests.
///
/// - `uptime`, `mem`: one itemless service when the section is present
/// - `df`: one service per row, the first word is the mount point
/// - `cpu.loads`: older interface, parameters refer to a variable
/// - `snmp_uptime`: SNMP, scan matches devices describing themselves as Linux
/// - `hr_cpu`: SNMP without a scan function
pub fn registry() -> CheckRegistry {
    CheckRegistry::new()
        .with(
            CheckTypeDescriptor::new("uptime", "Uptime")
                .discover(|_, _| Ok(Some(vec![Value::tuple([Value::None, Value::str("{}")])])))
                .check(|_, _, input| {
                    let seconds = input
                        .primary
                        .first()
                        .and_then(|row| row.first())
                        .and_then(|s| s.parse::<f64>().ok())
                        .ok_or_else(|| Error::Other("missing uptime".into()))?;
                    Ok(CheckResult::new(State::Ok, format!("Up since {seconds:.0} seconds"))
                        .with_perfdata(format!("uptime={seconds:.0}")))
                }),
        )
        .with(
            CheckTypeDescriptor::new("df", "Filesystem %s")
                .group("filesystem")
                .discover(|_, input| {
                    Ok(Some(one_per_row(
                        &input.primary,
                        |row| row.first().cloned(),
                        "{}",
                    )))
                })
                .check(|item, params, _| {
                    let levels = params.get("levels").map(|v| v.repr()).unwrap_or_default();
                    Ok(CheckResult::new(
                        State::Ok,
                        format!("{} used {levels}", item.unwrap_or_default()),
                    ))
                }),
        )
        .with(
            CheckTypeDescriptor::new("mem", "Memory")
                .discover(|_, _| Ok(Some(vec![Value::tuple([Value::None, Value::dict::<&str>([])])]))),
        )
        .with(
            CheckTypeDescriptor::new("cpu.loads", "CPU load")
                .discover_legacy(|_, check_type, _| {
                    assert_eq!(check_type, "cpu.loads");
                    Ok(Some(vec![Value::tuple([
                        Value::None,
                        Value::str("cpuload_default_levels"),
                    ])]))
                }),
        )
        .with(
            CheckTypeDescriptor::new("snmp_uptime", "Uptime")
                .snmp_scan(|scan| {
                    let descr = scan.oid_or(".1.3.6.1.2.1.1.1.0", "")?;
                    Ok(Value::Bool(descr.to_lowercase().contains("linux")))
                })
                .discover(|_, _| Ok(Some(vec![Value::tuple([Value::None, Value::str("{}")])]))),
        )
        .with(
            CheckTypeDescriptor::new("hr_cpu", "CPU utilization")
                .snmp()
                .discover(|_, _| Ok(Some(vec![Value::tuple([Value::None, Value::str("{}")])]))),
        )
}

/// A temporary site.
pub struct TestSite {
    pub dir: TempDir,
    pub data: Arc<FakeData>,
    pub core: Arc<RecordingCore>,
    pub clock: Arc<FixedClock>,
}

impl TestSite {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            data: Arc::new(FakeData::default()),
            core: Arc::new(RecordingCore::default()),
            clock: Arc::new(FixedClock::new(Local::now())),
        }
    }

    pub fn settings(&self) -> DiscoverySettings {
        DiscoverySettings {
            var_dir: self.dir.path().to_path_buf(),
            ..DiscoverySettings::default()
        }
    }

    pub fn engine(&self, site: &str) -> DiscoveryEngine {
        self.engine_with(self.settings(), site, registry())
    }

    pub fn engine_with(&self, settings: DiscoverySettings, site: &str, registry: CheckRegistry) -> DiscoveryEngine {
        let site = Arc::new(SiteConfig::from_toml_str(site).unwrap());
        DiscoveryEngine::builder(settings)
            .registry(registry)
            .hosts(site.clone())
            .rules(site)
            .data_source(self.data.clone())
            .core(self.core.clone())
            .clock(self.clock.clone())
            .build()
            .unwrap()
    }
}

pub fn record(check_type: &str, item: Option<&str>, params: &str) -> AutocheckRecord {
    AutocheckRecord::new(ServiceKey::new(check_type, item.map(str::to_string)), params)
}

/// Persisted autochecks of a host as `(check_type, item, params)`.
pub fn autochecks(engine: &DiscoveryEngine, host: &str) -> Vec<(String, Option<String>, String)> {
    engine
        .store()
        .read(host)
        .unwrap()
        .into_iter()
        .map(|r| (r.key.check_type, r.key.item, r.paramstring))
        .collect()
}

pub fn key(check_type: &str, item: Option<&str>) -> ServiceKey {
    ServiceKey::new(check_type, item.map(str::to_string))
}
