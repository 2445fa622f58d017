//! Data source backed by cached agent output.
//!
//! Layout below the site's variable directory:
//!
//! - `cache/<host>` - agent output of TCP hosts
//! - `snmp/<host>` - SNMP sections, in agent output format
//! - `snmpwalks/<host>` - one `<oid> <value>` per line
//! - `piggyback/<host>/<source>` - agent output delivered by other hosts
//!
//! Agent output is a sequence of `<<<section>>>` blocks with one row of
//! whitespace separated words per line. `<<<section:sep(59)>>>` switches the
//! separator to the given character code. Blocks between `<<<<host>>>>` and
//! `<<<<>>>>` carry data for other hosts and are skipped.
//!
//! There is no live transport, so the maximum cache age is not enforced.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::domain::Host;
use crate::ports::DataSource;
use crate::registry::Section;
use crate::utils::fs::io_error;
use crate::{Error, Result};

/// Parsed data of one host.
#[derive(Debug, Default)]
struct HostData {
    sections: BTreeMap<String, Section>,
    /// Transport failure to report when a section is not available.
    failure: Option<Error>,
}

/// Reads agent and SNMP data from the site's cache directories.
#[derive(Debug)]
pub struct AgentCache {
    var_dir: PathBuf,
    hosts: RwLock<HashMap<String, Arc<HostData>>>,
    walks: RwLock<HashMap<String, Arc<BTreeMap<String, String>>>>,
}

impl AgentCache {
    pub fn new(var_dir: impl Into<PathBuf>) -> Self {
        Self {
            var_dir: var_dir.into(),
            hosts: RwLock::new(HashMap::new()),
            walks: RwLock::new(HashMap::new()),
        }
    }

    /// Drop everything read so far.
    pub fn invalidate(&self) {
        self.hosts.write().clear();
        self.walks.write().clear();
    }

    fn host_data(&self, host: &Host) -> Result<Arc<HostData>> {
        if let Some(data) = self.hosts.read().get(&host.name) {
            return Ok(Arc::clone(data));
        }
        let data = Arc::new(self.load_host(host)?);
        self.hosts
            .write()
            .insert(host.name.clone(), Arc::clone(&data));
        Ok(data)
    }

    fn load_host(&self, host: &Host) -> Result<HostData> {
        let mut data = HostData::default();
        let piggyback = self.piggyback_files(&host.name)?;

        if host.tcp {
            let path = self.var_dir.join("cache").join(&host.name);
            match read_optional(&path)? {
                Some(content) => merge_sections(&mut data.sections, &content),
                None if piggyback.is_empty() => {
                    data.failure = Some(Error::agent(format!(
                        "Cannot get information from agent: no cached data in {}",
                        path.display()
                    )));
                }
                None => debug!(host = %host.name, "Processing only piggyback data"),
            }
        }

        if host.snmp {
            let path = self.var_dir.join("snmp").join(&host.name);
            match read_optional(&path)? {
                Some(content) => merge_sections(&mut data.sections, &content),
                None if data.failure.is_none() => {
                    data.failure = Some(Error::snmp(format!(
                        "Cannot fetch SNMP data: no cached data in {}",
                        path.display()
                    )));
                }
                None => {}
            }
        }

        for path in piggyback {
            if let Some(content) = read_optional(&path)? {
                merge_sections(&mut data.sections, &content);
            }
        }

        trace!(host = %host.name, sections = data.sections.len(), "Loaded cached data");
        Ok(data)
    }

    fn piggyback_files(&self, host: &str) -> Result<Vec<PathBuf>> {
        let dir = self.var_dir.join("piggyback").join(host);
        let read_dir = match std::fs::read_dir(&dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("reading", &dir, e)),
        };
        let mut files = Vec::new();
        for entry in read_dir {
            let path = entry.map_err(|e| io_error("reading", &dir, e))?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn walk(&self, host: &str) -> Result<Arc<BTreeMap<String, String>>> {
        if let Some(walk) = self.walks.read().get(host) {
            return Ok(Arc::clone(walk));
        }
        let path = self.var_dir.join("snmpwalks").join(host);
        let content = read_optional(&path)?.ok_or_else(|| {
            Error::snmp(format!("No SNMP walk for {host} in {}", path.display()))
        })?;
        let walk = Arc::new(parse_walk(&content));
        self.walks.write().insert(host.to_string(), Arc::clone(&walk));
        Ok(walk)
    }
}

impl DataSource for AgentCache {
    fn fetch_section(&self, host: &Host, section: &str, _max_cache_age: u64) -> Result<Option<Section>> {
        let data = self.host_data(host)?;
        if let Some(rows) = data.sections.get(section) {
            return Ok(Some(rows.clone()));
        }
        match &data.failure {
            Some(Error::Agent(msg)) if data.sections.is_empty() => Err(Error::agent(msg.as_str())),
            Some(Error::Snmp(msg)) if data.sections.is_empty() => Err(Error::snmp(msg.as_str())),
            _ => Ok(None),
        }
    }

    fn get_single_oid(&self, host: &Host, oid: &str) -> Result<Option<String>> {
        Ok(self.walk(&host.name)?.get(oid).cloned())
    }

    fn has_piggyback_data(&self, host: &str) -> bool {
        self.piggyback_files(host).is_ok_and(|files| !files.is_empty())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error("reading", path, e)),
    }
}

/// Parse agent output and append its sections to `sections`.
pub fn merge_sections(sections: &mut BTreeMap<String, Section>, content: &str) {
    let mut current: Option<(String, Option<char>)> = None;
    let mut foreign = false;

    for line in content.lines() {
        let trimmed = line.trim_end();
        if let Some(header) = trimmed
            .strip_prefix("<<<<")
            .and_then(|l| l.strip_suffix(">>>>"))
        {
            foreign = !header.is_empty();
            current = None;
            continue;
        }
        if foreign {
            continue;
        }
        if let Some(header) = trimmed
            .strip_prefix("<<<")
            .and_then(|l| l.strip_suffix(">>>"))
        {
            let (name, separator) = parse_header(header);
            sections.entry(name.clone()).or_default();
            current = Some((name, separator));
            continue;
        }

        let Some((name, separator)) = &current else {
            continue;
        };
        let words: Vec<String> = match separator {
            Some(sep) => trimmed.split(*sep).map(str::to_string).collect(),
            None => trimmed.split_whitespace().map(str::to_string).collect(),
        };
        if words.is_empty() || (words.len() == 1 && words[0].is_empty()) {
            continue;
        }
        sections.entry(name.clone()).or_default().push(words);
    }
}

/// Split `name:opt(arg):...` into the section name and its separator.
fn parse_header(header: &str) -> (String, Option<char>) {
    let mut parts = header.split(':');
    let name = parts.next().unwrap_or_default().to_string();
    let separator = parts
        .filter_map(|opt| opt.strip_prefix("sep(").and_then(|o| o.strip_suffix(')')))
        .filter_map(|code| code.parse::<u32>().ok())
        .filter_map(char::from_u32)
        .next();
    (name, separator)
}

fn parse_walk(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (oid, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            if oid.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((oid.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "\
<<<uptime>>>
123456.78 98765.43
<<<df>>>
/dev/sda1 ext4 1000 500 500 50% /
/dev/sda2 ext4 2000 100 1900 5% /var
<<<<other-host>>>>
<<<uptime>>>
1 1
<<<<>>>>
<<<mem:sep(58)>>>
MemTotal: 1024 kB
";

    #[test]
    fn test_merge_sections() {
        let mut sections = BTreeMap::new();
        merge_sections(&mut sections, OUTPUT);
        assert_eq!(sections["uptime"], vec![vec!["123456.78", "98765.43"]]);
        assert_eq!(sections["df"].len(), 2);
        assert_eq!(sections["df"][1][6], "/var");
        assert_eq!(sections["mem"], vec![vec!["MemTotal", " 1024 kB"]]);
    }

    #[test]
    fn test_parse_walk() {
        let walk = parse_walk(".1.3.6.1.2.1.1.1.0 \"Linux switch 4.19\"\n.1.3.6.1.2.1.1.2.0 .1.3.6.1.4.1.8072\n");
        assert_eq!(walk[".1.3.6.1.2.1.1.1.0"], "Linux switch 4.19");
        assert_eq!(walk[".1.3.6.1.2.1.1.2.0"], ".1.3.6.1.4.1.8072");
    }

    #[test]
    fn test_fetch_from_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("cache")).unwrap();
        std::fs::write(dir.path().join("cache").join("web01"), OUTPUT).unwrap();

        let cache = AgentCache::new(dir.path());
        let host = Host::agent("web01");
        assert!(cache.fetch_section(&host, "df", 0).unwrap().is_some());
        assert!(cache.fetch_section(&host, "lnx_if", 0).unwrap().is_none());

        let missing = Host::agent("web02");
        assert!(cache.fetch_section(&missing, "df", 0).unwrap_err().is_transport());
        assert!(!cache.has_piggyback_data("web02"));
    }

    #[test]
    fn test_piggyback_only_host() {
        let dir = tempfile::tempdir().unwrap();
        let pig = dir.path().join("piggyback").join("vm01");
        std::fs::create_dir_all(&pig).unwrap();
        std::fs::write(pig.join("esx01"), "<<<uptime>>>\n42 0\n").unwrap();

        let cache = AgentCache::new(dir.path());
        assert!(cache.has_piggyback_data("vm01"));
        let uptime = cache.fetch_section(&Host::agent("vm01"), "uptime", 0).unwrap();
        assert_eq!(uptime, Some(vec![vec!["42".to_string(), "0".to_string()]]));
    }
}
