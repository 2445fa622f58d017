//! On-disk autochecks store.
//!
//! Layout below the site's variable directory:
//!
//! - `autochecks/<host>.mk` - configuration truth, edited by discovery
//! - `core/autochecks/<host>.mk` - copy activated in the monitoring core
//!
//! Writes replace the whole file through a temporary file in the same
//! directory, so readers never observe a partially written list. There is no
//! cross-process locking; concurrent writers for one host must be serialized
//! by the caller (last writer wins).

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{AutochecksError, Result};
use crate::parser::{ParseMode, parse_autochecks};
use crate::record::AutocheckRecord;

/// Which copy of the autochecks to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum World {
    /// Files edited by discovery.
    #[default]
    Config,
    /// Files activated in the monitoring core.
    Active,
}

/// Reads and writes the autochecks files of a site.
#[derive(Debug, Clone)]
pub struct AutochecksStore {
    config_dir: PathBuf,
    active_dir: PathBuf,
    mode: ParseMode,
}

impl AutochecksStore {
    /// Create a store rooted at the site's variable directory.
    pub fn new(var_dir: impl AsRef<Path>) -> Self {
        let var_dir = var_dir.as_ref();
        Self::with_dirs(var_dir.join("autochecks"), var_dir.join("core").join("autochecks"))
    }

    /// Create a store with explicit directories.
    pub fn with_dirs(config_dir: impl Into<PathBuf>, active_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            active_dir: active_dir.into(),
            mode: ParseMode::Lenient,
        }
    }

    /// Fail on malformed lines instead of dropping the rest of the file.
    pub fn strict(mut self, strict: bool) -> Self {
        self.mode = if strict {
            ParseMode::Strict
        } else {
            ParseMode::Lenient
        };
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of a host's file in the given world.
    pub fn path_of(&self, host: &str, world: World) -> PathBuf {
        let dir = match world {
            World::Config => &self.config_dir,
            World::Active => &self.active_dir,
        };
        dir.join(format!("{host}.mk"))
    }

    /// Whether the host has an autochecks file.
    pub fn exists(&self, host: &str) -> bool {
        self.path_of(host, World::Config).is_file()
    }

    /// Read the configured autochecks of a host. A missing file is an empty set.
    pub fn read(&self, host: &str) -> Result<Vec<AutocheckRecord>> {
        self.read_world(host, World::Config)
    }

    /// Read the autochecks of a host from the given world.
    pub fn read_world(&self, host: &str, world: World) -> Result<Vec<AutocheckRecord>> {
        let path = self.path_of(host, world);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AutochecksError::io("reading", &path, e)),
        };
        parse_autochecks(&content, &path, self.mode)
    }

    /// Replace the autochecks of a host.
    ///
    /// Records are written sorted by key. When a key occurs more than once
    /// the first occurrence is kept. Nothing is written if any record would
    /// not read back unchanged.
    pub fn write(&self, host: &str, mut records: Vec<AutocheckRecord>) -> Result<()> {
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records.dedup_by(|later, earlier| later.key == earlier.key);

        for record in &records {
            record
                .validate()
                .map_err(|reason| AutochecksError::InvalidRecord {
                    host: host.to_string(),
                    key: record.key.to_string(),
                    reason,
                })?;
        }

        std::fs::create_dir_all(&self.config_dir)
            .map_err(|e| AutochecksError::io("creating directory", &self.config_dir, e))?;

        let path = self.path_of(host, World::Config);
        let mut file = NamedTempFile::new_in(&self.config_dir)
            .map_err(|e| AutochecksError::io("creating temporary file in", &self.config_dir, e))?;
        file.write_all(render(&records).as_bytes())
            .map_err(|e| AutochecksError::io("writing", file.path(), e))?;
        file.persist(&path)
            .map_err(|e| AutochecksError::io("replacing", &path, e.error))?;

        debug!(host, count = records.len(), path = %path.display(), "Wrote autochecks");
        Ok(())
    }

    /// Remove all records of a host matching `predicate`. Returns the number
    /// of removed records. The file is only rewritten when something changed.
    pub fn remove_matching<F>(&self, host: &str, mut predicate: F) -> Result<usize>
    where
        F: FnMut(&AutocheckRecord) -> bool,
    {
        let records = self.read(host)?;
        let before = records.len();
        let kept: Vec<_> = records.into_iter().filter(|r| !predicate(r)).collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.write(host, kept)?;
        }
        Ok(removed)
    }
}

/// Render records in file format. Records are written in the given order.
pub fn render(records: &[AutocheckRecord]) -> String {
    let mut out = String::from("[\n");
    for record in records {
        out.push_str(&record.to_line());
        out.push('\n');
    }
    out.push_str("]\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ServiceKey;

    fn record(ct: &str, item: Option<&str>, params: &str) -> AutocheckRecord {
        AutocheckRecord::new(ServiceKey::new(ct, item.map(str::to_string)), params)
    }

    #[test]
    fn test_render_format() {
        let text = render(&[record("df", Some("/"), "{}"), record("uptime", None, "None")]);
        assert_eq!(text, "[\n  ('df', '/', {}),\n  ('uptime', None, None),\n]\n");
        assert_eq!(render(&[]), "[\n]\n");
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = AutochecksStore::new(dir.path());
        assert!(!store.exists("nohost"));
        assert!(store.read("nohost").unwrap().is_empty());
    }

    #[test]
    fn test_write_sorts_and_preserves_paramstrings() {
        let dir = tempfile::tempdir().unwrap();
        let store = AutochecksStore::new(dir.path());
        let params = "{'levels': (80.0, 90.0), 'magic':   0.8}";
        store
            .write(
                "host1",
                vec![
                    record("uptime", None, "{}"),
                    record("df", Some("/var"), params),
                    record("df", Some("/"), "{}"),
                ],
            )
            .unwrap();

        assert!(store.exists("host1"));
        let records = store.read("host1").unwrap();
        let keys: Vec<_> = records.iter().map(|r| r.key.to_string()).collect();
        assert_eq!(keys, vec!["df//", "df//var", "uptime"]);
        assert_eq!(records[1].paramstring, params);
    }

    #[test]
    fn test_write_deduplicates_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = AutochecksStore::new(dir.path());
        store
            .write("h", vec![record("df", Some("/"), "1"), record("df", Some("/"), "2")])
            .unwrap();
        let records = store.read("h").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].paramstring, "1");
    }

    #[test]
    fn test_write_refuses_records_that_do_not_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = AutochecksStore::new(dir.path());
        store.write("h", vec![record("df", Some("/"), "{}")]).unwrap();

        for params in ["", "{'a':\n 1}"] {
            let err = store
                .write("h", vec![record("aaa", Some("x"), params), record("df", Some("/"), "{}")])
                .unwrap_err();
            assert!(matches!(err, AutochecksError::InvalidRecord { ref key, .. } if key == "aaa/x"));
        }

        let records = store.read("h").unwrap();
        assert_eq!(records, vec![record("df", Some("/"), "{}")]);
    }

    #[test]
    fn test_remove_matching() {
        let dir = tempfile::tempdir().unwrap();
        let store = AutochecksStore::new(dir.path());
        store
            .write(
                "h",
                vec![
                    record("df", Some("/"), "{}"),
                    record("df", Some("/var"), "{}"),
                    record("uptime", None, "{}"),
                ],
            )
            .unwrap();

        let removed = store.remove_matching("h", |r| r.check_type() == "df").unwrap();
        assert_eq!(removed, 2);
        let records = store.read("h").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].check_type(), "uptime");

        assert_eq!(store.remove_matching("h", |_| false).unwrap(), 0);
    }

    #[test]
    fn test_read_active_world() {
        let dir = tempfile::tempdir().unwrap();
        let store = AutochecksStore::new(dir.path());
        let active = dir.path().join("core").join("autochecks");
        std::fs::create_dir_all(&active).unwrap();
        std::fs::write(active.join("h.mk"), "[\n  ('cpu.loads', None, None),\n]\n").unwrap();

        assert!(store.read("h").unwrap().is_empty());
        let records = store.read_world("h", World::Active).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].check_type(), "cpu.loads");
    }

    #[test]
    fn test_strict_store_fails_on_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = AutochecksStore::new(dir.path());
        std::fs::create_dir_all(store.config_dir()).unwrap();
        std::fs::write(store.path_of("h", World::Config), "[\n  ('df', 1, {}),\n]\n").unwrap();

        assert!(store.read("h").unwrap().is_empty());
        assert!(store.clone().strict(true).read("h").is_err());
    }
}
