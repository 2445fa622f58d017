//! Rediscovery marks.
//!
//! A mark is an empty file named after the host. Its modification time is
//! the time the host was queued.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::Result;
use crate::utils::fs::{ensure_dir_all_with_op, io_error, remove_if_exists, touch_if_absent};

/// Directory of rediscovery marks.
#[derive(Debug, Clone)]
pub struct MarkStore {
    dir: PathBuf,
}

impl MarkStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, host: &str) -> PathBuf {
        self.dir.join(host)
    }

    /// Queue or unqueue a host. Queuing an already queued host keeps its
    /// original time.
    pub fn set(&self, host: &str, queued: bool) -> Result<()> {
        let path = self.path_of(host);
        if queued {
            ensure_dir_all_with_op("creating mark directory", &self.dir)?;
            touch_if_absent(&path)?;
            debug!(host, "Queued for rediscovery");
        } else if remove_if_exists(&path)? {
            debug!(host, "Removed rediscovery mark");
        }
        Ok(())
    }

    pub fn exists(&self, host: &str) -> bool {
        self.path_of(host).is_file()
    }

    /// Remove the mark of a host. Returns whether it existed.
    pub fn remove(&self, host: &str) -> Result<bool> {
        remove_if_exists(&self.path_of(host))
    }

    /// Whether the mark directory has been created yet.
    pub fn dir_exists(&self) -> bool {
        self.dir.is_dir()
    }

    /// Queued hosts in name order. Empty when the directory is missing.
    pub fn hosts(&self) -> Result<Vec<String>> {
        let mut hosts: Vec<String> = self
            .entries()?
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        hosts.sort();
        Ok(hosts)
    }

    /// Queue time of the longest waiting host.
    pub fn oldest(&self) -> Result<Option<SystemTime>> {
        Ok(self.entries()?.into_iter().map(|(_, mtime)| mtime).min())
    }

    fn entries(&self) -> Result<Vec<(String, SystemTime)>> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("reading", &self.dir, e)),
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| io_error("reading", &self.dir, e))?;
            let path = entry.path();
            let metadata = entry.metadata().map_err(|e| io_error("inspecting", &path, e))?;
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let mtime = metadata
                .modified()
                .map_err(|e| io_error("inspecting", &path, e))?;
            entries.push((name, mtime));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let marks = MarkStore::new(dir.path().join("autodiscovery"));
        assert!(!marks.dir_exists());
        assert!(marks.hosts().unwrap().is_empty());
        assert!(marks.oldest().unwrap().is_none());
    }

    #[test]
    fn test_set_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let marks = MarkStore::new(dir.path().join("autodiscovery"));

        marks.set("b", true).unwrap();
        marks.set("a", true).unwrap();
        marks.set("a", true).unwrap();
        assert_eq!(marks.hosts().unwrap(), vec!["a", "b"]);
        assert!(marks.oldest().unwrap().is_some());

        marks.set("a", false).unwrap();
        marks.set("c", false).unwrap();
        assert!(!marks.exists("a"));
        assert_eq!(marks.hosts().unwrap(), vec!["b"]);

        assert!(marks.remove("b").unwrap());
        assert!(!marks.remove("b").unwrap());
    }
}
