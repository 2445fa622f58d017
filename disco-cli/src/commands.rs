use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use service_discovery::site::{AgentCache, CommandCore, SiteConfig};
use service_discovery::{
    BulkHostResult, CheckOutcome, Diagnostics, DiscoveryEngine, DiscoveryMode, DiscoveryOptions,
    DiscoverySettings, HostRediscovery, OnError, State,
};
use tracing::{debug, info};

use crate::cli::OutputFormat;
use crate::error::{AppError, Result};
use crate::plugins::builtin_registry;

/// Executes CLI commands against a discovery engine.
pub struct CommandExecutor {
    engine: DiscoveryEngine,
    output: OutputFormat,
}

impl CommandExecutor {
    /// Build an engine over the site files named in `settings`.
    pub fn new(settings: DiscoverySettings, output: OutputFormat) -> Result<Self> {
        let site = Arc::new(SiteConfig::load(&settings.site_config)?);
        let data = Arc::new(AgentCache::new(&settings.var_dir));
        let core = Arc::new(CommandCore::from_settings(&settings));
        debug!(var_dir = %settings.var_dir.display(), "Building discovery engine");

        let engine = DiscoveryEngine::builder(settings)
            .registry(builtin_registry())
            .hosts(site.clone())
            .rules(site)
            .data_source(data)
            .core(core)
            .build()?;
        Ok(Self { engine, output })
    }

    fn print_json(&self, value: &impl serde::Serialize) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn discover(&self, hosts: &[String], checks: &[String], full: bool) -> Result<()> {
        let report = self.engine.discover_hosts(hosts, checks, !full)?;

        if self.output == OutputFormat::Json {
            self.print_json(&report)?;
        } else {
            for (host, result) in &report.hosts {
                match result {
                    BulkHostResult::Discovered(stats) if stats.is_empty() => {
                        println!("{host}: nothing{}", if full { "" } else { " new" });
                    }
                    BulkHostResult::Discovered(stats) => {
                        let summary = stats
                            .iter()
                            .map(|(check_type, count)| format!("{count} {check_type}"))
                            .collect::<Vec<_>>()
                            .join(", ");
                        println!("{host}: {summary}");
                    }
                    BulkHostResult::Failed(message) => println!("{host}: failed: {message}"),
                }
            }
        }

        match report.failed() {
            0 => Ok(()),
            failed => Err(AppError::PartialFailure(failed)),
        }
    }

    /// Run the discovery check. Returns the check state.
    pub fn check(&self, host: &str, no_cache: bool) -> Result<State> {
        let outcome = match self.engine.check_discovery(host, !no_cache) {
            Ok(outcome) => outcome,
            Err(e) if !self.engine.settings().debug => {
                CheckOutcome::new(State::Unknown, format!("Discovery failed: {e}\n"))
            }
            Err(e) => return Err(e.into()),
        };

        if self.output == OutputFormat::Json {
            self.print_json(&outcome)?;
        } else {
            print!("{}", outcome.render());
        }
        Ok(outcome.state)
    }

    pub fn discover_marked(&self) -> Result<()> {
        let report = self.engine.discover_marked_hosts()?;

        if self.output == OutputFormat::Json {
            return self.print_json(&report);
        }
        for (host, result) in &report.hosts {
            match result {
                HostRediscovery::Removed => println!("{host}: removed from queue, host is gone"),
                HostRediscovery::Skipped(reason) => println!("{host}: skipped, {reason}"),
                HostRediscovery::Discovered { mode, counts } => println!("{host}: {mode}: {counts}"),
                HostRediscovery::Failed(failure) => println!("{host}: failed: {failure}"),
            }
        }
        if report.budget_exhausted {
            println!("Time budget used up, remaining hosts are processed next time");
        }
        if let Some(activation) = report.activation {
            println!("Activated changes: {activation:?}");
        }
        Ok(())
    }

    pub fn rediscover(&self, host: &str, mode: DiscoveryMode, no_scan: bool) -> Result<()> {
        let outcome = self.engine.discover_on_host(mode, host, !no_scan, false)?;

        if self.output == OutputFormat::Json {
            return self.print_json(&outcome);
        }
        match outcome.into_result() {
            Ok(counts) => {
                println!("{host}: {counts}");
                Ok(())
            }
            Err(failure) => Err(AppError::InvalidInput(format!("{host}: {failure}"))),
        }
    }

    pub fn services(&self, host: &str) -> Result<()> {
        let opts = DiscoveryOptions::new(true, false, OnError::Warn);
        let mut diag = Diagnostics::new();
        let table = self.engine.get_host_services(host, &opts, &mut diag)?;

        if self.output == OutputFormat::Json {
            let rows: Vec<_> = table
                .iter()
                .map(|(key, entry)| {
                    json!({
                        "source": entry.source,
                        "check_type": key.check_type,
                        "item": key.item,
                        "paramstring": entry.paramstring,
                        "description": self.engine.service_description(&key.check_type, key.item()),
                    })
                })
                .collect();
            return self.print_json(&json!({ "services": rows, "warnings": diag.messages() }));
        }

        let mut per_source: BTreeMap<String, usize> = BTreeMap::new();
        for (key, entry) in &table {
            *per_source.entry(entry.source.to_string()).or_default() += 1;
            println!(
                "{:<18} {:<14} {:<30} {}",
                entry.source.as_str(),
                key.check_type,
                self.engine.service_description(&key.check_type, key.item()),
                entry.paramstring
            );
        }
        info!(host, services = table.len(), by_source = ?per_source, "Listed services");
        Ok(())
    }

    pub fn preview(&self, host: &str) -> Result<()> {
        let opts = DiscoveryOptions::new(true, false, OnError::Warn);
        let rows = self.engine.check_preview(host, &opts)?;

        if self.output == OutputFormat::Json {
            return self.print_json(&rows);
        }
        for row in &rows {
            let state = row.state.map_or("PEND", |s| s.as_str());
            println!(
                "{:<18} {:<8} {:<30} {}",
                row.source.as_str(),
                state,
                row.description,
                row.output
            );
        }
        Ok(())
    }

    pub fn remove_autochecks(&self, host: &str) -> Result<()> {
        let removed = self.engine.remove_autochecks_of(host)?;
        if self.output == OutputFormat::Json {
            return self.print_json(&json!({ "host": host, "removed": removed }));
        }
        println!("{host}: removed {removed} services");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SITE: &str = r#"
[[hosts]]
name = "web01"

[[periodic_discovery]]
hosts = ["web01"]
inventory_rediscovery = { mode = 2 }
"#;

    const AGENT_OUTPUT: &str = "\
<<<uptime>>>
93784.2 1000.0
<<<df>>>
/dev/sda1 ext4 20000000 8000000 12000000 40% /
<<<cpu>>>
0.10 0.20 0.30 1/234 5678 2
";

    fn executor(dir: &std::path::Path) -> CommandExecutor {
        fs::write(dir.join("site.toml"), SITE).unwrap();
        fs::create_dir_all(dir.join("var").join("cache")).unwrap();
        fs::write(dir.join("var").join("cache").join("web01"), AGENT_OUTPUT).unwrap();

        let settings = DiscoverySettings {
            var_dir: dir.join("var"),
            site_config: dir.join("site.toml"),
            reload_command: vec!["true".into()],
            restart_command: vec!["true".into()],
            ..DiscoverySettings::default()
        };
        CommandExecutor::new(settings, OutputFormat::Json).unwrap()
    }

    #[test]
    fn test_discover_then_check() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path());

        assert_eq!(executor.check("web01", false).unwrap(), State::Warn);
        assert!(executor.engine.marks().exists("web01"));

        executor.discover(&["web01".to_string()], &[], false).unwrap();
        let store = executor.engine.store().read("web01").unwrap();
        let types: Vec<_> = store.iter().map(|r| r.check_type()).collect();
        assert_eq!(types, vec!["cpu.loads", "df", "uptime"]);

        assert_eq!(executor.check("web01", false).unwrap(), State::Ok);
        assert!(!executor.engine.marks().exists("web01"));

        executor.remove_autochecks("web01").unwrap();
        assert!(executor.engine.store().read("web01").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_host_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path());

        assert_eq!(executor.check("nope", false).unwrap(), State::Warn);
        assert!(matches!(
            executor.discover(&["nope".to_string()], &[], false),
            Err(AppError::PartialFailure(1))
        ));
    }

    #[test]
    fn test_discover_all_hosts_with_check_filter() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path());

        executor.discover(&[], &["df".to_string()], false).unwrap();
        let store = executor.engine.store().read("web01").unwrap();
        let types: Vec<_> = store.iter().map(|r| r.check_type()).collect();
        assert_eq!(types, vec!["df"]);

        executor.discover(&[], &[], false).unwrap();
        let store = executor.engine.store().read("web01").unwrap();
        let types: Vec<_> = store.iter().map(|r| r.check_type()).collect();
        assert_eq!(types, vec!["cpu.loads", "df", "uptime"]);
    }
}
