//! Core control through external commands.

use std::process::Command;

use tracing::{debug, info};

use crate::config::DiscoverySettings;
use crate::ports::CoreControl;
use crate::{Error, Result};

/// Runs the configured reload and restart commands.
#[derive(Debug, Clone)]
pub struct CommandCore {
    reload: Vec<String>,
    restart: Vec<String>,
}

impl CommandCore {
    pub fn new(reload: Vec<String>, restart: Vec<String>) -> Self {
        Self { reload, restart }
    }

    pub fn from_settings(settings: &DiscoverySettings) -> Self {
        Self::new(
            settings.reload_command.clone(),
            settings.restart_command.clone(),
        )
    }

    fn run(&self, what: &str, argv: &[String]) -> Result<()> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::config(format!("no {what} command configured")))?;

        debug!(command = ?argv, "Running core {what}");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| Error::Other(format!("cannot run {what} command '{program}': {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Other(format!(
                "{what} command '{program}' failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }
        info!("Core {what} done");
        Ok(())
    }
}

impl CoreControl for CommandCore {
    fn reload(&self) -> Result<()> {
        self.run("reload", &self.reload)
    }

    fn restart(&self) -> Result<()> {
        self.run("restart", &self.restart)
    }
}
