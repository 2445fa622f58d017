mod cli;
mod commands;
mod error;
mod plugins;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use service_discovery::DiscoverySettings;
use service_discovery::logging::{LogOptions, init_logging};
use tracing::{error, warn};

use crate::{
    cli::{Args, Commands},
    commands::CommandExecutor,
    error::AppError,
};

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!("Application error: {e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let _log_guard = init_logging(&LogOptions {
        filter: LogOptions::verbosity_filter(args.verbose),
        json: args.log_json,
        log_dir: args.log_dir.clone(),
    })
    .context("Failed to initialize logging")?;

    let mut settings = if args.config.exists() {
        DiscoverySettings::load(&args.config)
            .with_context(|| format!("Failed to load settings from {}", args.config.display()))?
    } else {
        warn!(path = %args.config.display(), "Settings file not found, using defaults");
        DiscoverySettings::default()
    };
    settings.debug |= args.debug;

    let executor = CommandExecutor::new(settings, args.output).context("Failed to set up discovery")?;

    let result = match args.command {
        Commands::Discover { hosts, checks, full } => executor.discover(&hosts, &checks, full),
        Commands::Check { host, no_cache } => {
            // The check reports through its exit code.
            let state = executor.check(&host, no_cache)?;
            return Ok(ExitCode::from(u8::from(state)));
        }
        Commands::DiscoverMarked => executor.discover_marked(),
        Commands::Rediscover {
            host,
            mode,
            no_scan,
        } => executor.rediscover(&host, mode, no_scan),
        Commands::Services { host } => executor.services(&host),
        Commands::Preview { host } => executor.preview(&host),
        Commands::RemoveAutochecks { host } => executor.remove_autochecks(&host),
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(AppError::PartialFailure(failed)) => {
            warn!(failed, "Some hosts could not be discovered");
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e.into()),
    }
}
