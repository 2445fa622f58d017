use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use service_discovery::DiscoveryMode;

#[derive(Parser, Debug)]
#[command(name = "disco")]
#[command(about = "Discover services of monitored hosts and maintain their autochecks")]
#[command(version)]
pub struct Args {
    /// Settings file (TOML)
    #[arg(short, long, env = "DISCO_CONFIG", default_value = "disco.toml")]
    pub config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Propagate errors instead of reporting them
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Also write a daily rolling log file into this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover services on hosts and add them to their autochecks
    ///
    /// Without hosts all monitored hosts are discovered from cached data.
    Discover {
        /// Hosts or clusters to discover
        hosts: Vec<String>,

        /// Restrict discovery to these check types (comma separated)
        #[arg(long, value_delimiter = ',')]
        checks: Vec<String>,

        /// Replace existing services instead of only adding new ones
        #[arg(long)]
        full: bool,
    },

    /// Run the discovery check of a host; the exit code is the check state
    Check {
        host: String,

        /// Do not use cached agent data
        #[arg(long)]
        no_cache: bool,
    },

    /// Rediscover the hosts queued by the discovery check
    DiscoverMarked,

    /// Run one discovery pass on a host and persist the result
    Rediscover {
        host: String,

        #[arg(short, long, value_enum, default_value = "new")]
        mode: DiscoveryMode,

        /// Skip the SNMP scan and use the SNMP check types already monitored
        #[arg(long)]
        no_scan: bool,
    },

    /// Show the classified services of a host
    Services { host: String },

    /// Show the services of a host together with a check result
    Preview { host: String },

    /// Remove the autochecks of a host
    RemoveAutochecks { host: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
