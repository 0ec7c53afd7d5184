use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "donation-guard",
    version,
    about = "Flags fraudulent disaster-relief donation pages"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to config file (TOML). Default: config/donation-guard.toml
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Domain lists source: an http(s) URL or a JSON file path
    #[arg(long, global = true)]
    pub lists: Option<String>,

    /// Disable network access (built-in or file lists, no reputation lookups)
    #[arg(long, global = true)]
    pub offline: bool,

    /// Increase verbosity (info, debug, trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log file path
    #[arg(long, global = true, default_value = "data/donation-guard.log")]
    pub log_file: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// One full detection pass over a saved page
    Scan {
        /// Page URL (determines the hostname)
        #[arg(long)]
        url: String,
        /// Saved HTML of the page
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Keep rescanning a page file as it changes, until Ctrl-C
    Watch {
        #[arg(long)]
        url: String,
        #[arg(long)]
        html: PathBuf,
    },
    /// Show how a hostname is classified
    Check {
        hostname: String,
    },
    /// Report a site as suspicious through the configured report sinks
    Report {
        #[arg(long)]
        url: String,
        /// Saved HTML used to attach detection flags to the report
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Print stored detections and reports from the configured database
    History {
        /// Only list detections logged for this hostname
        #[arg(long)]
        host: Option<String>,
    },
}
