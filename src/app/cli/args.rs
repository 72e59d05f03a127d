//! Command-line arguments
//!
//! Every setting that also lives in the configuration file is optional here;
//! `AppConfig::apply_args` layers whatever was given on top of the file.

use clap::Parser;
use std::path::PathBuf;

use crate::core::logging::LogFormat;
use crate::core::version::long_version;

#[derive(Parser, Debug, Clone)]
#[command(name = "asset-producer")]
#[command(about = "Publish asset events for a completed vulnerability scan")]
#[command(version, long_version = long_version())]
pub struct Args {
    /// Site whose assets are fetched
    #[arg(short = 's', long = "site-id", value_name = "SITE")]
    pub site_id: String,

    /// Scan that triggered this run
    #[arg(short = 'S', long = "scan-id", value_name = "SCAN")]
    pub scan_id: String,

    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Site treated as the agent site (accepts its most recent scan)
    #[arg(short = 'a', long = "agent-site", value_name = "SITE")]
    pub agent_site: Option<String>,

    /// Scanning service base URL
    #[arg(long = "scanner-endpoint", value_name = "URL")]
    pub scanner_endpoint: Option<String>,

    /// Event destination URL
    #[arg(long = "producer-endpoint", value_name = "URL")]
    pub producer_endpoint: Option<String>,

    /// Assets requested per page
    #[arg(long = "page-size", value_name = "COUNT", value_parser = clap::value_parser!(u32).range(1..))]
    pub page_size: Option<u32>,

    /// Write events to stdout as JSON lines instead of delivering them
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format (text, ext, json)
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = parse_log_format)]
    pub log_format: Option<LogFormat>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Force colored log output
    #[arg(short = 'g', long = "color", conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored log output
    #[arg(long = "no-color", conflicts_with = "color")]
    pub no_color: bool,
}

impl Args {
    /// Some(true) for --color, Some(false) for --no-color, None to auto-detect
    pub fn color_override(&self) -> Option<bool> {
        match (self.color, self.no_color) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}
