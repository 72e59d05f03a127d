//! Logging setup on top of flexi_logger
//!
//! All modules log through the `log` facade; this module owns the single
//! backend instance and its output formats.

use std::str::FromStr;
use std::sync::{Mutex, OnceLock};

use strum::IntoEnumIterator;
use strum_macros::EnumIter;

// Holds the backend for the life of the process
static LOGGER_HANDLE: OnceLock<Mutex<flexi_logger::LoggerHandle>> = OnceLock::new();

/// Supported log line layouts
#[derive(EnumIter, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Timestamp, level and message
    #[default]
    Text,
    /// Text with the emitting source location appended
    Ext,
    /// One compact JSON object per line
    Json,
}

impl LogFormat {
    pub fn name(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Ext => "ext",
            LogFormat::Json => "json",
        }
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        LogFormat::iter().map(|fmt| fmt.name())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowercase = s.to_lowercase();
        LogFormat::iter()
            .find(|fmt| fmt.name() == lowercase)
            .ok_or_else(|| {
                format!(
                    "unknown log format '{}' (expected one of: {})",
                    s,
                    LogFormat::names().collect::<Vec<_>>().join(", ")
                )
            })
    }
}

/// Start the global logger.
///
/// May only succeed once per process; later calls return an error from
/// flexi_logger and leave the running logger untouched.
pub fn init_logging(
    log_level: Option<&str>,
    log_format: LogFormat,
    log_file: Option<&str>,
    color_enabled: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    use flexi_logger::{FileSpec, Logger};

    let level_str = log_level.unwrap_or("info");
    let mut logger = Logger::try_with_str(level_str)?;

    logger = match (log_format, color_enabled) {
        (LogFormat::Json, _) => logger.format(json_format),
        (LogFormat::Ext, true) => logger.format(extended_color_format),
        (LogFormat::Ext, false) => logger.format(extended_format),
        (LogFormat::Text, true) => logger.format(simple_color_format),
        (LogFormat::Text, false) => logger.format(simple_format),
    };

    if let Some(file_path) = log_file {
        let file_spec = FileSpec::try_from(std::path::Path::new(file_path))?;
        logger = logger.log_to_file(file_spec);
    }

    let handle = logger.start()?;
    let _ = LOGGER_HANDLE.set(Mutex::new(handle));

    Ok(())
}

fn level_abbr(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    }
}

// "YYYY-MM-DD HH:mm:ss.fff INF message"
fn simple_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {}",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level_abbr(record.level()),
        record.args()
    )
}

fn simple_color_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use colored::*;

    write!(
        w,
        "{} {} {}",
        now.format("%Y-%m-%d %H:%M:%S%.3f").to_string().dimmed(),
        colored_level(record.level()),
        record.args()
    )
}

// "YYYY-MM-DD HH:mm:ss.fff INF message (fetcher/stream.rs:42)"
fn extended_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {} ({})",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level_abbr(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line())
    )
}

fn extended_color_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use colored::*;

    let target_formatted = format_target_as_path(record.target(), record.line());
    write!(
        w,
        "{} {} {} ({})",
        now.format("%Y-%m-%d %H:%M:%S%.3f").to_string().dimmed(),
        colored_level(record.level()),
        record.args(),
        target_formatted.dimmed()
    )
}

fn colored_level(level: log::Level) -> colored::ColoredString {
    use colored::*;

    match level {
        log::Level::Error => "ERR".red().bold(),
        log::Level::Warn => "WRN".yellow(),
        log::Level::Info => "INF".green(),
        log::Level::Debug => "DBG".blue(),
        log::Level::Trace => "TRC".magenta(),
    }
}

fn json_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use serde_json::{json, to_string};

    let json_obj = json!({
        "timestamp": now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "level": level_abbr(record.level()),
        "message": record.args().to_string(),
        "target": format_target_as_path(record.target(), record.line())
    });

    match to_string(&json_obj) {
        Ok(json_string) => w.write_all(json_string.as_bytes()),
        Err(_) => w.write_all(b"{\"error\":\"Failed to serialize log message\"}"),
    }
}

// asset_producer::fetcher::stream -> fetcher/stream.rs
fn format_target_as_path(target: &str, line: Option<u32>) -> String {
    let path_like = if let Some(without_prefix) = target.strip_prefix("asset_producer::") {
        without_prefix.replace("::", "/") + ".rs"
    } else {
        target.replace("::", "/")
    };

    match line {
        Some(line_num) => format!("{}:{}", path_like, line_num),
        None => path_like,
    }
}
