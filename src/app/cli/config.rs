//! TOML configuration file parsing and loading
//!
//! Settings are layered: built-in defaults, then the configuration file, then
//! environment variables for credentials, then command-line flags. The
//! resolved values are validated once and turned into the settings each
//! component is constructed from.

use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error_handling::ContextualError;
use crate::core::logging::LogFormat;
use crate::core::retry::RetryPolicy;
use crate::fetcher::{ScannerSettings, DEFAULT_PAGE_SIZE};

use super::args::Args;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: usize = 2;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Environment variables consulted for credentials and endpoints
pub const ENV_SCANNER_USERNAME: &str = "ASSET_PRODUCER_SCANNER_USERNAME";
pub const ENV_SCANNER_PASSWORD: &str = "ASSET_PRODUCER_SCANNER_PASSWORD";
pub const ENV_SCANNER_ENDPOINT: &str = "ASSET_PRODUCER_SCANNER_ENDPOINT";
pub const ENV_PRODUCER_ENDPOINT: &str = "ASSET_PRODUCER_PRODUCER_ENDPOINT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("the specified configuration file does not exist: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("error reading configuration file {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing configuration file {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required setting '{key}'")]
    Missing { key: String },

    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        !matches!(self, ConfigError::Read { .. })
    }

    fn user_message(&self) -> Option<String> {
        if self.is_user_actionable() {
            Some(self.to_string())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScannerConfig {
    pub endpoint: Option<String>,
    pub username: String,
    pub password: String,
    pub page_size: u32,
    pub timeout_secs: u64,
    pub retries: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            username: String::new(),
            password: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatorConfig {
    pub agent_site: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProducerConfig {
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    pub retries: usize,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    pub color: Option<bool>,
}

/// Fully layered application configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub scanner: ScannerConfig,
    pub validator: ValidatorConfig,
    pub producer: ProducerConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Default configuration file location, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("AssetProducer").join("asset-producer.toml"))
    }

    /// Load the configuration file.
    ///
    /// An explicitly named file must exist; the default location is optional.
    pub async fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match config_file {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        };

        let mut config = Self::default();
        if let Some(path) = path {
            log::debug!("Loading configuration from {}", path.display());
            let contents =
                tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|source| ConfigError::Read {
                        path: path.clone(),
                        source,
                    })?;
            let table = toml::from_str::<toml::Table>(&contents)
                .map_err(|source| ConfigError::Parse { path, source })?;
            config.apply_toml_values(&table)?;
        }
        Ok(config)
    }

    /// Apply values from a parsed TOML document
    pub fn apply_toml_values(&mut self, config: &toml::Table) -> Result<(), ConfigError> {
        if let Some(scanner) = section(config, "scanner")? {
            if let Some(endpoint) = get_str(scanner, "scanner", "endpoint")? {
                self.scanner.endpoint = Some(endpoint.to_string());
            }
            if let Some(username) = get_str(scanner, "scanner", "username")? {
                self.scanner.username = username.to_string();
            }
            if let Some(password) = get_str(scanner, "scanner", "password")? {
                self.scanner.password = password.to_string();
            }
            if let Some(page_size) = get_positive(scanner, "scanner", "page-size")? {
                self.scanner.page_size = u32::try_from(page_size)
                    .map_err(|_| ConfigError::invalid("scanner.page-size", "value is too large"))?;
            }
            if let Some(timeout) = get_positive(scanner, "scanner", "timeout-secs")? {
                self.scanner.timeout_secs = timeout;
            }
            if let Some(retries) = get_count(scanner, "scanner", "retries")? {
                self.scanner.retries = retries;
            }
        }

        if let Some(validator) = section(config, "validator")? {
            if let Some(agent_site) = get_str(validator, "validator", "agent-site")? {
                self.validator.agent_site = agent_site.to_string();
            }
        }

        if let Some(producer) = section(config, "producer")? {
            if let Some(endpoint) = get_str(producer, "producer", "endpoint")? {
                self.producer.endpoint = Some(endpoint.to_string());
            }
            if let Some(timeout) = get_positive(producer, "producer", "timeout-secs")? {
                self.producer.timeout_secs = timeout;
            }
            if let Some(retries) = get_count(producer, "producer", "retries")? {
                self.producer.retries = retries;
            }
        }

        if let Some(logging) = section(config, "logging")? {
            if let Some(level) = get_str(logging, "logging", "level")? {
                self.logging.level = Some(level.to_string());
            }
            if let Some(format) = get_str(logging, "logging", "format")? {
                self.logging.format = format
                    .parse()
                    .map_err(|e: String| ConfigError::invalid("logging.format", e))?;
            }
            if let Some(file) = get_str(logging, "logging", "file")? {
                // "none" and "-" disable file logging
                self.logging.file = if file.eq_ignore_ascii_case("none") || file == "-" {
                    None
                } else {
                    Some(PathBuf::from(file))
                };
            }
            if let Some(color) = logging.get("color") {
                self.logging.color = Some(
                    color
                        .as_bool()
                        .ok_or_else(|| ConfigError::invalid("logging.color", "expected a boolean"))?,
                );
            }
        }

        Ok(())
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENV_SCANNER_ENDPOINT) {
            self.scanner.endpoint = Some(endpoint);
        }
        if let Some(username) = lookup(ENV_SCANNER_USERNAME) {
            self.scanner.username = username;
        }
        if let Some(password) = lookup(ENV_SCANNER_PASSWORD) {
            self.scanner.password = password;
        }
        if let Some(endpoint) = lookup(ENV_PRODUCER_ENDPOINT) {
            self.producer.endpoint = Some(endpoint);
        }
    }

    /// Apply command-line overrides, which take precedence over everything
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(endpoint) = &args.scanner_endpoint {
            self.scanner.endpoint = Some(endpoint.clone());
        }
        if let Some(page_size) = args.page_size {
            self.scanner.page_size = page_size;
        }
        if let Some(agent_site) = &args.agent_site {
            self.validator.agent_site = agent_site.clone();
        }
        if let Some(endpoint) = &args.producer_endpoint {
            self.producer.endpoint = Some(endpoint.clone());
        }
        if let Some(level) = &args.log_level {
            self.logging.level = Some(level.clone());
        }
        if let Some(format) = args.log_format {
            self.logging.format = format;
        }
        if let Some(file) = &args.log_file {
            self.logging.file = if file.as_os_str() == "none" || file.as_os_str() == "-" {
                None
            } else {
                Some(file.clone())
            };
        }
        if let Some(color) = args.color_override() {
            self.logging.color = Some(color);
        }
    }

    /// Check that everything a run needs is present and well formed
    pub fn validate(&self, dry_run: bool) -> Result<(), ConfigError> {
        self.scanner_settings()?;
        if !dry_run {
            self.producer_endpoint()?;
        }
        if self.validator.agent_site.trim() != self.validator.agent_site {
            return Err(ConfigError::invalid(
                "validator.agent-site",
                "must not have leading or trailing whitespace",
            ));
        }
        Ok(())
    }

    pub fn scanner_settings(&self) -> Result<ScannerSettings, ConfigError> {
        let endpoint = required_url(self.scanner.endpoint.as_deref(), "scanner.endpoint")?;
        if self.scanner.page_size == 0 {
            return Err(ConfigError::invalid("scanner.page-size", "must be greater than 0"));
        }
        Ok(ScannerSettings {
            endpoint,
            username: self.scanner.username.clone(),
            password: self.scanner.password.clone(),
            timeout: Duration::from_secs(self.scanner.timeout_secs),
            retry: RetryPolicy::with_retries(self.scanner.retries, RETRY_DELAY),
        })
    }

    pub fn producer_endpoint(&self) -> Result<Url, ConfigError> {
        required_url(self.producer.endpoint.as_deref(), "producer.endpoint")
    }

    pub fn producer_timeout(&self) -> Duration {
        Duration::from_secs(self.producer.timeout_secs)
    }

    pub fn producer_retry(&self) -> RetryPolicy {
        RetryPolicy::with_retries(self.producer.retries, RETRY_DELAY)
    }
}

fn section<'a>(config: &'a toml::Table, name: &str) -> Result<Option<&'a toml::Table>, ConfigError> {
    match config.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_table()
            .map(Some)
            .ok_or_else(|| ConfigError::invalid(name, "expected a table")),
    }
}

fn get_str<'a>(
    table: &'a toml::Table,
    section: &str,
    key: &str,
) -> Result<Option<&'a str>, ConfigError> {
    match table.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| ConfigError::invalid(&format!("{}.{}", section, key), "expected a string")),
    }
}

fn get_integer(table: &toml::Table, section: &str, key: &str) -> Result<Option<i64>, ConfigError> {
    match table.get(key) {
        None => Ok(None),
        Some(value) => value.as_integer().map(Some).ok_or_else(|| {
            ConfigError::invalid(&format!("{}.{}", section, key), "expected an integer")
        }),
    }
}

fn get_positive(table: &toml::Table, section: &str, key: &str) -> Result<Option<u64>, ConfigError> {
    match get_integer(table, section, key)? {
        Some(n) if n > 0 => Ok(Some(n as u64)),
        Some(_) => Err(ConfigError::invalid(
            &format!("{}.{}", section, key),
            "must be greater than 0",
        )),
        None => Ok(None),
    }
}

fn get_count(table: &toml::Table, section: &str, key: &str) -> Result<Option<usize>, ConfigError> {
    match get_integer(table, section, key)? {
        Some(n) if n >= 0 => Ok(Some(n as usize)),
        Some(_) => Err(ConfigError::invalid(
            &format!("{}.{}", section, key),
            "must not be negative",
        )),
        None => Ok(None),
    }
}

fn required_url(value: Option<&str>, key: &str) -> Result<Url, ConfigError> {
    let raw = value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Missing {
            key: key.to_string(),
        })?;
    let url = Url::parse(raw).map_err(|e| ConfigError::invalid(key, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::invalid(
            key,
            format!("unsupported scheme '{}'", other),
        )),
    }
}
