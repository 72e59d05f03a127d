//! Application startup
//!
//! Resolves configuration, starts logging, wires the fetcher, validator and
//! producer into a pipeline and runs it once for the requested scan.

use clap::Parser;
use std::io::IsTerminal;
use std::sync::Arc;

use crate::core::error_handling::{exit_code_for, log_error_with_context};
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::version::long_version;
use crate::fetcher::{HttpAssetSource, ScanAssetFetcher};
use crate::pipeline::{Pipeline, PipelineReport};
use crate::producer::{AssetProducer, HttpProducer, StdoutProducer};
use crate::validator::AssetValidator;

use super::cli::args::Args;
use super::cli::config::{AppConfig, ConfigError, LoggingConfig};

/// Exit status for a run interrupted by a signal
pub const EXIT_CANCELLED: i32 = 130;

/// Run the application and return the process exit code
pub async fn startup() -> i32 {
    let args = Args::parse();

    // Logging settings come from the configuration, so the file is read
    // before the logger exists and any failure is reported afterwards.
    let loaded = resolve_config(&args).await;
    let logging = match &loaded {
        Ok(config) => config.logging.clone(),
        Err(_) => {
            let mut fallback = AppConfig::default();
            fallback.apply_args(&args);
            fallback.logging
        }
    };
    if let Err(e) = start_logging(&logging) {
        eprintln!("Failed to initialize logging: {}", e);
        return 1;
    }

    log::info!("asset-producer {} starting", long_version());

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            log_error_with_context(&e, "Loading configuration");
            return exit_code_for(&e);
        }
    };

    let pipeline = match build_pipeline(&config, args.dry_run) {
        Ok(pipeline) => pipeline,
        Err(message) => {
            log::error!("FATAL: {}", message);
            return 1;
        }
    };

    let coordinator = ShutdownCoordinator::new();
    coordinator.install_signal_handlers();

    let report = pipeline
        .run(&args.site_id, &args.scan_id, coordinator.signal())
        .await;
    exit_code(&report)
}

async fn resolve_config(args: &Args) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::load(args.config_file.as_deref()).await?;
    config.apply_env(|key| std::env::var(key).ok());
    config.apply_args(args);
    config.validate(args.dry_run)?;
    Ok(config)
}

fn start_logging(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let use_color = logging
        .color
        .unwrap_or_else(|| std::io::stderr().is_terminal() && logging.file.is_none());
    colored::control::set_override(use_color);

    let file = logging.file.as_ref().map(|p| p.to_string_lossy().to_string());
    init_logging(
        logging.level.as_deref(),
        logging.format,
        file.as_deref(),
        use_color,
    )
}

fn build_pipeline(config: &AppConfig, dry_run: bool) -> Result<Pipeline, String> {
    let settings = config.scanner_settings().map_err(|e| e.to_string())?;
    log::debug!("Scanning service at {}", settings.endpoint);
    let source = HttpAssetSource::new(settings)
        .map_err(|e| format!("Unable to create scanning service client: {}", e))?;
    let fetcher = Arc::new(ScanAssetFetcher::new(source, config.scanner.page_size));

    let validator = AssetValidator::new(config.validator.agent_site.clone());
    if validator.agent_site().is_empty() {
        log::debug!("No agent site configured; only exact scan matches are accepted");
    }

    let producer: Arc<dyn AssetProducer> = if dry_run {
        log::info!("Dry run: writing events to stdout");
        Arc::new(StdoutProducer::stdout())
    } else {
        let endpoint = config.producer_endpoint().map_err(|e| e.to_string())?;
        let producer = HttpProducer::new(
            endpoint.as_str(),
            config.producer_timeout(),
            config.producer_retry(),
        )
        .map_err(|e| format!("Unable to create event producer: {}", e))?;
        log::debug!("Delivering events to {}", producer.endpoint());
        Arc::new(producer)
    };

    Ok(Pipeline::new(fetcher, validator, producer))
}

/// Map a finished run to a process exit code.
///
/// Rejected assets are expected and do not fail the run; an incomplete
/// fetch or an undelivered event does.
pub fn exit_code(report: &PipelineReport) -> i32 {
    if report.cancelled {
        return EXIT_CANCELLED;
    }
    if let Some(error) = report.errors.iter().find(|e| e.is_terminal()) {
        return exit_code_for(error);
    }
    if report.emitted < report.validated {
        return 1;
    }
    0
}
