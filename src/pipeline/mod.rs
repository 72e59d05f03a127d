//! Pipeline Orchestrator
//!
//! One run per scan completion: fetch the site's assets, validate them against
//! the triggering scan, and deliver every accepted event. All failures are
//! gathered into the returned report; nothing in a run is retried here beyond
//! what the source and producer do per request.

use std::sync::Arc;

use crate::core::shutdown::CancelSignal;
use crate::domain::AssetError;
use crate::fetcher::{collect_streams, AssetFetcher};
use crate::producer::AssetProducer;
use crate::validator::AssetValidator;

/// Outcome of a single pipeline run
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Assets decoded from the scanning service
    pub fetched: usize,
    /// Events accepted by the validator
    pub validated: usize,
    /// Events delivered to the producer
    pub emitted: usize,
    pub errors: Vec<AssetError>,
    pub cancelled: bool,
}

impl PipelineReport {
    /// True when the fetch stream ended on a transport, pagination or
    /// request error and the asset set may be incomplete
    pub fn fetch_incomplete(&self) -> bool {
        self.errors.iter().any(AssetError::is_terminal)
    }
}

pub struct Pipeline {
    fetcher: Arc<dyn AssetFetcher>,
    validator: AssetValidator,
    producer: Arc<dyn AssetProducer>,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        validator: AssetValidator,
        producer: Arc<dyn AssetProducer>,
    ) -> Self {
        Self {
            fetcher,
            validator,
            producer,
        }
    }

    pub async fn run(&self, site_id: &str, scan_id: &str, cancel: CancelSignal) -> PipelineReport {
        log::info!("Processing scan {} for site {}", scan_id, site_id);

        let streams = self.fetcher.fetch_assets(site_id, scan_id, cancel.clone());
        let (assets, mut errors) = collect_streams(streams).await;

        let mut report = PipelineReport {
            fetched: assets.len(),
            ..Default::default()
        };

        let (events, rejections) = self.validator.validate_assets(&assets, scan_id, site_id);
        report.validated = events.len();
        errors.extend(rejections);

        for event in &events {
            if cancel.is_cancelled() {
                report.cancelled = true;
                log::warn!(
                    "Run cancelled with {} of {} events delivered",
                    report.emitted,
                    events.len()
                );
                break;
            }
            match self.producer.produce(event).await {
                Ok(()) => report.emitted += 1,
                Err(e) => errors.push(AssetError::Delivery {
                    asset_id: event.id,
                    message: e.to_string(),
                }),
            }
        }
        report.cancelled |= cancel.is_cancelled();

        for error in &errors {
            log::warn!("{}", error);
        }
        log::info!(
            "Scan {} for site {}: {} fetched, {} valid, {} emitted, {} error(s)",
            scan_id,
            site_id,
            report.fetched,
            report.validated,
            report.emitted,
            errors.len()
        );

        report.errors = errors;
        report
    }
}
