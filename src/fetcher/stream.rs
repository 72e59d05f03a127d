//! Streaming asset retrieval
//!
//! `ScanAssetFetcher` walks a site's asset pages on a spawned task and hands
//! back two channels: decoded assets and errors. Both close when the task
//! ends, which happens once the pages are exhausted, a terminal error was
//! sent, or the cancel signal fired.

use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::core::shutdown::CancelSignal;
use crate::domain::{Asset, AssetError};

use super::page::{AssetPage, AssetPageSource};

pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Receiving halves of a fetch: assets in upstream order, and errors
pub type AssetStreams = (UnboundedReceiver<Asset>, UnboundedReceiver<AssetError>);

/// Fetches the assets covered by a completed scan
pub trait AssetFetcher: Send + Sync {
    /// Start streaming the assets of `site_id`.
    ///
    /// Must be called within a tokio runtime.
    fn fetch_assets(&self, site_id: &str, scan_id: &str, cancel: CancelSignal) -> AssetStreams;
}

/// `AssetFetcher` over any paginated `AssetPageSource`
pub struct ScanAssetFetcher<S> {
    source: Arc<S>,
    page_size: u32,
}

impl<S: AssetPageSource + 'static> ScanAssetFetcher<S> {
    pub fn new(source: S, page_size: u32) -> Self {
        Self {
            source: Arc::new(source),
            page_size: page_size.max(1),
        }
    }
}

impl<S: AssetPageSource + 'static> AssetFetcher for ScanAssetFetcher<S> {
    fn fetch_assets(&self, site_id: &str, scan_id: &str, cancel: CancelSignal) -> AssetStreams {
        let (asset_tx, asset_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        if let Some(message) = request_problem(site_id, scan_id) {
            let _ = error_tx.send(AssetError::InvalidRequest { message });
            return (asset_rx, error_rx);
        }

        let task = PageWalk {
            source: self.source.clone(),
            site_id: site_id.to_string(),
            page_size: self.page_size,
            asset_tx,
            error_tx,
        };
        log::debug!(
            "Starting asset fetch for site {} (scan {}, page size {})",
            site_id,
            scan_id,
            self.page_size
        );
        tokio::spawn(task.run(cancel));

        (asset_rx, error_rx)
    }
}

/// Read both channels until the fetch task closes them
pub async fn collect_streams(streams: AssetStreams) -> (Vec<Asset>, Vec<AssetError>) {
    let (mut asset_rx, mut error_rx) = streams;

    let assets = async {
        let mut assets = Vec::new();
        while let Some(asset) = asset_rx.recv().await {
            assets.push(asset);
        }
        assets
    };
    let errors = async {
        let mut errors = Vec::new();
        while let Some(error) = error_rx.recv().await {
            errors.push(error);
        }
        errors
    };

    tokio::join!(assets, errors)
}

fn request_problem(site_id: &str, scan_id: &str) -> Option<String> {
    if site_id.trim().is_empty() {
        Some("site ID is required".to_string())
    } else if scan_id.trim().is_empty() {
        Some("scan ID is required".to_string())
    } else {
        None
    }
}

/// State owned by the spawned fetch task. Dropping it closes both channels.
struct PageWalk<S> {
    source: Arc<S>,
    site_id: String,
    page_size: u32,
    asset_tx: UnboundedSender<Asset>,
    error_tx: UnboundedSender<AssetError>,
}

impl<S: AssetPageSource> PageWalk<S> {
    async fn run(self, mut cancel: CancelSignal) {
        let mut page_number = 0u32;
        let mut emitted = 0usize;

        loop {
            if cancel.is_cancelled() {
                log::info!(
                    "Asset fetch for site {} cancelled before page {}",
                    self.site_id,
                    page_number
                );
                break;
            }

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::info!(
                        "Asset fetch for site {} cancelled during page {}",
                        self.site_id,
                        page_number
                    );
                    break;
                }
                result = self.source.fetch_page(&self.site_id, page_number, self.page_size) => result,
            };

            let page = match fetched {
                Ok(page) => page,
                Err(source) => {
                    self.send_error(AssetError::Transport {
                        site_id: self.site_id.clone(),
                        page: page_number,
                        source,
                    });
                    break;
                }
            };

            if page.page.number != page_number {
                self.send_error(AssetError::Pagination {
                    site_id: self.site_id.clone(),
                    message: format!(
                        "requested page {} but received page {}",
                        page_number, page.page.number
                    ),
                });
                break;
            }

            let is_last = page.is_last();
            emitted += self.emit_page(page, page_number);

            if is_last {
                break;
            }
            page_number += 1;
        }

        log::debug!(
            "Asset fetch for site {} finished after {} page(s), {} asset(s) decoded",
            self.site_id,
            page_number + 1,
            emitted
        );
    }

    /// Decode and forward every record of a page, returning the number of
    /// assets sent
    fn emit_page(&self, page: AssetPage, page_number: u32) -> usize {
        let mut sent = 0;
        for (index, raw) in page.resources.into_iter().enumerate() {
            match serde_json::from_value::<Asset>(raw) {
                Ok(asset) => {
                    if self.asset_tx.send(asset).is_ok() {
                        sent += 1;
                    }
                }
                Err(source) => self.send_error(AssetError::Decode {
                    page: page_number,
                    index,
                    source,
                }),
            }
        }
        sent
    }

    fn send_error(&self, error: AssetError) {
        log::debug!("Fetch error for site {}: {}", self.site_id, error);
        // A dropped receiver means the orchestrator stopped listening
        let _ = self.error_tx.send(error);
    }
}
