//! Common test utilities and helpers
//!
//! An in-memory paginated source standing in for the scanning service and a
//! producer that records what it was given.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use asset_producer::domain::{AssetEvent, TransportError};
use asset_producer::fetcher::{AssetPage, AssetPageSource, PageInfo};
use asset_producer::producer::{AssetProducer, ProducerError};

/// Serves a fixed list of raw asset records in pages of the requested size
pub struct MemorySource {
    records: Vec<Value>,
    pub requests: Mutex<Vec<(String, u32, u32)>>,
}

impl MemorySource {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AssetPageSource for MemorySource {
    async fn fetch_page(
        &self,
        site_id: &str,
        page: u32,
        size: u32,
    ) -> Result<AssetPage, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((site_id.to_string(), page, size));

        let total = self.records.len() as u32;
        let total_pages = total.div_ceil(size);
        let start = (page * size) as usize;
        let resources = self
            .records
            .iter()
            .skip(start)
            .take(size as usize)
            .cloned()
            .collect();

        Ok(AssetPage {
            resources,
            page: PageInfo {
                number: page,
                size,
                total_resources: total as u64,
                total_pages,
            },
        })
    }
}

/// Records delivered events in order
#[derive(Default)]
pub struct CollectingProducer {
    pub events: Mutex<Vec<AssetEvent>>,
}

impl CollectingProducer {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ids(&self) -> Vec<i64> {
        self.events.lock().unwrap().iter().map(|e| e.id).collect()
    }
}

#[async_trait]
impl AssetProducer for CollectingProducer {
    async fn produce(&self, event: &AssetEvent) -> Result<(), ProducerError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Raw asset record as the scanning service returns it
pub fn asset_json(id: i64, ip: &str, history: Vec<Value>) -> Value {
    json!({
        "id": id,
        "ip": ip,
        "hostName": "",
        "history": history,
    })
}

pub fn scan_entry(date: &str, scan_id: i64) -> Value {
    json!({ "type": "SCAN", "date": date, "scanId": scan_id })
}
