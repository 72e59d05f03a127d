//! Paginated asset listing as served by the scanning service

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::TransportError;

/// Pagination metadata attached to every page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub total_resources: u64,
    #[serde(default)]
    pub total_pages: u32,
}

/// One page of a site's assets.
///
/// Resources stay as raw JSON so each record decodes on its own and a bad
/// record cannot spoil the page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetPage {
    #[serde(default)]
    pub resources: Vec<serde_json::Value>,
    #[serde(default)]
    pub page: PageInfo,
}

impl AssetPage {
    /// True when no page follows this one
    pub fn is_last(&self) -> bool {
        self.page.number.saturating_add(1) >= self.page.total_pages
    }
}

/// Read access to a site's asset listing, one page at a time
#[async_trait]
pub trait AssetPageSource: Send + Sync {
    async fn fetch_page(
        &self,
        site_id: &str,
        page: u32,
        size: u32,
    ) -> Result<AssetPage, TransportError>;
}
