//! Scanning service REST client

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use std::time::Duration;

use crate::core::retry::{retry_async, RetryPolicy};
use crate::domain::TransportError;

use super::page::{AssetPage, AssetPageSource};

/// Connection settings for the scanning service
#[derive(Debug, Clone)]
pub struct ScannerSettings {
    pub endpoint: Url,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// `AssetPageSource` backed by `GET /api/3/sites/{site}/assets`
pub struct HttpAssetSource {
    settings: ScannerSettings,
    client: reqwest::Client,
}

impl HttpAssetSource {
    pub fn new(settings: ScannerSettings) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self { settings, client })
    }

    pub(crate) fn page_url(&self, site_id: &str, page: u32, size: u32) -> Url {
        let mut url = self.settings.endpoint.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}/api/3/sites/{}/assets", base, site_id));
        url.query_pairs_mut()
            .clear()
            .append_pair("page", &page.to_string())
            .append_pair("size", &size.to_string());
        url
    }

    async fn request_page(&self, url: Url) -> Result<AssetPage, TransportError> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.settings.username, Some(&self.settings.password))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<AssetPage>().await?)
    }
}

/// Client errors other than throttling will not succeed on retry
pub(crate) fn is_transient(error: &TransportError) -> bool {
    match error {
        TransportError::Status { status, .. } => *status == 429 || *status >= 500,
        TransportError::Http(e) => !e.is_decode() && !e.is_builder(),
    }
}

#[async_trait]
impl AssetPageSource for HttpAssetSource {
    async fn fetch_page(
        &self,
        site_id: &str,
        page: u32,
        size: u32,
    ) -> Result<AssetPage, TransportError> {
        let url = self.page_url(site_id, page, size);
        log::debug!("Fetching assets page {} for site {}: {}", page, site_id, url);

        retry_async(
            "fetch_asset_page",
            &self.settings.retry,
            || self.request_page(url.clone()),
            is_transient,
        )
        .await
    }
}
