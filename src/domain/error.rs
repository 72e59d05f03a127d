//! Asset Pipeline Error Types

use crate::core::error_handling::ContextualError;

use super::asset::Asset;

/// Why a correlated scan timestamp was rejected
#[derive(Debug, thiserror::Error)]
pub enum ScanTimeError {
    #[error("unable to parse scan time: {0}")]
    Parse(#[from] chrono::ParseError),

    #[error("scan time '{date}' is not a strict RFC 3339 timestamp")]
    NotStrict { date: String },

    #[error("scan time is zero")]
    Zero,

    #[error("agent scan is more than one day old")]
    StaleAgentScan,
}

/// Failure raised while fetching the page of a site's assets
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("scanning service returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Errors produced while fetching, validating or delivering assets.
///
/// Asset-level variants reject one asset and never abort the batch. Stream
/// level variants (`Transport`, `Pagination`, `InvalidRequest`) end the fetch.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to decode asset {index} on page {page}: {source}")]
    Decode {
        page: u32,
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "scan {scan_id} not found in history of asset {asset_id} (ip: '{asset_ip}', hostname: '{asset_hostname}')"
    )]
    ScanIdNotFound {
        scan_id: String,
        asset_id: i64,
        asset_ip: String,
        asset_hostname: String,
    },

    #[error(
        "invalid scan time for scan {scan_id} on asset {asset_id} (ip: '{asset_ip}', hostname: '{asset_hostname}'): {source}"
    )]
    InvalidScanTime {
        scan_id: String,
        asset_id: i64,
        asset_ip: String,
        asset_hostname: String,
        #[source]
        source: ScanTimeError,
    },

    #[error(
        "asset {asset_id} is missing required information (ip: '{asset_ip}', hostname: '{asset_hostname}')"
    )]
    MissingRequiredInformation {
        asset_id: i64,
        asset_ip: String,
        asset_hostname: String,
    },

    #[error("failed to fetch assets for site {site_id} (page {page}): {source}")]
    Transport {
        site_id: String,
        page: u32,
        #[source]
        source: TransportError,
    },

    #[error("malformed pagination for site {site_id}: {message}")]
    Pagination { site_id: String, message: String },

    #[error("invalid fetch request: {message}")]
    InvalidRequest { message: String },

    #[error("failed to deliver event for asset {asset_id}: {message}")]
    Delivery { asset_id: i64, message: String },
}

impl AssetError {
    pub(crate) fn missing_information(asset: &Asset) -> Self {
        AssetError::MissingRequiredInformation {
            asset_id: asset.id,
            asset_ip: asset.ip.clone(),
            asset_hostname: asset.hostname.clone(),
        }
    }

    pub(crate) fn scan_id_not_found(asset: &Asset, scan_id: &str) -> Self {
        AssetError::ScanIdNotFound {
            scan_id: scan_id.to_string(),
            asset_id: asset.id,
            asset_ip: asset.ip.clone(),
            asset_hostname: asset.hostname.clone(),
        }
    }

    pub(crate) fn invalid_scan_time(asset: &Asset, scan_id: &str, source: ScanTimeError) -> Self {
        AssetError::InvalidScanTime {
            scan_id: scan_id.to_string(),
            asset_id: asset.id,
            asset_ip: asset.ip.clone(),
            asset_hostname: asset.hostname.clone(),
            source,
        }
    }

    /// True for errors that end the fetch stream rather than a single asset
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AssetError::Transport { .. }
                | AssetError::Pagination { .. }
                | AssetError::InvalidRequest { .. }
        )
    }
}

impl ContextualError for AssetError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, AssetError::InvalidRequest { .. })
    }

    fn user_message(&self) -> Option<String> {
        match self {
            AssetError::InvalidRequest { message } => Some(message.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> Asset {
        Asset {
            id: 12,
            ip: "10.1.1.1".to_string(),
            hostname: "build-agent".to_string(),
            history: vec![],
        }
    }

    #[test]
    fn test_invalid_scan_time_carries_context() {
        let err = AssetError::invalid_scan_time(&asset(), "99", ScanTimeError::Zero);
        let text = err.to_string();

        assert!(text.contains("scan 99"));
        assert!(text.contains("asset 12"));
        assert!(text.contains("10.1.1.1"));
        assert!(text.contains("scan time is zero"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_terminal_classification() {
        assert!(AssetError::Pagination {
            site_id: "1".to_string(),
            message: "bad".to_string()
        }
        .is_terminal());
        assert!(!AssetError::missing_information(&asset()).is_terminal());
        assert!(!AssetError::scan_id_not_found(&asset(), "1").is_terminal());
    }

    #[test]
    fn test_only_invalid_request_is_user_actionable() {
        let request = AssetError::InvalidRequest {
            message: "site ID is required".to_string(),
        };
        assert!(request.is_user_actionable());
        assert_eq!(request.user_message().as_deref(), Some("site ID is required"));

        let missing = AssetError::missing_information(&asset());
        assert!(!missing.is_user_actionable());
        assert_eq!(missing.user_message(), None);
    }
}
