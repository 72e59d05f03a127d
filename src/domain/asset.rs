//! Asset Record Model
//!
//! Raw asset and scan-history shapes as returned by the scanning service, plus
//! the canonical `AssetEvent` emitted downstream.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::error::{AssetError, ScanTimeError};

/// Kind of lifecycle event recorded in an asset's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum HistoryEventType {
    #[serde(rename = "SCAN")]
    Scan,
    #[serde(other)]
    Other,
}

/// One entry of an asset's history as reported by the scanner
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetHistoryEntry {
    #[serde(rename = "type")]
    pub event_type: HistoryEventType,
    #[serde(default)]
    pub date: String,
    #[serde(rename = "scanId", default)]
    pub scan_id: i64,
}

impl AssetHistoryEntry {
    pub fn scan(date: impl Into<String>, scan_id: i64) -> Self {
        Self {
            event_type: HistoryEventType::Scan,
            date: date.into(),
            scan_id,
        }
    }

    pub fn is_scan(&self) -> bool {
        self.event_type == HistoryEventType::Scan
    }

    /// Parse the entry date as a strict RFC 3339 timestamp
    pub fn parsed_date(&self) -> Result<DateTime<Utc>, ScanTimeError> {
        let parsed = DateTime::parse_from_rfc3339(&self.date)?;
        if !is_strict_rfc3339(&self.date) {
            return Err(ScanTimeError::NotStrict {
                date: self.date.clone(),
            });
        }
        Ok(parsed.with_timezone(&Utc))
    }
}

/// An asset as decoded from the scanning service.
///
/// Identity fields default when absent so that incomplete assets reach the
/// validator and are rejected there with a precise reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Asset {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub ip: String,
    #[serde(rename = "hostName", default)]
    pub hostname: String,
    #[serde(default)]
    pub history: Vec<AssetHistoryEntry>,
}

impl Asset {
    /// Name of the identity field this asset lacks, if any.
    ///
    /// Returns `"ID"` for a zero identifier and `"HostandIP"` when both the IP
    /// address and hostname are empty.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.id == 0 {
            Some("ID")
        } else if self.ip.is_empty() && self.hostname.is_empty() {
            Some("HostandIP")
        } else {
            None
        }
    }

    /// Latest SCAN entry in the history by parsed date, ignoring scan IDs.
    ///
    /// Returns the zero timestamp when there is no SCAN history. Any SCAN
    /// entry with an unparsable date fails the whole computation.
    pub fn last_scanned_timestamp(&self) -> Result<DateTime<Utc>, ScanTimeError> {
        let mut latest = zero_time();
        for entry in self.history.iter().filter(|e| e.is_scan()) {
            let date = entry.parsed_date()?;
            if date > latest {
                latest = date;
            }
        }
        Ok(latest)
    }

    /// Convert into an event stamped with the last assessed time.
    ///
    /// Used by reprocessing flows that do not correlate against a specific
    /// scan. The identity check is applied before the history is inspected.
    pub fn to_asset_event(&self) -> Result<AssetEvent, AssetError> {
        if self.missing_field().is_some() {
            return Err(AssetError::missing_information(self));
        }
        let scan_time = self
            .last_scanned_timestamp()
            .map_err(|e| AssetError::invalid_scan_time(self, "", e))?;
        Ok(AssetEvent::new(self, scan_time))
    }
}

/// Canonical "asset scanned" event delivered to the downstream queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEvent {
    pub id: i64,
    pub ip: String,
    pub hostname: String,
    pub scan_time: DateTime<Utc>,
}

impl AssetEvent {
    pub fn new(asset: &Asset, scan_time: DateTime<Utc>) -> Self {
        Self {
            id: asset.id,
            ip: asset.ip.clone(),
            hostname: asset.hostname.clone(),
            scan_time,
        }
    }
}

/// The unset timestamp used by scanner payloads (`0001-01-01T00:00:00Z`)
pub fn zero_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// True only for the scanner's unset timestamp
pub fn is_zero_time(time: &DateTime<Utc>) -> bool {
    *time == zero_time()
}

// `parse_from_rfc3339` also takes a space or lowercase `t` between date and
// time and a lowercase `z`; RFC 3339 timestamps use `T` and `Z` or `±hh:mm`.
fn is_strict_rfc3339(date: &str) -> bool {
    let bytes = date.as_bytes();
    if bytes.get(10) != Some(&b'T') {
        return false;
    }
    if bytes.last() == Some(&b'Z') {
        return true;
    }
    match bytes.len().checked_sub(6).map(|start| &bytes[start..]) {
        Some([sign, h1, h2, b':', m1, m2]) => {
            matches!(sign, b'+' | b'-')
                && [h1, h2, m1, m2].iter().all(|b| b.is_ascii_digit())
        }
        _ => false,
    }
}
