//! Asset Validator
//!
//! Correlates each fetched asset with the scan that triggered the run and
//! turns the survivors into canonical `AssetEvent`s.
//!
//! Scan correlation walks the asset history in stored order and stops at the
//! first SCAN entry that either carries the triggering scan ID or belongs to
//! the configured agent site. Agent scans rarely carry a usable scan ID, so
//! they are accepted on recency instead: a match older than one day is
//! rejected. Exact scan ID matches have no age limit.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::core::time::{SystemTimeProvider, TimeProvider};
use crate::domain::{is_zero_time, Asset, AssetError, AssetEvent, ScanTimeError};

/// Maximum age of an agent scan relative to the validation moment
pub const AGENT_SCAN_MAX_AGE_HOURS: i64 = 24;

/// How a history entry was matched to the triggering scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMatch {
    ScanId,
    AgentSite,
}

pub struct AssetValidator {
    agent_site: String,
    clock: Arc<dyn TimeProvider>,
}

impl AssetValidator {
    pub fn new(agent_site: impl Into<String>) -> Self {
        Self::with_clock(agent_site, Arc::new(SystemTimeProvider))
    }

    pub fn with_clock(agent_site: impl Into<String>, clock: Arc<dyn TimeProvider>) -> Self {
        Self {
            agent_site: agent_site.into(),
            clock,
        }
    }

    pub fn agent_site(&self) -> &str {
        &self.agent_site
    }

    /// Validate a batch of assets against the triggering scan.
    ///
    /// Accepted events keep input order. Rejections are collected separately
    /// and never stop the remaining assets from being processed.
    pub fn validate_assets(
        &self,
        assets: &[Asset],
        scan_id: &str,
        site_id: &str,
    ) -> (Vec<AssetEvent>, Vec<AssetError>) {
        let mut events = Vec::with_capacity(assets.len());
        let mut errors = Vec::new();
        let now = self.clock.now();

        for asset in assets {
            match self.validate_asset(asset, scan_id, site_id, now) {
                Ok(event) => events.push(event),
                Err(err) => {
                    log::debug!("Rejected asset {}: {}", asset.id, err);
                    errors.push(err);
                }
            }
        }

        (events, errors)
    }

    fn validate_asset(
        &self,
        asset: &Asset,
        scan_id: &str,
        site_id: &str,
        now: DateTime<Utc>,
    ) -> Result<AssetEvent, AssetError> {
        let scan_time = self.resolve_scan_time(asset, scan_id, site_id, now)?;
        to_asset_event(asset, scan_time)
    }

    fn is_agent_site(&self, site_id: &str) -> bool {
        !self.agent_site.is_empty() && site_id == self.agent_site
    }

    /// Find the scan time of the first history entry correlated with the
    /// triggering scan, evaluated at the validation moment `now`
    pub fn resolve_scan_time(
        &self,
        asset: &Asset,
        scan_id: &str,
        site_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, AssetError> {
        let wanted_id = scan_id.trim().parse::<i64>().ok();
        let agent_site = self.is_agent_site(site_id);

        let (entry, matched) = asset
            .history
            .iter()
            .filter(|entry| entry.is_scan())
            .find_map(|entry| {
                if wanted_id == Some(entry.scan_id) {
                    Some((entry, ScanMatch::ScanId))
                } else if agent_site {
                    Some((entry, ScanMatch::AgentSite))
                } else {
                    None
                }
            })
            .ok_or_else(|| AssetError::scan_id_not_found(asset, scan_id))?;

        let scan_time = entry
            .parsed_date()
            .map_err(|e| AssetError::invalid_scan_time(asset, scan_id, e))?;

        if is_zero_time(&scan_time) {
            return Err(AssetError::invalid_scan_time(
                asset,
                scan_id,
                ScanTimeError::Zero,
            ));
        }

        if matched == ScanMatch::AgentSite
            && now - scan_time > Duration::hours(AGENT_SCAN_MAX_AGE_HOURS)
        {
            return Err(AssetError::invalid_scan_time(
                asset,
                scan_id,
                ScanTimeError::StaleAgentScan,
            ));
        }

        log::trace!(
            "Asset {} scan time {} resolved via {:?}",
            asset.id,
            scan_time,
            matched
        );
        Ok(scan_time)
    }
}

/// Build the canonical event once the identity fields check out
pub fn to_asset_event(asset: &Asset, scan_time: DateTime<Utc>) -> Result<AssetEvent, AssetError> {
    if asset.missing_field().is_some() {
        return Err(AssetError::missing_information(asset));
    }
    Ok(AssetEvent::new(asset, scan_time))
}

#[cfg(test)]
mod tests;
