//! Tests for scan correlation and event conversion

use super::*;
use crate::core::time::MockTimeProvider;
use crate::domain::{AssetHistoryEntry, HistoryEventType};
use chrono::TimeZone;

const AGENT_SITE: &str = "agent-site-1";

fn validation_moment() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 4, 23, 12, 0, 0).unwrap()
}

fn validator() -> AssetValidator {
    AssetValidator::with_clock(
        AGENT_SITE,
        Arc::new(MockTimeProvider::at(validation_moment())),
    )
}

fn asset_with(history: Vec<AssetHistoryEntry>) -> Asset {
    Asset {
        id: 1,
        ip: "127.0.0.1".to_string(),
        hostname: String::new(),
        history,
    }
}

#[test]
fn test_matching_scan_id_produces_event() {
    let asset = asset_with(vec![AssetHistoryEntry::scan("2019-04-22T15:02:44.000Z", 55)]);

    let (events, errors) = validator().validate_assets(&[asset], "55", "site-1");

    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    assert_eq!(
        events,
        vec![AssetEvent {
            id: 1,
            ip: "127.0.0.1".to_string(),
            hostname: String::new(),
            scan_time: Utc.with_ymd_and_hms(2019, 4, 22, 15, 2, 44).unwrap(),
        }]
    );
}

#[test]
fn test_mismatched_scan_id_is_not_found() {
    let asset = asset_with(vec![AssetHistoryEntry::scan("2019-04-22T15:02:44.000Z", 55)]);

    let (events, errors) = validator().validate_assets(&[asset], "56", "site-1");

    assert!(events.is_empty());
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        AssetError::ScanIdNotFound { scan_id, asset_id: 1, .. } if scan_id == "56"
    ));
}

#[test]
fn test_non_scan_entries_never_match() {
    let asset = asset_with(vec![AssetHistoryEntry {
        event_type: HistoryEventType::Other,
        date: "2019-04-22T15:02:44.000Z".to_string(),
        scan_id: 55,
    }]);

    let (_, errors) = validator().validate_assets(&[asset], "55", AGENT_SITE);

    assert!(matches!(errors[0], AssetError::ScanIdNotFound { .. }));
}

#[test]
fn test_empty_history_is_not_found() {
    let (_, errors) = validator().validate_assets(&[asset_with(vec![])], "55", "site-1");
    assert!(matches!(errors[0], AssetError::ScanIdNotFound { .. }));
}

#[test]
fn test_first_matching_entry_wins_over_later_dates() {
    // Stored order is not chronological; the first correlated entry is used
    let asset = asset_with(vec![
        AssetHistoryEntry::scan("2019-04-20T08:00:00Z", 55),
        AssetHistoryEntry::scan("2019-04-22T15:02:44Z", 55),
    ]);

    let (events, _) = validator().validate_assets(&[asset], "55", "site-1");

    assert_eq!(
        events[0].scan_time,
        Utc.with_ymd_and_hms(2019, 4, 20, 8, 0, 0).unwrap()
    );
}

#[test]
fn test_first_match_skips_uncorrelated_entries() {
    let asset = asset_with(vec![
        AssetHistoryEntry::scan("not a date", 12),
        AssetHistoryEntry::scan("2019-04-22T15:02:44Z", 55),
    ]);

    let (events, errors) = validator().validate_assets(&[asset], "55", "site-1");

    assert!(errors.is_empty());
    assert_eq!(events.len(), 1);
}

#[test]
fn test_unparsable_date_is_invalid_scan_time() {
    let asset = asset_with(vec![AssetHistoryEntry::scan("iamnotadate", 55)]);

    let (events, errors) = validator().validate_assets(&[asset], "55", "site-1");

    assert!(events.is_empty());
    assert!(matches!(
        errors[0],
        AssetError::InvalidScanTime {
            source: ScanTimeError::Parse(_),
            ..
        }
    ));
}

#[test]
fn test_non_rfc3339_date_is_rejected() {
    for date in [
        "2019-04-22 15:02:44",
        "2019-04-22 15:02:44Z",
        "2019-04-22t15:02:44z",
    ] {
        let asset = asset_with(vec![AssetHistoryEntry::scan(date, 55)]);

        let (events, errors) = validator().validate_assets(&[asset], "55", "site-1");

        assert!(events.is_empty(), "accepted {}", date);
        assert!(
            matches!(errors[0], AssetError::InvalidScanTime { .. }),
            "wrong rejection for {}: {}",
            date,
            errors[0]
        );
    }
}

#[test]
fn test_epoch_scan_time_with_matching_id_is_accepted() {
    let asset = asset_with(vec![AssetHistoryEntry::scan("1970-01-01T00:00:00Z", 55)]);

    let (events, errors) = validator().validate_assets(&[asset], "55", "site-1");

    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    assert_eq!(events[0].scan_time, DateTime::from_timestamp(0, 0).unwrap());
}

#[test]
fn test_zero_scan_time_is_rejected() {
    let asset = asset_with(vec![AssetHistoryEntry::scan("0001-01-01T00:00:00Z", 55)]);

    let (_, errors) = validator().validate_assets(&[asset], "55", "site-1");

    assert!(matches!(
        errors[0],
        AssetError::InvalidScanTime {
            source: ScanTimeError::Zero,
            ..
        }
    ));
    assert!(errors[0].to_string().contains("scan time is zero"));
}

#[test]
fn test_agent_site_matches_without_scan_id() {
    let asset = asset_with(vec![AssetHistoryEntry::scan("2019-04-23T02:00:00Z", 0)]);

    let (events, errors) = validator().validate_assets(&[asset], "55", AGENT_SITE);

    assert!(errors.is_empty());
    assert_eq!(
        events[0].scan_time,
        Utc.with_ymd_and_hms(2019, 4, 23, 2, 0, 0).unwrap()
    );
}

#[test]
fn test_stale_agent_scan_is_rejected() {
    // 24h plus one second before the validation moment
    let asset = asset_with(vec![AssetHistoryEntry::scan("2019-04-22T11:59:59Z", 0)]);

    let (events, errors) = validator().validate_assets(&[asset], "55", AGENT_SITE);

    assert!(events.is_empty());
    assert!(matches!(
        errors[0],
        AssetError::InvalidScanTime {
            source: ScanTimeError::StaleAgentScan,
            ..
        }
    ));
}

#[test]
fn test_agent_scan_exactly_one_day_old_is_accepted() {
    let asset = asset_with(vec![AssetHistoryEntry::scan("2019-04-22T12:00:00Z", 0)]);

    let (events, errors) = validator().validate_assets(&[asset], "55", AGENT_SITE);

    assert!(errors.is_empty());
    assert_eq!(events.len(), 1);
}

#[test]
fn test_exact_scan_id_match_has_no_age_limit() {
    let asset = asset_with(vec![AssetHistoryEntry::scan("2015-01-01T00:00:00Z", 55)]);

    let (events, errors) = validator().validate_assets(&[asset.clone()], "55", "site-1");
    assert!(errors.is_empty());
    assert_eq!(events.len(), 1);

    // Same asset on the agent site still correlates by ID first
    let (events, errors) = validator().validate_assets(&[asset], "55", AGENT_SITE);
    assert!(errors.is_empty());
    assert_eq!(events.len(), 1);
}

#[test]
fn test_empty_agent_site_never_matches() {
    let validator = AssetValidator::with_clock("", Arc::new(MockTimeProvider::at(validation_moment())));
    let asset = asset_with(vec![AssetHistoryEntry::scan("2019-04-23T02:00:00Z", 0)]);

    let (_, errors) = validator.validate_assets(&[asset], "55", "");

    assert!(matches!(errors[0], AssetError::ScanIdNotFound { .. }));
}

#[test]
fn test_non_numeric_scan_id_only_matches_agent_site() {
    let asset = asset_with(vec![AssetHistoryEntry::scan("2019-04-23T02:00:00Z", 0)]);

    let (_, errors) = validator().validate_assets(&[asset.clone()], "abc", "site-1");
    assert!(matches!(errors[0], AssetError::ScanIdNotFound { .. }));

    let (events, _) = validator().validate_assets(&[asset], "abc", AGENT_SITE);
    assert_eq!(events.len(), 1);
}

#[test]
fn test_missing_identity_rejected_after_scan_time_resolves() {
    let history = vec![AssetHistoryEntry::scan("2019-04-22T15:02:44Z", 55)];
    let no_id = Asset {
        id: 0,
        ..asset_with(history.clone())
    };
    let no_address = Asset {
        ip: String::new(),
        hostname: String::new(),
        ..asset_with(history)
    };

    let (events, errors) = validator().validate_assets(&[no_id, no_address], "55", "site-1");

    assert!(events.is_empty());
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|e| matches!(e, AssetError::MissingRequiredInformation { .. })));
}

#[test]
fn test_hostname_alone_is_sufficient_identity() {
    let asset = Asset {
        ip: String::new(),
        hostname: "db01.internal".to_string(),
        ..asset_with(vec![AssetHistoryEntry::scan("2019-04-22T15:02:44Z", 55)])
    };

    let (events, errors) = validator().validate_assets(&[asset], "55", "site-1");

    assert!(errors.is_empty());
    assert_eq!(events[0].hostname, "db01.internal");
}

#[test]
fn test_rejections_are_isolated_and_order_preserved() {
    let good = |id: i64| Asset {
        id,
        ..asset_with(vec![AssetHistoryEntry::scan("2019-04-22T15:02:44Z", 55)])
    };
    let bad = asset_with(vec![AssetHistoryEntry::scan("2019-04-22T15:02:44Z", 1)]);
    let assets = vec![good(3), bad, good(1), good(2)];

    let (events, errors) = validator().validate_assets(&assets, "55", "site-1");

    let ids: Vec<i64> = events.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![3, 1, 2]);
    assert_eq!(errors.len(), 1);
}

#[test]
fn test_staleness_uses_clock_at_validation() {
    let clock = MockTimeProvider::at(validation_moment());
    let validator = AssetValidator::with_clock(AGENT_SITE, Arc::new(clock.clone()));
    let asset = asset_with(vec![AssetHistoryEntry::scan("2019-04-23T02:00:00Z", 0)]);

    let (events, _) = validator.validate_assets(&[asset.clone()], "55", AGENT_SITE);
    assert_eq!(events.len(), 1);

    clock.advance_time(Duration::days(2));
    let (events, errors) = validator.validate_assets(&[asset], "55", AGENT_SITE);
    assert!(events.is_empty());
    assert!(matches!(
        errors[0],
        AssetError::InvalidScanTime {
            source: ScanTimeError::StaleAgentScan,
            ..
        }
    ));
}

#[test]
fn test_to_asset_event_checks_identity() {
    let time = validation_moment();
    assert!(to_asset_event(&asset_with(vec![]), time).is_ok());
    assert!(matches!(
        to_asset_event(&Asset::default(), time),
        Err(AssetError::MissingRequiredInformation { .. })
    ));
}

#[test]
fn test_scan_id_compared_by_numeric_value() {
    for scan_id in ["55", "055", "+55", " 55 "] {
        let asset = asset_with(vec![AssetHistoryEntry::scan("2019-04-22T15:02:44Z", 55)]);

        let (events, errors) = validator().validate_assets(&[asset], scan_id, "site-1");

        assert!(errors.is_empty(), "scan ID {:?} rejected: {:?}", scan_id, errors);
        assert_eq!(events.len(), 1);
    }
}
