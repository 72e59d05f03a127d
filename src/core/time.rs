//! Clock abstraction for time-dependent validation rules

use chrono::{DateTime, Utc};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// Source of the current wall-clock time
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production time provider backed by the system clock
#[derive(Debug, Default, Clone)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Time provider frozen at a settable instant, for deterministic tests
#[derive(Clone)]
#[cfg(test)]
pub struct MockTimeProvider {
    current: Arc<Mutex<DateTime<Utc>>>,
}

#[cfg(test)]
impl MockTimeProvider {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance_time(&self, duration: chrono::Duration) {
        let mut current = self.current.lock().unwrap();
        *current += duration;
    }
}

#[cfg(test)]
impl TimeProvider for MockTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_system_time_provider_tracks_clock() {
        let provider = SystemTimeProvider;
        let before = Utc::now();
        let now = provider.now();
        assert!(now >= before);
    }

    #[test]
    fn test_mock_time_provider_advances() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let provider = MockTimeProvider::at(start);
        assert_eq!(provider.now(), start);

        provider.advance_time(Duration::hours(25));
        assert_eq!(provider.now(), start + Duration::hours(25));
    }
}
