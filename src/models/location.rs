use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-supplied values for one apply. Accuracy and speed default to 3 m and 0 m/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub speed_mps: f64,
}

impl MockRequest {
    pub const DEFAULT_ACCURACY_M: f64 = 3.0;
    pub const DEFAULT_SPEED_MPS: f64 = 0.0;
    /// Fixes carry accuracy and speed as `f32`; anything above this would saturate.
    pub const MAX_MAGNITUDE: f64 = f32::MAX as f64;

    /// Whether `value` is usable as an accuracy or speed.
    pub fn is_valid_magnitude(value: f64) -> bool {
        (0.0..=Self::MAX_MAGNITUDE).contains(&value)
    }

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: Self::DEFAULT_ACCURACY_M,
            speed_mps: Self::DEFAULT_SPEED_MPS,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = speed_mps;
        self
    }
}

/// A synthetic fix attributed to one provider.
///
/// Each backend gets its own instance built from the same [`MockRequest`], so the
/// fields are read-only after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct MockFix {
    provider: String,
    latitude: f64,
    longitude: f64,
    accuracy: f32,
    speed: f32,
    timestamp: DateTime<Utc>,
    /// Monotonic time since boot; the OS uses it to reject stale fixes.
    elapsed_realtime: Option<Duration>,
}

impl MockFix {
    pub fn new(
        provider: impl Into<String>,
        request: &MockRequest,
        timestamp: DateTime<Utc>,
        elapsed_realtime: Option<Duration>,
    ) -> Self {
        Self {
            provider: provider.into(),
            latitude: request.latitude,
            longitude: request.longitude,
            accuracy: request.accuracy as f32,
            speed: request.speed_mps as f32,
            timestamp,
            elapsed_realtime,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn accuracy(&self) -> f32 {
        self.accuracy
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn elapsed_realtime(&self) -> Option<Duration> {
        self.elapsed_realtime
    }
}

/// A fix as the OS reports it back from a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub provider: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f32,
    pub time: DateTime<Utc>,
}

impl From<&MockFix> for Location {
    fn from(fix: &MockFix) -> Self {
        Self {
            provider: fix.provider.clone(),
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy,
            time: fix.timestamp,
        }
    }
}

/// Query result handed back to callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f32,
}

impl From<Location> for LocationFix {
    fn from(location: Location) -> Self {
        Self {
            latitude: location.latitude,
            longitude: location.longitude,
            accuracy: location.accuracy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fix_narrows_accuracy_and_speed() {
        let request = MockRequest::new(37.422, -122.084)
            .with_accuracy(5.0)
            .with_speed(1.5);
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let fix = MockFix::new("gps", &request, at, Some(Duration::from_secs(42)));

        assert_eq!(fix.provider(), "gps");
        assert_eq!(fix.accuracy(), 5.0_f32);
        assert_eq!(fix.speed(), 1.5_f32);
        assert_eq!(fix.elapsed_realtime(), Some(Duration::from_secs(42)));
    }

    #[test]
    fn magnitudes_must_fit_a_fix() {
        assert!(MockRequest::is_valid_magnitude(0.0));
        assert!(MockRequest::is_valid_magnitude(250.0));
        assert!(!MockRequest::is_valid_magnitude(-0.5));
        assert!(!MockRequest::is_valid_magnitude(1e300));
        assert!(!MockRequest::is_valid_magnitude(f64::INFINITY));
        assert!(!MockRequest::is_valid_magnitude(f64::NAN));
    }

    #[test]
    fn location_fix_serializes_three_keys() {
        let fix = LocationFix {
            latitude: 1.0,
            longitude: 2.0,
            accuracy: 3.0,
        };
        let value = serde_json::to_value(fix).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object["latitude"], 1.0);
        assert_eq!(object["accuracy"], 3.0);
    }
}
