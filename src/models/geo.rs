use serde::{Deserialize, Serialize};

/// City-level location of an IP address
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    /// Accuracy radius in kilometers, as reported by the geo database
    #[serde(rename = "radius")]
    pub accuracy_radius: u16,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64, accuracy_radius: u16) -> Self {
        GeoPoint {
            latitude,
            longitude,
            accuracy_radius,
        }
    }
}

/// Great-circle distance, each unit rounded to two decimals
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoDistance {
    pub kilometers: f64,
    pub miles: f64,
}

/// A location observed at a point in time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedGeoPoint {
    pub timestamp: i64,
    pub point: GeoPoint,
}

impl TimedGeoPoint {
    pub fn new(timestamp: i64, point: GeoPoint) -> Self {
        TimedGeoPoint { timestamp, point }
    }
}
