use serde::{Serialize, Serializer};
use std::net::IpAddr;

use super::{Event, GeoPoint};

/// The event under evaluation and its closest neighbors in time
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedEventInfo {
    pub current: Event,
    pub previous: Option<Event>,
    pub subsequent: Option<Event>,
}

impl RelatedEventInfo {
    pub fn new(current: Event) -> Self {
        RelatedEventInfo {
            current,
            previous: None,
            subsequent: None,
        }
    }
}

/// Where and when a neighboring access happened, and how fast the user
/// would have had to travel to or from it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedAccessInfo {
    pub ip: IpAddr,
    /// Implied travel speed in miles per hour
    #[serde(serialize_with = "serialize_speed")]
    pub speed: f64,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    #[serde(rename = "radius")]
    pub accuracy_radius: u16,
    pub timestamp: i64,
}

impl RelatedAccessInfo {
    pub fn new(neighbor: &Event, point: &GeoPoint, speed: f64) -> Self {
        RelatedAccessInfo {
            ip: neighbor.source_ip(),
            speed,
            latitude: point.latitude,
            longitude: point.longitude,
            accuracy_radius: point.accuracy_radius,
            timestamp: neighbor.timestamp(),
        }
    }
}

/// Whole speeds are written as JSON integers (`56`, not `56.0`)
fn serialize_speed<S: Serializer>(speed: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    let whole = speed.fract() == 0.0 && speed.abs() < i64::MAX as f64;
    if whole {
        serializer.serialize_i64(*speed as i64)
    } else {
        serializer.serialize_f64(*speed)
    }
}

/// Verdict for one processed event
///
/// The travel flags and access infos are only ever set in pairs; an absent
/// flag means the neighbor did not exist or could not be located, which is
/// not the same as `false`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousTravelResult {
    current_geo: GeoPoint,
    #[serde(
        rename = "travelToCurrentGeoSuspicious",
        skip_serializing_if = "Option::is_none"
    )]
    travel_to_current_suspicious: Option<bool>,
    #[serde(
        rename = "travelFromCurrentGeoSuspicious",
        skip_serializing_if = "Option::is_none"
    )]
    travel_from_current_suspicious: Option<bool>,
    #[serde(rename = "precedingIpAccess", skip_serializing_if = "Option::is_none")]
    preceding_access: Option<RelatedAccessInfo>,
    #[serde(rename = "subsequentIpAccess", skip_serializing_if = "Option::is_none")]
    subsequent_access: Option<RelatedAccessInfo>,
}

impl SuspiciousTravelResult {
    pub fn new(current_geo: GeoPoint) -> Self {
        SuspiciousTravelResult {
            current_geo,
            travel_to_current_suspicious: None,
            travel_from_current_suspicious: None,
            preceding_access: None,
            subsequent_access: None,
        }
    }

    /// Record travel from the preceding access to the current one
    pub fn set_preceding(&mut self, access: RelatedAccessInfo, suspicious: bool) {
        self.travel_to_current_suspicious = Some(suspicious);
        self.preceding_access = Some(access);
    }

    /// Record travel from the current access to the subsequent one
    pub fn set_subsequent(&mut self, access: RelatedAccessInfo, suspicious: bool) {
        self.travel_from_current_suspicious = Some(suspicious);
        self.subsequent_access = Some(access);
    }

    pub fn current_geo(&self) -> &GeoPoint {
        &self.current_geo
    }

    pub fn travel_to_current_suspicious(&self) -> Option<bool> {
        self.travel_to_current_suspicious
    }

    pub fn travel_from_current_suspicious(&self) -> Option<bool> {
        self.travel_from_current_suspicious
    }

    pub fn preceding_access(&self) -> Option<&RelatedAccessInfo> {
        self.preceding_access.as_ref()
    }

    pub fn subsequent_access(&self) -> Option<&RelatedAccessInfo> {
        self.subsequent_access.as_ref()
    }

    /// True if either leg of travel reached the suspicious speed
    pub fn is_suspicious(&self) -> bool {
        self.travel_to_current_suspicious.unwrap_or(false)
            || self.travel_from_current_suspicious.unwrap_or(false)
    }
}
