//! Access event model
//!
//! An [`Event`] can only be built through [`Event::new`], which validates the
//! event id and source IP. Anything holding an `Event` therefore holds a
//! valid one.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Rejected event attribute
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("value: {value} is invalid for argument: {argument}")]
pub struct ValidationError {
    pub value: String,
    pub argument: &'static str,
}

impl ValidationError {
    fn new(value: &str, argument: &'static str) -> Self {
        ValidationError {
            value: value.to_string(),
            argument,
        }
    }
}

/// Wire shape of an event as submitted for ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    #[serde(rename = "event_uuid")]
    pub uuid: String,
    pub username: String,
    #[serde(rename = "unix_timestamp")]
    pub timestamp: i64,
    #[serde(rename = "ip_address")]
    pub ip: String,
}

/// A validated, immutable access event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "EventInfo", into = "EventInfo")]
pub struct Event {
    id: Uuid,
    username: String,
    timestamp: i64,
    source_ip: IpAddr,
}

impl Event {
    /// Build an event, validating the id and source IP
    pub fn new(info: EventInfo) -> Result<Self, ValidationError> {
        let id = Uuid::parse_str(&info.uuid).map_err(|_| ValidationError::new(&info.uuid, "UUID"))?;
        let source_ip =
            IpAddr::from_str(&info.ip).map_err(|_| ValidationError::new(&info.ip, "IP"))?;

        Ok(Event {
            id,
            username: info.username,
            timestamp: info.timestamp,
            source_ip,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Seconds since the Unix epoch
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn source_ip(&self) -> IpAddr {
        self.source_ip
    }

    pub fn to_event_info(&self) -> EventInfo {
        EventInfo {
            uuid: self.id.to_string(),
            username: self.username.clone(),
            timestamp: self.timestamp,
            ip: self.source_ip.to_string(),
        }
    }
}

impl TryFrom<EventInfo> for Event {
    type Error = ValidationError;

    fn try_from(info: EventInfo) -> Result<Self, Self::Error> {
        Event::new(info)
    }
}

impl From<Event> for EventInfo {
    fn from(event: Event) -> Self {
        EventInfo {
            uuid: event.id.to_string(),
            username: event.username,
            timestamp: event.timestamp,
            ip: event.source_ip.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(uuid: &str, ip: &str) -> EventInfo {
        EventInfo {
            uuid: uuid.to_string(),
            username: "john".to_string(),
            timestamp: 1514764800,
            ip: ip.to_string(),
        }
    }

    #[test]
    fn test_valid_event() {
        let event = Event::new(info("85ad929a-db03-4bf4-9541-8f728fa12e42", "206.81.252.6")).unwrap();
        assert_eq!(event.id().to_string(), "85ad929a-db03-4bf4-9541-8f728fa12e42");
        assert_eq!(event.username(), "john");
        assert_eq!(event.timestamp(), 1514764800);
        assert_eq!(event.source_ip().to_string(), "206.81.252.6");
    }

    #[test]
    fn test_ipv6_event() {
        let event = Event::new(info("85ad929a-db03-4bf4-9541-8f728fa12e42", "2001:db8::1")).unwrap();
        assert!(event.source_ip().is_ipv6());
    }

    #[test]
    fn test_negative_timestamp_allowed() {
        let mut raw = info("85ad929a-db03-4bf4-9541-8f728fa12e42", "1.0.0.0");
        raw.timestamp = -86400;
        assert_eq!(Event::new(raw).unwrap().timestamp(), -86400);
    }

    #[test]
    fn test_invalid_uuid() {
        let err = Event::new(info("not-a-uuid", "1.0.0.0")).unwrap_err();
        assert_eq!(err.argument, "UUID");
        assert_eq!(err.value, "not-a-uuid");
        assert!(err.to_string().contains("not-a-uuid"));
    }

    #[test]
    fn test_invalid_ip() {
        for ip in ["", "256.1.1.1", "1.2.3", "localhost", "2001:db8::zz"] {
            let err = Event::new(info("85ad929a-db03-4bf4-9541-8f728fa12e42", ip)).unwrap_err();
            assert_eq!(err.argument, "IP", "{} should be rejected", ip);
        }
    }

    #[test]
    fn test_invalid_uuid_reported_before_ip() {
        let err = Event::new(info("nope", "nope")).unwrap_err();
        assert_eq!(err.argument, "UUID");
    }

    #[test]
    fn test_deserialize_payload() {
        let json = r#"{
            "username": "bob",
            "unix_timestamp": 1514764800,
            "event_uuid": "85ad929a-db03-4bf4-9541-8f728fa12e42",
            "ip_address": "206.81.252.6"
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.username(), "bob");
        assert_eq!(event.timestamp(), 1514764800);
    }

    #[test]
    fn test_deserialize_rejects_invalid_ip() {
        let json = r#"{
            "username": "bob",
            "unix_timestamp": 1514764800,
            "event_uuid": "85ad929a-db03-4bf4-9541-8f728fa12e42",
            "ip_address": "206.81.252"
        }"#;
        let err = serde_json::from_str::<Event>(json).unwrap_err();
        assert!(err.to_string().contains("IP"));
    }

    #[test]
    fn test_deserialize_requires_all_fields() {
        let json = r#"{"username": "bob", "event_uuid": "85ad929a-db03-4bf4-9541-8f728fa12e42"}"#;
        assert!(serde_json::from_str::<Event>(json).is_err());
    }

    #[test]
    fn test_serialize_uses_wire_names() {
        let event = Event::new(info("85ad929a-db03-4bf4-9541-8f728fa12e42", "1.0.0.0")).unwrap();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_uuid"], "85ad929a-db03-4bf4-9541-8f728fa12e42");
        assert_eq!(value["unix_timestamp"], 1514764800);
        assert_eq!(value["ip_address"], "1.0.0.0");
        assert_eq!(value["username"], "john");
    }
}
