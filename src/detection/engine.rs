//! Impossible travel detection
//!
//! [`DetectionEngine`] stores an incoming event, finds the user's closest
//! earlier and later events, locates all three by IP and flags each leg of
//! travel whose implied speed reaches the configured threshold.

use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::calculator::{CalcError, GeoCalculator, HaversineCalculator};
use super::limiter::{ConnectionLimiter, LimiterError};
use super::neighbors::NeighborSelector;
use crate::config::Config;
use crate::geolocation::{GeoError, GeoResolver};
use crate::models::{
    Event, EventInfo, GeoPoint, RelatedAccessInfo, RelatedEventInfo, SuspiciousTravelResult,
    TimedGeoPoint, ValidationError,
};
use crate::persistence::{EventStore, PersistenceError};

const DEFAULT_MAX_CONNECTIONS: usize = 200;

/// Errors that reject an event; no partial result is ever returned
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Invalid event: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Malformed event payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Cannot find geo information for event {event_id} (ip {ip})")]
    ResolutionFailed { event_id: Uuid, ip: IpAddr },

    #[error("Storage error: {0}")]
    Storage(#[from] PersistenceError),

    #[error("Geo lookup error: {0}")]
    Geo(#[from] GeoError),

    #[error("Travel calculation error: {0}")]
    Calculation(#[from] CalcError),

    #[error(transparent)]
    Limiter(#[from] LimiterError),
}

/// Evaluates events for impossible travel
///
/// Cloning is cheap; clones share the store, resolver and connection limits.
#[derive(Clone)]
pub struct DetectionEngine {
    store: Arc<dyn EventStore>,
    resolver: Arc<dyn GeoResolver>,
    calculator: Arc<dyn GeoCalculator>,
    suspicious_speed_mph: f64,
    store_limiter: ConnectionLimiter,
    geo_limiter: ConnectionLimiter,
}

impl DetectionEngine {
    /// Create an engine with the haversine calculator and default
    /// connection limits
    pub fn new(
        store: Arc<dyn EventStore>,
        resolver: Arc<dyn GeoResolver>,
        suspicious_speed_mph: f64,
    ) -> Self {
        DetectionEngine {
            store,
            resolver,
            calculator: Arc::new(HaversineCalculator),
            suspicious_speed_mph,
            store_limiter: ConnectionLimiter::new("event_db", DEFAULT_MAX_CONNECTIONS),
            geo_limiter: ConnectionLimiter::new("geo_db", DEFAULT_MAX_CONNECTIONS),
        }
    }

    /// Create an engine using the threshold and connection limits from `config`
    pub fn from_config(
        config: &Config,
        store: Arc<dyn EventStore>,
        resolver: Arc<dyn GeoResolver>,
    ) -> Self {
        DetectionEngine::new(store, resolver, config.detection.suspicious_speed_mph).with_limiters(
            ConnectionLimiter::new("event_db", config.event_db.max_connections),
            ConnectionLimiter::new("geo_db", config.geo_db.max_connections),
        )
    }

    pub fn with_calculator(mut self, calculator: Arc<dyn GeoCalculator>) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn with_limiters(mut self, store_limiter: ConnectionLimiter, geo_limiter: ConnectionLimiter) -> Self {
        self.store_limiter = store_limiter;
        self.geo_limiter = geo_limiter;
        self
    }

    pub fn suspicious_speed_mph(&self) -> f64 {
        self.suspicious_speed_mph
    }

    /// Decode an ingestion payload and process it
    ///
    /// Malformed JSON, a `null` payload and invalid ids or IPs are all
    /// rejected before the store is touched.
    pub async fn process_payload(&self, payload: &str) -> Result<SuspiciousTravelResult, DetectionError> {
        let info: Option<EventInfo> = serde_json::from_str(payload)?;
        let info = info.ok_or_else(|| DetectionError::InvalidArgument("event cannot be null".to_string()))?;
        let event = Event::new(info)?;
        self.process_event(event).await
    }

    /// Store `event` and assess travel to it from the user's previous access
    /// and from it to the user's subsequent access
    pub async fn process_event(&self, event: Event) -> Result<SuspiciousTravelResult, DetectionError> {
        let related = self.find_related_events(event).await?;
        let current = &related.current;

        let current_geo = self
            .resolve(current)
            .await?
            .ok_or(DetectionError::ResolutionFailed {
                event_id: current.id(),
                ip: current.source_ip(),
            })?;

        let mut result = SuspiciousTravelResult::new(current_geo);
        let here = TimedGeoPoint::new(current.timestamp(), current_geo);

        if let Some(previous) = &related.previous {
            if let Some((access, suspicious)) = self.assess_neighbor(&here, previous).await? {
                result.set_preceding(access, suspicious);
            }
        }

        if let Some(subsequent) = &related.subsequent {
            if let Some((access, suspicious)) = self.assess_neighbor(&here, subsequent).await? {
                result.set_subsequent(access, suspicious);
            }
        }

        log::debug!(
            "Processed event {} for user '{}' (to current: {:?}, from current: {:?})",
            current.id(),
            current.username(),
            result.travel_to_current_suspicious(),
            result.travel_from_current_suspicious()
        );

        Ok(result)
    }

    async fn find_related_events(&self, event: Event) -> Result<RelatedEventInfo, DetectionError> {
        let store = Arc::clone(&self.store);
        let pending = event.clone();
        let history = self
            .store_limiter
            .run_blocking(move || store.insert_and_scan(&pending))
            .await??;

        Ok(NeighborSelector::select(event, &history))
    }

    async fn resolve(&self, event: &Event) -> Result<Option<GeoPoint>, DetectionError> {
        let resolver = Arc::clone(&self.resolver);
        let ip = event.source_ip();
        let point = self
            .geo_limiter
            .run_blocking(move || resolver.resolve(&ip))
            .await??;

        Ok(point)
    }

    /// Speed and verdict for one neighbor, or `None` if it cannot be located
    async fn assess_neighbor(
        &self,
        here: &TimedGeoPoint,
        neighbor: &Event,
    ) -> Result<Option<(RelatedAccessInfo, bool)>, DetectionError> {
        let Some(point) = self.resolve(neighbor).await? else {
            log::debug!(
                "No geo information for neighboring event {} (ip {}), skipping",
                neighbor.id(),
                neighbor.source_ip()
            );
            return Ok(None);
        };

        let there = TimedGeoPoint::new(neighbor.timestamp(), point);
        let speed = self.calculator.implied_speed_mph(here, &there)?;
        let suspicious = speed >= self.suspicious_speed_mph;

        Ok(Some((RelatedAccessInfo::new(neighbor, &point, speed), suspicious)))
    }
}
