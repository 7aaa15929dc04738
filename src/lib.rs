pub mod config;
pub mod detection;
pub mod generator;
pub mod geolocation;
pub mod input;
pub mod models;
pub mod output;
pub mod persistence;

// Re-export commonly used types
pub use config::Config;
pub use detection::{DetectionEngine, DetectionError, GeoCalculator, HaversineCalculator};
pub use geolocation::{GeoResolver, MaxMindGeoResolver, StaticGeoResolver};
pub use models::{Event, EventInfo, GeoPoint, SuspiciousTravelResult};
pub use persistence::{EventStore, SqliteEventStore};
