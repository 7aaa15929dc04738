//! IP Geolocation module using MaxMind GeoLite2 database
//!
//! This module maps IP addresses to city-level [`GeoPoint`]s. The production
//! resolver reads the MaxMind GeoLite2-City database; users must download the
//! database file separately from MaxMind (free with registration).
//!
//! An address the database knows nothing about is not an error: resolvers
//! return `Ok(None)` for private and reserved ranges and for addresses without
//! coordinates. Only an unreadable or corrupt database is an error.

pub mod static_resolver;

pub use static_resolver::StaticGeoResolver;

use maxminddb::{geoip2, MaxMindDBError, Reader};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::models::GeoPoint;

/// Errors that can occur during geolocation lookups
#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Failed to read geo database: {0}")]
    Database(#[from] MaxMindDBError),

    #[error("Database file not found: {0}")]
    FileNotFound(String),
}

/// Maps an IP address to a city-level location
pub trait GeoResolver: Send + Sync {
    /// Resolve `ip`, returning `None` when its location is unknown
    fn resolve(&self, ip: &IpAddr) -> Result<Option<GeoPoint>, GeoError>;
}

/// GeoIP lookup service using MaxMind GeoLite2-City database
///
/// # Example
///
/// ```ignore
/// use hermes::geolocation::{GeoResolver, MaxMindGeoResolver};
/// use std::net::IpAddr;
///
/// let resolver = MaxMindGeoResolver::new("GeoLite2-City.mmdb")?;
/// let ip: IpAddr = "8.8.8.8".parse().unwrap();
/// if let Some(point) = resolver.resolve(&ip)? {
///     println!("Location: {}, {}", point.latitude, point.longitude);
/// }
/// ```
pub struct MaxMindGeoResolver {
    reader: Arc<Reader<Vec<u8>>>,
}

impl MaxMindGeoResolver {
    /// Open a MaxMind city database file
    ///
    /// # Errors
    ///
    /// Returns an error if the database file cannot be opened or is invalid.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, GeoError> {
        let path = db_path.as_ref();
        if !path.exists() {
            return Err(GeoError::FileNotFound(path.display().to_string()));
        }

        let reader = Reader::open_readfile(path)?;
        log::info!(
            "Loaded geo database {} ({})",
            path.display(),
            reader.metadata.database_type
        );

        Ok(MaxMindGeoResolver {
            reader: Arc::new(reader),
        })
    }
}

impl GeoResolver for MaxMindGeoResolver {
    fn resolve(&self, ip: &IpAddr) -> Result<Option<GeoPoint>, GeoError> {
        let city: geoip2::City = match self.reader.lookup(*ip) {
            Ok(city) => city,
            Err(MaxMindDBError::AddressNotFoundError(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let point = city.location.and_then(|location| {
            let latitude = location.latitude?;
            let longitude = location.longitude?;
            Some(GeoPoint {
                latitude,
                longitude,
                accuracy_radius: location.accuracy_radius.unwrap_or(0),
            })
        });

        Ok(point)
    }
}

impl Clone for MaxMindGeoResolver {
    fn clone(&self) -> Self {
        MaxMindGeoResolver {
            reader: Arc::clone(&self.reader),
        }
    }
}
