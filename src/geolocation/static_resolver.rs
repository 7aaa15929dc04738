//! Fixed IP-to-location table

use std::collections::HashMap;
use std::net::IpAddr;

use super::{GeoError, GeoResolver};
use crate::models::GeoPoint;

/// Resolver backed by an in-memory table
///
/// Useful for tests, replays against known fixtures, and deployments that
/// only need to place a handful of egress addresses.
#[derive(Debug, Clone, Default)]
pub struct StaticGeoResolver {
    points: HashMap<IpAddr, GeoPoint>,
}

impl StaticGeoResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the location of `ip`
    pub fn with_point(mut self, ip: IpAddr, point: GeoPoint) -> Self {
        self.points.insert(ip, point);
        self
    }

    pub fn insert(&mut self, ip: IpAddr, point: GeoPoint) {
        self.points.insert(ip, point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl FromIterator<(IpAddr, GeoPoint)> for StaticGeoResolver {
    fn from_iter<I: IntoIterator<Item = (IpAddr, GeoPoint)>>(iter: I) -> Self {
        StaticGeoResolver {
            points: iter.into_iter().collect(),
        }
    }
}

impl GeoResolver for StaticGeoResolver {
    fn resolve(&self, ip: &IpAddr) -> Result<Option<GeoPoint>, GeoError> {
        Ok(self.points.get(ip).copied())
    }
}
