//! Great-circle distance and implied travel speed

use thiserror::Error;

use crate::models::{GeoDistance, GeoPoint, TimedGeoPoint};

const EARTH_RADIUS_KM: f64 = 6371.0;
const EARTH_RADIUS_MILES: f64 = 3958.0;
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Errors raised by travel calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("degenerate input: both points observed at timestamp {0}")]
    DegenerateInput(i64),
}

/// Distance and speed calculations used by the detection engine
pub trait GeoCalculator: Send + Sync {
    /// Great-circle distance between two points
    fn distance(&self, from: &GeoPoint, to: &GeoPoint) -> Result<GeoDistance, CalcError>;

    /// Signed number of hours from `earlier` to `later`
    fn elapsed_hours(&self, later: i64, earlier: i64) -> f64 {
        (later as i128 - earlier as i128) as f64 / SECONDS_PER_HOUR
    }

    /// Speed in miles per hour needed to get between two observations,
    /// rounded to a whole number
    fn implied_speed_mph(&self, a: &TimedGeoPoint, b: &TimedGeoPoint) -> Result<f64, CalcError> {
        if a.timestamp == b.timestamp {
            return Err(CalcError::DegenerateInput(a.timestamp));
        }

        let distance = self.distance(&a.point, &b.point)?;
        let hours = self.elapsed_hours(a.timestamp, b.timestamp);

        Ok((distance.miles / hours).round().abs())
    }
}

/// Haversine implementation of [`GeoCalculator`]
#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineCalculator;

impl GeoCalculator for HaversineCalculator {
    fn distance(&self, from: &GeoPoint, to: &GeoPoint) -> Result<GeoDistance, CalcError> {
        check_point(from, "from")?;
        check_point(to, "to")?;

        let delta_lat = (to.latitude - from.latitude).to_radians();
        let delta_lon = (to.longitude - from.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + from.latitude.to_radians().cos()
                * to.latitude.to_radians().cos()
                * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        // Each unit is rounded on its own, never converted from the other
        Ok(GeoDistance {
            kilometers: round_to_hundredths(EARTH_RADIUS_KM * c),
            miles: round_to_hundredths(EARTH_RADIUS_MILES * c),
        })
    }
}

fn check_point(point: &GeoPoint, name: &str) -> Result<(), CalcError> {
    let valid_lat = point.latitude.is_finite() && point.latitude.abs() <= 90.0;
    let valid_lon = point.longitude.is_finite() && point.longitude.abs() <= 180.0;

    if valid_lat && valid_lon {
        Ok(())
    } else {
        Err(CalcError::InvalidArgument(format!(
            "{} point ({}, {}) is not a valid coordinate",
            name, point.latitude, point.longitude
        )))
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint::new(latitude, longitude, 10)
    }

    #[test]
    fn test_known_distances() {
        let calculator = HaversineCalculator;
        let cases = [
            (point(22.55, 43.12), point(13.45, 100.28), 6094.54),
            (point(51.510357, -0.116773), point(38.889931, -77.009003), 5897.66),
            (point(39.1702, -76.8538), point(34.0494, -118.2641), 3707.35),
        ];

        for (from, to, expected_km) in cases {
            let distance = calculator.distance(&from, &to).unwrap();
            assert_eq!(
                distance.kilometers, expected_km,
                "distance from {:?} to {:?} should be {} km, got {:?}",
                from, to, expected_km, distance
            );
        }
    }

    #[test]
    fn test_distance_symmetric() {
        let calculator = HaversineCalculator;
        let nyc = point(40.7128, -74.0060);
        let tokyo = point(35.6762, 139.6503);

        let there = calculator.distance(&nyc, &tokyo).unwrap();
        let back = calculator.distance(&tokyo, &nyc).unwrap();
        assert_eq!(there, back);
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let calculator = HaversineCalculator;
        for p in [point(0.0, 0.0), point(-33.8688, 151.2093), point(90.0, 180.0)] {
            let distance = calculator.distance(&p, &p).unwrap();
            assert_eq!(distance, GeoDistance { kilometers: 0.0, miles: 0.0 });
        }
    }

    #[test]
    fn test_units_rounded_independently() {
        let calculator = HaversineCalculator;
        let distance = calculator
            .distance(&point(22.55, 43.12), &point(13.45, 100.28))
            .unwrap();
        assert_eq!(distance.miles, (distance.miles * 100.0).round() / 100.0);
        assert!((distance.miles - 3786.25).abs() < 0.01);
    }

    #[test]
    fn test_invalid_points_rejected() {
        let calculator = HaversineCalculator;
        let origin = point(0.0, 0.0);

        for bad in [point(f64::NAN, 0.0), point(0.0, f64::INFINITY), point(91.0, 0.0), point(0.0, -181.0)] {
            assert!(matches!(
                calculator.distance(&bad, &origin),
                Err(CalcError::InvalidArgument(_))
            ));
            assert!(matches!(
                calculator.distance(&origin, &bad),
                Err(CalcError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_elapsed_hours() {
        let calculator = HaversineCalculator;
        assert_eq!(calculator.elapsed_hours(1514851200, 1514764800), 24.0);
        assert_eq!(calculator.elapsed_hours(1514764800, 1514851200), -24.0);
        assert_eq!(calculator.elapsed_hours(5400, 0), 1.5);
    }

    #[test]
    fn test_elapsed_hours_extreme_timestamps() {
        let calculator = HaversineCalculator;
        let hours = calculator.elapsed_hours(i64::MAX, i64::MIN);
        assert!(hours.is_finite() && hours > 0.0);
    }

    #[test]
    fn test_implied_speed() {
        let calculator = HaversineCalculator;
        let current = TimedGeoPoint::new(1514764800, point(39.1702, -76.8538));
        let subsequent = TimedGeoPoint::new(1514851200, point(34.0494, -118.2641));

        assert_eq!(calculator.implied_speed_mph(&subsequent, &current).unwrap(), 96.0);
        // Speed is unsigned regardless of argument order
        assert_eq!(calculator.implied_speed_mph(&current, &subsequent).unwrap(), 96.0);
    }

    #[test]
    fn test_implied_speed_same_place() {
        let calculator = HaversineCalculator;
        let a = TimedGeoPoint::new(0, point(10.0, 10.0));
        let b = TimedGeoPoint::new(3600, point(10.0, 10.0));
        assert_eq!(calculator.implied_speed_mph(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn test_implied_speed_equal_timestamps() {
        let calculator = HaversineCalculator;
        let a = TimedGeoPoint::new(1514764800, point(10.0, 10.0));
        let b = TimedGeoPoint::new(1514764800, point(20.0, 20.0));
        assert_eq!(
            calculator.implied_speed_mph(&a, &b),
            Err(CalcError::DegenerateInput(1514764800))
        );
    }

    #[test]
    fn test_implied_speed_invalid_point() {
        let calculator = HaversineCalculator;
        let a = TimedGeoPoint::new(0, point(f64::NAN, 10.0));
        let b = TimedGeoPoint::new(3600, point(20.0, 20.0));
        assert!(matches!(
            calculator.implied_speed_mph(&a, &b),
            Err(CalcError::InvalidArgument(_))
        ));
    }
}
