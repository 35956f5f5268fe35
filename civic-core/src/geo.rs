//! Great-circle geometry for complaint coordinates.
//!
//! Distances use the haversine formula on a spherical Earth of mean radius
//! 6,371 km, which is accurate well within the tens-to-thousands of meters the
//! duplicate and clustering thresholds operate at.
//!
//! # Sentinel coordinate
//!
//! A coordinate of exactly `(0.0, 0.0)` means "no GPS fix" and is never treated
//! as a real location. Use [`Coordinate::is_usable`] (or [`usable`]) before any
//! location-based decision.

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::error::{CivicError, Result};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree used for bounding boxes.
///
/// Slightly below the true ~111,195 m/degree so the derived box is never
/// narrower than the radius it covers.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting values outside the WGS84 ranges.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite()
            || !longitude.is_finite()
            || !(-90.0..=90.0).contains(&latitude)
            || !(-180.0..=180.0).contains(&longitude)
        {
            return Err(CivicError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Build a coordinate from independently nullable parts.
    ///
    /// Both parts must be present; range validation is not applied since
    /// stored records are taken as-is.
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Self {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    /// True for the `(0.0, 0.0)` "no GPS" sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }

    /// True when this coordinate may be used for location decisions.
    pub fn is_usable(&self) -> bool {
        !self.is_sentinel()
    }

    /// Geohash cell of this coordinate at the given precision.
    pub fn geohash(&self, precision: usize) -> Result<String> {
        geohash::encode(
            geohash::Coord {
                x: self.longitude,
                y: self.latitude,
            },
            precision,
        )
        .map_err(|_| CivicError::InvalidCoordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

/// Filter an optional coordinate down to a usable one.
pub fn usable(coordinate: Option<Coordinate>) -> Option<Coordinate> {
    coordinate.filter(Coordinate::is_usable)
}

/// Haversine distance between two coordinates, in meters.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Round a distance to two decimals for display.
pub fn round_meters(distance: f64) -> f64 {
    (distance * 100.0).round() / 100.0
}

/// A latitude/longitude range containing every point within some radius of
/// a center.
///
/// Longitude bounds are kept unwrapped (they may extend past ±180 near the
/// antimeridian); [`BoundingBox::contains`] accounts for the wrap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// Whether the box spans every longitude.
    pub fn spans_all_longitudes(&self) -> bool {
        self.lon_max - self.lon_min >= 360.0
    }

    /// Check whether a coordinate falls inside the box (bounds inclusive).
    pub fn contains(&self, coordinate: Coordinate) -> bool {
        if coordinate.latitude < self.lat_min || coordinate.latitude > self.lat_max {
            return false;
        }
        if self.spans_all_longitudes() {
            return true;
        }
        let lon = coordinate.longitude;
        [lon, lon - 360.0, lon + 360.0]
            .iter()
            .any(|l| *l >= self.lon_min && *l <= self.lon_max)
    }
}

/// Conservative bounding box around `center` for `radius_meters`.
///
/// The latitude half-width is `radius / 111,000` degrees. The longitude
/// half-width covers the circle's widest point, which lies poleward of the
/// center: `asin(sin d / cos lat)` for angular radius `d`, never less than
/// `lat_delta / cos(lat)`. At the equator it is the unscaled delta. Boxes
/// touching a pole, or circles enclosing one, span every longitude.
pub fn bounding_box(center: Coordinate, radius_meters: f64) -> BoundingBox {
    let radius = radius_meters.max(0.0);
    let lat_delta = radius / METERS_PER_DEGREE;

    let lat_min = center.latitude - lat_delta;
    let lat_max = center.latitude + lat_delta;

    let lon_delta = if center.latitude == 0.0 {
        lat_delta
    } else {
        widest_longitude_delta(center.latitude, radius, lat_delta)
    };

    if lat_min <= -90.0 || lat_max >= 90.0 || lon_delta >= 180.0 {
        return BoundingBox {
            lat_min: lat_min.max(-90.0),
            lat_max: lat_max.min(90.0),
            lon_min: -180.0,
            lon_max: 180.0,
        };
    }

    BoundingBox {
        lat_min,
        lat_max,
        lon_min: center.longitude - lon_delta,
        lon_max: center.longitude + lon_delta,
    }
}

/// Longitude half-width, in degrees, of a circle centered at `latitude`.
///
/// The angular radius is taken from `lat_delta` so it carries the same
/// 111,000 m/degree margin as the latitude bounds.
fn widest_longitude_delta(latitude: f64, radius_meters: f64, lat_delta: f64) -> f64 {
    let cos_lat = latitude.to_radians().cos().abs();
    let angular = lat_delta.to_radians();
    if radius_meters <= 0.0 {
        return 0.0;
    }
    if angular >= FRAC_PI_2 || cos_lat <= angular.sin() {
        return f64::INFINITY;
    }

    let widest = (angular.sin() / cos_lat).asin().to_degrees();
    widest.max(lat_delta / cos_lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = coord(12.9716, 77.5946);
        let b = coord(12.9352, 77.6245);
        assert_eq!(distance_meters(a, b), distance_meters(b, a));
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let a = coord(-33.8688, 151.2093);
        assert_eq!(distance_meters(a, a), 0.0);
    }

    #[test]
    fn test_distance_known_value() {
        // One degree of latitude on a 6,371 km sphere.
        let d = distance_meters(coord(10.0, 20.0), coord(11.0, 20.0));
        assert!((d - 111_194.93).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_distance_small_offset() {
        let a = coord(28.6139, 77.2090);
        let b = coord(28.6139 + 100.0 / 111_195.0, 77.2090);
        let d = distance_meters(a, b);
        assert!((d - 100.0).abs() < 0.1, "got {d}");
    }

    #[test]
    fn test_sentinel_coordinate() {
        assert!(coord(0.0, 0.0).is_sentinel());
        assert!(!coord(0.0, 0.0).is_usable());
        assert!(coord(0.0, 1.0).is_usable());
        assert_eq!(usable(Some(coord(0.0, 0.0))), None);
        assert_eq!(usable(None), None);
    }

    #[test]
    fn test_from_parts_requires_both() {
        assert!(Coordinate::from_parts(Some(1.0), None).is_none());
        assert!(Coordinate::from_parts(None, Some(1.0)).is_none());
        assert!(Coordinate::from_parts(Some(1.0), Some(2.0)).is_some());
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(Coordinate::new(91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_bounding_box_equator_is_unscaled() {
        let bbox = bounding_box(coord(0.0, 10.0), 111.0);
        assert!((bbox.lat_max - 0.001).abs() < 1e-12);
        assert!((bbox.lon_max - 10.001).abs() < 1e-12);
    }

    #[test]
    fn test_bounding_box_widens_with_latitude() {
        let low = bounding_box(coord(10.0, 0.0), 500.0);
        let high = bounding_box(coord(60.0, 0.0), 500.0);
        assert!(high.lon_max - high.lon_min > low.lon_max - low.lon_min);
        // Latitude span does not depend on latitude.
        assert!(((high.lat_max - high.lat_min) - (low.lat_max - low.lat_min)).abs() < 1e-12);
    }

    #[test]
    fn test_bounding_box_contains_points_on_radius() {
        // Points exactly at the radius in each compass direction must be inside.
        for &lat in &[0.0, 12.5, 45.0, 70.0, -55.0] {
            let center = coord(lat, 30.0);
            let radius = 250.0;
            let bbox = bounding_box(center, radius);
            let dlat = radius / 111_194.93;
            let dlon = dlat / lat.to_radians().cos();
            for p in [
                coord(lat + dlat, 30.0),
                coord(lat - dlat, 30.0),
                coord(lat, 30.0 + dlon),
                coord(lat, 30.0 - dlon),
            ] {
                assert!(distance_meters(center, p) <= radius + 0.01);
                assert!(bbox.contains(p), "lat {lat}: {p:?} outside {bbox:?}");
            }
        }
    }

    /// Point of a circle with the largest longitude offset, pulled slightly
    /// inside the circle.
    fn widest_point(center: Coordinate, radius: f64) -> Coordinate {
        let angular = radius / EARTH_RADIUS_M * 0.999;
        let lat = center.latitude.to_radians();
        let point_lat = (lat.sin() / angular.cos()).asin();
        let dlon = (angular.sin() / lat.cos()).asin();
        coord(point_lat.to_degrees(), center.longitude + dlon.to_degrees())
    }

    #[test]
    fn test_bounding_box_contains_widest_longitude_point() {
        for &(lat, radius) in &[
            (89.95, 1_000.0),
            (80.0, 300_000.0),
            (78.2, 500_000.0),
            (45.0, 250.0),
            (60.0, 50.0),
            (-60.0, 5_000.0),
        ] {
            let center = coord(lat, 15.0);
            let bbox = bounding_box(center, radius);
            let p = widest_point(center, radius);
            let d = distance_meters(center, p);
            assert!(d <= radius, "lat {lat} r {radius}: point at {d} m");
            assert!(bbox.contains(p), "lat {lat} r {radius}: {p:?} outside {bbox:?}");
        }
    }

    #[test]
    fn test_bounding_box_enclosing_pole_spans_all_longitudes() {
        let center = coord(89.0, 0.0);
        let bbox = bounding_box(center, 112_000.0);
        assert!(bbox.spans_all_longitudes());

        // Just across the pole from the center, within the radius.
        let across = coord(89.995, 180.0);
        assert!(distance_meters(center, across) <= 112_000.0);
        assert!(bbox.contains(across));
    }

    #[test]
    fn test_bounding_box_zero_radius() {
        let bbox = bounding_box(coord(45.0, 10.0), 0.0);
        assert_eq!(bbox.lon_min, 10.0);
        assert_eq!(bbox.lon_max, 10.0);
        assert!(bbox.contains(coord(45.0, 10.0)));
    }

    #[test]
    fn test_bounding_box_near_pole_spans_all_longitudes() {
        let bbox = bounding_box(coord(89.9999, 0.0), 50.0);
        assert!(bbox.spans_all_longitudes());
        assert!(bbox.contains(coord(89.9999, 179.0)));
    }

    #[test]
    fn test_bounding_box_wraps_antimeridian() {
        let bbox = bounding_box(coord(10.0, 179.9999), 100.0);
        assert!(bbox.contains(coord(10.0, -179.9999)));
        assert!(!bbox.contains(coord(10.0, 0.0)));
    }

    #[test]
    fn test_round_meters() {
        assert_eq!(round_meters(12.3456), 12.35);
        assert_eq!(round_meters(0.004), 0.0);
    }

    #[test]
    fn test_geohash_cell() {
        let cell = coord(57.64911, 10.40744).geohash(7).unwrap();
        assert_eq!(cell, "u4pruyd");
    }
}
