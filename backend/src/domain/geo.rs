//! Geographic math for geofence membership.
//!
//! Pure functions only: great-circle distance between WGS-84 coordinates and
//! the inclusive point-in-circle test that every membership decision is
//! built on. No storage access, no side effects.

use serde::{Deserialize, Serialize};

use crate::domain::models::errors::AttendanceError;

/// Mean Earth radius in meters.
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A WGS-84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Validate that both components are finite and within WGS-84 range.
    pub fn validate(&self) -> Result<(), AttendanceError> {
        let in_range = self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude);
        if in_range {
            Ok(())
        } else {
            Err(AttendanceError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

impl From<shared::Coordinate> for Coordinate {
    fn from(coord: shared::Coordinate) -> Self {
        Self {
            latitude: coord.latitude,
            longitude: coord.longitude,
        }
    }
}

impl From<Coordinate> for shared::Coordinate {
    fn from(coord: Coordinate) -> Self {
        Self {
            latitude: coord.latitude,
            longitude: coord.longitude,
        }
    }
}

/// Haversine great-circle distance between two coordinates, in meters.
///
/// Symmetric in its arguments and zero for identical points.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> Result<f64, AttendanceError> {
    a.validate()?;
    b.validate()?;

    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (delta_lon / 2.0).sin().powi(2);
    let central_angle = 2.0 * h.sqrt().asin();

    Ok(EARTH_RADIUS_METERS * central_angle)
}

/// True iff `point` lies within `radius_meters` of `center`.
///
/// The boundary is inclusive: a point exactly on the circle is inside.
pub fn is_inside(
    point: Coordinate,
    center: Coordinate,
    radius_meters: f64,
) -> Result<bool, AttendanceError> {
    Ok(distance_meters(point, center)? <= radius_meters)
}
