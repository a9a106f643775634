//! Distance Evaluator
//!
//! Great-circle distance on a spherical Earth and the win-threshold check
//! used while guessing.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Decimal places kept when a coordinate leaves the device.
pub const COORDINATE_DECIMALS: i32 = 6;

// =============================================================================
// COORDINATES
// =============================================================================

/// A latitude/longitude pair in degrees.
///
/// Latitude and longitude only ever travel together.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Coordinates {
    /// Create from degrees.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Copy with both components rounded to [`COORDINATE_DECIMALS`].
    pub fn rounded(self) -> Self {
        Self {
            latitude: round_coordinate(self.latitude),
            longitude: round_coordinate(self.longitude),
        }
    }
}

/// A position fix: coordinates plus the reported accuracy radius.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Where.
    pub coords: Coordinates,
    /// Accuracy radius in meters. `None` when the source did not report one
    /// (positions restored from a challenge link).
    pub accuracy: Option<f64>,
}

impl Position {
    /// A fix reported by a position source.
    pub const fn with_accuracy(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self {
            coords: Coordinates::new(latitude, longitude),
            accuracy: Some(accuracy),
        }
    }

    /// A fix with unknown accuracy.
    pub const fn without_accuracy(coords: Coordinates) -> Self {
        Self { coords, accuracy: None }
    }
}

// =============================================================================
// DISTANCE
// =============================================================================

/// Round a degree value to [`COORDINATE_DECIMALS`] places.
#[inline]
pub fn round_coordinate(value: f64) -> f64 {
    let scale = 10f64.powi(COORDINATE_DECIMALS);
    (value * scale).round() / scale
}

/// Haversine distance between two points, in meters.
pub fn distance_meters(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// True iff `current` is within `threshold_m` of `photo`.
#[inline]
pub fn check_win(photo: Coordinates, current: Coordinates, threshold_m: f64) -> bool {
    distance_meters(photo, current) <= threshold_m
}
