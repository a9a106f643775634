//! Core geodesic primitives.
//!
//! Pure functions with no sensor or state dependencies.

pub mod geo;

pub use geo::{check_win, distance_meters, round_coordinate, Coordinates, Position, EARTH_RADIUS_M};
