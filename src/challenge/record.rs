//! Challenge Records
//!
//! The shareable puzzle and the JSON shapes it has had on the wire.
//!
//! ## Wire versions
//!
//! - v1 (legacy, unversioned): `{detectedItems, photoLocation: {latitude, longitude}, capturedPhotoData?}`
//! - v2: `{v: 2, items, lat, lng, photo?, t}`. Early v2 links omit `v`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::challenge::codec::ChallengeError;
use crate::core::geo::{round_coordinate, Coordinates};
use crate::game::state::GameState;

/// Schema version written by this crate.
pub const CHALLENGE_VERSION: u64 = 2;

/// A puzzle as handed to a guesser.
#[derive(Clone, Debug, PartialEq)]
pub struct ChallengeRecord {
    /// Labels to look for.
    pub items: Vec<String>,
    /// Photo latitude (6 decimals).
    pub lat: f64,
    /// Photo longitude (6 decimals).
    pub lng: f64,
    /// Thumbnail data URL.
    pub photo: Option<String>,
    /// When the link was made (Unix seconds). 0 when the link did not say.
    pub issued_at: i64,
}

impl ChallengeRecord {
    /// Snapshot the shareable parts of a game.
    ///
    /// Returns `None` when no photo location has been captured.
    pub fn from_state(state: &GameState, issued_at: i64) -> Option<Self> {
        let coords = state.photo_location?.coords.rounded();
        Some(Self {
            items: state.detected_items.clone(),
            lat: coords.latitude,
            lng: coords.longitude,
            photo: state.share_photo.clone(),
            issued_at,
        })
    }

    /// Photo coordinates.
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }

    /// Current wire shape.
    pub fn to_wire(&self) -> ChallengeV2 {
        ChallengeV2 {
            v: Some(CHALLENGE_VERSION),
            items: Some(self.items.clone()),
            lat: Some(round_coordinate(self.lat)),
            lng: Some(round_coordinate(self.lng)),
            photo: self.photo.clone(),
            t: Some(self.issued_at),
        }
    }
}

// =============================================================================
// WIRE SHAPES
// =============================================================================

/// v2 wire shape. Every field is optional on the way in so validation can
/// report what is missing.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChallengeV2 {
    /// Schema version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<u64>,
    /// Labels.
    #[serde(default)]
    pub items: Option<Vec<String>>,
    /// Latitude.
    #[serde(default)]
    pub lat: Option<f64>,
    /// Longitude.
    #[serde(default)]
    pub lng: Option<f64>,
    /// Thumbnail data URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    /// Issued-at (Unix seconds).
    #[serde(default)]
    pub t: Option<i64>,
}

/// Location object of the v1 shape.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LegacyLocation {
    /// Latitude.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Longitude.
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// v1 wire shape.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeV1 {
    /// Labels.
    #[serde(default)]
    pub detected_items: Option<Vec<String>>,
    /// Photo location.
    #[serde(default)]
    pub photo_location: Option<LegacyLocation>,
    /// Full photo data URL.
    #[serde(default)]
    pub captured_photo_data: Option<String>,
}

/// A decoded payload in whichever shape it arrived.
#[derive(Clone, Debug)]
pub enum WireChallenge {
    /// v1.
    Legacy(ChallengeV1),
    /// v2.
    Current(ChallengeV2),
}

const CURRENT_KEYS: [&str; 3] = ["items", "lat", "lng"];
const LEGACY_KEYS: [&str; 2] = ["detectedItems", "photoLocation"];

impl WireChallenge {
    /// Pick the wire shape of a parsed JSON payload.
    ///
    /// An explicit `v` wins. Without one, any current field name selects v2,
    /// otherwise the legacy layout is tried.
    pub fn from_value(value: Value) -> Result<Self, ChallengeError> {
        let obj = match value {
            Value::Object(obj) => obj,
            other => return Err(ChallengeError::NotAnObject(json_kind(&other))),
        };

        match obj.get("v") {
            Some(v) => match v.as_u64() {
                Some(1) => parse_object(obj).map(WireChallenge::Legacy),
                Some(2) => parse_object(obj).map(WireChallenge::Current),
                _ => Err(ChallengeError::UnsupportedVersion(v.to_string())),
            },
            None if has_any(&obj, &CURRENT_KEYS) => parse_object(obj).map(WireChallenge::Current),
            None if has_any(&obj, &LEGACY_KEYS) => parse_object(obj).map(WireChallenge::Legacy),
            None => Err(ChallengeError::MissingField("items")),
        }
    }

    /// Schema version of this payload.
    pub fn version(&self) -> u64 {
        match self {
            WireChallenge::Legacy(_) => 1,
            WireChallenge::Current(_) => CHALLENGE_VERSION,
        }
    }

    /// Validate and convert to a record, migrating legacy payloads.
    pub fn into_record(self) -> Result<ChallengeRecord, ChallengeError> {
        match self {
            WireChallenge::Current(wire) => validate_current(wire),
            WireChallenge::Legacy(wire) => migrate_legacy(wire),
        }
    }
}

fn validate_current(wire: ChallengeV2) -> Result<ChallengeRecord, ChallengeError> {
    let items = wire.items.ok_or(ChallengeError::MissingField("items"))?;
    let lat = truthy_coordinate(wire.lat).ok_or(ChallengeError::MissingField("lat"))?;
    let lng = truthy_coordinate(wire.lng).ok_or(ChallengeError::MissingField("lng"))?;

    Ok(ChallengeRecord {
        items,
        lat,
        lng,
        photo: wire.photo.filter(|p| !p.is_empty()),
        issued_at: wire.t.unwrap_or(0),
    })
}

/// v1 → record. The v1 shape carried the full photo and no timestamp.
pub fn migrate_legacy(wire: ChallengeV1) -> Result<ChallengeRecord, ChallengeError> {
    let items = wire.detected_items.ok_or(ChallengeError::MissingField("detectedItems"))?;
    let location = wire.photo_location.ok_or(ChallengeError::MissingField("photoLocation"))?;
    let lat = truthy_coordinate(location.latitude).ok_or(ChallengeError::MissingField("latitude"))?;
    let lng = truthy_coordinate(location.longitude).ok_or(ChallengeError::MissingField("longitude"))?;

    Ok(ChallengeRecord {
        items,
        lat,
        lng,
        photo: wire.captured_photo_data.filter(|p| !p.is_empty()),
        issued_at: 0,
    })
}

/// Presence check for coordinates, kept compatible with links made by the
/// web client: `0` and `NaN` read as missing, so a photo taken exactly on
/// the equator or prime meridian cannot be loaded.
// FIXME: zero coordinates are rejected; needs a product decision before
// switching to a plain presence check.
fn truthy_coordinate(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && !v.is_nan())
}

fn has_any(obj: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|k| obj.contains_key(*k))
}

fn parse_object<T: for<'de> Deserialize<'de>>(obj: Map<String, Value>) -> Result<T, ChallengeError> {
    serde_json::from_value(Value::Object(obj)).map_err(|e| ChallengeError::InvalidJson(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Result<ChallengeRecord, ChallengeError> {
        WireChallenge::from_value(value)?.into_record()
    }

    #[test]
    fn test_current_shape_with_version() {
        let r = record(json!({"v": 2, "items": ["cup"], "lat": 1.5, "lng": -2.25, "t": 42})).unwrap();
        assert_eq!(r.items, vec!["cup"]);
        assert_eq!((r.lat, r.lng), (1.5, -2.25));
        assert_eq!(r.issued_at, 42);
        assert_eq!(r.photo, None);
    }

    #[test]
    fn test_current_shape_without_version() {
        let wire = WireChallenge::from_value(json!({"items": [], "lat": 1.0, "lng": 2.0})).unwrap();
        assert_eq!(wire.version(), 2);
        let r = wire.into_record().unwrap();
        assert!(r.items.is_empty());
        assert_eq!(r.issued_at, 0);
    }

    #[test]
    fn test_legacy_shape_migrates() {
        let wire = WireChallenge::from_value(json!({
            "detectedItems": ["bicycle", "bench"],
            "photoLocation": {"latitude": 55.6, "longitude": 12.5},
            "capturedPhotoData": "data:image/jpeg;base64,AA=="
        }))
        .unwrap();
        assert_eq!(wire.version(), 1);

        let r = wire.into_record().unwrap();
        assert_eq!(r.items, vec!["bicycle", "bench"]);
        assert_eq!((r.lat, r.lng), (55.6, 12.5));
        assert_eq!(r.photo.as_deref(), Some("data:image/jpeg;base64,AA=="));
        assert_eq!(r.issued_at, 0);
    }

    #[test]
    fn test_zero_coordinate_reads_as_missing() {
        let err = record(json!({"items": ["cup"], "lat": 0, "lng": 12.0})).unwrap_err();
        assert_eq!(err, ChallengeError::MissingField("lat"));

        let err = record(json!({"items": ["cup"], "lat": 12.0, "lng": 0.0})).unwrap_err();
        assert_eq!(err, ChallengeError::MissingField("lng"));
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            record(json!({"lat": 1.0, "lng": 2.0})).unwrap_err(),
            ChallengeError::MissingField("items")
        );
        assert_eq!(
            record(json!({"items": null, "lat": 1.0, "lng": 2.0})).unwrap_err(),
            ChallengeError::MissingField("items")
        );
        assert_eq!(
            record(json!({"detectedItems": ["a"]})).unwrap_err(),
            ChallengeError::MissingField("photoLocation")
        );
        assert_eq!(record(json!({})).unwrap_err(), ChallengeError::MissingField("items"));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let err = record(json!({"v": 9, "items": ["a"], "lat": 1.0, "lng": 1.0})).unwrap_err();
        assert_eq!(err, ChallengeError::UnsupportedVersion("9".into()));
    }

    #[test]
    fn test_non_object_rejected() {
        let err = WireChallenge::from_value(json!([1, 2, 3])).unwrap_err();
        assert_eq!(err, ChallengeError::NotAnObject("array"));
    }

    #[test]
    fn test_wrong_types_rejected() {
        let err = record(json!({"items": "cup", "lat": 1.0, "lng": 1.0})).unwrap_err();
        assert!(matches!(err, ChallengeError::InvalidJson(_)));
    }

    #[test]
    fn test_to_wire_rounds() {
        let r = ChallengeRecord {
            items: vec!["x".into()],
            lat: 12.345_678_91,
            lng: -98.765_432_19,
            photo: None,
            issued_at: 7,
        };
        let wire = r.to_wire();
        assert_eq!(wire.lat, Some(12.345_679));
        assert_eq!(wire.lng, Some(-98.765_432));
        assert_eq!(wire.v, Some(CHALLENGE_VERSION));
    }
}
