//! Game Configuration
//!
//! Tunables for one game session. Defaults follow the most recent
//! behaviour; every value can be overridden from the environment.

use std::time::Duration;
use tracing::warn;

use crate::sensor::camera::CameraConstraints;
use crate::sensor::location::WatchOptions;
use crate::vision::detect::DEFAULT_SCORE_THRESHOLD;

/// Default win radius (meters).
pub const DEFAULT_WIN_DISTANCE_M: f64 = 25.0;

/// Default capture accuracy limit (meters).
pub const DEFAULT_CAPTURE_ACCURACY_M: f64 = 7.0;

/// Default wait for a single position fix.
pub const DEFAULT_POSITION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default base URL for challenge links.
pub const DEFAULT_SHARE_BASE_URL: &str = "https://photo-hunt.app/";

/// JPEG settings for the two per-capture payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoConfig {
    /// Quality of the full-resolution photo (1-100).
    pub full_quality: u8,
    /// Longest side of the shared thumbnail (pixels).
    pub thumbnail_max_side: u32,
    /// Quality of the shared thumbnail (1-100).
    pub thumbnail_quality: u8,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            full_quality: 85,
            thumbnail_max_side: 160,
            thumbnail_quality: 40,
        }
    }
}

/// Configuration for a game session.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Distance at which the guesser wins (meters).
    pub win_distance_m: f64,
    /// Capture requires accuracy within this radius (meters). `None` disables gating.
    pub capture_accuracy_m: Option<f64>,
    /// Wait bound for a single position fix.
    pub position_timeout: Duration,
    /// Predictions at or below this score are dropped.
    pub detection_threshold: f64,
    /// Camera stream preferences.
    pub camera: CameraConstraints,
    /// Position read/watch options.
    pub watch: WatchOptions,
    /// Photo payload encoding.
    pub photo: PhotoConfig,
    /// Page that challenge links point at.
    pub share_base_url: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            win_distance_m: DEFAULT_WIN_DISTANCE_M,
            capture_accuracy_m: Some(DEFAULT_CAPTURE_ACCURACY_M),
            position_timeout: DEFAULT_POSITION_TIMEOUT,
            detection_threshold: DEFAULT_SCORE_THRESHOLD,
            camera: CameraConstraints::default(),
            watch: WatchOptions::default(),
            photo: PhotoConfig::default(),
            share_base_url: DEFAULT_SHARE_BASE_URL.to_string(),
        }
    }
}

impl GameConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let capture_accuracy_m = match lookup("PHOTO_HUNT_CAPTURE_ACCURACY_M") {
            Some(v) if v.eq_ignore_ascii_case("off") => None,
            Some(v) => Some(parse_positive(
                "PHOTO_HUNT_CAPTURE_ACCURACY_M",
                &v,
                DEFAULT_CAPTURE_ACCURACY_M,
            )),
            None => defaults.capture_accuracy_m,
        };

        Self {
            win_distance_m: lookup("PHOTO_HUNT_WIN_DISTANCE_M")
                .map(|v| parse_positive("PHOTO_HUNT_WIN_DISTANCE_M", &v, DEFAULT_WIN_DISTANCE_M))
                .unwrap_or(defaults.win_distance_m),
            capture_accuracy_m,
            position_timeout: lookup("PHOTO_HUNT_POSITION_TIMEOUT_SECS")
                .map(|v| {
                    Duration::from_secs_f64(parse_positive(
                        "PHOTO_HUNT_POSITION_TIMEOUT_SECS",
                        &v,
                        DEFAULT_POSITION_TIMEOUT.as_secs_f64(),
                    ))
                })
                .unwrap_or(defaults.position_timeout),
            share_base_url: lookup("PHOTO_HUNT_BASE_URL").unwrap_or(defaults.share_base_url),
            ..defaults
        }
    }
}

fn parse_positive(key: &str, raw: &str, fallback: f64) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v,
        _ => {
            warn!("{} has invalid value {:?}. Falling back to {}.", key, raw, fallback);
            fallback
        }
    }
}
