//! Status Events
//!
//! User-visible status produced by the mode machine. The host drains these
//! and shows them; wording lives here so every front end says the same thing.

use serde::{Deserialize, Serialize};

use crate::challenge::share::ShareMethod;
use crate::game::state::Mode;

/// How a status should be presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    /// Neutral information.
    Info,
    /// Something is in progress.
    Loading,
    /// Something worked.
    Success,
    /// Something failed (never fatal).
    Error,
}

/// What happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusKind {
    /// Detection model still loading.
    ModelLoading,
    /// Detection model loaded.
    ModelReady,
    /// Capture attempted before the model loaded.
    ModelUnavailable,
    /// Camera stream is live.
    CameraReady,
    /// Camera refused or missing.
    CameraDenied,
    /// Location refused or missing.
    LocationDenied,
    /// No position fix in time.
    PositionTimeout,
    /// Position read failed for another reason.
    PositionFailed {
        /// Platform message.
        reason: String,
    },
    /// Capture blocked by the accuracy gate.
    AccuracyInsufficient {
        /// Latest accuracy radius (m), if known.
        accuracy: Option<f64>,
        /// Configured limit (m).
        limit: f64,
    },
    /// Accuracy gate opened.
    AccuracyReady {
        /// Latest accuracy radius (m).
        accuracy: f64,
    },
    /// Capture started.
    Capturing,
    /// Capture finished with items.
    ItemsDetected {
        /// Number of distinct items.
        count: usize,
    },
    /// Capture found nothing usable.
    NoItemsDetected,
    /// Capture failed for another reason.
    CaptureFailed {
        /// Error message.
        reason: String,
    },
    /// Guessing started.
    GuessingStarted {
        /// Items to look for.
        count: usize,
    },
    /// Distance update while guessing.
    Distance {
        /// Meters to the photo location.
        meters: f64,
        /// Current score.
        score: u8,
    },
    /// The guesser reached the photo location.
    LocationFound,
    /// Back to taking a new photo.
    NewRound,
    /// Challenge link opened.
    ChallengeLoaded {
        /// Items to look for.
        count: usize,
    },
    /// Items-only link opened.
    SharedItemsLoaded {
        /// Items to look for.
        count: usize,
    },
    /// Challenge link could not be read.
    InvalidChallenge,
    /// A share method failed and the next one is tried.
    ShareFallback {
        /// Method that failed.
        method: ShareMethod,
    },
    /// Shared.
    Shared {
        /// Method that worked.
        method: ShareMethod,
    },
    /// Share fell through to the manual copy field.
    ManualCopy {
        /// Text to display for copying.
        text: String,
    },
    /// Every share method failed.
    ShareUnavailable,
    /// Share requested with nothing captured.
    NothingToShare,
}

impl StatusKind {
    /// Presentation level.
    pub fn level(&self) -> StatusLevel {
        match self {
            StatusKind::ModelLoading | StatusKind::Capturing | StatusKind::ShareFallback { .. } => {
                StatusLevel::Loading
            }
            StatusKind::ModelReady
            | StatusKind::CameraReady
            | StatusKind::AccuracyReady { .. }
            | StatusKind::ItemsDetected { .. }
            | StatusKind::LocationFound
            | StatusKind::ChallengeLoaded { .. }
            | StatusKind::SharedItemsLoaded { .. }
            | StatusKind::Shared { .. } => StatusLevel::Success,
            StatusKind::ModelUnavailable
            | StatusKind::CameraDenied
            | StatusKind::LocationDenied
            | StatusKind::PositionTimeout
            | StatusKind::PositionFailed { .. }
            | StatusKind::AccuracyInsufficient { .. }
            | StatusKind::NoItemsDetected
            | StatusKind::CaptureFailed { .. }
            | StatusKind::InvalidChallenge
            | StatusKind::ShareUnavailable
            | StatusKind::NothingToShare => StatusLevel::Error,
            StatusKind::GuessingStarted { .. }
            | StatusKind::Distance { .. }
            | StatusKind::NewRound
            | StatusKind::ManualCopy { .. } => StatusLevel::Info,
        }
    }

    /// English status line.
    pub fn message(&self) -> String {
        match self {
            StatusKind::ModelLoading => "Loading AI model...".into(),
            StatusKind::ModelReady => "Model loaded! Ready to take photos.".into(),
            StatusKind::ModelUnavailable => "Model not loaded yet. Please wait.".into(),
            StatusKind::CameraReady => "Camera ready.".into(),
            StatusKind::CameraDenied => {
                "Camera access denied. Please allow camera access and try again.".into()
            }
            StatusKind::LocationDenied => {
                "Location access denied. Please enable location services.".into()
            }
            StatusKind::PositionTimeout => "Could not get your location in time. Try again.".into(),
            StatusKind::PositionFailed { reason } => format!("Location error: {reason}"),
            StatusKind::AccuracyInsufficient { accuracy: Some(acc), limit } => format!(
                "GPS accuracy {acc:.0}m is {:.0}m worse than the {limit:.0}m needed. Wait for a better fix.",
                acc - limit
            ),
            StatusKind::AccuracyInsufficient { accuracy: None, limit } => {
                format!("Waiting for GPS accuracy within {limit:.0}m...")
            }
            StatusKind::AccuracyReady { accuracy } => format!("GPS accuracy {accuracy:.0}m. Ready!"),
            StatusKind::Capturing => "Capturing photo...".into(),
            StatusKind::ItemsDetected { count } => format!("Found {count} item(s)!"),
            StatusKind::NoItemsDetected => "No items detected. Try taking another photo.".into(),
            StatusKind::CaptureFailed { reason } => {
                format!("Error capturing photo ({reason}). Please try again.")
            }
            StatusKind::GuessingStarted { count } => {
                format!("Find the place with these {count} item(s)!")
            }
            StatusKind::Distance { meters, score } => {
                format!("Distance: {meters:.1}m | Score: {score}")
            }
            StatusKind::LocationFound => "Congratulations! You found the location!".into(),
            StatusKind::NewRound => "Take a new photo.".into(),
            StatusKind::ChallengeLoaded { count } => {
                format!("Challenge loaded! Find {count} item(s).")
            }
            StatusKind::SharedItemsLoaded { .. } => "Items loaded from shared data!".into(),
            StatusKind::InvalidChallenge => "Invalid challenge link.".into(),
            StatusKind::ShareFallback { method } => {
                format!("{method} unavailable, trying the next option...")
            }
            StatusKind::Shared { method } => format!("Shared via {method}!"),
            StatusKind::ManualCopy { .. } => "Copy the text below to share.".into(),
            StatusKind::ShareUnavailable => "Sharing failed. Please copy the link manually.".into(),
            StatusKind::NothingToShare => "No items to share! Take a photo first.".into(),
        }
    }
}

/// One queued status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Monotonic sequence number within the session.
    pub seq: u64,
    /// Mode the machine was in when this was raised.
    pub mode: Mode,
    /// What happened.
    pub kind: StatusKind,
}

impl StatusEvent {
    /// Presentation level.
    pub fn level(&self) -> StatusLevel {
        self.kind.level()
    }

    /// English status line.
    pub fn message(&self) -> String {
        self.kind.message()
    }
}
