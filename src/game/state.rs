//! Game State Definitions
//!
//! The single mutable record for one player's game. Only the mode machine
//! mutates it; everything else reads.

use serde::{Deserialize, Serialize};

use crate::challenge::record::ChallengeRecord;
use crate::core::geo::Position;

// =============================================================================
// MODE
// =============================================================================

/// Which screen the game is on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Taking the puzzle photo.
    #[default]
    Photo,
    /// Reviewing detected items before handing over.
    Items,
    /// Walking around to find the photo location.
    Guessing,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Photo => write!(f, "photo"),
            Mode::Items => write!(f, "items"),
            Mode::Guessing => write!(f, "guessing"),
        }
    }
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Session fields of one game.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Current mode.
    pub mode: Mode,

    /// Distinct labels in first-detection order.
    pub detected_items: Vec<String>,

    /// Where the photo was taken.
    pub photo_location: Option<Position>,

    /// Latest fix while guessing.
    pub current_location: Option<Position>,

    /// 0 until the location is found, then 1 for the rest of the session.
    score: u8,

    /// Full-resolution photo (data URL).
    pub captured_photo: Option<String>,

    /// Downscaled photo used in challenge links (data URL).
    pub share_photo: Option<String>,
}

impl GameState {
    /// Fresh state in photo mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// State for a guesser opening a challenge link.
    ///
    /// Items may be empty here; the guessing screen tolerates it.
    pub fn from_challenge(record: &ChallengeRecord) -> Self {
        Self {
            mode: Mode::Guessing,
            detected_items: record.items.clone(),
            photo_location: Some(Position::without_accuracy(record.coordinates())),
            current_location: None,
            score: 0,
            captured_photo: None,
            share_photo: record.photo.clone(),
        }
    }

    /// State for a guesser opening an items-only link. There is no photo
    /// location, so the score cannot change.
    pub fn from_shared_items(items: Vec<String>) -> Self {
        Self {
            mode: Mode::Guessing,
            detected_items: items,
            ..Self::default()
        }
    }

    /// Current score (0 or 1).
    pub fn score(&self) -> u8 {
        self.score
    }

    /// Set the score latch. Returns true if this call set it.
    pub fn latch_score(&mut self) -> bool {
        if self.score == 0 {
            self.score = 1;
            true
        } else {
            false
        }
    }

    /// Prepare fields for a new guessing session.
    pub fn begin_guessing(&mut self) {
        self.mode = Mode::Guessing;
        self.score = 0;
        self.current_location = None;
    }

    /// Drop everything captured for the current puzzle.
    pub fn clear_session(&mut self) {
        self.detected_items.clear();
        self.photo_location = None;
        self.current_location = None;
        self.score = 0;
        self.captured_photo = None;
        self.share_photo = None;
    }

    /// Drop a half-finished capture.
    pub fn clear_capture(&mut self) {
        self.photo_location = None;
        self.captured_photo = None;
        self.share_photo = None;
    }
}
