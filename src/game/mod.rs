//! Game Logic Module
//!
//! The game state and the mode machine that is allowed to change it.
//!
//! ## Module Structure
//!
//! - `state`: Mode and session fields
//! - `machine`: Photo / Items / Guessing transitions, capture, scoring, sharing
//! - `events`: User-visible status feed
//! - `config`: Session tunables and environment overrides

pub mod config;
pub mod events;
pub mod machine;
pub mod state;

// Re-export key types
pub use config::{GameConfig, PhotoConfig};
pub use events::{StatusEvent, StatusKind, StatusLevel};
pub use machine::{CaptureError, GameSession, GuessProgress, PositionOutcome, Transition};
pub use state::{GameState, Mode};
