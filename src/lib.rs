//! # Photo Hunt
//!
//! Core of a two-player location guessing game. One player photographs a
//! spot, the detector lists what is in the picture, and a second player walks
//! around until they are standing where the photo was taken.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        PHOTO HUNT                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Geodesy (pure)                            │
//! │  └── geo.rs      - Haversine distance, win check, rounding   │
//! │                                                              │
//! │  game/           - Mode machine                              │
//! │  ├── state.rs    - Mode and session fields                   │
//! │  ├── machine.rs  - Photo → Items → Guessing transitions      │
//! │  ├── events.rs   - Status feed                               │
//! │  └── config.rs   - Tunables, env overrides                   │
//! │                                                              │
//! │  sensor/         - Device lifecycles                         │
//! │  ├── camera.rs   - Camera capability                         │
//! │  ├── location.rs - Position capability, watch handle         │
//! │  ├── gate.rs     - Capture accuracy gate                     │
//! │  └── manager.rs  - Exclusive acquire/release                 │
//! │                                                              │
//! │  vision/         - Frames and detection                      │
//! │  ├── frame.rs    - JPEG payloads, thumbnails                 │
//! │  └── detect.rs   - Detector adapter, filter + dedupe         │
//! │                                                              │
//! │  challenge/      - Sharing a puzzle                          │
//! │  ├── record.rs   - Record, wire versions, legacy migration   │
//! │  ├── codec.rs    - base64 JSON tokens                        │
//! │  ├── link.rs     - Challenge URLs                            │
//! │  └── share.rs    - Share fallback chain, QR payload          │
//! │                                                              │
//! │  sim/            - Simulated devices for demo and tests      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Resource Guarantee
//!
//! At most one camera stream and one location watch are live at any time.
//! The camera is only held in Photo mode, the watch only while guessing.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod challenge;
pub mod core;
pub mod game;
pub mod sensor;
pub mod sim;
pub mod vision;

// Re-export commonly used types
pub use challenge::{decode_challenge, encode_challenge, ChallengeError, ChallengeRecord};
pub use core::geo::{check_win, distance_meters, Coordinates, Position};
pub use game::config::GameConfig;
pub use game::machine::{GameSession, Transition};
pub use game::state::{GameState, Mode};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
