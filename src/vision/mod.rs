//! Vision Layer
//!
//! Captured frames and the adapter around the external object detector.
//!
//! ## Module Structure
//!
//! - `frame`: Captured image, JPEG/data-URL payloads, thumbnails
//! - `detect`: Detector capability trait, filtering and dedupe

pub mod frame;
pub mod detect;

pub use frame::{Frame, FrameError, PhotoPayloads};
pub use detect::{
    filter_predictions, DetectionAdapter, DetectionError, ObjectDetector, Prediction,
    RawPrediction, DEFAULT_SCORE_THRESHOLD,
};
