//! Detection Adapter
//!
//! Wraps the external object-detection model. The model is a black box that
//! turns a frame into scored labels; this module decides which of those
//! labels become game items.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::vision::frame::Frame;

/// Predictions scoring at or below this are dropped.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.5;

/// Detection errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DetectionError {
    /// The model has not finished loading.
    #[error("detection model unavailable")]
    ModelUnavailable,
    /// The model failed during inference.
    #[error("inference failed: {0}")]
    Inference(String),
}

/// One prediction as the model reports it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawPrediction {
    /// Label.
    pub class: String,
    /// Confidence in `[0, 1]`.
    pub score: f64,
}

impl RawPrediction {
    /// Convenience constructor.
    pub fn new(class: impl Into<String>, score: f64) -> Self {
        Self { class: class.into(), score }
    }
}

/// A prediction that survived filtering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Label.
    pub label: String,
    /// Confidence of the first surviving occurrence.
    pub score: f64,
}

/// External detection capability.
#[allow(async_fn_in_trait)]
pub trait ObjectDetector {
    /// Whether the model finished loading.
    fn is_ready(&self) -> bool;

    /// Run inference on one frame.
    async fn detect(&mut self, frame: &Frame) -> Result<Vec<RawPrediction>, DetectionError>;
}

/// Drop low scores and duplicate labels, keeping first-seen order.
pub fn filter_predictions(raw: Vec<RawPrediction>, threshold: f64) -> Vec<Prediction> {
    let mut kept: Vec<Prediction> = Vec::with_capacity(raw.len());
    for p in raw {
        if p.score <= threshold {
            continue;
        }
        if kept.iter().any(|k| k.label == p.class) {
            continue;
        }
        kept.push(Prediction { label: p.class, score: p.score });
    }
    kept
}

/// Detector plus filtering policy.
pub struct DetectionAdapter<D> {
    detector: D,
    threshold: f64,
}

impl<D: ObjectDetector> DetectionAdapter<D> {
    /// Wrap a detector.
    pub fn new(detector: D, threshold: f64) -> Self {
        Self { detector, threshold }
    }

    /// Whether [`detect`](Self::detect) can be called.
    pub fn is_ready(&self) -> bool {
        self.detector.is_ready()
    }

    /// Borrow the wrapped detector.
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Mutably borrow the wrapped detector.
    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    /// Run the model once and return the surviving predictions.
    pub async fn detect(&mut self, frame: &Frame) -> Result<Vec<Prediction>, DetectionError> {
        if !self.detector.is_ready() {
            return Err(DetectionError::ModelUnavailable);
        }

        let raw = self.detector.detect(frame).await?;
        let total = raw.len();
        let kept = filter_predictions(raw, self.threshold);
        debug!("Detection kept {} of {} predictions", kept.len(), total);
        Ok(kept)
    }
}
