//! Captured Frames
//!
//! A frame grabbed from the camera stream, plus the two encoded payloads
//! kept per capture: the full-resolution photo and a small thumbnail that is
//! cheap enough to embed in a challenge link.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, ExtendedColorType, RgbImage};
use thiserror::Error;

use crate::game::config::PhotoConfig;

/// Prefix of a JPEG data URL.
pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Frame encoding errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame has no pixels.
    #[error("frame is empty")]
    Empty,
    /// JPEG encoder failed.
    #[error("jpeg encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// A single RGB frame from the camera.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap a decoded RGB image.
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// A frame filled with one colour. Handy for simulated cameras.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::new(RgbImage::from_pixel(width, height, image::Rgb(rgb)))
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the pixels.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Downscale so the longest side is at most `max_side`, keeping aspect.
    ///
    /// Frames already small enough are returned unchanged.
    pub fn thumbnail(&self, max_side: u32) -> Frame {
        let (w, h) = (self.width(), self.height());
        let longest = w.max(h);
        if longest <= max_side || longest == 0 {
            return self.clone();
        }

        let scale = max_side as f64 / longest as f64;
        let tw = ((w as f64 * scale).round() as u32).max(1);
        let th = ((h as f64 * scale).round() as u32).max(1);
        Frame::new(imageops::thumbnail(&self.image, tw, th))
    }

    /// Encode as baseline JPEG.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, FrameError> {
        if self.width() == 0 || self.height() == 0 {
            return Err(FrameError::Empty);
        }

        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
        encoder.encode(
            self.image.as_raw(),
            self.width(),
            self.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(buf)
    }

    /// Encode as a `data:image/jpeg;base64,...` URL.
    pub fn to_data_url(&self, quality: u8) -> Result<String, FrameError> {
        let jpeg = self.encode_jpeg(quality)?;
        Ok(format!("{}{}", JPEG_DATA_URL_PREFIX, BASE64_STANDARD.encode(jpeg)))
    }
}

/// Encoded images kept for one capture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhotoPayloads {
    /// Full-resolution photo (data URL).
    pub full: String,
    /// Heavily downscaled photo for sharing (data URL).
    pub thumbnail: String,
}

impl PhotoPayloads {
    /// Encode both payloads from one frame.
    pub fn from_frame(frame: &Frame, config: &PhotoConfig) -> Result<Self, FrameError> {
        let full = frame.to_data_url(config.full_quality)?;
        let thumbnail = frame
            .thumbnail(config.thumbnail_max_side)
            .to_data_url(config.thumbnail_quality)?;
        Ok(Self { full, thumbnail })
    }
}
