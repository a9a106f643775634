//! Sensor Manager
//!
//! Owns the camera stream and the location watch. Every acquire first
//! releases whatever is held, every release is a no-op when nothing is held,
//! and dropping the manager releases both.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::geo::Position;
use crate::sensor::camera::{CameraConstraints, CameraDevice, StreamId};
use crate::sensor::error::{SensorError, SensorKind};
use crate::sensor::gate::AccuracyGate;
use crate::sensor::location::{LocationWatch, PositionSource, PositionUpdate, WatchId, WatchOptions};
use crate::vision::frame::Frame;

/// Camera + geolocation resource owner.
pub struct SensorManager<C: CameraDevice, L: PositionSource> {
    camera: C,
    location: L,
    constraints: CameraConstraints,
    watch_options: WatchOptions,
    position_timeout: Duration,
    stream: Option<StreamId>,
    watch: Option<LocationWatch>,
    gate: AccuracyGate,
}

impl<C: CameraDevice, L: PositionSource> SensorManager<C, L> {
    /// Create a manager holding no resources.
    pub fn new(
        camera: C,
        location: L,
        constraints: CameraConstraints,
        watch_options: WatchOptions,
        position_timeout: Duration,
        capture_accuracy_m: Option<f64>,
    ) -> Self {
        Self {
            camera,
            location,
            constraints,
            watch_options,
            position_timeout,
            stream: None,
            watch: None,
            gate: AccuracyGate::new(capture_accuracy_m),
        }
    }

    // =========================================================================
    // Camera
    // =========================================================================

    /// Open the camera, closing any stream already held.
    pub async fn acquire_camera(&mut self) -> Result<StreamId, SensorError> {
        self.release_camera();

        match self.camera.open(&self.constraints).await {
            Ok(stream) => {
                info!("Camera stream {:?} opened", stream);
                self.stream = Some(stream);
                Ok(stream)
            }
            Err(e) => {
                warn!("Camera unavailable: {}", e);
                Err(e)
            }
        }
    }

    /// Close the camera stream if one is held.
    pub fn release_camera(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.camera.close(stream);
            info!("Camera stream {:?} released", stream);
        }
    }

    /// Live stream, if any.
    pub fn camera_stream(&self) -> Option<StreamId> {
        self.stream
    }

    /// Grab a frame from the live stream.
    pub fn grab_frame(&mut self) -> Result<Frame, SensorError> {
        let stream = self.stream.ok_or(SensorError::NotAcquired(SensorKind::Camera))?;
        self.camera.grab_frame(stream)
    }

    // =========================================================================
    // Location
    // =========================================================================

    /// Start a position watch, cancelling any watch already held.
    pub fn acquire_location_watch(&mut self) -> Result<WatchId, SensorError> {
        self.release_location_watch();

        match LocationWatch::start(&mut self.location, &self.watch_options) {
            Ok(watch) => {
                let id = watch.id();
                info!("Location watch {:?} started", id);
                self.watch = Some(watch);
                Ok(id)
            }
            Err(e) => {
                warn!("Location watch unavailable: {}", e);
                Err(e)
            }
        }
    }

    /// Cancel the position watch if one is held.
    pub fn release_location_watch(&mut self) {
        if let Some(watch) = self.watch.take() {
            let id = watch.id();
            watch.cancel(&mut self.location);
            info!("Location watch {:?} released", id);
        }
    }

    /// Live watch id, if any.
    pub fn watch_id(&self) -> Option<WatchId> {
        self.watch.as_ref().map(LocationWatch::id)
    }

    /// Wait for the next watch update. `None` when no watch is held or the
    /// platform closed it.
    pub async fn next_watch_update(&mut self) -> Option<PositionUpdate> {
        match self.watch.as_mut() {
            Some(watch) => watch.next().await,
            None => None,
        }
    }

    /// Take an already delivered watch update without waiting.
    pub fn try_watch_update(&mut self) -> Option<PositionUpdate> {
        self.watch.as_mut().and_then(LocationWatch::try_next)
    }

    /// Single fix, bounded by the configured timeout.
    pub async fn read_position_once(&mut self) -> Result<Position, SensorError> {
        let read = self.location.current_position(&self.watch_options);
        match tokio::time::timeout(self.position_timeout, read).await {
            Ok(Ok(position)) => {
                debug!("Position fix {:?}", position);
                Ok(position)
            }
            Ok(Err(e)) => {
                warn!("Position read failed: {}", e);
                Err(e)
            }
            Err(_) => {
                warn!("Position read timed out after {:?}", self.position_timeout);
                Err(SensorError::Timeout(self.position_timeout))
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Capture accuracy gate.
    pub fn gate(&self) -> &AccuracyGate {
        &self.gate
    }

    /// Mutable capture accuracy gate.
    pub fn gate_mut(&mut self) -> &mut AccuracyGate {
        &mut self.gate
    }

    /// Borrow the camera device.
    pub fn camera(&self) -> &C {
        &self.camera
    }

    /// Borrow the position source.
    pub fn location(&self) -> &L {
        &self.location
    }

    /// Mutably borrow the position source.
    pub fn location_mut(&mut self) -> &mut L {
        &mut self.location
    }
}

impl<C: CameraDevice, L: PositionSource> Drop for SensorManager<C, L> {
    fn drop(&mut self) {
        self.release_location_watch();
        self.release_camera();
    }
}
