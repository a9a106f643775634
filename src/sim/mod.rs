//! Simulated Devices
//!
//! In-process camera, GPS, detector and share strategies. The demo binary
//! runs a whole game on these and the tests use them to count acquires and
//! releases.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use image::{Rgb, RgbImage};
use tokio::sync::mpsc;
use tracing::debug;

use crate::challenge::share::{ShareError, ShareMethod, SharePayload, ShareStrategy};
use crate::core::geo::Position;
use crate::sensor::camera::{CameraConstraints, CameraDevice, StreamId};
use crate::sensor::error::{SensorError, SensorKind};
use crate::sensor::location::{PositionSource, PositionUpdate, WatchId, WatchOptions};
use crate::vision::detect::{DetectionError, ObjectDetector, RawPrediction};
use crate::vision::frame::Frame;

// =============================================================================
// RESOURCE LOG
// =============================================================================

/// Shared count of resources a device currently has open.
///
/// Clones share the counter, so a test can keep one after the device has
/// moved into (and been dropped with) a manager.
#[derive(Clone, Debug, Default)]
pub struct ResourceLog {
    live: Arc<AtomicUsize>,
}

impl ResourceLog {
    /// Resources currently open.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn opened(&self) {
        self.live.fetch_add(1, Ordering::SeqCst);
    }

    fn closed(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

// =============================================================================
// CAMERA
// =============================================================================

/// Camera that serves one fixed frame.
#[derive(Debug)]
pub struct SimCamera {
    frame: Frame,
    deny: bool,
    next_id: u64,
    streams: Vec<StreamId>,
    opens: usize,
    closes: usize,
    grabs: usize,
    log: ResourceLog,
}

impl SimCamera {
    /// Camera that grants access and serves [`test_pattern`].
    pub fn new() -> Self {
        Self::with_frame(test_pattern(640, 480))
    }

    /// Camera that grants access and serves `frame`.
    pub fn with_frame(frame: Frame) -> Self {
        Self {
            frame,
            deny: false,
            next_id: 1,
            streams: Vec::new(),
            opens: 0,
            closes: 0,
            grabs: 0,
            log: ResourceLog::default(),
        }
    }

    /// Camera whose permission prompt is always refused.
    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::new()
        }
    }

    /// Successful opens.
    pub fn opens(&self) -> usize {
        self.opens
    }

    /// Closes of live streams.
    pub fn closes(&self) -> usize {
        self.closes
    }

    /// Frames handed out.
    pub fn frames_grabbed(&self) -> usize {
        self.grabs
    }

    /// Streams currently open.
    pub fn live_streams(&self) -> usize {
        self.streams.len()
    }

    /// Shared open-stream counter.
    pub fn log(&self) -> ResourceLog {
        self.log.clone()
    }
}

impl Default for SimCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDevice for SimCamera {
    async fn open(&mut self, constraints: &CameraConstraints) -> Result<StreamId, SensorError> {
        if self.deny {
            return Err(SensorError::PermissionDenied(SensorKind::Camera));
        }

        let id = StreamId(self.next_id);
        self.next_id += 1;
        self.streams.push(id);
        self.opens += 1;
        self.log.opened();
        debug!(
            "sim camera opened {:?} ({:?} {}x{})",
            id, constraints.facing, constraints.ideal_width, constraints.ideal_height
        );
        Ok(id)
    }

    fn close(&mut self, stream: StreamId) {
        if let Some(idx) = self.streams.iter().position(|s| *s == stream) {
            self.streams.swap_remove(idx);
            self.closes += 1;
            self.log.closed();
        }
    }

    fn grab_frame(&mut self, stream: StreamId) -> Result<Frame, SensorError> {
        if !self.streams.contains(&stream) {
            return Err(SensorError::NotAcquired(SensorKind::Camera));
        }
        self.grabs += 1;
        Ok(self.frame.clone())
    }
}

/// Gradient frame with some structure, so JPEG sizes track resolution.
pub fn test_pattern(width: u32, height: u32) -> Frame {
    let image = RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        let b = if (x / 16 + y / 16) % 2 == 0 { 200 } else { 40 };
        Rgb([r, g, b])
    });
    Frame::new(image)
}

// =============================================================================
// GPS
// =============================================================================

/// Position source with a scripted fix and manually pushed watch updates.
#[derive(Debug)]
pub struct SimGps {
    fix: Option<Position>,
    deny: bool,
    deny_watch: bool,
    next_id: u64,
    watches: Vec<(WatchId, mpsc::UnboundedSender<PositionUpdate>)>,
    reads: usize,
    clears: usize,
    log: ResourceLog,
}

impl SimGps {
    fn with_fix(fix: Option<Position>) -> Self {
        Self {
            fix,
            deny: false,
            deny_watch: false,
            next_id: 1,
            watches: Vec::new(),
            reads: 0,
            clears: 0,
            log: ResourceLog::default(),
        }
    }

    /// Single reads answer with this fix.
    pub fn fixed(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self::with_fix(Some(Position::with_accuracy(latitude, longitude, accuracy)))
    }

    /// Single reads never answer.
    pub fn silent() -> Self {
        Self::with_fix(None)
    }

    /// Every request is refused.
    pub fn denied() -> Self {
        Self {
            deny: true,
            deny_watch: true,
            ..Self::silent()
        }
    }

    /// Refuse watches but keep answering single reads.
    pub fn deny_watch(mut self) -> Self {
        self.deny_watch = true;
        self
    }

    /// Deliver a fix to every live watch.
    pub fn push(&mut self, position: Position) {
        self.broadcast(Ok(position));
    }

    /// Deliver an error to every live watch.
    pub fn push_error(&mut self, error: SensorError) {
        self.broadcast(Err(error));
    }

    fn broadcast(&mut self, update: PositionUpdate) {
        for (id, tx) in &self.watches {
            if tx.send(update.clone()).is_err() {
                debug!("sim gps watch {:?} receiver gone", id);
            }
        }
    }

    /// Single reads attempted.
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Watches currently registered.
    pub fn active_watches(&self) -> usize {
        self.watches.len()
    }

    /// Watches cleared.
    pub fn clears(&self) -> usize {
        self.clears
    }

    /// Shared live-watch counter.
    pub fn log(&self) -> ResourceLog {
        self.log.clone()
    }
}

impl PositionSource for SimGps {
    async fn current_position(&mut self, _options: &WatchOptions) -> Result<Position, SensorError> {
        self.reads += 1;
        if self.deny {
            return Err(SensorError::PermissionDenied(SensorKind::Location));
        }
        match self.fix {
            Some(position) => Ok(position),
            None => std::future::pending().await,
        }
    }

    fn watch(
        &mut self,
        options: &WatchOptions,
    ) -> Result<(WatchId, mpsc::UnboundedReceiver<PositionUpdate>), SensorError> {
        if self.deny_watch {
            return Err(SensorError::PermissionDenied(SensorKind::Location));
        }

        let id = WatchId(self.next_id);
        self.next_id += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.watches.push((id, tx));
        self.log.opened();
        debug!("sim gps watch {:?} (high accuracy: {})", id, options.high_accuracy);
        Ok((id, rx))
    }

    fn clear_watch(&mut self, id: WatchId) {
        if let Some(idx) = self.watches.iter().position(|(w, _)| *w == id) {
            self.watches.swap_remove(idx);
            self.clears += 1;
            self.log.closed();
        }
    }
}

// =============================================================================
// DETECTOR
// =============================================================================

/// Detector that returns a scripted prediction list for every frame.
#[derive(Debug)]
pub struct SimDetector {
    ready: bool,
    predictions: Vec<RawPrediction>,
    failure: Option<DetectionError>,
    calls: usize,
}

impl SimDetector {
    /// Loaded detector returning `predictions`.
    pub fn ready(predictions: Vec<RawPrediction>) -> Self {
        Self {
            ready: true,
            predictions,
            failure: None,
            calls: 0,
        }
    }

    /// Detector still loading; returns [`street_scene`] once loaded.
    pub fn loading() -> Self {
        Self {
            ready: false,
            ..Self::ready(street_scene())
        }
    }

    /// Mark the model loaded.
    pub fn finish_loading(&mut self) {
        self.ready = true;
    }

    /// Fail the next inference with `error`.
    pub fn fail_next(&mut self, error: DetectionError) {
        self.failure = Some(error);
    }

    /// Inferences run.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl ObjectDetector for SimDetector {
    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawPrediction>, DetectionError> {
        self.calls += 1;
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(self.predictions.clone()),
        }
    }
}

/// A plausible raw result for a street photo, including a duplicate and a
/// low-confidence label.
pub fn street_scene() -> Vec<RawPrediction> {
    vec![
        RawPrediction::new("bench", 0.91),
        RawPrediction::new("person", 0.84),
        RawPrediction::new("bench", 0.62),
        RawPrediction::new("traffic light", 0.57),
        RawPrediction::new("dog", 0.31),
    ]
}

// =============================================================================
// SHARE
// =============================================================================

/// Share strategy with a fixed result.
#[derive(Debug)]
pub struct ScriptedShare {
    method: ShareMethod,
    result: Result<(), ShareError>,
}

impl ScriptedShare {
    /// Always succeeds.
    pub fn succeeding(method: ShareMethod) -> Self {
        Self {
            method,
            result: Ok(()),
        }
    }

    /// Always fails with `error`.
    pub fn failing(method: ShareMethod, error: ShareError) -> Self {
        Self {
            method,
            result: Err(error),
        }
    }

}

impl ShareStrategy for ScriptedShare {
    fn method(&self) -> ShareMethod {
        self.method
    }

    fn share<'a>(&'a mut self, payload: &'a SharePayload) -> BoxFuture<'a, Result<(), ShareError>> {
        Box::pin(async move {
            debug!("sim share via {}: {}", self.method, payload.url);
            self.result.clone()
        })
    }
}
