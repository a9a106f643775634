//! Mode State Machine
//!
//! Drives one player's game through Photo → Items → Guessing and owns the
//! game state, the sensors and the detector. Every mutation of
//! [`GameState`] goes through a named transition here.
//!
//! ```text
//!   start ──(no/invalid challenge)──► Photo ──capture──► Items
//!     │                                 ▲                  │
//!     │                               reset             confirm
//!     │                                 │                  ▼
//!     └──(valid challenge / items)───► Guessing ◄──────────┘
//! ```
//!
//! Transitions called from a mode that does not define them return
//! [`Transition::Ignored`] and change nothing.

use thiserror::Error;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::challenge::codec::{challenge_json, decode_challenge, encode_challenge, ChallengeError};
use crate::challenge::link::{challenge_from_url, challenge_link, shared_items_from_url};
use crate::challenge::record::ChallengeRecord;
use crate::challenge::share::{QrRenderer, ShareChain, ShareError, ShareMethod, ShareOutcome, SharePayload};
use crate::core::geo::{check_win, distance_meters, Position};
use crate::game::config::GameConfig;
use crate::game::events::{StatusEvent, StatusKind};
use crate::game::state::{GameState, Mode};
use crate::sensor::camera::{CameraDevice, StreamId};
use crate::sensor::error::SensorError;
use crate::sensor::location::{PositionSource, PositionUpdate, WatchId};
use crate::sensor::manager::SensorManager;
use crate::vision::detect::{DetectionAdapter, DetectionError, ObjectDetector};
use crate::vision::frame::{FrameError, PhotoPayloads};

// =============================================================================
// RESULTS
// =============================================================================

/// Result of a transition request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The machine moved.
    Moved {
        /// Mode before.
        from: Mode,
        /// Mode after.
        to: Mode,
    },
    /// Not defined for the current mode; nothing changed.
    Ignored {
        /// Mode the machine stayed in.
        mode: Mode,
    },
}

impl Transition {
    /// Whether the machine moved.
    pub fn moved(&self) -> bool {
        matches!(self, Transition::Moved { .. })
    }
}

/// Why a capture did not produce items. The machine stays in Photo mode.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Detector not loaded. No sensor was touched.
    #[error("detection model unavailable")]
    ModelUnavailable,

    /// No live camera stream.
    #[error("camera not available")]
    CameraUnavailable,

    /// Latest accuracy is worse than the capture limit.
    #[error("accuracy {accuracy:?}m exceeds limit {limit}m")]
    AccuracyInsufficient {
        /// Reported accuracy radius, if any.
        accuracy: Option<f64>,
        /// Configured limit.
        limit: f64,
    },

    /// Camera or location failure.
    #[error("sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// Photo encoding failed.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Inference failed.
    #[error("detection error: {0}")]
    Detection(DetectionError),

    /// Nothing survived filtering.
    #[error("no items detected")]
    NoItemsDetected,
}

impl From<DetectionError> for CaptureError {
    fn from(e: DetectionError) -> Self {
        match e {
            DetectionError::ModelUnavailable => CaptureError::ModelUnavailable,
            other => CaptureError::Detection(other),
        }
    }
}

/// Progress report for one position update while guessing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GuessProgress {
    /// Meters to the photo location.
    pub distance_m: f64,
    /// Score after this update.
    pub score: u8,
    /// Whether this update set the score latch.
    pub newly_won: bool,
}

/// What a position update did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PositionOutcome {
    /// Mode does not use positions, or there is nothing to compare against.
    Ignored,
    /// Photo mode: capture gate state after this reading.
    Gate {
        /// Whether capture is allowed by accuracy.
        open: bool,
    },
    /// Guessing mode: distance and score.
    Progress(GuessProgress),
    /// The update carried an error.
    Failed,
}

// =============================================================================
// GAME SESSION
// =============================================================================

/// The mode machine.
pub struct GameSession<C: CameraDevice, L: PositionSource, D: ObjectDetector> {
    config: GameConfig,
    state: GameState,
    sensors: SensorManager<C, L>,
    detection: DetectionAdapter<D>,
    /// Identifies the current guessing session in logs.
    guess_id: Option<Uuid>,
    status: Vec<StatusEvent>,
    next_seq: u64,
}

impl<C: CameraDevice, L: PositionSource, D: ObjectDetector> GameSession<C, L, D> {
    /// Create a session in Photo mode holding no resources.
    ///
    /// Call [`start`](Self::start) to acquire sensors.
    pub fn new(config: GameConfig, camera: C, location: L, detector: D) -> Self {
        let sensors = SensorManager::new(
            camera,
            location,
            config.camera.clone(),
            config.watch.clone(),
            config.position_timeout,
            config.capture_accuracy_m,
        );
        let detection = DetectionAdapter::new(detector, config.detection_threshold);

        Self {
            config,
            state: GameState::new(),
            sensors,
            detection,
            guess_id: None,
            status: Vec::new(),
            next_seq: 0,
        }
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Start from an entry URL.
    ///
    /// A valid `challenge` parameter goes straight to Guessing without ever
    /// touching the camera. Without one, an old `items` link also goes to
    /// Guessing, with nothing to measure against. Anything else starts in
    /// Photo mode; a malformed challenge additionally raises
    /// [`StatusKind::InvalidChallenge`].
    ///
    /// Calling it again abandons the current game, whatever its mode.
    pub async fn start(&mut self, entry_url: Option<&str>) -> Mode {
        if let Some(url) = entry_url {
            if let Some(token) = challenge_from_url(url) {
                match decode_challenge(&token) {
                    Ok(record) => {
                        self.enter_challenge(&record);
                        return self.state.mode;
                    }
                    Err(e) => {
                        warn!("Ignoring malformed challenge: {}", e);
                        self.push_status(StatusKind::InvalidChallenge);
                    }
                }
            } else if let Some(items) = shared_items_from_url(url) {
                self.enter_shared_items(items);
                return self.state.mode;
            }
        }

        self.start_photo().await;
        self.state.mode
    }

    /// Load a decoded challenge into a fresh guessing session.
    fn enter_challenge(&mut self, record: &ChallengeRecord) {
        self.sensors.release_camera();
        self.state = GameState::from_challenge(record);
        info!(
            "Challenge loaded: {} item(s), issued at {}",
            record.items.len(),
            record.issued_at
        );
        self.push_status(StatusKind::ChallengeLoaded { count: record.items.len() });
        self.begin_guessing_session();
    }

    /// Items-only link: guess without a photo location.
    fn enter_shared_items(&mut self, items: Vec<String>) {
        self.sensors.release_camera();
        info!("Shared items loaded: {:?}", items);
        let count = items.len();
        self.state = GameState::from_shared_items(items);
        self.push_status(StatusKind::SharedItemsLoaded { count });
        self.begin_guessing_session();
    }

    async fn start_photo(&mut self) {
        self.sensors.release_location_watch();
        if let Some(id) = self.guess_id.take() {
            info!(session = %id, "Guessing session abandoned");
        }
        self.state = GameState::new();
        self.sensors.gate_mut().reset();

        if !self.detection.is_ready() {
            self.push_status(StatusKind::ModelLoading);
        }
        self.acquire_camera().await;
    }

    /// Tell the machine the detector finished loading.
    pub fn on_model_ready(&mut self) {
        if self.detection.is_ready() {
            info!("Detection model ready");
            self.push_status(StatusKind::ModelReady);
        }
    }

    // =========================================================================
    // Photo → Items
    // =========================================================================

    /// Whether a capture would currently be attempted.
    pub fn capture_enabled(&self) -> bool {
        self.state.mode == Mode::Photo
            && self.detection.is_ready()
            && self.sensors.camera_stream().is_some()
            && (!self.sensors.gate().has_reading() || self.sensors.gate().is_open())
    }

    /// Take the puzzle photo: read a fix, detect items, move to Items.
    ///
    /// On any error the machine stays in Photo mode with the capture fields
    /// cleared, ready for another try.
    pub async fn capture(&mut self) -> Result<Transition, CaptureError> {
        if self.state.mode != Mode::Photo {
            return Ok(self.ignored("capture"));
        }

        // Before any sensor side effect.
        if !self.detection.is_ready() {
            self.push_status(StatusKind::ModelUnavailable);
            return Err(CaptureError::ModelUnavailable);
        }

        match self.try_capture().await {
            Ok(count) => {
                self.state.mode = Mode::Items;
                info!("Captured {} item(s): {:?}", count, self.state.detected_items);
                self.push_status(StatusKind::ItemsDetected { count });
                Ok(Transition::Moved { from: Mode::Photo, to: Mode::Items })
            }
            Err(e) => {
                self.state.clear_capture();
                self.state.detected_items.clear();
                self.push_status(capture_status(&e));
                warn!("Capture failed: {}", e);
                Err(e)
            }
        }
    }

    async fn try_capture(&mut self) -> Result<usize, CaptureError> {
        if self.sensors.camera_stream().is_none() {
            return Err(CaptureError::CameraUnavailable);
        }

        let gate = self.sensors.gate();
        if let Some(limit) = gate.limit() {
            if gate.has_reading() && !gate.is_open() {
                return Err(CaptureError::AccuracyInsufficient {
                    accuracy: gate.last_accuracy(),
                    limit,
                });
            }
        }

        self.push_status(StatusKind::Capturing);
        let frame = self.sensors.grab_frame()?;

        let position = self.sensors.read_position_once().await?;
        let open = self.sensors.gate_mut().observe(position.accuracy);
        if let (Some(limit), false) = (self.config.capture_accuracy_m, open) {
            return Err(CaptureError::AccuracyInsufficient {
                accuracy: position.accuracy,
                limit,
            });
        }
        self.state.photo_location = Some(position);

        let payloads = PhotoPayloads::from_frame(&frame, &self.config.photo)?;
        let predictions = self.detection.detect(&frame).await?;
        if predictions.is_empty() {
            return Err(CaptureError::NoItemsDetected);
        }

        self.state.detected_items = predictions.into_iter().map(|p| p.label).collect();
        self.state.captured_photo = Some(payloads.full);
        self.state.share_photo = Some(payloads.thumbnail);
        Ok(self.state.detected_items.len())
    }

    // =========================================================================
    // Items → Guessing
    // =========================================================================

    /// Hand over to the guesser: camera off, location watch on, score reset.
    pub fn confirm(&mut self) -> Transition {
        if self.state.mode != Mode::Items {
            return self.ignored("confirm");
        }

        self.sensors.release_camera();
        self.begin_guessing_session();
        Transition::Moved { from: Mode::Items, to: Mode::Guessing }
    }

    fn begin_guessing_session(&mut self) {
        self.state.begin_guessing();
        let id = Uuid::new_v4();
        self.guess_id = Some(id);

        let _span = info_span!("guessing", session = %id).entered();
        info!("Guessing started with {} item(s)", self.state.detected_items.len());
        self.push_status(StatusKind::GuessingStarted {
            count: self.state.detected_items.len(),
        });

        if let Err(e) = self.sensors.acquire_location_watch() {
            self.push_status(sensor_status(&e));
        }
    }

    // =========================================================================
    // Guessing → Photo
    // =========================================================================

    /// Start over: watch off, session cleared, camera back on.
    pub async fn reset(&mut self) -> Transition {
        if self.state.mode != Mode::Guessing {
            return self.ignored("reset");
        }

        self.sensors.release_location_watch();
        if let Some(id) = self.guess_id.take() {
            info!(session = %id, "Guessing session ended (score {})", self.state.score());
        }
        self.state.clear_session();
        self.state.mode = Mode::Photo;
        self.sensors.gate_mut().reset();
        self.push_status(StatusKind::NewRound);

        self.acquire_camera().await;
        Transition::Moved { from: Mode::Guessing, to: Mode::Photo }
    }

    async fn acquire_camera(&mut self) {
        match self.sensors.acquire_camera().await {
            Ok(_) => self.push_status(StatusKind::CameraReady),
            Err(e) => self.push_status(sensor_status(&e)),
        }
    }

    /// Retry the camera after a denial. Only meaningful in Photo mode.
    pub async fn retry_camera(&mut self) -> bool {
        if self.state.mode != Mode::Photo {
            return false;
        }
        self.acquire_camera().await;
        self.sensors.camera_stream().is_some()
    }

    /// Retry the location watch after a denial. Only meaningful while guessing.
    pub fn retry_location_watch(&mut self) -> bool {
        if self.state.mode != Mode::Guessing {
            return false;
        }
        match self.sensors.acquire_location_watch() {
            Ok(_) => true,
            Err(e) => {
                self.push_status(sensor_status(&e));
                false
            }
        }
    }

    // =========================================================================
    // Position updates
    // =========================================================================

    /// Feed one position update. Safe in any mode.
    pub fn on_position(&mut self, update: PositionUpdate) -> PositionOutcome {
        let position = match update {
            Ok(position) => position,
            Err(e) => {
                warn!("Position update error: {}", e);
                self.push_status(sensor_status(&e));
                return PositionOutcome::Failed;
            }
        };

        match self.state.mode {
            Mode::Photo => self.observe_accuracy(position),
            Mode::Items => PositionOutcome::Ignored,
            Mode::Guessing => self.observe_guess(position),
        }
    }

    fn observe_accuracy(&mut self, position: Position) -> PositionOutcome {
        let gate = self.sensors.gate_mut();
        let was_open = gate.has_reading() && gate.is_open();
        let open = gate.observe(position.accuracy);

        if let Some(limit) = self.config.capture_accuracy_m {
            if open && !was_open {
                if let Some(accuracy) = position.accuracy {
                    self.push_status(StatusKind::AccuracyReady { accuracy });
                }
            } else if !open && (was_open || !self.last_status_is_accuracy()) {
                self.push_status(StatusKind::AccuracyInsufficient {
                    accuracy: position.accuracy,
                    limit,
                });
            }
        }

        PositionOutcome::Gate { open }
    }

    fn last_status_is_accuracy(&self) -> bool {
        matches!(
            self.status.last().map(|s| &s.kind),
            Some(StatusKind::AccuracyInsufficient { .. })
        )
    }

    fn observe_guess(&mut self, position: Position) -> PositionOutcome {
        self.state.current_location = Some(position);

        let Some(photo) = self.state.photo_location else {
            return PositionOutcome::Ignored;
        };

        let distance_m = distance_meters(photo.coords, position.coords);
        let won = check_win(photo.coords, position.coords, self.config.win_distance_m);
        let newly_won = won && self.state.latch_score();
        let score = self.state.score();

        debug!(
            session = ?self.guess_id,
            "Distance {:.1}m (win within {}m), score {}",
            distance_m,
            self.config.win_distance_m,
            score
        );
        self.push_status(StatusKind::Distance { meters: distance_m, score });
        if newly_won {
            info!(session = ?self.guess_id, "Location found at {:.1}m", distance_m);
            self.push_status(StatusKind::LocationFound);
        }

        PositionOutcome::Progress(GuessProgress { distance_m, score, newly_won })
    }

    /// Wait for the next watch update and apply it.
    ///
    /// Returns `None` when no watch is live.
    pub async fn next_position(&mut self) -> Option<PositionOutcome> {
        let update = self.sensors.next_watch_update().await?;
        Some(self.on_position(update))
    }

    /// Apply every watch update already delivered, without waiting.
    pub fn pump_positions(&mut self) -> Vec<PositionOutcome> {
        let mut outcomes = Vec::new();
        while let Some(update) = self.sensors.try_watch_update() {
            outcomes.push(self.on_position(update));
        }
        outcomes
    }

    /// Photo mode: take a single fix to refresh the capture gate.
    pub async fn refresh_accuracy(&mut self) -> PositionOutcome {
        if self.state.mode != Mode::Photo {
            return PositionOutcome::Ignored;
        }
        let update = self.sensors.read_position_once().await;
        self.on_position(update)
    }

    // =========================================================================
    // Sharing
    // =========================================================================

    /// Challenge record for the current puzzle.
    pub fn challenge_record(&self) -> Result<ChallengeRecord, ChallengeError> {
        ChallengeRecord::from_state(&self.state, chrono::Utc::now().timestamp())
            .ok_or(ChallengeError::NoLocation)
    }

    /// Token for the `challenge` query parameter.
    pub fn challenge_token(&self) -> Result<String, ChallengeError> {
        encode_challenge(&self.challenge_record()?)
    }

    /// Full challenge link.
    pub fn challenge_link(&self) -> Result<String, ChallengeError> {
        Ok(challenge_link(&self.config.share_base_url, &self.challenge_token()?))
    }

    /// Compact challenge JSON, for QR codes.
    pub fn qr_payload(&self) -> Result<String, ChallengeError> {
        challenge_json(&self.challenge_record()?)
    }

    /// Render the challenge as a QR image.
    pub fn render_qr(&mut self, renderer: &mut impl QrRenderer) -> Result<Vec<u8>, ShareError> {
        if self.state.detected_items.is_empty() {
            self.push_status(StatusKind::NothingToShare);
            return Err(ShareError::NothingToShare);
        }
        let payload = self
            .qr_payload()
            .map_err(|e| ShareError::Failed(e.to_string()))?;
        renderer.render(&payload)
    }

    /// Share the challenge through `chain`.
    ///
    /// Only fails when there is nothing to share; share method failures are
    /// reported in the outcome and as status events.
    pub async fn share(&mut self, chain: &mut ShareChain) -> Result<ShareOutcome, ShareError> {
        if self.state.detected_items.is_empty() {
            self.push_status(StatusKind::NothingToShare);
            return Err(ShareError::NothingToShare);
        }

        let url = match self.challenge_link() {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot build challenge link: {}", e);
                self.push_status(StatusKind::NothingToShare);
                return Err(ShareError::NothingToShare);
            }
        };
        let payload = SharePayload::for_challenge(&self.state.detected_items, url);

        let outcome = chain.run(&payload).await;
        for (method, _) in &outcome.failures {
            self.push_status(StatusKind::ShareFallback { method: *method });
        }
        match outcome.method {
            Some(ShareMethod::Manual) => self.push_status(StatusKind::ManualCopy { text: payload.text }),
            Some(method) => self.push_status(StatusKind::Shared { method }),
            None => self.push_status(StatusKind::ShareUnavailable),
        }
        Ok(outcome)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current mode.
    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    /// Read-only game state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Session configuration.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Live camera stream handle.
    pub fn camera_handle(&self) -> Option<StreamId> {
        self.sensors.camera_stream()
    }

    /// Live location watch handle.
    pub fn location_watch_handle(&self) -> Option<WatchId> {
        self.sensors.watch_id()
    }

    /// Id of the current guessing session.
    pub fn guess_id(&self) -> Option<Uuid> {
        self.guess_id
    }

    /// Sensor manager.
    pub fn sensors(&self) -> &SensorManager<C, L> {
        &self.sensors
    }

    /// Mutable sensor manager (device access for hosts and tests).
    pub fn sensors_mut(&mut self) -> &mut SensorManager<C, L> {
        &mut self.sensors
    }

    /// Mutable detector.
    pub fn detector_mut(&mut self) -> &mut D {
        self.detection.detector_mut()
    }

    /// Take queued status events.
    pub fn take_status(&mut self) -> Vec<StatusEvent> {
        std::mem::take(&mut self.status)
    }

    fn push_status(&mut self, kind: StatusKind) {
        let event = StatusEvent {
            seq: self.next_seq,
            mode: self.state.mode,
            kind,
        };
        self.next_seq += 1;
        debug!("Status [{:?}] {}", event.level(), event.message());
        self.status.push(event);
    }

    fn ignored(&self, op: &str) -> Transition {
        debug!("{} ignored in {} mode", op, self.state.mode);
        Transition::Ignored { mode: self.state.mode }
    }
}

fn sensor_status(e: &SensorError) -> StatusKind {
    use crate::sensor::error::SensorKind;

    match e {
        SensorError::PermissionDenied(SensorKind::Camera)
        | SensorError::Unsupported(SensorKind::Camera)
        | SensorError::NotAcquired(SensorKind::Camera) => StatusKind::CameraDenied,
        SensorError::PermissionDenied(SensorKind::Location)
        | SensorError::Unsupported(SensorKind::Location)
        | SensorError::NotAcquired(SensorKind::Location) => StatusKind::LocationDenied,
        SensorError::Timeout(_) => StatusKind::PositionTimeout,
        SensorError::Device { kind: SensorKind::Camera, message } => StatusKind::CaptureFailed {
            reason: message.clone(),
        },
        SensorError::Device { kind: SensorKind::Location, message } => StatusKind::PositionFailed {
            reason: message.clone(),
        },
    }
}

fn capture_status(e: &CaptureError) -> StatusKind {
    match e {
        CaptureError::ModelUnavailable => StatusKind::ModelUnavailable,
        CaptureError::CameraUnavailable => StatusKind::CameraDenied,
        CaptureError::AccuracyInsufficient { accuracy, limit } => StatusKind::AccuracyInsufficient {
            accuracy: *accuracy,
            limit: *limit,
        },
        CaptureError::Sensor(e) => sensor_status(e),
        CaptureError::NoItemsDetected => StatusKind::NoItemsDetected,
        CaptureError::Frame(e) => StatusKind::CaptureFailed { reason: e.to_string() },
        CaptureError::Detection(e) => StatusKind::CaptureFailed { reason: e.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::challenge::codec::encode_challenge;
    use crate::challenge::link::challenge_link;
    use crate::challenge::share::ManualCopy;
    use crate::sim::{ScriptedShare, SimCamera, SimDetector, SimGps};
    use crate::vision::detect::RawPrediction;

    const PHOTO_LAT: f64 = 59.329_323;
    const PHOTO_LNG: f64 = 18.068_581;

    type TestSession = GameSession<SimCamera, SimGps, SimDetector>;

    fn config() -> GameConfig {
        GameConfig {
            position_timeout: Duration::from_millis(50),
            ..GameConfig::default()
        }
    }

    fn detector() -> SimDetector {
        SimDetector::ready(vec![
            RawPrediction::new("bench", 0.92),
            RawPrediction::new("bench", 0.7),
            RawPrediction::new("potted plant", 0.3),
            RawPrediction::new("bicycle", 0.66),
        ])
    }

    fn session_with(camera: SimCamera, gps: SimGps, detector: SimDetector) -> TestSession {
        GameSession::new(config(), camera, gps, detector)
    }

    async fn started() -> TestSession {
        let mut session = session_with(
            SimCamera::new(),
            SimGps::fixed(PHOTO_LAT, PHOTO_LNG, 4.0),
            detector(),
        );
        assert_eq!(session.start(None).await, Mode::Photo);
        session
    }

    async fn guessing() -> TestSession {
        let mut session = started().await;
        session.capture().await.unwrap();
        session.confirm();
        session
    }

    fn kinds(session: &mut TestSession) -> Vec<StatusKind> {
        session.take_status().into_iter().map(|s| s.kind).collect()
    }

    // --- startup -------------------------------------------------------------

    #[tokio::test]
    async fn test_start_acquires_camera_only() {
        let session = started().await;
        assert_eq!(session.mode(), Mode::Photo);
        assert!(session.camera_handle().is_some());
        assert!(session.location_watch_handle().is_none());
        assert!(session.capture_enabled());
    }

    #[tokio::test]
    async fn test_start_with_denied_camera_disables_capture() {
        let mut session = session_with(
            SimCamera::denied(),
            SimGps::fixed(PHOTO_LAT, PHOTO_LNG, 4.0),
            detector(),
        );
        session.start(None).await;

        assert_eq!(session.mode(), Mode::Photo);
        assert!(!session.capture_enabled());
        assert!(kinds(&mut session).contains(&StatusKind::CameraDenied));

        let err = session.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::CameraUnavailable));
        assert_eq!(session.mode(), Mode::Photo);
    }

    #[tokio::test]
    async fn test_start_from_challenge_skips_camera() {
        let record = ChallengeRecord {
            items: vec!["fountain".into()],
            lat: PHOTO_LAT,
            lng: PHOTO_LNG,
            photo: None,
            issued_at: 1,
        };
        let url = challenge_link("https://x.test/", &encode_challenge(&record).unwrap());

        let mut session = session_with(
            SimCamera::new(),
            SimGps::fixed(PHOTO_LAT, PHOTO_LNG, 4.0),
            detector(),
        );
        assert_eq!(session.start(Some(&url)).await, Mode::Guessing);

        assert_eq!(session.sensors().camera().opens(), 0);
        assert!(session.location_watch_handle().is_some());
        assert_eq!(session.state().detected_items, vec!["fountain"]);
        assert!(kinds(&mut session).contains(&StatusKind::ChallengeLoaded { count: 1 }));
    }

    #[tokio::test]
    async fn test_start_from_challenge_with_no_items() {
        let record = ChallengeRecord {
            items: vec![],
            lat: PHOTO_LAT,
            lng: PHOTO_LNG,
            photo: None,
            issued_at: 1,
        };
        let url = challenge_link("https://x.test/", &encode_challenge(&record).unwrap());
        let mut session = session_with(SimCamera::new(), SimGps::fixed(1.0, 1.0, 1.0), detector());

        assert_eq!(session.start(Some(&url)).await, Mode::Guessing);
        assert!(session.state().detected_items.is_empty());
    }

    #[tokio::test]
    async fn test_restart_while_guessing_releases_watch() {
        let mut session = guessing().await;
        assert!(session.location_watch_handle().is_some());

        assert_eq!(session.start(None).await, Mode::Photo);

        assert!(session.location_watch_handle().is_none());
        assert_eq!(session.sensors().location().active_watches(), 0);
        assert!(session.guess_id().is_none());
        assert!(session.camera_handle().is_some());
        assert_eq!(session.sensors().camera().live_streams(), 1);
        assert!(session.state().detected_items.is_empty());
    }

    #[tokio::test]
    async fn test_start_from_shared_items_link() {
        let mut session = session_with(
            SimCamera::new(),
            SimGps::fixed(PHOTO_LAT, PHOTO_LNG, 4.0),
            detector(),
        );
        let mode = session.start(Some("https://x.test/?items=car,potted+plant,%20tree")).await;

        assert_eq!(mode, Mode::Guessing);
        assert_eq!(session.state().detected_items, vec!["car", "potted plant", "tree"]);
        assert!(session.state().photo_location.is_none());
        assert_eq!(session.sensors().camera().opens(), 0);
        assert!(session.location_watch_handle().is_some());
        assert!(kinds(&mut session).contains(&StatusKind::SharedItemsLoaded { count: 3 }));

        // Nothing to measure against: the fix is stored, the score stays put.
        let outcome = session.on_position(Ok(Position::with_accuracy(PHOTO_LAT, PHOTO_LNG, 3.0)));
        assert_eq!(outcome, PositionOutcome::Ignored);
        assert!(session.state().current_location.is_some());
        assert_eq!(session.state().score(), 0);

        let mut chain = ShareChain::new().with(ManualCopy::new());
        assert_eq!(session.share(&mut chain).await.unwrap_err(), ShareError::NothingToShare);
    }

    #[tokio::test]
    async fn test_unusable_items_link_starts_photo() {
        let mut session = session_with(
            SimCamera::new(),
            SimGps::fixed(PHOTO_LAT, PHOTO_LNG, 4.0),
            detector(),
        );
        assert_eq!(session.start(Some("https://x.test/?items=bench")).await, Mode::Photo);
        assert!(session.camera_handle().is_some());
    }

    #[tokio::test]
    async fn test_start_with_malformed_challenge_falls_back() {
        let mut session = session_with(
            SimCamera::new(),
            SimGps::fixed(PHOTO_LAT, PHOTO_LNG, 4.0),
            detector(),
        );
        let mode = session.start(Some("https://x.test/?challenge=not-base64!!")).await;

        assert_eq!(mode, Mode::Photo);
        assert!(session.camera_handle().is_some());
        assert!(kinds(&mut session).contains(&StatusKind::InvalidChallenge));
    }

    // --- capture -------------------------------------------------------------

    #[tokio::test]
    async fn test_capture_moves_to_items() {
        let mut session = started().await;
        let t = session.capture().await.unwrap();

        assert_eq!(t, Transition::Moved { from: Mode::Photo, to: Mode::Items });
        let state = session.state();
        assert_eq!(state.detected_items, vec!["bench", "bicycle"]);
        assert_eq!(state.photo_location.unwrap().coords.latitude, PHOTO_LAT);
        assert!(state.captured_photo.is_some());
        assert!(state.share_photo.as_ref().unwrap().len() < state.captured_photo.as_ref().unwrap().len());
        assert_eq!(session.sensors().camera().frames_grabbed(), 1);
        assert_eq!(session.sensors().location().reads(), 1);
    }

    #[tokio::test]
    async fn test_capture_before_model_ready_touches_no_sensor() {
        let mut session = session_with(
            SimCamera::new(),
            SimGps::fixed(PHOTO_LAT, PHOTO_LNG, 4.0),
            SimDetector::loading(),
        );
        session.start(None).await;
        assert!(kinds(&mut session).contains(&StatusKind::ModelLoading));

        let err = session.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::ModelUnavailable));
        assert_eq!(session.sensors().camera().frames_grabbed(), 0);
        assert_eq!(session.sensors().location().reads(), 0);
        assert_eq!(session.detector_mut().calls(), 0);
        assert_eq!(session.mode(), Mode::Photo);

        session.detector_mut().finish_loading();
        session.on_model_ready();
        assert!(kinds(&mut session).contains(&StatusKind::ModelReady));
        assert!(session.capture().await.unwrap().moved());
    }

    #[tokio::test]
    async fn test_inference_failure_returns_to_photo() {
        let mut session = started().await;
        session
            .detector_mut()
            .fail_next(DetectionError::Inference("backend lost".into()));

        let err = session.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::Detection(DetectionError::Inference(_))));
        assert_eq!(session.mode(), Mode::Photo);
        assert!(session.state().photo_location.is_none());
        assert!(session.state().detected_items.is_empty());
        assert!(session.state().captured_photo.is_none());
        assert!(session.camera_handle().is_some());
        assert!(kinds(&mut session)
            .iter()
            .any(|k| matches!(k, StatusKind::CaptureFailed { reason } if reason.contains("backend lost"))));

        assert!(session.capture().await.unwrap().moved());
        assert_eq!(session.detector_mut().calls(), 2);
    }

    #[tokio::test]
    async fn test_capture_with_no_items_returns_to_photo() {
        let mut session = session_with(
            SimCamera::new(),
            SimGps::fixed(PHOTO_LAT, PHOTO_LNG, 4.0),
            SimDetector::ready(vec![RawPrediction::new("cat", 0.2)]),
        );
        session.start(None).await;

        let err = session.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::NoItemsDetected));
        assert_eq!(session.mode(), Mode::Photo);
        assert!(session.state().photo_location.is_none());
        assert!(session.state().captured_photo.is_none());
        assert!(session.capture_enabled());
    }

    #[tokio::test]
    async fn test_capture_blocked_by_poor_accuracy() {
        let mut session = session_with(
            SimCamera::new(),
            SimGps::fixed(PHOTO_LAT, PHOTO_LNG, 18.0),
            detector(),
        );
        session.start(None).await;

        let err = session.capture().await.unwrap_err();
        match err {
            CaptureError::AccuracyInsufficient { accuracy, limit } => {
                assert_eq!(accuracy, Some(18.0));
                assert_eq!(limit, 7.0);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(session.mode(), Mode::Photo);
        assert!(session.state().photo_location.is_none());
        assert!(!session.capture_enabled());
    }

    #[tokio::test]
    async fn test_gate_checked_before_reading() {
        let mut session = started().await;

        let outcome = session.on_position(Ok(Position::with_accuracy(PHOTO_LAT, PHOTO_LNG, 30.0)));
        assert_eq!(outcome, PositionOutcome::Gate { open: false });
        assert!(!session.capture_enabled());

        let reads_before = session.sensors().location().reads();
        assert!(session.capture().await.is_err());
        assert_eq!(session.sensors().location().reads(), reads_before);

        let outcome = session.on_position(Ok(Position::with_accuracy(PHOTO_LAT, PHOTO_LNG, 5.0)));
        assert_eq!(outcome, PositionOutcome::Gate { open: true });
        assert!(session.capture_enabled());
        assert!(session.capture().await.unwrap().moved());
    }

    #[tokio::test]
    async fn test_gating_disabled() {
        let mut session = GameSession::new(
            GameConfig {
                capture_accuracy_m: None,
                ..config()
            },
            SimCamera::new(),
            SimGps::fixed(PHOTO_LAT, PHOTO_LNG, 150.0),
            detector(),
        );
        session.start(None).await;
        assert!(session.capture().await.unwrap().moved());
    }

    #[tokio::test]
    async fn test_capture_position_timeout() {
        let mut session = session_with(SimCamera::new(), SimGps::silent(), detector());
        session.start(None).await;

        let err = session.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::Sensor(SensorError::Timeout(_))));
        assert_eq!(session.mode(), Mode::Photo);
        assert!(kinds(&mut session).contains(&StatusKind::PositionTimeout));
    }

    #[tokio::test]
    async fn test_refresh_accuracy_feeds_gate() {
        let mut session = started().await;
        assert_eq!(session.refresh_accuracy().await, PositionOutcome::Gate { open: true });
        assert!(session.location_watch_handle().is_none());
    }

    // --- confirm / reset -----------------------------------------------------

    #[tokio::test]
    async fn test_confirm_in_photo_is_noop() {
        let mut session = started().await;
        let before = session.state().clone();

        assert_eq!(session.confirm(), Transition::Ignored { mode: Mode::Photo });
        assert_eq!(session.state(), &before);
        assert!(session.camera_handle().is_some());
        assert!(session.location_watch_handle().is_none());
    }

    #[tokio::test]
    async fn test_undefined_transitions_are_noops() {
        let mut session = started().await;
        assert!(!session.reset().await.moved());

        session.capture().await.unwrap();
        assert!(!session.capture().await.unwrap().moved());
        assert!(!session.reset().await.moved());
        assert_eq!(session.mode(), Mode::Items);

        session.confirm();
        assert!(!session.confirm().moved());
        assert!(!session.capture().await.unwrap().moved());
        assert_eq!(session.mode(), Mode::Guessing);
    }

    #[tokio::test]
    async fn test_confirm_swaps_camera_for_watch() {
        let mut session = started().await;
        session.capture().await.unwrap();
        let t = session.confirm();

        assert_eq!(t, Transition::Moved { from: Mode::Items, to: Mode::Guessing });
        assert!(session.camera_handle().is_none());
        assert_eq!(session.sensors().camera().live_streams(), 0);
        assert!(session.location_watch_handle().is_some());
        assert_eq!(session.state().score(), 0);
        assert!(session.state().current_location.is_none());
        assert!(session.guess_id().is_some());
    }

    #[tokio::test]
    async fn test_confirm_with_denied_location_still_guesses() {
        let mut session = session_with(
            SimCamera::new(),
            SimGps::fixed(PHOTO_LAT, PHOTO_LNG, 4.0).deny_watch(),
            detector(),
        );
        session.start(None).await;
        session.capture().await.unwrap();

        assert!(session.confirm().moved());
        assert!(session.location_watch_handle().is_none());
        assert!(kinds(&mut session).contains(&StatusKind::LocationDenied));
        assert!(!session.retry_location_watch());
    }

    #[tokio::test]
    async fn test_reset_clears_session_and_reacquires_camera() {
        let mut session = guessing().await;
        session.sensors_mut().location_mut().push(Position::with_accuracy(PHOTO_LAT, PHOTO_LNG, 3.0));
        session.pump_positions();
        assert_eq!(session.state().score(), 1);

        let t = session.reset().await;
        assert_eq!(t, Transition::Moved { from: Mode::Guessing, to: Mode::Photo });

        let state = session.state();
        assert!(state.detected_items.is_empty());
        assert!(state.photo_location.is_none());
        assert!(state.current_location.is_none());
        assert_eq!(state.score(), 0);
        assert!(state.captured_photo.is_none());
        assert!(state.share_photo.is_none());

        assert!(session.location_watch_handle().is_none());
        assert_eq!(session.sensors().location().active_watches(), 0);
        assert!(session.camera_handle().is_some());
        assert_eq!(session.sensors().camera().live_streams(), 1);
        assert!(session.guess_id().is_none());
    }

    // --- guessing ------------------------------------------------------------

    #[tokio::test]
    async fn test_score_latch_survives_walking_away() {
        let mut session = guessing().await;
        let gps = session.sensors_mut().location_mut();
        gps.push(Position::with_accuracy(PHOTO_LAT + 0.01, PHOTO_LNG, 5.0)); // ~1.1 km
        gps.push(Position::with_accuracy(PHOTO_LAT + 0.0001, PHOTO_LNG, 5.0)); // ~11 m
        gps.push(Position::with_accuracy(PHOTO_LAT + 0.02, PHOTO_LNG, 5.0)); // ~2.2 km

        let outcomes = session.pump_positions();
        let scores: Vec<u8> = outcomes
            .iter()
            .map(|o| match o {
                PositionOutcome::Progress(p) => p.score,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(scores, vec![0, 1, 1]);

        let wins = outcomes
            .iter()
            .filter(|o| matches!(o, PositionOutcome::Progress(p) if p.newly_won))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(session.state().score(), 1);

        let found = kinds(&mut session)
            .into_iter()
            .filter(|k| *k == StatusKind::LocationFound)
            .count();
        assert_eq!(found, 1);
    }

    #[tokio::test]
    async fn test_noisy_walk_never_unlatches() {
        use rand::{Rng, SeedableRng};

        let mut session = guessing().await;
        session.on_position(Ok(Position::with_accuracy(PHOTO_LAT, PHOTO_LNG, 3.0)));
        assert_eq!(session.state().score(), 1);

        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let lat = PHOTO_LAT + rng.gen_range(-0.05..0.05);
            let lng = PHOTO_LNG + rng.gen_range(-0.05..0.05);
            let acc = rng.gen_range(1.0..80.0);
            session.on_position(Ok(Position::with_accuracy(lat, lng, acc)));
            assert_eq!(session.state().score(), 1);
        }
    }

    #[tokio::test]
    async fn test_win_threshold_is_configurable() {
        let mut session = GameSession::new(
            GameConfig {
                win_distance_m: 10.0,
                ..config()
            },
            SimCamera::new(),
            SimGps::fixed(PHOTO_LAT, PHOTO_LNG, 4.0),
            detector(),
        );
        session.start(None).await;
        session.capture().await.unwrap();
        session.confirm();

        // ~11 m away: outside 10 m, inside the 25 m default.
        let outcome = session.on_position(Ok(Position::with_accuracy(PHOTO_LAT + 0.0001, PHOTO_LNG, 3.0)));
        assert!(matches!(outcome, PositionOutcome::Progress(p) if p.score == 0));
    }

    #[tokio::test]
    async fn test_new_guessing_session_resets_latch() {
        let mut session = guessing().await;
        session.on_position(Ok(Position::with_accuracy(PHOTO_LAT, PHOTO_LNG, 3.0)));
        assert_eq!(session.state().score(), 1);

        session.reset().await;
        session.capture().await.unwrap();
        session.confirm();
        assert_eq!(session.state().score(), 0);
    }

    #[tokio::test]
    async fn test_updates_in_items_are_ignored() {
        let mut session = started().await;
        session.capture().await.unwrap();
        let before = session.state().clone();

        let outcome = session.on_position(Ok(Position::with_accuracy(1.0, 1.0, 1.0)));
        assert_eq!(outcome, PositionOutcome::Ignored);
        assert_eq!(session.state(), &before);
    }

    #[tokio::test]
    async fn test_watch_error_is_reported() {
        let mut session = guessing().await;
        session
            .sensors_mut()
            .location_mut()
            .push_error(SensorError::PermissionDenied(crate::sensor::error::SensorKind::Location));

        assert_eq!(session.next_position().await, Some(PositionOutcome::Failed));
        assert!(kinds(&mut session).contains(&StatusKind::LocationDenied));
        assert_eq!(session.mode(), Mode::Guessing);
    }

    #[tokio::test]
    async fn test_next_position_without_watch() {
        let mut session = started().await;
        assert_eq!(session.next_position().await, None);
    }

    // --- sharing -------------------------------------------------------------

    #[tokio::test]
    async fn test_share_needs_items() {
        let mut session = started().await;
        let mut chain = ShareChain::new().with(ManualCopy::new());

        let err = session.share(&mut chain).await.unwrap_err();
        assert_eq!(err, ShareError::NothingToShare);
        assert!(kinds(&mut session).contains(&StatusKind::NothingToShare));
    }

    #[tokio::test]
    async fn test_share_link_decodes_back() {
        let mut session = started().await;
        session.capture().await.unwrap();

        let token = session.challenge_token().unwrap();
        let record = decode_challenge(&token).unwrap();
        assert_eq!(record.items, vec!["bench", "bicycle"]);
        assert_eq!(record.lat, PHOTO_LAT);
        assert_eq!(record.lng, PHOTO_LNG);
        assert_eq!(record.photo, session.state().share_photo);
        assert!(record.issued_at > 0);

        let link = session.challenge_link().unwrap();
        assert!(link.starts_with(&session.config().share_base_url));
        assert_eq!(challenge_from_url(&link), Some(token));
    }

    #[tokio::test]
    async fn test_share_falls_back_to_manual() {
        let mut session = started().await;
        session.capture().await.unwrap();
        let mut chain = ShareChain::new()
            .with(ScriptedShare::failing(ShareMethod::Native, ShareError::Unavailable))
            .with(ScriptedShare::failing(ShareMethod::Clipboard, ShareError::Failed("denied".into())))
            .with(ManualCopy::new());
        session.take_status();

        let outcome = session.share(&mut chain).await.unwrap();
        assert_eq!(outcome.method, Some(ShareMethod::Manual));

        let statuses = kinds(&mut session);
        assert_eq!(statuses[0], StatusKind::ShareFallback { method: ShareMethod::Native });
        assert_eq!(statuses[1], StatusKind::ShareFallback { method: ShareMethod::Clipboard });
        match &statuses[2] {
            StatusKind::ManualCopy { text } => assert!(text.contains("bench, bicycle")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_qr_payload_is_challenge_json() {
        struct EchoQr;
        impl QrRenderer for EchoQr {
            fn render(&mut self, payload: &str) -> Result<Vec<u8>, ShareError> {
                Ok(payload.as_bytes().to_vec())
            }
        }

        let mut session = started().await;
        assert_eq!(session.render_qr(&mut EchoQr), Err(ShareError::NothingToShare));

        session.capture().await.unwrap();
        let bytes = session.render_qr(&mut EchoQr).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["items"][0], "bench");
    }
}
