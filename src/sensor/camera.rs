//! Camera capability.

use serde::{Deserialize, Serialize};

use crate::sensor::error::SensorError;
use crate::vision::frame::Frame;

/// Opaque identifier of an open camera stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(pub u64);

/// Which camera to prefer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Rear camera.
    Environment,
    /// Front camera.
    User,
}

/// Requested stream properties. Devices treat these as preferences.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConstraints {
    /// Preferred camera.
    pub facing: FacingMode,
    /// Ideal frame width.
    pub ideal_width: u32,
    /// Ideal frame height.
    pub ideal_height: u32,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            ideal_width: 640,
            ideal_height: 480,
        }
    }
}

/// Platform camera.
///
/// `open` is where the permission prompt happens, so it may suspend for a
/// long time or fail with [`SensorError::PermissionDenied`].
#[allow(async_fn_in_trait)]
pub trait CameraDevice {
    /// Open a stream.
    async fn open(&mut self, constraints: &CameraConstraints) -> Result<StreamId, SensorError>;

    /// Stop a stream. Unknown ids are ignored.
    fn close(&mut self, stream: StreamId);

    /// Copy the current frame out of an open stream.
    fn grab_frame(&mut self, stream: StreamId) -> Result<Frame, SensorError>;
}
