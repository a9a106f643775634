//! Sensor Layer
//!
//! Camera and geolocation capabilities plus the manager that owns their
//! lifecycles. Both resources are exclusive: at most one camera stream and one
//! location watch are ever live.
//!
//! ## Module Structure
//!
//! - `camera`: Camera capability trait and stream constraints
//! - `location`: Position capability trait and the cancellable watch handle
//! - `gate`: Capture accuracy gating policy
//! - `manager`: Resource ownership, idempotent acquire/release
//! - `error`: Sensor errors

pub mod camera;
pub mod error;
pub mod gate;
pub mod location;
pub mod manager;

pub use camera::{CameraConstraints, CameraDevice, FacingMode, StreamId};
pub use error::{SensorError, SensorKind};
pub use gate::AccuracyGate;
pub use location::{LocationWatch, PositionSource, PositionUpdate, WatchId, WatchOptions};
pub use manager::SensorManager;
