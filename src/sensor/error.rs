//! Sensor errors.

use std::time::Duration;
use thiserror::Error;

/// Which sensor an error concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Camera stream.
    Camera,
    /// Geolocation.
    Location,
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorKind::Camera => write!(f, "camera"),
            SensorKind::Location => write!(f, "location"),
        }
    }
}

/// Sensor errors. None of these are fatal.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SensorError {
    /// The user (or platform) refused access.
    #[error("{0} permission denied")]
    PermissionDenied(SensorKind),

    /// The platform has no such capability.
    #[error("{0} not supported")]
    Unsupported(SensorKind),

    /// No position fix within the allowed wait.
    #[error("no position fix within {0:?}")]
    Timeout(Duration),

    /// Operation needs a resource that is not held.
    #[error("{0} not acquired")]
    NotAcquired(SensorKind),

    /// Any other device failure.
    #[error("{kind} failure: {message}")]
    Device {
        /// Sensor concerned.
        kind: SensorKind,
        /// Platform message.
        message: String,
    },
}

impl SensorError {
    /// Whether this is a permission refusal.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, SensorError::PermissionDenied(_))
    }
}
