//! Geolocation capability and the watch subscription handle.

use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::core::geo::Position;
use crate::sensor::error::SensorError;

/// Opaque identifier of a platform position watch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchId(pub u64);

/// One delivery from a position watch: a fix or an error.
pub type PositionUpdate = Result<Position, SensorError>;

/// Options passed to the platform for reads and watches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchOptions {
    /// Ask for GPS-grade fixes.
    pub high_accuracy: bool,
    /// Platform-side timeout per fix.
    pub timeout: Duration,
    /// Oldest cached fix the platform may return.
    pub maximum_age: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::from_secs(1),
        }
    }
}

/// Platform geolocation.
#[allow(async_fn_in_trait)]
pub trait PositionSource {
    /// Single fix. May suspend until the platform answers.
    async fn current_position(&mut self, options: &WatchOptions) -> Result<Position, SensorError>;

    /// Register a watch. Updates arrive on the returned channel in delivery
    /// order until [`clear_watch`](Self::clear_watch) is called.
    fn watch(
        &mut self,
        options: &WatchOptions,
    ) -> Result<(WatchId, mpsc::UnboundedReceiver<PositionUpdate>), SensorError>;

    /// Stop a watch. Unknown ids are ignored.
    fn clear_watch(&mut self, id: WatchId);
}

/// A live position watch.
///
/// Cancelling consumes the handle, so a watch cannot be cleared twice.
#[derive(Debug)]
pub struct LocationWatch {
    id: WatchId,
    updates: mpsc::UnboundedReceiver<PositionUpdate>,
}

impl LocationWatch {
    /// Register a watch on `source`.
    pub fn start<L: PositionSource>(source: &mut L, options: &WatchOptions) -> Result<Self, SensorError> {
        let (id, updates) = source.watch(options)?;
        Ok(Self { id, updates })
    }

    /// Platform watch id.
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// Wait for the next update. `None` once the platform side is gone.
    pub async fn next(&mut self) -> Option<PositionUpdate> {
        self.updates.recv().await
    }

    /// Take an already delivered update without waiting.
    pub fn try_next(&mut self) -> Option<PositionUpdate> {
        self.updates.try_recv().ok()
    }

    /// Stop the watch on the platform and drop pending updates.
    pub fn cancel<L: PositionSource>(mut self, source: &mut L) {
        self.updates.close();
        source.clear_watch(self.id);
    }
}
