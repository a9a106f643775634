//! Capture Accuracy Gate
//!
//! While taking the photo, capture is allowed only when the latest accuracy
//! radius is within the configured limit. A `None` limit turns gating off.

/// Enabled/disabled flag driven by reported accuracy.
#[derive(Clone, Debug, PartialEq)]
pub struct AccuracyGate {
    limit_m: Option<f64>,
    last_accuracy: Option<f64>,
    seen_reading: bool,
}

impl AccuracyGate {
    /// New gate with no readings yet.
    pub fn new(limit_m: Option<f64>) -> Self {
        Self {
            limit_m,
            last_accuracy: None,
            seen_reading: false,
        }
    }

    /// Configured limit in meters.
    pub fn limit(&self) -> Option<f64> {
        self.limit_m
    }

    /// Most recent accuracy seen.
    pub fn last_accuracy(&self) -> Option<f64> {
        self.last_accuracy
    }

    /// Whether any reading has been observed since the last reset.
    pub fn has_reading(&self) -> bool {
        self.seen_reading
    }

    /// Record a reading. Returns the new open state.
    pub fn observe(&mut self, accuracy: Option<f64>) -> bool {
        self.last_accuracy = accuracy;
        self.seen_reading = true;
        self.is_open()
    }

    /// Whether capture is allowed by accuracy.
    ///
    /// Before any reading the gate is closed; unknown accuracy keeps it closed.
    pub fn is_open(&self) -> bool {
        match self.limit_m {
            None => true,
            Some(limit) => self.last_accuracy.map_or(false, |acc| acc <= limit),
        }
    }

    /// Forget readings.
    pub fn reset(&mut self) {
        self.last_accuracy = None;
        self.seen_reading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_follows_latest_reading() {
        let mut gate = AccuracyGate::new(Some(7.0));
        assert!(!gate.is_open());

        assert!(gate.observe(Some(5.0)));
        assert!(!gate.observe(Some(12.5)));
        assert_eq!(gate.last_accuracy(), Some(12.5));

        // Providers don't improve monotonically; only the latest counts.
        assert!(gate.observe(Some(7.0)));
        assert!(gate.is_open());
    }

    #[test]
    fn test_unknown_accuracy_closes_gate() {
        let mut gate = AccuracyGate::new(Some(7.0));
        gate.observe(Some(3.0));
        assert!(!gate.observe(None));
    }

    #[test]
    fn test_no_limit_means_no_gating() {
        let mut gate = AccuracyGate::new(None);
        assert!(gate.is_open());
        assert!(gate.observe(Some(500.0)));
        assert!(gate.observe(None));
    }

    #[test]
    fn test_reset_forgets_readings() {
        let mut gate = AccuracyGate::new(Some(7.0));
        gate.observe(Some(2.0));
        gate.reset();
        assert!(!gate.has_reading());
        assert!(!gate.is_open());
    }
}
