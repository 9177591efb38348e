use chrono::Duration;
use hermes_core::Timestamp;
use hermes_ports::Clock;
use std::sync::{Arc, RwLock};

/// Manually advanced time source for deterministic tests
///
/// Cloning shares the underlying time, so a clock handed to the router
/// and a handle kept by the test advance together.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<Timestamp>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    /// Create a clock frozen at the current wall time
    pub fn starting_now() -> Self {
        Self::new(chrono::Utc::now())
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().expect("clock lock poisoned");
        *now += by;
    }

    /// Jump to an absolute time
    pub fn set(&self, to: Timestamp) {
        let mut now = self.now.write().expect("clock lock poisoned");
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.read().expect("clock lock poisoned")
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}
