use tracing::debug;

use super::{ForegroundSnapshot, WindowProbe};

/// Window tracking on macOS is not implemented. The probe compiles and runs, but every sample it
/// produces is unset, so nothing is ever recorded.
pub struct DarwinWindowProbe;

impl DarwinWindowProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DarwinWindowProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowProbe for DarwinWindowProbe {
    fn current(&mut self) -> ForegroundSnapshot {
        debug!("macOS window lookup is not implemented");
        ForegroundSnapshot::unset()
    }
}
