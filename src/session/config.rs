//! Session configuration.

use serde::{Deserialize, Serialize};

/// Default cap on live anchors.
const DEFAULT_MAX_ANCHORS: usize = 64;

/// Tunable policy for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of live anchors.
    pub max_anchors: usize,

    /// When the cap is hit: evict the oldest anchor (true) or fail anchor
    /// creation with `CapacityExceeded` (false).
    pub evict_oldest: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_anchors: DEFAULT_MAX_ANCHORS,
            evict_oldest: true,
        }
    }
}
