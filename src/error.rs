//! Error taxonomy for the AR session core.
//!
//! Boundary failures (`NoPose`, `EngineUnavailable`) degrade at the
//! perception adapter and never corrupt a frame update. `NotFound` is a
//! programmer-error class: accessors `debug_assert!` before returning it,
//! so it aborts in debug builds and surfaces as a plain error in release
//! builds.

use thiserror::Error;

/// Result type for session operations.
pub type ArResult<T> = Result<T, ArError>;

/// Errors that can occur in the trackable/anchor registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArError {
    /// An accessor was given a stable id that is not (or no longer) registered.
    #[error("unknown stable id {0}")]
    NotFound(u32),

    /// The trackable exists but has no valid center pose this frame.
    #[error("trackable {0} has no valid pose this frame")]
    NoPose(u32),

    /// The perception session is not running.
    #[error("perception engine unavailable")]
    EngineUnavailable,

    /// The live-anchor cap was reached and eviction is disabled.
    #[error("anchor capacity of {cap} exceeded")]
    CapacityExceeded {
        /// The configured maximum number of live anchors.
        cap: usize,
    },
}
