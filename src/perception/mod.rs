//! Perception-engine boundary.
//!
//! Everything the session core knows about the underlying engine comes
//! through [`PerceptionEngine`]. Raw per-frame records cross the boundary
//! once, get normalized by [`FrameAdapter`], and the rest of the crate only
//! ever sees [`TrackableSnapshot`]s.

pub mod adapter;
pub mod engine;
pub mod scripted;
pub mod snapshot;

pub use adapter::FrameAdapter;
pub use engine::{EngineHandle, NativeAnchorId, PerceptionEngine, RawHit, RawPose, RawTrackable};
pub use scripted::ScriptedEngine;
pub use snapshot::{
    PlaneOrientation, TrackableGeometry, TrackableKind, TrackableSnapshot, TrackingState,
};
