//! Stable-handle registry for frame-transient engine objects.

pub mod pose_cache;
pub mod trackable;
pub mod trackable_registry;
pub mod types;

pub use pose_cache::{MatrixTarget, PoseCache};
pub use trackable::TrackableRecord;
pub use trackable_registry::{FrameDiff, TrackableRegistry};
pub use types::{AnchorId, TrackableId};
