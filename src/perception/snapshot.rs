//! Normalized per-frame trackable records.
//!
//! A [`TrackableSnapshot`] is one engine-reported object after boundary
//! normalization: typed kind and state, a pose in the internal convention
//! (or none, when the engine could not provide a valid one this frame),
//! and paired-up geometry.

use crate::geometry::Pose;
use crate::perception::engine::EngineHandle;

/// Orientation classes of a detected plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneOrientation {
    /// Horizontal, facing up.
    Floor,
    /// Horizontal, facing down.
    Ceiling,
    /// Vertical.
    Wall,
}

/// What kind of real-world object a trackable is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackableKind {
    /// A detected surface.
    Plane(PlaneOrientation),
    /// A recognized image from the registered database.
    Image,
    /// A feature point.
    Point,
}

impl TrackableKind {
    /// Whether this kind is any plane orientation.
    pub fn is_plane(&self) -> bool {
        matches!(self, TrackableKind::Plane(_))
    }
}

/// Per-frame tracking state of a trackable or anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    /// Actively tracked with a current pose.
    #[default]
    Tracking,
    /// Temporarily not tracked; the last pose may be stale.
    Paused,
    /// Tracking has ended permanently.
    Stopped,
}

/// Spatial extent data of a trackable, in its local frame.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackableGeometry {
    /// A plane with its X/Z extents and tessellated boundary polygon.
    ///
    /// Polygon vertices are `[x, z]` pairs in the plane's local frame,
    /// counter-clockwise, possibly empty while the engine is still
    /// estimating the boundary.
    Plane {
        /// Extent along the local X axis.
        extent_x: f32,
        /// Extent along the local Z axis.
        extent_z: f32,
        /// Boundary polygon vertices.
        polygon: Vec<[f32; 2]>,
    },
    /// A recognized image: always a planar rectangle.
    Image {
        /// Name the image was registered under.
        name: String,
        /// Physical width (local X).
        extent_x: f32,
        /// Physical height (local Z).
        extent_z: f32,
    },
    /// A feature point has no extent.
    Point,
}

/// One normalized engine record for the current frame.
#[derive(Debug, Clone)]
pub struct TrackableSnapshot {
    /// Opaque engine identity for this object.
    pub handle: EngineHandle,

    /// Kind of trackable.
    pub kind: TrackableKind,

    /// Tracking state this frame.
    pub state: TrackingState,

    /// Center pose in world frame. `None` when the engine reported no
    /// valid pose this frame; the registry then keeps the last known one.
    pub pose: Option<Pose>,

    /// Extents/polygon in the trackable's local frame.
    pub geometry: TrackableGeometry,

    /// True when this plane has been merged into another plane.
    pub subsumed: bool,
}
