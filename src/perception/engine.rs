//! The engine seam: raw record types and the [`PerceptionEngine`] trait.
//!
//! The engine owns its objects; this core never inspects their memory. A
//! trackable is identified across frames solely by its [`EngineHandle`],
//! an identity token the engine guarantees unique for the lifetime of the
//! underlying object. Handles are compared and hashed by token only.

use crate::error::ArResult;
use crate::geometry::{MatrixLayout, Pose};
use crate::perception::snapshot::{TrackableKind, TrackingState};

/// Opaque identity token for an engine-owned trackable.
///
/// The token value carries no meaning; two handles are the same object iff
/// the tokens are equal. Never derived from object contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineHandle(u64);

impl EngineHandle {
    /// Wrap an engine-issued token.
    pub fn from_raw(token: u64) -> Self {
        Self(token)
    }

    /// The raw token value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EH{}", self.0)
    }
}

/// Identity of a native anchor materialized inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeAnchorId(pub u64);

impl std::fmt::Display for NativeAnchorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NA{}", self.0)
    }
}

/// A 4×4 pose matrix as the engine hands it over, layout and all.
#[derive(Debug, Clone, Copy)]
pub struct RawPose {
    /// Flat matrix buffer.
    pub matrix: [f32; 16],
    /// Which layout the buffer uses.
    pub layout: MatrixLayout,
}

impl RawPose {
    /// A raw pose in the internal column-major convention.
    pub fn column_major(matrix: [f32; 16]) -> Self {
        Self {
            matrix,
            layout: MatrixLayout::ColumnMajor,
        }
    }

    /// Convert to the internal pose type, rejecting malformed buffers.
    pub fn to_pose(&self) -> Option<Pose> {
        Pose::from_matrix_slice(&self.matrix, self.layout)
    }
}

impl From<Pose> for RawPose {
    fn from(pose: Pose) -> Self {
        Self::column_major(pose.to_column_major())
    }
}

/// One trackable as reported by the engine, before normalization.
#[derive(Debug, Clone)]
pub struct RawTrackable {
    /// Engine identity.
    pub handle: EngineHandle,

    /// Kind of trackable.
    pub kind: TrackableKind,

    /// Tracking state this frame.
    pub state: TrackingState,

    /// Center pose, if the engine has one this frame.
    pub pose: Option<RawPose>,

    /// Extent along local X.
    pub extent_x: f32,

    /// Extent along local Z.
    pub extent_z: f32,

    /// Flat `[x0, z0, x1, z1, ..]` polygon buffer in the local frame.
    /// Planes only; empty for images and points.
    pub polygon_xz: Vec<f32>,

    /// Database name, for recognized images.
    pub image_name: Option<String>,

    /// The plane this one was merged into, if any.
    pub subsumed_by: Option<EngineHandle>,
}

/// One candidate from an engine ray cast, nearest-first in the returned list.
#[derive(Debug, Clone)]
pub struct RawHit {
    /// The trackable the ray intersected.
    pub handle: EngineHandle,

    /// Pose of the intersection point.
    pub pose: RawPose,

    /// Distance from the camera along the ray.
    pub distance: f32,
}

/// The perception engine collaborator.
///
/// The engine's internal capture/tracking threading is opaque; by the time
/// a call returns, the data is consistent for this frame. All methods are
/// synchronous.
pub trait PerceptionEngine {
    /// The complete set of currently live trackables.
    ///
    /// Fails with [`ArError::EngineUnavailable`](crate::error::ArError)
    /// when the session is not running.
    fn frame(&mut self) -> ArResult<Vec<RawTrackable>>;

    /// Ray-cast a screen point. Candidates are ordered nearest-first.
    fn hit_test(&mut self, x: f32, y: f32) -> Vec<RawHit>;

    /// Materialize a native anchor at a world pose, optionally attached to
    /// a trackable so the engine refines it with that object.
    fn create_anchor(
        &mut self,
        pose: Pose,
        attach_to: Option<EngineHandle>,
    ) -> ArResult<NativeAnchorId>;

    /// Release a native anchor. Detaching an unknown or already-detached
    /// anchor is a no-op.
    fn detach_anchor(&mut self, id: NativeAnchorId);

    /// Current pose and state of a native anchor, if the engine still
    /// knows it.
    fn anchor_state(&self, id: NativeAnchorId) -> Option<(Pose, TrackingState)>;

    /// Add an image to the recognition database.
    ///
    /// `physical_width` is the printed width in meters, used by engines to
    /// estimate distance.
    fn register_image(&mut self, name: &str, physical_width: f32);
}
