//! Lightweight application-facing view over one trackable.
//!
//! A view wraps `(shared state, stable id)` and answers every query from
//! the registry's current frame, so a cached view is never stale. At
//! worst its trackable is gone, which the state predicates report rather
//! than error on.

use std::sync::Arc;

use nalgebra::Matrix4;
use parking_lot::Mutex;

use crate::error::ArResult;
use crate::hit::HitCandidate;
use crate::perception::{PlaneOrientation, TrackableKind, TrackingState};
use crate::registry::{MatrixTarget, TrackableId};
use crate::session::{ArSession, SharedState};

/// Stable view over one trackable.
pub struct TrackableView {
    shared: Arc<SharedState>,
    id: TrackableId,

    /// The hit that produced this view, when it came from a screen-point
    /// lookup. Consumed by anchor-from-hit creation.
    hit: Mutex<Option<HitCandidate>>,
}

impl TrackableView {
    pub(crate) fn new(shared: Arc<SharedState>, id: TrackableId) -> Arc<Self> {
        Arc::new(Self {
            shared,
            id,
            hit: Mutex::new(None),
        })
    }

    /// The stable id this view wraps.
    pub fn id(&self) -> TrackableId {
        self.id
    }

    // ── Data accessors (error on a removed trackable) ───────────────────

    /// Current 4×4 matrix.
    pub fn matrix(&self) -> ArResult<Matrix4<f32>> {
        self.shared.poses.read().trackable_matrix(self.id)
    }

    /// Write the current matrix into a caller-supplied target.
    pub fn matrix_into<T: MatrixTarget>(&self, target: &mut T) -> ArResult<()> {
        self.shared.poses.read().trackable_into(self.id, target)
    }

    /// Boundary polygon vertices, `[x, z]` in the local frame.
    pub fn polygon(&self) -> ArResult<Vec<[f32; 2]>> {
        let registry = self.shared.registry.read();
        Ok(registry.record(self.id)?.polygon().to_vec())
    }

    /// Extent along local X.
    pub fn extent_x(&self) -> ArResult<f32> {
        let registry = self.shared.registry.read();
        Ok(registry.record(self.id)?.extent_x())
    }

    /// Extent along local Z.
    pub fn extent_z(&self) -> ArResult<f32> {
        let registry = self.shared.registry.read();
        Ok(registry.record(self.id)?.extent_z())
    }

    /// Database name, for image trackables.
    pub fn name(&self) -> ArResult<Option<String>> {
        let registry = self.shared.registry.read();
        Ok(registry.record(self.id)?.name().map(str::to_owned))
    }

    // ── State predicates (a removed trackable is just "stopped") ────────

    fn state(&self) -> Option<TrackingState> {
        self.shared
            .registry
            .read()
            .get(self.id)
            .map(|record| record.state)
    }

    fn kind(&self) -> Option<TrackableKind> {
        self.shared
            .registry
            .read()
            .get(self.id)
            .map(|record| record.kind)
    }

    /// True only during the frame this trackable was created.
    pub fn is_new(&self) -> bool {
        self.shared
            .registry
            .read()
            .get(self.id)
            .map(|record| record.is_new)
            .unwrap_or(false)
    }

    /// Actively tracked this frame.
    pub fn is_tracking(&self) -> bool {
        self.state() == Some(TrackingState::Tracking)
    }

    /// Temporarily not tracked.
    pub fn is_paused(&self) -> bool {
        self.state() == Some(TrackingState::Paused)
    }

    /// Tracking has ended: either the engine reported `Stopped` or the
    /// registry has already dropped the entry.
    pub fn is_stopped(&self) -> bool {
        match self.state() {
            Some(state) => state == TrackingState::Stopped,
            None => true,
        }
    }

    /// Any plane orientation.
    pub fn is_plane(&self) -> bool {
        matches!(self.kind(), Some(kind) if kind.is_plane())
    }

    /// Horizontal upward-facing plane.
    pub fn is_floor_plane(&self) -> bool {
        self.kind() == Some(TrackableKind::Plane(PlaneOrientation::Floor))
    }

    /// Horizontal downward-facing plane.
    pub fn is_ceiling_plane(&self) -> bool {
        self.kind() == Some(TrackableKind::Plane(PlaneOrientation::Ceiling))
    }

    /// Vertical plane.
    pub fn is_wall_plane(&self) -> bool {
        self.kind() == Some(TrackableKind::Plane(PlaneOrientation::Wall))
    }

    /// Recognized image.
    pub fn is_image(&self) -> bool {
        self.kind() == Some(TrackableKind::Image)
    }

    /// Feature point.
    pub fn is_point(&self) -> bool {
        self.kind() == Some(TrackableKind::Point)
    }

    /// Whether a hit test at the screen point resolves to this trackable.
    pub fn is_selected(&self, session: &mut ArSession, x: f32, y: f32) -> bool {
        let candidates = session.hit_test(x, y);
        candidates
            .iter()
            .any(|candidate| session.resolve_hit(candidate) == Some(self.id))
    }

    // ── Originating hit ─────────────────────────────────────────────────

    pub(crate) fn record_hit(&self, candidate: HitCandidate) {
        *self.hit.lock() = Some(candidate);
    }

    /// Take the recorded originating hit, leaving none behind.
    pub(crate) fn take_hit(&self) -> Option<HitCandidate> {
        self.hit.lock().take()
    }

    /// Whether this view currently carries an originating hit.
    pub fn has_hit(&self) -> bool {
        self.hit.lock().is_some()
    }
}

impl std::fmt::Debug for TrackableView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackableView").field("id", &self.id).finish()
    }
}
