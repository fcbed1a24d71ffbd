//! The AR session: frame-cadence orchestration of all components.
//!
//! Per frame: `update()` pulls an engine snapshot, diffs it into the
//! registry, refreshes the pose cache and anchors, then fans out removal
//! and creation events to subscribed trackers. After rendering, the host
//! calls `end_frame()`, which flushes deferred anchor deletions and closes
//! the "new this frame" window, the last thing before the next update.

use std::sync::Arc;

use nalgebra::Vector3;
use tracing::info;

use crate::anchor::AnchorRegistry;
use crate::error::ArResult;
use crate::geometry::Pose;
use crate::hit::{HitCandidate, HitTester};
use crate::perception::{FrameAdapter, PerceptionEngine, TrackingState};
use crate::registry::{AnchorId, FrameDiff, MatrixTarget, TrackableId};
use crate::session::config::SessionConfig;
use crate::session::shared::SharedState;
use crate::tracker::{TrackableView, TrackerScope, TrackerSubscription};

/// Owner of the engine, the shared registry state and the anchor registry.
pub struct ArSession {
    engine: Box<dyn PerceptionEngine>,
    adapter: FrameAdapter,
    tester: HitTester,
    shared: Arc<SharedState>,
    anchors: AnchorRegistry,
}

impl ArSession {
    /// Create a session over an engine.
    pub fn new(engine: Box<dyn PerceptionEngine>, config: SessionConfig) -> Self {
        info!(max_anchors = config.max_anchors, evict_oldest = config.evict_oldest, "AR session created");
        Self {
            engine,
            adapter: FrameAdapter::new(),
            tester: HitTester::new(),
            shared: SharedState::new(),
            anchors: AnchorRegistry::new(config.max_anchors, config.evict_oldest),
        }
    }

    /// The shared state subscriptions and views hang on to.
    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Create a tracker subscribed to nothing yet; call
    /// [`TrackerSubscription::start`] to begin receiving events.
    pub fn new_tracker(&self, scope: TrackerScope) -> Arc<TrackerSubscription> {
        TrackerSubscription::new(self.shared.clone(), scope)
    }

    /// Ingest one engine frame.
    ///
    /// Fails with `EngineUnavailable` (registry untouched) when the
    /// perception session is not running. Otherwise the registry diff is
    /// applied atomically before any event leaves this call: removal
    /// notifications go out first, then one creation notification per new
    /// stable id, in detection order.
    pub fn update(&mut self) -> ArResult<FrameDiff> {
        let raw = self.engine.frame()?;
        let snapshots = self.adapter.normalize(raw);

        let diff = {
            let mut registry = self.shared.registry.write();
            let mut poses = self.shared.poses.write();

            let diff = registry.update(&snapshots);

            for &id in &diff.removed {
                poses.remove_trackable(id);
            }
            for id in registry.active_ids().collect::<Vec<_>>() {
                if let Ok(record) = registry.record(id) {
                    if let Some(pose) = record.pose {
                        poses.store_trackable(id, &pose);
                    }
                }
            }

            self.anchors.refresh(&*self.engine, &mut poses);
            diff
        };

        // Locks are released: trackers and user observers may freely read
        // the registry while events fan out.
        let trackers = self.shared.trackers_snapshot();
        for &id in &diff.removed {
            for tracker in &trackers {
                tracker.handle_removed(id);
            }
        }
        for &id in &diff.created {
            for tracker in &trackers {
                tracker.notify_created(id);
            }
        }

        Ok(diff)
    }

    /// Close the frame: flush deferred anchor deletions and end the
    /// one-frame "new" window. Call after rendering, before the next
    /// `update`.
    pub fn end_frame(&mut self) {
        {
            let mut poses = self.shared.poses.write();
            self.anchors.flush_deletions(&mut *self.engine, &mut poses);
        }
        self.shared.registry.write().clear_new_marks();
    }

    // ── Hit testing ─────────────────────────────────────────────────────

    /// Accepted hit candidates under a screen point, nearest-first.
    pub fn hit_test(&mut self, x: f32, y: f32) -> Vec<HitCandidate> {
        let registry = self.shared.registry.read();
        self.tester.hit_test(&mut *self.engine, &registry, x, y)
    }

    /// Resolve an accepted candidate to its stable id.
    pub fn resolve_hit(&self, candidate: &HitCandidate) -> Option<TrackableId> {
        let registry = self.shared.registry.read();
        self.tester.resolve_to_trackable(&registry, candidate)
    }

    // ── Anchors ─────────────────────────────────────────────────────────

    /// Create an anchor attached to a trackable at a local offset from its
    /// center pose.
    pub fn create_anchor(
        &mut self,
        trackable: TrackableId,
        local_offset: Vector3<f32>,
    ) -> ArResult<AnchorId> {
        let registry = self.shared.registry.read();
        let mut poses = self.shared.poses.write();
        self.anchors.create_from_trackable(
            &registry,
            &mut *self.engine,
            &mut poses,
            trackable,
            local_offset,
        )
    }

    /// Create an anchor at the nearest contained hit under a screen point.
    /// `None` (and no engine call) when nothing contains the hit.
    pub fn create_anchor_at(&mut self, x: f32, y: f32) -> ArResult<Option<AnchorId>> {
        let registry = self.shared.registry.read();
        let mut poses = self.shared.poses.write();
        self.anchors.create_from_hit(
            &registry,
            &mut *self.engine,
            &self.tester,
            &mut poses,
            x,
            y,
        )
    }

    /// Create an anchor from the hit recorded on a view by
    /// [`TrackerSubscription::get_at`]. The recorded hit is consumed;
    /// `None` when the view holds no hit.
    pub fn create_anchor_from_view(&mut self, view: &TrackableView) -> ArResult<Option<AnchorId>> {
        match view.take_hit() {
            Some(candidate) => {
                let mut poses = self.shared.poses.write();
                self.anchors
                    .create_from_candidate(&mut *self.engine, &mut poses, &candidate)
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    /// Flag an anchor for deletion at the next `end_frame`.
    pub fn delete_anchor(&mut self, id: AnchorId) -> ArResult<()> {
        self.anchors.mark_for_deletion(id)
    }

    /// Flag every stopped anchor for deletion. Returns how many were
    /// flagged.
    pub fn sweep_stopped_anchors(&mut self) -> usize {
        self.anchors.mark_stopped_anchors()
    }

    /// Last known world pose of an anchor.
    pub fn anchor_pose(&self, id: AnchorId) -> ArResult<Pose> {
        self.anchors.pose_of(id)
    }

    /// Tracking state of an anchor.
    pub fn anchor_state(&self, id: AnchorId) -> ArResult<TrackingState> {
        self.anchors.state_of(id)
    }

    /// Number of live anchors.
    pub fn anchor_count(&self) -> usize {
        self.anchors.count()
    }

    // ── Renderer queries ────────────────────────────────────────────────

    /// Write a trackable's current matrix into a caller-supplied target.
    pub fn trackable_matrix_into<T: MatrixTarget>(
        &self,
        id: TrackableId,
        target: &mut T,
    ) -> ArResult<()> {
        self.shared.poses.read().trackable_into(id, target)
    }

    /// Write an anchor's current matrix into a caller-supplied target.
    pub fn anchor_matrix_into<T: MatrixTarget>(
        &self,
        id: AnchorId,
        target: &mut T,
    ) -> ArResult<()> {
        self.shared.poses.read().anchor_into(id, target)
    }

    // ── Engine passthrough ──────────────────────────────────────────────

    /// Add an image to the engine's recognition database.
    pub fn register_image(&mut self, name: &str, physical_width: f32) {
        self.engine.register_image(name, physical_width);
    }

    /// Direct engine access, for hosts that own engine-specific setup.
    pub fn engine_mut(&mut self) -> &mut dyn PerceptionEngine {
        &mut *self.engine
    }
}

impl std::fmt::Debug for ArSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArSession")
            .field("trackables", &self.shared.registry.read().count())
            .field("anchors", &self.anchors.count())
            .finish()
    }
}
