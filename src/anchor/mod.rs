//! Anchor lifecycle: creation, deferred deletion, capacity eviction.
//!
//! Deletion is two-phase on purpose: an anchor may still be mid-use by the
//! renderer in the frame its removal is requested, so `mark_for_deletion`
//! only flags it, and `flush_deletions` (run exactly once per frame, after
//! drawing) detaches and drops everything flagged. A marked anchor never
//! survives past the flush of the frame it was marked in.

use std::collections::HashMap;

use nalgebra::Vector3;
use tracing::debug;

use crate::error::{ArError, ArResult};
use crate::geometry::Pose;
use crate::hit::{HitCandidate, HitTester};
use crate::perception::{NativeAnchorId, PerceptionEngine, TrackingState};
use crate::registry::{AnchorId, PoseCache, TrackableId, TrackableRegistry};

/// One live anchor.
#[derive(Debug, Clone)]
pub struct AnchorRecord {
    /// Stable application-facing id.
    pub id: AnchorId,

    /// The engine-side anchor this record mirrors.
    pub native: NativeAnchorId,

    /// Last known world pose. Survives the engine forgetting the anchor.
    pub pose: Pose,

    /// Tracking state as of the last refresh.
    pub state: TrackingState,

    /// Flagged for removal at the next flush.
    pub pending_delete: bool,
}

/// Registry of user-created anchors.
pub struct AnchorRegistry {
    records: HashMap<AnchorId, AnchorRecord>,

    /// Creation order, oldest first. Drives FIFO eviction.
    order: Vec<AnchorId>,

    /// Pre-incremented id counter; the first anchor id is 1, 0 stays the
    /// reserved "no anchor" sentinel.
    last_id: u32,

    max_anchors: usize,
    evict_oldest: bool,
}

impl AnchorRegistry {
    /// Create a registry with the given capacity policy.
    pub fn new(max_anchors: usize, evict_oldest: bool) -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
            last_id: 0,
            max_anchors,
            evict_oldest,
        }
    }

    fn lookup(&self, id: AnchorId) -> ArResult<&AnchorRecord> {
        match self.records.get(&id) {
            Some(record) => Ok(record),
            None => {
                debug_assert!(false, "unknown anchor id {id}");
                Err(ArError::NotFound(id.0))
            }
        }
    }

    /// Make room for one more anchor, per the configured policy.
    fn reserve_slot(
        &mut self,
        engine: &mut dyn PerceptionEngine,
        poses: &mut PoseCache,
    ) -> ArResult<()> {
        if self.records.len() < self.max_anchors {
            return Ok(());
        }
        if !self.evict_oldest {
            return Err(ArError::CapacityExceeded {
                cap: self.max_anchors,
            });
        }

        // The evicted anchor was created in an earlier frame and is not
        // mid-use now, so it is detached immediately rather than deferred.
        if !self.order.is_empty() {
            let oldest = self.order.remove(0);
            if let Some(record) = self.records.remove(&oldest) {
                debug!(id = %oldest, "evicting oldest anchor at capacity");
                engine.detach_anchor(record.native);
                poses.remove_anchor(oldest);
            }
        }
        Ok(())
    }

    fn insert(
        &mut self,
        native: NativeAnchorId,
        pose: Pose,
        poses: &mut PoseCache,
    ) -> AnchorId {
        self.last_id += 1;
        let id = AnchorId::new(self.last_id);
        self.records.insert(
            id,
            AnchorRecord {
                id,
                native,
                pose,
                state: TrackingState::Tracking,
                pending_delete: false,
            },
        );
        self.order.push(id);
        poses.store_anchor(id, &pose);
        debug!(%id, %native, "anchor created");
        id
    }

    /// Create an anchor attached to a trackable, at `local_offset` from
    /// its center pose.
    ///
    /// Fails with `NotFound` when the trackable is not active and `NoPose`
    /// when it has no valid center pose this frame; nothing is created on
    /// failure.
    pub fn create_from_trackable(
        &mut self,
        registry: &TrackableRegistry,
        engine: &mut dyn PerceptionEngine,
        poses: &mut PoseCache,
        trackable: TrackableId,
        local_offset: Vector3<f32>,
    ) -> ArResult<AnchorId> {
        // A removed trackable is an expected failure here, not a
        // programmer error: the app may hold an id across the frame that
        // culled it.
        if registry.index_of(trackable).is_none() {
            return Err(ArError::NotFound(trackable.0));
        }
        let record = registry.record(trackable)?;
        let center = record.pose.ok_or(ArError::NoPose(trackable.0))?;

        let world_point = center.transform_point(&local_offset);
        let anchor_pose = Pose::from_translation(world_point);

        self.reserve_slot(engine, poses)?;
        let native = engine.create_anchor(anchor_pose, Some(record.handle))?;
        Ok(self.insert(native, anchor_pose, poses))
    }

    /// Create an anchor at the nearest contained hit under a screen point.
    ///
    /// `None` when no plane polygon or image rectangle contains the hit;
    /// no native anchor is requested in that case.
    pub fn create_from_hit(
        &mut self,
        registry: &TrackableRegistry,
        engine: &mut dyn PerceptionEngine,
        tester: &HitTester,
        poses: &mut PoseCache,
        x: f32,
        y: f32,
    ) -> ArResult<Option<AnchorId>> {
        let candidates = tester.hit_test(engine, registry, x, y);
        match candidates.first() {
            Some(candidate) => {
                let candidate = candidate.clone();
                Ok(Some(self.create_from_candidate(engine, poses, &candidate)?))
            }
            None => Ok(None),
        }
    }

    /// Create an anchor from an already-accepted hit candidate.
    pub fn create_from_candidate(
        &mut self,
        engine: &mut dyn PerceptionEngine,
        poses: &mut PoseCache,
        candidate: &HitCandidate,
    ) -> ArResult<AnchorId> {
        self.reserve_slot(engine, poses)?;
        let native = engine.create_anchor(candidate.hit_pose, Some(candidate.handle))?;
        Ok(self.insert(native, candidate.hit_pose, poses))
    }

    /// Flag an anchor for removal at the next flush. The anchor stays
    /// fully usable for the rest of the frame.
    pub fn mark_for_deletion(&mut self, id: AnchorId) -> ArResult<()> {
        self.lookup(id)?;
        if let Some(record) = self.records.get_mut(&id) {
            record.pending_delete = true;
        }
        Ok(())
    }

    /// Flag every anchor whose tracking has stopped, so the next flush
    /// reclaims it.
    pub fn mark_stopped_anchors(&mut self) -> usize {
        let mut flagged = 0;
        for record in self.records.values_mut() {
            if record.state == TrackingState::Stopped && !record.pending_delete {
                record.pending_delete = true;
                flagged += 1;
            }
        }
        flagged
    }

    /// Detach and remove every anchor flagged this frame.
    ///
    /// Called exactly once per frame, after rendering and before the next
    /// registry update. Running it again with nothing newly flagged has no
    /// observable effect.
    pub fn flush_deletions(&mut self, engine: &mut dyn PerceptionEngine, poses: &mut PoseCache) {
        let pending: Vec<AnchorId> = self
            .records
            .values()
            .filter(|r| r.pending_delete)
            .map(|r| r.id)
            .collect();

        for id in pending {
            if let Some(record) = self.records.remove(&id) {
                debug!(%id, native = %record.native, "anchor flushed");
                engine.detach_anchor(record.native);
            }
            self.order.retain(|&other| other != id);
            poses.remove_anchor(id);
        }
    }

    /// Refresh every anchor's pose/state from the engine.
    ///
    /// An anchor the engine no longer knows keeps its last pose and goes
    /// to `Stopped`; it is never silently dropped here.
    pub fn refresh(&mut self, engine: &dyn PerceptionEngine, poses: &mut PoseCache) {
        for record in self.records.values_mut() {
            match engine.anchor_state(record.native) {
                Some((pose, state)) => {
                    record.pose = pose;
                    record.state = state;
                    poses.store_anchor(record.id, &pose);
                }
                None => {
                    record.state = TrackingState::Stopped;
                }
            }
        }
    }

    /// Last known world pose of an anchor.
    pub fn pose_of(&self, id: AnchorId) -> ArResult<Pose> {
        Ok(self.lookup(id)?.pose)
    }

    /// Tracking state of an anchor.
    pub fn state_of(&self, id: AnchorId) -> ArResult<TrackingState> {
        Ok(self.lookup(id)?.state)
    }

    /// Whether an anchor is flagged for the next flush.
    pub fn is_pending_delete(&self, id: AnchorId) -> ArResult<bool> {
        Ok(self.lookup(id)?.pending_delete)
    }

    /// Number of live anchors (including ones flagged but not yet flushed).
    pub fn count(&self) -> usize {
        self.records.len()
    }
}

impl std::fmt::Debug for AnchorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorRegistry")
            .field("count", &self.records.len())
            .field("max_anchors", &self.max_anchors)
            .finish()
    }
}
