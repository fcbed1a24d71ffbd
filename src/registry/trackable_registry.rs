//! The trackable registry: stable-ID allocation and per-frame diffing.
//!
//! The engine's object identity is unstable from a consumer's point of
//! view: objects merge, appear and disappear every frame, and their order
//! in a snapshot is not a contract. The registry bridges that to a stable
//! handle space. Only `update` mutates it, at most once per frame; every
//! query is answered from the state the last `update` left behind, so the
//! active list is atomic from any consumer's viewpoint.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ArError, ArResult};
use crate::geometry::Pose;
use crate::perception::{EngineHandle, TrackableKind, TrackableSnapshot, TrackingState};
use crate::registry::trackable::TrackableRecord;
use crate::registry::types::TrackableId;

/// What one `update` changed, in detection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameDiff {
    /// Stable ids allocated this frame.
    pub created: Vec<TrackableId>,

    /// Stable ids dropped this frame (stopped, subsumed, or vanished).
    pub removed: Vec<TrackableId>,
}

/// Stable-ID registry over the engine's per-frame snapshots.
pub struct TrackableRegistry {
    /// All live records, by stable id.
    records: HashMap<TrackableId, TrackableRecord>,

    /// Active list; insertion order = detection order. Indices into this
    /// list are only valid between two consecutive updates.
    active: Vec<TrackableId>,

    /// stable id -> current active-list index. Rebuilt every update.
    index: HashMap<TrackableId, usize>,

    /// Engine identity -> stable id, for diffing.
    by_handle: HashMap<EngineHandle, TrackableId>,

    /// Counter for stable id allocation. Pre-incremented: the first id
    /// handed out is 1, and 0 stays reserved.
    last_id: u32,
}

impl TrackableRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            active: Vec::new(),
            index: HashMap::new(),
            by_handle: HashMap::new(),
            last_id: 0,
        }
    }

    fn alloc_id(&mut self) -> TrackableId {
        self.last_id += 1;
        TrackableId::new(self.last_id)
    }

    /// Diff one frame's snapshots against the active set.
    ///
    /// New handles get a stable id and are appended in detection order;
    /// handles that stopped, vanished, or were subsumed are dropped; the
    /// survivors are refreshed and the index map is rebuilt last, after
    /// all removals, preserving detection order.
    ///
    /// Planes arriving already subsumed are never registered at all.
    pub fn update(&mut self, snapshots: &[TrackableSnapshot]) -> FrameDiff {
        let mut diff = FrameDiff::default();

        // Refresh survivors, register unseen handles.
        for snap in snapshots {
            if snap.subsumed && snap.kind.is_plane() {
                continue;
            }
            match self.by_handle.get(&snap.handle).copied() {
                Some(id) => {
                    if let Some(record) = self.records.get_mut(&id) {
                        record.refresh(snap);
                    }
                }
                None => {
                    let id = self.alloc_id();
                    debug!(%id, handle = %snap.handle, kind = ?snap.kind, "trackable created");
                    self.records.insert(id, TrackableRecord::new(id, snap));
                    self.by_handle.insert(snap.handle, id);
                    self.active.push(id);
                    diff.created.push(id);
                }
            }
        }

        // Drop stopped, vanished and subsumed entries, walking the active
        // list in order so removals come out in detection order too.
        let mut present: HashMap<EngineHandle, &TrackableSnapshot> = HashMap::new();
        for snap in snapshots {
            present.insert(snap.handle, snap);
        }

        let mut surviving = Vec::with_capacity(self.active.len());
        for &id in &self.active {
            let record = match self.records.get(&id) {
                Some(r) => r,
                None => continue,
            };
            let gone = match present.get(&record.handle) {
                None => true,
                Some(snap) => {
                    snap.state == TrackingState::Stopped
                        || (snap.subsumed && snap.kind.is_plane())
                }
            };
            if gone {
                debug!(%id, handle = %record.handle, "trackable removed");
                self.by_handle.remove(&record.handle);
                self.records.remove(&id);
                diff.removed.push(id);
            } else {
                surviving.push(id);
            }
        }
        self.active = surviving;

        // Rebuild the index map, preserving detection order.
        self.index.clear();
        for (i, &id) in self.active.iter().enumerate() {
            self.index.insert(id, i);
        }

        diff
    }

    /// End the "new" window: called once per frame after user code has
    /// observed it, so `is_new` holds for exactly the creation frame.
    pub fn clear_new_marks(&mut self) {
        for record in self.records.values_mut() {
            record.is_new = false;
        }
    }

    fn lookup(&self, id: TrackableId) -> ArResult<&TrackableRecord> {
        match self.records.get(&id) {
            Some(record) => Ok(record),
            None => {
                debug_assert!(false, "unknown stable id {id}");
                Err(ArError::NotFound(id.0))
            }
        }
    }

    // ── Query surface ────────────────────────────────────────────────────

    /// Number of active trackables.
    pub fn count(&self) -> usize {
        self.active.len()
    }

    /// Stable id at an active-list index, if in range.
    pub fn id_at(&self, index: usize) -> Option<TrackableId> {
        self.active.get(index).copied()
    }

    /// Current active-list index of a stable id. `None` exactly when the
    /// object is not currently active.
    pub fn index_of(&self, id: TrackableId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Kind of a trackable.
    pub fn kind_of(&self, id: TrackableId) -> ArResult<TrackableKind> {
        Ok(self.lookup(id)?.kind)
    }

    /// Tracking state of a trackable.
    pub fn state_of(&self, id: TrackableId) -> ArResult<TrackingState> {
        Ok(self.lookup(id)?.state)
    }

    /// Last known center pose of a trackable.
    ///
    /// Fails with `NoPose` when the engine has not yet reported a valid
    /// pose for it.
    pub fn pose_of(&self, id: TrackableId) -> ArResult<Pose> {
        self.lookup(id)?.pose.ok_or(ArError::NoPose(id.0))
    }

    /// True only during the frame the trackable was created.
    pub fn is_new(&self, id: TrackableId) -> ArResult<bool> {
        Ok(self.lookup(id)?.is_new)
    }

    /// Extents/polygon of a trackable.
    pub fn geometry_of(&self, id: TrackableId) -> ArResult<&crate::perception::TrackableGeometry> {
        Ok(&self.lookup(id)?.geometry)
    }

    /// Engine identity backing a stable id.
    pub fn handle_of(&self, id: TrackableId) -> ArResult<EngineHandle> {
        Ok(self.lookup(id)?.handle)
    }

    /// Stable id for an engine handle, if that handle is registered.
    pub fn id_for_handle(&self, handle: EngineHandle) -> Option<TrackableId> {
        self.by_handle.get(&handle).copied()
    }

    /// Full record access (geometry, extents, name).
    pub fn record(&self, id: TrackableId) -> ArResult<&TrackableRecord> {
        self.lookup(id)
    }

    /// Non-asserting record access, for callers probing whether an id is
    /// still alive (a removed id is an expected answer, not a bug).
    pub fn get(&self, id: TrackableId) -> Option<&TrackableRecord> {
        self.records.get(&id)
    }

    /// Iterate the active list in detection order.
    pub fn active_ids(&self) -> impl Iterator<Item = TrackableId> + '_ {
        self.active.iter().copied()
    }
}

impl Default for TrackableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TrackableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackableRegistry")
            .field("active", &self.active.len())
            .field("last_id", &self.last_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::{PlaneOrientation, TrackableGeometry};

    fn square_polygon() -> Vec<[f32; 2]> {
        vec![[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]]
    }

    fn plane_snapshot(token: u64) -> TrackableSnapshot {
        TrackableSnapshot {
            handle: EngineHandle::from_raw(token),
            kind: TrackableKind::Plane(PlaneOrientation::Floor),
            state: TrackingState::Tracking,
            pose: Some(Pose::identity()),
            geometry: TrackableGeometry::Plane {
                extent_x: 2.0,
                extent_z: 2.0,
                polygon: square_polygon(),
            },
            subsumed: false,
        }
    }

    #[test]
    fn test_first_plane_created() {
        let mut reg = TrackableRegistry::new();
        let diff = reg.update(&[plane_snapshot(100)]);

        assert_eq!(diff.created.len(), 1);
        assert!(diff.removed.is_empty());
        let id = diff.created[0];
        assert_eq!(id, TrackableId::new(1));
        assert_eq!(reg.count(), 1);
        assert_eq!(reg.id_at(0), Some(id));
        assert_eq!(reg.index_of(id), Some(0));
        assert!(reg.is_new(id).unwrap());
    }

    #[test]
    fn test_subsumed_plane_replaced() {
        let mut reg = TrackableRegistry::new();
        let diff = reg.update(&[plane_snapshot(100)]);
        let id1 = diff.created[0];

        // Next frame: the old plane is merged into a new, larger one. It
        // still reports Tracking, but subsumption alone removes it.
        let mut old = plane_snapshot(100);
        old.subsumed = true;
        let new = plane_snapshot(200);
        let diff = reg.update(&[old, new]);

        assert_eq!(diff.removed, vec![id1]);
        assert_eq!(diff.created, vec![TrackableId::new(2)]);
        assert_eq!(reg.count(), 1);
        assert_eq!(reg.index_of(id1), None);
        assert_eq!(reg.id_at(0), Some(TrackableId::new(2)));
    }

    #[test]
    fn test_stopped_plane_removed() {
        let mut reg = TrackableRegistry::new();
        let id = reg.update(&[plane_snapshot(100)]).created[0];

        let mut stopped = plane_snapshot(100);
        stopped.state = TrackingState::Stopped;
        let diff = reg.update(&[stopped]);

        assert_eq!(diff.removed, vec![id]);
        assert_eq!(reg.count(), 0);
        assert_eq!(reg.index_of(id), None);
    }

    #[test]
    fn test_vanished_handle_removed() {
        let mut reg = TrackableRegistry::new();
        let diff = reg.update(&[plane_snapshot(100), plane_snapshot(200)]);
        let (id1, id2) = (diff.created[0], diff.created[1]);

        let diff = reg.update(&[plane_snapshot(200)]);
        assert_eq!(diff.removed, vec![id1]);
        assert!(diff.created.is_empty());

        // The survivor moves down; its id does not change.
        assert_eq!(reg.id_at(0), Some(id2));
        assert_eq!(reg.index_of(id2), Some(0));
    }

    #[test]
    fn test_stable_ids_never_reused() {
        let mut reg = TrackableRegistry::new();
        let id1 = reg.update(&[plane_snapshot(100)]).created[0];
        reg.update(&[]);
        let id2 = reg.update(&[plane_snapshot(100)]).created[0];

        // Same engine handle reappearing gets a fresh id.
        assert_ne!(id1, id2);
        assert_eq!(id2, TrackableId::new(2));
    }

    #[test]
    fn test_is_new_lasts_one_frame() {
        let mut reg = TrackableRegistry::new();
        let id = reg.update(&[plane_snapshot(100)]).created[0];
        assert!(reg.is_new(id).unwrap());

        reg.clear_new_marks();
        assert!(!reg.is_new(id).unwrap());

        let diff = reg.update(&[plane_snapshot(100)]);
        assert!(diff.created.is_empty());
        assert!(!reg.is_new(id).unwrap());
    }

    #[test]
    fn test_survivor_pose_refreshed() {
        let mut reg = TrackableRegistry::new();
        let id = reg.update(&[plane_snapshot(100)]).created[0];

        let mut moved = plane_snapshot(100);
        let new_pose = Pose::from_translation(nalgebra::Vector3::new(0.0, 1.0, 0.0));
        moved.pose = Some(new_pose);
        reg.update(&[moved]);

        let pose = reg.pose_of(id).unwrap();
        assert!((pose.translation - new_pose.translation).norm() < 1e-6);
    }

    #[test]
    fn test_pose_dropout_keeps_last_known() {
        let mut reg = TrackableRegistry::new();
        let id = reg.update(&[plane_snapshot(100)]).created[0];

        let mut blind = plane_snapshot(100);
        blind.pose = None;
        reg.update(&[blind]);

        assert!(reg.pose_of(id).is_ok());
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_unknown_id_is_not_found() {
        let reg = TrackableRegistry::new();
        assert_eq!(
            reg.state_of(TrackableId::new(9)).unwrap_err(),
            ArError::NotFound(9)
        );
    }

    #[test]
    fn test_detection_order_preserved() {
        let mut reg = TrackableRegistry::new();
        reg.update(&[plane_snapshot(300), plane_snapshot(100), plane_snapshot(200)]);

        let ids: Vec<u32> = reg.active_ids().map(|id| id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(reg.handle_of(TrackableId::new(1)).unwrap().raw(), 300);
    }
}
