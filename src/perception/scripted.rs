//! An in-memory [`PerceptionEngine`] driven by explicit scripting.
//!
//! Used by the test suite to walk the registry through multi-frame
//! scenarios (plane appears, gets subsumed, stops, ..) and usable by
//! downstream demos that want the session machinery without a device.

use std::collections::HashMap;

use crate::error::{ArError, ArResult};
use crate::geometry::Pose;
use crate::perception::engine::{
    EngineHandle, NativeAnchorId, PerceptionEngine, RawHit, RawPose, RawTrackable,
};
use crate::perception::snapshot::{PlaneOrientation, TrackableKind, TrackingState};

/// Scriptable engine: the current frame is whatever the script last set up.
pub struct ScriptedEngine {
    running: bool,
    next_handle: u64,
    next_anchor: u64,
    records: Vec<RawTrackable>,
    hits: Vec<RawHit>,
    anchors: HashMap<NativeAnchorId, (Pose, TrackingState)>,
    detached: Vec<NativeAnchorId>,
    images: HashMap<String, f32>,
}

impl ScriptedEngine {
    /// A running engine with an empty frame.
    pub fn new() -> Self {
        Self {
            running: true,
            next_handle: 0,
            next_anchor: 0,
            records: Vec::new(),
            hits: Vec::new(),
            anchors: HashMap::new(),
            detached: Vec::new(),
            images: HashMap::new(),
        }
    }

    /// Simulate the session going down (or coming back).
    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    fn alloc_handle(&mut self) -> EngineHandle {
        self.next_handle += 1;
        EngineHandle::from_raw(self.next_handle)
    }

    /// Script a plane into the current frame. Returns its handle.
    pub fn add_plane(
        &mut self,
        orientation: PlaneOrientation,
        pose: Pose,
        extent_x: f32,
        extent_z: f32,
        polygon: &[[f32; 2]],
    ) -> EngineHandle {
        let handle = self.alloc_handle();
        self.records.push(RawTrackable {
            handle,
            kind: TrackableKind::Plane(orientation),
            state: TrackingState::Tracking,
            pose: Some(RawPose::from(pose)),
            extent_x,
            extent_z,
            polygon_xz: polygon.iter().flat_map(|v| [v[0], v[1]]).collect(),
            image_name: None,
            subsumed_by: None,
        });
        handle
    }

    /// Script a recognized image into the current frame.
    ///
    /// The image must have been registered first; unregistered names are
    /// ignored and return `None`, like an engine that never recognizes an
    /// image it has no database entry for.
    pub fn add_image(
        &mut self,
        name: &str,
        pose: Pose,
        extent_x: f32,
        extent_z: f32,
    ) -> Option<EngineHandle> {
        if !self.images.contains_key(name) {
            return None;
        }
        let handle = self.alloc_handle();
        self.records.push(RawTrackable {
            handle,
            kind: TrackableKind::Image,
            state: TrackingState::Tracking,
            pose: Some(RawPose::from(pose)),
            extent_x,
            extent_z,
            polygon_xz: Vec::new(),
            image_name: Some(name.to_string()),
            subsumed_by: None,
        });
        Some(handle)
    }

    /// Script a feature point into the current frame.
    pub fn add_point(&mut self, pose: Pose) -> EngineHandle {
        let handle = self.alloc_handle();
        self.records.push(RawTrackable {
            handle,
            kind: TrackableKind::Point,
            state: TrackingState::Tracking,
            pose: Some(RawPose::from(pose)),
            extent_x: 0.0,
            extent_z: 0.0,
            polygon_xz: Vec::new(),
            image_name: None,
            subsumed_by: None,
        });
        handle
    }

    fn record_mut(&mut self, handle: EngineHandle) -> Option<&mut RawTrackable> {
        self.records.iter_mut().find(|r| r.handle == handle)
    }

    /// Change a scripted trackable's state.
    pub fn set_state(&mut self, handle: EngineHandle, state: TrackingState) {
        if let Some(r) = self.record_mut(handle) {
            r.state = state;
        }
    }

    /// Change a scripted trackable's pose.
    pub fn set_pose(&mut self, handle: EngineHandle, pose: Pose) {
        if let Some(r) = self.record_mut(handle) {
            r.pose = Some(RawPose::from(pose));
        }
    }

    /// Corrupt a scripted trackable's pose buffer (boundary-testing hook).
    pub fn set_raw_pose(&mut self, handle: EngineHandle, raw: Option<RawPose>) {
        if let Some(r) = self.record_mut(handle) {
            r.pose = raw;
        }
    }

    /// Mark a plane as merged into another plane.
    pub fn subsume(&mut self, handle: EngineHandle, by: EngineHandle) {
        if let Some(r) = self.record_mut(handle) {
            r.subsumed_by = Some(by);
        }
    }

    /// Drop a trackable from the frame entirely.
    pub fn remove(&mut self, handle: EngineHandle) {
        self.records.retain(|r| r.handle != handle);
    }

    /// Script the result of the next hit tests (nearest-first order).
    pub fn push_hit(&mut self, handle: EngineHandle, pose: Pose, distance: f32) {
        self.hits.push(RawHit {
            handle,
            pose: RawPose::from(pose),
            distance,
        });
    }

    /// Clear scripted hits.
    pub fn clear_hits(&mut self) {
        self.hits.clear();
    }

    /// Change a native anchor's state (e.g. to Stopped).
    pub fn set_anchor_state(&mut self, id: NativeAnchorId, state: TrackingState) {
        if let Some(entry) = self.anchors.get_mut(&id) {
            entry.1 = state;
        }
    }

    /// Whether a native anchor has been detached.
    pub fn is_detached(&self, id: NativeAnchorId) -> bool {
        self.detached.contains(&id)
    }

    /// How many native anchors are currently live inside the engine.
    pub fn live_anchor_count(&self) -> usize {
        self.anchors.len()
    }

    /// Whether an image name is in the recognition database.
    pub fn knows_image(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PerceptionEngine for ScriptedEngine {
    fn frame(&mut self) -> ArResult<Vec<RawTrackable>> {
        if !self.running {
            return Err(ArError::EngineUnavailable);
        }
        Ok(self.records.clone())
    }

    fn hit_test(&mut self, _x: f32, _y: f32) -> Vec<RawHit> {
        let mut hits = self.hits.clone();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    fn create_anchor(
        &mut self,
        pose: Pose,
        _attach_to: Option<EngineHandle>,
    ) -> ArResult<NativeAnchorId> {
        if !self.running {
            return Err(ArError::EngineUnavailable);
        }
        self.next_anchor += 1;
        let id = NativeAnchorId(self.next_anchor);
        self.anchors.insert(id, (pose, TrackingState::Tracking));
        Ok(id)
    }

    fn detach_anchor(&mut self, id: NativeAnchorId) {
        if self.anchors.remove(&id).is_some() {
            self.detached.push(id);
        }
    }

    fn anchor_state(&self, id: NativeAnchorId) -> Option<(Pose, TrackingState)> {
        self.anchors.get(&id).copied()
    }

    fn register_image(&mut self, name: &str, physical_width: f32) {
        self.images.insert(name.to_string(), physical_width);
    }
}

/// A shared handle to a scripted engine.
///
/// The session takes ownership of its engine box, so a test (or demo)
/// that wants to keep scripting frames hands the session one clone of an
/// `Arc<Mutex<ScriptedEngine>>` and keeps the other as its controller.
impl PerceptionEngine for std::sync::Arc<parking_lot::Mutex<ScriptedEngine>> {
    fn frame(&mut self) -> ArResult<Vec<RawTrackable>> {
        self.lock().frame()
    }

    fn hit_test(&mut self, x: f32, y: f32) -> Vec<RawHit> {
        self.lock().hit_test(x, y)
    }

    fn create_anchor(
        &mut self,
        pose: Pose,
        attach_to: Option<EngineHandle>,
    ) -> ArResult<NativeAnchorId> {
        self.lock().create_anchor(pose, attach_to)
    }

    fn detach_anchor(&mut self, id: NativeAnchorId) {
        self.lock().detach_anchor(id);
    }

    fn anchor_state(&self, id: NativeAnchorId) -> Option<(Pose, TrackingState)> {
        self.lock().anchor_state(id)
    }

    fn register_image(&mut self, name: &str, physical_width: f32) {
        self.lock().register_image(name, physical_width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_fails_when_not_running() {
        let mut engine = ScriptedEngine::new();
        engine.set_running(false);
        assert_eq!(engine.frame().unwrap_err(), ArError::EngineUnavailable);
    }

    #[test]
    fn test_unregistered_image_is_not_recognized() {
        let mut engine = ScriptedEngine::new();
        assert!(engine
            .add_image("poster", Pose::identity(), 0.3, 0.2)
            .is_none());

        engine.register_image("poster", 0.3);
        assert!(engine
            .add_image("poster", Pose::identity(), 0.3, 0.2)
            .is_some());
    }

    #[test]
    fn test_detach_is_idempotent() {
        let mut engine = ScriptedEngine::new();
        let id = engine.create_anchor(Pose::identity(), None).unwrap();
        engine.detach_anchor(id);
        engine.detach_anchor(id);
        assert!(engine.is_detached(id));
        assert_eq!(engine.live_anchor_count(), 0);
    }

    #[test]
    fn test_hits_sorted_nearest_first() {
        let mut engine = ScriptedEngine::new();
        let h1 = engine.alloc_handle();
        let h2 = engine.alloc_handle();
        engine.push_hit(h1, Pose::identity(), 2.0);
        engine.push_hit(h2, Pose::identity(), 0.5);
        let hits = engine.hit_test(10.0, 10.0);
        assert_eq!(hits[0].handle, h2);
        assert_eq!(hits[1].handle, h1);
    }
}
