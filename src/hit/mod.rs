//! Screen-point hit testing against registered trackables.
//!
//! The engine does the ray cast and returns candidates nearest-first; this
//! module applies the acceptance rule. Planes accept only hits inside
//! their tessellated boundary polygon; images accept only hits inside
//! their local axis-aligned rectangle. Images stay rectangle-tested (not
//! polygon-tested) because the engine guarantees them planar-rectangular.
//! Feature points never accept a hit.

use crate::geometry::Pose;
use crate::perception::{EngineHandle, PerceptionEngine, TrackableGeometry};
use crate::registry::{TrackableId, TrackableRegistry};

/// An accepted hit, still identified by engine handle.
#[derive(Debug, Clone)]
pub struct HitCandidate {
    /// The trackable the ray hit.
    pub handle: EngineHandle,

    /// World pose of the intersection point.
    pub hit_pose: Pose,

    /// Distance from the camera along the ray.
    pub distance: f32,
}

/// Resolves screen points to trackables.
#[derive(Debug, Default)]
pub struct HitTester;

impl HitTester {
    /// Create a hit tester.
    pub fn new() -> Self {
        Self
    }

    /// Ray-cast a screen point and keep only candidates whose hit point is
    /// contained by the trackable. Order (nearest-first, per the engine's
    /// native sort) is preserved.
    pub fn hit_test(
        &self,
        engine: &mut dyn PerceptionEngine,
        registry: &TrackableRegistry,
        x: f32,
        y: f32,
    ) -> Vec<HitCandidate> {
        let mut accepted = Vec::new();

        for raw in engine.hit_test(x, y) {
            let id = match registry.id_for_handle(raw.handle) {
                Some(id) => id,
                None => continue,
            };
            let hit_pose = match raw.pose.to_pose() {
                Some(p) => p,
                None => continue,
            };
            if self.contains(registry, id, &hit_pose) {
                accepted.push(HitCandidate {
                    handle: raw.handle,
                    hit_pose,
                    distance: raw.distance,
                });
            }
        }

        accepted
    }

    /// Map an accepted candidate back to its stable id.
    ///
    /// Pure query with no side effects. `None` when the trackable has been
    /// removed since the candidate was produced.
    pub fn resolve_to_trackable(
        &self,
        registry: &TrackableRegistry,
        candidate: &HitCandidate,
    ) -> Option<TrackableId> {
        registry.id_for_handle(candidate.handle)
    }

    fn contains(&self, registry: &TrackableRegistry, id: TrackableId, hit_pose: &Pose) -> bool {
        let record = match registry.record(id) {
            Ok(r) => r,
            Err(_) => return false,
        };
        let center = match record.pose {
            Some(p) => p,
            None => return false,
        };

        // Both containment tests run in the trackable's local frame.
        let local = center.inverse().transform_point(&hit_pose.translation);

        match &record.geometry {
            TrackableGeometry::Plane { polygon, .. } => {
                point_in_polygon([local.x, local.z], polygon)
            }
            TrackableGeometry::Image {
                extent_x, extent_z, ..
            } => local.x.abs() <= extent_x / 2.0 && local.z.abs() <= extent_z / 2.0,
            TrackableGeometry::Point => false,
        }
    }
}

/// Even-odd point-in-polygon test in the plane's local XZ.
///
/// Degenerate polygons (fewer than 3 vertices) contain nothing.
fn point_in_polygon(p: [f32; 2], polygon: &[[f32; 2]]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let [xi, zi] = polygon[i];
        let [xj, zj] = polygon[j];
        if (zi > p[1]) != (zj > p[1]) && p[0] < (xj - xi) * (p[1] - zi) / (zj - zi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::{
        FrameAdapter, PlaneOrientation, ScriptedEngine, TrackableKind,
    };
    use nalgebra::Vector3;

    fn square() -> Vec<[f32; 2]> {
        vec![[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]]
    }

    /// An engine with one floor plane at the origin and a registry that
    /// has already seen it.
    fn create_test_scene() -> (ScriptedEngine, TrackableRegistry, EngineHandle) {
        let mut engine = ScriptedEngine::new();
        let handle = engine.add_plane(
            PlaneOrientation::Floor,
            Pose::identity(),
            2.0,
            2.0,
            &square(),
        );
        let mut registry = TrackableRegistry::new();
        let raw = engine.frame().unwrap();
        registry.update(&FrameAdapter::new().normalize(raw));
        (engine, registry, handle)
    }

    #[test]
    fn test_point_in_polygon_basics() {
        let poly = square();
        assert!(point_in_polygon([0.0, 0.0], &poly));
        assert!(point_in_polygon([0.9, -0.9], &poly));
        assert!(!point_in_polygon([1.5, 0.0], &poly));
        assert!(!point_in_polygon([0.0, -2.0], &poly));
    }

    #[test]
    fn test_point_in_concave_polygon() {
        // L-shape: the notch at the top right is outside.
        let poly = vec![
            [0.0, 0.0],
            [2.0, 0.0],
            [2.0, 1.0],
            [1.0, 1.0],
            [1.0, 2.0],
            [0.0, 2.0],
        ];
        assert!(point_in_polygon([0.5, 1.5], &poly));
        assert!(point_in_polygon([1.5, 0.5], &poly));
        assert!(!point_in_polygon([1.5, 1.5], &poly));
    }

    #[test]
    fn test_hit_inside_plane_polygon_accepted() {
        let (mut engine, registry, handle) = create_test_scene();
        engine.push_hit(
            handle,
            Pose::from_translation(Vector3::new(0.5, 0.0, 0.5)),
            1.0,
        );

        let tester = HitTester::new();
        let hits = tester.hit_test(&mut engine, &registry, 100.0, 100.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(
            tester.resolve_to_trackable(&registry, &hits[0]),
            Some(TrackableId::new(1))
        );
    }

    #[test]
    fn test_hit_outside_polygon_rejected() {
        let (mut engine, registry, handle) = create_test_scene();
        engine.push_hit(
            handle,
            Pose::from_translation(Vector3::new(3.0, 0.0, 0.0)),
            1.0,
        );

        let hits = HitTester::new().hit_test(&mut engine, &registry, 100.0, 100.0);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_containment_uses_plane_local_frame() {
        // Plane translated to x = 10: a world-space hit near its center is
        // inside, one near the world origin is not.
        let mut engine = ScriptedEngine::new();
        let center = Pose::from_translation(Vector3::new(10.0, 0.0, 0.0));
        let handle = engine.add_plane(PlaneOrientation::Floor, center, 2.0, 2.0, &square());
        let mut registry = TrackableRegistry::new();
        let raw = engine.frame().unwrap();
        registry.update(&FrameAdapter::new().normalize(raw));

        engine.push_hit(
            handle,
            Pose::from_translation(Vector3::new(10.2, 0.0, 0.3)),
            1.0,
        );
        engine.push_hit(handle, Pose::identity(), 2.0);

        let hits = HitTester::new().hit_test(&mut engine, &registry, 0.0, 0.0);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].hit_pose.translation.x - 10.2).abs() < 1e-6);
    }

    #[test]
    fn test_image_uses_rectangle_containment() {
        let mut engine = ScriptedEngine::new();
        engine.register_image("poster", 0.4);
        let handle = engine
            .add_image("poster", Pose::identity(), 0.4, 0.2)
            .unwrap();
        let mut registry = TrackableRegistry::new();
        let raw = engine.frame().unwrap();
        registry.update(&FrameAdapter::new().normalize(raw));

        // Inside the 0.4 x 0.2 rectangle.
        engine.push_hit(
            handle,
            Pose::from_translation(Vector3::new(0.15, 0.0, 0.05)),
            1.0,
        );
        let hits = HitTester::new().hit_test(&mut engine, &registry, 0.0, 0.0);
        assert_eq!(hits.len(), 1);

        // Outside along Z.
        engine.clear_hits();
        engine.push_hit(
            handle,
            Pose::from_translation(Vector3::new(0.0, 0.0, 0.15)),
            1.0,
        );
        let hits = HitTester::new().hit_test(&mut engine, &registry, 0.0, 0.0);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_point_trackable_never_accepts() {
        let mut engine = ScriptedEngine::new();
        let handle = engine.add_point(Pose::identity());
        let mut registry = TrackableRegistry::new();
        let raw = engine.frame().unwrap();
        registry.update(&FrameAdapter::new().normalize(raw));
        assert_eq!(registry.kind_of(TrackableId::new(1)).unwrap(), TrackableKind::Point);

        engine.push_hit(handle, Pose::identity(), 0.5);
        let hits = HitTester::new().hit_test(&mut engine, &registry, 0.0, 0.0);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_nearest_first_order_preserved() {
        let mut engine = ScriptedEngine::new();
        let near = engine.add_plane(PlaneOrientation::Floor, Pose::identity(), 2.0, 2.0, &square());
        let far_center = Pose::from_translation(Vector3::new(0.0, -1.0, 0.0));
        let far = engine.add_plane(PlaneOrientation::Floor, far_center, 2.0, 2.0, &square());
        let mut registry = TrackableRegistry::new();
        let raw = engine.frame().unwrap();
        registry.update(&FrameAdapter::new().normalize(raw));

        engine.push_hit(far, Pose::from_translation(Vector3::new(0.0, -1.0, 0.0)), 3.0);
        engine.push_hit(near, Pose::identity(), 1.0);

        let hits = HitTester::new().hit_test(&mut engine, &registry, 0.0, 0.0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].handle, near);
        assert_eq!(hits[1].handle, far);
    }
}
