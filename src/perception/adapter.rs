//! Frame normalization: raw engine records in, uniform snapshots out.
//!
//! One malformed record must never corrupt the rest of the frame: a bad
//! pose degrades to "no pose this frame", bad geometry degrades to empty
//! geometry, and only an unusable identity drops the record. Every
//! degradation is logged.

use std::collections::HashSet;

use tracing::warn;

use crate::perception::engine::RawTrackable;
use crate::perception::snapshot::{TrackableGeometry, TrackableKind, TrackableSnapshot};

/// Normalizes one frame's raw engine records.
#[derive(Debug, Default)]
pub struct FrameAdapter;

impl FrameAdapter {
    /// Create an adapter.
    pub fn new() -> Self {
        Self
    }

    /// Normalize a frame. Record order (= detection order) is preserved.
    pub fn normalize(&self, raw: Vec<RawTrackable>) -> Vec<TrackableSnapshot> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(raw.len());

        for record in raw {
            if !seen.insert(record.handle) {
                warn!(handle = %record.handle, "duplicate handle in frame, dropping record");
                continue;
            }

            let pose = match record.pose {
                Some(rp) => {
                    let parsed = rp.to_pose();
                    if parsed.is_none() {
                        warn!(handle = %record.handle, "invalid pose matrix, treating as no pose");
                    }
                    parsed
                }
                None => None,
            };

            let geometry = Self::build_geometry(&record);
            let subsumed = record.subsumed_by.is_some();

            out.push(TrackableSnapshot {
                handle: record.handle,
                kind: record.kind,
                state: record.state,
                pose,
                geometry,
                subsumed,
            });
        }

        out
    }

    fn build_geometry(record: &RawTrackable) -> TrackableGeometry {
        let extent_x = sanitize_extent(record.extent_x, record, "extent_x");
        let extent_z = sanitize_extent(record.extent_z, record, "extent_z");

        match record.kind {
            TrackableKind::Plane(_) => TrackableGeometry::Plane {
                extent_x,
                extent_z,
                polygon: pair_polygon(record),
            },
            TrackableKind::Image => {
                let name = match &record.image_name {
                    Some(n) => n.clone(),
                    None => {
                        warn!(handle = %record.handle, "image record without a name");
                        String::new()
                    }
                };
                TrackableGeometry::Image {
                    name,
                    extent_x,
                    extent_z,
                }
            }
            TrackableKind::Point => TrackableGeometry::Point,
        }
    }
}

fn sanitize_extent(value: f32, record: &RawTrackable, field: &str) -> f32 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        warn!(handle = %record.handle, field, value, "invalid extent, using 0");
        0.0
    }
}

/// Pair the flat `[x0, z0, x1, z1, ..]` buffer into vertices.
///
/// A dangling half-pair is dropped; a polygon with fewer than 3 vertices
/// degrades to empty (the plane is still tracked, it just cannot win a hit
/// test until the engine reports a real boundary).
fn pair_polygon(record: &RawTrackable) -> Vec<[f32; 2]> {
    let buf = &record.polygon_xz;
    if buf.len() % 2 != 0 {
        warn!(handle = %record.handle, len = buf.len(), "odd polygon buffer, dropping last value");
    }
    if buf.iter().any(|v| !v.is_finite()) {
        warn!(handle = %record.handle, "non-finite polygon vertex, dropping polygon");
        return Vec::new();
    }

    let verts: Vec<[f32; 2]> = buf.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
    if verts.len() < 3 {
        return Vec::new();
    }
    verts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Pose;
    use crate::perception::engine::{EngineHandle, RawPose};
    use crate::perception::snapshot::{PlaneOrientation, TrackingState};

    fn create_test_raw(token: u64) -> RawTrackable {
        RawTrackable {
            handle: EngineHandle::from_raw(token),
            kind: TrackableKind::Plane(PlaneOrientation::Floor),
            state: TrackingState::Tracking,
            pose: Some(RawPose::from(Pose::identity())),
            extent_x: 2.0,
            extent_z: 2.0,
            polygon_xz: vec![-1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0, 1.0],
            image_name: None,
            subsumed_by: None,
        }
    }

    #[test]
    fn test_normalize_preserves_order() {
        let adapter = FrameAdapter::new();
        let out = adapter.normalize(vec![create_test_raw(7), create_test_raw(3)]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].handle, EngineHandle::from_raw(7));
        assert_eq!(out[1].handle, EngineHandle::from_raw(3));
    }

    #[test]
    fn test_bad_pose_degrades_to_none() {
        let adapter = FrameAdapter::new();
        let mut raw = create_test_raw(1);
        raw.pose = Some(RawPose::column_major([f32::NAN; 16]));
        let out = adapter.normalize(vec![raw, create_test_raw(2)]);

        // The bad record is kept (identity survives), only its pose is gone,
        // and the rest of the frame is untouched.
        assert_eq!(out.len(), 2);
        assert!(out[0].pose.is_none());
        assert!(out[1].pose.is_some());
    }

    #[test]
    fn test_duplicate_handle_dropped() {
        let adapter = FrameAdapter::new();
        let out = adapter.normalize(vec![create_test_raw(1), create_test_raw(1)]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_degenerate_polygon_becomes_empty() {
        let adapter = FrameAdapter::new();
        let mut raw = create_test_raw(1);
        raw.polygon_xz = vec![0.0, 0.0, 1.0, 1.0]; // 2 vertices
        let out = adapter.normalize(vec![raw]);
        match &out[0].geometry {
            TrackableGeometry::Plane { polygon, .. } => assert!(polygon.is_empty()),
            other => panic!("unexpected geometry {other:?}"),
        }
    }

    #[test]
    fn test_odd_polygon_buffer_pairs_without_dangling_value() {
        let adapter = FrameAdapter::new();
        let mut raw = create_test_raw(1);
        raw.polygon_xz = vec![-1.0, -1.0, 1.0, -1.0, 0.0, 1.0, 0.5];
        let out = adapter.normalize(vec![raw]);
        match &out[0].geometry {
            TrackableGeometry::Plane { polygon, .. } => assert_eq!(polygon.len(), 3),
            other => panic!("unexpected geometry {other:?}"),
        }
    }
}
