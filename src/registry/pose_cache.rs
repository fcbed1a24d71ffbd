//! Per-ID 4×4 matrix storage for renderer consumption.
//!
//! The renderer does not want quaternions; it wants the current matrix of
//! a stable id in its own matrix type, every frame. The cache stores the
//! column-major expansion of each live trackable/anchor pose and writes it
//! into any caller-supplied [`MatrixTarget`].

use std::collections::HashMap;

use nalgebra::Matrix4;

use crate::error::{ArError, ArResult};
use crate::geometry::Pose;
use crate::registry::types::{AnchorId, TrackableId};

/// A caller-supplied matrix that can be filled from a column-major buffer.
pub trait MatrixTarget {
    /// Overwrite `self` with the given column-major 4×4 matrix.
    fn set_column_major(&mut self, m: &[f32; 16]);
}

impl MatrixTarget for [f32; 16] {
    fn set_column_major(&mut self, m: &[f32; 16]) {
        self.copy_from_slice(m);
    }
}

impl MatrixTarget for Matrix4<f32> {
    fn set_column_major(&mut self, m: &[f32; 16]) {
        *self = Matrix4::from_column_slice(m);
    }
}

/// Matrix cache keyed by stable trackable/anchor id.
#[derive(Debug, Default)]
pub struct PoseCache {
    trackables: HashMap<TrackableId, [f32; 16]>,
    anchors: HashMap<AnchorId, [f32; 16]>,
}

impl PoseCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store/refresh a trackable's matrix.
    pub fn store_trackable(&mut self, id: TrackableId, pose: &Pose) {
        self.trackables.insert(id, pose.to_column_major());
    }

    /// Drop a removed trackable's matrix.
    pub fn remove_trackable(&mut self, id: TrackableId) {
        self.trackables.remove(&id);
    }

    /// Store/refresh an anchor's matrix.
    pub fn store_anchor(&mut self, id: AnchorId, pose: &Pose) {
        self.anchors.insert(id, pose.to_column_major());
    }

    /// Drop a removed anchor's matrix.
    pub fn remove_anchor(&mut self, id: AnchorId) {
        self.anchors.remove(&id);
    }

    /// Write a trackable's matrix into a caller-supplied target.
    ///
    /// `NotFound` covers both an unknown id and a live trackable the
    /// engine has never posed; `TrackableRegistry::pose_of` distinguishes
    /// the two.
    pub fn trackable_into<T: MatrixTarget>(&self, id: TrackableId, target: &mut T) -> ArResult<()> {
        match self.trackables.get(&id) {
            Some(m) => {
                target.set_column_major(m);
                Ok(())
            }
            None => Err(ArError::NotFound(id.0)),
        }
    }

    /// Write an anchor's matrix into a caller-supplied target.
    pub fn anchor_into<T: MatrixTarget>(&self, id: AnchorId, target: &mut T) -> ArResult<()> {
        match self.anchors.get(&id) {
            Some(m) => {
                target.set_column_major(m);
                Ok(())
            }
            None => Err(ArError::NotFound(id.0)),
        }
    }

    /// A trackable's matrix as `nalgebra::Matrix4`.
    pub fn trackable_matrix(&self, id: TrackableId) -> ArResult<Matrix4<f32>> {
        let mut m = Matrix4::identity();
        self.trackable_into(id, &mut m)?;
        Ok(m)
    }

    /// An anchor's matrix as `nalgebra::Matrix4`.
    pub fn anchor_matrix(&self, id: AnchorId) -> ArResult<Matrix4<f32>> {
        let mut m = Matrix4::identity();
        self.anchor_into(id, &mut m)?;
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_store_and_read_into_array_target() {
        let mut cache = PoseCache::new();
        let id = TrackableId::new(1);
        cache.store_trackable(id, &Pose::from_translation(Vector3::new(1.0, 2.0, 3.0)));

        let mut out = [0.0f32; 16];
        cache.trackable_into(id, &mut out).unwrap();
        // Translation lives in the last column of a column-major buffer.
        assert_eq!(&out[12..15], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_matrix4_target() {
        let mut cache = PoseCache::new();
        let id = AnchorId::new(1);
        cache.store_anchor(id, &Pose::from_translation(Vector3::new(0.0, -1.0, 0.0)));

        let m = cache.anchor_matrix(id).unwrap();
        assert_eq!(m[(1, 3)], -1.0);
        assert_eq!(m[(3, 3)], 1.0);
    }

    #[test]
    fn test_refresh_overwrites() {
        let mut cache = PoseCache::new();
        let id = TrackableId::new(1);
        cache.store_trackable(id, &Pose::identity());
        cache.store_trackable(id, &Pose::from_translation(Vector3::new(5.0, 0.0, 0.0)));

        let m = cache.trackable_matrix(id).unwrap();
        assert_eq!(m[(0, 3)], 5.0);
    }

    #[test]
    fn test_removed_entry_is_not_found() {
        let mut cache = PoseCache::new();
        let id = TrackableId::new(1);
        cache.store_trackable(id, &Pose::identity());
        cache.remove_trackable(id);
        assert_eq!(
            cache.trackable_matrix(id).unwrap_err(),
            ArError::NotFound(1)
        );
    }
}
