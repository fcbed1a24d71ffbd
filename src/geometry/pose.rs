//! Rigid-body pose (rotation + translation) and 4×4 matrix conversion.
//!
//! All poses inside the crate use one convention: column-major matrices,
//! world-from-local. Engines that report row-major matrices are normalized
//! once at the perception boundary via [`MatrixLayout`]; nothing past the
//! adapter ever sees a row-major buffer.

use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3};

/// Memory layout of a raw 4×4 matrix buffer handed over by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixLayout {
    /// `m[col * 4 + row]`, the internal convention.
    ColumnMajor,
    /// `m[row * 4 + col]`, transposed at the boundary.
    RowMajor,
}

/// A rigid-body transform: rotation followed by translation.
///
/// Equivalent to a 4×4 homogeneous matrix with an orthonormal upper-left
/// block. Stored factored so composition and inversion stay exact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Orientation (unit quaternion).
    pub rotation: UnitQuaternion<f32>,

    /// Position of the local origin in the parent frame.
    pub translation: Vector3<f32>,
}

/// Tolerance for the orthonormality check on ingested rotation blocks.
const ORTHONORMAL_EPS: f32 = 1e-3;

impl Pose {
    /// The identity pose.
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// A pure translation.
    pub fn from_translation(translation: Vector3<f32>) -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation,
        }
    }

    /// Compose two poses: `self * other` (apply `other` first).
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// The inverse transform.
    pub fn inverse(&self) -> Pose {
        let inv_rot = self.rotation.inverse();
        Pose {
            rotation: inv_rot,
            translation: -(inv_rot * self.translation),
        }
    }

    /// Transform a point from the local frame into the parent frame.
    pub fn transform_point(&self, p: &Vector3<f32>) -> Vector3<f32> {
        self.rotation * p + self.translation
    }

    /// The full homogeneous matrix.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        let mut m = self.rotation.to_rotation_matrix().to_homogeneous();
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    /// The homogeneous matrix as a flat column-major buffer.
    pub fn to_column_major(&self) -> [f32; 16] {
        let m = self.to_matrix();
        let mut out = [0.0f32; 16];
        out.copy_from_slice(m.as_slice());
        out
    }

    /// Parse a column-major homogeneous matrix.
    ///
    /// Returns `None` when the buffer contains non-finite values or its
    /// upper-left block is not orthonormal within tolerance. Scale and
    /// shear are rejected rather than silently absorbed.
    pub fn from_column_major(m: &[f32; 16]) -> Option<Pose> {
        if m.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let mat = Matrix4::from_column_slice(m);
        let rot: Matrix3<f32> = mat.fixed_view::<3, 3>(0, 0).into_owned();

        // R^T R == I and det(R) == +1, within tolerance.
        let gram = rot.transpose() * rot;
        if (gram - Matrix3::identity()).abs().max() > ORTHONORMAL_EPS {
            return None;
        }
        if (rot.determinant() - 1.0).abs() > ORTHONORMAL_EPS {
            return None;
        }

        let rotation =
            UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rot));
        let translation = mat.fixed_view::<3, 1>(0, 3).into_owned();
        Some(Pose {
            rotation,
            translation,
        })
    }

    /// Parse a raw matrix buffer in either layout.
    pub fn from_matrix_slice(m: &[f32; 16], layout: MatrixLayout) -> Option<Pose> {
        match layout {
            MatrixLayout::ColumnMajor => Self::from_column_major(m),
            MatrixLayout::RowMajor => {
                let mut t = [0.0f32; 16];
                for row in 0..4 {
                    for col in 0..4 {
                        t[col * 4 + row] = m[row * 4 + col];
                    }
                }
                Self::from_column_major(&t)
            }
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn create_test_pose() -> Pose {
        Pose {
            rotation: UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2),
            translation: Vector3::new(1.0, 2.0, 3.0),
        }
    }

    #[test]
    fn test_transform_point() {
        let pose = Pose::from_translation(Vector3::new(1.0, 0.0, -2.0));
        let p = pose.transform_point(&Vector3::new(0.5, 0.5, 0.5));
        assert_eq!(p, Vector3::new(1.5, 0.5, -1.5));
    }

    #[test]
    fn test_compose_inverse_roundtrip() {
        let pose = create_test_pose();
        let roundtrip = pose.compose(&pose.inverse());
        assert!(roundtrip.translation.norm() < 1e-5);
        assert!(roundtrip.rotation.angle() < 1e-5);
    }

    #[test]
    fn test_column_major_roundtrip() {
        let pose = create_test_pose();
        let buf = pose.to_column_major();
        let parsed = Pose::from_column_major(&buf).unwrap();
        assert!((parsed.translation - pose.translation).norm() < 1e-5);
        assert!(parsed.rotation.angle_to(&pose.rotation) < 1e-5);
    }

    #[test]
    fn test_row_major_is_transposed() {
        let pose = create_test_pose();
        let col = pose.to_column_major();
        let mut row = [0.0f32; 16];
        for r in 0..4 {
            for c in 0..4 {
                row[r * 4 + c] = col[c * 4 + r];
            }
        }
        let parsed = Pose::from_matrix_slice(&row, MatrixLayout::RowMajor).unwrap();
        assert!((parsed.translation - pose.translation).norm() < 1e-5);
    }

    #[test]
    fn test_rejects_bad_matrices() {
        let mut m = Pose::identity().to_column_major();
        m[5] = f32::NAN;
        assert!(Pose::from_column_major(&m).is_none());

        // Sheared/scaled rotation block.
        let mut scaled = Pose::identity().to_column_major();
        scaled[0] = 2.0;
        assert!(Pose::from_column_major(&scaled).is_none());

        // Reflection (det == -1).
        let mut mirrored = Pose::identity().to_column_major();
        mirrored[0] = -1.0;
        assert!(Pose::from_column_major(&mirrored).is_none());
    }
}
