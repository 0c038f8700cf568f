//! Rigid-body transforms.
//!
//! An `SE3` maps points from a source frame into a target frame:
//! `p_target = rotation * p_source + translation`. The pipeline publishes
//! the marker-to-camera transform, so a marker visible in front of the
//! camera always has a positive `translation.z`.

use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3};

/// Rigid transform (rotation + translation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Build from a rotation matrix and a translation vector.
    ///
    /// The matrix is assumed to be orthonormal with determinant +1.
    pub fn from_rt(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let rot = Rotation3::from_matrix_unchecked(rotation);
        Self {
            rotation: UnitQuaternion::from_rotation_matrix(&rot),
            translation,
        }
    }

    /// Build from a 4x4 homogeneous matrix.
    pub fn from_matrix(mat: Matrix4<f64>) -> Self {
        let rotation: Matrix3<f64> = mat.fixed_view::<3, 3>(0, 0).into_owned();
        let translation = Vector3::new(mat[(0, 3)], mat[(1, 3)], mat[(2, 3)]);
        Self::from_rt(rotation, translation)
    }

    /// 4x4 homogeneous matrix of this transform.
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let mut mat = Matrix4::identity();
        mat.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(self.rotation.to_rotation_matrix().matrix());
        mat.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        mat
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// `self * other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &SE3) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    pub fn transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * point + self.translation
    }

    /// True when every component is finite.
    pub fn is_finite(&self) -> bool {
        self.translation.iter().all(|v| v.is_finite())
            && self.rotation.coords.iter().all(|v| v.is_finite())
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_inverse_composes_to_identity() {
        let pose = SE3 {
            rotation: UnitQuaternion::from_euler_angles(0.1, -0.3, 0.7),
            translation: Vector3::new(0.2, -0.1, 1.5),
        };
        let id = pose.compose(&pose.inverse());
        assert_relative_eq!(id.translation, Vector3::zeros(), epsilon = 1e-12);
        assert_relative_eq!(id.rotation.angle(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_matrix_round_trip_preserves_point_mapping() {
        let pose = SE3 {
            rotation: UnitQuaternion::from_euler_angles(0.4, 0.2, -0.1),
            translation: Vector3::new(1.0, 2.0, 3.0),
        };
        let mat = pose.to_matrix();
        let back = SE3::from_matrix(mat);
        let p = Vector3::new(0.3, -0.2, 0.05);
        assert_relative_eq!(pose.transform_point(&p), back.transform_point(&p), epsilon = 1e-12);
        assert_relative_eq!(mat[(3, 3)], 1.0);
    }
}
