//! Handles and transforms shared between the scene and the renderer.

use rapier3d::na::{Isometry3, Matrix4, Quaternion, UnitQuaternion, Vector3};
use slotmap::new_key_type;

new_key_type! {
    /// CPU mesh asset registered with a `VisualWorld`.
    pub struct MeshHandle;
    /// One drawn object in a `VisualWorld`.
    pub struct InstanceHandle;
}

/// Minimal transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: [f32; 3],
    pub rotation: [f32; 4], // quat xyzw
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0], // identity quat
            scale: [1.0; 3],
        }
    }
}

impl Transform {
    pub fn from_translation(translation: [f32; 3]) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    /// Copies position and orientation verbatim; scale stays 1.
    pub fn from_isometry(pose: &Isometry3<f32>) -> Self {
        let t = pose.translation.vector;
        let q = pose.rotation.coords;
        Self {
            translation: [t.x, t.y, t.z],
            rotation: [q.x, q.y, q.z, q.w],
            scale: [1.0; 3],
        }
    }

    pub fn with_rotation(mut self, rotation: UnitQuaternion<f32>) -> Self {
        let q = rotation.coords;
        self.rotation = [q.x, q.y, q.z, q.w];
        self
    }

    pub fn rotation_quat(&self) -> UnitQuaternion<f32> {
        let [x, y, z, w] = self.rotation;
        UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z))
    }

    /// Column-major T * R * S.
    pub fn model(&self) -> [[f32; 4]; 4] {
        let t = Matrix4::new_translation(&Vector3::from(self.translation));
        let r = self.rotation_quat().to_homogeneous();
        let s = Matrix4::new_nonuniform_scaling(&Vector3::from(self.scale));
        (t * r * s).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn identity_model_is_identity() {
        let m = Transform::default().model();
        let expected: [[f32; 4]; 4] = Matrix4::identity().into();
        assert_eq!(m, expected);
    }

    #[test]
    fn from_isometry_is_lossless() {
        let pose = Isometry3::new(Vector3::new(1.0, 2.0, 3.0), Vector3::new(0.1, 0.7, -0.3));
        let t = Transform::from_isometry(&pose);

        assert_eq!(t.translation, [1.0, 2.0, 3.0]);
        let q = pose.rotation.coords;
        assert_eq!(t.rotation, [q.x, q.y, q.z, q.w]);
    }

    #[test]
    fn model_translation_lives_in_last_column() {
        let t = Transform::from_translation([4.0, 5.0, 6.0])
            .with_rotation(UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2));
        let m = t.model();
        assert_eq!(m[3], [4.0, 5.0, 6.0, 1.0]);

        // +X rotates onto -Z about +Y.
        assert!((m[0][2] + 1.0).abs() < 1e-6);
        assert!(m[0][0].abs() < 1e-6);
    }
}
