//! Transform math shared by the importer and the transform cascade.
//!
//! Matrices are column-major and multiply column vectors, so a node's local
//! matrix is `T * R * S` and a child's world matrix is `parent * local`.
//! Euler angles are stored as `(roll, pitch, yaw)` = rotations about X, Y and Z,
//! recombined as `Rz(yaw) * Ry(pitch) * Rx(roll)`.

use glam::{Mat4, Quat, Vec3};
use std::f32::consts::FRAC_PI_2;

/// A decomposed affine transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trs {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Trs {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Trs {
    /// Compose into `T * R * S`
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.translation)
            * Mat4::from_quat(self.rotation)
            * Mat4::from_scale(self.scale)
    }

    /// Split an affine matrix back into translation, rotation and scale
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation: rotation.normalize(),
            scale,
        }
    }
}

/// Convert a unit quaternion to `(roll, pitch, yaw)` radians.
///
/// At the ±90° pitch singularity the pitch snaps to `±π/2` with the sign of the
/// sine term.
pub fn quat_to_euler(q: Quat) -> Vec3 {
    let (x, y, z, w) = (q.x, q.y, q.z, q.w);

    let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));

    let sin_pitch = 2.0 * (w * y - z * x);
    let pitch = if sin_pitch.abs() >= 1.0 {
        FRAC_PI_2.copysign(sin_pitch)
    } else {
        sin_pitch.clamp(-1.0, 1.0).asin()
    };

    let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));

    Vec3::new(roll, pitch, yaw)
}

/// Rotation matrix for `(roll, pitch, yaw)` radians
pub fn euler_to_matrix(euler: Vec3) -> Mat4 {
    Mat4::from_rotation_z(euler.z) * Mat4::from_rotation_y(euler.y) * Mat4::from_rotation_x(euler.x)
}

/// Local matrix of an entity from its position and optional rotation/scale
pub fn local_matrix(position: Vec3, rotation: Option<Vec3>, scale: Option<Vec3>) -> Mat4 {
    let mut local = Mat4::from_translation(position);
    if let Some(rotation) = rotation {
        local *= euler_to_matrix(rotation);
    }
    if let Some(scale) = scale {
        local *= Mat4::from_scale(scale);
    }
    local
}

/// World-space eye position encoded in a view matrix
pub fn camera_position(view: &Mat4) -> Vec3 {
    view.inverse().w_axis.truncate()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn test_decompose_recompose_matrix() {
        let trs = Trs {
            translation: Vec3::new(1.5, -2.0, 3.25),
            rotation: Quat::from_axis_angle(Vec3::new(1.0, 2.0, -0.5).normalize(), 0.8),
            scale: Vec3::new(2.0, 0.5, 1.25),
        };
        let matrix = trs.to_matrix();

        let back = Trs::from_matrix(&matrix);
        assert!(back.translation.abs_diff_eq(trs.translation, EPS));
        assert!(back.scale.abs_diff_eq(trs.scale, EPS));
        assert!(back.to_matrix().abs_diff_eq(matrix, EPS));
    }

    #[test]
    fn test_euler_reproduces_rotation() {
        let rotations = [
            Quat::IDENTITY,
            Quat::from_rotation_x(0.3),
            Quat::from_rotation_y(-1.1),
            Quat::from_rotation_z(2.5),
            Quat::from_axis_angle(Vec3::new(0.2, -0.7, 0.4).normalize(), 1.9),
            Quat::from_axis_angle(Vec3::new(-1.0, 0.1, 0.3).normalize(), -0.6),
        ];
        for q in rotations {
            let euler = quat_to_euler(q);
            let rebuilt = euler_to_matrix(euler);
            assert!(
                rebuilt.abs_diff_eq(Mat4::from_quat(q), EPS),
                "rotation {:?} came back as {:?}",
                q,
                euler
            );
        }
    }

    #[test]
    fn test_pitch_singularity_snaps() {
        // asin loses precision next to ±1
        let euler = quat_to_euler(Quat::from_rotation_y(FRAC_PI_2));
        assert!((euler.y - FRAC_PI_2).abs() < 1e-3);
        let euler = quat_to_euler(Quat::from_rotation_y(-FRAC_PI_2));
        assert!((euler.y + FRAC_PI_2).abs() < 1e-3);

        // A slightly denormalised quaternion pushes the sine past 1
        let q = Quat::from_xyzw(0.0, 0.7072, 0.0, 0.7072);
        assert_eq!(quat_to_euler(q).y, FRAC_PI_2);
        let q = Quat::from_xyzw(0.0, -0.7072, 0.0, 0.7072);
        assert_eq!(quat_to_euler(q).y, -FRAC_PI_2);
    }

    #[test]
    fn test_local_matrix_order() {
        let position = Vec3::new(1.0, 0.0, 0.0);
        let rotation = Vec3::new(0.0, 0.0, FRAC_PI_2);
        let scale = Vec3::splat(2.0);
        let local = local_matrix(position, Some(rotation), Some(scale));

        // Scale, then rotate +X onto +Y, then translate
        let p = local.transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), EPS));

        assert_eq!(local_matrix(position, None, None), Mat4::from_translation(position));
    }

    #[test]
    fn test_camera_position_from_view() {
        let eye = Vec3::new(3.0, 1.7, 0.0);
        let view = Mat4::look_at_rh(eye, Vec3::new(0.0, 1.7, 0.0), Vec3::Y);
        assert!(camera_position(&view).abs_diff_eq(eye, EPS));
    }
}
