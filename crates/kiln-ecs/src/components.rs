//! Built-in scene components

use crate::change::ChangeGroup;
use glam::{Mat4, Vec3};

/// Components whose writes are versioned under a change group.
///
/// Write these through `SceneWorld::set` or `SceneWorld::modify` so the
/// transform cascade sees the change.
pub trait Tracked: hecs::Component {
    const GROUP: ChangeGroup;
}

/// Local translation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position(pub Vec3);

/// Local rotation as Euler angles `(roll, pitch, yaw)` in radians
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotation(pub Vec3);

/// Local scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale(pub Vec3);

impl Default for Scale {
    fn default() -> Self {
        Self(Vec3::ONE)
    }
}

impl Tracked for Position {
    const GROUP: ChangeGroup = ChangeGroup::TransformInputs;
}

impl Tracked for Rotation {
    const GROUP: ChangeGroup = ChangeGroup::TransformInputs;
}

impl Tracked for Scale {
    const GROUP: ChangeGroup = ChangeGroup::TransformInputs;
}

/// Resolved world matrix, written by the transform cascade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform(pub Mat4);

impl Default for Transform {
    fn default() -> Self {
        Self(Mat4::IDENTITY)
    }
}

impl Transform {
    pub fn translation(&self) -> Vec3 {
        self.0.w_axis.truncate()
    }
}

/// Marks an entity as a prefab: a source of shared components that is never
/// transformed or drawn itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Prefab;

/// Point the camera at a world-space target instead of using its rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAt {
    pub target: Vec3,
}

/// Point light; the position comes from the entity's Transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub color: Vec3,
}

/// Camera projection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in radians
        yfov: f32,
        /// Fixed aspect ratio; the viewport's when absent
        aspect_ratio: Option<f32>,
        znear: f32,
        /// Infinite far plane when absent
        zfar: Option<f32>,
    },
    Orthographic {
        xmag: f32,
        ymag: f32,
        znear: f32,
        zfar: f32,
    },
}

/// Camera component
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub projection: Projection,
}

impl Camera {
    /// Perspective camera that follows the viewport aspect ratio
    pub fn perspective(yfov: f32, znear: f32, zfar: f32) -> Self {
        Self {
            projection: Projection::Perspective {
                yfov,
                aspect_ratio: None,
                znear,
                zfar: Some(zfar),
            },
        }
    }

    /// Projection matrix (right-handed, depth 0..1) for a viewport aspect
    pub fn projection_matrix(&self, viewport_aspect: f32) -> Mat4 {
        match self.projection {
            Projection::Perspective {
                yfov,
                aspect_ratio,
                znear,
                zfar,
            } => {
                let aspect = aspect_ratio.unwrap_or(viewport_aspect);
                match zfar {
                    Some(zfar) => Mat4::perspective_rh(yfov, aspect, znear, zfar),
                    None => Mat4::perspective_infinite_rh(yfov, aspect, znear),
                }
            }
            Projection::Orthographic {
                xmag,
                ymag,
                znear,
                zfar,
            } => Mat4::orthographic_rh(-xmag, xmag, -ymag, ymag, znear, zfar),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perspective_uses_viewport_aspect() {
        let camera = Camera::perspective(45f32.to_radians(), 0.1, 100.0);
        let wide = camera.projection_matrix(16.0 / 9.0);
        let square = camera.projection_matrix(1.0);
        assert!(wide.x_axis.x < square.x_axis.x);
        assert_eq!(wide.y_axis.y, square.y_axis.y);
    }

    #[test]
    fn test_fixed_aspect_and_infinite_far() {
        let camera = Camera {
            projection: Projection::Perspective {
                yfov: 1.0,
                aspect_ratio: Some(2.0),
                znear: 0.5,
                zfar: None,
            },
        };
        assert_eq!(camera.projection_matrix(1.0), Mat4::perspective_infinite_rh(1.0, 2.0, 0.5));
    }

    #[test]
    fn test_transform_translation() {
        let t = Transform(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(t.translation(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(Transform::default().0, Mat4::IDENTITY);
    }
}
