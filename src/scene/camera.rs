//! Camera system

use glam::{Mat4, Quat, Vec2, Vec3};

use crate::pipeline::CameraMatrices;

/// Camera projection type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective {
            fov_y: std::f32::consts::FRAC_PI_4, // 45 degrees
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Projection::Perspective {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    /// Symmetric orthographic volume spanning ±half-extents on every axis.
    pub fn orthographic_extents(half_extents: Vec3) -> Self {
        Projection::Orthographic {
            left: -half_extents.x,
            right: half_extents.x,
            bottom: -half_extents.y,
            top: half_extents.y,
            near: -half_extents.z,
            far: half_extents.z,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        match self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(*fov_y, *aspect, *near, *far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::orthographic_rh(*left, *right, *bottom, *top, *near, *far),
        }
    }

    pub fn near(&self) -> f32 {
        match self {
            Projection::Perspective { near, .. } => *near,
            Projection::Orthographic { near, .. } => *near,
        }
    }

    pub fn far(&self) -> f32 {
        match self {
            Projection::Perspective { far, .. } => *far,
            Projection::Orthographic { far, .. } => *far,
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if let Projection::Perspective { aspect: a, .. } = self {
            *a = aspect;
        }
    }
}

/// Camera for viewing the scene
///
/// Orientation is a quaternion; the canonical forward axis is -Z.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Quat,
    pub projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            projection: Projection::default(),
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, rotation: Quat, projection: Projection) -> Self {
        Self {
            position,
            rotation,
            projection,
        }
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    /// Point the camera at a target, keeping the shortest-arc roll.
    pub fn look_at(&mut self, target: Vec3) {
        let direction = (target - self.position).normalize();
        self.rotation = Quat::from_rotation_arc(Vec3::NEG_Z, direction);
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position).inverse()
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    /// Get combined view-projection matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Get the forward direction
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Vertical field of view in radians; zero for orthographic cameras.
    pub fn fov_y(&self) -> f32 {
        match self.projection {
            Projection::Perspective { fov_y, .. } => fov_y,
            Projection::Orthographic { .. } => 0.0,
        }
    }

    /// Near and far plane distances.
    pub fn planes(&self) -> (f32, f32) {
        (self.projection.near(), self.projection.far())
    }

    /// Depth-reconstruction constant pair pushed as the `projection` uniform:
    /// `(far / (far - near), -far * near / (far - near))`.
    pub fn depth_linearization(&self) -> Vec2 {
        let (near, far) = self.planes();
        Vec2::new(far / (far - near), (-far * near) / (far - near))
    }

    /// Matrix pair consumed by pipeline camera slots.
    pub fn matrices(&self) -> CameraMatrices {
        CameraMatrices {
            view: self.view_matrix(),
            projection: self.projection_matrix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_camera_view_is_identity() {
        let camera = Camera::default();
        assert!(camera.view_matrix().abs_diff_eq(Mat4::IDENTITY, 1e-6));
        assert!(camera.forward().abs_diff_eq(Vec3::NEG_Z, 1e-6));
    }

    #[test]
    fn look_at_faces_target() {
        let mut camera = Camera::default();
        camera.set_position(Vec3::new(0.0, 0.0, 5.0));
        camera.look_at(Vec3::ZERO);
        assert!(camera.forward().abs_diff_eq(Vec3::NEG_Z, 1e-6));

        camera.look_at(Vec3::new(5.0, 0.0, 5.0));
        assert!(camera.forward().abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn depth_linearization_pair() {
        let camera = Camera::new(
            Vec3::ZERO,
            Quat::IDENTITY,
            Projection::perspective(90.0, 1.0, 1.0, 11.0),
        );
        let pair = camera.depth_linearization();
        assert!((pair.x - 1.1).abs() < 1e-6);
        assert!((pair.y + 1.1).abs() < 1e-6);
    }
}
