//! View frustum geometry
//!
//! Transient per-frame data: recomputed from the camera matrices before each
//! use, never persisted across frames.

use glam::{Mat4, Vec3, Vec4};

/// Corners of the NDC cube, zero-to-one depth range (glam/wgpu convention).
const NDC_CORNERS: [[f32; 3]; 8] = [
    [-1.0, -1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [-1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0],
];

/// A camera's view volume: eye position plus 8 corner vertices
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewFrustum {
    position: Vec3,
    vertices: [Vec3; 8],
}

impl ViewFrustum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the eye position and corner vertices from the current
    /// camera matrices.
    pub fn update(&mut self, projection: Mat4, view: Mat4) {
        self.position = view.inverse().w_axis.truncate();
        let inverse_view_projection = (projection * view).inverse();
        for (vertex, ndc) in self.vertices.iter_mut().zip(NDC_CORNERS) {
            let unprojected =
                inverse_view_projection * Vec4::new(ndc[0], ndc[1], ndc[2], 1.0);
            *vertex = unprojected.truncate() / unprojected.w;
        }
    }

    /// The eye (apex) position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// The 8 corner vertices, near plane first.
    pub fn vertices(&self) -> &[Vec3; 8] {
        &self.vertices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Camera, Projection};
    use glam::Quat;

    fn contains(vertices: &[Vec3; 8], expected: Vec3) -> bool {
        vertices.iter().any(|v| v.abs_diff_eq(expected, 1e-3))
    }

    #[test]
    fn perspective_corners() {
        // 90 degree symmetric frustum looking down -Z: near corners at
        // (±1, ±1, -1), far corners at (±10, ±10, -10).
        let camera = Camera::new(
            Vec3::ZERO,
            Quat::IDENTITY,
            Projection::perspective(90.0, 1.0, 1.0, 10.0),
        );
        let mut frustum = ViewFrustum::new();
        frustum.update(camera.projection_matrix(), camera.view_matrix());

        assert!(frustum.position().abs_diff_eq(Vec3::ZERO, 1e-5));
        for x in [-1.0, 1.0] {
            for y in [-1.0, 1.0] {
                assert!(contains(frustum.vertices(), Vec3::new(x, y, -1.0)));
                assert!(contains(
                    frustum.vertices(),
                    Vec3::new(10.0 * x, 10.0 * y, -10.0)
                ));
            }
        }
    }

    #[test]
    fn tracks_camera_position() {
        let camera = Camera::new(
            Vec3::new(3.0, 4.0, 5.0),
            Quat::IDENTITY,
            Projection::perspective(60.0, 1.5, 0.5, 50.0),
        );
        let mut frustum = ViewFrustum::new();
        frustum.update(camera.projection_matrix(), camera.view_matrix());
        assert!(frustum.position().abs_diff_eq(camera.position, 1e-4));
    }
}
