//! Orthographic light-camera fitting
//!
//! Computes a directional light camera whose orthographic view volume
//! tightly bounds a viewer camera's frustum, so every point the viewer can
//! see is covered by the shadow map.

use glam::{Mat3, Quat, Vec3};

use crate::scene::{Camera, Projection, ViewFrustum};

/// Result of fitting a light camera around a view frustum
#[derive(Debug, Clone, Copy)]
pub struct LightFit {
    /// World-space position of the light camera (center of the fitted box).
    pub position: Vec3,
    /// Orientation mapping canonical forward (-Z) onto the light direction.
    pub rotation: Quat,
    /// Half-extents of the fitted box along the light's local axes.
    pub half_extents: Vec3,
}

impl LightFit {
    /// The symmetric orthographic projection spanning the fitted box.
    pub fn projection(&self) -> Projection {
        Projection::orthographic_extents(self.half_extents)
    }

    /// The fitted light camera.
    pub fn camera(&self) -> Camera {
        Camera::new(self.position, self.rotation, self.projection())
    }
}

/// Fit an orthographic light camera around the given frustum.
///
/// The shortest-arc rotation is well-defined for any light direction,
/// including directions parallel or antiparallel to the canonical forward
/// axis; no singular-case branch is needed.
pub fn fit_orthographic(frustum: &ViewFrustum, light_direction: Vec3) -> LightFit {
    let rotation = Quat::from_rotation_arc(Vec3::NEG_Z, light_direction.normalize());
    // Inverse of a pure rotation, taking world points into the light's
    // axis-aligned local space.
    let axis_align = Mat3::from_quat(rotation).transpose();

    let eye = frustum.position();
    let mut low = Vec3::INFINITY;
    let mut high = Vec3::NEG_INFINITY;
    for &vertex in frustum.vertices() {
        let local = axis_align * (vertex - eye);
        low = low.min(local);
        high = high.max(local);
    }

    let half_extents = (high - low) / 2.0;
    let center = low + half_extents;
    let position = Mat3::from_quat(rotation) * center + eye;

    LightFit {
        position,
        rotation,
        half_extents,
    }
}
