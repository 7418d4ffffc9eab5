//! Cameras, frustum geometry and scene models

mod camera;
mod fit;
mod frustum;

pub use camera::*;
pub use fit::*;
pub use frustum::*;

use glam::Mat4;

use crate::backend::context::MeshHandle;

/// A renderable mesh instance with its world transform
#[derive(Debug, Clone, Copy)]
pub struct Model {
    pub mesh: MeshHandle,
    pub transform: Mat4,
}

impl Model {
    pub fn new(mesh: MeshHandle) -> Self {
        Self {
            mesh,
            transform: Mat4::IDENTITY,
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }
}
