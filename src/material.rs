//! Materials and the render-graph host seam

use crate::backend::context::{MeshHandle, ProgramHandle, TextureHandle};
use crate::uniform::UniformSet;

/// A shader program with its texture-unit bindings and uniform set
///
/// Each node exclusively owns its materials; upstream textures bound to
/// input units are borrows from the host graph, not transfers of ownership.
#[derive(Debug, Clone)]
pub struct Material {
    program: ProgramHandle,
    textures: Vec<(u32, TextureHandle)>,
    uniforms: UniformSet,
}

impl Material {
    pub fn new(program: ProgramHandle) -> Self {
        Self {
            program,
            textures: Vec::new(),
            uniforms: UniformSet::new(),
        }
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    /// Bind a texture to a fixed unit, replacing any previous binding.
    pub fn attach_texture(&mut self, unit: u32, texture: TextureHandle) {
        if let Some(entry) = self.textures.iter_mut().find(|(u, _)| *u == unit) {
            entry.1 = texture;
        } else {
            self.textures.push((unit, texture));
            self.textures.sort_by_key(|(u, _)| *u);
        }
    }

    pub fn texture(&self, unit: u32) -> Option<TextureHandle> {
        self.textures
            .iter()
            .find(|(u, _)| *u == unit)
            .map(|(_, t)| *t)
    }

    pub fn textures(&self) -> &[(u32, TextureHandle)] {
        &self.textures
    }

    pub fn uniforms(&self) -> &UniformSet {
        &self.uniforms
    }

    pub fn uniforms_mut(&mut self) -> &mut UniformSet {
        &mut self.uniforms
    }
}

/// The render-graph host collaborator
///
/// Nodes pull precompiled programs and the shared fullscreen mesh from the
/// host at construction time. A missing program aborts node creation.
pub trait RenderHost {
    fn program(&self, name: &str) -> Option<ProgramHandle>;
    fn screen_mesh(&self) -> MeshHandle;
}
