//! Dummy GPU context for testing and development.
//!
//! This context doesn't perform actual GPU operations but tracks every
//! resource it hands out: storage dimensions, allocation and upload counts,
//! and the ordered stream of replayed pipeline calls. Tests use the counters
//! as the allocation probe for the dirty-check invariants.

use std::collections::HashMap;

use crate::backend::context::*;
use crate::backend::types::*;
use crate::material::{Material, RenderHost};
use crate::uniform::UniformValue;

/// Tracked state of a dummy texture.
#[derive(Debug)]
struct DummyTexture {
    desc: TextureDescriptor,
    width: u32,
    height: u32,
    allocations: u32,
    data: Option<Vec<u8>>,
}

/// One recorded pipeline-facing call.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextCall {
    SetViewport(Viewport),
    BindFramebuffer(FramebufferHandle),
    UnbindFramebuffer(FramebufferHandle),
    Clear,
    BindMaterial(ProgramHandle),
    SetUniform(String),
    DrawMesh(MeshHandle),
}

/// Dummy GPU context.
#[derive(Debug, Default)]
pub struct DummyContext {
    textures: HashMap<u64, DummyTexture>,
    framebuffers: HashMap<u64, Vec<(AttachmentPoint, TextureHandle)>>,
    next_handle: u64,
    allocation_count: u64,
    calls: Vec<ContextCall>,
}

impl DummyContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of texture storage allocations so far.
    pub fn allocation_count(&self) -> u64 {
        self.allocation_count
    }

    /// Storage allocations for one texture.
    pub fn texture_allocations(&self, texture: TextureHandle) -> Option<u32> {
        self.textures.get(&texture.0).map(|t| t.allocations)
    }

    /// Last uploaded pixel payload for a texture, if any.
    pub fn texture_data(&self, texture: TextureHandle) -> Option<&[u8]> {
        self.textures
            .get(&texture.0)
            .and_then(|t| t.data.as_deref())
    }

    /// The ordered call stream recorded since the last [`Self::reset_calls`].
    pub fn calls(&self) -> &[ContextCall] {
        &self.calls
    }

    pub fn reset_calls(&mut self) {
        self.calls.clear();
    }

    fn texture_mut(&mut self, texture: TextureHandle) -> BackendResult<&mut DummyTexture> {
        self.textures
            .get_mut(&texture.0)
            .ok_or(BackendError::InvalidHandle)
    }

    fn issue_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl RenderContext for DummyContext {
    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let handle = self.issue_handle();
        log::trace!(
            "DummyContext: creating texture {:?} ({:?})",
            desc.label,
            desc.format
        );
        self.textures.insert(
            handle,
            DummyTexture {
                desc: desc.clone(),
                width: 0,
                height: 0,
                allocations: 0,
                data: None,
            },
        );
        Ok(TextureHandle(handle))
    }

    fn resize_texture(
        &mut self,
        texture: TextureHandle,
        width: u32,
        height: u32,
    ) -> BackendResult<()> {
        let entry = self.texture_mut(texture)?;
        log::trace!(
            "DummyContext: reallocating texture {:?} to {}x{}",
            entry.desc.label,
            width,
            height
        );
        entry.width = width;
        entry.height = height;
        entry.allocations += 1;
        entry.data = None;
        self.allocation_count += 1;
        Ok(())
    }

    fn write_texture(
        &mut self,
        texture: TextureHandle,
        data: &[u8],
        width: u32,
        height: u32,
    ) -> BackendResult<()> {
        let entry = self.texture_mut(texture)?;
        let expected = (width * height * entry.desc.format.bytes_per_pixel()) as usize;
        if data.len() != expected {
            return Err(BackendError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        entry.width = width;
        entry.height = height;
        entry.allocations += 1;
        entry.data = Some(data.to_vec());
        self.allocation_count += 1;
        Ok(())
    }

    fn texture_size(&self, texture: TextureHandle) -> BackendResult<(u32, u32)> {
        self.textures
            .get(&texture.0)
            .map(|t| (t.width, t.height))
            .ok_or(BackendError::InvalidHandle)
    }

    fn is_texture_created(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(&texture.0)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) -> BackendResult<()> {
        self.textures
            .remove(&texture.0)
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle)
    }

    fn create_framebuffer(
        &mut self,
        attachments: &[(AttachmentPoint, TextureHandle)],
    ) -> BackendResult<FramebufferHandle> {
        for &(point, texture) in attachments {
            let entry = self
                .textures
                .get(&texture.0)
                .ok_or(BackendError::InvalidHandle)?;
            if point.is_depth() != entry.desc.format.is_depth() {
                return Err(BackendError::AttachmentMismatch {
                    point,
                    format: entry.desc.format,
                });
            }
        }
        let handle = self.issue_handle();
        self.framebuffers.insert(handle, attachments.to_vec());
        Ok(FramebufferHandle(handle))
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) -> BackendResult<()> {
        self.framebuffers
            .remove(&framebuffer.0)
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle)
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.calls.push(ContextCall::SetViewport(viewport));
    }

    fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle) -> BackendResult<()> {
        if !self.framebuffers.contains_key(&framebuffer.0) {
            return Err(BackendError::InvalidHandle);
        }
        self.calls.push(ContextCall::BindFramebuffer(framebuffer));
        Ok(())
    }

    fn unbind_framebuffer(&mut self, framebuffer: FramebufferHandle) -> BackendResult<()> {
        if !self.framebuffers.contains_key(&framebuffer.0) {
            return Err(BackendError::InvalidHandle);
        }
        self.calls.push(ContextCall::UnbindFramebuffer(framebuffer));
        Ok(())
    }

    fn clear(&mut self) {
        self.calls.push(ContextCall::Clear);
    }

    fn bind_material(&mut self, material: &Material) -> BackendResult<()> {
        for &(_, texture) in material.textures() {
            if !self.is_texture_created(texture) {
                return Err(BackendError::InvalidHandle);
            }
        }
        self.calls.push(ContextCall::BindMaterial(material.program()));
        Ok(())
    }

    fn set_uniform(&mut self, name: &str, _value: &UniformValue) {
        self.calls.push(ContextCall::SetUniform(name.to_string()));
    }

    fn draw_mesh(&mut self, mesh: MeshHandle) {
        self.calls.push(ContextCall::DrawMesh(mesh));
    }
}

/// Dummy render-graph host: hands out program and mesh handles by name.
#[derive(Debug)]
pub struct DummyHost {
    programs: HashMap<String, ProgramHandle>,
    screen: MeshHandle,
    next_handle: u64,
}

impl DummyHost {
    pub fn new() -> Self {
        Self {
            programs: HashMap::new(),
            screen: MeshHandle(0),
            next_handle: 1,
        }
    }

    pub fn register_program(&mut self, name: &str) -> ProgramHandle {
        let handle = ProgramHandle(self.next_handle);
        self.next_handle += 1;
        self.programs.insert(name.to_string(), handle);
        handle
    }

    pub fn create_mesh(&mut self) -> MeshHandle {
        let handle = MeshHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

impl Default for DummyHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderHost for DummyHost {
    fn program(&self, name: &str) -> Option<ProgramHandle> {
        self.programs.get(name).copied()
    }

    fn screen_mesh(&self) -> MeshHandle {
        self.screen
    }
}
