//! GPU context abstraction consumed by the graph nodes
//!
//! The render-graph host owns a live GPU context; the nodes only see this
//! object-safe trait. Real backends live with the host, the crate ships the
//! recording [`DummyContext`](crate::backend::dummy::DummyContext) used by
//! tests.

use crate::backend::types::*;
use crate::material::Material;
use crate::uniform::UniformValue;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("failed to create framebuffer: {0}")]
    FramebufferCreationFailed(String),
    #[error("attachment {point:?} is incompatible with texture format {format:?}")]
    AttachmentMismatch {
        point: AttachmentPoint,
        format: TextureFormat,
    },
    #[error("pixel payload size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("invalid or destroyed resource handle")]
    InvalidHandle,
    #[error("out of memory")]
    OutOfMemory,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub(crate) u64);

/// Handle to a compiled shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u64);

/// Handle to an uploaded mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub(crate) u64);

/// Object-safe GPU context trait
///
/// All operations are deterministic state transitions on the thread owning
/// the context; failures indicate programming or resource-exhaustion errors
/// and are never retried.
pub trait RenderContext {
    /// Create a texture with fixed sampling state and no storage yet.
    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    /// Reallocate texture storage at the given size, discarding previous
    /// contents. There is no in-place resize.
    fn resize_texture(
        &mut self,
        texture: TextureHandle,
        width: u32,
        height: u32,
    ) -> BackendResult<()>;

    /// Upload tightly packed pixel data, reallocating storage to the given
    /// size. The payload length must equal `width * height * bytes_per_pixel`.
    fn write_texture(
        &mut self,
        texture: TextureHandle,
        data: &[u8],
        width: u32,
        height: u32,
    ) -> BackendResult<()>;

    /// Current storage dimensions, `(0, 0)` before the first allocation.
    fn texture_size(&self, texture: TextureHandle) -> BackendResult<(u32, u32)>;

    /// Whether the handle refers to a live, created texture.
    fn is_texture_created(&self, texture: TextureHandle) -> bool;

    /// Release a texture. Destroying twice is an error.
    fn destroy_texture(&mut self, texture: TextureHandle) -> BackendResult<()>;

    /// Create a framebuffer from attachment-point bindings. Depth attachment
    /// points require a depth-format texture and color points a color format.
    fn create_framebuffer(
        &mut self,
        attachments: &[(AttachmentPoint, TextureHandle)],
    ) -> BackendResult<FramebufferHandle>;

    /// Release a framebuffer. Destroying twice is an error.
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) -> BackendResult<()>;

    /// Set the active viewport rectangle.
    fn set_viewport(&mut self, viewport: Viewport);

    /// Bind a framebuffer as the render target.
    fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle) -> BackendResult<()>;

    /// Unbind the framebuffer, restoring the default render target.
    fn unbind_framebuffer(&mut self, framebuffer: FramebufferHandle) -> BackendResult<()>;

    /// Clear the currently bound framebuffer (color and depth).
    fn clear(&mut self);

    /// Bind a material: its program, texture-unit bindings and uniform set.
    fn bind_material(&mut self, material: &Material) -> BackendResult<()>;

    /// Set a single uniform on the currently bound program.
    fn set_uniform(&mut self, name: &str, value: &UniformValue);

    /// Issue a draw call for a mesh with the current pipeline state.
    fn draw_mesh(&mut self, mesh: MeshHandle);
}
