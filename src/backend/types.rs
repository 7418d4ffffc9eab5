//! Common types for the GPU context collaborator

use glam::UVec2;

/// Texture pixel format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8,
    Rg8,
    Rgb8,
    Rgba8,
    DepthComponent16,
    Depth32Float,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::DepthComponent16 | TextureFormat::Depth32Float
        )
    }

    pub fn components(&self) -> u32 {
        match self {
            TextureFormat::R8 | TextureFormat::DepthComponent16 | TextureFormat::Depth32Float => 1,
            TextureFormat::Rg8 => 2,
            TextureFormat::Rgb8 => 3,
            TextureFormat::Rgba8 => 4,
        }
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::Rg8 | TextureFormat::DepthComponent16 => 2,
            TextureFormat::Rgb8 => 3,
            TextureFormat::Rgba8 | TextureFormat::Depth32Float => 4,
        }
    }
}

/// Filter mode for texture sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Wrap mode for texture coordinates outside [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
    ClampToBorder,
}

/// Compare function for depth-compare sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Framebuffer attachment point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentPoint {
    Color0,
    Color1,
    Color2,
    Color3,
    Depth,
}

impl AttachmentPoint {
    pub fn is_depth(&self) -> bool {
        matches!(self, AttachmentPoint::Depth)
    }
}

/// Texture descriptor
///
/// Carries the fixed sampling state of a texture. Storage dimensions are not
/// part of the descriptor: they are set by the first upload or resize, and
/// changing them always reallocates.
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub format: TextureFormat,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub wrap_u: WrapMode,
    pub wrap_v: WrapMode,
    pub compare: Option<CompareFunction>,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            format: TextureFormat::Rgba8,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            wrap_u: WrapMode::ClampToEdge,
            wrap_v: WrapMode::ClampToEdge,
            compare: None,
        }
    }
}

/// Viewport rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn of_size(size: UVec2) -> Self {
        Self::new(size.x, size.y)
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }
}
