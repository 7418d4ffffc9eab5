//! Precompiled render pipelines
//!
//! A pipeline is an immutable, ordered list of stages built once at node
//! construction and replayed every frame. Stages carry no conditional
//! branching; all per-frame variation comes in through [`PipelineEnv`]
//! (viewport values, camera matrices, materials, scene models) and through
//! uniform/texture mutation done before the replay.

use glam::Mat4;
use thiserror::Error;

use crate::backend::context::{BackendError, FramebufferHandle, MeshHandle, RenderContext};
use crate::backend::types::Viewport;
use crate::material::Material;
use crate::scene::Model;

/// Pipeline replay error type
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("pipeline stage referenced an unbound environment slot")]
    UnboundSlot,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Index into [`PipelineEnv::viewports`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSlot(pub usize);

/// Index into [`PipelineEnv::cameras`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraSlot(pub usize);

/// Index into [`PipelineEnv::materials`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialSlot(pub usize);

/// View and projection matrices selected by a `UseCamera` stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
}

/// Per-frame data the stages index into during a replay
pub struct PipelineEnv<'a> {
    pub viewports: &'a [Viewport],
    pub cameras: &'a [CameraMatrices],
    pub materials: &'a [&'a Material],
    pub models: &'a [Model],
}

/// A custom stage executing arbitrary GPU commands during the replay
pub trait PipelineAction {
    fn execute(
        &self,
        ctx: &mut dyn RenderContext,
        env: &PipelineEnv,
        camera: Option<&CameraMatrices>,
    ) -> PipelineResult<()>;
}

enum Stage {
    UseViewport(ViewportSlot),
    UseCamera(CameraSlot),
    BindFramebuffer(FramebufferHandle),
    UnbindFramebuffer(FramebufferHandle),
    Clear,
    Action(Box<dyn PipelineAction>),
    RenderModels {
        material: MaterialSlot,
        meshes: Vec<MeshHandle>,
    },
}

/// An immutable, replayable sequence of GPU operations
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Replay every stage in order against the live context.
    pub fn run(&self, ctx: &mut dyn RenderContext, env: &PipelineEnv) -> PipelineResult<()> {
        let mut camera: Option<&CameraMatrices> = None;
        for stage in &self.stages {
            match stage {
                Stage::UseViewport(slot) => {
                    let viewport = env
                        .viewports
                        .get(slot.0)
                        .ok_or(PipelineError::UnboundSlot)?;
                    ctx.set_viewport(*viewport);
                }
                Stage::UseCamera(slot) => {
                    camera = Some(env.cameras.get(slot.0).ok_or(PipelineError::UnboundSlot)?);
                }
                Stage::BindFramebuffer(framebuffer) => {
                    ctx.bind_framebuffer(*framebuffer)?;
                }
                Stage::UnbindFramebuffer(framebuffer) => {
                    ctx.unbind_framebuffer(*framebuffer)?;
                }
                Stage::Clear => ctx.clear(),
                Stage::Action(action) => action.execute(ctx, env, camera)?,
                Stage::RenderModels { material, meshes } => {
                    let material = env
                        .materials
                        .get(material.0)
                        .ok_or(PipelineError::UnboundSlot)?;
                    ctx.bind_material(material)?;
                    for mesh in meshes {
                        ctx.draw_mesh(*mesh);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Builder producing an immutable [`Pipeline`]
pub struct PipelineBuilder {
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn use_viewport(mut self, slot: ViewportSlot) -> Self {
        self.stages.push(Stage::UseViewport(slot));
        self
    }

    pub fn use_camera(mut self, slot: CameraSlot) -> Self {
        self.stages.push(Stage::UseCamera(slot));
        self
    }

    pub fn bind_framebuffer(mut self, framebuffer: FramebufferHandle) -> Self {
        self.stages.push(Stage::BindFramebuffer(framebuffer));
        self
    }

    pub fn unbind_framebuffer(mut self, framebuffer: FramebufferHandle) -> Self {
        self.stages.push(Stage::UnbindFramebuffer(framebuffer));
        self
    }

    pub fn clear_buffer(mut self) -> Self {
        self.stages.push(Stage::Clear);
        self
    }

    pub fn action<A: PipelineAction + 'static>(mut self, action: A) -> Self {
        self.stages.push(Stage::Action(Box::new(action)));
        self
    }

    pub fn render_models(mut self, material: MaterialSlot, meshes: Vec<MeshHandle>) -> Self {
        self.stages.push(Stage::RenderModels { material, meshes });
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
