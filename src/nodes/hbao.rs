//! Horizon-based ambient occlusion node
//!
//! Samples the depth buffer against a tiling noise texture and writes a
//! single-channel occlusion factor consumed by the lighting stage.

use glam::{UVec2, Vec2};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::backend::context::{FramebufferHandle, RenderContext, TextureHandle};
use crate::backend::types::*;
use crate::graph::{GraphError, GraphNode, GraphResult, NodeLifecycle};
use crate::material::{Material, RenderHost};
use crate::noise;
use crate::pipeline::{MaterialSlot, Pipeline, PipelineEnv, ViewportSlot};
use crate::scene::Camera;
use crate::uniform::UniformValue;

/// Texture unit for the upstream depth buffer.
const DEPTHS_UNIT: u32 = 0;
/// Texture unit for the owned noise texture.
const NOISE_UNIT: u32 = 1;

const OUTPUT_VIEWPORT: ViewportSlot = ViewportSlot(0);
const SCREEN_MATERIAL: MaterialSlot = MaterialSlot(0);

/// Per-frame attributes for [`HbaoNode`], populated by the host graph.
pub struct HbaoAttributes<'a> {
    pub camera: &'a Camera,
    pub output_size: UVec2,
    /// Noise tile width in texels. Defaults to 4.
    pub noise_size: Option<u32>,
}

/// Screen-space ambient occlusion graph node
pub struct HbaoNode {
    name: String,
    lifecycle: NodeLifecycle,
    noise_texture: TextureHandle,
    occlusions_output: TextureHandle,
    framebuffer: FramebufferHandle,
    material: Material,
    pipeline: Pipeline,
    output_size: UVec2,
    noise_size: u32,
    aspect_source: u32,
    rng: StdRng,
}

impl HbaoNode {
    pub const DEFAULT_NOISE_SIZE: u32 = 4;

    pub fn new(
        host: &dyn RenderHost,
        ctx: &mut dyn RenderContext,
        name: impl Into<String>,
    ) -> GraphResult<Self> {
        Self::with_rng(host, ctx, name, StdRng::from_os_rng())
    }

    /// Construct with an explicit generator for deterministic noise.
    pub fn with_rng(
        host: &dyn RenderHost,
        ctx: &mut dyn RenderContext,
        name: impl Into<String>,
        rng: StdRng,
    ) -> GraphResult<Self> {
        let name = name.into();
        let program = host
            .program("hbao")
            .ok_or_else(|| GraphError::MissingProgram("hbao".to_string()))?;

        let noise_texture = ctx.create_texture(&TextureDescriptor {
            label: Some(format!("{name}_noise")),
            format: TextureFormat::Rgb8,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            wrap_u: WrapMode::Repeat,
            wrap_v: WrapMode::Repeat,
            compare: None,
        })?;
        let occlusions_output = ctx.create_texture(&TextureDescriptor {
            label: Some(format!("{name}_occlusions")),
            format: TextureFormat::R8,
            ..TextureDescriptor::default()
        })?;
        let framebuffer =
            ctx.create_framebuffer(&[(AttachmentPoint::Color0, occlusions_output)])?;

        let mut material = Material::new(program);
        material.attach_texture(NOISE_UNIT, noise_texture);
        let uniforms = material.uniforms_mut();
        uniforms.set("projection", UniformValue::Vec2(Vec2::ZERO));
        uniforms.set("tanHalfFOV", UniformValue::Float(1.0));
        uniforms.set("aspectRatio", UniformValue::Float(1.0));
        uniforms.set("noiseScale", UniformValue::Vec2(Vec2::ONE));

        let pipeline = Pipeline::builder()
            .use_viewport(OUTPUT_VIEWPORT)
            .bind_framebuffer(framebuffer)
            .render_models(SCREEN_MATERIAL, vec![host.screen_mesh()])
            .unbind_framebuffer(framebuffer)
            .build();

        log::debug!("created HBAO node {name:?}");
        Ok(Self {
            name,
            lifecycle: NodeLifecycle::new(),
            noise_texture,
            occlusions_output,
            framebuffer,
            material,
            pipeline,
            output_size: UVec2::ZERO,
            noise_size: 0,
            aspect_source: DEPTHS_UNIT,
            rng,
        })
    }

    /// Texture unit whose dimensions drive the `aspectRatio` uniform.
    /// Defaults to the depths input.
    pub fn set_aspect_source(&mut self, unit: u32) {
        self.aspect_source = unit;
    }

    /// Input port "depths": the scene depth buffer sampled by the pass.
    pub fn set_depths_input(
        &mut self,
        ctx: &dyn RenderContext,
        texture: TextureHandle,
    ) -> GraphResult<()> {
        if !ctx.is_texture_created(texture) {
            return Err(GraphError::InputNotCreated("depths"));
        }
        self.material.attach_texture(DEPTHS_UNIT, texture);
        Ok(())
    }

    /// Output port "occlusions": valid after the first `render()`.
    pub fn occlusions_output(&self) -> TextureHandle {
        self.occlusions_output
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    fn update_camera(&mut self, camera: &Camera) {
        let uniforms = self.material.uniforms_mut();
        uniforms.set(
            "tanHalfFOV",
            UniformValue::Float((camera.fov_y() / 2.0).tan()),
        );
        uniforms.set(
            "projection",
            UniformValue::Vec2(camera.depth_linearization()),
        );
    }

    fn update_noise_size(&mut self, ctx: &mut dyn RenderContext, size: u32) -> GraphResult<()> {
        if size == self.noise_size {
            return Ok(());
        }
        let data = noise::generate_noise(&mut self.rng, size, 3);
        ctx.write_texture(self.noise_texture, &data, size, size)?;
        self.noise_size = size;
        self.refresh_noise_scale();
        log::debug!("{}: regenerated {size}x{size} noise tile", self.name);
        Ok(())
    }

    fn update_output_size(&mut self, ctx: &mut dyn RenderContext, size: UVec2) -> GraphResult<()> {
        if size == self.output_size {
            return Ok(());
        }
        ctx.resize_texture(self.occlusions_output, size.x, size.y)?;
        self.output_size = size;
        self.refresh_noise_scale();
        Ok(())
    }

    fn refresh_noise_scale(&mut self) {
        if self.noise_size > 0 {
            let scale = self.output_size.as_vec2() / self.noise_size as f32;
            self.material
                .uniforms_mut()
                .set("noiseScale", UniformValue::Vec2(scale));
        }
    }
}

impl GraphNode for HbaoNode {
    type Attributes<'a> = HbaoAttributes<'a>;

    fn name(&self) -> &str {
        &self.name
    }

    fn update(
        &mut self,
        ctx: &mut dyn RenderContext,
        attrs: &Self::Attributes<'_>,
    ) -> GraphResult<()> {
        self.lifecycle.begin_update()?;
        self.update_camera(attrs.camera);
        self.update_noise_size(ctx, attrs.noise_size.unwrap_or(Self::DEFAULT_NOISE_SIZE))?;
        self.update_output_size(ctx, attrs.output_size)?;
        Ok(())
    }

    fn render(&mut self, ctx: &mut dyn RenderContext) -> GraphResult<()> {
        self.lifecycle.begin_render()?;
        let depths = self
            .material
            .texture(self.aspect_source)
            .ok_or(GraphError::InputNotBound("depths"))?;
        let (width, height) = ctx.texture_size(depths)?;
        if width > 0 && height > 0 {
            self.material.uniforms_mut().set(
                "aspectRatio",
                UniformValue::Float(width as f32 / height as f32),
            );
        }

        let viewports = [Viewport::of_size(self.output_size)];
        let env = PipelineEnv {
            viewports: &viewports,
            cameras: &[],
            materials: &[&self.material],
            models: &[],
        };
        self.pipeline.run(ctx, &env)?;
        Ok(())
    }

    fn destroy(&mut self, ctx: &mut dyn RenderContext) -> GraphResult<()> {
        self.lifecycle.destroy()?;
        ctx.destroy_texture(self.noise_texture)?;
        ctx.destroy_framebuffer(self.framebuffer)?;
        ctx.destroy_texture(self.occlusions_output)?;
        Ok(())
    }
}
