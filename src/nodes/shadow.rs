//! Directional shadow mapping node
//!
//! Two-stage pipeline replayed each frame: render the shadow casters into a
//! depth map from a fitted orthographic light camera, then resolve a
//! single-channel shadow factor in screen space against the scene depth and
//! normal buffers.

use glam::{Mat4, UVec2, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::backend::context::{FramebufferHandle, RenderContext, TextureHandle};
use crate::backend::types::*;
use crate::graph::{GraphError, GraphNode, GraphResult, NodeLifecycle};
use crate::material::{Material, RenderHost};
use crate::noise;
use crate::pipeline::{
    CameraMatrices, CameraSlot, MaterialSlot, Pipeline, PipelineAction, PipelineEnv,
    PipelineResult, ViewportSlot,
};
use crate::scene::{fit_orthographic, Camera, Model, ViewFrustum};
use crate::uniform::UniformValue;

/// Default sun direction used when the host supplies none.
pub const DEFAULT_LIGHT_DIRECTION: Vec3 = Vec3::new(0.0, -0.6, -0.8);

/// Texture unit for the upstream normal buffer.
const NORMALS_UNIT: u32 = 0;
/// Texture unit for the upstream depth buffer.
const DEPTHS_UNIT: u32 = 1;
/// Texture unit for the owned light-depth map.
const LIGHT_DEPTHS_UNIT: u32 = 2;
/// Texture unit for the owned noise texture.
const NOISE_UNIT: u32 = 3;

const SHADOW_MAP_VIEWPORT: ViewportSlot = ViewportSlot(0);
const OUTPUT_VIEWPORT: ViewportSlot = ViewportSlot(1);
const LIGHT_CAMERA: CameraSlot = CameraSlot(0);
const SCREEN_MATERIAL: MaterialSlot = MaterialSlot(0);
const CASTER_MATERIAL: MaterialSlot = MaterialSlot(1);

/// Shadow-pass configuration
///
/// The screen-resolve program name varies between shadow node flavors (the
/// plain node and quality variants share everything else), so it is carried
/// as configuration rather than a node subtype.
#[derive(Debug, Clone)]
pub struct ShadowPassConfig {
    /// Screen-resolve shader program. Defaults to "shadow".
    pub program: String,
}

impl Default for ShadowPassConfig {
    fn default() -> Self {
        Self {
            program: "shadow".to_string(),
        }
    }
}

/// Per-frame attributes for [`ShadowMappingNode`], populated by the host.
pub struct ShadowAttributes<'a> {
    pub camera: &'a Camera,
    pub output_size: UVec2,
    /// Shadow map resolution. Defaults to 1024x1024.
    pub shadow_map_size: Option<UVec2>,
    /// Sampling kernel element count. Defaults to 8.
    pub kernel_size: Option<usize>,
    /// Sampling radius. Defaults to 0.05.
    pub radius: Option<f32>,
    /// Depth-compare bias. Defaults to 0.01.
    pub bias: Option<f32>,
    /// Noise tile width in texels. Defaults to 2.
    pub noise_size: Option<u32>,
    /// Light direction. Defaults to [`DEFAULT_LIGHT_DIRECTION`].
    pub light_direction: Option<Vec3>,
    /// Shadow casters rendered into the depth map. Defaults to none.
    pub models: &'a [Model],
}

/// Directional shadow mapping graph node
pub struct ShadowMappingNode {
    name: String,
    lifecycle: NodeLifecycle,
    light_depths_texture: TextureHandle,
    noise_texture: TextureHandle,
    shadows_output: TextureHandle,
    depth_framebuffer: FramebufferHandle,
    framebuffer: FramebufferHandle,
    material: Material,
    caster_material: Material,
    pipeline: Pipeline,
    shadow_map_size: UVec2,
    output_size: UVec2,
    noise_size: u32,
    kernel_size: usize,
    light_direction: Vec3,
    light_camera: Camera,
    viewer_view: Mat4,
    viewer_projection: Mat4,
    frustum: ViewFrustum,
    models: Vec<Model>,
    aspect_source: u32,
    rng: StdRng,
}

impl ShadowMappingNode {
    pub const DEFAULT_SHADOW_MAP_SIZE: UVec2 = UVec2::new(1024, 1024);
    pub const DEFAULT_KERNEL_SIZE: usize = 8;
    pub const DEFAULT_RADIUS: f32 = 0.05;
    pub const DEFAULT_BIAS: f32 = 0.01;
    pub const DEFAULT_NOISE_SIZE: u32 = 2;

    pub fn new(
        host: &dyn RenderHost,
        ctx: &mut dyn RenderContext,
        name: impl Into<String>,
    ) -> GraphResult<Self> {
        Self::with_config(
            host,
            ctx,
            name,
            ShadowPassConfig::default(),
            StdRng::from_os_rng(),
        )
    }

    /// Construct with an explicit pass configuration and generator.
    pub fn with_config(
        host: &dyn RenderHost,
        ctx: &mut dyn RenderContext,
        name: impl Into<String>,
        config: ShadowPassConfig,
        rng: StdRng,
    ) -> GraphResult<Self> {
        let name = name.into();
        let program = host
            .program(&config.program)
            .ok_or_else(|| GraphError::MissingProgram(config.program.clone()))?;
        let caster_program = host
            .program("basic")
            .ok_or_else(|| GraphError::MissingProgram("basic".to_string()))?;

        let light_depths_texture = ctx.create_texture(&TextureDescriptor {
            label: Some(format!("{name}_light_depths")),
            format: TextureFormat::DepthComponent16,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            wrap_u: WrapMode::ClampToBorder,
            wrap_v: WrapMode::ClampToBorder,
            compare: Some(CompareFunction::Less),
        })?;
        let noise_texture = ctx.create_texture(&TextureDescriptor {
            label: Some(format!("{name}_noise")),
            format: TextureFormat::Rg8,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            wrap_u: WrapMode::Repeat,
            wrap_v: WrapMode::Repeat,
            compare: None,
        })?;
        let shadows_output = ctx.create_texture(&TextureDescriptor {
            label: Some(format!("{name}_shadows")),
            format: TextureFormat::R8,
            ..TextureDescriptor::default()
        })?;
        let depth_framebuffer =
            ctx.create_framebuffer(&[(AttachmentPoint::Depth, light_depths_texture)])?;
        let framebuffer = ctx.create_framebuffer(&[(AttachmentPoint::Color0, shadows_output)])?;

        let mut material = Material::new(program);
        material.attach_texture(LIGHT_DEPTHS_UNIT, light_depths_texture);
        material.attach_texture(NOISE_UNIT, noise_texture);
        let uniforms = material.uniforms_mut();
        uniforms.set("projection", UniformValue::Vec2(Vec2::ZERO));
        uniforms.set("viewMatrix", UniformValue::Mat4(Mat4::IDENTITY));
        uniforms.set("inverseViewMatrix", UniformValue::Mat4(Mat4::IDENTITY));
        uniforms.set("tanHalfFOV", UniformValue::Float(1.0));
        uniforms.set("aspectRatio", UniformValue::Float(1.0));
        uniforms.set("lightDirection", UniformValue::Vec3(DEFAULT_LIGHT_DIRECTION));
        uniforms.set("lightViewMatrix", UniformValue::Mat4(Mat4::IDENTITY));
        uniforms.set("lightProjectionMatrix", UniformValue::Mat4(Mat4::IDENTITY));
        uniforms.set("kernelSize", UniformValue::Int(0));
        uniforms.set("kernel", UniformValue::Vec2Array(Vec::new()));
        uniforms.set("noiseScale", UniformValue::Vec2(Vec2::ONE));
        uniforms.set("bias", UniformValue::Float(Self::DEFAULT_BIAS));
        uniforms.set("radius", UniformValue::Float(Self::DEFAULT_RADIUS));

        let caster_material = Material::new(caster_program);

        let pipeline = Pipeline::builder()
            .use_viewport(SHADOW_MAP_VIEWPORT)
            .use_camera(LIGHT_CAMERA)
            .bind_framebuffer(depth_framebuffer)
            .clear_buffer()
            .action(RenderShadowCastersAction {
                material: CASTER_MATERIAL,
            })
            .use_viewport(OUTPUT_VIEWPORT)
            .bind_framebuffer(framebuffer)
            .render_models(SCREEN_MATERIAL, vec![host.screen_mesh()])
            .unbind_framebuffer(framebuffer)
            .build();

        log::debug!("created shadow mapping node {name:?}");
        Ok(Self {
            name,
            lifecycle: NodeLifecycle::new(),
            light_depths_texture,
            noise_texture,
            shadows_output,
            depth_framebuffer,
            framebuffer,
            material,
            caster_material,
            pipeline,
            shadow_map_size: UVec2::ZERO,
            output_size: UVec2::ZERO,
            noise_size: 0,
            kernel_size: 0,
            light_direction: DEFAULT_LIGHT_DIRECTION,
            light_camera: Camera::default(),
            viewer_view: Mat4::IDENTITY,
            viewer_projection: Mat4::IDENTITY,
            frustum: ViewFrustum::new(),
            models: Vec::new(),
            aspect_source: DEPTHS_UNIT,
            rng,
        })
    }

    /// Texture unit whose dimensions drive the `aspectRatio` uniform.
    /// Defaults to the depths input.
    pub fn set_aspect_source(&mut self, unit: u32) {
        self.aspect_source = unit;
    }

    /// Input port "normals": the scene normal buffer.
    pub fn set_normals_input(
        &mut self,
        ctx: &dyn RenderContext,
        texture: TextureHandle,
    ) -> GraphResult<()> {
        if !ctx.is_texture_created(texture) {
            return Err(GraphError::InputNotCreated("normals"));
        }
        self.material.attach_texture(NORMALS_UNIT, texture);
        Ok(())
    }

    /// Input port "depths": the scene depth buffer.
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

    /// Output port "shadows": valid after the first `render()`.
    pub fn shadows_output(&self) -> TextureHandle {
        self.shadows_output
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    /// The fitted light camera from the most recent `render()`.
    pub fn light_camera(&self) -> &Camera {
        &self.light_camera
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
        self.viewer_view = camera.view_matrix();
        self.viewer_projection = camera.projection_matrix();
    }

    fn update_shadow_map_size(
        &mut self,
        ctx: &mut dyn RenderContext,
        size: UVec2,
    ) -> GraphResult<()> {
        if size == self.shadow_map_size {
            return Ok(());
        }
        ctx.resize_texture(self.light_depths_texture, size.x, size.y)?;
        self.shadow_map_size = size;
        log::debug!("{}: shadow map resized to {}x{}", self.name, size.x, size.y);
        Ok(())
    }

    fn update_kernel_size(&mut self, size: usize) {
        if size == self.kernel_size {
            return;
        }
        let kernel = noise::generate_kernel(&mut self.rng, size);
        let uniforms = self.material.uniforms_mut();
        uniforms.set("kernelSize", UniformValue::Int(size as i32));
        uniforms.set("kernel", UniformValue::Vec2Array(kernel));
        self.kernel_size = size;
        log::debug!("{}: regenerated {size}-element kernel", self.name);
    }

    fn update_noise_size(&mut self, ctx: &mut dyn RenderContext, size: u32) -> GraphResult<()> {
        if size == self.noise_size {
            return Ok(());
        }
        let data = noise::generate_noise(&mut self.rng, size, 2);
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
        ctx.resize_texture(self.shadows_output, size.x, size.y)?;
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

    /// Refit the light camera so shadows cover the whole viewer frustum and
    /// publish its matrices.
    fn update_light_camera(&mut self) {
        self.frustum.update(self.viewer_projection, self.viewer_view);
        let fit = fit_orthographic(&self.frustum, self.light_direction);
        self.light_camera = fit.camera();

        let uniforms = self.material.uniforms_mut();
        uniforms.set("lightDirection", UniformValue::Vec3(self.light_direction));
        uniforms.set(
            "lightViewMatrix",
            UniformValue::Mat4(self.light_camera.view_matrix()),
        );
        uniforms.set(
            "lightProjectionMatrix",
            UniformValue::Mat4(self.light_camera.projection_matrix()),
        );
    }
}

impl GraphNode for ShadowMappingNode {
    type Attributes<'a> = ShadowAttributes<'a>;

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
        self.update_shadow_map_size(
            ctx,
            attrs.shadow_map_size.unwrap_or(Self::DEFAULT_SHADOW_MAP_SIZE),
        )?;
        self.update_kernel_size(attrs.kernel_size.unwrap_or(Self::DEFAULT_KERNEL_SIZE));
        {
            let uniforms = self.material.uniforms_mut();
            uniforms.set(
                "radius",
                UniformValue::Float(attrs.radius.unwrap_or(Self::DEFAULT_RADIUS)),
            );
            uniforms.set(
                "bias",
                UniformValue::Float(attrs.bias.unwrap_or(Self::DEFAULT_BIAS)),
            );
        }
        self.update_noise_size(ctx, attrs.noise_size.unwrap_or(Self::DEFAULT_NOISE_SIZE))?;
        self.update_output_size(ctx, attrs.output_size)?;
        self.light_direction = attrs
            .light_direction
            .unwrap_or(DEFAULT_LIGHT_DIRECTION)
            .normalize();
        self.models.clear();
        self.models.extend_from_slice(attrs.models);
        Ok(())
    }

    fn render(&mut self, ctx: &mut dyn RenderContext) -> GraphResult<()> {
        self.lifecycle.begin_render()?;
        if self.material.texture(NORMALS_UNIT).is_none() {
            return Err(GraphError::InputNotBound("normals"));
        }
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

        self.update_light_camera();
        {
            let uniforms = self.material.uniforms_mut();
            uniforms.set("viewMatrix", UniformValue::Mat4(self.viewer_view));
            uniforms.set(
                "inverseViewMatrix",
                UniformValue::Mat4(self.viewer_view.inverse()),
            );
        }

        let viewports = [
            Viewport::of_size(self.shadow_map_size),
            Viewport::of_size(self.output_size),
        ];
        let cameras = [self.light_camera.matrices()];
        let env = PipelineEnv {
            viewports: &viewports,
            cameras: &cameras,
            materials: &[&self.material, &self.caster_material],
            models: &self.models,
        };
        self.pipeline.run(ctx, &env)?;
        Ok(())
    }

    fn destroy(&mut self, ctx: &mut dyn RenderContext) -> GraphResult<()> {
        self.lifecycle.destroy()?;
        ctx.destroy_texture(self.light_depths_texture)?;
        ctx.destroy_texture(self.noise_texture)?;
        ctx.destroy_framebuffer(self.depth_framebuffer)?;
        ctx.destroy_framebuffer(self.framebuffer)?;
        ctx.destroy_texture(self.shadows_output)?;
        Ok(())
    }
}

/// Renders the shadow casters into the bound depth framebuffer, uploading
/// the light camera matrices once and the model matrix per draw.
struct RenderShadowCastersAction {
    material: MaterialSlot,
}

impl PipelineAction for RenderShadowCastersAction {
    fn execute(
        &self,
        ctx: &mut dyn RenderContext,
        env: &PipelineEnv,
        camera: Option<&CameraMatrices>,
    ) -> PipelineResult<()> {
        let material = env
            .materials
            .get(self.material.0)
            .ok_or(crate::pipeline::PipelineError::UnboundSlot)?;
        ctx.bind_material(material)?;
        if let Some(camera) = camera {
            ctx.set_uniform("projectionMatrix", &UniformValue::Mat4(camera.projection));
            ctx.set_uniform("viewMatrix", &UniformValue::Mat4(camera.view));
        }
        for model in env.models {
            ctx.set_uniform("modelMatrix", &UniformValue::Mat4(model.transform));
            ctx.draw_mesh(model.mesh);
        }
        Ok(())
    }
}
