//! Integration tests for the HBAO and shadow mapping nodes.
//!
//! All tests run against the recording [`DummyContext`], using its
//! allocation counters as the probe for the dirty-check invariants and its
//! call stream for pipeline replay order.

use glam::{Quat, UVec2, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rstest::rstest;

use render_nodes::backend::dummy::{ContextCall, DummyContext, DummyHost};
use render_nodes::backend::{
    AttachmentPoint, FilterMode, RenderContext, TextureDescriptor, TextureFormat, TextureHandle,
};
use render_nodes::nodes::{
    HbaoAttributes, HbaoNode, ShadowAttributes, ShadowMappingNode, ShadowPassConfig,
};
use render_nodes::{Camera, GraphError, GraphNode, Model, Projection};

fn rig() -> (DummyHost, DummyContext) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut host = DummyHost::new();
    host.register_program("hbao");
    host.register_program("shadow");
    host.register_program("basic");
    (host, DummyContext::new())
}

fn viewer_camera() -> Camera {
    Camera::new(
        Vec3::new(0.0, 2.0, 5.0),
        Quat::IDENTITY,
        Projection::perspective(90.0, 1.0, 1.0, 100.0),
    )
}

/// Create an input texture with allocated storage.
fn input_texture(
    ctx: &mut DummyContext,
    format: TextureFormat,
    width: u32,
    height: u32,
) -> TextureHandle {
    let texture = ctx
        .create_texture(&TextureDescriptor {
            label: Some("test_input".to_string()),
            format,
            ..TextureDescriptor::default()
        })
        .unwrap();
    ctx.resize_texture(texture, width, height).unwrap();
    texture
}

fn hbao_node(host: &DummyHost, ctx: &mut DummyContext) -> HbaoNode {
    HbaoNode::with_rng(host, ctx, "hbao", StdRng::seed_from_u64(1)).unwrap()
}

fn shadow_node(host: &DummyHost, ctx: &mut DummyContext) -> ShadowMappingNode {
    ShadowMappingNode::with_config(
        host,
        ctx,
        "shadows",
        ShadowPassConfig::default(),
        StdRng::seed_from_u64(1),
    )
    .unwrap()
}

fn hbao_attrs(camera: &Camera) -> HbaoAttributes<'_> {
    HbaoAttributes {
        camera,
        output_size: UVec2::new(512, 512),
        noise_size: Some(4),
    }
}

fn shadow_attrs<'a>(camera: &'a Camera, models: &'a [Model]) -> ShadowAttributes<'a> {
    ShadowAttributes {
        camera,
        output_size: UVec2::new(512, 512),
        shadow_map_size: Some(UVec2::new(1024, 1024)),
        kernel_size: Some(8),
        radius: None,
        bias: None,
        noise_size: None,
        light_direction: None,
        models,
    }
}

// ============================================================================
// HBAO node
// ============================================================================

#[test]
fn hbao_repeated_update_skips_reallocation() {
    let (host, mut ctx) = rig();
    let mut node = hbao_node(&host, &mut ctx);
    let camera = viewer_camera();

    node.update(&mut ctx, &hbao_attrs(&camera)).unwrap();
    let after_first = ctx.allocation_count();
    assert!(after_first > 0);

    node.update(&mut ctx, &hbao_attrs(&camera)).unwrap();
    assert_eq!(ctx.allocation_count(), after_first);

    // A changed output size reallocates the output texture exactly once.
    node.update(
        &mut ctx,
        &HbaoAttributes {
            output_size: UVec2::new(1024, 768),
            ..hbao_attrs(&camera)
        },
    )
    .unwrap();
    assert_eq!(ctx.allocation_count(), after_first + 1);
}

#[rstest]
#[case(2)]
#[case(4)]
#[case(8)]
fn hbao_noise_buffer_matches_requested_size(#[case] noise_size: u32) {
    let (host, mut ctx) = rig();
    let mut node = hbao_node(&host, &mut ctx);
    let camera = viewer_camera();

    node.update(
        &mut ctx,
        &HbaoAttributes {
            noise_size: Some(noise_size),
            ..hbao_attrs(&camera)
        },
    )
    .unwrap();

    // Rgb8 noise: three bytes per texel.
    let noise = node.material().texture(1).unwrap();
    let data = ctx.texture_data(noise).unwrap();
    assert_eq!(data.len(), (noise_size * noise_size * 3) as usize);
}

#[test]
fn hbao_render_replays_pipeline_and_tracks_aspect() {
    let (host, mut ctx) = rig();
    let mut node = hbao_node(&host, &mut ctx);
    let camera = viewer_camera();

    let depths = input_texture(&mut ctx, TextureFormat::Depth32Float, 800, 600);
    node.set_depths_input(&ctx, depths).unwrap();
    node.update(&mut ctx, &hbao_attrs(&camera)).unwrap();

    ctx.reset_calls();
    node.render(&mut ctx).unwrap();

    let aspect = node
        .material()
        .uniforms()
        .get("aspectRatio")
        .and_then(|v| v.as_float())
        .unwrap();
    assert!((aspect - 800.0 / 600.0).abs() < 1e-6);

    let calls = ctx.calls();
    assert_eq!(calls.len(), 5);
    assert!(matches!(calls[0], ContextCall::SetViewport(v) if v.width == 512 && v.height == 512));
    assert!(matches!(calls[1], ContextCall::BindFramebuffer(_)));
    assert!(matches!(calls[2], ContextCall::BindMaterial(_)));
    assert!(matches!(calls[3], ContextCall::DrawMesh(_)));
    assert!(matches!(calls[4], ContextCall::UnbindFramebuffer(_)));
}

#[test]
fn hbao_render_without_depths_input_fails() {
    let (host, mut ctx) = rig();
    let mut node = hbao_node(&host, &mut ctx);
    let camera = viewer_camera();

    node.update(&mut ctx, &hbao_attrs(&camera)).unwrap();
    assert!(matches!(
        node.render(&mut ctx),
        Err(GraphError::InputNotBound("depths"))
    ));
}

#[test]
fn hbao_rejects_uncreated_input() {
    let (host, mut ctx) = rig();
    let mut node = hbao_node(&host, &mut ctx);

    let stale = input_texture(&mut ctx, TextureFormat::Depth32Float, 4, 4);
    ctx.destroy_texture(stale).unwrap();
    assert!(matches!(
        node.set_depths_input(&ctx, stale),
        Err(GraphError::InputNotCreated("depths"))
    ));
}

#[test]
fn hbao_missing_program_aborts_construction() {
    let _ = env_logger::builder().is_test(true).try_init();
    let host = DummyHost::new();
    let mut ctx = DummyContext::new();
    assert!(matches!(
        HbaoNode::new(&host, &mut ctx, "hbao"),
        Err(GraphError::MissingProgram(_))
    ));
}

#[test]
fn hbao_noise_scale_tracks_output_and_noise_size() {
    let (host, mut ctx) = rig();
    let mut node = hbao_node(&host, &mut ctx);
    let camera = viewer_camera();

    node.update(&mut ctx, &hbao_attrs(&camera)).unwrap();
    let scale = node
        .material()
        .uniforms()
        .get("noiseScale")
        .and_then(|v| v.as_vec2())
        .unwrap();
    assert_eq!(scale, glam::Vec2::new(128.0, 128.0));
}

// ============================================================================
// Shadow mapping node
// ============================================================================

/// The end-to-end dirty-check scenario: stable attributes leave the GPU
/// untouched, a kernel-size change regenerates exactly the kernel.
#[test]
fn shadow_update_is_idempotent_for_stable_attributes() {
    let (host, mut ctx) = rig();
    let mut node = shadow_node(&host, &mut ctx);
    let camera = viewer_camera();

    node.update(&mut ctx, &shadow_attrs(&camera, &[])).unwrap();
    // Shadow map, noise tile and shadows output were allocated.
    let after_first = ctx.allocation_count();
    assert_eq!(after_first, 3);

    node.update(&mut ctx, &shadow_attrs(&camera, &[])).unwrap();
    assert_eq!(ctx.allocation_count(), after_first);

    // Kernel growth regenerates the kernel uniform pair without touching
    // any texture.
    node.update(
        &mut ctx,
        &ShadowAttributes {
            kernel_size: Some(16),
            ..shadow_attrs(&camera, &[])
        },
    )
    .unwrap();
    assert_eq!(ctx.allocation_count(), after_first);

    let uniforms = node.material().uniforms();
    assert_eq!(uniforms.get("kernelSize").and_then(|v| v.as_int()), Some(16));
    assert_eq!(
        uniforms
            .get("kernel")
            .and_then(|v| v.as_vec2_array())
            .map(|k| k.len()),
        Some(16)
    );
}

#[test]
fn shadow_map_resize_reallocates_exactly_once() {
    let (host, mut ctx) = rig();
    let mut node = shadow_node(&host, &mut ctx);
    let camera = viewer_camera();

    node.update(&mut ctx, &shadow_attrs(&camera, &[])).unwrap();
    let baseline = ctx.allocation_count();

    node.update(
        &mut ctx,
        &ShadowAttributes {
            shadow_map_size: Some(UVec2::new(2048, 2048)),
            ..shadow_attrs(&camera, &[])
        },
    )
    .unwrap();
    assert_eq!(ctx.allocation_count(), baseline + 1);
}

#[test]
fn shadow_render_replays_both_passes_in_order() {
    let (mut host, mut ctx) = rig();
    let mut node = shadow_node(&host, &mut ctx);
    let camera = viewer_camera();

    let normals = input_texture(&mut ctx, TextureFormat::Rgba8, 512, 512);
    let depths = input_texture(&mut ctx, TextureFormat::Depth32Float, 512, 512);
    node.set_normals_input(&ctx, normals).unwrap();
    node.set_depths_input(&ctx, depths).unwrap();

    let casters = [Model::new(host.create_mesh()), Model::new(host.create_mesh())];
    node.update(&mut ctx, &shadow_attrs(&camera, &casters))
        .unwrap();

    ctx.reset_calls();
    node.render(&mut ctx).unwrap();

    let calls = ctx.calls();
    // Depth pre-pass over the shadow map.
    assert!(matches!(calls[0], ContextCall::SetViewport(v) if v.width == 1024));
    assert!(matches!(calls[1], ContextCall::BindFramebuffer(_)));
    assert!(matches!(calls[2], ContextCall::Clear));
    assert!(matches!(calls[3], ContextCall::BindMaterial(_)));
    assert!(matches!(&calls[4], ContextCall::SetUniform(n) if n == "projectionMatrix"));
    assert!(matches!(&calls[5], ContextCall::SetUniform(n) if n == "viewMatrix"));
    assert!(matches!(&calls[6], ContextCall::SetUniform(n) if n == "modelMatrix"));
    assert!(matches!(calls[7], ContextCall::DrawMesh(_)));
    assert!(matches!(&calls[8], ContextCall::SetUniform(n) if n == "modelMatrix"));
    assert!(matches!(calls[9], ContextCall::DrawMesh(_)));
    // Screen-space resolve pass.
    assert!(matches!(calls[10], ContextCall::SetViewport(v) if v.width == 512));
    assert!(matches!(calls[11], ContextCall::BindFramebuffer(_)));
    assert!(matches!(calls[12], ContextCall::BindMaterial(_)));
    assert!(matches!(calls[13], ContextCall::DrawMesh(_)));
    assert!(matches!(calls[14], ContextCall::UnbindFramebuffer(_)));
    assert_eq!(calls.len(), 15);
}

#[rstest]
#[case::default_direction(None)]
#[case::straight_down(Some(Vec3::NEG_Y))]
#[case::antiparallel(Some(Vec3::Z))]
fn shadow_light_camera_bounds_cover_viewer_frustum(#[case] direction: Option<Vec3>) {
    let (host, mut ctx) = rig();
    let mut node = shadow_node(&host, &mut ctx);
    let camera = viewer_camera();

    let normals = input_texture(&mut ctx, TextureFormat::Rgba8, 512, 512);
    let depths = input_texture(&mut ctx, TextureFormat::Depth32Float, 512, 512);
    node.set_normals_input(&ctx, normals).unwrap();
    node.set_depths_input(&ctx, depths).unwrap();

    node.update(
        &mut ctx,
        &ShadowAttributes {
            light_direction: direction,
            ..shadow_attrs(&camera, &[])
        },
    )
    .unwrap();
    node.render(&mut ctx).unwrap();

    let light = node.light_camera();
    let half = match light.projection {
        Projection::Orthographic {
            right, top, far, ..
        } => Vec3::new(right, top, far),
        _ => panic!("light camera must be orthographic"),
    };

    let mut frustum = render_nodes::ViewFrustum::new();
    frustum.update(camera.projection_matrix(), camera.view_matrix());
    for &corner in frustum.vertices() {
        let local = light.rotation.inverse() * (corner - light.position);
        assert!(
            local.abs().cmple(half + 1e-2).all(),
            "corner {corner} escapes the light bounds {half}"
        );
    }
}

#[test]
fn shadow_render_before_update_is_rejected() {
    let (host, mut ctx) = rig();
    let mut node = shadow_node(&host, &mut ctx);
    assert!(matches!(node.render(&mut ctx), Err(GraphError::NotUpdated)));
}

#[test]
fn shadow_destroy_is_terminal_and_exactly_once() {
    let (host, mut ctx) = rig();
    let mut node = shadow_node(&host, &mut ctx);
    let camera = viewer_camera();

    node.update(&mut ctx, &shadow_attrs(&camera, &[])).unwrap();
    node.destroy(&mut ctx).unwrap();
    assert!(!ctx.is_texture_created(node.shadows_output()));

    assert!(matches!(
        node.destroy(&mut ctx),
        Err(GraphError::NodeDestroyed)
    ));
    assert!(matches!(
        node.update(&mut ctx, &shadow_attrs(&camera, &[])),
        Err(GraphError::NodeDestroyed)
    ));
    assert!(matches!(
        node.render(&mut ctx),
        Err(GraphError::NodeDestroyed)
    ));
}

// ============================================================================
// Context preconditions
// ============================================================================

#[test]
fn depth_attachment_requires_depth_format() {
    let (_, mut ctx) = rig();
    let color = input_texture(&mut ctx, TextureFormat::Rgba8, 4, 4);
    let result = ctx.create_framebuffer(&[(AttachmentPoint::Depth, color)]);
    assert!(matches!(
        result,
        Err(render_nodes::backend::BackendError::AttachmentMismatch { .. })
    ));
}

#[test]
fn texture_upload_validates_payload_size() {
    let (_, mut ctx) = rig();
    let texture = ctx
        .create_texture(&TextureDescriptor {
            format: TextureFormat::Rg8,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            ..TextureDescriptor::default()
        })
        .unwrap();

    // A 2x2 Rg8 upload needs 8 bytes.
    let result = ctx.write_texture(texture, &[0u8; 6], 2, 2);
    assert!(matches!(
        result,
        Err(render_nodes::backend::BackendError::SizeMismatch { expected: 8, actual: 6 })
    ));
    ctx.write_texture(texture, &[0u8; 8], 2, 2).unwrap();
    assert_eq!(ctx.texture_size(texture).unwrap(), (2, 2));
}
