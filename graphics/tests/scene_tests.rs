//! Scene and renderer integration tests on the dummy backend.
//!
//! The dummy backend records every draw, so these tests check what the
//! renderer submits rather than what ends up in pixels.

mod common;

use common::{Backend, TestContext, at};
use lumen_core::{Aabb, LinearColor};
use lumen_core::math::Vec3;
use lumen_graphics::backend::DrawRecord;
use lumen_graphics::scene::{
    LinkState, PrimitiveComponent, PrimitiveId, SceneDepthGroups, ViewState,
};
use lumen_graphics::{
    DepthGroup, EditorViewportClient, GraphicsError, HitProxyId, Light, LockMode, MeshPrimitive,
    RendererSettings, Scene, SceneView, ViewportType,
};
use rstest::rstest;

/// Indexed draws of the unit quad (two triangles).
fn quad_draws(draws: &[DrawRecord]) -> Vec<&DrawRecord> {
    draws.iter().filter(|d| d.index_count == Some(6)).collect()
}

/// A primitive whose first `add_to_draw_list` reports a lost device.
struct FailOnce {
    failed: bool,
}

impl PrimitiveComponent for FailOnce {
    fn link_draw_list(&mut self, _sdgs: &mut SceneDepthGroups) {}

    fn unlink_draw_list(&mut self, _sdgs: &mut SceneDepthGroups) {}

    fn add_to_draw_list(
        &mut self,
        _view: &SceneView,
        _sdgs: &mut SceneDepthGroups,
    ) -> Result<(), GraphicsError> {
        if self.failed {
            return Ok(());
        }
        self.failed = true;
        Err(GraphicsError::DeviceLost)
    }

    fn bounds(&self) -> Aabb {
        Aabb::from_min_max(Vec3::repeat(-1.0), Vec3::repeat(1.0))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

fn camera() -> EditorViewportClient {
    EditorViewportClient::new(ViewportType::Perspective).with_location(Vec3::new(0.0, 0.0, 5.0))
}

fn add_quads(t: &TestContext, scene: &mut Scene, positions: &[[f32; 3]]) -> Vec<PrimitiveId> {
    let mesh = t.quad_mesh();
    positions
        .iter()
        .map(|p| {
            scene.add_primitive(Box::new(MeshPrimitive::static_mesh(
                mesh.clone(),
                at(p[0], p[1], p[2]),
            )))
        })
        .collect()
}

// ============================================================================
// Views
// ============================================================================

#[test]
fn test_build_view_culls_outside_frustum() {
    let t = TestContext::dummy();
    let mut scene = Scene::new();
    add_quads(&t, &mut scene, &[[0.0, 0.0, 0.0], [0.0, 0.0, 50.0], [500.0, 0.0, 0.0]]);

    let view = camera().calc_scene_view(128, 128);
    assert_eq!(scene.build_view(&view).unwrap(), 1);
    assert_eq!(scene.view_state(), ViewState::Built);
    assert_eq!(scene.num_visible_primitives(), 1);
    assert_eq!(
        scene
            .get_sdg(DepthGroup::World)
            .static_mesh_draw_list
            .total_instances(),
        1
    );

    scene.clear_view().unwrap();
    assert_eq!(scene.view_state(), ViewState::Idle);
    assert_eq!(scene.num_visible_primitives(), 0);
    assert_eq!(
        scene
            .get_sdg(DepthGroup::World)
            .static_mesh_draw_list
            .total_instances(),
        0
    );
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "contract violation"))]
fn test_clear_view_without_build_is_contract_violation() {
    let mut scene = Scene::new();
    let result = scene.clear_view();
    assert!(matches!(result, Err(GraphicsError::ContractViolation(_))));
}

#[test]
fn test_visible_lights_follow_the_frustum() {
    let mut scene = Scene::new();
    scene.add_light(Light::point(Vec3::new(0.0, 0.0, 0.0), 2.0, LinearColor::WHITE));
    scene.add_light(Light::point(Vec3::new(0.0, 0.0, 100.0), 2.0, LinearColor::WHITE));

    let view = camera().calc_scene_view(64, 64);
    scene.build_view(&view).unwrap();
    assert_eq!(scene.visible_lights().len(), 1);
    scene.clear_view().unwrap();
    assert!(scene.visible_lights().is_empty());
}

#[test]
fn test_changing_depth_group_relinks_on_next_view() {
    let t = TestContext::dummy();
    let mut scene = Scene::new();
    let ids = add_quads(&t, &mut scene, &[[0.0, 0.0, 0.0]]);
    assert_eq!(
        scene.get_sdg(DepthGroup::World).static_mesh_draw_list.num_links(),
        1
    );

    scene
        .primitive_mut::<MeshPrimitive>(ids[0])
        .unwrap()
        .set_depth_group(DepthGroup::Foreground);
    assert_eq!(
        scene.primitive(ids[0]).unwrap().link_state(),
        LinkState::Dirty
    );

    let view = camera().calc_scene_view(64, 64);
    scene.build_view(&view).unwrap();
    assert_eq!(
        scene.primitive(ids[0]).unwrap().link_state(),
        LinkState::Relinked
    );
    assert!(scene.get_sdg(DepthGroup::World).static_mesh_draw_list.is_empty());
    assert_eq!(
        scene
            .get_sdg(DepthGroup::Foreground)
            .static_mesh_draw_list
            .total_instances(),
        1
    );

    scene.clear_view().unwrap();
    assert_eq!(scene.primitive(ids[0]).unwrap().link_state(), LinkState::Clean);
}

// ============================================================================
// Rendering
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_editor_viewport_draws_frame(#[case] backend: Backend) {
    let Some(mut t) = TestContext::new(backend) else {
        eprintln!("Skipping test: {backend:?} backend not available");
        return;
    };

    let mut scene = Scene::new();
    add_quads(&t, &mut scene, &[[0.0, 0.0, 0.0]]);
    let mut renderer = t.renderer(RendererSettings::default());
    renderer.set_scene(Some(scene.into_shared()));

    let mut viewport = t.rhi.create_offscreen_viewport(96, 64).unwrap();
    t.rhi.begin_drawing_viewport(&mut t.ctx, &viewport).unwrap();
    let drawn = camera().draw(&mut renderer, &mut t.ctx, &viewport).unwrap();
    t.rhi
        .end_drawing_viewport(&mut t.ctx, &mut viewport, true, false)
        .unwrap();

    assert!(drawn);
    assert!(!renderer.is_rendering());
    assert_eq!(renderer.stats().frames, 1);
    assert_eq!(viewport.present_count(), 1);
    let scene = renderer.scene().unwrap().lock();
    assert_eq!(scene.view_state(), ViewState::Idle);
}

#[test]
fn test_shared_mesh_renders_as_one_instanced_draw() {
    let mut t = TestContext::dummy();
    let mut scene = Scene::new();
    add_quads(
        &t,
        &mut scene,
        &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
        ],
    );
    let mut renderer = t.renderer(RendererSettings::default().with_editor_mode(false));
    renderer.set_scene(Some(scene.into_shared()));
    let viewport = t.rhi.create_offscreen_viewport(128, 128).unwrap();

    assert!(camera().draw(&mut renderer, &mut t.ctx, &viewport).unwrap());
    t.rhi.flush(&mut t.ctx).unwrap();

    let draws = t.dummy_backend().take_draws();
    let quads = quad_draws(&draws);
    assert_eq!(quads.len(), 1);
    assert_eq!(quads[0].num_instances, 5);
}

#[test]
fn test_foreground_group_draws_after_world() {
    let mut t = TestContext::dummy();
    let mesh = t.quad_mesh();
    let mut scene = Scene::new();
    scene.add_primitive(Box::new(MeshPrimitive::static_mesh(
        mesh.clone(),
        at(0.0, 0.0, 0.0),
    )));
    scene.add_primitive(Box::new(
        MeshPrimitive::static_mesh(mesh, at(0.5, 0.0, 0.0)).with_depth_group(DepthGroup::Foreground),
    ));
    let mut renderer = t.renderer(RendererSettings::default());
    renderer.set_scene(Some(scene.into_shared()));
    let viewport = t.rhi.create_offscreen_viewport(64, 64).unwrap();

    camera().draw(&mut renderer, &mut t.ctx, &viewport).unwrap();
    t.rhi.flush(&mut t.ctx).unwrap();

    let draws = t.dummy_backend().take_draws();
    let quads = quad_draws(&draws);
    assert_eq!(quads.len(), 2);
    assert!(quads.iter().all(|d| d.num_instances == 1));
}

#[test]
fn test_lights_add_one_pass_each() {
    let mut t = TestContext::dummy();
    let mut scene = Scene::new();
    add_quads(&t, &mut scene, &[[0.0, 0.0, 0.0]]);
    scene.add_light(Light::point(Vec3::new(0.0, 0.0, 1.0), 4.0, LinearColor::WHITE));
    scene.add_light(
        Light::point(Vec3::new(1.0, 1.0, 1.0), 4.0, LinearColor::new(1.0, 0.5, 0.2, 1.0))
            .with_intensity(2.0),
    );
    let shared = scene.into_shared();

    let mut renderer = t.renderer(RendererSettings::default());
    renderer.set_scene(Some(shared.clone()));
    let viewport = t.rhi.create_offscreen_viewport(64, 64).unwrap();
    camera().draw(&mut renderer, &mut t.ctx, &viewport).unwrap();
    assert_eq!(renderer.stats().light_passes, 2);

    renderer.set_settings(RendererSettings::default().with_lights(false));
    camera().draw(&mut renderer, &mut t.ctx, &viewport).unwrap();
    assert_eq!(renderer.stats().light_passes, 0);
    assert_eq!(renderer.stats().frames, 2);
}

#[test]
fn test_render_sdg_without_built_view_draws_nothing() {
    let mut t = TestContext::dummy();
    let mut scene = Scene::new();
    add_quads(&t, &mut scene, &[[0.0, 0.0, 0.0]]);
    let mut renderer = t.renderer(RendererSettings::default());
    let view = camera().calc_scene_view(64, 64);

    let drawn = renderer
        .render_sdg(&mut t.ctx, &mut scene, DepthGroup::World, &view)
        .unwrap();
    assert!(!drawn);
    assert!(t.ctx.is_empty());
}

#[test]
fn test_failed_frame_does_not_block_the_next_one() {
    let mut t = TestContext::dummy();
    let mut scene = Scene::new();
    add_quads(&t, &mut scene, &[[0.0, 0.0, 0.0]]);
    let mut renderer = t.renderer(RendererSettings::default());
    renderer.set_scene(Some(scene.into_shared()));
    let viewport = t.rhi.create_offscreen_viewport(64, 64).unwrap();
    let client = camera();

    // The first buffer created inside the frame is the instance buffer.
    t.dummy_backend().fail_next_buffer_creations(1);
    assert!(client.draw(&mut renderer, &mut t.ctx, &viewport).is_err());
    assert!(!renderer.is_rendering());
    assert!(!renderer.scene().unwrap().lock().is_view_built());

    assert!(client.draw(&mut renderer, &mut t.ctx, &viewport).unwrap());
    t.rhi.flush(&mut t.ctx).unwrap();
    assert_eq!(quad_draws(&t.dummy_backend().take_draws()).len(), 1);
    assert_eq!(renderer.stats().frames, 1);
}

#[test]
fn test_failed_build_view_leaves_renderer_idle() {
    let mut t = TestContext::dummy();
    let mut scene = Scene::new();
    scene.add_primitive(Box::new(FailOnce { failed: false }));
    let mut renderer = t.renderer(RendererSettings::default());
    renderer.set_scene(Some(scene.into_shared()));
    let viewport = t.rhi.create_offscreen_viewport(32, 32).unwrap();
    let client = camera();

    assert_eq!(
        client.draw(&mut renderer, &mut t.ctx, &viewport),
        Err(GraphicsError::DeviceLost)
    );
    assert!(!renderer.is_rendering());
    assert_eq!(
        renderer.scene().unwrap().lock().view_state(),
        ViewState::Idle
    );
    assert!(client.draw(&mut renderer, &mut t.ctx, &viewport).is_ok());
}

#[test]
fn test_render_targets_only_grow() {
    let mut t = TestContext::dummy();
    let mut renderer = t.renderer(RendererSettings::default());
    renderer.set_scene(Some(Scene::new().into_shared()));

    let large = t.rhi.create_offscreen_viewport(256, 128).unwrap();
    let small = t.rhi.create_offscreen_viewport(64, 64).unwrap();
    camera().draw(&mut renderer, &mut t.ctx, &large).unwrap();
    camera().draw(&mut renderer, &mut t.ctx, &small).unwrap();

    let targets = renderer.render_targets();
    assert_eq!(targets.allocations(), 1);
    assert_eq!(targets.targets().unwrap().size(), (256, 128));
}

// ============================================================================
// Hit Proxies
// ============================================================================

#[test]
fn test_hit_proxy_id_color_round_trip() {
    for index in [1, 255, 256, 0x00ab_cdef] {
        let id = HitProxyId::new(index).unwrap();
        assert_eq!(HitProxyId::from_color(id.to_color()), id);
    }
    assert!(HitProxyId::from_color(lumen_core::Color::BLACK).is_none());
}

#[cfg(feature = "hit-proxy")]
#[test]
fn test_pick_reads_hit_proxy_target() {
    let mut t = TestContext::dummy();
    let mesh = t.quad_mesh();
    let mut scene = Scene::new();
    let id = HitProxyId::new(42).unwrap();
    scene.add_primitive(Box::new(
        MeshPrimitive::static_mesh(mesh, at(0.0, 0.0, 0.0)).with_hit_proxy_id(id),
    ));

    let mut renderer = t.renderer(RendererSettings::default());
    renderer.set_scene(Some(scene.into_shared()));
    let viewport = t.rhi.create_offscreen_viewport(64, 64).unwrap();

    let client = camera();
    let picked = client
        .get_hit_proxy_id(&mut renderer, &mut t.ctx, &viewport, 32, 32)
        .unwrap();
    let draws = t.dummy_backend().take_draws();
    assert_eq!(quad_draws(&draws).len(), 1);
    // The dummy backend does not rasterize: the target still holds the black clear.
    assert!(picked.is_none());

    // Stamp the quad's id where it would cover the center pixel.
    let target = renderer.render_targets().targets().unwrap().hit_proxy.clone();
    let mut locked = t
        .rhi
        .lock_texture_2d(&mut t.ctx, &target, 0, LockMode::WriteDiscard)
        .unwrap();
    let offset = 32 * locked.row_pitch() as usize + 32 * 4;
    let color = id.to_color();
    locked.as_mut_slice()[offset..offset + 4].copy_from_slice(&[color.r, color.g, color.b, color.a]);
    t.rhi.unlock_texture_2d(&mut t.ctx, &target, locked).unwrap();

    assert_eq!(renderer.read_hit_proxy_id(&mut t.ctx, 32, 32).unwrap(), id);
    assert!(renderer.read_hit_proxy_id(&mut t.ctx, 31, 32).unwrap().is_none());

    let outside = client
        .get_hit_proxy_id(&mut renderer, &mut t.ctx, &viewport, 64, 10)
        .unwrap();
    assert!(outside.is_none());
}

#[cfg(feature = "hit-proxy")]
#[test]
fn test_pick_on_cleared_target_is_none() {
    let mut t = TestContext::dummy();
    let mut renderer = t.renderer(RendererSettings::default());
    renderer.set_scene(Some(Scene::new().into_shared()));
    let viewport = t.rhi.create_offscreen_viewport(32, 32).unwrap();
    let picked = camera()
        .get_hit_proxy_id(&mut renderer, &mut t.ctx, &viewport, 5, 5)
        .unwrap();
    assert!(picked.is_none());
}
