use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use lumen_core::math::{Vec3, mat4_from_translation};
use lumen_graphics::scene::{Material, StaticMesh, StaticMeshRef};
use lumen_graphics::{
    BuiltinShaders, DummyBackend, EditorViewportClient, MeshPrimitive, RendererSettings, Rhi,
    RhiParameters, Scene, SceneRenderer,
};

struct Fixture {
    rhi: Arc<Rhi>,
    shaders: Arc<BuiltinShaders>,
    mesh: StaticMeshRef,
}

fn fixture() -> Fixture {
    let rhi = Arc::new(
        Rhi::with_backend(Arc::new(DummyBackend::new()), RhiParameters::default()).unwrap(),
    );
    let shaders = BuiltinShaders::new(&rhi).unwrap();
    let material = Material::default_mesh(&rhi, &shaders).into_ref();
    let mesh = StaticMesh::unit_quad(&rhi, &shaders, material).unwrap();
    Fixture { rhi, shaders, mesh }
}

/// A square grid of `count` quads in front of the default editor camera.
fn grid_scene(mesh: &StaticMeshRef, count: usize) -> Scene {
    let mut scene = Scene::new();
    let side = (count as f32).sqrt().ceil() as usize;
    for i in 0..count {
        let x = (i % side) as f32 - side as f32 * 0.5;
        let y = (i / side) as f32 - side as f32 * 0.5;
        scene.add_primitive(Box::new(MeshPrimitive::static_mesh(
            mesh.clone(),
            mat4_from_translation(Vec3::new(x * 0.1, y * 0.1, 0.0)),
        )));
    }
    scene
}

// ---------------------------------------------------------------------------
// Linking
// ---------------------------------------------------------------------------

fn bench_link_primitives(c: &mut Criterion) {
    let f = fixture();
    let mut group = c.benchmark_group("scene_add_primitives");
    for count in [100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| black_box(grid_scene(&f.mesh, count)));
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

fn bench_build_view(c: &mut Criterion) {
    let f = fixture();
    let view = EditorViewportClient::default().calc_scene_view(1280, 720);
    let mut group = c.benchmark_group("scene_build_clear_view");
    for count in [100, 1000, 10000] {
        let mut scene = grid_scene(&f.mesh, count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                black_box(scene.build_view(&view).unwrap());
                scene.clear_view().unwrap();
            });
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

fn bench_render_frame(c: &mut Criterion) {
    let f = fixture();
    let client = EditorViewportClient::default();
    let viewport = f.rhi.create_offscreen_viewport(640, 360).unwrap();
    let mut ctx = f.rhi.create_immediate_context();
    let mut renderer = SceneRenderer::new(
        f.rhi.clone(),
        f.shaders.clone(),
        RendererSettings::default(),
    );
    renderer.set_scene(Some(grid_scene(&f.mesh, 1000).into_shared()));

    c.bench_function("render_frame_1000_quads", |b| {
        b.iter(|| {
            let drawn = client.draw(&mut renderer, &mut ctx, &viewport).unwrap();
            f.rhi.flush(&mut ctx).unwrap();
            black_box(drawn);
        });
    });
}

criterion_group!(
    benches,
    bench_link_primitives,
    bench_build_view,
    bench_render_frame
);
criterion_main!(benches);
