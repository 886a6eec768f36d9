use criterion::{Criterion, black_box, criterion_group, criterion_main};

use lumen_core::math::{Vec3, look_at_rh, perspective_rh};
use lumen_core::{Aabb, BoundingSphere, Frustum};

// ---------------------------------------------------------------------------
// Frustum culling
// ---------------------------------------------------------------------------

fn test_frustum() -> Frustum {
    let view = look_at_rh(
        &Vec3::new(0.0, 5.0, 20.0),
        &Vec3::zeros(),
        &Vec3::new(0.0, 1.0, 0.0),
    );
    let proj = perspective_rh(1.0, 16.0 / 9.0, 0.1, 1000.0);
    Frustum::from_view_projection(&(proj * view))
}

fn bench_frustum_extract(c: &mut Criterion) {
    let view = look_at_rh(
        &Vec3::new(0.0, 5.0, 20.0),
        &Vec3::zeros(),
        &Vec3::new(0.0, 1.0, 0.0),
    );
    let proj = perspective_rh(1.0, 16.0 / 9.0, 0.1, 1000.0);
    let view_proj = proj * view;
    c.bench_function("frustum_from_view_projection", |b| {
        b.iter(|| Frustum::from_view_projection(black_box(&view_proj)));
    });
}

fn bench_cull_spheres(c: &mut Criterion) {
    let frustum = test_frustum();
    let spheres: Vec<BoundingSphere> = (0..1024)
        .map(|i| BoundingSphere::new(Vec3::new((i % 32) as f32 * 4.0 - 64.0, 0.0, (i / 32) as f32 * -4.0), 1.0))
        .collect();
    c.bench_function("cull_1024_spheres", |b| {
        b.iter(|| {
            spheres
                .iter()
                .filter(|s| frustum.intersects_sphere(black_box(s)))
                .count()
        });
    });
}

fn bench_cull_aabbs(c: &mut Criterion) {
    let frustum = test_frustum();
    let boxes: Vec<Aabb> = (0..1024)
        .map(|i| {
            Aabb::from_center_extent(
                Vec3::new((i % 32) as f32 * 4.0 - 64.0, 0.0, (i / 32) as f32 * -4.0),
                Vec3::repeat(1.0),
            )
        })
        .collect();
    c.bench_function("cull_1024_aabbs", |b| {
        b.iter(|| {
            boxes
                .iter()
                .filter(|aabb| frustum.intersects_aabb(black_box(aabb)))
                .count()
        });
    });
}

criterion_group!(
    benches,
    bench_frustum_extract,
    bench_cull_spheres,
    bench_cull_aabbs,
);
criterion_main!(benches);
