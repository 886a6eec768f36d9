//! RHI integration tests: locks, readback, state caching and viewports.
//!
//! Run with: cargo test -p lumen-graphics --test rhi_tests
//! Include the wgpu backend with: --features wgpu-backend

mod common;

use std::sync::Arc;

use common::{Backend, TestContext};
use lumen_core::LinearColor;
use lumen_graphics::{
    BufferDescriptor, BufferUsage, GraphicsError, LockMode, PixelFormat, TextureCreateFlags,
    TextureDescriptor,
};
use rstest::rstest;

// ============================================================================
// Buffers
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_vertex_buffer_write_then_read(#[case] backend: Backend) {
    let Some(mut t) = TestContext::new(backend) else {
        eprintln!("Skipping test: {backend:?} backend not available");
        return;
    };

    let buffer = t
        .rhi
        .create_vertex_buffer(
            BufferDescriptor::new(256, BufferUsage::DYNAMIC | BufferUsage::READBACK)
                .with_label("lock_test"),
            None,
        )
        .unwrap();

    let values: [f32; 4] = [1.0, 2.5, -3.0, 4.25];
    let mut locked = t
        .rhi
        .lock_vertex_buffer(&mut t.ctx, &buffer, 64, 16, LockMode::WriteDiscard)
        .unwrap();
    assert_eq!(locked.len(), 16);
    locked.write_pod(0, &values);
    t.rhi.unlock_vertex_buffer(&mut t.ctx, &buffer, locked).unwrap();
    assert!(!buffer.is_locked());

    let read = t
        .rhi
        .lock_vertex_buffer(&mut t.ctx, &buffer, 64, 16, LockMode::ReadOnly)
        .unwrap();
    assert_eq!(read.as_slice(), bytemuck::cast_slice::<f32, u8>(&values));
    t.rhi.unlock_vertex_buffer(&mut t.ctx, &buffer, read).unwrap();
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_buffer_initial_data_is_readable(#[case] backend: Backend) {
    let Some(mut t) = TestContext::new(backend) else {
        eprintln!("Skipping test: {backend:?} backend not available");
        return;
    };

    let data: Vec<u8> = (0..64u8).collect();
    let buffer = t
        .rhi
        .create_vertex_buffer(
            BufferDescriptor::new(64, BufferUsage::STATIC | BufferUsage::READBACK),
            Some(&data),
        )
        .unwrap();

    let read = t
        .rhi
        .lock_vertex_buffer(&mut t.ctx, &buffer, 16, 32, LockMode::ReadOnly)
        .unwrap();
    assert_eq!(read.as_slice(), &data[16..48]);
    t.rhi.unlock_vertex_buffer(&mut t.ctx, &buffer, read).unwrap();
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "contract violation"))]
fn test_double_lock_is_contract_violation() {
    let mut t = TestContext::dummy();
    let buffer = t
        .rhi
        .create_vertex_buffer(BufferDescriptor::new(32, BufferUsage::DYNAMIC), None)
        .unwrap();
    let _first = t
        .rhi
        .lock_vertex_buffer(&mut t.ctx, &buffer, 0, 16, LockMode::WriteDiscard)
        .unwrap();
    let second = t
        .rhi
        .lock_vertex_buffer(&mut t.ctx, &buffer, 16, 16, LockMode::WriteDiscard);
    assert!(matches!(second, Err(GraphicsError::ContractViolation(_))));
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "contract violation"))]
fn test_lock_outside_buffer_is_contract_violation() {
    let mut t = TestContext::dummy();
    let buffer = t
        .rhi
        .create_vertex_buffer(BufferDescriptor::new(32, BufferUsage::DYNAMIC), None)
        .unwrap();
    let result = t
        .rhi
        .lock_vertex_buffer(&mut t.ctx, &buffer, 24, 16, LockMode::WriteDiscard);
    assert!(matches!(result, Err(GraphicsError::ContractViolation(_))));
    assert!(!buffer.is_locked());
}

// ============================================================================
// Textures
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_texture_write_then_read(#[case] backend: Backend) {
    let Some(mut t) = TestContext::new(backend) else {
        eprintln!("Skipping test: {backend:?} backend not available");
        return;
    };

    let (width, height) = (8u32, 4u32);
    let texture = t
        .rhi
        .create_texture_2d(
            TextureDescriptor::new_2d(
                width,
                height,
                PixelFormat::A8R8G8B8,
                TextureCreateFlags::SHADER_RESOURCE | TextureCreateFlags::CPU_READBACK,
            )
            .with_label("pattern"),
            None,
        )
        .unwrap();

    let mut locked = t
        .rhi
        .lock_texture_2d(&mut t.ctx, &texture, 0, LockMode::WriteDiscard)
        .unwrap();
    let pitch = locked.row_pitch() as usize;
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = y * pitch + x * 4;
            locked.as_mut_slice()[offset..offset + 4]
                .copy_from_slice(&[x as u8 * 16, y as u8 * 32, 7, 255]);
        }
    }
    t.rhi.unlock_texture_2d(&mut t.ctx, &texture, locked).unwrap();

    let read = t
        .rhi
        .lock_texture_2d(&mut t.ctx, &texture, 0, LockMode::ReadOnly)
        .unwrap();
    let pitch = read.row_pitch() as usize;
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = y * pitch + x * 4;
            assert_eq!(
                &read.as_slice()[offset..offset + 4],
                &[x as u8 * 16, y as u8 * 32, 7, 255],
                "pixel ({x}, {y})"
            );
        }
    }
    t.rhi.unlock_texture_2d(&mut t.ctx, &texture, read).unwrap();
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_clear_surface_is_visible_to_readback(#[case] backend: Backend) {
    let Some(mut t) = TestContext::new(backend) else {
        eprintln!("Skipping test: {backend:?} backend not available");
        return;
    };

    let surface = t
        .rhi
        .create_texture_2d(
            TextureDescriptor::new_2d(
                16,
                16,
                PixelFormat::A8R8G8B8,
                TextureCreateFlags::RENDER_TARGET | TextureCreateFlags::CPU_READBACK,
            ),
            None,
        )
        .unwrap();

    t.ctx.set_render_target(Some(&surface), None).unwrap();
    t.ctx
        .clear_surface(&surface, LinearColor::new(1.0, 0.0, 0.0, 1.0));

    let read = t
        .rhi
        .lock_texture_2d(&mut t.ctx, &surface, 0, LockMode::ReadOnly)
        .unwrap();
    assert!(t.ctx.is_empty(), "read lock must flush the context");
    assert_eq!(&read.as_slice()[0..4], &[255, 0, 0, 255]);
    let last = (15 * read.row_pitch() + 15 * 4) as usize;
    assert_eq!(&read.as_slice()[last..last + 4], &[255, 0, 0, 255]);
    t.rhi.unlock_texture_2d(&mut t.ctx, &surface, read).unwrap();
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "contract violation"))]
fn test_texture_read_lock_requires_readback_flag() {
    let mut t = TestContext::dummy();
    let texture = t
        .rhi
        .create_texture_2d(
            TextureDescriptor::new_2d(
                4,
                4,
                PixelFormat::A8R8G8B8,
                TextureCreateFlags::SHADER_RESOURCE,
            ),
            None,
        )
        .unwrap();
    let result = t
        .rhi
        .lock_texture_2d(&mut t.ctx, &texture, 0, LockMode::ReadOnly);
    assert!(matches!(result, Err(GraphicsError::ContractViolation(_))));
}

#[test]
fn test_zero_sized_texture_is_rejected() {
    let t = TestContext::dummy();
    let result = t.rhi.create_texture_2d(
        TextureDescriptor::new_2d(
            0,
            4,
            PixelFormat::A8R8G8B8,
            TextureCreateFlags::SHADER_RESOURCE,
        ),
        None,
    );
    assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
}

// ============================================================================
// Bound Shader States
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_bound_shader_state_is_deduplicated(#[case] backend: Backend) {
    let Some(t) = TestContext::new(backend) else {
        eprintln!("Skipping test: {backend:?} backend not available");
        return;
    };

    let before = t.rhi.bound_shader_state_count();
    let shaders = &t.shaders;
    let a = t
        .rhi
        .create_bound_shader_state(
            &shaders.simple_declaration,
            &shaders.simple_vs,
            &shaders.simple_ps,
            None,
            None,
            None,
        )
        .unwrap();
    let b = t
        .rhi
        .create_bound_shader_state(
            &shaders.simple_declaration,
            &shaders.simple_vs,
            &shaders.simple_ps,
            None,
            None,
            None,
        )
        .unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(t.rhi.bound_shader_state_count(), before + 1);

    drop(a);
    drop(b);
    assert_eq!(t.rhi.bound_shader_state_count(), before);
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "contract violation"))]
fn test_bound_shader_state_rejects_swapped_stages() {
    let t = TestContext::dummy();
    let shaders = &t.shaders;
    let result = t.rhi.create_bound_shader_state(
        &shaders.simple_declaration,
        &shaders.simple_ps,
        &shaders.simple_vs,
        None,
        None,
        None,
    );
    assert!(matches!(result, Err(GraphicsError::ContractViolation(_))));
}

// ============================================================================
// Viewports
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_offscreen_viewport_present_and_resize(#[case] backend: Backend) {
    let Some(mut t) = TestContext::new(backend) else {
        eprintln!("Skipping test: {backend:?} backend not available");
        return;
    };

    let mut viewport = t.rhi.create_offscreen_viewport(64, 32).unwrap();
    assert!(viewport.is_offscreen());
    assert_eq!(viewport.size(), (64, 32));

    t.rhi.begin_drawing_viewport(&mut t.ctx, &viewport).unwrap();
    let surface = viewport.surface().clone();
    t.ctx.clear_surface(&surface, LinearColor::BLACK);
    t.rhi
        .end_drawing_viewport(&mut t.ctx, &mut viewport, true, false)
        .unwrap();
    assert_eq!(viewport.present_count(), 1);
    assert!(t.ctx.is_empty());

    t.rhi.begin_drawing_viewport(&mut t.ctx, &viewport).unwrap();
    t.rhi
        .end_drawing_viewport(&mut t.ctx, &mut viewport, false, false)
        .unwrap();
    assert_eq!(viewport.present_count(), 1);

    assert!(!viewport.resize(&t.rhi, 64, 32).unwrap());
    assert!(viewport.resize(&t.rhi, 128, 96).unwrap());
    assert_eq!(viewport.surface().width(), 128);
    assert_eq!(viewport.depth_surface().height(), 96);
}

#[test]
fn test_dummy_backend_counts_presents() {
    let mut t = TestContext::dummy();
    let mut viewport = t.rhi.create_offscreen_viewport(8, 8).unwrap();
    for _ in 0..3 {
        t.rhi.begin_drawing_viewport(&mut t.ctx, &viewport).unwrap();
        t.rhi
            .end_drawing_viewport(&mut t.ctx, &mut viewport, true, true)
            .unwrap();
    }
    assert_eq!(t.dummy_backend().stats().presents, 3);
    assert_eq!(viewport.present_count(), 3);
}
