//! Rendering thread integration tests.

mod common;

use std::sync::Arc;

use common::{TestContext, at};
use lumen_core::math::Vec3;
use lumen_graphics::{
    EditorViewportClient, MeshPrimitive, RenderCommand, RenderContext, RendererSettings,
    RenderingThread, Scene,
};
use parking_lot::Mutex;

#[test]
fn test_commands_execute_in_enqueue_order() {
    let t = TestContext::dummy();
    let mut thread = RenderingThread::new(RenderContext::new(t.rhi.clone()));
    thread.start().unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    for i in 0..256 {
        let seen = seen.clone();
        thread
            .enqueue_execute("Push", move |_| seen.lock().push(i))
            .unwrap();
    }
    thread.flush().unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 256);
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
    drop(seen);
    thread.stop().unwrap();
}

#[test]
fn test_frame_rendered_on_render_thread() {
    let t = TestContext::dummy();

    let mut scene = Scene::new();
    scene.add_primitive(Box::new(MeshPrimitive::static_mesh(
        t.quad_mesh(),
        at(0.0, 0.0, 0.0),
    )));
    let scene = scene.into_shared();
    let mut renderer = t.renderer(RendererSettings::default());
    renderer.set_scene(Some(scene.clone()));

    let viewport = t.rhi.create_offscreen_viewport(64, 48).unwrap().into_shared();
    let client = EditorViewportClient::default().with_location(Vec3::new(0.0, 0.0, 4.0));

    let mut thread =
        RenderingThread::new(RenderContext::new(t.rhi.clone()).with_renderer(renderer));
    thread.start().unwrap();

    for _ in 0..3 {
        thread
            .enqueue(RenderCommand::BeginDrawingViewport(viewport.clone()))
            .unwrap();
        let frame_viewport = viewport.clone();
        let frame_client = client.clone();
        thread
            .enqueue_execute("DrawViewport", move |ctx| {
                let viewport = frame_viewport.lock();
                if let Some(renderer) = ctx.renderer.as_mut() {
                    frame_client
                        .draw(renderer, &mut ctx.immediate, &viewport)
                        .unwrap();
                }
            })
            .unwrap();
        thread
            .enqueue(RenderCommand::EndDrawingViewport {
                viewport: viewport.clone(),
                present: true,
                lock_to_vsync: false,
            })
            .unwrap();
    }
    let frames = thread
        .enqueue_and_wait("Stats", |ctx| {
            ctx.renderer.as_ref().map(|r| r.stats().frames)
        })
        .unwrap();
    thread.stop().unwrap();

    assert_eq!(frames, Some(3));
    assert_eq!(viewport.lock().present_count(), 3);
    assert_eq!(t.dummy_backend().stats().presents, 3);
    assert!(!scene.lock().is_view_built());
}

#[test]
fn test_resize_command_recreates_surfaces() {
    let t = TestContext::dummy();
    let viewport = t.rhi.create_offscreen_viewport(32, 32).unwrap().into_shared();
    let mut thread = RenderingThread::new(RenderContext::new(t.rhi.clone()));
    thread.start().unwrap();

    thread
        .enqueue(RenderCommand::ResizeViewport {
            viewport: viewport.clone(),
            width: 80,
            height: 60,
        })
        .unwrap();
    thread.flush().unwrap();

    assert_eq!(viewport.lock().size(), (80, 60));
    assert_eq!(viewport.lock().surface().width(), 80);
}

#[test]
fn test_failed_command_does_not_stop_the_thread() {
    let t = TestContext::dummy();
    let viewport = t.rhi.create_offscreen_viewport(32, 32).unwrap().into_shared();
    let mut thread = RenderingThread::new(RenderContext::new(t.rhi.clone()));
    thread.start().unwrap();

    thread
        .enqueue(RenderCommand::ResizeViewport {
            viewport: viewport.clone(),
            width: 0,
            height: 16,
        })
        .unwrap();
    let answer = thread.enqueue_and_wait("Answer", |_| 42).unwrap();

    assert_eq!(answer, 42);
    assert!(thread.is_running());
    assert_eq!(viewport.lock().size(), (32, 32));
}

#[test]
fn test_dropping_running_thread_joins_it() {
    let t = TestContext::dummy();
    let counter = Arc::new(Mutex::new(0));
    {
        let mut thread = RenderingThread::new(RenderContext::new(t.rhi.clone()));
        thread.start().unwrap();
        for _ in 0..10 {
            let counter = counter.clone();
            thread
                .enqueue_execute("Count", move |_| *counter.lock() += 1)
                .unwrap();
        }
    }
    assert_eq!(*counter.lock(), 10);
}
