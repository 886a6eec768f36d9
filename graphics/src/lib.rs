//! # Lumen Graphics
//!
//! A render hardware interface with an editor-oriented scene renderer on top.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Rhi`] - device object creating resources and executing [`DeviceContext`] command lists
//! - [`backend`] - the [`GpuBackend`](backend::GpuBackend) trait with dummy and wgpu backends
//! - [`scene`] - primitives, lights, draw lists and scene depth groups
//! - [`renderer`] - the per-view [`SceneRenderer`], hit-proxy picking and editor viewports
//! - [`RenderingThread`] - a dedicated thread executing queued render commands
//!
//! ## Example
//!
//! ```ignore
//! use lumen_graphics::{BackendType, Rhi, RhiParameters};
//!
//! let rhi = Rhi::new(RhiParameters::default().with_backend(BackendType::Dummy))?;
//! let mut ctx = rhi.create_immediate_context();
//! let mut viewport = rhi.create_offscreen_viewport(640, 480)?;
//! rhi.begin_drawing_viewport(&mut ctx, &viewport)?;
//! // Render the scene...
//! rhi.end_drawing_viewport(&mut ctx, &mut viewport, true, false)?;
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod render_thread;
pub mod renderer;
pub mod resources;
pub mod scene;
#[cfg(feature = "editor")]
pub mod shader_compiler;
pub mod shaders;
pub mod types;
pub mod ui_overlay;
pub mod viewport;

// Re-export main types for convenience
pub use backend::{DummyBackend, GpuBackend};
pub use config::{BackendType, RendererSettings, RhiParameters};
pub use context::DeviceContext;
pub use device::{DeviceCapabilities, Rhi};
pub use error::{GraphicsError, ShaderCompileError};
pub use render_thread::{RenderCommand, RenderContext, RenderingThread};
pub use renderer::{EditorViewportClient, SceneRenderer, ViewportType};
pub use resources::{
    BoundShaderStateRef, IndexBufferRef, LockedData, SurfaceRef, Texture2DRef, VertexBufferRef,
};
pub use scene::{
    DepthGroup, HitProxyId, Light, MeshDrawList, MeshPrimitive, Scene, SceneView, SharedScene,
    ShowFlags,
};
pub use shaders::BuiltinShaders;
pub use types::{
    BufferDescriptor, BufferUsage, LockMode, PixelFormat, PrimitiveType, TextureCreateFlags,
    TextureDescriptor,
};
pub use ui_overlay::UiOverlay;
pub use viewport::{SharedViewport, Viewport};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// This should be called before using any graphics functionality.
pub fn init() {
    lumen_core::init();
    log::info!("Lumen Graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_backend() {
        let backend = DummyBackend::new();
        assert_eq!(backend.name(), "Dummy Backend");
    }
}
