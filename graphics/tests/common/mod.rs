//! Common utilities for RHI and renderer integration tests.
//!
//! Each test is parameterized over [`Backend`]; backends that are not
//! compiled in or cannot find an adapter are skipped.

use std::sync::Arc;

use lumen_core::math::{Mat4, Vec3};
use lumen_graphics::scene::{Material, StaticMesh, StaticMeshRef};
use lumen_graphics::{
    BackendType, BuiltinShaders, DeviceContext, DummyBackend, RendererSettings, Rhi,
    RhiParameters, SceneRenderer,
};

/// Install a test logger once per binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Available GPU backends for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// In-memory backend, always available.
    Dummy,
    /// wgpu backend on whatever adapter the host provides.
    Wgpu,
}

impl Backend {
    /// Check if this backend is compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Dummy => true,
            #[cfg(feature = "wgpu-backend")]
            Backend::Wgpu => true,
            #[cfg(not(feature = "wgpu-backend"))]
            Backend::Wgpu => false,
        }
    }

    #[allow(dead_code)]
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Dummy => "dummy",
            Backend::Wgpu => "wgpu",
        }
    }

    pub fn to_parameters(self) -> RhiParameters {
        let backend = match self {
            Backend::Dummy => BackendType::Dummy,
            Backend::Wgpu => BackendType::Wgpu,
        };
        RhiParameters::new()
            .with_backend(backend)
            .with_label(format!("Test Device ({})", self.name()))
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// Device, immediate context and built-in shaders for one test.
pub struct TestContext {
    #[allow(dead_code)]
    pub backend: Backend,
    /// Set for [`Backend::Dummy`] so tests can inspect recorded draws.
    #[allow(dead_code)]
    pub dummy: Option<Arc<DummyBackend>>,
    pub rhi: Arc<Rhi>,
    pub ctx: DeviceContext,
    #[allow(dead_code)]
    pub shaders: Arc<BuiltinShaders>,
}

impl TestContext {
    /// Create a new test context for the given backend.
    ///
    /// Returns `None` if the backend is not available.
    pub fn new(backend: Backend) -> Option<Self> {
        init_logging();
        if !backend.is_available() {
            return None;
        }

        let params = backend.to_parameters();
        let (dummy, rhi) = match backend {
            Backend::Dummy => {
                let dummy = Arc::new(DummyBackend::new());
                let rhi = Rhi::with_backend(dummy.clone(), params).ok()?;
                (Some(dummy), rhi)
            }
            Backend::Wgpu => (None, Rhi::new(params).ok()?),
        };
        let rhi = Arc::new(rhi);
        let shaders = BuiltinShaders::new(&rhi).ok()?;
        let ctx = rhi.create_immediate_context();

        Some(Self {
            backend,
            dummy,
            rhi,
            ctx,
            shaders,
        })
    }

    /// A dummy-backend context; panics if device creation fails.
    #[allow(dead_code)]
    pub fn dummy() -> Self {
        Self::new(Backend::Dummy).expect("dummy backend is always available")
    }

    /// The dummy backend behind this context.
    #[allow(dead_code)]
    pub fn dummy_backend(&self) -> &DummyBackend {
        self.dummy
            .as_deref()
            .expect("test requires the dummy backend")
    }

    #[allow(dead_code)]
    pub fn renderer(&self, settings: RendererSettings) -> SceneRenderer {
        SceneRenderer::new(self.rhi.clone(), self.shaders.clone(), settings)
    }

    /// A unit quad with the default mesh material.
    #[allow(dead_code)]
    pub fn quad_mesh(&self) -> StaticMeshRef {
        let material = Material::default_mesh(&self.rhi, &self.shaders).into_ref();
        StaticMesh::unit_quad(&self.rhi, &self.shaders, material).expect("create unit quad")
    }
}

/// Translation matrix for placing test primitives.
#[allow(dead_code)]
pub fn at(x: f32, y: f32, z: f32) -> Mat4 {
    lumen_core::math::mat4_from_translation(Vec3::new(x, y, z))
}
