//! Drawing policies: how a (vertex factory, material) pair is bound for a pass.

use crate::context::DeviceContext;
use crate::device::Rhi;
use crate::error::GraphicsError;
use crate::resources::{BoundShaderStateRef, ResourceId};

use super::material::MaterialRef;
use super::vertex_factory::VertexFactoryRef;
use super::view::{SceneView, ShowFlags};

/// Identity a draw-list link is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawingPolicyKey {
    pub vertex_factory: ResourceId,
    pub material: ResourceId,
}

/// Binds shaders and render state for every mesh drawn through one link.
pub trait DrawingPolicy: Send + Sync + 'static {
    fn new(vertex_factory: VertexFactoryRef, material: MaterialRef) -> Self
    where
        Self: Sized;

    fn vertex_factory(&self) -> &VertexFactoryRef;

    fn material(&self) -> &MaterialRef;

    fn key(&self) -> DrawingPolicyKey {
        DrawingPolicyKey {
            vertex_factory: self.vertex_factory().id(),
            material: self.material().id(),
        }
    }

    /// Shader combination for this policy, looked up through the device cache.
    fn create_bound_shader_state(&self, rhi: &Rhi) -> Result<BoundShaderStateRef, GraphicsError>;

    /// Rasterizer state and shader parameters. Streams and the bound shader
    /// state are set by the draw list.
    fn set_render_state(
        &self,
        rhi: &Rhi,
        ctx: &mut DeviceContext,
        view: &SceneView,
    ) -> Result<(), GraphicsError>;
}

/// Color pass drawing with the material's shaders.
#[derive(Debug, Clone)]
pub struct MeshDrawingPolicy {
    vertex_factory: VertexFactoryRef,
    material: MaterialRef,
}

impl DrawingPolicy for MeshDrawingPolicy {
    fn new(vertex_factory: VertexFactoryRef, material: MaterialRef) -> Self {
        Self {
            vertex_factory,
            material,
        }
    }

    fn vertex_factory(&self) -> &VertexFactoryRef {
        &self.vertex_factory
    }

    fn material(&self) -> &MaterialRef {
        &self.material
    }

    fn create_bound_shader_state(&self, rhi: &Rhi) -> Result<BoundShaderStateRef, GraphicsError> {
        rhi.create_bound_shader_state(
            self.vertex_factory.declaration(),
            self.material.vertex_shader(),
            self.material.pixel_shader(),
            None,
            None,
            None,
        )
    }

    fn set_render_state(
        &self,
        rhi: &Rhi,
        ctx: &mut DeviceContext,
        view: &SceneView,
    ) -> Result<(), GraphicsError> {
        let wireframe = view.show_flags().contains(ShowFlags::WIREFRAME);
        ctx.set_rasterizer_state(self.material.rasterizer_state(rhi.static_states(), wireframe));
        self.material.set_parameters(rhi, ctx)
    }
}

/// Hit-proxy pass writing each instance's hit-proxy color.
#[derive(Debug, Clone)]
pub struct HitProxyDrawingPolicy {
    vertex_factory: VertexFactoryRef,
    material: MaterialRef,
}

impl DrawingPolicy for HitProxyDrawingPolicy {
    fn new(vertex_factory: VertexFactoryRef, material: MaterialRef) -> Self {
        Self {
            vertex_factory,
            material,
        }
    }

    fn vertex_factory(&self) -> &VertexFactoryRef {
        &self.vertex_factory
    }

    fn material(&self) -> &MaterialRef {
        &self.material
    }

    fn create_bound_shader_state(&self, rhi: &Rhi) -> Result<BoundShaderStateRef, GraphicsError> {
        rhi.create_bound_shader_state(
            self.vertex_factory.declaration(),
            self.material.hit_proxy_vertex_shader(),
            self.material.hit_proxy_pixel_shader(),
            None,
            None,
            None,
        )
    }

    fn set_render_state(
        &self,
        rhi: &Rhi,
        ctx: &mut DeviceContext,
        view: &SceneView,
    ) -> Result<(), GraphicsError> {
        let wireframe = view.show_flags().contains(ShowFlags::WIREFRAME);
        ctx.set_rasterizer_state(self.material.rasterizer_state(rhi.static_states(), wireframe));
        Ok(())
    }
}
