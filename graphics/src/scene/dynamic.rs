//! Per-frame meshes built on the CPU.

use lumen_core::math::Mat4;

use crate::context::DeviceContext;
use crate::device::Rhi;
use crate::error::GraphicsError;
use crate::shaders::BuiltinShaders;
use crate::types::{BufferDescriptor, BufferUsage, IndexFormat, PrimitiveType};

use super::drawing_policy::DrawingPolicy;
use super::hit_proxy::HitProxyId;
use super::material::MaterialRef;
use super::vertex_factory::{
    INSTANCE_STREAM, InstanceData, InstanceFlags, LocalVertex, VertexFactory, instance_stride,
};
use super::view::SceneView;

/// Triangle mesh assembled for a single frame.
///
/// Buffers are created when the builder is drawn and released with it.
#[derive(Debug)]
pub struct DynamicMeshBuilder {
    vertices: Vec<LocalVertex>,
    indices: Vec<u32>,
}

impl Default for DynamicMeshBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicMeshBuilder {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Append a vertex and return its index.
    pub fn add_vertex(&mut self, vertex: LocalVertex) -> u32 {
        self.vertices.push(vertex);
        (self.vertices.len() - 1) as u32
    }

    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Finish the builder into an element drawn with `material`.
    pub fn build(
        self,
        material: MaterialRef,
        transform: Mat4,
        hit_proxy_id: HitProxyId,
    ) -> DynamicMeshBuilderElement {
        DynamicMeshBuilderElement {
            builder: self,
            material,
            transform,
            hit_proxy_id,
            flags: InstanceFlags::empty(),
        }
    }
}

/// A built dynamic mesh queued on a depth group.
#[derive(Debug)]
pub struct DynamicMeshBuilderElement {
    builder: DynamicMeshBuilder,
    material: MaterialRef,
    transform: Mat4,
    hit_proxy_id: HitProxyId,
    flags: InstanceFlags,
}

impl DynamicMeshBuilderElement {
    pub fn with_flags(mut self, flags: InstanceFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn material(&self) -> &MaterialRef {
        &self.material
    }

    pub fn hit_proxy_id(&self) -> HitProxyId {
        self.hit_proxy_id
    }

    /// Upload and draw through policy `P`. Empty builders draw nothing.
    pub fn draw<P: DrawingPolicy>(
        &self,
        rhi: &Rhi,
        ctx: &mut DeviceContext,
        shaders: &BuiltinShaders,
        view: &SceneView,
    ) -> Result<bool, GraphicsError> {
        let builder = &self.builder;
        if builder.is_empty() {
            return Ok(false);
        }
        if let Some(&bad) = builder
            .indices
            .iter()
            .find(|&&i| i as usize >= builder.vertices.len())
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "dynamic mesh index {bad} exceeds {} vertices",
                builder.vertices.len()
            )));
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&builder.vertices);
        let vertex_buffer = rhi.create_vertex_buffer(
            BufferDescriptor::new(vertex_bytes.len() as u64, BufferUsage::DYNAMIC)
                .with_label("DynamicMesh vertices"),
            Some(vertex_bytes),
        )?;
        let index_bytes: &[u8] = bytemuck::cast_slice(&builder.indices);
        let index_buffer = rhi.create_index_buffer(
            BufferDescriptor::new(index_bytes.len() as u64, BufferUsage::DYNAMIC)
                .with_label("DynamicMesh indices"),
            IndexFormat::Uint32,
            Some(index_bytes),
        )?;
        let instance = InstanceData::new(&self.transform, self.hit_proxy_id, self.flags);
        let instance_buffer = rhi.create_vertex_buffer(
            BufferDescriptor::new(instance_stride() as u64, BufferUsage::DYNAMIC)
                .with_label("DynamicMesh instance"),
            Some(bytemuck::bytes_of(&instance)),
        )?;

        let factory = VertexFactory::local(rhi, &shaders.local_declaration, vertex_buffer);
        let policy = P::new(factory, self.material.clone());
        let state = policy.create_bound_shader_state(rhi)?;
        ctx.set_bound_shader_state(&state);
        policy.vertex_factory().set_streams(ctx)?;
        ctx.set_stream_source(INSTANCE_STREAM, Some(&instance_buffer), 0, instance_stride())?;
        policy.set_render_state(rhi, ctx, view)?;
        rhi.draw_indexed_primitive(
            ctx,
            &index_buffer,
            PrimitiveType::TriangleList,
            0,
            0,
            builder.num_triangles() as u32,
            1,
        )?;
        Ok(true)
    }
}
