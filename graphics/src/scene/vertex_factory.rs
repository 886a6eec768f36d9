//! Vertex formats and the vertex factories that bind them.

use std::sync::Arc;

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use lumen_core::Color;

use crate::context::DeviceContext;
use crate::device::Rhi;
use crate::error::GraphicsError;
use crate::resources::{ResourceId, VertexBufferRef, VertexDeclarationRef};
use crate::types::{VertexElement, VertexElementType};

/// Stream carrying per-vertex data.
pub const VERTEX_STREAM: u32 = 0;
/// Stream carrying per-instance [`InstanceData`].
pub const INSTANCE_STREAM: u32 = 1;

/// Vertex of static meshes, sprites and dynamic mesh builders.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct LocalVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
    pub color: [u8; 4],
}

impl LocalVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2], color: Color) -> Self {
        Self {
            position,
            normal,
            tex_coord,
            color: color.to_bytes(),
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InstanceFlags: u32 {
        const SELECTED = 1 << 0;
    }
}

/// Per-instance record appended by primitives each frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    /// Column-major local-to-world matrix.
    pub transform: [[f32; 4]; 4],
    pub hit_proxy_color: [u8; 4],
    pub flags: u32,
}

static_assertions::const_assert_eq!(std::mem::size_of::<LocalVertex>(), 36);
static_assertions::const_assert_eq!(std::mem::size_of::<InstanceData>(), 72);

/// Vertex of simple elements (lines, points, screen quads).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct SimpleElementVertex {
    pub position: [f32; 4],
    pub tex_coord: [f32; 2],
    pub color: [u8; 4],
}

static_assertions::const_assert_eq!(std::mem::size_of::<SimpleElementVertex>(), 28);

const LOCAL_STRIDE: u32 = std::mem::size_of::<LocalVertex>() as u32;
const INSTANCE_STRIDE: u32 = std::mem::size_of::<InstanceData>() as u32;
const SIMPLE_STRIDE: u32 = std::mem::size_of::<SimpleElementVertex>() as u32;

/// Elements of [`LocalVertex`] on stream 0 and [`InstanceData`] on stream 1.
pub fn local_vertex_elements() -> Vec<VertexElement> {
    let instance = |offset, ty, attribute| {
        VertexElement::new(INSTANCE_STREAM, offset, ty, attribute, INSTANCE_STRIDE).per_instance()
    };
    vec![
        VertexElement::new(VERTEX_STREAM, 0, VertexElementType::Float3, 0, LOCAL_STRIDE),
        VertexElement::new(VERTEX_STREAM, 12, VertexElementType::Float3, 1, LOCAL_STRIDE),
        VertexElement::new(VERTEX_STREAM, 24, VertexElementType::Float2, 2, LOCAL_STRIDE),
        VertexElement::new(VERTEX_STREAM, 32, VertexElementType::Color, 3, LOCAL_STRIDE),
        instance(0, VertexElementType::Float4, 4),
        instance(16, VertexElementType::Float4, 5),
        instance(32, VertexElementType::Float4, 6),
        instance(48, VertexElementType::Float4, 7),
        instance(64, VertexElementType::Color, 8),
        instance(68, VertexElementType::UInt1, 9),
    ]
}

pub fn simple_element_vertex_elements() -> Vec<VertexElement> {
    vec![
        VertexElement::new(0, 0, VertexElementType::Float4, 0, SIMPLE_STRIDE),
        VertexElement::new(0, 16, VertexElementType::Float2, 1, SIMPLE_STRIDE),
        VertexElement::new(0, 24, VertexElementType::Color, 2, SIMPLE_STRIDE),
    ]
}

pub(crate) fn instance_stride() -> u32 {
    INSTANCE_STRIDE
}

pub(crate) fn simple_element_stride() -> u32 {
    SIMPLE_STRIDE
}

/// Vertex declaration plus the vertex stream it reads.
///
/// Draw-list links are keyed by the factory id, so meshes that share a
/// factory share links.
#[derive(Debug)]
pub struct VertexFactory {
    id: ResourceId,
    declaration: VertexDeclarationRef,
    vertex_buffer: VertexBufferRef,
    stride: u32,
}

pub type VertexFactoryRef = Arc<VertexFactory>;

impl VertexFactory {
    /// Factory over a buffer of [`LocalVertex`].
    pub fn local(
        rhi: &Rhi,
        declaration: &VertexDeclarationRef,
        vertex_buffer: VertexBufferRef,
    ) -> VertexFactoryRef {
        Arc::new(Self {
            id: rhi.allocate_id(),
            declaration: declaration.clone(),
            vertex_buffer,
            stride: LOCAL_STRIDE,
        })
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn declaration(&self) -> &VertexDeclarationRef {
        &self.declaration
    }

    pub fn vertex_buffer(&self) -> &VertexBufferRef {
        &self.vertex_buffer
    }

    pub fn num_vertices(&self) -> u32 {
        (self.vertex_buffer.size() / self.stride as u64) as u32
    }

    /// Bind the vertex stream. The instance stream is bound by the draw list.
    pub fn set_streams(&self, ctx: &mut DeviceContext) -> Result<(), GraphicsError> {
        ctx.set_stream_source(VERTEX_STREAM, Some(&self.vertex_buffer), 0, self.stride)
    }
}

impl InstanceData {
    pub fn new(
        transform: &lumen_core::math::Mat4,
        hit_proxy_id: crate::scene::HitProxyId,
        flags: InstanceFlags,
    ) -> Self {
        Self {
            transform: lumen_core::math::mat4_to_cols_array_2d(transform),
            hit_proxy_color: hit_proxy_id.to_color().to_bytes(),
            flags: flags.bits(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_elements_cover_stride() {
        let elements = local_vertex_elements();
        let vertex_end = elements
            .iter()
            .filter(|e| e.stream_index == VERTEX_STREAM)
            .map(|e| e.offset + e.element_type.size())
            .max()
            .unwrap();
        let instance_end = elements
            .iter()
            .filter(|e| e.stream_index == INSTANCE_STREAM)
            .map(|e| e.offset + e.element_type.size())
            .max()
            .unwrap();
        assert_eq!(vertex_end, LOCAL_STRIDE);
        assert_eq!(instance_end, INSTANCE_STRIDE);
    }

    #[test]
    fn test_attribute_indices_unique() {
        let mut attributes: Vec<u32> = local_vertex_elements()
            .iter()
            .map(|e| e.attribute_index)
            .collect();
        attributes.sort_unstable();
        attributes.dedup();
        assert_eq!(attributes.len(), 10);
    }
}
