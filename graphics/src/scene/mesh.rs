//! Mesh batches and static meshes.

use std::sync::Arc;

use lumen_core::Aabb;
use lumen_core::math::Vec3;

use crate::device::Rhi;
use crate::error::GraphicsError;
use crate::resources::{IndexBufferRef, ResourceId};
use crate::shaders::BuiltinShaders;
use crate::types::{BufferDescriptor, BufferUsage, IndexFormat, PrimitiveType};

use super::draw_list::{DrawingPolicyLinkRef, MeshDrawList};
use super::drawing_policy::DrawingPolicy;
use super::material::MaterialRef;
use super::vertex_factory::{LocalVertex, VertexFactory, VertexFactoryRef};

/// One indexed draw range.
#[derive(Debug, Clone)]
pub struct MeshBatchElement {
    pub index_buffer: IndexBufferRef,
    pub base_vertex_index: i32,
    pub first_index: u32,
    pub num_primitives: u32,
}

/// Elements drawn with one material in one instanced call each.
#[derive(Debug, Clone)]
pub struct MeshBatch {
    pub primitive_type: PrimitiveType,
    pub elements: Vec<MeshBatchElement>,
}

/// Geometry identity of a [`MeshBatch`]; equal keys share one registered batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct MeshBatchKey {
    primitive_type: PrimitiveType,
    elements: Vec<(ResourceId, i32, u32, u32)>,
}

impl MeshBatch {
    pub fn new(primitive_type: PrimitiveType, elements: Vec<MeshBatchElement>) -> Self {
        Self {
            primitive_type,
            elements,
        }
    }

    pub(crate) fn key(&self) -> MeshBatchKey {
        MeshBatchKey {
            primitive_type: self.primitive_type,
            elements: self
                .elements
                .iter()
                .map(|e| {
                    (
                        e.index_buffer.id(),
                        e.base_vertex_index,
                        e.first_index,
                        e.num_primitives,
                    )
                })
                .collect(),
        }
    }
}

/// Index range of a static mesh drawn with one material slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticMeshSection {
    pub material_index: usize,
    pub base_vertex_index: i32,
    pub first_index: u32,
    pub num_primitives: u32,
}

/// GPU geometry with per-section material slots.
#[derive(Debug)]
pub struct StaticMesh {
    name: String,
    vertex_factory: VertexFactoryRef,
    index_buffer: IndexBufferRef,
    sections: Vec<StaticMeshSection>,
    materials: Vec<MaterialRef>,
    bounds: Aabb,
}

pub type StaticMeshRef = Arc<StaticMesh>;

impl StaticMesh {
    /// Upload a triangle-list mesh.
    pub fn new(
        rhi: &Rhi,
        shaders: &BuiltinShaders,
        name: impl Into<String>,
        vertices: &[LocalVertex],
        indices: &[u32],
        sections: Vec<StaticMeshSection>,
        materials: Vec<MaterialRef>,
    ) -> Result<StaticMeshRef, GraphicsError> {
        let name = name.into();
        for section in &sections {
            if section.material_index >= materials.len() {
                return Err(GraphicsError::InvalidParameter(format!(
                    "mesh '{name}': section material {} of {}",
                    section.material_index,
                    materials.len()
                )));
            }
            let end = section.first_index as u64 + section.num_primitives as u64 * 3;
            if end > indices.len() as u64 {
                return Err(GraphicsError::InvalidParameter(format!(
                    "mesh '{name}': section indices end at {end}, mesh has {}",
                    indices.len()
                )));
            }
        }

        let vertex_buffer = rhi.create_vertex_buffer(
            BufferDescriptor::new(std::mem::size_of_val(vertices) as u64, BufferUsage::STATIC)
                .with_label(format!("{name} vertices")),
            Some(bytemuck::cast_slice(vertices)),
        )?;
        let index_buffer = rhi.create_index_buffer(
            BufferDescriptor::new(std::mem::size_of_val(indices) as u64, BufferUsage::STATIC)
                .with_label(format!("{name} indices")),
            IndexFormat::Uint32,
            Some(bytemuck::cast_slice(indices)),
        )?;

        let mut bounds = Aabb::empty();
        for vertex in vertices {
            bounds.grow(&Vec3::from(vertex.position));
        }

        Ok(Arc::new(Self {
            vertex_factory: VertexFactory::local(rhi, &shaders.local_declaration, vertex_buffer),
            index_buffer,
            sections,
            materials,
            bounds,
            name,
        }))
    }

    /// A unit quad in the XY plane centered on the origin, as used by sprites.
    pub fn unit_quad(
        rhi: &Rhi,
        shaders: &BuiltinShaders,
        material: MaterialRef,
    ) -> Result<StaticMeshRef, GraphicsError> {
        let white = lumen_core::Color::WHITE;
        let normal = [0.0, 0.0, 1.0];
        let vertices = [
            LocalVertex::new([-0.5, -0.5, 0.0], normal, [0.0, 1.0], white),
            LocalVertex::new([0.5, -0.5, 0.0], normal, [1.0, 1.0], white),
            LocalVertex::new([0.5, 0.5, 0.0], normal, [1.0, 0.0], white),
            LocalVertex::new([-0.5, 0.5, 0.0], normal, [0.0, 0.0], white),
        ];
        Self::new(
            rhi,
            shaders,
            "UnitQuad",
            &vertices,
            &[0, 1, 2, 0, 2, 3],
            vec![StaticMeshSection {
                material_index: 0,
                base_vertex_index: 0,
                first_index: 0,
                num_primitives: 2,
            }],
            vec![material],
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_factory(&self) -> &VertexFactoryRef {
        &self.vertex_factory
    }

    pub fn index_buffer(&self) -> &IndexBufferRef {
        &self.index_buffer
    }

    pub fn sections(&self) -> &[StaticMeshSection] {
        &self.sections
    }

    pub fn materials(&self) -> &[MaterialRef] {
        &self.materials
    }

    /// Local-space bounds of all vertices.
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Material of a slot, with `overrides[slot]` taking precedence.
    pub fn material(&self, slot: usize, overrides: &[Option<MaterialRef>]) -> Option<MaterialRef> {
        overrides
            .get(slot)
            .cloned()
            .flatten()
            .or_else(|| self.materials.get(slot).cloned())
    }

    /// One batch per material slot that has sections.
    pub fn mesh_batches(&self, overrides: &[Option<MaterialRef>]) -> Vec<(MaterialRef, MeshBatch)> {
        let mut batches = Vec::new();
        for slot in 0..self.materials.len() {
            let elements: Vec<_> = self
                .sections
                .iter()
                .filter(|s| s.material_index == slot)
                .map(|s| MeshBatchElement {
                    index_buffer: self.index_buffer.clone(),
                    base_vertex_index: s.base_vertex_index,
                    first_index: s.first_index,
                    num_primitives: s.num_primitives,
                })
                .collect();
            if elements.is_empty() {
                continue;
            }
            if let Some(material) = self.material(slot, overrides) {
                batches.push((material, MeshBatch::new(PrimitiveType::TriangleList, elements)));
            }
        }
        batches
    }

    /// Register every batch of this mesh in `list`.
    pub fn link_draw_list<P: DrawingPolicy>(
        &self,
        list: &mut MeshDrawList<P>,
        overrides: &[Option<MaterialRef>],
    ) -> Vec<DrawingPolicyLinkRef> {
        self.mesh_batches(overrides)
            .into_iter()
            .map(|(material, batch)| list.add_item(P::new(self.vertex_factory.clone(), material), batch))
            .collect()
    }
}
