//! Bound shader state and its deduplicating cache.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::backend::GpuBoundShaderState;

use super::{
    DomainShaderRef, GeometryShaderRef, HullShaderRef, PixelShaderRef, ResourceId,
    VertexDeclarationRef, VertexShaderRef,
};

/// Identity of a bound shader state: the ids of its declaration and shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoundShaderStateKey {
    pub declaration: ResourceId,
    pub vertex_shader: ResourceId,
    pub pixel_shader: ResourceId,
    pub hull_shader: Option<ResourceId>,
    pub domain_shader: Option<ResourceId>,
    pub geometry_shader: Option<ResourceId>,
}

/// An immutable (vertex declaration, shaders) tuple with its backend pipeline object.
pub struct BoundShaderState {
    id: ResourceId,
    key: BoundShaderStateKey,
    declaration: VertexDeclarationRef,
    vertex_shader: VertexShaderRef,
    pixel_shader: PixelShaderRef,
    hull_shader: Option<HullShaderRef>,
    domain_shader: Option<DomainShaderRef>,
    geometry_shader: Option<GeometryShaderRef>,
    gpu: GpuBoundShaderState,
}

impl BoundShaderState {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: ResourceId,
        declaration: VertexDeclarationRef,
        vertex_shader: VertexShaderRef,
        pixel_shader: PixelShaderRef,
        hull_shader: Option<HullShaderRef>,
        domain_shader: Option<DomainShaderRef>,
        geometry_shader: Option<GeometryShaderRef>,
        gpu: GpuBoundShaderState,
    ) -> Self {
        let key = BoundShaderStateKey {
            declaration: declaration.id(),
            vertex_shader: vertex_shader.id(),
            pixel_shader: pixel_shader.id(),
            hull_shader: hull_shader.as_ref().map(|s| s.id()),
            domain_shader: domain_shader.as_ref().map(|s| s.id()),
            geometry_shader: geometry_shader.as_ref().map(|s| s.id()),
        };
        Self {
            id,
            key,
            declaration,
            vertex_shader,
            pixel_shader,
            hull_shader,
            domain_shader,
            geometry_shader,
            gpu,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn key(&self) -> &BoundShaderStateKey {
        &self.key
    }

    pub fn declaration(&self) -> &VertexDeclarationRef {
        &self.declaration
    }

    pub fn vertex_shader(&self) -> &VertexShaderRef {
        &self.vertex_shader
    }

    pub fn pixel_shader(&self) -> &PixelShaderRef {
        &self.pixel_shader
    }

    pub fn hull_shader(&self) -> Option<&HullShaderRef> {
        self.hull_shader.as_ref()
    }

    pub fn domain_shader(&self) -> Option<&DomainShaderRef> {
        self.domain_shader.as_ref()
    }

    pub fn geometry_shader(&self) -> Option<&GeometryShaderRef> {
        self.geometry_shader.as_ref()
    }

    pub(crate) fn gpu(&self) -> &GpuBoundShaderState {
        &self.gpu
    }
}

impl std::fmt::Debug for BoundShaderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundShaderState")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish()
    }
}

static_assertions::assert_impl_all!(BoundShaderState: Send, Sync);

/// Lookup-or-insert cache of bound shader states.
///
/// Entries are weak: once every external handle is dropped the entry is dead
/// and is pruned on the next insert.
#[derive(Debug, Default)]
pub(crate) struct BoundShaderStateCache {
    entries: HashMap<BoundShaderStateKey, Weak<BoundShaderState>>,
}

impl BoundShaderStateCache {
    pub fn get(&self, key: &BoundShaderStateKey) -> Option<Arc<BoundShaderState>> {
        self.entries.get(key).and_then(Weak::upgrade)
    }

    pub fn insert(&mut self, state: &Arc<BoundShaderState>) {
        self.prune();
        self.entries.insert(state.key, Arc::downgrade(state));
    }

    /// Drop dead entries, returning how many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        before - self.entries.len()
    }

    /// Number of live entries.
    pub fn live_count(&self) -> usize {
        self.entries
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
