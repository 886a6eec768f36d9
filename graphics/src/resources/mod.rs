//! RHI resources.
//!
//! Every resource is created by the [`Rhi`](crate::Rhi), owns exactly one
//! backend object and is shared through an [`Arc`] handle. The backend object
//! is released when the last handle drops.
//!
//! - [`VertexBuffer`] / [`IndexBuffer`] - lockable GPU memory
//! - [`Texture2D`] - 2D textures and render surfaces
//! - [`Shader`] - one compiled shader stage
//! - [`VertexDeclaration`] - vertex input layout
//! - [`RasterizerState`], [`BlendState`], [`DepthState`], [`SamplerState`]
//! - [`BoundShaderState`] - deduplicated (declaration, shaders) pipeline tuple

mod bound_shader_state;
mod buffer;
mod shader;
mod state;
mod static_states;
mod texture;
mod vertex_declaration;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub use bound_shader_state::{BoundShaderState, BoundShaderStateKey};
pub(crate) use bound_shader_state::BoundShaderStateCache;
pub(crate) use buffer::BufferCore;
pub use buffer::{IndexBuffer, LockedData, VertexBuffer};
pub use shader::Shader;
pub use state::{BlendState, DepthState, RasterizerState, SamplerState};
pub use static_states::StaticStates;
pub use texture::Texture2D;
pub use vertex_declaration::VertexDeclaration;

/// Identity of an RHI resource, unique within the [`Rhi`](crate::Rhi) that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u64);

impl ResourceId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out [`ResourceId`]s.
#[derive(Debug)]
pub(crate) struct IdAllocator(AtomicU64);

impl IdAllocator {
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn next(&self) -> ResourceId {
        ResourceId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

pub type VertexBufferRef = Arc<VertexBuffer>;
pub type IndexBufferRef = Arc<IndexBuffer>;
pub type Texture2DRef = Arc<Texture2D>;
/// A texture used as a render target.
pub type SurfaceRef = Arc<Texture2D>;
pub type VertexShaderRef = Arc<Shader>;
pub type PixelShaderRef = Arc<Shader>;
pub type HullShaderRef = Arc<Shader>;
pub type DomainShaderRef = Arc<Shader>;
pub type GeometryShaderRef = Arc<Shader>;
pub type VertexDeclarationRef = Arc<VertexDeclaration>;
pub type RasterizerStateRef = Arc<RasterizerState>;
pub type BlendStateRef = Arc<BlendState>;
pub type DepthStateRef = Arc<DepthState>;
pub type SamplerStateRef = Arc<SamplerState>;
pub type BoundShaderStateRef = Arc<BoundShaderState>;
