//! Common types and descriptors for graphics resources.
//!
//! This module contains format enums, usage flags, and descriptor structs
//! used throughout the RHI.

mod buffer;
mod common;
mod format;
mod primitive;
mod shader;
mod state;
mod texture;
mod vertex;

pub use buffer::{BufferDescriptor, BufferUsage, IndexFormat, LockMode};
pub use common::{ScissorRect, ViewUniforms, ViewportRect};
pub use format::{PixelFormat, PixelFormatInfo};
pub use primitive::{PrimitiveType, vertex_count_for_primitive_count};
pub use shader::{ShaderCompilerFlags, ShaderFrequency};
pub use state::{
    AddressMode, BlendFactor, BlendOperation, BlendStateDescriptor, CompareFunction, CullMode,
    DepthStateDescriptor, FillMode, RasterizerStateDescriptor, SamplerFilter,
    SamplerStateDescriptor,
};
pub use texture::{TextureCreateFlags, TextureDescriptor};
pub use vertex::{VertexElement, VertexElementType, VertexStepMode};
