//! Type conversions between RHI types and wgpu types.

use crate::error::GraphicsError;
use crate::types::{
    AddressMode, BlendFactor, BlendOperation, BlendStateDescriptor, BufferUsage, CompareFunction,
    CullMode, DepthStateDescriptor, FillMode, PixelFormat, PrimitiveType,
    RasterizerStateDescriptor, SamplerFilter, TextureCreateFlags, VertexElementType,
    VertexStepMode,
};

/// Convert BufferUsage flags to wgpu buffer usages.
///
/// Every buffer is a copy source and destination: updates and read locks go
/// through staging copies.
pub fn convert_buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
    let mut result = wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC;

    if usage.contains(BufferUsage::VERTEX) {
        result |= wgpu::BufferUsages::VERTEX;
    }
    if usage.contains(BufferUsage::INDEX) {
        result |= wgpu::BufferUsages::INDEX;
    }

    result
}

/// Convert PixelFormat to wgpu format.
///
/// `A8R8G8B8` is stored in R, G, B, A byte order, so it maps to `Rgba8Unorm`.
pub fn convert_pixel_format(format: PixelFormat) -> Result<wgpu::TextureFormat, GraphicsError> {
    match format {
        PixelFormat::A8R8G8B8 => Ok(wgpu::TextureFormat::Rgba8Unorm),
        PixelFormat::FloatRGBA => Ok(wgpu::TextureFormat::Rgba16Float),
        PixelFormat::DepthStencil => Ok(wgpu::TextureFormat::Depth32Float),
        PixelFormat::Unknown => Err(GraphicsError::InvalidParameter(
            "unknown pixel format".into(),
        )),
    }
}

/// Convert TextureCreateFlags to wgpu texture usages.
pub fn convert_texture_flags(flags: TextureCreateFlags) -> wgpu::TextureUsages {
    let mut result = wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC;

    if flags.contains(TextureCreateFlags::SHADER_RESOURCE) {
        result |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if flags.intersects(
        TextureCreateFlags::RENDER_TARGET
            | TextureCreateFlags::DEPTH_STENCIL
            | TextureCreateFlags::PRESENTABLE,
    ) {
        result |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    // Back buffers are blitted to the swap chain.
    if flags.contains(TextureCreateFlags::PRESENTABLE) {
        result |= wgpu::TextureUsages::TEXTURE_BINDING;
    }

    result
}

pub fn convert_address_mode(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::Wrap => wgpu::AddressMode::Repeat,
        AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
        AddressMode::Mirror => wgpu::AddressMode::MirrorRepeat,
    }
}

/// Min/mag filter and mip filter for a sampler filter.
pub fn convert_sampler_filter(filter: SamplerFilter) -> (wgpu::FilterMode, wgpu::MipmapFilterMode) {
    match filter {
        SamplerFilter::Point => (wgpu::FilterMode::Nearest, wgpu::MipmapFilterMode::Nearest),
        SamplerFilter::Bilinear => (wgpu::FilterMode::Linear, wgpu::MipmapFilterMode::Nearest),
        SamplerFilter::Trilinear | SamplerFilter::Anisotropic => {
            (wgpu::FilterMode::Linear, wgpu::MipmapFilterMode::Linear)
        }
    }
}

/// Convert CompareFunction to wgpu compare function.
pub fn convert_compare_function(func: CompareFunction) -> wgpu::CompareFunction {
    match func {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

fn convert_blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SourceColor => wgpu::BlendFactor::Src,
        BlendFactor::InverseSourceColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SourceAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::InverseSourceAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DestAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::InverseDestAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::DestColor => wgpu::BlendFactor::Dst,
        BlendFactor::InverseDestColor => wgpu::BlendFactor::OneMinusDst,
    }
}

fn convert_blend_operation(op: BlendOperation) -> wgpu::BlendOperation {
    match op {
        BlendOperation::Add => wgpu::BlendOperation::Add,
        BlendOperation::Subtract => wgpu::BlendOperation::Subtract,
        BlendOperation::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendOperation::Min => wgpu::BlendOperation::Min,
        BlendOperation::Max => wgpu::BlendOperation::Max,
    }
}

/// Convert a blend state; opaque blending disables the blend unit.
pub fn convert_blend_state(desc: &BlendStateDescriptor) -> Option<wgpu::BlendState> {
    if desc.is_opaque() {
        return None;
    }
    Some(wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: convert_blend_factor(desc.color_src),
            dst_factor: convert_blend_factor(desc.color_dst),
            operation: convert_blend_operation(desc.color_op),
        },
        alpha: wgpu::BlendComponent {
            src_factor: convert_blend_factor(desc.alpha_src),
            dst_factor: convert_blend_factor(desc.alpha_dst),
            operation: convert_blend_operation(desc.alpha_op),
        },
    })
}

pub fn convert_primitive_state(
    primitive_type: PrimitiveType,
    rasterizer: &RasterizerStateDescriptor,
) -> Result<wgpu::PrimitiveState, GraphicsError> {
    let topology = match primitive_type {
        PrimitiveType::PointList => wgpu::PrimitiveTopology::PointList,
        PrimitiveType::LineList => wgpu::PrimitiveTopology::LineList,
        PrimitiveType::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveType::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        PrimitiveType::QuadList => {
            return Err(GraphicsError::UnsupportedPrimitiveType(
                "quad lists are not supported by wgpu".into(),
            ));
        }
    };
    let cull_mode = match rasterizer.cull_mode {
        CullMode::None => None,
        CullMode::Front => Some(wgpu::Face::Front),
        CullMode::Back => Some(wgpu::Face::Back),
    };
    let polygon_mode = match rasterizer.fill_mode {
        FillMode::Solid => wgpu::PolygonMode::Fill,
        FillMode::Wireframe => wgpu::PolygonMode::Line,
    };
    Ok(wgpu::PrimitiveState {
        topology,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode,
        unclipped_depth: !rasterizer.depth_clip,
        polygon_mode,
        conservative: false,
    })
}

pub fn convert_depth_state(
    desc: &DepthStateDescriptor,
    format: wgpu::TextureFormat,
) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format,
        depth_write_enabled: desc.enable_depth_write,
        depth_compare: convert_compare_function(desc.depth_test),
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

pub fn convert_vertex_format(element_type: VertexElementType) -> wgpu::VertexFormat {
    match element_type {
        VertexElementType::Float1 => wgpu::VertexFormat::Float32,
        VertexElementType::Float2 => wgpu::VertexFormat::Float32x2,
        VertexElementType::Float3 => wgpu::VertexFormat::Float32x3,
        VertexElementType::Float4 => wgpu::VertexFormat::Float32x4,
        VertexElementType::Color => wgpu::VertexFormat::Unorm8x4,
        VertexElementType::UByte4 => wgpu::VertexFormat::Uint8x4,
        VertexElementType::UInt1 => wgpu::VertexFormat::Uint32,
    }
}

pub fn convert_step_mode(mode: VertexStepMode) -> wgpu::VertexStepMode {
    match mode {
        VertexStepMode::Vertex => wgpu::VertexStepMode::Vertex,
        VertexStepMode::Instance => wgpu::VertexStepMode::Instance,
    }
}

pub fn convert_present_mode(lock_to_vsync: bool) -> wgpu::PresentMode {
    if lock_to_vsync {
        wgpu::PresentMode::AutoVsync
    } else {
        wgpu::PresentMode::AutoNoVsync
    }
}
