//! Fixed-function state descriptors: rasterizer, blend, depth and sampler.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    #[default]
    Solid,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

/// Rasterizer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RasterizerStateDescriptor {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub depth_clip: bool,
}

impl RasterizerStateDescriptor {
    pub fn new(fill_mode: FillMode, cull_mode: CullMode) -> Self {
        Self {
            fill_mode,
            cull_mode,
            depth_clip: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOperation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SourceColor,
    InverseSourceColor,
    SourceAlpha,
    InverseSourceAlpha,
    DestAlpha,
    InverseDestAlpha,
    DestColor,
    InverseDestColor,
}

/// Blend state of the single color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendStateDescriptor {
    pub color_op: BlendOperation,
    pub color_src: BlendFactor,
    pub color_dst: BlendFactor,
    pub alpha_op: BlendOperation,
    pub alpha_src: BlendFactor,
    pub alpha_dst: BlendFactor,
}

impl Default for BlendStateDescriptor {
    /// Opaque: source replaces destination.
    fn default() -> Self {
        Self {
            color_op: BlendOperation::Add,
            color_src: BlendFactor::One,
            color_dst: BlendFactor::Zero,
            alpha_op: BlendOperation::Add,
            alpha_src: BlendFactor::One,
            alpha_dst: BlendFactor::Zero,
        }
    }
}

impl BlendStateDescriptor {
    pub fn additive() -> Self {
        Self {
            color_dst: BlendFactor::One,
            alpha_dst: BlendFactor::One,
            ..Default::default()
        }
    }

    pub fn translucent() -> Self {
        Self {
            color_src: BlendFactor::SourceAlpha,
            color_dst: BlendFactor::InverseSourceAlpha,
            alpha_src: BlendFactor::One,
            alpha_dst: BlendFactor::InverseSourceAlpha,
            ..Default::default()
        }
    }

    pub fn is_opaque(&self) -> bool {
        *self == Self::default()
    }
}

/// Comparison function for depth tests and comparison samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Depth test and write state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStateDescriptor {
    pub enable_depth_write: bool,
    pub depth_test: CompareFunction,
}

impl Default for DepthStateDescriptor {
    fn default() -> Self {
        Self {
            enable_depth_write: true,
            depth_test: CompareFunction::LessEqual,
        }
    }
}

impl DepthStateDescriptor {
    pub fn new(enable_depth_write: bool, depth_test: CompareFunction) -> Self {
        Self {
            enable_depth_write,
            depth_test,
        }
    }

    /// No depth test, no depth write.
    pub fn disabled() -> Self {
        Self::new(false, CompareFunction::Always)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerFilter {
    #[default]
    Point,
    Bilinear,
    Trilinear,
    Anisotropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    Wrap,
    #[default]
    Clamp,
    Mirror,
}

/// Sampler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerStateDescriptor {
    pub filter: SamplerFilter,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub max_anisotropy: u16,
}

impl SamplerStateDescriptor {
    pub fn new(filter: SamplerFilter, address: AddressMode) -> Self {
        Self {
            filter,
            address_u: address,
            address_v: address,
            address_w: address,
            max_anisotropy: if filter == SamplerFilter::Anisotropic { 8 } else { 1 },
        }
    }
}
