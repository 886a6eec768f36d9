//! Vertex declaration element types.

/// Data type of one vertex element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexElementType {
    Float1,
    Float2,
    Float3,
    Float4,
    /// Four normalized unsigned bytes, used for packed colors.
    Color,
    UByte4,
    UInt1,
}

impl VertexElementType {
    pub fn size(self) -> u32 {
        match self {
            Self::Float1 | Self::Color | Self::UByte4 | Self::UInt1 => 4,
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
        }
    }
}

/// Whether a stream advances per vertex or per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    #[default]
    Vertex,
    Instance,
}

/// One attribute of a vertex declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexElement {
    /// Stream (vertex buffer slot) the element is read from.
    pub stream_index: u32,
    /// Byte offset inside one stream record.
    pub offset: u32,
    pub element_type: VertexElementType,
    /// Shader input location.
    pub attribute_index: u32,
    /// Record stride of the stream.
    pub stride: u32,
    pub step_mode: VertexStepMode,
}

impl VertexElement {
    pub fn new(
        stream_index: u32,
        offset: u32,
        element_type: VertexElementType,
        attribute_index: u32,
        stride: u32,
    ) -> Self {
        Self {
            stream_index,
            offset,
            element_type,
            attribute_index,
            stride,
            step_mode: VertexStepMode::Vertex,
        }
    }

    /// Mark the element as per-instance data.
    pub fn per_instance(mut self) -> Self {
        self.step_mode = VertexStepMode::Instance;
        self
    }
}
