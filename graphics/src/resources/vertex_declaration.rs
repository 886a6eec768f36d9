//! Vertex input layout.

use crate::types::{VertexElement, VertexStepMode};

use super::ResourceId;

/// An immutable list of vertex elements.
#[derive(Debug)]
pub struct VertexDeclaration {
    id: ResourceId,
    elements: Vec<VertexElement>,
}

impl VertexDeclaration {
    pub(crate) fn new(id: ResourceId, elements: Vec<VertexElement>) -> Self {
        Self { id, elements }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    /// Number of streams referenced (highest stream index + 1).
    pub fn stream_count(&self) -> u32 {
        self.elements
            .iter()
            .map(|e| e.stream_index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Stride and step mode of a stream, if any element reads it.
    pub fn stream_layout(&self, stream: u32) -> Option<(u32, VertexStepMode)> {
        self.elements
            .iter()
            .find(|e| e.stream_index == stream)
            .map(|e| (e.stride, e.step_mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VertexElementType;

    #[test]
    fn test_stream_layout() {
        let decl = VertexDeclaration::new(
            ResourceId(1),
            vec![
                VertexElement::new(0, 0, VertexElementType::Float3, 0, 12),
                VertexElement::new(2, 0, VertexElementType::Float4, 1, 16).per_instance(),
            ],
        );
        assert_eq!(decl.stream_count(), 3);
        assert_eq!(decl.stream_layout(0), Some((12, VertexStepMode::Vertex)));
        assert_eq!(decl.stream_layout(2), Some((16, VertexStepMode::Instance)));
        assert_eq!(decl.stream_layout(1), None);
    }
}
