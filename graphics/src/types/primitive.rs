//! Primitive topologies and the primitive-to-vertex count rule.

use crate::error::GraphicsError;

/// Primitive topology of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum PrimitiveType {
    PointList = 0,
    LineList = 1,
    #[default]
    TriangleList = 2,
    TriangleStrip = 3,
    /// Quads are not a hardware topology on any supported backend.
    QuadList = 4,
}

impl TryFrom<u32> for PrimitiveType {
    type Error = GraphicsError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::PointList),
            1 => Ok(Self::LineList),
            2 => Ok(Self::TriangleList),
            3 => Ok(Self::TriangleStrip),
            4 => Ok(Self::QuadList),
            other => Err(GraphicsError::UnsupportedPrimitiveType(format!(
                "raw primitive type {other}"
            ))),
        }
    }
}

/// Number of vertices consumed by `primitive_count` primitives of `primitive_type`.
///
/// Point list = N, line list = 2N, triangle list = 3N, triangle strip = N + 2.
pub fn vertex_count_for_primitive_count(
    primitive_count: u32,
    primitive_type: PrimitiveType,
) -> Result<u32, GraphicsError> {
    let count = match primitive_type {
        PrimitiveType::PointList => Some(primitive_count),
        PrimitiveType::LineList => primitive_count.checked_mul(2),
        PrimitiveType::TriangleList => primitive_count.checked_mul(3),
        PrimitiveType::TriangleStrip => primitive_count.checked_add(2),
        PrimitiveType::QuadList => {
            return Err(GraphicsError::UnsupportedPrimitiveType(format!(
                "{primitive_type:?}"
            )));
        }
    };
    count.ok_or_else(|| {
        GraphicsError::InvalidParameter(format!(
            "{primitive_count} {primitive_type:?} primitives overflow the vertex count"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::points(PrimitiveType::PointList, 7, 7)]
    #[case::lines(PrimitiveType::LineList, 7, 14)]
    #[case::triangles(PrimitiveType::TriangleList, 7, 21)]
    #[case::strip(PrimitiveType::TriangleStrip, 7, 9)]
    #[case::single_strip(PrimitiveType::TriangleStrip, 1, 3)]
    fn test_vertex_count(#[case] ty: PrimitiveType, #[case] prims: u32, #[case] expected: u32) {
        assert_eq!(vertex_count_for_primitive_count(prims, ty), Ok(expected));
    }

    #[rstest]
    #[case::lines(PrimitiveType::LineList, u32::MAX / 2 + 1)]
    #[case::triangles(PrimitiveType::TriangleList, u32::MAX / 2)]
    #[case::strip(PrimitiveType::TriangleStrip, u32::MAX)]
    fn test_vertex_count_overflow_is_error(#[case] ty: PrimitiveType, #[case] prims: u32) {
        assert!(matches!(
            vertex_count_for_primitive_count(prims, ty),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_unsupported_type_is_error() {
        assert!(matches!(
            vertex_count_for_primitive_count(4, PrimitiveType::QuadList),
            Err(GraphicsError::UnsupportedPrimitiveType(_))
        ));
    }

    #[test]
    fn test_unknown_raw_value_is_error() {
        assert_eq!(PrimitiveType::try_from(3), Ok(PrimitiveType::TriangleStrip));
        assert!(PrimitiveType::try_from(42).is_err());
    }
}
