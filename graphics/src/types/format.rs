//! Pixel formats and their block layout table.

/// Pixel formats understood by the RHI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    #[default]
    Unknown,
    /// 8-bit RGBA color, stored in memory as R, G, B, A.
    A8R8G8B8,
    /// 16-bit float RGBA color.
    FloatRGBA,
    /// 24-bit depth with 8-bit stencil.
    DepthStencil,
}

/// Block layout of a [`PixelFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelFormatInfo {
    pub name: &'static str,
    pub block_size_x: u32,
    pub block_size_y: u32,
    pub block_size_z: u32,
    pub block_bytes: u32,
    pub num_components: u32,
    pub supported: bool,
}

const FORMAT_TABLE: [PixelFormatInfo; 4] = [
    PixelFormatInfo {
        name: "unknown",
        block_size_x: 0,
        block_size_y: 0,
        block_size_z: 0,
        block_bytes: 0,
        num_components: 0,
        supported: false,
    },
    PixelFormatInfo {
        name: "A8R8G8B8",
        block_size_x: 1,
        block_size_y: 1,
        block_size_z: 1,
        block_bytes: 4,
        num_components: 4,
        supported: true,
    },
    PixelFormatInfo {
        name: "FloatRGBA",
        block_size_x: 1,
        block_size_y: 1,
        block_size_z: 1,
        block_bytes: 8,
        num_components: 4,
        supported: true,
    },
    PixelFormatInfo {
        name: "DepthStencil",
        block_size_x: 1,
        block_size_y: 1,
        block_size_z: 1,
        block_bytes: 4,
        num_components: 1,
        supported: true,
    },
];

impl PixelFormat {
    /// Block layout for this format.
    pub fn info(self) -> &'static PixelFormatInfo {
        &FORMAT_TABLE[self as usize]
    }

    pub fn block_bytes(self) -> u32 {
        self.info().block_bytes
    }

    pub fn is_depth_stencil(self) -> bool {
        self == Self::DepthStencil
    }

    /// Bytes in one tightly packed row of `width` pixels.
    pub fn row_pitch(self, width: u32) -> u32 {
        let info = self.info();
        if info.block_size_x == 0 {
            return 0;
        }
        width.div_ceil(info.block_size_x) * info.block_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_has_no_blocks() {
        let info = PixelFormat::Unknown.info();
        assert_eq!(info.block_bytes, 0);
        assert!(!info.supported);
        assert_eq!(PixelFormat::Unknown.row_pitch(64), 0);
    }

    #[test]
    fn test_a8r8g8b8_layout() {
        let info = PixelFormat::A8R8G8B8.info();
        assert_eq!(
            (info.block_size_x, info.block_size_y, info.block_size_z),
            (1, 1, 1)
        );
        assert_eq!(info.block_bytes, 4);
        assert_eq!(info.num_components, 4);
        assert_eq!(PixelFormat::A8R8G8B8.row_pitch(10), 40);
    }
}
