//! Texture types and descriptors.

use bitflags::bitflags;

use super::PixelFormat;

bitflags! {
    /// Creation flags for 2D textures and surfaces.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureCreateFlags: u32 {
        /// Texture can be sampled in a shader.
        const SHADER_RESOURCE = 1 << 0;
        /// Texture can be bound as a color render target.
        const RENDER_TARGET = 1 << 1;
        /// Texture can be bound as a depth-stencil target.
        const DEPTH_STENCIL = 1 << 2;
        /// Contents can be read back through a read lock.
        const CPU_READBACK = 1 << 3;
        /// Contents are rewritten often through write locks.
        const DYNAMIC = 1 << 4;
        /// Texture is the back buffer of a viewport.
        const PRESENTABLE = 1 << 5;
    }
}

/// Descriptor for creating a 2D texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub format: PixelFormat,
    pub flags: TextureCreateFlags,
}

impl TextureDescriptor {
    pub fn new_2d(width: u32, height: u32, format: PixelFormat, flags: TextureCreateFlags) -> Self {
        Self {
            label: None,
            width,
            height,
            mip_levels: 1,
            format,
            flags,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.mip_levels = count;
        self
    }

    /// Width and height of a mip level, clamped to 1.
    pub fn mip_size(&self, mip: u32) -> (u32, u32) {
        ((self.width >> mip).max(1), (self.height >> mip).max(1))
    }

    /// Tightly packed byte size of one mip level.
    pub fn mip_byte_size(&self, mip: u32) -> u64 {
        let (w, h) = self.mip_size(mip);
        self.format.row_pitch(w) as u64 * h as u64
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self::new_2d(1, 1, PixelFormat::A8R8G8B8, TextureCreateFlags::SHADER_RESOURCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_sizes() {
        let desc = TextureDescriptor::new_2d(
            256,
            64,
            PixelFormat::A8R8G8B8,
            TextureCreateFlags::SHADER_RESOURCE,
        )
        .with_mip_levels(9);
        assert_eq!(desc.mip_size(0), (256, 64));
        assert_eq!(desc.mip_size(7), (2, 1));
        assert_eq!(desc.mip_byte_size(1), 128 * 32 * 4);
    }
}
