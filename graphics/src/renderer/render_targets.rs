//! Scene render targets shared by every view a renderer draws.

use crate::device::Rhi;
use crate::error::GraphicsError;
use crate::resources::SurfaceRef;
use crate::types::{PixelFormat, TextureCreateFlags, TextureDescriptor};

/// Surfaces of one allocation. Cloning shares the surfaces.
#[derive(Debug, Clone)]
pub struct SceneTargets {
    /// Lit scene color, blitted to the viewport at the end of the frame.
    pub scene_color: SurfaceRef,
    pub scene_depth: SurfaceRef,
    /// Albedo written by the base pass when lights are shown.
    pub gbuffer: SurfaceRef,
    #[cfg(feature = "hit-proxy")]
    pub hit_proxy: SurfaceRef,
}

impl SceneTargets {
    pub fn size(&self) -> (u32, u32) {
        self.scene_color.size()
    }
}

/// Targets sized to the largest view seen so far.
///
/// Smaller views render into the top-left corner; the surfaces are only
/// reallocated when a view outgrows them.
#[derive(Debug, Default)]
pub struct SceneRenderTargets {
    targets: Option<SceneTargets>,
    allocations: u32,
}

impl SceneRenderTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets(&self) -> Option<&SceneTargets> {
        self.targets.as_ref()
    }

    /// Number of times the surfaces were (re)created.
    pub fn allocations(&self) -> u32 {
        self.allocations
    }

    /// Make sure the targets cover `width` x `height`.
    pub fn allocate(
        &mut self,
        rhi: &Rhi,
        width: u32,
        height: u32,
    ) -> Result<SceneTargets, GraphicsError> {
        if let Some(targets) = &self.targets {
            let (w, h) = targets.size();
            if w >= width && h >= height {
                return Ok(targets.clone());
            }
        }
        let (old_w, old_h) = self.targets.as_ref().map_or((0, 0), SceneTargets::size);
        let (w, h) = (width.max(old_w), height.max(old_h));
        log::debug!("SceneRenderTargets: allocating {w}x{h} (was {old_w}x{old_h})");

        let color = |format, flags: TextureCreateFlags, label: &str| {
            rhi.create_texture_2d(
                TextureDescriptor::new_2d(w, h, format, flags).with_label(label),
                None,
            )
        };
        let sampled_target = TextureCreateFlags::RENDER_TARGET | TextureCreateFlags::SHADER_RESOURCE;
        let targets = SceneTargets {
            scene_color: color(PixelFormat::FloatRGBA, sampled_target, "SceneColor")?,
            scene_depth: color(
                PixelFormat::DepthStencil,
                TextureCreateFlags::DEPTH_STENCIL,
                "SceneDepth",
            )?,
            gbuffer: color(PixelFormat::A8R8G8B8, sampled_target, "GBuffer")?,
            #[cfg(feature = "hit-proxy")]
            hit_proxy: color(
                PixelFormat::A8R8G8B8,
                TextureCreateFlags::RENDER_TARGET | TextureCreateFlags::CPU_READBACK,
                "HitProxies",
            )?,
        };
        self.allocations += 1;
        self.targets = Some(targets.clone());
        Ok(targets)
    }

    /// Drop the surfaces; the next `allocate` recreates them.
    pub fn release(&mut self) {
        self.targets = None;
    }
}
