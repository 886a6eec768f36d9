//! Render viewports.
//!
//! A [`Viewport`] owns the color surface and depth surface a view renders
//! into, plus the swap chain it presents to when it is backed by a window.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::GpuSwapChain;
use crate::device::Rhi;
use crate::error::{GraphicsError, contract_violation};
use crate::resources::SurfaceRef;
use crate::types::{PixelFormat, TextureCreateFlags, TextureDescriptor};

/// Viewport shared between the game thread and the rendering thread.
pub type SharedViewport = Arc<Mutex<Viewport>>;

/// A swap-chain-backed or offscreen render surface with depth.
pub struct Viewport {
    width: u32,
    height: u32,
    surface: SurfaceRef,
    depth: SurfaceRef,
    swap_chain: Option<GpuSwapChain>,
    present_count: u64,
}

impl Viewport {
    pub(crate) fn new(
        rhi: &Rhi,
        swap_chain: Option<GpuSwapChain>,
        width: u32,
        height: u32,
    ) -> Result<Self, GraphicsError> {
        let (surface, depth) = create_surfaces(rhi, width, height)?;
        log::debug!(
            "Viewport created {}x{} ({})",
            width,
            height,
            if swap_chain.is_some() { "windowed" } else { "offscreen" }
        );
        Ok(Self {
            width,
            height,
            surface,
            depth,
            swap_chain,
            present_count: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Color surface. Invalidated by [`resize`](Self::resize).
    pub fn surface(&self) -> &SurfaceRef {
        &self.surface
    }

    pub fn depth_surface(&self) -> &SurfaceRef {
        &self.depth
    }

    pub fn is_offscreen(&self) -> bool {
        self.swap_chain.is_none()
    }

    pub(crate) fn swap_chain(&self) -> Option<&GpuSwapChain> {
        self.swap_chain.as_ref()
    }

    /// Number of presents issued through `end_drawing_viewport`.
    pub fn present_count(&self) -> u64 {
        self.present_count
    }

    pub(crate) fn record_present(&mut self) {
        self.present_count += 1;
    }

    /// Resize the viewport, recreating its surfaces.
    ///
    /// Returns `Ok(false)` without touching anything when the size is unchanged.
    pub fn resize(&mut self, rhi: &Rhi, width: u32, height: u32) -> Result<bool, GraphicsError> {
        if width == self.width && height == self.height {
            return Ok(false);
        }
        if width == 0 || height == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "viewport size {width}x{height} has no area"
            )));
        }
        if let Some(swap_chain) = &self.swap_chain {
            rhi.backend().resize_swap_chain(swap_chain, width, height)?;
        }
        let (surface, depth) = create_surfaces(rhi, width, height)?;
        log::debug!(
            "Viewport resized {}x{} -> {}x{}",
            self.width,
            self.height,
            width,
            height
        );
        self.surface = surface;
        self.depth = depth;
        self.width = width;
        self.height = height;
        Ok(true)
    }

    /// Replace the color surface of an offscreen viewport.
    pub fn set_surface(&mut self, surface: SurfaceRef) -> Result<(), GraphicsError> {
        if self.swap_chain.is_some() {
            return Err(contract_violation!(
                "set_surface on a windowed viewport"
            ));
        }
        if !surface.flags().contains(TextureCreateFlags::RENDER_TARGET) {
            return Err(contract_violation!(
                "viewport surface {} is not a render target",
                surface.id()
            ));
        }
        if surface.size() != self.size() {
            return Err(GraphicsError::InvalidParameter(format!(
                "surface is {}x{}, viewport is {}x{}",
                surface.width(),
                surface.height(),
                self.width,
                self.height
            )));
        }
        self.surface = surface;
        Ok(())
    }

    /// Wrap into a [`SharedViewport`].
    pub fn into_shared(self) -> SharedViewport {
        Arc::new(Mutex::new(self))
    }
}

impl std::fmt::Debug for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewport")
            .field("size", &(self.width, self.height))
            .field("surface", &self.surface.id())
            .field("offscreen", &self.is_offscreen())
            .finish()
    }
}

fn create_surfaces(
    rhi: &Rhi,
    width: u32,
    height: u32,
) -> Result<(SurfaceRef, SurfaceRef), GraphicsError> {
    let surface = rhi.create_texture_2d(
        TextureDescriptor::new_2d(
            width,
            height,
            PixelFormat::A8R8G8B8,
            TextureCreateFlags::RENDER_TARGET
                | TextureCreateFlags::SHADER_RESOURCE
                | TextureCreateFlags::CPU_READBACK
                | TextureCreateFlags::PRESENTABLE,
        )
        .with_label("Viewport Surface"),
        None,
    )?;
    let depth = rhi.create_texture_2d(
        TextureDescriptor::new_2d(
            width,
            height,
            PixelFormat::DepthStencil,
            TextureCreateFlags::DEPTH_STENCIL,
        )
        .with_label("Viewport Depth"),
        None,
    )?;
    Ok((surface, depth))
}

static_assertions::assert_impl_all!(Viewport: Send, Sync);
