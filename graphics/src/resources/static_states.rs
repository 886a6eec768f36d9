//! Shared state objects created once per device.

use std::sync::Arc;

use crate::backend::GpuBackend;
use crate::error::GraphicsError;
use crate::types::{
    AddressMode, BlendStateDescriptor, CompareFunction, CullMode, DepthStateDescriptor, FillMode,
    RasterizerStateDescriptor, SamplerFilter, SamplerStateDescriptor,
};

use super::{
    BlendState, BlendStateRef, DepthState, DepthStateRef, IdAllocator, RasterizerState,
    RasterizerStateRef, SamplerState, SamplerStateRef,
};

/// Commonly used state objects, owned by the [`Rhi`](crate::Rhi).
#[derive(Debug, Clone)]
pub struct StaticStates {
    /// Solid fill, back-face culling.
    pub rasterizer_default: RasterizerStateRef,
    /// Solid fill, no culling.
    pub rasterizer_two_sided: RasterizerStateRef,
    pub rasterizer_wireframe: RasterizerStateRef,
    pub blend_opaque: BlendStateRef,
    pub blend_additive: BlendStateRef,
    pub blend_translucent: BlendStateRef,
    /// Depth test and write.
    pub depth_default: DepthStateRef,
    /// Depth test without write.
    pub depth_test_only: DepthStateRef,
    pub depth_disabled: DepthStateRef,
    pub sampler_point: SamplerStateRef,
    pub sampler_bilinear: SamplerStateRef,
}

impl StaticStates {
    pub(crate) fn create(
        backend: &dyn GpuBackend,
        ids: &IdAllocator,
    ) -> Result<Self, GraphicsError> {
        let raster = |fill, cull| {
            Arc::new(RasterizerState::new(
                ids.next(),
                RasterizerStateDescriptor::new(fill, cull),
            ))
        };
        let blend = |desc| Arc::new(BlendState::new(ids.next(), desc));
        let depth = |desc| Arc::new(DepthState::new(ids.next(), desc));
        let sampler = |filter, address| -> Result<SamplerStateRef, GraphicsError> {
            let desc = SamplerStateDescriptor::new(filter, address);
            let gpu = backend.create_sampler(&desc)?;
            Ok(Arc::new(SamplerState::new(ids.next(), desc, gpu)))
        };

        Ok(Self {
            rasterizer_default: raster(FillMode::Solid, CullMode::Back),
            rasterizer_two_sided: raster(FillMode::Solid, CullMode::None),
            rasterizer_wireframe: raster(FillMode::Wireframe, CullMode::None),
            blend_opaque: blend(BlendStateDescriptor::default()),
            blend_additive: blend(BlendStateDescriptor::additive()),
            blend_translucent: blend(BlendStateDescriptor::translucent()),
            depth_default: depth(DepthStateDescriptor::default()),
            depth_test_only: depth(DepthStateDescriptor::new(false, CompareFunction::LessEqual)),
            depth_disabled: depth(DepthStateDescriptor::disabled()),
            sampler_point: sampler(SamplerFilter::Point, AddressMode::Clamp)?,
            sampler_bilinear: sampler(SamplerFilter::Bilinear, AddressMode::Wrap)?,
        })
    }

    /// Rasterizer state for wireframe and two-sided flags.
    pub fn rasterizer_for(&self, wireframe: bool, two_sided: bool) -> &RasterizerStateRef {
        match (wireframe, two_sided) {
            (true, _) => &self.rasterizer_wireframe,
            (false, true) => &self.rasterizer_two_sided,
            (false, false) => &self.rasterizer_default,
        }
    }
}
