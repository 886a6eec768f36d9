//! Fixed-function state objects.

use crate::backend::GpuSampler;
use crate::types::{
    BlendStateDescriptor, DepthStateDescriptor, RasterizerStateDescriptor, SamplerStateDescriptor,
};

use super::ResourceId;

/// Rasterizer state object.
#[derive(Debug)]
pub struct RasterizerState {
    id: ResourceId,
    descriptor: RasterizerStateDescriptor,
}

impl RasterizerState {
    pub(crate) fn new(id: ResourceId, descriptor: RasterizerStateDescriptor) -> Self {
        Self { id, descriptor }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn descriptor(&self) -> &RasterizerStateDescriptor {
        &self.descriptor
    }
}

/// Blend state object.
#[derive(Debug)]
pub struct BlendState {
    id: ResourceId,
    descriptor: BlendStateDescriptor,
}

impl BlendState {
    pub(crate) fn new(id: ResourceId, descriptor: BlendStateDescriptor) -> Self {
        Self { id, descriptor }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn descriptor(&self) -> &BlendStateDescriptor {
        &self.descriptor
    }
}

/// Depth test/write state object.
#[derive(Debug)]
pub struct DepthState {
    id: ResourceId,
    descriptor: DepthStateDescriptor,
}

impl DepthState {
    pub(crate) fn new(id: ResourceId, descriptor: DepthStateDescriptor) -> Self {
        Self { id, descriptor }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn descriptor(&self) -> &DepthStateDescriptor {
        &self.descriptor
    }
}

/// Sampler state object, backed by a backend sampler.
#[derive(Debug)]
pub struct SamplerState {
    id: ResourceId,
    descriptor: SamplerStateDescriptor,
    gpu: GpuSampler,
}

impl SamplerState {
    pub(crate) fn new(id: ResourceId, descriptor: SamplerStateDescriptor, gpu: GpuSampler) -> Self {
        Self {
            id,
            descriptor,
            gpu,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn descriptor(&self) -> &SamplerStateDescriptor {
        &self.descriptor
    }

    pub(crate) fn gpu(&self) -> &GpuSampler {
        &self.gpu
    }
}

static_assertions::assert_impl_all!(RasterizerState: Send, Sync);
static_assertions::assert_impl_all!(SamplerState: Send, Sync);
