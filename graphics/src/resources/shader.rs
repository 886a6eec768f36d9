//! Shader resource.

use crate::backend::GpuShader;
use crate::types::ShaderFrequency;

use super::ResourceId;

/// One compiled shader stage.
pub struct Shader {
    id: ResourceId,
    frequency: ShaderFrequency,
    entry_point: String,
    gpu: GpuShader,
}

impl Shader {
    pub(crate) fn new(
        id: ResourceId,
        frequency: ShaderFrequency,
        entry_point: String,
        gpu: GpuShader,
    ) -> Self {
        Self {
            id,
            frequency,
            entry_point,
            gpu,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn frequency(&self) -> ShaderFrequency {
        self.frequency
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub(crate) fn gpu(&self) -> &GpuShader {
        &self.gpu
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("id", &self.id)
            .field("frequency", &self.frequency)
            .field("entry_point", &self.entry_point)
            .finish()
    }
}

static_assertions::assert_impl_all!(Shader: Send, Sync);
