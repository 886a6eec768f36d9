//! GPU backend abstraction layer.
//!
//! The [`Rhi`](crate::Rhi) talks to the hardware through one [`GpuBackend`]
//! trait object. Resources hold backend handles ([`GpuBuffer`],
//! [`GpuTexture`], ...) whose variants are feature-gated per backend.
//!
//! # Available Backends
//!
//! - `dummy` (always built): in-memory backend used for tests and headless runs
//! - `wgpu-backend`: cross-platform backend using wgpu
//!
//! # Architecture
//!
//! Each backend implements [`GpuBackend`], which provides:
//! - Resource creation (buffers, textures, shaders, samplers, pipelines)
//! - Execution of recorded [`DeviceCommand`] lists
//! - Synchronous buffer and texture readback for read locks
//! - Swap chain creation, resize and present
//! - UI overlay hooks

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_impl;

pub mod dummy;

use std::sync::Arc;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::config::{BackendType, RhiParameters};
use crate::context::DeviceCommand;
use crate::device::DeviceCapabilities;
use crate::error::GraphicsError;
use crate::resources::{Shader, Texture2D};
use crate::types::{
    BufferDescriptor, SamplerStateDescriptor, ShaderFrequency, TextureDescriptor, VertexElement,
};

pub use dummy::{DrawRecord, DummyBackend, DummyStats};

/// A native window a viewport swap chain can present to.
pub trait ViewportWindow: HasWindowHandle + HasDisplayHandle + Send + Sync {}

impl<T: HasWindowHandle + HasDisplayHandle + Send + Sync> ViewportWindow for T {}

/// Handle to a GPU buffer resource.
#[derive(Clone)]
pub enum GpuBuffer {
    /// Dummy backend memory
    Dummy(Arc<dummy::DummyBuffer>),
    /// wgpu backend buffer
    #[cfg(feature = "wgpu-backend")]
    Wgpu(Arc<wgpu::Buffer>),
}

impl GpuBuffer {
    /// Zeroed dummy memory of `size` bytes, independent of any backend.
    pub fn dummy(size: u64) -> Self {
        Self::Dummy(Arc::new(dummy::DummyBuffer::new(size)))
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy(buffer) => f
                .debug_tuple("GpuBuffer::Dummy")
                .field(&buffer.len())
                .finish(),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu(buffer) => f.debug_tuple("GpuBuffer::Wgpu").field(buffer).finish(),
        }
    }
}

/// Handle to a GPU texture resource.
#[derive(Clone)]
pub enum GpuTexture {
    /// Dummy backend memory, one allocation per mip
    Dummy(Arc<dummy::DummyTexture>),
    /// wgpu backend texture
    #[cfg(feature = "wgpu-backend")]
    Wgpu {
        texture: Arc<wgpu::Texture>,
        view: Arc<wgpu::TextureView>,
    },
}

impl GpuTexture {
    /// Zeroed dummy memory for `descriptor`, independent of any backend.
    pub fn dummy(descriptor: &TextureDescriptor) -> Self {
        Self::Dummy(Arc::new(dummy::DummyTexture::new(descriptor)))
    }
}

impl std::fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy(_) => write!(f, "GpuTexture::Dummy"),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu { texture, view } => f
                .debug_struct("GpuTexture::Wgpu")
                .field("texture", texture)
                .field("view", view)
                .finish(),
        }
    }
}

/// Handle to a compiled shader stage.
#[derive(Clone)]
pub enum GpuShader {
    /// Dummy backend (source is kept for inspection)
    Dummy { source_len: usize },
    /// wgpu backend shader module
    #[cfg(feature = "wgpu-backend")]
    Wgpu(Arc<wgpu::ShaderModule>),
}

impl std::fmt::Debug for GpuShader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy { source_len } => f
                .debug_struct("GpuShader::Dummy")
                .field("source_len", source_len)
                .finish(),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu(module) => f.debug_tuple("GpuShader::Wgpu").field(module).finish(),
        }
    }
}

/// Handle to a GPU sampler resource.
#[derive(Clone)]
pub enum GpuSampler {
    /// Dummy backend (no GPU allocation)
    Dummy,
    /// wgpu backend sampler
    #[cfg(feature = "wgpu-backend")]
    Wgpu(Arc<wgpu::Sampler>),
}

impl std::fmt::Debug for GpuSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy => write!(f, "GpuSampler::Dummy"),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu(sampler) => f.debug_tuple("GpuSampler::Wgpu").field(sampler).finish(),
        }
    }
}

/// Backend object behind a bound shader state.
#[derive(Clone)]
pub enum GpuBoundShaderState {
    /// Dummy backend (no pipeline)
    Dummy,
    /// wgpu shader program; render pipelines are derived from it per state combination
    #[cfg(feature = "wgpu-backend")]
    Wgpu(Arc<wgpu_impl::WgpuProgram>),
}

impl std::fmt::Debug for GpuBoundShaderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy => write!(f, "GpuBoundShaderState::Dummy"),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu(_) => write!(f, "GpuBoundShaderState::Wgpu"),
        }
    }
}

/// Handle to a window swap chain.
#[derive(Clone)]
pub enum GpuSwapChain {
    /// Dummy backend (presents are only counted)
    Dummy,
    /// wgpu surface and its configuration
    #[cfg(feature = "wgpu-backend")]
    Wgpu(Arc<wgpu_impl::swapchain::WgpuSwapChain>),
}

impl std::fmt::Debug for GpuSwapChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy => write!(f, "GpuSwapChain::Dummy"),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu(_) => write!(f, "GpuSwapChain::Wgpu"),
        }
    }
}

/// Shaders and vertex layout a bound shader state is created from.
#[derive(Debug, Clone, Copy)]
pub struct ProgramDescriptor<'a> {
    pub elements: &'a [VertexElement],
    pub vertex: &'a Shader,
    pub pixel: &'a Shader,
    pub hull: Option<&'a Shader>,
    pub domain: Option<&'a Shader>,
    pub geometry: Option<&'a Shader>,
}

/// Bytes of one texture mip read back from the GPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureReadback {
    pub data: Vec<u8>,
    pub row_pitch: u32,
}

/// GPU backend trait for abstracting different GPU APIs.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Limits and features of the device.
    fn capabilities(&self) -> DeviceCapabilities;

    /// Create a buffer, optionally filled with `initial_data`.
    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<GpuBuffer, GraphicsError>;

    /// Create a 2D texture, optionally filling mip 0 with tightly packed `initial_data`.
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<GpuTexture, GraphicsError>;

    /// Create a shader stage from source or bytecode.
    fn create_shader(
        &self,
        frequency: ShaderFrequency,
        code: &[u8],
        entry_point: &str,
    ) -> Result<GpuShader, GraphicsError>;

    /// Create a sampler.
    fn create_sampler(
        &self,
        descriptor: &SamplerStateDescriptor,
    ) -> Result<GpuSampler, GraphicsError>;

    /// Create the pipeline object of a bound shader state.
    fn create_bound_shader_state(
        &self,
        descriptor: &ProgramDescriptor<'_>,
    ) -> Result<GpuBoundShaderState, GraphicsError>;

    /// Execute a recorded command list in order.
    fn submit(&self, commands: &[DeviceCommand]) -> Result<(), GraphicsError>;

    /// Read a buffer range. Blocks until prior submissions complete.
    fn read_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError>;

    /// Read one texture mip. Blocks until prior submissions complete.
    fn read_texture(&self, texture: &Texture2D, mip: u32)
    -> Result<TextureReadback, GraphicsError>;

    /// Create a swap chain for a window.
    fn create_swap_chain(
        &self,
        window: Arc<dyn ViewportWindow>,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<GpuSwapChain, GraphicsError>;

    /// Recreate swap chain images at a new size.
    fn resize_swap_chain(
        &self,
        swap_chain: &GpuSwapChain,
        width: u32,
        height: u32,
    ) -> Result<(), GraphicsError>;

    /// Present `surface`, copying it to the swap chain if one is given.
    fn present(
        &self,
        swap_chain: Option<&GpuSwapChain>,
        surface: &Texture2D,
        lock_to_vsync: bool,
    ) -> Result<(), GraphicsError>;

    /// Initialize the UI overlay renderer.
    fn ui_init(&self) -> Result<(), GraphicsError> {
        Ok(())
    }

    /// Start recording UI overlay draws for a frame.
    fn ui_begin_draw(&self) -> Result<(), GraphicsError> {
        Ok(())
    }

    /// Finish and submit the UI overlay draws of a frame.
    fn ui_end_draw(&self) -> Result<(), GraphicsError> {
        Ok(())
    }

    /// Release UI overlay resources.
    fn ui_shutdown(&self) -> Result<(), GraphicsError> {
        Ok(())
    }
}

/// Selects and creates the backend requested by `params`.
///
/// `BackendType::Auto` tries wgpu first when compiled in and falls back to the
/// dummy backend. An explicit `BackendType::Wgpu` request fails instead.
pub fn create_backend(params: &RhiParameters) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    match params.backend {
        BackendType::Dummy => {
            log::info!("Using dummy backend");
            Ok(Arc::new(DummyBackend::new()))
        }
        BackendType::Wgpu => {
            #[cfg(feature = "wgpu-backend")]
            {
                let backend = wgpu_impl::WgpuBackend::with_params(params)?;
                log::info!("Using wgpu backend");
                Ok(Arc::new(backend))
            }
            #[cfg(not(feature = "wgpu-backend"))]
            {
                Err(GraphicsError::InitializationFailed(
                    "wgpu backend requested but the `wgpu-backend` feature is disabled".into(),
                ))
            }
        }
        BackendType::Auto => {
            #[cfg(feature = "wgpu-backend")]
            {
                match wgpu_impl::WgpuBackend::with_params(params) {
                    Ok(backend) => {
                        log::info!("Using wgpu backend");
                        return Ok(Arc::new(backend));
                    }
                    Err(e) => {
                        log::warn!("Failed to create wgpu backend: {}", e);
                    }
                }
            }

            log::info!("Using dummy backend");
            Ok(Arc::new(DummyBackend::new()))
        }
    }
}

/// Check if a real GPU backend is compiled in.
pub fn has_gpu_backend() -> bool {
    cfg!(feature = "wgpu-backend")
}
