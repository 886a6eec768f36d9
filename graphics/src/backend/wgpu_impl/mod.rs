//! wgpu GPU backend implementation.
//!
//! This backend uses wgpu for cross-platform GPU access, supporting
//! Vulkan, Metal, DX12, and WebGPU.
//!
//! Recorded [`DeviceCommand`] lists are replayed into one command encoder
//! per submit. Consecutive draws against the same targets share a render
//! pass; target changes, clears and resource updates close the open pass.
//! Every program shares one fixed bind layout, matching the built-in WGSL:
//!
//! - group 0: view uniforms (binding 0), vertex parameters (binding 1),
//!   pixel parameters (binding 2), all with dynamic offsets
//! - group 1: texture slot 0 (binding 0) and its sampler (binding 1)

mod conversion;
mod pass_encoding;
mod resources;
pub mod swapchain;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::config::RhiParameters;
use crate::context::DeviceCommand;
use crate::device::DeviceCapabilities;
use crate::error::GraphicsError;
use crate::resources::Texture2D;
use crate::types::{
    BlendStateDescriptor, BufferDescriptor, DepthStateDescriptor, PrimitiveType,
    RasterizerStateDescriptor, SamplerStateDescriptor, ShaderFrequency, TextureDescriptor,
};

use super::{
    GpuBackend, GpuBoundShaderState, GpuBuffer, GpuSampler, GpuShader, GpuSwapChain, GpuTexture,
    ProgramDescriptor, TextureReadback, ViewportWindow,
};

/// Byte size of one shader parameter block (16 vec4s).
pub(crate) const PARAMETER_BLOCK_SIZE: u64 = 256;
/// Byte size of the view uniform block.
pub(crate) const VIEW_BLOCK_SIZE: u64 = std::mem::size_of::<crate::types::ViewUniforms>() as u64;
/// Dynamic uniform offsets are aligned to this.
pub(crate) const UNIFORM_ALIGNMENT: u64 = 256;

/// Vertex stream layout of a program, one per bound stream.
#[derive(Debug, Clone)]
pub(crate) struct StreamLayout {
    pub stream: u32,
    pub stride: u64,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

/// Shader modules and vertex layout of a bound shader state.
///
/// Render pipelines depend on the fixed-function state at draw time and are
/// derived from the program on demand.
#[derive(Debug)]
pub struct WgpuProgram {
    pub(crate) id: u64,
    pub(crate) vertex: Arc<wgpu::ShaderModule>,
    pub(crate) vertex_entry: String,
    pub(crate) fragment: Arc<wgpu::ShaderModule>,
    pub(crate) fragment_entry: String,
    pub(crate) streams: Vec<StreamLayout>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub program: u64,
    pub primitive_type: PrimitiveType,
    pub rasterizer: RasterizerStateDescriptor,
    pub blend: BlendStateDescriptor,
    pub depth: DepthStateDescriptor,
    pub color_format: Option<wgpu::TextureFormat>,
    pub depth_format: Option<wgpu::TextureFormat>,
}

/// wgpu-based GPU backend.
pub struct WgpuBackend {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    default_texture: wgpu::TextureView,
    default_sampler: wgpu::Sampler,
    pipelines: Mutex<HashMap<PipelineKey, Arc<wgpu::RenderPipeline>>>,
    blit_pipelines: Mutex<HashMap<wgpu::TextureFormat, Arc<wgpu::RenderPipeline>>>,
    next_program_id: AtomicU64,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter.get_info().name)
            .field("pipelines", &self.pipelines.lock().len())
            .finish()
    }
}

impl WgpuBackend {
    /// Create a new wgpu backend with default parameters.
    pub fn new() -> Result<Self, GraphicsError> {
        Self::with_params(&RhiParameters::default())
    }

    /// Create a new wgpu backend with custom parameters.
    pub fn with_params(params: &RhiParameters) -> Result<Self, GraphicsError> {
        let mut flags = wgpu::InstanceFlags::default();
        if params.validation {
            flags |= wgpu::InstanceFlags::VALIDATION;
        }
        if params.debug {
            flags |= wgpu::InstanceFlags::DEBUG;
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags,
            backend_options: wgpu::BackendOptions::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| GraphicsError::InitializationFailed(format!("No compatible GPU adapter: {e}")))?;

        log::info!("wgpu adapter: {:?}", adapter.get_info());

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some(params.label.as_str()),
            required_features: adapter.features()
                & (wgpu::Features::POLYGON_MODE_LINE | wgpu::Features::DEPTH_CLIP_CONTROL),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| GraphicsError::InitializationFailed(format!("Device creation failed: {e}")))?;

        let uniform_entry = |binding: u32, size: u64| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(size),
            },
            count: None,
        };
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Uniforms Layout"),
            entries: &[
                uniform_entry(0, VIEW_BLOCK_SIZE),
                uniform_entry(1, PARAMETER_BLOCK_SIZE),
                uniform_entry(2, PARAMETER_BLOCK_SIZE),
            ],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Textures Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shared Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            immediate_size: 0,
        });

        let (default_texture, default_sampler) = resources::create_defaults(&device, &queue);

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
            uniform_layout,
            texture_layout,
            pipeline_layout,
            default_texture,
            default_sampler,
            pipelines: Mutex::new(HashMap::new()),
            blit_pipelines: Mutex::new(HashMap::new()),
            next_program_id: AtomicU64::new(1),
        })
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// Number of render pipelines created so far.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.lock().len()
    }

    /// Block until `submission` finishes on the GPU.
    pub(crate) fn wait_for(&self, submission: wgpu::SubmissionIndex) -> Result<(), GraphicsError> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: Some(std::time::Duration::from_secs(10)),
            })
            .map(|_| ())
            .map_err(|e| GraphicsError::Internal(format!("device poll failed: {e}")))
    }

    fn allocate_program_id(&self) -> u64 {
        self.next_program_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu Backend"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        let limits = self.device.limits();
        DeviceCapabilities {
            max_texture_dimension: limits.max_texture_dimension_2d,
            max_buffer_size: limits.max_buffer_size,
            tessellation: false,
            geometry_shaders: false,
            readback: true,
        }
    }

    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<GpuBuffer, GraphicsError> {
        self.create_buffer_impl(descriptor, initial_data)
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<GpuTexture, GraphicsError> {
        self.create_texture_impl(descriptor, initial_data)
    }

    fn create_shader(
        &self,
        frequency: ShaderFrequency,
        code: &[u8],
        entry_point: &str,
    ) -> Result<GpuShader, GraphicsError> {
        self.create_shader_impl(frequency, code, entry_point)
    }

    fn create_sampler(
        &self,
        descriptor: &SamplerStateDescriptor,
    ) -> Result<GpuSampler, GraphicsError> {
        Ok(self.create_sampler_impl(descriptor))
    }

    fn create_bound_shader_state(
        &self,
        descriptor: &ProgramDescriptor<'_>,
    ) -> Result<GpuBoundShaderState, GraphicsError> {
        self.create_program(descriptor)
    }

    fn submit(&self, commands: &[DeviceCommand]) -> Result<(), GraphicsError> {
        self.execute_commands(commands)
    }

    fn read_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        self.read_buffer_impl(buffer, offset, size)
    }

    fn read_texture(
        &self,
        texture: &Texture2D,
        mip: u32,
    ) -> Result<TextureReadback, GraphicsError> {
        self.read_texture_impl(texture, mip)
    }

    fn create_swap_chain(
        &self,
        window: Arc<dyn ViewportWindow>,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<GpuSwapChain, GraphicsError> {
        swapchain::create_swap_chain(self, window, width, height, vsync)
    }

    fn resize_swap_chain(
        &self,
        swap_chain: &GpuSwapChain,
        width: u32,
        height: u32,
    ) -> Result<(), GraphicsError> {
        match swap_chain {
            GpuSwapChain::Wgpu(swap_chain) => {
                swap_chain.resize(self, width, height);
                Ok(())
            }
            _ => Err(GraphicsError::Internal(
                "non-wgpu swap chain passed to the wgpu backend".into(),
            )),
        }
    }

    fn present(
        &self,
        swap_chain: Option<&GpuSwapChain>,
        surface: &Texture2D,
        lock_to_vsync: bool,
    ) -> Result<(), GraphicsError> {
        match swap_chain {
            Some(GpuSwapChain::Wgpu(swap_chain)) => {
                swap_chain.present(self, surface, lock_to_vsync)
            }
            // Offscreen viewports have nothing to present.
            None => Ok(()),
            Some(_) => Err(GraphicsError::Internal(
                "non-wgpu swap chain passed to the wgpu backend".into(),
            )),
        }
    }
}

static_assertions::assert_impl_all!(WgpuBackend: Send, Sync);
