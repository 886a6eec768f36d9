//! wgpu surface implementation.
//!
//! A viewport renders into its own back buffer texture. Presenting blits that
//! texture onto the acquired surface image, so the surface format may differ
//! from the back buffer format.

use std::sync::Arc;

use parking_lot::Mutex;

use super::super::{GpuSwapChain, ViewportWindow};
use super::WgpuBackend;
use super::conversion::convert_present_mode;
use super::resources::wgpu_texture;
use crate::error::GraphicsError;
use crate::resources::Texture2D;

const BLIT_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) tex_coord: vec2<f32>,
};

@group(0) @binding(0) var source: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    out.tex_coord = uv;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(source, source_sampler, input.tex_coord);
}
"#;

/// A window surface and its current configuration.
pub struct WgpuSwapChain {
    surface: wgpu::Surface<'static>,
    config: Mutex<wgpu::SurfaceConfiguration>,
}

impl std::fmt::Debug for WgpuSwapChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let config = self.config.lock();
        f.debug_struct("WgpuSwapChain")
            .field("format", &config.format)
            .field("width", &config.width)
            .field("height", &config.height)
            .finish()
    }
}

pub(super) fn create_swap_chain(
    backend: &WgpuBackend,
    window: Arc<dyn ViewportWindow>,
    width: u32,
    height: u32,
    vsync: bool,
) -> Result<GpuSwapChain, GraphicsError> {
    let surface = backend.instance.create_surface(window).map_err(|e| {
        GraphicsError::ResourceCreationFailed(format!("Failed to create surface: {e}"))
    })?;
    let capabilities = surface.get_capabilities(&backend.adapter);
    let format = capabilities
        .formats
        .iter()
        .copied()
        .find(|f| !f.is_srgb())
        .or_else(|| capabilities.formats.first().copied())
        .ok_or_else(|| {
            GraphicsError::ResourceCreationFailed("surface reports no formats".into())
        })?;
    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: width.max(1),
        height: height.max(1),
        present_mode: convert_present_mode(vsync),
        alpha_mode: wgpu::CompositeAlphaMode::Auto,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&backend.device, &config);
    log::info!("Configured wgpu surface {}x{} ({:?})", width, height, format);
    Ok(GpuSwapChain::Wgpu(Arc::new(WgpuSwapChain {
        surface,
        config: Mutex::new(config),
    })))
}

impl WgpuSwapChain {
    pub(super) fn resize(&self, backend: &WgpuBackend, width: u32, height: u32) {
        let mut config = self.config.lock();
        config.width = width.max(1);
        config.height = height.max(1);
        self.surface.configure(&backend.device, &config);
    }

    /// Blit `back_buffer` to the next surface image and present it.
    pub(super) fn present(
        &self,
        backend: &WgpuBackend,
        back_buffer: &Texture2D,
        lock_to_vsync: bool,
    ) -> Result<(), GraphicsError> {
        let format = {
            let mut config = self.config.lock();
            let present_mode = convert_present_mode(lock_to_vsync);
            if config.present_mode != present_mode {
                config.present_mode = present_mode;
                self.surface.configure(&backend.device, &config);
            }
            config.format
        };

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&backend.device, &self.config.lock());
                return Err(GraphicsError::SurfaceLost);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(GraphicsError::OutOfMemory),
            Err(e) => {
                log::warn!("Skipping present: {e}");
                return Ok(());
            }
        };
        let target = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let (_, source) = wgpu_texture(back_buffer.gpu())?;

        let pipeline = backend.blit_pipeline(format);
        let bind_group = backend
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Present Bind Group"),
                layout: &pipeline.get_bind_group_layout(0),
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(source),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&backend.default_sampler),
                    },
                ],
            });

        let mut encoder = backend
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Present Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Blit"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        backend.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

impl WgpuBackend {
    fn blit_pipeline(&self, format: wgpu::TextureFormat) -> Arc<wgpu::RenderPipeline> {
        let mut pipelines = self.blit_pipelines.lock();
        pipelines
            .entry(format)
            .or_insert_with(|| {
                let module = self
                    .device
                    .create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some("Present Blit Shader"),
                        source: wgpu::ShaderSource::Wgsl(BLIT_SHADER.into()),
                    });
                Arc::new(
                    self.device
                        .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                            label: Some("Present Blit Pipeline"),
                            layout: None,
                            vertex: wgpu::VertexState {
                                module: &module,
                                entry_point: Some("vs_main"),
                                compilation_options: wgpu::PipelineCompilationOptions::default(),
                                buffers: &[],
                            },
                            primitive: wgpu::PrimitiveState::default(),
                            depth_stencil: None,
                            multisample: wgpu::MultisampleState::default(),
                            fragment: Some(wgpu::FragmentState {
                                module: &module,
                                entry_point: Some("fs_main"),
                                compilation_options: wgpu::PipelineCompilationOptions::default(),
                                targets: &[Some(format.into())],
                            }),
                            multiview_mask: None,
                            cache: None,
                        }),
                )
            })
            .clone()
    }
}
