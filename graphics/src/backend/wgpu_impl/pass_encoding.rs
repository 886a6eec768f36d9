//! Replay of recorded device commands into wgpu render passes.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use lumen_core::{LinearColor, profile_scope};
use wgpu::util::DeviceExt;

use crate::context::{DeviceCommand, MAX_VERTEX_STREAMS};
use crate::error::GraphicsError;
use crate::resources::{
    BoundShaderStateRef, ResourceId, SamplerStateRef, SurfaceRef, Texture2D, Texture2DRef,
};
use crate::types::{
    BlendStateDescriptor, DepthStateDescriptor, IndexFormat, PrimitiveType,
    RasterizerStateDescriptor, ScissorRect, ShaderFrequency, ViewUniforms, ViewportRect,
};

use super::super::{GpuBoundShaderState, GpuSampler};
use super::conversion::{
    convert_blend_state, convert_depth_state, convert_pixel_format, convert_primitive_state,
};
use super::resources::{align_up, repack_rows, wgpu_buffer, wgpu_texture};
use super::{
    PARAMETER_BLOCK_SIZE, PipelineKey, UNIFORM_ALIGNMENT, VIEW_BLOCK_SIZE, WgpuBackend,
    WgpuProgram,
};

const PARAMETER_BYTES: usize = PARAMETER_BLOCK_SIZE as usize;

enum DrawCall {
    Vertices {
        vertices: Range<u32>,
        instances: u32,
    },
    Indexed {
        buffer: Arc<wgpu::Buffer>,
        format: wgpu::IndexFormat,
        indices: Range<u32>,
        base_vertex: i32,
        instances: u32,
    },
}

/// A draw with every binding resolved, waiting for its render pass.
struct PendingDraw {
    pipeline: Arc<wgpu::RenderPipeline>,
    vertex_buffers: Vec<(Arc<wgpu::Buffer>, u64)>,
    textures: Arc<wgpu::BindGroup>,
    uniform_offsets: [u32; 3],
    viewport: Option<ViewportRect>,
    scissor: Option<ScissorRect>,
    call: DrawCall,
}

type TextureGroupKey = (Option<ResourceId>, Option<ResourceId>);

/// Mirror of the device state while a command list is replayed.
struct Replay<'a> {
    backend: &'a WgpuBackend,
    encoder: wgpu::CommandEncoder,
    color: Option<SurfaceRef>,
    depth: Option<SurfaceRef>,
    viewport: Option<ViewportRect>,
    scissor: Option<ScissorRect>,
    bound_shader_state: Option<BoundShaderStateRef>,
    streams: [Option<(Arc<wgpu::Buffer>, u64)>; MAX_VERTEX_STREAMS],
    rasterizer: RasterizerStateDescriptor,
    blend: BlendStateDescriptor,
    depth_state: DepthStateDescriptor,
    texture: Option<Texture2DRef>,
    sampler: Option<SamplerStateRef>,
    view: ViewUniforms,
    vs_params: [u8; PARAMETER_BYTES],
    ps_params: [u8; PARAMETER_BYTES],
    /// Offsets of the current uniform values inside `uniform_data`.
    uniform_offsets: Option<[u32; 3]>,
    uniform_data: Vec<u8>,
    texture_groups: HashMap<TextureGroupKey, Arc<wgpu::BindGroup>>,
    pending: Vec<PendingDraw>,
}

impl<'a> Replay<'a> {
    fn new(backend: &'a WgpuBackend) -> Self {
        let encoder = backend
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Device Context Encoder"),
            });
        Self {
            backend,
            encoder,
            color: None,
            depth: None,
            viewport: None,
            scissor: None,
            bound_shader_state: None,
            streams: Default::default(),
            rasterizer: RasterizerStateDescriptor::default(),
            blend: BlendStateDescriptor::default(),
            depth_state: DepthStateDescriptor::default(),
            texture: None,
            sampler: None,
            view: ViewUniforms::default(),
            vs_params: [0; PARAMETER_BYTES],
            ps_params: [0; PARAMETER_BYTES],
            uniform_offsets: None,
            uniform_data: Vec::new(),
            texture_groups: HashMap::new(),
            pending: Vec::new(),
        }
    }

    fn execute(&mut self, command: &DeviceCommand) -> Result<(), GraphicsError> {
        match command {
            DeviceCommand::SetRenderTarget { color, depth } => {
                self.flush_pass()?;
                self.color = color.clone();
                self.depth = depth.clone();
            }
            DeviceCommand::ClearSurface { surface, color } => self.clear_color(surface, *color)?,
            DeviceCommand::ClearDepthStencil { surface, depth, .. } => {
                self.clear_depth(surface, *depth)?
            }
            DeviceCommand::SetViewport(rect) => self.viewport = Some(*rect),
            DeviceCommand::SetScissor(rect) => self.scissor = *rect,
            DeviceCommand::SetBoundShaderState(state) => {
                self.bound_shader_state = Some(state.clone())
            }
            DeviceCommand::SetStreamSource {
                stream,
                buffer,
                offset,
                ..
            } => {
                let binding = match buffer {
                    Some(buffer) => Some((wgpu_buffer(buffer.gpu())?.clone(), *offset)),
                    None => None,
                };
                if let Some(slot) = self.streams.get_mut(*stream as usize) {
                    *slot = binding;
                }
            }
            DeviceCommand::SetRasterizerState(state) => self.rasterizer = *state.descriptor(),
            DeviceCommand::SetBlendState(state) => self.blend = *state.descriptor(),
            DeviceCommand::SetDepthState(state) => self.depth_state = *state.descriptor(),
            DeviceCommand::SetSamplerState { slot, sampler } => {
                if *slot == 0 {
                    self.sampler = Some(sampler.clone());
                } else {
                    log::trace!("WgpuBackend: sampler slot {slot} is not bound by the shared layout");
                }
            }
            DeviceCommand::SetTexture { slot, texture } => {
                if *slot == 0 {
                    self.texture = texture.clone();
                } else {
                    log::trace!("WgpuBackend: texture slot {slot} is not bound by the shared layout");
                }
            }
            DeviceCommand::SetShaderParameter {
                frequency,
                offset,
                data,
            } => self.set_shader_parameter(*frequency, *offset, data)?,
            DeviceCommand::SetViewParameters(view) => {
                self.view = **view;
                self.uniform_offsets = None;
            }
            DeviceCommand::Draw {
                primitive_type,
                base_vertex,
                vertex_count,
                num_instances,
            } => self.record_draw(
                *primitive_type,
                DrawCall::Vertices {
                    vertices: *base_vertex..*base_vertex + *vertex_count,
                    instances: *num_instances,
                },
            )?,
            DeviceCommand::DrawIndexed {
                index_buffer,
                primitive_type,
                base_vertex_index,
                start_index,
                index_count,
                num_instances,
            } => {
                let format = match index_buffer.format() {
                    IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
                    IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
                };
                self.record_draw(
                    *primitive_type,
                    DrawCall::Indexed {
                        buffer: wgpu_buffer(index_buffer.gpu())?.clone(),
                        format,
                        indices: *start_index..*start_index + *index_count,
                        base_vertex: *base_vertex_index,
                        instances: *num_instances,
                    },
                )?
            }
            DeviceCommand::UpdateBuffer {
                buffer,
                offset,
                data,
            } => self.update_buffer(buffer, *offset, data)?,
            DeviceCommand::UpdateTexture {
                texture,
                mip,
                row_pitch,
                data,
            } => self.update_texture(texture, *mip, *row_pitch, data)?,
        }
        Ok(())
    }

    fn set_shader_parameter(
        &mut self,
        frequency: ShaderFrequency,
        offset: u32,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        let block = match frequency {
            ShaderFrequency::Vertex => &mut self.vs_params,
            ShaderFrequency::Pixel => &mut self.ps_params,
            other => {
                return Err(GraphicsError::FeatureNotSupported(format!(
                    "{other} parameters on the wgpu backend"
                )));
            }
        };
        let start = offset as usize;
        let end = start + data.len();
        if end > PARAMETER_BYTES {
            return Err(GraphicsError::InvalidParameter(format!(
                "shader parameter range {start}..{end} exceeds {PARAMETER_BYTES} bytes"
            )));
        }
        block[start..end].copy_from_slice(data);
        self.uniform_offsets = None;
        Ok(())
    }

    /// Offsets of the current uniform values, appending them when changed.
    fn current_uniform_offsets(&mut self) -> [u32; 3] {
        if let Some(offsets) = self.uniform_offsets {
            return offsets;
        }
        let base = self.uniform_data.len() as u64;
        let view_end = base + align_up(VIEW_BLOCK_SIZE, UNIFORM_ALIGNMENT);
        let offsets = [
            base as u32,
            view_end as u32,
            (view_end + PARAMETER_BLOCK_SIZE) as u32,
        ];
        self.uniform_data.extend_from_slice(bytemuck::bytes_of(&self.view));
        self.uniform_data.resize(view_end as usize, 0);
        self.uniform_data.extend_from_slice(&self.vs_params);
        self.uniform_data.extend_from_slice(&self.ps_params);
        self.uniform_offsets = Some(offsets);
        offsets
    }

    fn texture_group(&mut self) -> Result<Arc<wgpu::BindGroup>, GraphicsError> {
        let key = (
            self.texture.as_ref().map(|t| t.id()),
            self.sampler.as_ref().map(|s| s.id()),
        );
        if let Some(group) = self.texture_groups.get(&key) {
            return Ok(group.clone());
        }
        let view = match &self.texture {
            Some(texture) => wgpu_texture(texture.gpu())?.1.as_ref(),
            None => &self.backend.default_texture,
        };
        let sampler = match self.sampler.as_ref().map(|s| s.gpu()) {
            Some(GpuSampler::Wgpu(sampler)) => sampler.as_ref(),
            _ => &self.backend.default_sampler,
        };
        let group = Arc::new(
            self.backend
                .device
                .create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Texture Bind Group"),
                    layout: &self.backend.texture_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(sampler),
                        },
                    ],
                }),
        );
        self.texture_groups.insert(key, group.clone());
        Ok(group)
    }

    fn target_size(&self) -> Option<(u32, u32)> {
        self.color
            .as_ref()
            .or(self.depth.as_ref())
            .map(|surface| surface.size())
    }

    fn record_draw(&mut self, primitive_type: PrimitiveType, call: DrawCall) -> Result<(), GraphicsError> {
        let Some(state) = self.bound_shader_state.clone() else {
            log::warn!("WgpuBackend: draw without a bound shader state skipped");
            return Ok(());
        };
        let program = match state.gpu() {
            GpuBoundShaderState::Wgpu(program) => program.clone(),
            _ => {
                return Err(GraphicsError::Internal(
                    "non-wgpu bound shader state passed to the wgpu backend".into(),
                ));
            }
        };
        if self.target_size().is_none() {
            log::warn!("WgpuBackend: draw without a render target skipped");
            return Ok(());
        }

        let mut vertex_buffers = Vec::with_capacity(program.streams.len());
        for layout in &program.streams {
            match self.streams.get(layout.stream as usize).cloned().flatten() {
                Some(binding) => vertex_buffers.push(binding),
                None => {
                    log::warn!(
                        "WgpuBackend: draw skipped, stream {} is not bound",
                        layout.stream
                    );
                    return Ok(());
                }
            }
        }

        let key = PipelineKey {
            program: program.id,
            primitive_type,
            rasterizer: self.rasterizer,
            blend: self.blend,
            depth: self.depth_state,
            color_format: self
                .color
                .as_ref()
                .map(|s| convert_pixel_format(s.format()))
                .transpose()?,
            depth_format: self
                .depth
                .as_ref()
                .map(|s| convert_pixel_format(s.format()))
                .transpose()?,
        };
        let pipeline = self.backend.render_pipeline(&program, key)?;
        let textures = self.texture_group()?;
        let uniform_offsets = self.current_uniform_offsets();

        self.pending.push(PendingDraw {
            pipeline,
            vertex_buffers,
            textures,
            uniform_offsets,
            viewport: self.viewport,
            scissor: self.scissor,
            call,
        });
        Ok(())
    }

    /// Encode pending draws into one render pass on the current targets.
    fn flush_pass(&mut self) -> Result<(), GraphicsError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        profile_scope!("wgpu::render_pass");
        let Some(target_size) = self.target_size() else {
            self.pending.clear();
            return Ok(());
        };
        let device = &self.backend.device;
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Pass Uniforms"),
            contents: &self.uniform_data,
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let uniform_entry = |binding: u32, size: u64| wgpu::BindGroupEntry {
            binding,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &uniforms,
                offset: 0,
                size: wgpu::BufferSize::new(size),
            }),
        };
        let uniform_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Uniform Bind Group"),
            layout: &self.backend.uniform_layout,
            entries: &[
                uniform_entry(0, VIEW_BLOCK_SIZE),
                uniform_entry(1, PARAMETER_BLOCK_SIZE),
                uniform_entry(2, PARAMETER_BLOCK_SIZE),
            ],
        });

        let color_view = match &self.color {
            Some(surface) => Some(wgpu_texture(surface.gpu())?.1.clone()),
            None => None,
        };
        let depth_view = match &self.depth {
            Some(surface) => Some(wgpu_texture(surface.gpu())?.1.clone()),
            None => None,
        };
        let draws = std::mem::take(&mut self.pending);

        {
            let color_attachments = [color_view.as_ref().map(|view| {
                wgpu::RenderPassColorAttachment {
                    view: view.as_ref(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                }
            })];
            let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Device Context Pass"),
                color_attachments: if color_view.is_some() {
                    &color_attachments[..]
                } else {
                    &[]
                },
                depth_stencil_attachment: depth_view.as_ref().map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view: view.as_ref(),
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for draw in &draws {
                let Some((x, y, width, height, min_depth, max_depth)) =
                    clamp_viewport(draw.viewport, target_size)
                else {
                    continue;
                };
                let (sx, sy, sw, sh) = clamp_scissor(draw.scissor, target_size);
                if sw == 0 || sh == 0 {
                    continue;
                }
                pass.set_pipeline(&draw.pipeline);
                pass.set_bind_group(0, &uniform_group, &draw.uniform_offsets);
                pass.set_bind_group(1, draw.textures.as_ref(), &[]);
                for (slot, (buffer, offset)) in draw.vertex_buffers.iter().enumerate() {
                    let offset = (*offset).min(buffer.size());
                    pass.set_vertex_buffer(slot as u32, buffer.slice(offset..));
                }
                pass.set_viewport(x, y, width, height, min_depth, max_depth);
                pass.set_scissor_rect(sx, sy, sw, sh);
                match &draw.call {
                    DrawCall::Vertices {
                        vertices,
                        instances,
                    } => pass.draw(vertices.clone(), 0..*instances),
                    DrawCall::Indexed {
                        buffer,
                        format,
                        indices,
                        base_vertex,
                        instances,
                    } => {
                        pass.set_index_buffer(buffer.slice(..), *format);
                        pass.draw_indexed(indices.clone(), *base_vertex, 0..*instances);
                    }
                }
            }
        }

        self.uniform_data.clear();
        self.uniform_offsets = None;
        Ok(())
    }

    fn clear_color(&mut self, surface: &SurfaceRef, color: LinearColor) -> Result<(), GraphicsError> {
        self.flush_pass()?;
        let (_, view) = wgpu_texture(surface.gpu())?;
        let _pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Color"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: view.as_ref(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: color.r as f64,
                        g: color.g as f64,
                        b: color.b as f64,
                        a: color.a as f64,
                    }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        Ok(())
    }

    fn clear_depth(&mut self, surface: &SurfaceRef, depth: f32) -> Result<(), GraphicsError> {
        self.flush_pass()?;
        let (_, view) = wgpu_texture(surface.gpu())?;
        let _pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Depth"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: view.as_ref(),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(depth),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        Ok(())
    }

    fn update_buffer(
        &mut self,
        buffer: &crate::backend::GpuBuffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        if data.is_empty() {
            return Ok(());
        }
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer update offset {offset} is not 4-byte aligned"
            )));
        }
        self.flush_pass()?;
        let target = wgpu_buffer(buffer)?;
        let size = align_up(data.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT)
            .min(target.size().saturating_sub(offset));
        let mut contents = data.to_vec();
        contents.resize(size as usize, 0);
        let staging = self
            .backend
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Buffer Update Staging"),
                contents: &contents,
                usage: wgpu::BufferUsages::COPY_SRC,
            });
        self.encoder
            .copy_buffer_to_buffer(&staging, 0, target, offset, size);
        Ok(())
    }

    fn update_texture(
        &mut self,
        texture: &Texture2D,
        mip: u32,
        row_pitch: u32,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        if texture.format().is_depth_stencil() {
            return Err(GraphicsError::FeatureNotSupported(
                "depth texture uploads on the wgpu backend".into(),
            ));
        }
        self.flush_pass()?;
        let (target, _) = wgpu_texture(texture.gpu())?;
        let (width, height) = texture.descriptor().mip_size(mip);
        let tight_pitch = texture.row_pitch(mip) as usize;
        let padded_pitch =
            align_up(tight_pitch as u64, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64) as usize;
        let contents = repack_rows(
            data,
            row_pitch.max(1) as usize,
            padded_pitch,
            tight_pitch,
            height as usize,
        );
        let staging = self
            .backend
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Texture Update Staging"),
                contents: &contents,
                usage: wgpu::BufferUsages::COPY_SRC,
            });
        self.encoder.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_pitch as u32),
                    rows_per_image: Some(height),
                },
            },
            wgpu::TexelCopyTextureInfo {
                texture: target,
                mip_level: mip,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn finish(mut self) -> Result<wgpu::CommandBuffer, GraphicsError> {
        self.flush_pass()?;
        Ok(self.encoder.finish())
    }
}

/// Viewport clamped to the target, or the full target when unset.
fn clamp_viewport(
    rect: Option<ViewportRect>,
    (target_width, target_height): (u32, u32),
) -> Option<(f32, f32, f32, f32, f32, f32)> {
    let (tw, th) = (target_width as f32, target_height as f32);
    let rect = rect.unwrap_or_else(|| ViewportRect::from_dimensions(target_width, target_height));
    let x = rect.x.clamp(0.0, tw);
    let y = rect.y.clamp(0.0, th);
    let width = rect.width.min(tw - x);
    let height = rect.height.min(th - y);
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    Some((x, y, width, height, rect.min_depth, rect.max_depth))
}

/// Scissor clamped to the target, or the full target when unset.
fn clamp_scissor(
    rect: Option<ScissorRect>,
    (target_width, target_height): (u32, u32),
) -> (u32, u32, u32, u32) {
    match rect {
        Some(rect) => {
            let x = rect.x.min(target_width);
            let y = rect.y.min(target_height);
            (
                x,
                y,
                rect.width.min(target_width - x),
                rect.height.min(target_height - y),
            )
        }
        None => (0, 0, target_width, target_height),
    }
}

impl WgpuBackend {
    /// Replay `commands` into one encoder and submit it.
    pub(super) fn execute_commands(&self, commands: &[DeviceCommand]) -> Result<(), GraphicsError> {
        profile_scope!("WgpuBackend::submit");
        log::trace!("WgpuBackend: executing {} commands", commands.len());
        let mut replay = Replay::new(self);
        for command in commands {
            replay.execute(command)?;
        }
        let command_buffer = replay.finish()?;
        self.queue.submit(std::iter::once(command_buffer));
        Ok(())
    }

    /// Cached render pipeline for `program` under the fixed-function `key`.
    fn render_pipeline(
        &self,
        program: &WgpuProgram,
        key: PipelineKey,
    ) -> Result<Arc<wgpu::RenderPipeline>, GraphicsError> {
        if let Some(pipeline) = self.pipelines.lock().get(&key) {
            return Ok(pipeline.clone());
        }

        let features = self.device.features();
        let mut primitive = convert_primitive_state(key.primitive_type, &key.rasterizer)?;
        if primitive.polygon_mode == wgpu::PolygonMode::Line
            && !features.contains(wgpu::Features::POLYGON_MODE_LINE)
        {
            log::warn!("WgpuBackend: wireframe is not supported by this device, drawing solid");
            primitive.polygon_mode = wgpu::PolygonMode::Fill;
        }
        if primitive.unclipped_depth && !features.contains(wgpu::Features::DEPTH_CLIP_CONTROL) {
            primitive.unclipped_depth = false;
        }

        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = program
            .streams
            .iter()
            .map(|stream| wgpu::VertexBufferLayout {
                array_stride: stream.stride,
                step_mode: stream.step_mode,
                attributes: &stream.attributes,
            })
            .collect();
        let targets: Vec<Option<wgpu::ColorTargetState>> = key
            .color_format
            .map(|format| wgpu::ColorTargetState {
                format,
                blend: convert_blend_state(&key.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })
            .into_iter()
            .map(Some)
            .collect();

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Bound Shader State Pipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.vertex,
                    entry_point: Some(&program.vertex_entry),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &buffers,
                },
                primitive,
                depth_stencil: key
                    .depth_format
                    .map(|format| convert_depth_state(&key.depth, format)),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &program.fragment,
                    entry_point: Some(&program.fragment_entry),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &targets,
                }),
                multiview_mask: None,
                cache: None,
            });
        let pipeline = Arc::new(pipeline);
        log::debug!(
            "WgpuBackend: created pipeline for program {} ({:?})",
            key.program,
            key.primitive_type
        );
        self.pipelines.lock().insert(key, pipeline.clone());
        Ok(pipeline)
    }
}
