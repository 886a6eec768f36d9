//! Resource creation and readback for the wgpu backend.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::error::GraphicsError;
use crate::resources::{Shader, Texture2D};
use crate::types::{
    BufferDescriptor, SamplerStateDescriptor, ShaderFrequency, TextureDescriptor, VertexElement,
};

use super::super::{
    GpuBoundShaderState, GpuBuffer, GpuSampler, GpuShader, GpuTexture, ProgramDescriptor,
    TextureReadback,
};
use super::conversion::{
    convert_address_mode, convert_buffer_usage, convert_pixel_format, convert_sampler_filter,
    convert_step_mode, convert_texture_flags, convert_vertex_format,
};
use super::{StreamLayout, WgpuBackend, WgpuProgram};

/// Round `value` up to a multiple of `alignment`.
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// White 1x1 texture and bilinear sampler bound to unset texture slots.
pub(super) fn create_defaults(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> (wgpu::TextureView, wgpu::Sampler) {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("Default Texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &[255, 255, 255, 255],
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Default Sampler"),
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });
    (view, sampler)
}

/// Group declaration elements into per-stream vertex buffer layouts.
pub(crate) fn stream_layouts(elements: &[VertexElement]) -> Vec<StreamLayout> {
    let mut streams: BTreeMap<u32, StreamLayout> = BTreeMap::new();
    for element in elements {
        let layout = streams
            .entry(element.stream_index)
            .or_insert_with(|| StreamLayout {
                stream: element.stream_index,
                stride: element.stride as u64,
                step_mode: convert_step_mode(element.step_mode),
                attributes: Vec::new(),
            });
        layout.attributes.push(wgpu::VertexAttribute {
            format: convert_vertex_format(element.element_type),
            offset: element.offset as u64,
            shader_location: element.attribute_index,
        });
    }
    streams.into_values().collect()
}

#[allow(unreachable_patterns)]
pub(crate) fn wgpu_buffer(buffer: &GpuBuffer) -> Result<&Arc<wgpu::Buffer>, GraphicsError> {
    match buffer {
        GpuBuffer::Wgpu(buffer) => Ok(buffer),
        _ => Err(GraphicsError::Internal(
            "non-wgpu buffer passed to the wgpu backend".into(),
        )),
    }
}

#[allow(unreachable_patterns)]
pub(crate) fn wgpu_texture(
    texture: &GpuTexture,
) -> Result<(&Arc<wgpu::Texture>, &Arc<wgpu::TextureView>), GraphicsError> {
    match texture {
        GpuTexture::Wgpu { texture, view } => Ok((texture, view)),
        _ => Err(GraphicsError::Internal(
            "non-wgpu texture passed to the wgpu backend".into(),
        )),
    }
}

#[allow(unreachable_patterns)]
fn wgpu_shader(shader: &Shader) -> Result<&Arc<wgpu::ShaderModule>, GraphicsError> {
    match shader.gpu() {
        GpuShader::Wgpu(module) => Ok(module),
        _ => Err(GraphicsError::Internal(
            "non-wgpu shader passed to the wgpu backend".into(),
        )),
    }
}

fn texture_aspect(format: wgpu::TextureFormat) -> wgpu::TextureAspect {
    if format.is_depth_stencil_format() {
        wgpu::TextureAspect::DepthOnly
    } else {
        wgpu::TextureAspect::All
    }
}

/// Repack rows of `row_bytes` from `src_pitch` to `dst_pitch`.
pub(crate) fn repack_rows(
    src: &[u8],
    src_pitch: usize,
    dst_pitch: usize,
    row_bytes: usize,
    rows: usize,
) -> Vec<u8> {
    let mut out = vec![0u8; dst_pitch * rows];
    for row in 0..rows {
        let src_start = row * src_pitch;
        let n = row_bytes.min(src.len().saturating_sub(src_start));
        out[row * dst_pitch..row * dst_pitch + n].copy_from_slice(&src[src_start..src_start + n]);
    }
    out
}

impl WgpuBackend {
    pub(super) fn create_buffer_impl(
        &self,
        descriptor: &BufferDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<GpuBuffer, GraphicsError> {
        // Copies work in 4-byte units.
        let size = align_up(descriptor.size.max(4), wgpu::COPY_BUFFER_ALIGNMENT);
        let usage = convert_buffer_usage(descriptor.usage);
        let buffer = match initial_data {
            Some(data) => {
                let mut contents = vec![0u8; size as usize];
                let len = data.len().min(descriptor.size as usize);
                contents[..len].copy_from_slice(&data[..len]);
                self.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: descriptor.label.as_deref(),
                        contents: &contents,
                        usage,
                    })
            }
            None => self.device.create_buffer(&wgpu::BufferDescriptor {
                label: descriptor.label.as_deref(),
                size,
                usage,
                mapped_at_creation: false,
            }),
        };
        Ok(GpuBuffer::Wgpu(Arc::new(buffer)))
    }

    pub(super) fn create_texture_impl(
        &self,
        descriptor: &TextureDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<GpuTexture, GraphicsError> {
        let format = convert_pixel_format(descriptor.format)?;
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size: wgpu::Extent3d {
                width: descriptor.width.max(1),
                height: descriptor.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: descriptor.mip_levels.max(1),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: convert_texture_flags(descriptor.flags),
            view_formats: &[],
        });

        if let Some(data) = initial_data {
            let row_pitch = descriptor.format.row_pitch(descriptor.width);
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: texture_aspect(format),
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(row_pitch),
                    rows_per_image: Some(descriptor.height),
                },
                wgpu::Extent3d {
                    width: descriptor.width,
                    height: descriptor.height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(GpuTexture::Wgpu {
            texture: Arc::new(texture),
            view: Arc::new(view),
        })
    }

    /// Create a shader module from WGSL source.
    pub(super) fn create_shader_impl(
        &self,
        frequency: ShaderFrequency,
        code: &[u8],
        entry_point: &str,
    ) -> Result<GpuShader, GraphicsError> {
        if !matches!(frequency, ShaderFrequency::Vertex | ShaderFrequency::Pixel) {
            return Err(GraphicsError::FeatureNotSupported(format!(
                "{frequency} shaders on the wgpu backend"
            )));
        }
        let source = std::str::from_utf8(code).map_err(|e| {
            GraphicsError::InvalidParameter(format!("shader source is not UTF-8: {e}"))
        })?;
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(entry_point),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
            });
        Ok(GpuShader::Wgpu(Arc::new(module)))
    }

    pub(super) fn create_sampler_impl(&self, descriptor: &SamplerStateDescriptor) -> GpuSampler {
        let (filter, mipmap_filter) = convert_sampler_filter(descriptor.filter);
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: None,
            address_mode_u: convert_address_mode(descriptor.address_u),
            address_mode_v: convert_address_mode(descriptor.address_v),
            address_mode_w: convert_address_mode(descriptor.address_w),
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter,
            lod_min_clamp: 0.0,
            lod_max_clamp: 32.0,
            compare: None,
            // Anisotropy requires linear filtering everywhere.
            anisotropy_clamp: if mipmap_filter == wgpu::MipmapFilterMode::Linear {
                descriptor.max_anisotropy.max(1)
            } else {
                1
            },
            border_color: None,
        });
        GpuSampler::Wgpu(Arc::new(sampler))
    }

    pub(super) fn create_program(
        &self,
        descriptor: &ProgramDescriptor<'_>,
    ) -> Result<GpuBoundShaderState, GraphicsError> {
        if descriptor.hull.is_some() || descriptor.domain.is_some() {
            return Err(GraphicsError::FeatureNotSupported(
                "tessellation on the wgpu backend".into(),
            ));
        }
        if descriptor.geometry.is_some() {
            return Err(GraphicsError::FeatureNotSupported(
                "geometry shaders on the wgpu backend".into(),
            ));
        }
        let program = WgpuProgram {
            id: self.allocate_program_id(),
            vertex: wgpu_shader(descriptor.vertex)?.clone(),
            vertex_entry: descriptor.vertex.entry_point().to_string(),
            fragment: wgpu_shader(descriptor.pixel)?.clone(),
            fragment_entry: descriptor.pixel.entry_point().to_string(),
            streams: stream_layouts(descriptor.elements),
        };
        log::trace!(
            "WgpuBackend: program {} ({} -> {}, {} streams)",
            program.id,
            program.vertex_entry,
            program.fragment_entry,
            program.streams.len()
        );
        Ok(GpuBoundShaderState::Wgpu(Arc::new(program)))
    }

    /// Map `buffer` for reading and copy out its contents.
    fn map_read(&self, buffer: &wgpu::Buffer) -> Result<Vec<u8>, GraphicsError> {
        let slice = buffer.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| GraphicsError::Internal(format!("device poll failed: {e}")))?;
        rx.recv()
            .map_err(|_| GraphicsError::Internal("buffer map callback dropped".into()))?
            .map_err(|e| GraphicsError::Internal(format!("buffer map failed: {e}")))?;
        let data = slice.get_mapped_range().to_vec();
        buffer.unmap();
        Ok(data)
    }

    pub(super) fn read_buffer_impl(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        let source = wgpu_buffer(buffer)?;
        let start = offset - offset % wgpu::COPY_BUFFER_ALIGNMENT;
        let copy_size = align_up(offset + size - start, wgpu::COPY_BUFFER_ALIGNMENT)
            .min(source.size() - start);
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Read Staging Buffer"),
            size: align_up(copy_size, wgpu::COPY_BUFFER_ALIGNMENT),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Read Buffer Encoder"),
            });
        encoder.copy_buffer_to_buffer(source, start, &staging, 0, copy_size);
        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.wait_for(submission)?;

        let data = self.map_read(&staging)?;
        let skip = (offset - start) as usize;
        Ok(data[skip..skip + size as usize].to_vec())
    }

    pub(super) fn read_texture_impl(
        &self,
        texture: &Texture2D,
        mip: u32,
    ) -> Result<TextureReadback, GraphicsError> {
        let (source, _) = wgpu_texture(texture.gpu())?;
        let (width, height) = texture.descriptor().mip_size(mip);
        let row_pitch = texture.row_pitch(mip);
        let padded_pitch = align_up(row_pitch as u64, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64);
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Read Texture Staging Buffer"),
            size: padded_pitch * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Read Texture Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: source,
                mip_level: mip,
                origin: wgpu::Origin3d::ZERO,
                aspect: texture_aspect(source.format()),
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_pitch as u32),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.wait_for(submission)?;

        let padded = self.map_read(&staging)?;
        let data = repack_rows(
            &padded,
            padded_pitch as usize,
            row_pitch as usize,
            row_pitch as usize,
            height as usize,
        );
        Ok(TextureReadback { data, row_pitch })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{VertexElementType, VertexStepMode};

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }

    #[test]
    fn test_repack_rows_strips_padding() {
        let padded = [1, 2, 0, 0, 3, 4, 0, 0];
        assert_eq!(repack_rows(&padded, 4, 2, 2, 2), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_stream_layouts_group_by_stream() {
        let elements = [
            VertexElement::new(0, 0, VertexElementType::Float3, 0, 12),
            VertexElement::new(1, 0, VertexElementType::Float4, 4, 72).per_instance(),
            VertexElement::new(1, 16, VertexElementType::Float4, 5, 72).per_instance(),
        ];
        let layouts = stream_layouts(&elements);
        assert_eq!(layouts.len(), 2);
        assert_eq!(layouts[0].stride, 12);
        assert_eq!(layouts[1].attributes.len(), 2);
        assert_eq!(layouts[1].step_mode, convert_step_mode(VertexStepMode::Instance));
    }
}
