//! Dummy GPU backend for testing and development.
//!
//! This backend performs no GPU work. Buffers and textures live in host
//! memory, command lists are interpreted in order (clears fill memory,
//! updates write memory, draws are recorded), and presents are counted. It is
//! the controllable mock behind most tests.

use std::sync::Arc;

use lumen_core::LinearColor;
use parking_lot::Mutex;

use crate::context::{DeviceCommand, MAX_VERTEX_STREAMS};
use crate::device::DeviceCapabilities;
use crate::error::GraphicsError;
use crate::resources::{ResourceId, Texture2D};
use crate::types::{
    BufferDescriptor, PixelFormat, PrimitiveType, SamplerStateDescriptor, ShaderFrequency,
    TextureDescriptor,
};

use super::{
    GpuBackend, GpuBoundShaderState, GpuBuffer, GpuSampler, GpuShader, GpuSwapChain, GpuTexture,
    ProgramDescriptor, TextureReadback, ViewportWindow,
};

/// Draw records kept before older ones are discarded.
const MAX_DRAW_RECORDS: usize = 4096;

/// Host memory standing in for a GPU buffer.
#[derive(Debug)]
pub struct DummyBuffer {
    memory: Mutex<Vec<u8>>,
}

impl DummyBuffer {
    pub fn new(size: u64) -> Self {
        Self {
            memory: Mutex::new(vec![0; size as usize]),
        }
    }

    pub fn len(&self) -> usize {
        self.memory.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, offset: u64, size: u64) -> Result<Vec<u8>, GraphicsError> {
        let memory = self.memory.lock();
        let range = checked_range(offset, size, memory.len())?;
        Ok(memory[range].to_vec())
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        let mut memory = self.memory.lock();
        let range = checked_range(offset, data.len() as u64, memory.len())?;
        memory[range].copy_from_slice(data);
        Ok(())
    }
}

/// Host memory standing in for a GPU texture, one allocation per mip.
#[derive(Debug)]
pub struct DummyTexture {
    format: PixelFormat,
    mips: Vec<Mutex<Vec<u8>>>,
    row_pitches: Vec<u32>,
}

impl DummyTexture {
    pub fn new(descriptor: &TextureDescriptor) -> Self {
        let mip_count = descriptor.mip_levels.max(1);
        let mips = (0..mip_count)
            .map(|mip| Mutex::new(vec![0; descriptor.mip_byte_size(mip) as usize]))
            .collect();
        let row_pitches = (0..mip_count)
            .map(|mip| descriptor.format.row_pitch(descriptor.mip_size(mip).0))
            .collect();
        Self {
            format: descriptor.format,
            mips,
            row_pitches,
        }
    }

    fn mip(&self, mip: u32) -> Result<(&Mutex<Vec<u8>>, u32), GraphicsError> {
        let memory = self.mips.get(mip as usize).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("mip {mip} out of range"))
        })?;
        Ok((memory, self.row_pitches[mip as usize]))
    }

    fn fill(&self, pixel: &[u8]) {
        if pixel.is_empty() {
            return;
        }
        let mut memory = self.mips[0].lock();
        for chunk in memory.chunks_exact_mut(pixel.len()) {
            chunk.copy_from_slice(pixel);
        }
    }
}

/// One draw seen by the dummy backend.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub primitive_type: PrimitiveType,
    pub vertex_count: u32,
    /// Index count for indexed draws.
    pub index_count: Option<u32>,
    pub num_instances: u32,
    pub bound_shader_state: Option<ResourceId>,
    pub render_target: Option<ResourceId>,
    /// Stream 0 contents from the bound offset, when capture is enabled.
    pub stream0: Option<Vec<u8>>,
}

/// Counters accumulated by the dummy backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DummyStats {
    pub submits: u64,
    pub commands: u64,
    pub draw_calls: u64,
    pub instances: u64,
    pub clears: u64,
    pub buffer_updates: u64,
    pub texture_updates: u64,
    pub presents: u64,
    pub ui_inits: u64,
    pub ui_frames: u64,
    pub ui_shutdowns: u64,
}

#[derive(Debug, Default)]
struct ExecutionState {
    color_target: Option<ResourceId>,
    streams: [Option<(GpuBuffer, u64)>; MAX_VERTEX_STREAMS],
    bound_shader_state: Option<ResourceId>,
}

#[derive(Debug, Default)]
struct DummyInner {
    state: ExecutionState,
    stats: DummyStats,
    draws: Vec<DrawRecord>,
}

/// Dummy GPU backend.
#[derive(Debug, Default)]
pub struct DummyBackend {
    inner: Mutex<DummyInner>,
    capture_streams: std::sync::atomic::AtomicBool,
    failing_buffer_creates: std::sync::atomic::AtomicU32,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot stream 0 bytes into each [`DrawRecord`].
    pub fn set_capture_streams(&self, enabled: bool) {
        self.capture_streams
            .store(enabled, std::sync::atomic::Ordering::Relaxed);
    }

    /// Make the next `count` buffer creations fail with [`GraphicsError::OutOfMemory`].
    pub fn fail_next_buffer_creations(&self, count: u32) {
        self.failing_buffer_creates
            .store(count, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn stats(&self) -> DummyStats {
        self.inner.lock().stats
    }

    /// Draws recorded since the last [`take_draws`](Self::take_draws).
    pub fn draws(&self) -> Vec<DrawRecord> {
        self.inner.lock().draws.clone()
    }

    pub fn take_draws(&self) -> Vec<DrawRecord> {
        std::mem::take(&mut self.inner.lock().draws)
    }

    fn execute(&self, inner: &mut DummyInner, command: &DeviceCommand) -> Result<(), GraphicsError> {
        match command {
            DeviceCommand::SetRenderTarget { color, .. } => {
                inner.state.color_target = color.as_ref().map(|c| c.id());
            }
            DeviceCommand::ClearSurface { surface, color } => {
                inner.stats.clears += 1;
                let texture = dummy_texture(surface.gpu())?;
                texture.fill(&encode_pixel(texture.format, *color));
            }
            DeviceCommand::ClearDepthStencil { surface, depth, .. } => {
                inner.stats.clears += 1;
                dummy_texture(surface.gpu())?.fill(&depth.to_le_bytes());
            }
            DeviceCommand::SetBoundShaderState(state) => {
                inner.state.bound_shader_state = Some(state.id());
            }
            DeviceCommand::SetStreamSource {
                stream,
                buffer,
                offset,
                ..
            } => {
                if let Some(slot) = inner.state.streams.get_mut(*stream as usize) {
                    *slot = buffer.as_ref().map(|b| (b.gpu().clone(), *offset));
                }
            }
            DeviceCommand::Draw {
                primitive_type,
                vertex_count,
                num_instances,
                ..
            } => self.record_draw(inner, *primitive_type, *vertex_count, None, *num_instances)?,
            DeviceCommand::DrawIndexed {
                primitive_type,
                index_count,
                num_instances,
                ..
            } => self.record_draw(
                inner,
                *primitive_type,
                *index_count,
                Some(*index_count),
                *num_instances,
            )?,
            DeviceCommand::UpdateBuffer {
                buffer,
                offset,
                data,
            } => {
                inner.stats.buffer_updates += 1;
                dummy_buffer(buffer)?.write(*offset, data)?;
            }
            DeviceCommand::UpdateTexture {
                texture,
                mip,
                row_pitch,
                data,
            } => {
                inner.stats.texture_updates += 1;
                let (memory, tight_pitch) = dummy_texture(texture.gpu())?.mip(*mip)?;
                copy_rows(&mut memory.lock(), tight_pitch, data, *row_pitch);
            }
            DeviceCommand::SetViewport(_)
            | DeviceCommand::SetScissor(_)
            | DeviceCommand::SetRasterizerState(_)
            | DeviceCommand::SetBlendState(_)
            | DeviceCommand::SetDepthState(_)
            | DeviceCommand::SetSamplerState { .. }
            | DeviceCommand::SetTexture { .. }
            | DeviceCommand::SetShaderParameter { .. }
            | DeviceCommand::SetViewParameters(_) => {}
        }
        Ok(())
    }

    fn record_draw(
        &self,
        inner: &mut DummyInner,
        primitive_type: PrimitiveType,
        vertex_count: u32,
        index_count: Option<u32>,
        num_instances: u32,
    ) -> Result<(), GraphicsError> {
        inner.stats.draw_calls += 1;
        inner.stats.instances += num_instances as u64;
        let stream0 = if self
            .capture_streams
            .load(std::sync::atomic::Ordering::Relaxed)
        {
            match &inner.state.streams[0] {
                Some((buffer, offset)) => {
                    let buffer = dummy_buffer(buffer)?;
                    let len = buffer.len() as u64;
                    Some(buffer.read(*offset, len.saturating_sub(*offset))?)
                }
                None => None,
            }
        } else {
            None
        };
        if inner.draws.len() >= MAX_DRAW_RECORDS {
            inner.draws.remove(0);
        }
        inner.draws.push(DrawRecord {
            primitive_type,
            vertex_count,
            index_count,
            num_instances,
            bound_shader_state: inner.state.bound_shader_state,
            render_target: inner.state.color_target,
            stream0,
        });
        log::trace!(
            "DummyBackend: draw {:?} vertices={} instances={}",
            primitive_type,
            vertex_count,
            num_instances
        );
        Ok(())
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities::default()
    }

    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<GpuBuffer, GraphicsError> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        let injected = self.failing_buffer_creates.fetch_update(
            std::sync::atomic::Ordering::Relaxed,
            std::sync::atomic::Ordering::Relaxed,
            |left| left.checked_sub(1),
        );
        if injected.is_ok() {
            log::trace!("DummyBackend: failing buffer {:?}", descriptor.label);
            return Err(GraphicsError::OutOfMemory);
        }
        let buffer = DummyBuffer::new(descriptor.size);
        if let Some(data) = initial_data {
            let len = data.len().min(descriptor.size as usize);
            buffer.write(0, &data[..len])?;
        }
        Ok(GpuBuffer::Dummy(Arc::new(buffer)))
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<GpuTexture, GraphicsError> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}, {:?})",
            descriptor.label,
            descriptor.width,
            descriptor.height,
            descriptor.format
        );
        let texture = DummyTexture::new(descriptor);
        if let Some(data) = initial_data {
            let mut mip0 = texture.mips[0].lock();
            let len = data.len().min(mip0.len());
            mip0[..len].copy_from_slice(&data[..len]);
        }
        Ok(GpuTexture::Dummy(Arc::new(texture)))
    }

    fn create_shader(
        &self,
        frequency: ShaderFrequency,
        code: &[u8],
        entry_point: &str,
    ) -> Result<GpuShader, GraphicsError> {
        log::trace!(
            "DummyBackend: creating {} shader '{}' ({} bytes)",
            frequency,
            entry_point,
            code.len()
        );
        Ok(GpuShader::Dummy {
            source_len: code.len(),
        })
    }

    fn create_sampler(
        &self,
        descriptor: &SamplerStateDescriptor,
    ) -> Result<GpuSampler, GraphicsError> {
        log::trace!("DummyBackend: creating sampler {:?}", descriptor.filter);
        Ok(GpuSampler::Dummy)
    }

    fn create_bound_shader_state(
        &self,
        descriptor: &ProgramDescriptor<'_>,
    ) -> Result<GpuBoundShaderState, GraphicsError> {
        log::trace!(
            "DummyBackend: creating bound shader state ({} elements)",
            descriptor.elements.len()
        );
        Ok(GpuBoundShaderState::Dummy)
    }

    fn submit(&self, commands: &[DeviceCommand]) -> Result<(), GraphicsError> {
        log::trace!("DummyBackend: executing {} commands", commands.len());
        let mut inner = self.inner.lock();
        inner.stats.submits += 1;
        inner.stats.commands += commands.len() as u64;
        for command in commands {
            self.execute(&mut inner, command)?;
        }
        Ok(())
    }

    fn read_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        log::trace!("DummyBackend: read_buffer offset={} size={}", offset, size);
        dummy_buffer(buffer)?.read(offset, size)
    }

    fn read_texture(
        &self,
        texture: &Texture2D,
        mip: u32,
    ) -> Result<TextureReadback, GraphicsError> {
        log::trace!("DummyBackend: read_texture {:?} mip={}", texture.label(), mip);
        let (memory, row_pitch) = dummy_texture(texture.gpu())?.mip(mip)?;
        Ok(TextureReadback {
            data: memory.lock().clone(),
            row_pitch,
        })
    }

    fn create_swap_chain(
        &self,
        _window: Arc<dyn ViewportWindow>,
        width: u32,
        height: u32,
        _vsync: bool,
    ) -> Result<GpuSwapChain, GraphicsError> {
        log::trace!("DummyBackend: creating swap chain {}x{}", width, height);
        Ok(GpuSwapChain::Dummy)
    }

    fn resize_swap_chain(
        &self,
        _swap_chain: &GpuSwapChain,
        width: u32,
        height: u32,
    ) -> Result<(), GraphicsError> {
        log::trace!("DummyBackend: resizing swap chain to {}x{}", width, height);
        Ok(())
    }

    fn present(
        &self,
        _swap_chain: Option<&GpuSwapChain>,
        surface: &Texture2D,
        lock_to_vsync: bool,
    ) -> Result<(), GraphicsError> {
        log::trace!(
            "DummyBackend: present {:?} vsync={}",
            surface.label(),
            lock_to_vsync
        );
        self.inner.lock().stats.presents += 1;
        Ok(())
    }

    fn ui_init(&self) -> Result<(), GraphicsError> {
        self.inner.lock().stats.ui_inits += 1;
        Ok(())
    }

    fn ui_end_draw(&self) -> Result<(), GraphicsError> {
        self.inner.lock().stats.ui_frames += 1;
        Ok(())
    }

    fn ui_shutdown(&self) -> Result<(), GraphicsError> {
        self.inner.lock().stats.ui_shutdowns += 1;
        Ok(())
    }
}

#[allow(unreachable_patterns)]
fn dummy_buffer(buffer: &GpuBuffer) -> Result<&Arc<DummyBuffer>, GraphicsError> {
    match buffer {
        GpuBuffer::Dummy(buffer) => Ok(buffer),
        _ => Err(GraphicsError::Internal(
            "non-dummy buffer passed to the dummy backend".into(),
        )),
    }
}

#[allow(unreachable_patterns)]
fn dummy_texture(texture: &GpuTexture) -> Result<&Arc<DummyTexture>, GraphicsError> {
    match texture {
        GpuTexture::Dummy(texture) => Ok(texture),
        _ => Err(GraphicsError::Internal(
            "non-dummy texture passed to the dummy backend".into(),
        )),
    }
}

fn checked_range(
    offset: u64,
    size: u64,
    len: usize,
) -> Result<std::ops::Range<usize>, GraphicsError> {
    let start = offset as usize;
    let end = start + size as usize;
    if end > len {
        return Err(GraphicsError::InvalidParameter(format!(
            "range {offset}+{size} outside {len} bytes"
        )));
    }
    Ok(start..end)
}

/// Encode one pixel of `format` with `color`.
fn encode_pixel(format: PixelFormat, color: LinearColor) -> Vec<u8> {
    match format {
        PixelFormat::A8R8G8B8 => color.to_color().to_bytes().to_vec(),
        PixelFormat::FloatRGBA => {
            let halves = color.to_array().map(half::f16::from_f32);
            bytemuck::cast_slice(&halves).to_vec()
        }
        PixelFormat::DepthStencil => color.r.to_le_bytes().to_vec(),
        PixelFormat::Unknown => Vec::new(),
    }
}

/// Copy rows of `src` with `src_pitch` into tightly packed `dst` rows.
fn copy_rows(dst: &mut [u8], dst_pitch: u32, src: &[u8], src_pitch: u32) {
    let (dst_pitch, src_pitch) = (dst_pitch as usize, src_pitch.max(1) as usize);
    let row_bytes = dst_pitch.min(src_pitch);
    for (dst_row, src_row) in dst.chunks_mut(dst_pitch).zip(src.chunks(src_pitch)) {
        let n = row_bytes.min(dst_row.len()).min(src_row.len());
        dst_row[..n].copy_from_slice(&src_row[..n]);
    }
}

static_assertions::assert_impl_all!(DummyBackend: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferUsage, TextureCreateFlags};

    #[test]
    fn test_dummy_backend_name() {
        let backend = DummyBackend::new();
        assert_eq!(backend.name(), "Dummy Backend");
    }

    #[test]
    fn test_buffer_initial_data_and_readback() {
        let backend = DummyBackend::new();
        let buffer = backend
            .create_buffer(
                &BufferDescriptor::new(8, BufferUsage::VERTEX),
                Some(&[1, 2, 3, 4]),
            )
            .unwrap();
        assert_eq!(
            backend.read_buffer(&buffer, 0, 8).unwrap(),
            vec![1, 2, 3, 4, 0, 0, 0, 0]
        );
        assert!(backend.read_buffer(&buffer, 4, 8).is_err());
    }

    #[test]
    fn test_encode_pixel_formats() {
        let red = LinearColor::new(1.0, 0.0, 0.0, 1.0);
        assert_eq!(encode_pixel(PixelFormat::A8R8G8B8, red), vec![255, 0, 0, 255]);
        assert_eq!(encode_pixel(PixelFormat::FloatRGBA, red).len(), 8);
        assert!(encode_pixel(PixelFormat::Unknown, red).is_empty());
    }

    #[test]
    fn test_copy_rows_with_padding() {
        let mut dst = vec![0u8; 8];
        let src = [1, 2, 3, 4, 9, 9, 5, 6, 7, 8, 9, 9];
        copy_rows(&mut dst, 4, &src, 6);
        assert_eq!(dst, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_texture_memory_per_mip() {
        let desc = TextureDescriptor::new_2d(
            4,
            2,
            PixelFormat::A8R8G8B8,
            TextureCreateFlags::SHADER_RESOURCE,
        )
        .with_mip_levels(2);
        let texture = DummyTexture::new(&desc);
        assert_eq!(texture.mips.len(), 2);
        assert_eq!(texture.row_pitches, vec![16, 8]);
        assert_eq!(texture.mips[1].lock().len(), 8);
    }
}
