//! Immediate device context.
//!
//! A [`DeviceContext`] records state changes and draws as [`DeviceCommand`]s.
//! Nothing reaches the GPU until the context is flushed through
//! [`Rhi::flush`](crate::Rhi::flush), which hands the command list to the backend.

use lumen_core::LinearColor;

use crate::error::{GraphicsError, contract_violation};
use crate::resources::{
    BlendStateRef, BoundShaderStateRef, DepthStateRef, IndexBuffer, IndexBufferRef,
    RasterizerStateRef, SamplerStateRef, SurfaceRef, Texture2DRef, VertexBufferRef,
};
use crate::types::{
    PrimitiveType, ScissorRect, ShaderFrequency, TextureCreateFlags, ViewUniforms, ViewportRect,
};

/// Number of vertex stream slots.
pub const MAX_VERTEX_STREAMS: usize = 4;

/// Number of texture/sampler slots.
pub const MAX_TEXTURE_SLOTS: usize = 4;

/// Size of the per-stage shader parameter block in bytes.
pub const SHADER_PARAMETER_BYTES: usize = 256;

/// One recorded context operation.
#[derive(Debug, Clone)]
pub enum DeviceCommand {
    SetRenderTarget {
        color: Option<SurfaceRef>,
        depth: Option<SurfaceRef>,
    },
    ClearSurface {
        surface: SurfaceRef,
        color: LinearColor,
    },
    ClearDepthStencil {
        surface: SurfaceRef,
        depth: f32,
        stencil: u8,
    },
    SetViewport(ViewportRect),
    SetScissor(Option<ScissorRect>),
    SetBoundShaderState(BoundShaderStateRef),
    SetStreamSource {
        stream: u32,
        buffer: Option<VertexBufferRef>,
        offset: u64,
        stride: u32,
    },
    SetRasterizerState(RasterizerStateRef),
    SetBlendState(BlendStateRef),
    SetDepthState(DepthStateRef),
    SetSamplerState {
        slot: u32,
        sampler: SamplerStateRef,
    },
    SetTexture {
        slot: u32,
        texture: Option<Texture2DRef>,
    },
    SetShaderParameter {
        frequency: ShaderFrequency,
        offset: u32,
        data: Vec<u8>,
    },
    SetViewParameters(Box<ViewUniforms>),
    Draw {
        primitive_type: PrimitiveType,
        base_vertex: u32,
        vertex_count: u32,
        num_instances: u32,
    },
    DrawIndexed {
        index_buffer: IndexBufferRef,
        primitive_type: PrimitiveType,
        base_vertex_index: i32,
        start_index: u32,
        index_count: u32,
        num_instances: u32,
    },
    UpdateBuffer {
        buffer: crate::backend::GpuBuffer,
        offset: u64,
        data: Vec<u8>,
    },
    UpdateTexture {
        texture: Texture2DRef,
        mip: u32,
        row_pitch: u32,
        data: Vec<u8>,
    },
}

/// Command-recording context bound to the rendering thread.
#[derive(Debug, Default)]
pub struct DeviceContext {
    commands: Vec<DeviceCommand>,
    streams: [Option<VertexBufferRef>; MAX_VERTEX_STREAMS],
    bound_shader_state: Option<BoundShaderStateRef>,
    color_target: Option<SurfaceRef>,
    draw_calls: u64,
}

impl DeviceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands recorded since the last flush.
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Draws recorded over the lifetime of this context.
    pub fn draw_call_count(&self) -> u64 {
        self.draw_calls
    }

    pub fn bound_shader_state(&self) -> Option<&BoundShaderStateRef> {
        self.bound_shader_state.as_ref()
    }

    /// Current color render target.
    pub fn render_target(&self) -> Option<&SurfaceRef> {
        self.color_target.as_ref()
    }

    pub(crate) fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }

    pub(crate) fn push(&mut self, command: DeviceCommand) {
        self.commands.push(command);
    }

    /// Bind color and depth targets.
    pub fn set_render_target(
        &mut self,
        color: Option<&SurfaceRef>,
        depth: Option<&SurfaceRef>,
    ) -> Result<(), GraphicsError> {
        if let Some(color) = color
            && !color.flags().contains(TextureCreateFlags::RENDER_TARGET)
        {
            return Err(contract_violation!(
                "texture {} bound as render target without RENDER_TARGET",
                color.id()
            ));
        }
        if let Some(depth) = depth
            && !depth.flags().contains(TextureCreateFlags::DEPTH_STENCIL)
        {
            return Err(contract_violation!(
                "texture {} bound as depth target without DEPTH_STENCIL",
                depth.id()
            ));
        }
        self.color_target = color.cloned();
        self.commands.push(DeviceCommand::SetRenderTarget {
            color: color.cloned(),
            depth: depth.cloned(),
        });
        Ok(())
    }

    pub fn clear_surface(&mut self, surface: &SurfaceRef, color: LinearColor) {
        self.commands.push(DeviceCommand::ClearSurface {
            surface: surface.clone(),
            color,
        });
    }

    pub fn clear_depth_stencil(&mut self, surface: &SurfaceRef, depth: f32, stencil: u8) {
        self.commands.push(DeviceCommand::ClearDepthStencil {
            surface: surface.clone(),
            depth,
            stencil,
        });
    }

    /// Set the viewport rectangle. Rectangles without area are ignored.
    pub fn set_viewport(&mut self, rect: ViewportRect) {
        if !rect.has_area() {
            log::trace!("DeviceContext: ignoring empty viewport {rect:?}");
            return;
        }
        self.commands.push(DeviceCommand::SetViewport(rect));
    }

    /// Set or disable (`None`) the scissor rectangle.
    pub fn set_scissor_rect(&mut self, rect: Option<ScissorRect>) {
        self.commands.push(DeviceCommand::SetScissor(rect));
    }

    pub fn set_bound_shader_state(&mut self, state: &BoundShaderStateRef) {
        self.bound_shader_state = Some(state.clone());
        self.commands
            .push(DeviceCommand::SetBoundShaderState(state.clone()));
    }

    /// Bind (or unbind with `None`) a vertex buffer to a stream slot.
    pub fn set_stream_source(
        &mut self,
        stream: u32,
        buffer: Option<&VertexBufferRef>,
        offset: u64,
        stride: u32,
    ) -> Result<(), GraphicsError> {
        let Some(slot) = self.streams.get_mut(stream as usize) else {
            return Err(contract_violation!(
                "stream {stream} exceeds {MAX_VERTEX_STREAMS} slots"
            ));
        };
        *slot = buffer.cloned();
        self.commands.push(DeviceCommand::SetStreamSource {
            stream,
            buffer: buffer.cloned(),
            offset,
            stride,
        });
        Ok(())
    }

    pub fn set_rasterizer_state(&mut self, state: &RasterizerStateRef) {
        self.commands
            .push(DeviceCommand::SetRasterizerState(state.clone()));
    }

    pub fn set_blend_state(&mut self, state: &BlendStateRef) {
        self.commands.push(DeviceCommand::SetBlendState(state.clone()));
    }

    pub fn set_depth_state(&mut self, state: &DepthStateRef) {
        self.commands.push(DeviceCommand::SetDepthState(state.clone()));
    }

    pub fn set_sampler_state(
        &mut self,
        slot: u32,
        sampler: &SamplerStateRef,
    ) -> Result<(), GraphicsError> {
        check_texture_slot(slot)?;
        self.commands.push(DeviceCommand::SetSamplerState {
            slot,
            sampler: sampler.clone(),
        });
        Ok(())
    }

    /// Bind a texture to a pixel shader slot.
    pub fn set_texture_parameter(
        &mut self,
        slot: u32,
        texture: Option<&Texture2DRef>,
    ) -> Result<(), GraphicsError> {
        check_texture_slot(slot)?;
        self.commands.push(DeviceCommand::SetTexture {
            slot,
            texture: texture.cloned(),
        });
        Ok(())
    }

    /// Write raw bytes into a stage's shader parameter block.
    pub fn set_shader_parameter(
        &mut self,
        frequency: ShaderFrequency,
        offset: u32,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        if offset as usize + data.len() > SHADER_PARAMETER_BYTES {
            return Err(contract_violation!(
                "shader parameter {offset}+{} exceeds {SHADER_PARAMETER_BYTES} bytes",
                data.len()
            ));
        }
        self.commands.push(DeviceCommand::SetShaderParameter {
            frequency,
            offset,
            data: data.to_vec(),
        });
        Ok(())
    }

    /// Typed variant of [`set_shader_parameter`](Self::set_shader_parameter).
    pub fn set_shader_parameter_pod<T: bytemuck::Pod>(
        &mut self,
        frequency: ShaderFrequency,
        offset: u32,
        value: &T,
    ) -> Result<(), GraphicsError> {
        self.set_shader_parameter(frequency, offset, bytemuck::bytes_of(value))
    }

    pub fn set_view_parameters(&mut self, uniforms: ViewUniforms) {
        self.commands
            .push(DeviceCommand::SetViewParameters(Box::new(uniforms)));
    }

    /// Check that a draw may be issued with the current bindings.
    pub(crate) fn validate_draw(&self, index_buffer: Option<&IndexBuffer>) -> Result<(), GraphicsError> {
        if self.bound_shader_state.is_none() {
            return Err(contract_violation!("draw without a bound shader state"));
        }
        if let Some(locked) = self.streams.iter().flatten().find(|b| b.is_locked()) {
            return Err(contract_violation!(
                "draw from locked vertex buffer {}",
                locked.id()
            ));
        }
        if let Some(index_buffer) = index_buffer
            && index_buffer.is_locked()
        {
            return Err(contract_violation!(
                "draw from locked index buffer {}",
                index_buffer.id()
            ));
        }
        Ok(())
    }

    pub(crate) fn record_draw(&mut self, command: DeviceCommand) {
        self.draw_calls += 1;
        self.commands.push(command);
    }
}

fn check_texture_slot(slot: u32) -> Result<(), GraphicsError> {
    if slot as usize >= MAX_TEXTURE_SLOTS {
        return Err(contract_violation!(
            "texture slot {slot} exceeds {MAX_TEXTURE_SLOTS} slots"
        ));
    }
    Ok(())
}

static_assertions::assert_impl_all!(DeviceContext: Send);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_viewport_is_ignored() {
        let mut ctx = DeviceContext::new();
        ctx.set_viewport(ViewportRect::new(0.0, 0.0, 0.0, 10.0));
        ctx.set_viewport(ViewportRect::new(0.0, 0.0, 10.0, -1.0));
        assert!(ctx.is_empty());

        ctx.set_viewport(ViewportRect::from_dimensions(8, 8));
        assert_eq!(ctx.commands().len(), 1);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "without a bound shader state"))]
    fn test_draw_requires_bound_shader_state() {
        let ctx = DeviceContext::new();
        assert!(ctx.validate_draw(None).is_err());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "exceeds"))]
    fn test_shader_parameter_bounds() {
        let mut ctx = DeviceContext::new();
        assert!(
            ctx.set_shader_parameter(ShaderFrequency::Pixel, 250, &[0u8; 16])
                .is_err()
        );
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_shader_parameter_records_bytes() {
        let mut ctx = DeviceContext::new();
        ctx.set_shader_parameter_pod(ShaderFrequency::Vertex, 16, &[1.0f32, 2.0, 3.0, 4.0])
            .unwrap();
        match &ctx.commands()[0] {
            DeviceCommand::SetShaderParameter { offset, data, .. } => {
                assert_eq!(*offset, 16);
                assert_eq!(data.len(), 16);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
