//! The render hardware interface device.
//!
//! [`Rhi`] is the explicit device context object of the renderer. It creates
//! resources, owns the bound shader state cache and the [`StaticStates`],
//! validates locks and draws, and hands recorded [`DeviceContext`] command
//! lists to its [`GpuBackend`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lumen_core::{frame_mark, profile_function};
use parking_lot::Mutex;

use crate::backend::{self, GpuBackend, ProgramDescriptor, ViewportWindow};
use crate::config::RhiParameters;
use crate::context::{DeviceCommand, DeviceContext};
use crate::error::{GraphicsError, contract_violation};
use crate::resources::{
    BlendState, BlendStateRef, BoundShaderState, BoundShaderStateCache, BoundShaderStateKey,
    BoundShaderStateRef, BufferCore, DepthState, DepthStateRef, DomainShaderRef,
    GeometryShaderRef, HullShaderRef, IdAllocator, IndexBuffer, IndexBufferRef, LockedData,
    PixelShaderRef, RasterizerState, RasterizerStateRef, ResourceId, SamplerState,
    SamplerStateRef, Shader, StaticStates, Texture2D, Texture2DRef, VertexBuffer,
    VertexBufferRef, VertexDeclaration, VertexDeclarationRef, VertexShaderRef,
};
use crate::types::{
    BlendStateDescriptor, BufferDescriptor, BufferUsage, DepthStateDescriptor, IndexFormat,
    LockMode, PrimitiveType, RasterizerStateDescriptor, SamplerStateDescriptor, ShaderFrequency,
    TextureDescriptor, VertexElement, ViewportRect, vertex_count_for_primitive_count,
};
use crate::ui_overlay::UiOverlay;
use crate::viewport::Viewport;

/// Capabilities of a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    /// Maximum texture dimension.
    pub max_texture_dimension: u32,
    /// Maximum buffer size.
    pub max_buffer_size: u64,
    /// Whether hull and domain shaders are supported.
    pub tessellation: bool,
    /// Whether geometry shaders are supported.
    pub geometry_shaders: bool,
    /// Whether read locks can return GPU-written contents.
    pub readback: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_texture_dimension: 16384,
            max_buffer_size: 1 << 30, // 1 GB
            tessellation: true,
            geometry_shaders: true,
            readback: true,
        }
    }
}

/// The render hardware interface device.
///
/// # Thread Safety
///
/// `Rhi` is `Send + Sync`. Resource creation may happen on any thread;
/// command recording happens on the thread that owns the [`DeviceContext`].
///
/// # Example
///
/// ```ignore
/// let rhi = Rhi::new(RhiParameters::new().with_backend(BackendType::Dummy))?;
/// let mut ctx = rhi.create_immediate_context();
///
/// let vb = rhi.create_vertex_buffer(BufferDescriptor::new(64, BufferUsage::STATIC), None)?;
/// let mut locked = rhi.lock_vertex_buffer(&mut ctx, &vb, 0, 64, LockMode::WriteDiscard)?;
/// locked.write_pod(0, &vertices);
/// rhi.unlock_vertex_buffer(&mut ctx, &vb, locked)?;
/// rhi.flush(&mut ctx)?;
/// ```
pub struct Rhi {
    backend: Arc<dyn GpuBackend>,
    params: RhiParameters,
    capabilities: DeviceCapabilities,
    ids: IdAllocator,
    next_lock_id: AtomicU64,
    bound_shader_states: Mutex<BoundShaderStateCache>,
    static_states: StaticStates,
}

impl Rhi {
    /// Create a device on the backend selected by `params`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InitializationFailed`] when no backend can be created.
    pub fn new(params: RhiParameters) -> Result<Self, GraphicsError> {
        let backend = backend::create_backend(&params).map_err(|e| match e {
            GraphicsError::InitializationFailed(_) => e,
            other => GraphicsError::InitializationFailed(other.to_string()),
        })?;
        Self::with_backend(backend, params)
    }

    /// Create a device over an existing backend.
    pub fn with_backend(
        backend: Arc<dyn GpuBackend>,
        params: RhiParameters,
    ) -> Result<Self, GraphicsError> {
        let ids = IdAllocator::new();
        let static_states = StaticStates::create(backend.as_ref(), &ids)
            .map_err(|e| GraphicsError::InitializationFailed(e.to_string()))?;
        let capabilities = backend.capabilities();
        log::info!(
            "Rhi '{}' initialized on {} (editor: {})",
            params.label,
            backend.name(),
            params.editor
        );
        Ok(Self {
            backend,
            params,
            capabilities,
            ids,
            next_lock_id: AtomicU64::new(1),
            bound_shader_states: Mutex::new(BoundShaderStateCache::default()),
            static_states,
        })
    }

    /// Backend name.
    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    pub fn parameters(&self) -> &RhiParameters {
        &self.params
    }

    pub fn static_states(&self) -> &StaticStates {
        &self.static_states
    }

    pub(crate) fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Allocate an id for a frontend object (vertex factory, material, ...).
    pub fn allocate_id(&self) -> ResourceId {
        self.ids.next()
    }

    /// Create the immediate context used by the rendering thread.
    pub fn create_immediate_context(&self) -> DeviceContext {
        DeviceContext::new()
    }

    /// Create a UI overlay bound to this device's backend.
    pub fn create_ui_overlay(&self) -> UiOverlay {
        UiOverlay::new(self.backend.clone())
    }

    // ========================================================================
    // Resource creation
    // ========================================================================

    fn validate_buffer(&self, descriptor: &BufferDescriptor) -> Result<(), GraphicsError> {
        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size cannot be zero".to_string(),
            ));
        }
        if descriptor.size > self.capabilities.max_buffer_size {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer size {} exceeds maximum {}",
                descriptor.size, self.capabilities.max_buffer_size
            )));
        }
        Ok(())
    }

    /// Create a vertex buffer, optionally filled with `initial_data`.
    pub fn create_vertex_buffer(
        &self,
        mut descriptor: BufferDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<VertexBufferRef, GraphicsError> {
        descriptor.usage |= BufferUsage::VERTEX;
        self.validate_buffer(&descriptor)?;
        let gpu = self.backend.create_buffer(&descriptor, initial_data)?;
        log::trace!(
            "Rhi: created vertex buffer {:?}, size={}",
            descriptor.label,
            descriptor.size
        );
        Ok(Arc::new(VertexBuffer::new(self.ids.next(), descriptor, gpu)))
    }

    /// Create an index buffer with the given index stride.
    pub fn create_index_buffer(
        &self,
        mut descriptor: BufferDescriptor,
        format: IndexFormat,
        initial_data: Option<&[u8]>,
    ) -> Result<IndexBufferRef, GraphicsError> {
        descriptor.usage |= BufferUsage::INDEX;
        self.validate_buffer(&descriptor)?;
        if descriptor.size % format.stride() as u64 != 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "index buffer size {} is not a multiple of {}",
                descriptor.size,
                format.stride()
            )));
        }
        let gpu = self.backend.create_buffer(&descriptor, initial_data)?;
        log::trace!(
            "Rhi: created index buffer {:?}, size={}",
            descriptor.label,
            descriptor.size
        );
        Ok(Arc::new(IndexBuffer::new(
            self.ids.next(),
            descriptor,
            format,
            gpu,
        )))
    }

    /// Create a 2D texture. `initial_data` fills mip 0, tightly packed.
    pub fn create_texture_2d(
        &self,
        descriptor: TextureDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<Texture2DRef, GraphicsError> {
        let max_dim = self.capabilities.max_texture_dimension;
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(GraphicsError::InvalidParameter(
                "texture dimensions cannot be zero".to_string(),
            ));
        }
        if descriptor.width > max_dim || descriptor.height > max_dim {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture dimension exceeds maximum {max_dim}"
            )));
        }
        if !descriptor.format.info().supported {
            return Err(GraphicsError::FeatureNotSupported(format!(
                "pixel format {:?}",
                descriptor.format
            )));
        }
        let gpu = self.backend.create_texture(&descriptor, initial_data)?;
        log::trace!(
            "Rhi: created texture {:?}, size={}x{}",
            descriptor.label,
            descriptor.width,
            descriptor.height
        );
        Ok(Arc::new(Texture2D::new(self.ids.next(), descriptor, gpu)))
    }

    fn create_shader(
        &self,
        frequency: ShaderFrequency,
        code: &[u8],
        entry_point: &str,
    ) -> Result<Arc<Shader>, GraphicsError> {
        let gpu = self.backend.create_shader(frequency, code, entry_point)?;
        Ok(Arc::new(Shader::new(
            self.ids.next(),
            frequency,
            entry_point.to_string(),
            gpu,
        )))
    }

    pub fn create_vertex_shader(
        &self,
        code: &[u8],
        entry_point: &str,
    ) -> Result<VertexShaderRef, GraphicsError> {
        self.create_shader(ShaderFrequency::Vertex, code, entry_point)
    }

    pub fn create_pixel_shader(
        &self,
        code: &[u8],
        entry_point: &str,
    ) -> Result<PixelShaderRef, GraphicsError> {
        self.create_shader(ShaderFrequency::Pixel, code, entry_point)
    }

    pub fn create_hull_shader(
        &self,
        code: &[u8],
        entry_point: &str,
    ) -> Result<HullShaderRef, GraphicsError> {
        self.create_shader(ShaderFrequency::Hull, code, entry_point)
    }

    pub fn create_domain_shader(
        &self,
        code: &[u8],
        entry_point: &str,
    ) -> Result<DomainShaderRef, GraphicsError> {
        self.create_shader(ShaderFrequency::Domain, code, entry_point)
    }

    pub fn create_geometry_shader(
        &self,
        code: &[u8],
        entry_point: &str,
    ) -> Result<GeometryShaderRef, GraphicsError> {
        self.create_shader(ShaderFrequency::Geometry, code, entry_point)
    }

    pub fn create_vertex_declaration(&self, elements: &[VertexElement]) -> VertexDeclarationRef {
        Arc::new(VertexDeclaration::new(self.ids.next(), elements.to_vec()))
    }

    pub fn create_sampler_state(
        &self,
        descriptor: SamplerStateDescriptor,
    ) -> Result<SamplerStateRef, GraphicsError> {
        let gpu = self.backend.create_sampler(&descriptor)?;
        Ok(Arc::new(SamplerState::new(self.ids.next(), descriptor, gpu)))
    }

    pub fn create_rasterizer_state(
        &self,
        descriptor: RasterizerStateDescriptor,
    ) -> RasterizerStateRef {
        Arc::new(RasterizerState::new(self.ids.next(), descriptor))
    }

    pub fn create_blend_state(&self, descriptor: BlendStateDescriptor) -> BlendStateRef {
        Arc::new(BlendState::new(self.ids.next(), descriptor))
    }

    pub fn create_depth_state(&self, descriptor: DepthStateDescriptor) -> DepthStateRef {
        Arc::new(DepthState::new(self.ids.next(), descriptor))
    }

    /// Look up or create the bound shader state for a declaration and shader set.
    ///
    /// Identical tuples return the same handle for as long as any handle is alive.
    pub fn create_bound_shader_state(
        &self,
        declaration: &VertexDeclarationRef,
        vertex_shader: &VertexShaderRef,
        pixel_shader: &PixelShaderRef,
        hull_shader: Option<&HullShaderRef>,
        domain_shader: Option<&DomainShaderRef>,
        geometry_shader: Option<&GeometryShaderRef>,
    ) -> Result<BoundShaderStateRef, GraphicsError> {
        let stages = [
            (Some(vertex_shader), ShaderFrequency::Vertex),
            (Some(pixel_shader), ShaderFrequency::Pixel),
            (hull_shader, ShaderFrequency::Hull),
            (domain_shader, ShaderFrequency::Domain),
            (geometry_shader, ShaderFrequency::Geometry),
        ];
        for (shader, expected) in stages {
            if let Some(shader) = shader
                && shader.frequency() != expected
            {
                return Err(contract_violation!(
                    "{} shader {} bound to the {} slot",
                    shader.frequency(),
                    shader.id(),
                    expected
                ));
            }
        }

        let key = BoundShaderStateKey {
            declaration: declaration.id(),
            vertex_shader: vertex_shader.id(),
            pixel_shader: pixel_shader.id(),
            hull_shader: hull_shader.map(|s| s.id()),
            domain_shader: domain_shader.map(|s| s.id()),
            geometry_shader: geometry_shader.map(|s| s.id()),
        };

        let mut cache = self.bound_shader_states.lock();
        if let Some(existing) = cache.get(&key) {
            return Ok(existing);
        }

        log::debug!("Rhi: bound shader state cache miss for {key:?}");
        let gpu = self.backend.create_bound_shader_state(&ProgramDescriptor {
            elements: declaration.elements(),
            vertex: vertex_shader,
            pixel: pixel_shader,
            hull: hull_shader.map(Arc::as_ref),
            domain: domain_shader.map(Arc::as_ref),
            geometry: geometry_shader.map(Arc::as_ref),
        })?;
        let state = Arc::new(BoundShaderState::new(
            self.ids.next(),
            declaration.clone(),
            vertex_shader.clone(),
            pixel_shader.clone(),
            hull_shader.cloned(),
            domain_shader.cloned(),
            geometry_shader.cloned(),
            gpu,
        ));
        cache.insert(&state);
        Ok(state)
    }

    /// Number of live cached bound shader states.
    pub fn bound_shader_state_count(&self) -> usize {
        self.bound_shader_states.lock().live_count()
    }

    /// Drop cache entries whose handles are all gone.
    pub fn prune_bound_shader_states(&self) -> usize {
        self.bound_shader_states.lock().prune()
    }

    // ========================================================================
    // Locking
    // ========================================================================

    fn next_lock_id(&self) -> u64 {
        self.next_lock_id.fetch_add(1, Ordering::Relaxed)
    }

    fn lock_buffer(
        &self,
        ctx: &mut DeviceContext,
        core: &BufferCore,
        offset: u64,
        size: u64,
        mode: LockMode,
    ) -> Result<LockedData, GraphicsError> {
        let lock_id = self.next_lock_id();
        core.begin_lock(lock_id, offset, size, mode)?;
        let data = if mode.reads() {
            let read = self
                .flush(ctx)
                .and_then(|()| self.backend.read_buffer(core.gpu(), offset, size));
            match read {
                Ok(data) => data,
                Err(e) => {
                    let placeholder =
                        LockedData::new(core.id(), lock_id, offset, 0, mode, Vec::new());
                    core.end_lock(&placeholder)?;
                    return Err(e);
                }
            }
        } else {
            vec![0; size as usize]
        };
        Ok(LockedData::new(
            core.id(),
            lock_id,
            offset,
            size as u32,
            mode,
            data,
        ))
    }

    fn unlock_buffer(
        &self,
        ctx: &mut DeviceContext,
        core: &BufferCore,
        data: LockedData,
    ) -> Result<(), GraphicsError> {
        let active = core.end_lock(&data)?;
        if active.mode.writes() {
            ctx.push(DeviceCommand::UpdateBuffer {
                buffer: core.gpu().clone(),
                offset: active.offset,
                data: data.into_data(),
            });
        }
        Ok(())
    }

    /// Lock `size` bytes of a vertex buffer at `offset`.
    ///
    /// Read modes flush `ctx` and wait for the GPU.
    pub fn lock_vertex_buffer(
        &self,
        ctx: &mut DeviceContext,
        buffer: &VertexBufferRef,
        offset: u64,
        size: u64,
        mode: LockMode,
    ) -> Result<LockedData, GraphicsError> {
        self.lock_buffer(ctx, buffer.core(), offset, size, mode)
    }

    /// Release a vertex buffer lock, publishing written bytes.
    pub fn unlock_vertex_buffer(
        &self,
        ctx: &mut DeviceContext,
        buffer: &VertexBufferRef,
        data: LockedData,
    ) -> Result<(), GraphicsError> {
        self.unlock_buffer(ctx, buffer.core(), data)
    }

    pub fn lock_index_buffer(
        &self,
        ctx: &mut DeviceContext,
        buffer: &IndexBufferRef,
        offset: u64,
        size: u64,
        mode: LockMode,
    ) -> Result<LockedData, GraphicsError> {
        self.lock_buffer(ctx, buffer.core(), offset, size, mode)
    }

    pub fn unlock_index_buffer(
        &self,
        ctx: &mut DeviceContext,
        buffer: &IndexBufferRef,
        data: LockedData,
    ) -> Result<(), GraphicsError> {
        self.unlock_buffer(ctx, buffer.core(), data)
    }

    /// Lock one mip of a texture.
    ///
    /// Read modes flush `ctx` and perform a synchronous readback.
    pub fn lock_texture_2d(
        &self,
        ctx: &mut DeviceContext,
        texture: &Texture2DRef,
        mip: u32,
        mode: LockMode,
    ) -> Result<LockedData, GraphicsError> {
        let lock_id = self.next_lock_id();
        texture.begin_lock(lock_id, mip, mode)?;
        let (data, row_pitch) = if mode.reads() {
            let read = self
                .flush(ctx)
                .and_then(|()| self.backend.read_texture(texture, mip));
            match read {
                Ok(readback) => (readback.data, readback.row_pitch),
                Err(e) => {
                    let placeholder =
                        LockedData::new(texture.id(), lock_id, 0, 0, mode, Vec::new());
                    texture.end_lock(&placeholder)?;
                    return Err(e);
                }
            }
        } else {
            let size = texture.descriptor().mip_byte_size(mip) as usize;
            (vec![0; size], texture.row_pitch(mip))
        };
        Ok(LockedData::new(
            texture.id(),
            lock_id,
            0,
            row_pitch,
            mode,
            data,
        ))
    }

    pub fn unlock_texture_2d(
        &self,
        ctx: &mut DeviceContext,
        texture: &Texture2DRef,
        data: LockedData,
    ) -> Result<(), GraphicsError> {
        let active = texture.end_lock(&data)?;
        if active.mode.writes() {
            let row_pitch = data.row_pitch();
            ctx.push(DeviceCommand::UpdateTexture {
                texture: texture.clone(),
                mip: active.mip,
                row_pitch,
                data: data.into_data(),
            });
        }
        Ok(())
    }

    // ========================================================================
    // Draws
    // ========================================================================

    /// Record a non-indexed draw of `primitive_count` primitives.
    pub fn draw_primitive(
        &self,
        ctx: &mut DeviceContext,
        primitive_type: PrimitiveType,
        base_vertex: u32,
        primitive_count: u32,
        num_instances: u32,
    ) -> Result<(), GraphicsError> {
        let vertex_count = vertex_count_for_primitive_count(primitive_count, primitive_type)?;
        ctx.validate_draw(None)?;
        if primitive_count == 0 || num_instances == 0 {
            log::trace!("Rhi: skipping empty draw");
            return Ok(());
        }
        ctx.record_draw(DeviceCommand::Draw {
            primitive_type,
            base_vertex,
            vertex_count,
            num_instances,
        });
        Ok(())
    }

    /// Record an indexed draw of `primitive_count` primitives.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_indexed_primitive(
        &self,
        ctx: &mut DeviceContext,
        index_buffer: &IndexBufferRef,
        primitive_type: PrimitiveType,
        base_vertex_index: i32,
        start_index: u32,
        primitive_count: u32,
        num_instances: u32,
    ) -> Result<(), GraphicsError> {
        let index_count = vertex_count_for_primitive_count(primitive_count, primitive_type)?;
        ctx.validate_draw(Some(index_buffer))?;
        if start_index as u64 + index_count as u64 > index_buffer.num_indices() as u64 {
            return Err(contract_violation!(
                "indices {start_index}+{index_count} outside index buffer {} of {}",
                index_buffer.id(),
                index_buffer.num_indices()
            ));
        }
        if primitive_count == 0 || num_instances == 0 {
            log::trace!("Rhi: skipping empty indexed draw");
            return Ok(());
        }
        ctx.record_draw(DeviceCommand::DrawIndexed {
            index_buffer: index_buffer.clone(),
            primitive_type,
            base_vertex_index,
            start_index,
            index_count,
            num_instances,
        });
        Ok(())
    }

    /// Hand every command recorded on `ctx` to the backend.
    pub fn flush(&self, ctx: &mut DeviceContext) -> Result<(), GraphicsError> {
        profile_function!();
        let commands = ctx.take_commands();
        if commands.is_empty() {
            return Ok(());
        }
        self.backend.submit(&commands)
    }

    // ========================================================================
    // Viewports
    // ========================================================================

    /// Create a viewport presenting to `window`.
    pub fn create_viewport(
        &self,
        window: Arc<dyn ViewportWindow>,
        width: u32,
        height: u32,
    ) -> Result<Viewport, GraphicsError> {
        let swap_chain =
            self.backend
                .create_swap_chain(window, width, height, self.params.vsync)?;
        Viewport::new(self, Some(swap_chain), width, height)
    }

    /// Create a viewport without a window.
    pub fn create_offscreen_viewport(
        &self,
        width: u32,
        height: u32,
    ) -> Result<Viewport, GraphicsError> {
        Viewport::new(self, None, width, height)
    }

    /// Bind a viewport's surfaces and set the full viewport rectangle.
    pub fn begin_drawing_viewport(
        &self,
        ctx: &mut DeviceContext,
        viewport: &Viewport,
    ) -> Result<(), GraphicsError> {
        ctx.set_render_target(Some(viewport.surface()), Some(viewport.depth_surface()))?;
        ctx.set_viewport(ViewportRect::from_dimensions(
            viewport.width(),
            viewport.height(),
        ));
        Ok(())
    }

    /// Flush `ctx` and present the viewport if `present` is set.
    pub fn end_drawing_viewport(
        &self,
        ctx: &mut DeviceContext,
        viewport: &mut Viewport,
        present: bool,
        lock_to_vsync: bool,
    ) -> Result<(), GraphicsError> {
        self.flush(ctx)?;
        if present {
            self.backend
                .present(viewport.swap_chain(), viewport.surface(), lock_to_vsync)?;
            viewport.record_present();
            frame_mark!();
        }
        Ok(())
    }
}

impl std::fmt::Debug for Rhi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rhi")
            .field("backend", &self.backend.name())
            .field("label", &self.params.label)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

// Ensure Rhi is Send + Sync
static_assertions::assert_impl_all!(Rhi: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::config::BackendType;
    use crate::types::{PixelFormat, TextureCreateFlags, VertexElementType};

    fn create_test_rhi() -> (Arc<DummyBackend>, Rhi) {
        let backend = Arc::new(DummyBackend::new());
        let rhi = Rhi::with_backend(backend.clone(), RhiParameters::default()).unwrap();
        (backend, rhi)
    }

    fn test_shaders(rhi: &Rhi) -> (VertexDeclarationRef, VertexShaderRef, PixelShaderRef) {
        let decl = rhi.create_vertex_declaration(&[VertexElement::new(
            0,
            0,
            VertexElementType::Float3,
            0,
            12,
        )]);
        let vs = rhi.create_vertex_shader(b"vs", "vs_main").unwrap();
        let ps = rhi.create_pixel_shader(b"ps", "fs_main").unwrap();
        (decl, vs, ps)
    }

    #[test]
    fn test_device_name() {
        let rhi = Rhi::new(RhiParameters::new().with_backend(BackendType::Dummy)).unwrap();
        assert_eq!(rhi.name(), "Dummy Backend");
    }

    #[test]
    fn test_create_buffer_zero_size() {
        let (_, rhi) = create_test_rhi();
        let result = rhi.create_vertex_buffer(BufferDescriptor::new(0, BufferUsage::STATIC), None);
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_index_buffer_size_must_match_stride() {
        let (_, rhi) = create_test_rhi();
        let result = rhi.create_index_buffer(
            BufferDescriptor::new(7, BufferUsage::STATIC),
            IndexFormat::Uint32,
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_create_texture_zero_size() {
        let (_, rhi) = create_test_rhi();
        let result = rhi.create_texture_2d(
            TextureDescriptor::new_2d(
                0,
                512,
                PixelFormat::A8R8G8B8,
                TextureCreateFlags::SHADER_RESOURCE,
            ),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_format_is_unsupported() {
        let (_, rhi) = create_test_rhi();
        let result = rhi.create_texture_2d(
            TextureDescriptor::new_2d(4, 4, PixelFormat::Unknown, TextureCreateFlags::empty()),
            None,
        );
        assert!(matches!(result, Err(GraphicsError::FeatureNotSupported(_))));
    }

    #[test]
    fn test_bound_shader_state_cache_hit() {
        let (_, rhi) = create_test_rhi();
        let (decl, vs, ps) = test_shaders(&rhi);
        let a = rhi
            .create_bound_shader_state(&decl, &vs, &ps, None, None, None)
            .unwrap();
        let b = rhi
            .create_bound_shader_state(&decl, &vs, &ps, None, None, None)
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(rhi.bound_shader_state_count(), 1);

        let other_ps = rhi.create_pixel_shader(b"ps2", "fs_main").unwrap();
        let c = rhi
            .create_bound_shader_state(&decl, &vs, &other_ps, None, None, None)
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(rhi.bound_shader_state_count(), 2);
    }

    #[test]
    fn test_bound_shader_state_prunes_dead_entries() {
        let (_, rhi) = create_test_rhi();
        let (decl, vs, ps) = test_shaders(&rhi);
        let first_id = rhi
            .create_bound_shader_state(&decl, &vs, &ps, None, None, None)
            .unwrap()
            .id();
        assert_eq!(rhi.bound_shader_state_count(), 0);
        assert_eq!(rhi.prune_bound_shader_states(), 1);

        let recreated = rhi
            .create_bound_shader_state(&decl, &vs, &ps, None, None, None)
            .unwrap();
        assert_ne!(recreated.id(), first_id);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "bound to the"))]
    fn test_bound_shader_state_checks_frequencies() {
        let (_, rhi) = create_test_rhi();
        let (decl, vs, _) = test_shaders(&rhi);
        let result = rhi.create_bound_shader_state(&decl, &vs, &vs, None, None, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_lock_unlock_round_trip() {
        let (backend, rhi) = create_test_rhi();
        let mut ctx = rhi.create_immediate_context();
        let vb = rhi
            .create_vertex_buffer(BufferDescriptor::new(16, BufferUsage::DYNAMIC), None)
            .unwrap();

        let mut locked = rhi
            .lock_vertex_buffer(&mut ctx, &vb, 4, 8, LockMode::WriteDiscard)
            .unwrap();
        locked.as_mut_slice().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        rhi.unlock_vertex_buffer(&mut ctx, &vb, locked).unwrap();

        let read = rhi
            .lock_vertex_buffer(&mut ctx, &vb, 0, 16, LockMode::ReadOnly)
            .unwrap();
        assert_eq!(&read.as_slice()[4..12], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&read.as_slice()[..4], &[0, 0, 0, 0]);
        rhi.unlock_vertex_buffer(&mut ctx, &vb, read).unwrap();
        assert_eq!(backend.stats().buffer_updates, 1);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "locked vertex buffer"))]
    fn test_draw_from_locked_buffer_is_violation() {
        let (_, rhi) = create_test_rhi();
        let mut ctx = rhi.create_immediate_context();
        let (decl, vs, ps) = test_shaders(&rhi);
        let bss = rhi
            .create_bound_shader_state(&decl, &vs, &ps, None, None, None)
            .unwrap();
        let vb = rhi
            .create_vertex_buffer(BufferDescriptor::new(36, BufferUsage::STATIC), None)
            .unwrap();
        let _locked = rhi
            .lock_vertex_buffer(&mut ctx, &vb, 0, 36, LockMode::WriteDiscard)
            .unwrap();
        ctx.set_bound_shader_state(&bss);
        ctx.set_stream_source(0, Some(&vb), 0, 12).unwrap();
        let result = rhi.draw_primitive(&mut ctx, PrimitiveType::TriangleList, 0, 1, 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_draw_records_vertex_count() {
        let (backend, rhi) = create_test_rhi();
        let mut ctx = rhi.create_immediate_context();
        let (decl, vs, ps) = test_shaders(&rhi);
        let bss = rhi
            .create_bound_shader_state(&decl, &vs, &ps, None, None, None)
            .unwrap();
        ctx.set_bound_shader_state(&bss);
        rhi.draw_primitive(&mut ctx, PrimitiveType::TriangleStrip, 0, 4, 2)
            .unwrap();
        rhi.flush(&mut ctx).unwrap();

        let draws = backend.take_draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].vertex_count, 6);
        assert_eq!(draws[0].num_instances, 2);
        assert_eq!(draws[0].bound_shader_state, Some(bss.id()));
    }

    #[test]
    fn test_quad_list_draw_is_error() {
        let (_, rhi) = create_test_rhi();
        let mut ctx = rhi.create_immediate_context();
        let result = rhi.draw_primitive(&mut ctx, PrimitiveType::QuadList, 0, 1, 1);
        assert!(matches!(
            result,
            Err(GraphicsError::UnsupportedPrimitiveType(_))
        ));
        assert!(ctx.is_empty());
    }
}
