//! Materials: the shader and state provider of a drawing policy.

use std::sync::Arc;

use lumen_core::LinearColor;

use crate::context::{DeviceContext, MAX_TEXTURE_SLOTS};
use crate::device::Rhi;
use crate::error::GraphicsError;
use crate::resources::{
    PixelShaderRef, RasterizerStateRef, ResourceId, StaticStates, Texture2DRef, VertexShaderRef,
};
use crate::shaders::BuiltinShaders;
use crate::types::ShaderFrequency;

pub type MaterialRef = Arc<Material>;

/// Shaders, raster selection, tint and textures used to draw a mesh.
#[derive(Debug, Clone)]
pub struct Material {
    id: ResourceId,
    name: String,
    vertex_shader: VertexShaderRef,
    pixel_shader: PixelShaderRef,
    hit_proxy_vertex_shader: VertexShaderRef,
    hit_proxy_pixel_shader: PixelShaderRef,
    two_sided: bool,
    wireframe: bool,
    tint: LinearColor,
    textures: [Option<Texture2DRef>; MAX_TEXTURE_SLOTS],
}

impl Material {
    /// A material over explicit color-pass shaders.
    ///
    /// The hit-proxy pass reuses the vertex shader with the built-in hit-proxy
    /// pixel shader until [`with_hit_proxy_shaders`](Self::with_hit_proxy_shaders) overrides it.
    pub fn new(
        rhi: &Rhi,
        shaders: &BuiltinShaders,
        name: impl Into<String>,
        vertex_shader: VertexShaderRef,
        pixel_shader: PixelShaderRef,
    ) -> Self {
        Self {
            id: rhi.allocate_id(),
            name: name.into(),
            hit_proxy_vertex_shader: vertex_shader.clone(),
            hit_proxy_pixel_shader: shaders.hit_proxy_ps.clone(),
            vertex_shader,
            pixel_shader,
            two_sided: false,
            wireframe: false,
            tint: LinearColor::WHITE,
            textures: Default::default(),
        }
    }

    /// Lit mesh material using the built-in shaders.
    pub fn default_mesh(rhi: &Rhi, shaders: &BuiltinShaders) -> Self {
        Self::new(
            rhi,
            shaders,
            "DefaultMesh",
            shaders.mesh_vs.clone(),
            shaders.mesh_ps.clone(),
        )
    }

    /// Camera-facing sprite material.
    pub fn sprite(rhi: &Rhi, shaders: &BuiltinShaders, texture: Option<Texture2DRef>) -> Self {
        let mut material = Self::new(
            rhi,
            shaders,
            "Sprite",
            shaders.sprite_vs.clone(),
            shaders.mesh_ps.clone(),
        )
        .with_two_sided(true);
        material.textures[0] = texture;
        material
    }

    pub fn with_hit_proxy_shaders(
        mut self,
        vertex_shader: VertexShaderRef,
        pixel_shader: PixelShaderRef,
    ) -> Self {
        self.hit_proxy_vertex_shader = vertex_shader;
        self.hit_proxy_pixel_shader = pixel_shader;
        self
    }

    pub fn with_two_sided(mut self, two_sided: bool) -> Self {
        self.two_sided = two_sided;
        self
    }

    pub fn with_wireframe(mut self, wireframe: bool) -> Self {
        self.wireframe = wireframe;
        self
    }

    pub fn with_tint(mut self, tint: LinearColor) -> Self {
        self.tint = tint;
        self
    }

    /// Bind a texture to a slot. Out-of-range slots are ignored with a warning.
    pub fn with_texture(mut self, slot: usize, texture: Texture2DRef) -> Self {
        match self.textures.get_mut(slot) {
            Some(entry) => *entry = Some(texture),
            None => log::warn!("Material '{}': texture slot {slot} out of range", self.name),
        }
        self
    }

    pub fn into_ref(self) -> MaterialRef {
        Arc::new(self)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_shader(&self) -> &VertexShaderRef {
        &self.vertex_shader
    }

    pub fn pixel_shader(&self) -> &PixelShaderRef {
        &self.pixel_shader
    }

    pub fn hit_proxy_vertex_shader(&self) -> &VertexShaderRef {
        &self.hit_proxy_vertex_shader
    }

    pub fn hit_proxy_pixel_shader(&self) -> &PixelShaderRef {
        &self.hit_proxy_pixel_shader
    }

    pub fn is_two_sided(&self) -> bool {
        self.two_sided
    }

    pub fn is_wireframe(&self) -> bool {
        self.wireframe
    }

    pub fn tint(&self) -> LinearColor {
        self.tint
    }

    /// Rasterizer state for this material, forcing wireframe when the view asks for it.
    pub fn rasterizer_state<'a>(
        &self,
        states: &'a StaticStates,
        view_wireframe: bool,
    ) -> &'a RasterizerStateRef {
        states.rasterizer_for(self.wireframe || view_wireframe, self.two_sided)
    }

    /// Bind textures, samplers and the tint parameter.
    pub(crate) fn set_parameters(
        &self,
        rhi: &Rhi,
        ctx: &mut DeviceContext,
    ) -> Result<(), GraphicsError> {
        let sampler = &rhi.static_states().sampler_bilinear;
        for (slot, texture) in self.textures.iter().enumerate() {
            let slot = slot as u32;
            ctx.set_texture_parameter(slot, texture.as_ref())?;
            if texture.is_some() {
                ctx.set_sampler_state(slot, sampler)?;
            }
        }
        ctx.set_shader_parameter_pod(ShaderFrequency::Pixel, 0, &self.tint)
    }
}
