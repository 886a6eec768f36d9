//! Built-in shaders used by the scene renderer and the default materials.

use std::sync::Arc;

use crate::device::Rhi;
use crate::error::GraphicsError;
use crate::resources::{PixelShaderRef, VertexDeclarationRef, VertexShaderRef};
use crate::scene::{local_vertex_elements, simple_element_vertex_elements};

macro_rules! builtin_source {
    ($file:literal) => {
        concat!(
            include_str!("../shaders/common.wgsl"),
            include_str!(concat!("../shaders/", $file))
        )
    };
}

const MESH_SOURCE: &str = builtin_source!("mesh.wgsl");
const SIMPLE_SOURCE: &str = builtin_source!("simple.wgsl");
const SCREEN_SOURCE: &str = builtin_source!("screen.wgsl");

/// Vertex declarations and shaders shared by all views of a device.
#[derive(Debug, Clone)]
pub struct BuiltinShaders {
    pub local_declaration: VertexDeclarationRef,
    pub simple_declaration: VertexDeclarationRef,
    pub mesh_vs: VertexShaderRef,
    pub sprite_vs: VertexShaderRef,
    pub mesh_ps: PixelShaderRef,
    pub hit_proxy_ps: PixelShaderRef,
    pub simple_vs: VertexShaderRef,
    pub simple_ps: PixelShaderRef,
    pub screen_vs: VertexShaderRef,
    pub screen_ps: PixelShaderRef,
    pub light_ps: PixelShaderRef,
}

impl BuiltinShaders {
    pub fn new(rhi: &Rhi) -> Result<Arc<Self>, GraphicsError> {
        let shaders = Self {
            local_declaration: rhi.create_vertex_declaration(&local_vertex_elements()),
            simple_declaration: rhi.create_vertex_declaration(&simple_element_vertex_elements()),
            mesh_vs: rhi.create_vertex_shader(MESH_SOURCE.as_bytes(), "vs_main")?,
            sprite_vs: rhi.create_vertex_shader(MESH_SOURCE.as_bytes(), "vs_sprite")?,
            mesh_ps: rhi.create_pixel_shader(MESH_SOURCE.as_bytes(), "fs_main")?,
            hit_proxy_ps: rhi.create_pixel_shader(MESH_SOURCE.as_bytes(), "fs_hit_proxy")?,
            simple_vs: rhi.create_vertex_shader(SIMPLE_SOURCE.as_bytes(), "vs_main")?,
            simple_ps: rhi.create_pixel_shader(SIMPLE_SOURCE.as_bytes(), "fs_main")?,
            screen_vs: rhi.create_vertex_shader(SCREEN_SOURCE.as_bytes(), "vs_main")?,
            screen_ps: rhi.create_pixel_shader(SCREEN_SOURCE.as_bytes(), "fs_main")?,
            light_ps: rhi.create_pixel_shader(SCREEN_SOURCE.as_bytes(), "fs_light")?,
        };
        log::debug!("Built-in shaders created on {}", rhi.name());
        Ok(Arc::new(shaders))
    }
}

#[cfg(all(test, feature = "editor"))]
mod tests {
    use super::*;
    use crate::shader_compiler::{ShaderCompilerEnvironment, compile_shader_source};
    use crate::types::ShaderFrequency;

    #[test]
    fn test_builtin_sources_validate() {
        let env = ShaderCompilerEnvironment::new();
        let entries = [
            (MESH_SOURCE, "vs_main", ShaderFrequency::Vertex),
            (MESH_SOURCE, "vs_sprite", ShaderFrequency::Vertex),
            (MESH_SOURCE, "fs_main", ShaderFrequency::Pixel),
            (MESH_SOURCE, "fs_hit_proxy", ShaderFrequency::Pixel),
            (SIMPLE_SOURCE, "vs_main", ShaderFrequency::Vertex),
            (SIMPLE_SOURCE, "fs_main", ShaderFrequency::Pixel),
            (SCREEN_SOURCE, "vs_main", ShaderFrequency::Vertex),
            (SCREEN_SOURCE, "fs_main", ShaderFrequency::Pixel),
            (SCREEN_SOURCE, "fs_light", ShaderFrequency::Pixel),
        ];
        for (source, entry, frequency) in entries {
            let result = compile_shader_source(source, entry, frequency, &env);
            assert!(result.is_ok(), "{entry}: {result:?}");
        }
    }
}
