//! Screen-space quads for full-screen passes.

use crate::context::DeviceContext;
use crate::device::Rhi;
use crate::error::GraphicsError;
use crate::scene::{SimpleElementVertex, VERTEX_STREAM, simple_element_stride};
use crate::types::{BufferDescriptor, BufferUsage, PrimitiveType};

/// Rectangle in pixels (destination) or texels (source).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl QuadRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }
}

/// Build the four strip vertices mapping `source` texels onto `dest` pixels.
pub(crate) fn quad_vertices(
    dest: QuadRect,
    source: QuadRect,
    target_size: (u32, u32),
    texture_size: (u32, u32),
) -> [SimpleElementVertex; 4] {
    let (tw, th) = (target_size.0.max(1) as f32, target_size.1.max(1) as f32);
    let (sw, sh) = (texture_size.0.max(1) as f32, texture_size.1.max(1) as f32);
    let corner = |px: f32, py: f32, u: f32, v: f32| SimpleElementVertex {
        position: [px / tw * 2.0 - 1.0, 1.0 - py / th * 2.0, 0.0, 1.0],
        tex_coord: [u / sw, v / sh],
        color: [255; 4],
    };
    let (x0, y0) = (dest.x, dest.y);
    let (x1, y1) = (dest.x + dest.width, dest.y + dest.height);
    let (u0, v0) = (source.x, source.y);
    let (u1, v1) = (source.x + source.width, source.y + source.height);
    [
        corner(x0, y0, u0, v0),
        corner(x1, y0, u1, v0),
        corner(x0, y1, u0, v1),
        corner(x1, y1, u1, v1),
    ]
}

/// Draw a quad covering `dest` (pixels of a `target_size` target) that
/// samples `source` (texels of a `texture_size` texture).
///
/// The caller binds the screen shaders, texture and sampler.
pub fn draw_denormalized_quad(
    rhi: &Rhi,
    ctx: &mut DeviceContext,
    dest: QuadRect,
    source: QuadRect,
    target_size: (u32, u32),
    texture_size: (u32, u32),
) -> Result<(), GraphicsError> {
    let vertices = quad_vertices(dest, source, target_size, texture_size);
    let buffer = rhi.create_vertex_buffer(
        BufferDescriptor::new(
            std::mem::size_of_val(&vertices) as u64,
            BufferUsage::DYNAMIC,
        )
        .with_label("ScreenQuad"),
        Some(bytemuck::cast_slice(&vertices)),
    )?;
    ctx.set_stream_source(VERTEX_STREAM, Some(&buffer), 0, simple_element_stride())?;
    rhi.draw_primitive(ctx, PrimitiveType::TriangleStrip, 0, 2, 1)
}
