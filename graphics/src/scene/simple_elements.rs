//! Batched editor lines and triangles.

use lumen_core::Color;
use lumen_core::math::Vec3;

use crate::context::DeviceContext;
use crate::device::Rhi;
use crate::error::GraphicsError;
use crate::shaders::BuiltinShaders;
use crate::types::{BufferDescriptor, BufferUsage, PrimitiveType};

use super::hit_proxy::HitProxyId;
use super::vertex_factory::{SimpleElementVertex, VERTEX_STREAM, simple_element_stride};

#[derive(Debug, Clone, Copy)]
struct ElementVertex {
    position: Vec3,
    color: Color,
    hit_proxy_id: HitProxyId,
}

impl ElementVertex {
    fn to_gpu(self, hit_proxy: bool) -> SimpleElementVertex {
        let color = if hit_proxy {
            self.hit_proxy_id.to_color()
        } else {
            self.color
        };
        SimpleElementVertex {
            position: [self.position.x, self.position.y, self.position.z, 1.0],
            tex_coord: [0.0, 0.0],
            color: color.to_bytes(),
        }
    }
}

/// World-space lines and triangles rebuilt every frame.
///
/// The same elements feed the color pass and the hit-proxy pass; in the
/// hit-proxy pass each vertex is colored with its hit-proxy id.
#[derive(Debug, Default)]
pub struct SimpleElements {
    lines: Vec<ElementVertex>,
    triangles: Vec<ElementVertex>,
}

impl SimpleElements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_line(&mut self, start: Vec3, end: Vec3, color: Color, hit_proxy_id: HitProxyId) {
        for position in [start, end] {
            self.lines.push(ElementVertex {
                position,
                color,
                hit_proxy_id,
            });
        }
    }

    pub fn add_triangle(&mut self, corners: [Vec3; 3], color: Color, hit_proxy_id: HitProxyId) {
        for position in corners {
            self.triangles.push(ElementVertex {
                position,
                color,
                hit_proxy_id,
            });
        }
    }

    /// Twelve edges of an axis-aligned box.
    pub fn add_wire_box(&mut self, min: Vec3, max: Vec3, color: Color, hit_proxy_id: HitProxyId) {
        let corner = |i: u32| {
            Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            )
        };
        for a in 0..8u32 {
            for bit in [1, 2, 4] {
                if a & bit == 0 {
                    self.add_line(corner(a), corner(a | bit), color, hit_proxy_id);
                }
            }
        }
    }

    pub fn num_lines(&self) -> usize {
        self.lines.len() / 2
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.triangles.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.triangles.clear();
    }

    /// Draw all elements; returns the number of draw calls.
    pub fn draw(
        &self,
        rhi: &Rhi,
        ctx: &mut DeviceContext,
        shaders: &BuiltinShaders,
        hit_proxy: bool,
    ) -> Result<u32, GraphicsError> {
        if self.is_empty() {
            return Ok(0);
        }
        let state = rhi.create_bound_shader_state(
            &shaders.simple_declaration,
            &shaders.simple_vs,
            &shaders.simple_ps,
            None,
            None,
            None,
        )?;
        ctx.set_bound_shader_state(&state);
        ctx.set_rasterizer_state(&rhi.static_states().rasterizer_default);

        let mut draws = 0;
        for (vertices, primitive_type) in [
            (&self.lines, PrimitiveType::LineList),
            (&self.triangles, PrimitiveType::TriangleList),
        ] {
            if vertices.is_empty() {
                continue;
            }
            let data: Vec<SimpleElementVertex> =
                vertices.iter().map(|v| v.to_gpu(hit_proxy)).collect();
            let buffer = rhi.create_vertex_buffer(
                BufferDescriptor::new(
                    (data.len() * std::mem::size_of::<SimpleElementVertex>()) as u64,
                    BufferUsage::DYNAMIC,
                )
                .with_label("SimpleElements"),
                Some(bytemuck::cast_slice(&data)),
            )?;
            ctx.set_stream_source(VERTEX_STREAM, Some(&buffer), 0, simple_element_stride())?;
            let per_primitive = if primitive_type == PrimitiveType::LineList { 2 } else { 3 };
            rhi.draw_primitive(
                ctx,
                primitive_type,
                0,
                (data.len() / per_primitive) as u32,
                1,
            )?;
            draws += 1;
        }
        Ok(draws)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::DummyBackend;
    use crate::config::RhiParameters;

    #[test]
    fn test_wire_box_has_twelve_edges() {
        let mut elements = SimpleElements::new();
        elements.add_wire_box(
            Vec3::zeros(),
            Vec3::new(1.0, 1.0, 1.0),
            Color::WHITE,
            HitProxyId::NONE,
        );
        assert_eq!(elements.num_lines(), 12);
    }

    #[test]
    fn test_hit_proxy_draw_uses_id_colors() {
        let backend = Arc::new(DummyBackend::new());
        backend.set_capture_streams(true);
        let rhi = Rhi::with_backend(backend.clone(), RhiParameters::default()).unwrap();
        let shaders = BuiltinShaders::new(&rhi).unwrap();
        let id = HitProxyId::new(7).unwrap();

        let mut elements = SimpleElements::new();
        elements.add_line(Vec3::zeros(), Vec3::x(), Color::WHITE, id);

        let mut ctx = rhi.create_immediate_context();
        assert_eq!(elements.draw(&rhi, &mut ctx, &shaders, true).unwrap(), 1);
        rhi.flush(&mut ctx).unwrap();

        let draws = backend.take_draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].primitive_type, PrimitiveType::LineList);
        assert_eq!(draws[0].vertex_count, 2);
        let stream = draws[0].stream0.as_ref().unwrap();
        let first: SimpleElementVertex =
            bytemuck::pod_read_unaligned(&stream[..std::mem::size_of::<SimpleElementVertex>()]);
        assert_eq!(first.color, id.to_color().to_bytes());
    }
}
