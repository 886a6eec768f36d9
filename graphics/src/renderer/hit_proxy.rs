//! Hit-proxy passes and picking.
//!
//! Pickable primitives are drawn a second time into the hit-proxy target with
//! their [`HitProxyId`] encoded as a color. Picking reads one pixel back.

use lumen_core::{Color, LinearColor, profile_scope};

use crate::context::DeviceContext;
use crate::error::{GraphicsError, contract_violation};
#[cfg(feature = "editor")]
use crate::scene::HitProxyDrawingPolicy;
use crate::scene::{DepthGroup, HitProxyId, HitProxyLayer, SceneView, ShowFlags};
use crate::types::{LockMode, ViewportRect};
use crate::viewport::Viewport;

use super::scene_renderer::{FramePass, FrameState, SceneRenderer};

impl SceneRenderer {
    /// Bind and clear the hit-proxy target, then build the view.
    pub fn begin_render_hit_proxies_view_target(
        &mut self,
        ctx: &mut DeviceContext,
        viewport: &Viewport,
        view: &SceneView,
    ) -> Result<(), GraphicsError> {
        profile_scope!("SceneRenderer::begin_render_hit_proxies_view_target");
        if self.frame.is_some() {
            return Err(contract_violation!(
                "begin_render_hit_proxies_view_target inside a frame"
            ));
        }
        let targets = self
            .targets
            .allocate(&self.rhi, viewport.width(), viewport.height())?;
        ctx.set_render_target(Some(&targets.hit_proxy), Some(&targets.scene_depth))?;
        let (width, height) = view.size();
        ctx.set_viewport(ViewportRect::from_dimensions(width, height));
        ctx.clear_surface(&targets.hit_proxy, LinearColor::BLACK);
        ctx.clear_depth_stencil(&targets.scene_depth, 1.0, 0);
        ctx.set_view_parameters(view.uniforms());
        let states = self.rhi.static_states();
        ctx.set_depth_state(&states.depth_default);
        ctx.set_blend_state(&states.blend_opaque);

        self.build_scene_view(view)?;
        self.frame = Some(FrameState {
            pass: FramePass::HitProxy,
            view: view.clone(),
            targets,
            use_gbuffer: false,
        });
        Ok(())
    }

    /// Draw one hit-proxy layer of every depth group.
    ///
    /// Does nothing unless the view shows [`ShowFlags::HIT_PROXY`].
    pub fn render_hit_proxies(
        &mut self,
        ctx: &mut DeviceContext,
        layer: HitProxyLayer,
    ) -> Result<bool, GraphicsError> {
        let frame = match &self.frame {
            Some(frame) if frame.pass == FramePass::HitProxy => frame,
            _ => return Err(contract_violation!("render_hit_proxies outside a hit-proxy frame")),
        };
        let view = frame.view.clone();
        if !view.show_flags().contains(ShowFlags::HIT_PROXY) {
            return Ok(false);
        }
        let Some(scene) = self.scene.clone() else {
            return Ok(false);
        };
        let mut scene = scene.lock();
        if !scene.is_view_built() {
            return Ok(false);
        }

        let rhi = self.rhi.clone();
        let mut draws = 0;
        for group in DepthGroup::ALL {
            let lists = scene.get_sdg_mut(group).hit_proxy_layer_mut(layer);
            if lists.is_empty() {
                continue;
            }
            #[cfg(feature = "editor")]
            {
                draws += lists
                    .simple_hit_proxy_elements
                    .draw(&rhi, ctx, &self.shaders, true)?;
                for builder in &lists.dynamic_hit_proxy_mesh_builders {
                    if builder.draw::<HitProxyDrawingPolicy>(&rhi, ctx, &self.shaders, &view)? {
                        draws += 1;
                    }
                }
            }
            draws += lists.hit_proxy_draw_list.draw(&rhi, ctx, &view)?;
        }
        self.stats.draw_calls += draws;
        Ok(draws > 0)
    }

    pub fn finish_render_hit_proxies_view_target(
        &mut self,
        ctx: &mut DeviceContext,
    ) -> Result<(), GraphicsError> {
        match &self.frame {
            Some(frame) if frame.pass == FramePass::HitProxy => {}
            _ => {
                return Err(contract_violation!(
                    "finish_render_hit_proxies_view_target outside a hit-proxy frame"
                ));
            }
        }
        self.frame = None;
        self.clear_scene_view()?;
        self.rhi.flush(ctx)
    }

    /// Read the id under pixel (`x`, `y`) of the last hit-proxy pass.
    ///
    /// Black and out-of-range pixels report [`HitProxyId::NONE`].
    pub fn read_hit_proxy_id(
        &self,
        ctx: &mut DeviceContext,
        x: u32,
        y: u32,
    ) -> Result<HitProxyId, GraphicsError> {
        profile_scope!("SceneRenderer::read_hit_proxy_id");
        let Some(targets) = self.targets.targets() else {
            return Err(contract_violation!("read_hit_proxy_id before any hit-proxy pass"));
        };
        let texture = &targets.hit_proxy;
        if x >= texture.width() || y >= texture.height() {
            log::warn!(
                "read_hit_proxy_id: ({x}, {y}) outside {}x{}",
                texture.width(),
                texture.height()
            );
            return Ok(HitProxyId::NONE);
        }

        let locked = self.rhi.lock_texture_2d(ctx, texture, 0, LockMode::ReadOnly)?;
        let block_bytes = texture.format().info().block_bytes as usize;
        let offset = y as usize * locked.row_pitch() as usize + x as usize * block_bytes;
        let pixel = locked
            .as_slice()
            .get(offset..offset + 4)
            .map(|b| Color::new(b[0], b[1], b[2], b[3]));
        self.rhi.unlock_texture_2d(ctx, texture, locked)?;

        match pixel {
            Some(color) => Ok(HitProxyId::from_color(color)),
            None => Err(GraphicsError::Internal(format!(
                "hit-proxy readback too short for pixel ({x}, {y})"
            ))),
        }
    }
}
