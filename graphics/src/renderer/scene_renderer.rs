//! Per-frame pass orchestration.
//!
//! A frame is bracketed by [`SceneRenderer::begin_render_view_target`] and
//! [`SceneRenderer::finish_render_view_target`]:
//!
//! ```ignore
//! renderer.begin_render_view_target(&mut ctx, &viewport, &view)?;
//! renderer.render(&mut ctx)?;
//! renderer.finish_render_view_target(&mut ctx, &viewport)?;
//! ```
//!
//! The base pass draws the World depth group into the G-buffer (lights shown)
//! or straight into scene color. The G-buffer is resolved into scene color
//! with an ambient term and one additive full-screen pass per visible light.
//! Highlight, Translucent and Foreground groups follow, and the finished
//! scene color is blitted to the viewport.

use std::sync::Arc;

use lumen_core::{LinearColor, profile_plot, profile_scope};

use crate::config::RendererSettings;
use crate::context::DeviceContext;
use crate::device::Rhi;
use crate::error::{GraphicsError, contract_violation};
use crate::resources::{PixelShaderRef, SurfaceRef, VertexShaderRef};
#[cfg(feature = "editor")]
use crate::scene::MeshDrawingPolicy;
use crate::scene::{DepthGroup, Light, Scene, SceneView, SharedScene, ShowFlags};
use crate::shaders::BuiltinShaders;
use crate::types::{ShaderFrequency, ViewportRect};
use crate::viewport::Viewport;

use super::render_targets::{SceneRenderTargets, SceneTargets};
use super::screen::{QuadRect, draw_denormalized_quad};

/// Which pass pair a frame was started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FramePass {
    Scene,
    #[cfg(feature = "hit-proxy")]
    HitProxy,
}

#[derive(Debug)]
pub(crate) struct FrameState {
    pub(crate) pass: FramePass,
    pub(crate) view: SceneView,
    pub(crate) targets: SceneTargets,
    pub(crate) use_gbuffer: bool,
}

/// Counters of the last finished frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames: u64,
    pub draw_calls: u32,
    pub light_passes: u32,
}

/// Draws a [`Scene`] into viewports through the immediate device context.
pub struct SceneRenderer {
    pub(crate) rhi: Arc<Rhi>,
    pub(crate) shaders: Arc<BuiltinShaders>,
    pub(crate) settings: RendererSettings,
    pub(crate) scene: Option<SharedScene>,
    pub(crate) targets: SceneRenderTargets,
    pub(crate) frame: Option<FrameState>,
    screen_shaders: Option<(VertexShaderRef, PixelShaderRef)>,
    light_shader: Option<PixelShaderRef>,
    logged_missing_lights: bool,
    pub(crate) stats: RenderStats,
}

impl SceneRenderer {
    pub fn new(rhi: Arc<Rhi>, shaders: Arc<BuiltinShaders>, settings: RendererSettings) -> Self {
        log::info!(
            "SceneRenderer created on {} (editor_mode={})",
            rhi.name(),
            settings.editor_mode
        );
        Self {
            screen_shaders: Some((shaders.screen_vs.clone(), shaders.screen_ps.clone())),
            light_shader: Some(shaders.light_ps.clone()),
            rhi,
            shaders,
            settings,
            scene: None,
            targets: SceneRenderTargets::new(),
            frame: None,
            logged_missing_lights: false,
            stats: RenderStats::default(),
        }
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: RendererSettings) {
        self.settings = settings;
    }

    pub fn set_scene(&mut self, scene: Option<SharedScene>) {
        self.scene = scene;
    }

    pub fn scene(&self) -> Option<&SharedScene> {
        self.scene.as_ref()
    }

    /// Replace the shaders used to blit scene color to the viewport.
    pub fn set_screen_shaders(&mut self, shaders: Option<(VertexShaderRef, PixelShaderRef)>) {
        self.screen_shaders = shaders;
    }

    /// Replace (or remove) the pixel shader of the light pass.
    pub fn set_light_shader(&mut self, shader: Option<PixelShaderRef>) {
        self.light_shader = shader;
        self.logged_missing_lights = false;
    }

    pub fn render_targets(&self) -> &SceneRenderTargets {
        &self.targets
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn is_rendering(&self) -> bool {
        self.frame.is_some()
    }

    fn frame(&self, expected: FramePass) -> Result<&FrameState, GraphicsError> {
        match &self.frame {
            Some(frame) if frame.pass == expected => Ok(frame),
            Some(frame) => Err(contract_violation!(
                "{expected:?} pass used inside a {:?} frame",
                frame.pass
            )),
            None => Err(contract_violation!("{expected:?} pass used outside a frame")),
        }
    }

    /// Build the scene's visible set for `view`, if there is a scene.
    pub(crate) fn build_scene_view(&self, view: &SceneView) -> Result<(), GraphicsError> {
        if let Some(scene) = &self.scene {
            scene.lock().build_view(view)?;
        }
        Ok(())
    }

    /// Leave a frame that failed between its begin and finish steps.
    ///
    /// Releases the scene's view so the next frame can start. Commands already
    /// recorded on the context are left in place.
    pub fn abort_frame(&mut self) {
        if let Some(frame) = self.frame.take() {
            log::warn!("SceneRenderer: aborting {:?} frame", frame.pass);
        }
        if let Err(err) = self.clear_scene_view() {
            log::error!("SceneRenderer: failed to release the scene view: {err}");
        }
    }

    pub(crate) fn clear_scene_view(&self) -> Result<(), GraphicsError> {
        if let Some(scene) = &self.scene {
            let mut scene = scene.lock();
            if scene.is_view_built() {
                scene.clear_view()?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Scene pass
    // ========================================================================

    /// Allocate targets, clear them, set default state and build the view.
    pub fn begin_render_view_target(
        &mut self,
        ctx: &mut DeviceContext,
        viewport: &Viewport,
        view: &SceneView,
    ) -> Result<(), GraphicsError> {
        profile_scope!("SceneRenderer::begin_render_view_target");
        if self.frame.is_some() {
            return Err(contract_violation!("begin_render_view_target inside a frame"));
        }
        let targets = self
            .targets
            .allocate(&self.rhi, viewport.width(), viewport.height())?;
        let use_gbuffer = view.uses_gbuffer() && self.settings.enable_lights;
        let color = if use_gbuffer {
            &targets.gbuffer
        } else {
            &targets.scene_color
        };

        ctx.set_render_target(Some(color), Some(&targets.scene_depth))?;
        let (width, height) = view.size();
        ctx.set_viewport(ViewportRect::from_dimensions(width, height));
        ctx.clear_surface(color, view.background_color());
        ctx.clear_depth_stencil(&targets.scene_depth, 1.0, 0);
        if use_gbuffer {
            ctx.clear_surface(&targets.scene_color, LinearColor::BLACK);
        }

        let states = self.rhi.static_states();
        ctx.set_depth_state(&states.depth_default);
        ctx.set_blend_state(&states.blend_opaque);
        ctx.set_view_parameters(view.uniforms());

        self.build_scene_view(view)?;
        self.frame = Some(FrameState {
            pass: FramePass::Scene,
            view: view.clone(),
            targets,
            use_gbuffer,
        });
        self.stats.draw_calls = 0;
        self.stats.light_passes = 0;
        Ok(())
    }

    /// Draw every pass of the frame. Returns whether the world group drew anything.
    pub fn render(&mut self, ctx: &mut DeviceContext) -> Result<bool, GraphicsError> {
        profile_scope!("SceneRenderer::render");
        let frame = self.frame(FramePass::Scene)?;
        let view = frame.view.clone();
        let targets = frame.targets.clone();
        let use_gbuffer = frame.use_gbuffer;
        let Some(scene) = self.scene.clone() else {
            log::trace!("SceneRenderer: no scene, skipping render");
            return Ok(false);
        };
        let mut scene = scene.lock();

        let drawn = self.render_sdg(ctx, &mut scene, DepthGroup::World, &view)?;

        if use_gbuffer {
            self.resolve_gbuffer(ctx, &targets, &view)?;
            let flags = view.show_flags();
            if drawn
                && !scene.visible_lights().is_empty()
                && flags.contains(ShowFlags::LIGHTS)
                && !flags.contains(ShowFlags::WIREFRAME)
            {
                self.render_lights(ctx, &scene, &targets, &view)?;
            }
            let states = self.rhi.static_states();
            ctx.set_render_target(Some(&targets.scene_color), Some(&targets.scene_depth))?;
            ctx.set_blend_state(&states.blend_opaque);
        }

        if self.settings.editor_mode {
            self.render_highlight(ctx, &mut scene, &view)?;
        }
        self.render_post_process(ctx, &mut scene, &view)?;
        self.render_ui(ctx, &mut scene, &view)?;
        Ok(drawn)
    }

    /// Draw one depth group. Returns `false` when nothing was drawn, including
    /// when the view was not built.
    pub fn render_sdg(
        &mut self,
        ctx: &mut DeviceContext,
        scene: &mut Scene,
        group: DepthGroup,
        view: &SceneView,
    ) -> Result<bool, GraphicsError> {
        if !scene.is_view_built() {
            log::trace!("SceneRenderer: {group:?} skipped, view not built");
            return Ok(false);
        }
        let rhi = self.rhi.clone();
        let flags = view.show_flags();
        let sdg = scene.get_sdg_mut(group);
        let mut draws = 0;

        #[cfg(feature = "editor")]
        {
            if flags.contains(ShowFlags::SIMPLE_ELEMENTS) && !sdg.simple_elements.is_empty() {
                draws += sdg.simple_elements.draw(&rhi, ctx, &self.shaders, false)?;
            }
            if flags.contains(ShowFlags::GIZMO) && !sdg.gizmo_draw_list.is_empty() {
                draws += sdg.gizmo_draw_list.draw(&rhi, ctx, view)?;
            }
        }
        if flags.contains(ShowFlags::STATIC_MESH) && !sdg.static_mesh_draw_list.is_empty() {
            draws += sdg.static_mesh_draw_list.draw(&rhi, ctx, view)?;
        }
        if flags.contains(ShowFlags::SPRITE) && !sdg.sprite_draw_list.is_empty() {
            draws += sdg.sprite_draw_list.draw(&rhi, ctx, view)?;
        }
        if flags.contains(ShowFlags::DYNAMIC_ELEMENTS) {
            if !sdg.dynamic_mesh_elements.is_empty() {
                draws += sdg.dynamic_mesh_elements.draw(&rhi, ctx, view)?;
            }
            #[cfg(feature = "editor")]
            for builder in &sdg.dynamic_mesh_builders {
                if builder.draw::<MeshDrawingPolicy>(&rhi, ctx, &self.shaders, view)? {
                    draws += 1;
                }
            }
        }

        self.stats.draw_calls += draws;
        Ok(draws > 0)
    }

    /// Copy albedo into scene color, scaled by the ambient intensity.
    fn resolve_gbuffer(
        &mut self,
        ctx: &mut DeviceContext,
        targets: &SceneTargets,
        view: &SceneView,
    ) -> Result<(), GraphicsError> {
        let Some((vs, ps)) = self.screen_shaders.clone() else {
            return Err(contract_violation!("screen shaders are not registered"));
        };
        let ambient = self.settings.ambient_intensity;
        self.bind_screen_pass(ctx, &targets.scene_color, &vs, &ps, &targets.gbuffer)?;
        ctx.set_blend_state(&self.rhi.static_states().blend_opaque);
        ctx.set_shader_parameter_pod(
            ShaderFrequency::Pixel,
            0,
            &[ambient, ambient, ambient, 1.0f32],
        )?;
        let (width, height) = view.size();
        draw_denormalized_quad(
            &self.rhi,
            ctx,
            QuadRect::from_size(width, height),
            QuadRect::from_size(width, height),
            targets.size(),
            targets.gbuffer.size(),
        )?;
        self.stats.draw_calls += 1;
        Ok(())
    }

    /// One additive full-screen pass per visible light.
    pub fn render_lights(
        &mut self,
        ctx: &mut DeviceContext,
        scene: &Scene,
        targets: &SceneTargets,
        view: &SceneView,
    ) -> Result<u32, GraphicsError> {
        profile_scope!("SceneRenderer::render_lights");
        let Some(light_ps) = self.light_shader.clone() else {
            if !self.logged_missing_lights {
                log::debug!("SceneRenderer: no light shader registered, skipping lights");
                self.logged_missing_lights = true;
            }
            return Ok(0);
        };
        let Some((vs, _)) = self.screen_shaders.clone() else {
            return Err(contract_violation!("screen shaders are not registered"));
        };
        self.bind_screen_pass(ctx, &targets.scene_color, &vs, &light_ps, &targets.gbuffer)?;
        ctx.set_blend_state(&self.rhi.static_states().blend_additive);

        let (width, height) = view.size();
        let mut passes = 0;
        for light in scene.visible_lights() {
            let Some(screen) = light_screen_params(view, light) else {
                log::trace!("SceneRenderer: light behind the camera skipped");
                continue;
            };
            let color = light.scaled_color().to_array();
            ctx.set_shader_parameter_pod(ShaderFrequency::Pixel, 0, &[color, screen])?;
            draw_denormalized_quad(
                &self.rhi,
                ctx,
                QuadRect::from_size(width, height),
                QuadRect::from_size(width, height),
                targets.size(),
                targets.gbuffer.size(),
            )?;
            passes += 1;
        }
        self.stats.light_passes += passes;
        self.stats.draw_calls += passes;
        Ok(passes)
    }

    /// Selection highlight, depth tested with default blending.
    pub fn render_highlight(
        &mut self,
        ctx: &mut DeviceContext,
        scene: &mut Scene,
        view: &SceneView,
    ) -> Result<bool, GraphicsError> {
        if scene.get_sdg(DepthGroup::Highlight).is_empty() {
            return Ok(false);
        }
        let rhi = self.rhi.clone();
        let states = rhi.static_states();
        ctx.set_depth_state(&states.depth_default);
        ctx.set_blend_state(&states.blend_opaque);
        self.render_sdg(ctx, scene, DepthGroup::Highlight, view)
    }

    /// Translucent group: depth tested without depth writes.
    pub fn render_post_process(
        &mut self,
        ctx: &mut DeviceContext,
        scene: &mut Scene,
        view: &SceneView,
    ) -> Result<bool, GraphicsError> {
        if scene.get_sdg(DepthGroup::Translucent).is_empty() {
            return Ok(false);
        }
        let rhi = self.rhi.clone();
        let states = rhi.static_states();
        ctx.set_depth_state(&states.depth_test_only);
        ctx.set_blend_state(&states.blend_translucent);
        let drawn = self.render_sdg(ctx, scene, DepthGroup::Translucent, view)?;
        ctx.set_depth_state(&states.depth_default);
        ctx.set_blend_state(&states.blend_opaque);
        Ok(drawn)
    }

    /// Foreground group drawn over everything without depth testing.
    pub fn render_ui(
        &mut self,
        ctx: &mut DeviceContext,
        scene: &mut Scene,
        view: &SceneView,
    ) -> Result<bool, GraphicsError> {
        if scene.get_sdg(DepthGroup::Foreground).is_empty() {
            return Ok(false);
        }
        let rhi = self.rhi.clone();
        let states = rhi.static_states();
        ctx.set_depth_state(&states.depth_disabled);
        let drawn = self.render_sdg(ctx, scene, DepthGroup::Foreground, view)?;
        ctx.set_depth_state(&states.depth_default);
        Ok(drawn)
    }

    /// Clear the view and blit scene color to the viewport surface.
    pub fn finish_render_view_target(
        &mut self,
        ctx: &mut DeviceContext,
        viewport: &Viewport,
    ) -> Result<(), GraphicsError> {
        profile_scope!("SceneRenderer::finish_render_view_target");
        self.frame(FramePass::Scene)?;
        let Some(frame) = self.frame.take() else {
            return Ok(());
        };
        self.clear_scene_view()?;

        let Some((vs, ps)) = self.screen_shaders.clone() else {
            return Err(contract_violation!("screen shaders are not registered"));
        };
        ctx.set_render_target(Some(viewport.surface()), None)?;
        ctx.set_viewport(ViewportRect::from_dimensions(
            viewport.width(),
            viewport.height(),
        ));
        self.bind_screen_pass_state(ctx, &vs, &ps, &frame.targets.scene_color)?;
        ctx.set_blend_state(&self.rhi.static_states().blend_opaque);
        ctx.set_shader_parameter_pod(ShaderFrequency::Pixel, 0, &LinearColor::WHITE)?;

        let (width, height) = frame.view.size();
        draw_denormalized_quad(
            &self.rhi,
            ctx,
            QuadRect::from_size(viewport.width(), viewport.height()),
            QuadRect::from_size(width, height),
            viewport.size(),
            frame.targets.size(),
        )?;
        self.stats.draw_calls += 1;
        self.stats.frames += 1;
        profile_plot!("draw_calls", self.stats.draw_calls);
        Ok(())
    }

    fn bind_screen_pass(
        &self,
        ctx: &mut DeviceContext,
        target: &SurfaceRef,
        vs: &VertexShaderRef,
        ps: &PixelShaderRef,
        texture: &SurfaceRef,
    ) -> Result<(), GraphicsError> {
        ctx.set_render_target(Some(target), None)?;
        self.bind_screen_pass_state(ctx, vs, ps, texture)
    }

    fn bind_screen_pass_state(
        &self,
        ctx: &mut DeviceContext,
        vs: &VertexShaderRef,
        ps: &PixelShaderRef,
        texture: &SurfaceRef,
    ) -> Result<(), GraphicsError> {
        let states = self.rhi.static_states();
        let bound = self.rhi.create_bound_shader_state(
            &self.shaders.simple_declaration,
            vs,
            ps,
            None,
            None,
            None,
        )?;
        ctx.set_bound_shader_state(&bound);
        ctx.set_depth_state(&states.depth_disabled);
        ctx.set_rasterizer_state(&states.rasterizer_default);
        ctx.set_texture_parameter(0, Some(texture))?;
        ctx.set_sampler_state(0, &states.sampler_bilinear)
    }
}

/// `(x, y, radius, attenuated)` in pixels for the light shader, or `None`
/// when the light's center is behind the camera.
fn light_screen_params(view: &SceneView, light: &Light) -> Option<[f32; 4]> {
    let Some(radius) = light.radius() else {
        return Some([0.0, 0.0, 0.0, 0.0]);
    };
    let center = view.world_to_screen(&light.position)?;
    let m = view.view_matrix();
    let right = lumen_core::math::Vec3::new(m[(0, 0)], m[(0, 1)], m[(0, 2)]);
    let edge = view.world_to_screen(&(light.position + right * radius))?;
    let pixels = (edge.xy() - center.xy()).norm();
    Some([center.x, center.y, pixels, 1.0])
}

impl std::fmt::Debug for SceneRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneRenderer")
            .field("settings", &self.settings)
            .field("has_scene", &self.scene.is_some())
            .field("in_frame", &self.frame.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

static_assertions::assert_impl_all!(SceneRenderer: Send);

#[cfg(test)]
mod tests {
    use lumen_core::math::{Vec3, look_at_rh, perspective_rh};

    use super::*;

    #[test]
    fn test_light_screen_params_center() {
        let eye = Vec3::new(0.0, 0.0, 5.0);
        let view = SceneView::new(
            eye,
            perspective_rh(1.0, 1.0, 0.1, 100.0),
            look_at_rh(&eye, &Vec3::zeros(), &Vec3::y()),
            100,
            100,
            LinearColor::BLACK,
            ShowFlags::DEFAULT_GAME,
        );
        let light = Light::point(Vec3::zeros(), 1.0, LinearColor::WHITE);
        let params = light_screen_params(&view, &light).unwrap();
        assert!((params[0] - 50.0).abs() < 1e-3);
        assert!((params[1] - 50.0).abs() < 1e-3);
        assert!(params[2] > 0.0);
        assert_eq!(params[3], 1.0);

        let behind = Light::point(Vec3::new(0.0, 0.0, 10.0), 1.0, LinearColor::WHITE);
        assert!(light_screen_params(&view, &behind).is_none());
    }
}
