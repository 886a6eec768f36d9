//! Editor viewport camera and its draw/pick entry points.

use std::f32::consts::PI;

use lumen_core::LinearColor;
use lumen_core::math::{Vec3, look_at_rh, orthographic_rh, perspective_rh};

use crate::context::DeviceContext;
use crate::error::GraphicsError;
#[cfg(feature = "hit-proxy")]
use crate::scene::{HitProxyId, HitProxyLayer};
use crate::scene::{SceneView, ShowFlags};
use crate::viewport::Viewport;

use super::scene_renderer::SceneRenderer;

/// Projection of an editor viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ViewportType {
    #[default]
    Perspective,
    /// Top view, looking down -Z.
    OrthoXY,
    /// Front view, looking along +Y.
    OrthoXZ,
    /// Side view, looking along -X.
    OrthoYZ,
}

/// Camera state of one editor viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorViewportClient {
    pub viewport_type: ViewportType,
    pub view_location: Vec3,
    /// Yaw around +Y, in radians. Zero looks down -Z.
    pub yaw: f32,
    /// Pitch in radians, clamped to just under +-90 degrees.
    pub pitch: f32,
    pub fov_degrees: f32,
    /// Half the visible width of orthographic views, in world units.
    pub ortho_zoom: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    pub show_flags: ShowFlags,
    pub background_color: LinearColor,
}

impl Default for EditorViewportClient {
    fn default() -> Self {
        Self {
            viewport_type: ViewportType::Perspective,
            view_location: Vec3::new(0.0, 0.0, 10.0),
            yaw: 0.0,
            pitch: 0.0,
            fov_degrees: 90.0,
            ortho_zoom: 10.0,
            near_plane: 0.1,
            far_plane: 10_000.0,
            show_flags: ShowFlags::DEFAULT_EDITOR,
            background_color: LinearColor::new(0.05, 0.05, 0.08, 1.0),
        }
    }
}

impl EditorViewportClient {
    pub fn new(viewport_type: ViewportType) -> Self {
        Self {
            viewport_type,
            ..Self::default()
        }
    }

    pub fn with_location(mut self, location: Vec3) -> Self {
        self.view_location = location;
        self
    }

    pub fn with_show_flags(mut self, flags: ShowFlags) -> Self {
        self.show_flags = flags;
        self
    }

    pub fn set_rotation(&mut self, yaw: f32, pitch: f32) {
        let limit = PI * 0.5 - 1e-3;
        self.yaw = yaw;
        self.pitch = pitch.clamp(-limit, limit);
    }

    pub fn forward(&self) -> Vec3 {
        match self.viewport_type {
            ViewportType::Perspective => Vec3::new(
                -self.yaw.sin() * self.pitch.cos(),
                self.pitch.sin(),
                -self.yaw.cos() * self.pitch.cos(),
            ),
            ViewportType::OrthoXY => -Vec3::z(),
            ViewportType::OrthoXZ => Vec3::y(),
            ViewportType::OrthoYZ => -Vec3::x(),
        }
    }

    fn up(&self) -> Vec3 {
        match self.viewport_type {
            ViewportType::Perspective | ViewportType::OrthoXY => Vec3::y(),
            ViewportType::OrthoXZ | ViewportType::OrthoYZ => Vec3::z(),
        }
    }

    /// View for a `width` x `height` target.
    pub fn calc_scene_view(&self, width: u32, height: u32) -> SceneView {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let eye = self.view_location;
        let view = look_at_rh(&eye, &(eye + self.forward()), &self.up());
        let projection = match self.viewport_type {
            ViewportType::Perspective => {
                let hfov = self.fov_degrees.to_radians();
                let yfov = 2.0 * ((hfov * 0.5).tan() / aspect).atan();
                perspective_rh(yfov, aspect, self.near_plane, self.far_plane)
            }
            _ => {
                let half_w = self.ortho_zoom;
                let half_h = self.ortho_zoom / aspect;
                orthographic_rh(
                    -half_w,
                    half_w,
                    -half_h,
                    half_h,
                    -self.far_plane,
                    self.far_plane,
                )
            }
        };
        SceneView::new(
            eye,
            projection,
            view,
            width,
            height,
            self.background_color,
            self.show_flags,
        )
    }

    /// Render one frame of `viewport`. Returns whether the world drew anything.
    pub fn draw(
        &self,
        renderer: &mut SceneRenderer,
        ctx: &mut DeviceContext,
        viewport: &Viewport,
    ) -> Result<bool, GraphicsError> {
        let view = self.calc_scene_view(viewport.width(), viewport.height());
        renderer.begin_render_view_target(ctx, viewport, &view)?;
        let drawn = renderer
            .render(ctx)
            .and_then(|drawn| renderer.finish_render_view_target(ctx, viewport).map(|()| drawn));
        if drawn.is_err() {
            renderer.abort_frame();
        }
        drawn
    }

    /// Run the hit-proxy passes for both layers and pick pixel (`x`, `y`).
    #[cfg(feature = "hit-proxy")]
    pub fn get_hit_proxy_id(
        &self,
        renderer: &mut SceneRenderer,
        ctx: &mut DeviceContext,
        viewport: &Viewport,
        x: u32,
        y: u32,
    ) -> Result<HitProxyId, GraphicsError> {
        let mut view = self.calc_scene_view(viewport.width(), viewport.height());
        view.set_show_flags(view.show_flags() | ShowFlags::HIT_PROXY);
        renderer.begin_render_hit_proxies_view_target(ctx, viewport, &view)?;
        let passes = HitProxyLayer::ALL
            .into_iter()
            .try_for_each(|layer| renderer.render_hit_proxies(ctx, layer).map(drop))
            .and_then(|()| renderer.finish_render_hit_proxies_view_target(ctx));
        if let Err(err) = passes {
            renderer.abort_frame();
            return Err(err);
        }
        renderer.read_hit_proxy_id(ctx, x, y)
    }
}
