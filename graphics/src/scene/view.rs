//! Per-frame view description.

use bitflags::bitflags;
use lumen_core::math::{Mat4, Vec3, Vec4, mat4_to_cols_array_2d};
use lumen_core::{Frustum, LinearColor};

use crate::types::ViewUniforms;

bitflags! {
    /// Element categories a view draws.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShowFlags: u32 {
        const STATIC_MESH = 1 << 0;
        const SPRITE = 1 << 1;
        const DYNAMIC_ELEMENTS = 1 << 2;
        const SIMPLE_ELEMENTS = 1 << 3;
        const GIZMO = 1 << 4;
        const LIGHTS = 1 << 5;
        const WIREFRAME = 1 << 6;
        const HIT_PROXY = 1 << 7;

        const DEFAULT_GAME = Self::STATIC_MESH.bits()
            | Self::SPRITE.bits()
            | Self::DYNAMIC_ELEMENTS.bits()
            | Self::LIGHTS.bits();
        const DEFAULT_EDITOR = Self::DEFAULT_GAME.bits()
            | Self::SIMPLE_ELEMENTS.bits()
            | Self::GIZMO.bits()
            | Self::HIT_PROXY.bits();
    }
}

impl Default for ShowFlags {
    fn default() -> Self {
        Self::DEFAULT_GAME
    }
}

/// Camera, target size, and show flags for one rendered frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneView {
    position: Vec3,
    view_matrix: Mat4,
    projection_matrix: Mat4,
    view_projection: Mat4,
    frustum: Frustum,
    size_x: u32,
    size_y: u32,
    background_color: LinearColor,
    show_flags: ShowFlags,
}

impl SceneView {
    pub fn new(
        position: Vec3,
        projection_matrix: Mat4,
        view_matrix: Mat4,
        size_x: u32,
        size_y: u32,
        background_color: LinearColor,
        show_flags: ShowFlags,
    ) -> Self {
        let view_projection = projection_matrix * view_matrix;
        Self {
            position,
            view_matrix,
            projection_matrix,
            view_projection,
            frustum: Frustum::from_view_projection(&view_projection),
            size_x,
            size_y,
            background_color,
            show_flags,
        }
    }

    pub fn position(&self) -> &Vec3 {
        &self.position
    }

    pub fn view_matrix(&self) -> &Mat4 {
        &self.view_matrix
    }

    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }

    pub fn view_projection(&self) -> &Mat4 {
        &self.view_projection
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    pub fn size(&self) -> (u32, u32) {
        (self.size_x, self.size_y)
    }

    pub fn background_color(&self) -> LinearColor {
        self.background_color
    }

    pub fn show_flags(&self) -> ShowFlags {
        self.show_flags
    }

    pub fn set_show_flags(&mut self, flags: ShowFlags) {
        self.show_flags = flags;
    }

    /// G-buffer rendering is used when lights are shown outside wireframe.
    pub fn uses_gbuffer(&self) -> bool {
        self.show_flags.contains(ShowFlags::LIGHTS) && !self.show_flags.contains(ShowFlags::WIREFRAME)
    }

    /// Project a world-space point to pixel coordinates (origin top-left) and depth.
    ///
    /// Returns `None` for points behind the camera.
    pub fn world_to_screen(&self, point: &Vec3) -> Option<Vec3> {
        let clip = self.view_projection * Vec4::new(point.x, point.y, point.z, 1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        Some(Vec3::new(
            (ndc.x * 0.5 + 0.5) * self.size_x as f32,
            (0.5 - ndc.y * 0.5) * self.size_y as f32,
            ndc.z,
        ))
    }

    /// Constants uploaded with `set_view_parameters`.
    pub fn uniforms(&self) -> ViewUniforms {
        let (w, h) = (self.size_x.max(1) as f32, self.size_y.max(1) as f32);
        ViewUniforms {
            view_projection: mat4_to_cols_array_2d(&self.view_projection),
            view: mat4_to_cols_array_2d(&self.view_matrix),
            projection: mat4_to_cols_array_2d(&self.projection_matrix),
            position: [self.position.x, self.position.y, self.position.z, 1.0],
            view_size: [w, h, 1.0 / w, 1.0 / h],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::math::{look_at_rh, perspective_rh};

    fn test_view(flags: ShowFlags) -> SceneView {
        let eye = Vec3::new(0.0, 0.0, 5.0);
        SceneView::new(
            eye,
            perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0),
            look_at_rh(&eye, &Vec3::zeros(), &Vec3::y()),
            100,
            100,
            LinearColor::BLACK,
            flags,
        )
    }

    #[test]
    fn test_gbuffer_selection() {
        assert!(test_view(ShowFlags::DEFAULT_GAME).uses_gbuffer());
        assert!(!test_view(ShowFlags::DEFAULT_GAME | ShowFlags::WIREFRAME).uses_gbuffer());
        assert!(!test_view(ShowFlags::STATIC_MESH).uses_gbuffer());
    }

    #[test]
    fn test_world_to_screen_center() {
        let view = test_view(ShowFlags::DEFAULT_GAME);
        let screen = view.world_to_screen(&Vec3::zeros()).unwrap();
        assert!((screen.x - 50.0).abs() < 1e-3);
        assert!((screen.y - 50.0).abs() < 1e-3);
        assert!(view.world_to_screen(&Vec3::new(0.0, 0.0, 10.0)).is_none());
    }

    #[test]
    fn test_uniform_view_size() {
        let uniforms = test_view(ShowFlags::empty()).uniforms();
        assert_eq!(uniforms.view_size, [100.0, 100.0, 0.01, 0.01]);
        assert_eq!(uniforms.position, [0.0, 0.0, 5.0, 1.0]);
    }
}
