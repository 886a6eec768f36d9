//! Scene lights.

use lumen_core::math::Vec3;
use lumen_core::{BoundingSphere, Frustum, LinearColor};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Point { radius: f32 },
    Spot { radius: f32, cone_angle: f32 },
    /// Infinitely far away; lights everything.
    Directional,
}

/// Light source collected by `Scene::build_view` when it reaches the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub color: LinearColor,
    pub intensity: f32,
}

impl Light {
    pub fn point(position: Vec3, radius: f32, color: LinearColor) -> Self {
        Self {
            kind: LightKind::Point { radius },
            position,
            direction: -Vec3::z(),
            color,
            intensity: 1.0,
        }
    }

    pub fn spot(position: Vec3, direction: Vec3, radius: f32, cone_angle: f32, color: LinearColor) -> Self {
        Self {
            kind: LightKind::Spot { radius, cone_angle },
            position,
            direction: direction.normalize(),
            color,
            intensity: 1.0,
        }
    }

    pub fn directional(direction: Vec3, color: LinearColor) -> Self {
        Self {
            kind: LightKind::Directional,
            position: Vec3::zeros(),
            direction: direction.normalize(),
            color,
            intensity: 1.0,
        }
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    /// Influence volume, or `None` for lights without one.
    pub fn bounds(&self) -> Option<BoundingSphere> {
        match self.kind {
            LightKind::Point { radius } | LightKind::Spot { radius, .. } => {
                Some(BoundingSphere::new(self.position, radius))
            }
            LightKind::Directional => None,
        }
    }

    pub fn radius(&self) -> Option<f32> {
        self.bounds().map(|b| b.radius)
    }

    pub fn is_visible(&self, frustum: &Frustum) -> bool {
        self.bounds()
            .is_none_or(|sphere| frustum.intersects_sphere(&sphere))
    }

    /// Color scaled by intensity, as sent to the light pass.
    pub fn scaled_color(&self) -> LinearColor {
        LinearColor::new(
            self.color.r * self.intensity,
            self.color.g * self.intensity,
            self.color.b * self.intensity,
            1.0,
        )
    }
}
