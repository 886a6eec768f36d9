//! Bounding volumes and view-frustum culling.

use crate::math::{Mat4, Vec3, Vec4, max_axis_scale, transform_point};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// An inverted box that contains nothing; growing it by any point yields that point.
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::INFINITY),
            max: Vec3::repeat(f32::NEG_INFINITY),
        }
    }

    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_extent(center: Vec3, half_extent: Vec3) -> Self {
        Self {
            min: center - half_extent,
            max: center + half_extent,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn grow(&mut self, point: &Vec3) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Bounds of the eight transformed corners.
    pub fn transformed(&self, transform: &Mat4) -> Self {
        let mut result = Self::empty();
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            result.grow(&transform_point(transform, &corner));
        }
        result
    }

    pub fn to_sphere(&self) -> BoundingSphere {
        BoundingSphere::new(self.center(), self.half_extent().norm())
    }
}

/// Bounding sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self {
            center: Vec3::zeros(),
            radius: 1.0,
        }
    }
}

impl BoundingSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Conservative sphere after an affine transform: the radius scales by the largest axis.
    pub fn transformed(&self, transform: &Mat4) -> Self {
        Self {
            center: transform_point(transform, &self.center),
            radius: self.radius * max_axis_scale(transform),
        }
    }
}

/// A plane `normal . p + d = 0`, normal pointing into the frustum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrustumPlane {
    pub normal: Vec3,
    pub d: f32,
}

impl FrustumPlane {
    fn from_row(v: Vec4) -> Self {
        let normal = Vec3::new(v.x, v.y, v.z);
        let len = normal.norm();
        if len > 0.0 {
            Self {
                normal: normal / len,
                d: v.w / len,
            }
        } else {
            Self { normal, d: v.w }
        }
    }

    pub fn signed_distance(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// Six clip planes extracted from a view-projection matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [FrustumPlane; 6],
}

impl Frustum {
    /// Extract planes (left, right, bottom, top, near, far) for a `[0, 1]` depth projection.
    pub fn from_view_projection(m: &Mat4) -> Self {
        let row = |i: usize| m.row(i).transpose();
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        Self {
            planes: [
                FrustumPlane::from_row(r3 + r0),
                FrustumPlane::from_row(r3 - r0),
                FrustumPlane::from_row(r3 + r1),
                FrustumPlane::from_row(r3 - r1),
                FrustumPlane::from_row(r2),
                FrustumPlane::from_row(r3 - r2),
            ],
        }
    }

    pub fn planes(&self) -> &[FrustumPlane; 6] {
        &self.planes
    }

    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|p| p.signed_distance(&sphere.center) >= -sphere.radius)
    }

    /// Positive-vertex test; conservative near frustum corners.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        if aabb.is_empty() {
            return false;
        }
        self.planes.iter().all(|p| {
            let positive = Vec3::new(
                if p.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if p.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if p.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            p.signed_distance(&positive) >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{look_at_rh, perspective_rh};
    use std::f32::consts::FRAC_PI_2;

    fn test_frustum() -> Frustum {
        let view = look_at_rh(
            &Vec3::new(0.0, 0.0, 5.0),
            &Vec3::zeros(),
            &Vec3::new(0.0, 1.0, 0.0),
        );
        let proj = perspective_rh(FRAC_PI_2, 1.0, 0.1, 100.0);
        Frustum::from_view_projection(&(proj * view))
    }

    #[test]
    fn sphere_in_front_is_visible() {
        let frustum = test_frustum();
        assert!(frustum.intersects_sphere(&BoundingSphere::new(Vec3::zeros(), 1.0)));
    }

    #[test]
    fn sphere_behind_camera_is_culled() {
        let frustum = test_frustum();
        assert!(!frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(0.0, 0.0, 20.0), 1.0)));
    }

    #[test]
    fn aabb_far_to_the_side_is_culled() {
        let frustum = test_frustum();
        let visible = Aabb::from_center_extent(Vec3::zeros(), Vec3::repeat(0.5));
        let hidden = Aabb::from_center_extent(Vec3::new(50.0, 0.0, 0.0), Vec3::repeat(0.5));
        assert!(frustum.intersects_aabb(&visible));
        assert!(!frustum.intersects_aabb(&hidden));
        assert!(!frustum.intersects_aabb(&Aabb::empty()));
    }

    #[test]
    fn aabb_transform_grows_with_scale() {
        let aabb = Aabb::from_center_extent(Vec3::zeros(), Vec3::repeat(1.0));
        let scaled = aabb.transformed(&Mat4::new_scaling(2.0));
        assert!((scaled.max - Vec3::repeat(2.0)).norm() < 1e-6);
        assert!((scaled.to_sphere().radius - 12.0f32.sqrt()).abs() < 1e-5);
    }
}
