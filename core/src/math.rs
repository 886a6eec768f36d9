//! Math type aliases and helper functions.
//!
//! All rendering math is f32, column-vector convention, right-handed, with
//! clip-space depth in `[0, 1]`.

pub use nalgebra;

/// 2D vector (f32).
pub type Vec2 = nalgebra::Vector2<f32>;

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// 4D vector (f32).
pub type Vec4 = nalgebra::Vector4<f32>;

/// 4x4 matrix (f32).
pub type Mat4 = nalgebra::Matrix4<f32>;

/// Quaternion (f32). Use [`quat_from_rotation_y`] and friends to construct.
pub type Quat = nalgebra::Quaternion<f32>;

/// Build a 4x4 TRS matrix from scale, rotation (quaternion), and translation.
pub fn mat4_from_scale_rotation_translation(
    scale: Vec3,
    rotation: Quat,
    translation: Vec3,
) -> Mat4 {
    let rotation = nalgebra::UnitQuaternion::new_unchecked(rotation).to_homogeneous();
    let mut m = rotation * Mat4::new_nonuniform_scaling(&scale);
    m[(0, 3)] = translation.x;
    m[(1, 3)] = translation.y;
    m[(2, 3)] = translation.z;
    m
}

/// Build a translation-only 4x4 matrix.
pub fn mat4_from_translation(t: Vec3) -> Mat4 {
    Mat4::new_translation(&t)
}

/// Right-handed perspective projection with depth range [0, 1].
pub fn perspective_rh(yfov: f32, aspect: f32, znear: f32, zfar: f32) -> Mat4 {
    let f = 1.0 / (yfov / 2.0).tan();
    let nf = 1.0 / (znear - zfar);
    #[rustfmt::skip]
    let result = Mat4::new(
        f / aspect, 0.0, 0.0,        0.0,
        0.0,        f,   0.0,        0.0,
        0.0,        0.0, zfar * nf,  znear * zfar * nf,
        0.0,        0.0, -1.0,       0.0,
    );
    result
}

/// Right-handed orthographic projection with depth range [0, 1].
pub fn orthographic_rh(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let width = right - left;
    let height = top - bottom;
    let depth = far - near;
    #[rustfmt::skip]
    let result = Mat4::new(
        2.0 / width, 0.0,          0.0,          -(right + left) / width,
        0.0,         2.0 / height, 0.0,          -(top + bottom) / height,
        0.0,         0.0,          -1.0 / depth, -near / depth,
        0.0,         0.0,          0.0,          1.0,
    );
    result
}

/// Right-handed look-at view matrix.
pub fn look_at_rh(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4 {
    let eye = nalgebra::Point3::from(*eye);
    let target = nalgebra::Point3::from(*target);
    nalgebra::Isometry3::look_at_rh(&eye, &target, up).to_homogeneous()
}

/// Quaternion for a rotation of `angle` radians around the Y axis.
pub fn quat_from_rotation_y(angle: f32) -> Quat {
    nalgebra::UnitQuaternion::from_axis_angle(&Vec3::y_axis(), angle).into_inner()
}

/// Rotate a vector by a quaternion.
pub fn quat_rotate_vec3(q: Quat, v: Vec3) -> Vec3 {
    nalgebra::UnitQuaternion::new_unchecked(q) * v
}

/// Transform a point by an affine or projective matrix, dividing by w.
pub fn transform_point(m: &Mat4, p: &Vec3) -> Vec3 {
    let h = m * Vec4::new(p.x, p.y, p.z, 1.0);
    let w = if h.w.abs() > f32::EPSILON { h.w } else { 1.0 };
    Vec3::new(h.x / w, h.y / w, h.z / w)
}

/// Largest axis scale of the upper 3x3 block.
pub fn max_axis_scale(m: &Mat4) -> f32 {
    let sx = m.fixed_view::<3, 1>(0, 0).norm();
    let sy = m.fixed_view::<3, 1>(0, 1).norm();
    let sz = m.fixed_view::<3, 1>(0, 2).norm();
    sx.max(sy).max(sz)
}

/// Convert a 4x4 matrix to a column-major `[[f32; 4]; 4]` array for upload.
pub fn mat4_to_cols_array_2d(m: &Mat4) -> [[f32; 4]; 4] {
    let s = m.as_slice();
    [
        [s[0], s[1], s[2], s[3]],
        [s[4], s[5], s[6], s[7]],
        [s[8], s[9], s[10], s[11]],
        [s[12], s[13], s[14], s[15]],
    ]
}
