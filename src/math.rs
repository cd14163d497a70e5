//! Matrix and vector kernel.
//!
//! Thin, pure functions over [`glam`] types that pin down the conventions the
//! rest of the renderer relies on:
//!
//! - Matrices are column-major and `multiply(a, b)` is `a · b`, so a vector is
//!   transformed by `b` first.
//! - The mutating-style helpers (`translate`, `rotate`, `scale`, ...) right
//!   multiply: `translate(m, v) == multiply(m, translation(v))`.
//! - A combined X/Y/Z rotation is always `Rx · Ry · Rz`.
//! - Projections target wgpu clip space (right-handed view, depth in `0..1`).
//!
//! Singular matrices are not an error here. [`inverse`] divides by a zero
//! determinant and hands back non-finite values; use [`checked_inverse`] where
//! a degenerate input must be detected.
//!
//! ```
//! use lunar_walk::math;
//! use glam::Vec3;
//!
//! let m = math::rotate(math::translation(Vec3::new(1.0, 2.0, 3.0)), 0.3, 0.0, 0.0);
//! let back = math::multiply(m, math::inverse(m));
//! assert!(back.abs_diff_eq(math::identity(), 1e-5));
//! ```

use glam::{Mat3, Mat4, Vec3, Vec4};

/// The 4×4 identity.
#[inline]
pub fn identity() -> Mat4 {
    Mat4::IDENTITY
}

/// `a · b`.
#[inline]
pub fn multiply(a: Mat4, b: Mat4) -> Mat4 {
    a * b
}

/// Inverse via the adjugate divided by the determinant.
///
/// A singular input yields infinities or NaNs instead of panicking.
#[inline]
pub fn inverse(m: Mat4) -> Mat4 {
    m.inverse()
}

/// Inverse that reports singular or non-finite input as `None`.
pub fn checked_inverse(m: Mat4) -> Option<Mat4> {
    if m.determinant() == 0.0 {
        return None;
    }
    let inv = m.inverse();
    inv.is_finite().then_some(inv)
}

#[inline]
pub fn transpose(m: Mat4) -> Mat4 {
    m.transpose()
}

/// Row vector times matrix (`vᵀ · m`).
pub fn vector_multiply(v: Vec4, m: Mat4) -> Vec4 {
    m.transpose() * v
}

pub fn translation(v: Vec3) -> Mat4 {
    Mat4::from_translation(v)
}

pub fn translate(m: Mat4, v: Vec3) -> Mat4 {
    m * translation(v)
}

pub fn x_rotation(angle: f32) -> Mat4 {
    Mat4::from_rotation_x(angle)
}

pub fn y_rotation(angle: f32) -> Mat4 {
    Mat4::from_rotation_y(angle)
}

pub fn z_rotation(angle: f32) -> Mat4 {
    Mat4::from_rotation_z(angle)
}

pub fn x_rotate(m: Mat4, angle: f32) -> Mat4 {
    m * x_rotation(angle)
}

pub fn y_rotate(m: Mat4, angle: f32) -> Mat4 {
    m * y_rotation(angle)
}

pub fn z_rotate(m: Mat4, angle: f32) -> Mat4 {
    m * z_rotation(angle)
}

/// Combined rotation `Rx(x) · Ry(y) · Rz(z)`.
pub fn rotation(x: f32, y: f32, z: f32) -> Mat4 {
    x_rotation(x) * y_rotation(y) * z_rotation(z)
}

/// `m · Rx(x) · Ry(y) · Rz(z)`.
pub fn rotate(m: Mat4, x: f32, y: f32, z: f32) -> Mat4 {
    m * rotation(x, y, z)
}

pub fn scaling(v: Vec3) -> Mat4 {
    Mat4::from_scale(v)
}

pub fn scale(m: Mat4, v: Vec3) -> Mat4 {
    m * scaling(v)
}

/// Symmetric perspective projection built from `cot(fov / 2)`.
pub fn perspective(fov_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh(fov_radians, aspect, near, far)
}

/// Off-axis perspective projection for the given near-plane rectangle.
///
/// With `left == -right` and `bottom == -top` this matches [`perspective`].
pub fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let width = right - left;
    let height = top - bottom;
    let depth = near - far;
    Mat4::from_cols(
        Vec4::new(2.0 * near / width, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * near / height, 0.0, 0.0),
        Vec4::new(
            (right + left) / width,
            (top + bottom) / height,
            far / depth,
            -1.0,
        ),
        Vec4::new(0.0, 0.0, near * far / depth, 0.0),
    )
}

pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    Mat4::orthographic_rh(left, right, bottom, top, near, far)
}

/// World matrix of an observer at `eye` looking at `target`.
///
/// This is the camera's own placement; its inverse is the view matrix.
/// `eye == target` or `up` parallel to the view direction gives NaNs.
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let z_axis = (eye - target).normalize();
    let x_axis = up.cross(z_axis).normalize();
    let y_axis = z_axis.cross(x_axis).normalize();
    Mat4::from_cols(
        x_axis.extend(0.0),
        y_axis.extend(0.0),
        z_axis.extend(0.0),
        eye.extend(1.0),
    )
}

#[inline]
pub fn deg_to_rad(degrees: f32) -> f32 {
    degrees.to_radians()
}

#[inline]
pub fn rad_to_deg(radians: f32) -> f32 {
    radians.to_degrees()
}

/// 2D homogeneous transforms on 3×3 matrices.
pub mod plane {
    use glam::{Mat3, Vec3};

    pub fn identity() -> Mat3 {
        Mat3::IDENTITY
    }

    pub fn multiply(a: Mat3, b: Mat3) -> Mat3 {
        a * b
    }

    pub fn transpose(m: Mat3) -> Mat3 {
        m.transpose()
    }

    /// Maps pixel coordinates (origin top-left, Y down) to clip space.
    pub fn projection(width: f32, height: f32) -> Mat3 {
        Mat3::from_cols(
            Vec3::new(2.0 / width, 0.0, 0.0),
            Vec3::new(0.0, -2.0 / height, 0.0),
            Vec3::new(-1.0, 1.0, 1.0),
        )
    }

    pub fn translation(tx: f32, ty: f32) -> Mat3 {
        Mat3::from_cols(Vec3::X, Vec3::Y, Vec3::new(tx, ty, 1.0))
    }

    pub fn rotation(angle: f32) -> Mat3 {
        let (s, c) = angle.sin_cos();
        Mat3::from_cols(Vec3::new(c, s, 0.0), Vec3::new(-s, c, 0.0), Vec3::Z)
    }

    pub fn scaling(sx: f32, sy: f32) -> Mat3 {
        Mat3::from_diagonal(Vec3::new(sx, sy, 1.0))
    }
}

/// Upper-left 3×3 of `m` as a normal matrix (inverse transpose).
///
/// Falls back to the plain linear part when `m` is singular.
pub fn normal_matrix(m: Mat4) -> Mat4 {
    let linear = Mat3::from_mat4(m);
    let inv = linear.inverse();
    if linear.determinant() == 0.0 || !inv.is_finite() {
        return Mat4::from_mat3(linear);
    }
    Mat4::from_mat3(inv.transpose())
}
