//! Scene node transforms and world-matrix variants.
//!
//! Every node carries a [`Transform`]: translation, a full rotation matrix and
//! a per-axis scale. The plain world matrix is always
//! `translate · rotation · scale`, rebuilt on every call so that edits made by
//! input handlers show up on the next draw.
//!
//! How that local transform becomes a world matrix depends on the node's
//! [`Placement`]:
//!
//! | Placement   | World matrix |
//! |-------------|--------------|
//! | `Free`      | `T · R · S` |
//! | `Skybox`    | `R · S` (drawn with a rotation-only view) |
//! | `Billboard` | `V⁻¹ · axis_lengths(V · M_target) · T · R · S` |
//! | `Locked`    | `T(-camera) · R_camera⁻¹ · R · T · S` |
//!
//! Rotation is a matrix rather than Euler angles because dragging a picked
//! object accumulates arbitrary rotations into it.

use glam::{Mat4, Vec3, Vec4};
use hecs::Entity;

use crate::camera::Camera;
use crate::math;

/// Position, rotation and scale of a scene node.
///
/// ```
/// use lunar_walk::Transform;
/// use glam::Vec3;
///
/// let t = Transform::new()
///     .position(Vec3::new(100.0, 50.0, 0.0))
///     .euler(0.0, 0.5, 0.0)
///     .uniform_scale(50.0);
/// let m = t.matrix();
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Mat4,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Mat4::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new().position(position)
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.translation = position;
        self
    }

    /// Replaces the rotation with `Rx(x) · Ry(y) · Rz(z)`.
    pub fn euler(mut self, x: f32, y: f32, z: f32) -> Self {
        self.rotation = math::rotation(x, y, z);
        self
    }

    pub fn rotation(mut self, rotation: Mat4) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    /// Accumulates `Rx(x) · Ry(y) · Rz(z)` onto the current rotation.
    pub fn rotate_by(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = math::rotate(self.rotation, x, y, z);
    }

    /// `translate · rotation · scale`.
    pub fn matrix(&self) -> Mat4 {
        let m = math::multiply(math::translation(self.translation), self.rotation);
        math::scale(m, self.scale)
    }
}

/// How a node's transform turns into a world matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Placement {
    /// Ordinary object.
    #[default]
    Free,
    /// Infinitely distant backdrop.
    Skybox,
    /// Always faces the camera, anchored to `target` when given.
    Billboard { target: Option<Entity> },
    /// Rigidly attached to the scene camera.
    Locked,
}

/// Skybox world matrix: rotation and scale, never translated.
pub fn skybox_matrix(transform: &Transform) -> Mat4 {
    math::scale(transform.rotation, transform.scale)
}

/// Strips the translation from a view matrix, leaving only its rotation.
pub fn rotation_only(view: Mat4) -> Mat4 {
    let mut m = view;
    m.w_axis = Vec4::W;
    m
}

/// Billboard world matrix facing the viewer.
///
/// `target_world` is the anchor's world matrix. Its view-space form is reduced
/// to the lengths of its axes plus its view-space position, mapped back to
/// world space, and the billboard's own local transform is applied on top.
/// A singular view leaves the local transform unchanged.
pub fn billboard_matrix(view: Mat4, target_world: Mat4, local: &Transform) -> Mat4 {
    let model_view = math::multiply(view, target_world);
    let facing = Mat4::from_cols(
        Vec4::new(model_view.x_axis.truncate().length(), 0.0, 0.0, 0.0),
        Vec4::new(0.0, model_view.y_axis.truncate().length(), 0.0, 0.0),
        Vec4::new(0.0, 0.0, model_view.z_axis.truncate().length(), 0.0),
        model_view.w_axis,
    );
    match math::checked_inverse(view) {
        Some(inv_view) => math::multiply(math::multiply(inv_view, facing), local.matrix()),
        None => local.matrix(),
    }
}

/// World matrix of an object locked to `camera`.
///
/// Multiplying by the camera's view cancels the camera part exactly, so the
/// object's view-space matrix is `R · T · S` no matter where the camera is.
pub fn locked_matrix(camera: &Camera, local: &Transform) -> Mat4 {
    let undo_camera = math::multiply(
        math::translation(-camera.translation),
        math::inverse(camera.rotation_matrix()),
    );
    let m = math::multiply(undo_camera, local.rotation);
    let m = math::translate(m, local.translation);
    math::scale(m, local.scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_mat_close(a: Mat4, b: Mat4) {
        assert!(a.abs_diff_eq(b, 1e-2), "\n{:?}\n!=\n{:?}", a, b);
    }

    #[test]
    fn plain_matrix_scales_then_rotates_then_translates() {
        let t = Transform::new()
            .position(Vec3::new(10.0, 0.0, 0.0))
            .euler(0.0, std::f32::consts::FRAC_PI_2, 0.0)
            .scale(Vec3::new(2.0, 1.0, 1.0));
        let p = t.matrix().transform_point3(Vec3::X);
        // (1,0,0) -> (2,0,0) -> (0,0,-2) -> (10,0,-2)
        assert!((p - Vec3::new(10.0, 0.0, -2.0)).length() < 1e-4);
    }

    #[test]
    fn plain_matrix_reflects_mutation_immediately() {
        let mut t = Transform::new();
        let before = t.matrix();
        t.translation.y = 4.0;
        assert_ne!(before, t.matrix());
        assert_eq!(t.matrix().w_axis, Vec4::new(0.0, 4.0, 0.0, 1.0));
    }

    #[test]
    fn skybox_ignores_translation() {
        let t = Transform::new()
            .position(Vec3::new(500.0, 20.0, -3.0))
            .euler(0.2, 0.1, 0.0)
            .uniform_scale(2.0);
        let m = skybox_matrix(&t);
        assert_eq!(m.w_axis, Vec4::W);
        assert_mat_close(m, t.rotation * Mat4::from_scale(Vec3::splat(2.0)));
    }

    #[test]
    fn rotation_only_view_keeps_orientation() {
        let mut cam = Camera::new().at(Vec3::new(1.0, 2.0, 3.0));
        cam.set_orientation(0.4, 0.2, 0.0);
        let v = rotation_only(cam.view_matrix());
        assert_eq!(v.w_axis, Vec4::W);
        assert_mat_close(v, cam.rotation_matrix());
    }

    #[test]
    fn billboard_faces_the_viewer() {
        let mut cam = Camera::new().at(Vec3::new(-40.0, 15.0, 60.0));
        cam.set_orientation(0.9, 0.3, 0.0);
        let view = cam.view_matrix();

        let anchor = Transform::new()
            .position(Vec3::new(100.0, 50.0, 0.0))
            .euler(0.5, 1.0, 0.2)
            .uniform_scale(3.0);
        let m = billboard_matrix(view, anchor.matrix(), &Transform::new());

        // In view space the billboard has no rotation left, only scale.
        let in_view = view * m;
        let expected = Mat4::from_cols(
            Vec4::new(3.0, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 3.0, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 3.0, 0.0),
            (view * anchor.matrix()).w_axis,
        );
        assert_mat_close(in_view, expected);
        // And it sits where the anchor is.
        assert!((m.w_axis.truncate() - anchor.translation).length() < 1e-2);
    }

    #[test]
    fn locked_object_is_static_in_view_space() {
        let local = Transform::new()
            .position(Vec3::new(6.0, -3.0, 2.25))
            .euler(0.0, 105f32.to_radians(), 20f32.to_radians())
            .uniform_scale(0.42);

        let mut cam = Camera::new().at(Vec3::new(12.0, 30.0, -8.0));
        let first = cam.view_matrix() * locked_matrix(&cam, &local);

        cam.yaw(0.8);
        cam.pitch(-0.3);
        cam.roll(0.1);
        cam.advance(25.0, None);
        let second = cam.view_matrix() * locked_matrix(&cam, &local);

        assert_mat_close(first, second);
        let expected = local.rotation
            * Mat4::from_translation(local.translation)
            * Mat4::from_scale(local.scale);
        assert_mat_close(first, expected);
    }
}
