//! First-person camera controller.
//!
//! The camera stores its placement the way the view transform wants it:
//! [`Camera::translation`] is the *negated* eye position, and the view matrix
//! is simply `rotation(pitch, yaw, roll) · translate(translation)`. Nothing is
//! inverted per frame.
//!
//! Orientation angles are kept wrapped into `[0, 2π)`. Mouse look feeds deltas
//! through [`Camera::yaw`] / [`Camera::pitch`], which subtract, so positive
//! screen-space motion passed in negated turns right and looks down.
//!
//! Locomotion is planar. [`Camera::advance`] and [`Camera::strafe`] move along
//! the ground plane from the current yaw and, given a [`HeightQuery`], snap
//! the eye to `height_offset` above the surface in the same call.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::{Mat4, Vec3};

use crate::math;

/// Default eye height above the terrain surface.
pub const DEFAULT_HEIGHT_OFFSET: f32 = 20.0;

/// A surface the camera can stand on.
pub trait HeightQuery {
    /// World-space surface height at world `(x, z)`.
    fn height(&self, x: f32, z: f32) -> f32;
}

/// Euler orientation in radians, each angle wrapped into `[0, 2π)`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Orientation {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// Wraps an angle into `[0, 2π)`, normalising negative remainders.
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU { 0.0 } else { wrapped }
}

/// First-person camera with terrain-following movement.
#[derive(Clone, Debug)]
pub struct Camera {
    /// Negated eye position.
    pub translation: Vec3,
    pub orientation: Orientation,
    /// Distance kept between the eye and the surface under it.
    pub height_offset: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            orientation: Orientation::default(),
            height_offset: DEFAULT_HEIGHT_OFFSET,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places the eye at a world position.
    pub fn at(mut self, eye: Vec3) -> Self {
        self.translation = -eye;
        self
    }

    pub fn height_offset(mut self, offset: f32) -> Self {
        self.height_offset = offset;
        self
    }

    pub fn eye_position(&self) -> Vec3 {
        -self.translation
    }

    pub fn yaw(&mut self, delta: f32) {
        self.orientation.yaw = wrap_angle(self.orientation.yaw - delta);
    }

    pub fn pitch(&mut self, delta: f32) {
        self.orientation.pitch = wrap_angle(self.orientation.pitch - delta);
    }

    pub fn roll(&mut self, delta: f32) {
        self.orientation.roll = wrap_angle(self.orientation.roll - delta);
    }

    /// Sets all three angles at once, wrapping each.
    pub fn set_orientation(&mut self, yaw: f32, pitch: f32, roll: f32) {
        self.orientation = Orientation {
            yaw: wrap_angle(yaw),
            pitch: wrap_angle(pitch),
            roll: wrap_angle(roll),
        };
    }

    /// Moves along the yaw-facing direction. Positive distances go forward.
    pub fn advance(&mut self, distance: f32, terrain: Option<&dyn HeightQuery>) {
        let angle = self.orientation.yaw;
        self.step(angle, -distance, terrain);
    }

    /// Moves sideways. Positive distances go to the right.
    pub fn strafe(&mut self, distance: f32, terrain: Option<&dyn HeightQuery>) {
        let angle = self.orientation.yaw - FRAC_PI_2;
        self.step(angle, distance, terrain);
    }

    fn step(&mut self, angle: f32, distance: f32, terrain: Option<&dyn HeightQuery>) {
        self.translation.x -= (-angle).sin() * distance;
        self.translation.z -= (-angle).cos() * distance;
        if let Some(terrain) = terrain {
            self.snap_to(terrain);
        }
    }

    /// Puts the eye `height_offset` above the surface directly below it.
    pub fn snap_to(&mut self, terrain: &dyn HeightQuery) {
        let eye = self.eye_position();
        self.translation.y = -terrain.height(eye.x, eye.z) - self.height_offset;
    }

    /// `Rx(pitch) · Ry(yaw) · Rz(roll)`.
    pub fn rotation_matrix(&self) -> Mat4 {
        let o = self.orientation;
        math::rotation(o.pitch, o.yaw, o.roll)
    }

    /// World-to-camera transform.
    pub fn view_matrix(&self) -> Mat4 {
        math::translate(self.rotation_matrix(), self.translation)
    }

    /// Unit ground-plane direction the camera walks in.
    pub fn forward(&self) -> Vec3 {
        let yaw = self.orientation.yaw;
        Vec3::new(yaw.sin(), 0.0, -yaw.cos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;
    use std::f32::consts::PI;

    struct Slope;

    impl HeightQuery for Slope {
        fn height(&self, x: f32, z: f32) -> f32 {
            0.5 * x - 0.25 * z + 3.0
        }
    }

    fn angle_close(a: f32, b: f32) -> bool {
        let d = (a - b).abs();
        d < 1e-4 || (TAU - d).abs() < 1e-4
    }

    #[test]
    fn yaw_round_trip_restores_angle() {
        for theta in [0.3, -1.7, 4.0, 12.5, -20.0] {
            let mut cam = Camera::new();
            cam.set_orientation(1.0, 0.0, 0.0);
            cam.yaw(theta);
            cam.yaw(-theta);
            assert!(angle_close(cam.orientation.yaw, 1.0), "theta {}", theta);
        }
    }

    #[test]
    fn angles_stay_wrapped() {
        let mut cam = Camera::new();
        cam.pitch(0.5);
        assert!((cam.orientation.pitch - (TAU - 0.5)).abs() < 1e-5);
        cam.roll(-7.0);
        assert!(cam.orientation.roll >= 0.0 && cam.orientation.roll < TAU);
        assert_eq!(wrap_angle(-1e-9), 0.0);
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-5);
    }

    #[test]
    fn advance_follows_yaw() {
        let mut cam = Camera::new();
        cam.advance(10.0, None);
        assert!((cam.eye_position() - Vec3::new(0.0, 0.0, -10.0)).length() < 1e-4);

        let mut cam = Camera::new();
        cam.set_orientation(FRAC_PI_2, 0.0, 0.0);
        cam.advance(10.0, None);
        assert!((cam.eye_position() - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-4);
        assert!((cam.forward() - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn strafe_goes_right() {
        let mut cam = Camera::new();
        cam.strafe(5.0, None);
        assert!((cam.eye_position() - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-4);
        cam.strafe(-5.0, None);
        assert!(cam.eye_position().length() < 1e-4);
    }

    #[test]
    fn movement_snaps_to_terrain() {
        let mut cam = Camera::new().height_offset(20.0);
        cam.set_orientation(0.7, 0.0, 0.0);
        cam.advance(12.0, Some(&Slope));
        let eye = cam.eye_position();
        assert!((eye.y - (Slope.height(eye.x, eye.z) + 20.0)).abs() < 1e-4);

        cam.strafe(-3.0, Some(&Slope));
        let eye = cam.eye_position();
        assert!((eye.y - (Slope.height(eye.x, eye.z) + 20.0)).abs() < 1e-4);
    }

    #[test]
    fn view_matrix_puts_eye_at_origin_looking_down_negative_z() {
        let mut cam = Camera::new().at(Vec3::new(4.0, 9.0, -2.0));
        cam.set_orientation(1.1, 0.0, 0.0);
        let view = cam.view_matrix();

        let eye = view * cam.eye_position().extend(1.0);
        assert!(eye.truncate().length() < 1e-4);

        let ahead = view * (cam.eye_position() + cam.forward()).extend(1.0);
        assert!((ahead - Vec4::new(0.0, 0.0, -1.0, 1.0)).length() < 1e-4);
    }
}
