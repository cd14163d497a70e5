//! First-person controls.
//!
//! Translates semantic input (held movement keys, pointer deltas, button
//! presses, device orientation) into camera motion and object dragging.
//! Platform events are mapped to these calls by the host app.
//!
//! While no object is grabbed, pointer motion turns the camera. Pressing the
//! button arms picking; the first object picked during that press is grabbed
//! and pointer motion rotates it instead, until the button is released.

use glam::Mat4;
use hecs::Entity;
use winit::keyboard::KeyCode;

use crate::camera::Camera;
use crate::config::ControlsConfig;
use crate::math;
use crate::picking::PickEvent;
use crate::scene::Scene;
use crate::transform::Transform;

/// Walking direction bound to a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MoveDirection {
    Forward,
    Back,
    Left,
    Right,
}

impl MoveDirection {
    /// W/S/A/D.
    pub fn from_key(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::KeyW => Some(Self::Forward),
            KeyCode::KeyS => Some(Self::Back),
            KeyCode::KeyA => Some(Self::Left),
            KeyCode::KeyD => Some(Self::Right),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Held {
    forward: bool,
    back: bool,
    left: bool,
    right: bool,
}

impl Held {
    fn set(&mut self, direction: MoveDirection, down: bool) {
        match direction {
            MoveDirection::Forward => self.forward = down,
            MoveDirection::Back => self.back = down,
            MoveDirection::Left => self.left = down,
            MoveDirection::Right => self.right = down,
        }
    }

    fn axis(positive: bool, negative: bool) -> f32 {
        positive as i32 as f32 - negative as i32 as f32
    }
}

/// Input state for walking, looking and dragging.
#[derive(Debug)]
pub struct Controls {
    pub config: ControlsConfig,
    held: Held,
    shift: bool,
    picking_armed: bool,
    grabbed: Option<Entity>,
}

impl Controls {
    pub fn new(config: ControlsConfig) -> Self {
        Self {
            config,
            held: Held::default(),
            shift: false,
            picking_armed: false,
            grabbed: None,
        }
    }

    /// Records a key press. Returns true if the key is bound.
    pub fn key_down(&mut self, key: KeyCode) -> bool {
        self.key(key, true)
    }

    /// Records a key release. Returns true if the key is bound.
    pub fn key_up(&mut self, key: KeyCode) -> bool {
        self.key(key, false)
    }

    fn key(&mut self, key: KeyCode, down: bool) -> bool {
        if matches!(key, KeyCode::ShiftLeft | KeyCode::ShiftRight) {
            self.shift = down;
            return true;
        }
        match MoveDirection::from_key(key) {
            Some(direction) => {
                self.held.set(direction, down);
                true
            }
            None => false,
        }
    }

    pub fn running(&self) -> bool {
        self.shift
    }

    /// Tick handler body: walks the camera for `delta_ms` of held keys.
    ///
    /// Runs even with nothing held so the camera keeps hugging the terrain.
    pub fn apply_movement(&self, scene: &mut Scene, delta_ms: f64) {
        let mut distance = self.config.speed_per_ms * delta_ms as f32;
        if self.shift {
            distance *= self.config.run_multiplier;
        }
        let held = self.held;
        scene.advance_camera(distance * Held::axis(held.forward, held.back));
        scene.strafe_camera(distance * Held::axis(held.right, held.left));
    }

    /// Pointer motion in pixels while the cursor is captured.
    pub fn pointer_moved(&mut self, scene: &mut Scene, dx: f32, dy: f32) {
        let s = self.config.sensitivity;
        let Some(entity) = self.grabbed else {
            scene.camera.yaw(-dx * s);
            scene.camera.pitch(-dy * s);
            return;
        };
        match scene.world.get::<&mut Transform>(entity) {
            Ok(mut transform) => {
                transform.rotation = drag_rotation(transform.rotation, dx * s, dy * s, self.shift);
            }
            Err(_) => self.grabbed = None,
        }
    }

    /// Pointer button pressed: arm picking for the next frames.
    pub fn press(&mut self) {
        self.picking_armed = true;
    }

    /// Pointer button released: disarm and drop whatever was grabbed.
    pub fn release(&mut self) {
        self.picking_armed = false;
        self.grabbed = None;
    }

    pub fn picking_armed(&self) -> bool {
        self.picking_armed
    }

    pub fn grabbed(&self) -> Option<Entity> {
        self.grabbed
    }

    /// Grabs the first object picked during an armed press.
    pub fn on_pick_events(&mut self, events: &[PickEvent]) {
        if !self.picking_armed || self.grabbed.is_some() {
            return;
        }
        self.grabbed = events.iter().find_map(|event| match event {
            PickEvent::Picked(entity) => Some(*entity),
            PickEvent::Unpicked(_) => None,
        });
        if let Some(entity) = self.grabbed {
            log::info!("grabbed {:?}", entity);
        }
    }
}

/// Accumulates a drag into an object's rotation.
///
/// Horizontal motion turns the object about its own up axis and vertical
/// motion about its own right axis. With `roll` set, horizontal motion spins
/// it about its own forward axis instead.
pub fn drag_rotation(rotation: Mat4, x: f32, y: f32, roll: bool) -> Mat4 {
    if roll {
        let r = rotation.to_cols_array();
        return math::rotate(rotation, r[2] * x, r[6] * x, r[10] * x);
    }
    let r = rotation.to_cols_array();
    let rotation = math::rotate(rotation, r[1] * x, r[5] * x, r[9] * x);
    let r = rotation.to_cols_array();
    math::rotate(rotation, r[0] * y, r[4] * y, r[8] * y)
}

/// Applies device orientation angles in degrees.
///
/// Alpha (compass heading) drives yaw. Pitch comes from gamma, measured from
/// the upright position on either side of the flat orientation. Beta is
/// unused and roll is left alone.
pub fn device_orientation(camera: &mut Camera, alpha: f32, _beta: f32, gamma: f32) {
    let yaw = math::deg_to_rad(-alpha);
    let pitch = if gamma > 0.0 {
        math::deg_to_rad(90.0 - gamma)
    } else {
        math::deg_to_rad(270.0 - gamma)
    };
    let roll = camera.orientation.roll;
    camera.set_orientation(yaw, pitch, roll);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::MeshId;
    use crate::scene::SceneNode;
    use glam::Vec3;
    use std::f32::consts::PI;

    fn controls() -> Controls {
        Controls::new(ControlsConfig::default())
    }

    #[test]
    fn wasd_are_bound() {
        assert_eq!(MoveDirection::from_key(KeyCode::KeyW), Some(MoveDirection::Forward));
        assert_eq!(MoveDirection::from_key(KeyCode::KeyD), Some(MoveDirection::Right));
        assert_eq!(MoveDirection::from_key(KeyCode::KeyQ), None);
        assert!(!controls().key_down(KeyCode::Space));
    }

    #[test]
    fn held_keys_walk_at_configured_speed() {
        let mut scene = Scene::new();
        let mut c = controls();
        c.key_down(KeyCode::KeyW);
        c.apply_movement(&mut scene, 100.0);
        assert!((scene.camera.eye_position() - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-4);

        c.key_down(KeyCode::ShiftLeft);
        c.key_up(KeyCode::KeyW);
        c.key_down(KeyCode::KeyA);
        c.apply_movement(&mut scene, 100.0);
        assert!((scene.camera.eye_position() - Vec3::new(-20.0, 0.0, -5.0)).length() < 1e-4);
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut scene = Scene::new();
        let mut c = controls();
        c.key_down(KeyCode::KeyW);
        c.key_down(KeyCode::KeyS);
        c.apply_movement(&mut scene, 100.0);
        assert!(scene.camera.eye_position().length() < 1e-5);
    }

    #[test]
    fn pointer_turns_the_camera_when_nothing_is_grabbed() {
        let mut scene = Scene::new();
        let mut c = controls();
        c.pointer_moved(&mut scene, 10.0, 0.0);
        assert!((scene.camera.orientation.yaw - 0.04).abs() < 1e-6);
    }

    #[test]
    fn press_pick_drag_release() {
        let mut scene = Scene::new();
        let cube = scene.spawn_pickable(SceneNode::new(MeshId(0))).unwrap();
        let mut c = controls();

        // Picks outside a press are ignored.
        c.on_pick_events(&[PickEvent::Picked(cube)]);
        assert_eq!(c.grabbed(), None);

        c.press();
        c.on_pick_events(&[PickEvent::Picked(cube)]);
        assert_eq!(c.grabbed(), Some(cube));

        let yaw_before = scene.camera.orientation.yaw;
        c.pointer_moved(&mut scene, 100.0, 0.0);
        assert_eq!(scene.camera.orientation.yaw, yaw_before);
        let rotation = scene.world.get::<&Transform>(cube).unwrap().rotation;
        assert!(rotation.abs_diff_eq(math::y_rotation(0.4), 1e-5));

        c.release();
        assert_eq!(c.grabbed(), None);
        assert!(!c.picking_armed());
    }

    #[test]
    fn shift_drag_rolls() {
        let r = drag_rotation(Mat4::IDENTITY, 0.3, 5.0, true);
        assert!(r.abs_diff_eq(math::z_rotation(0.3), 1e-6));
    }

    #[test]
    fn drag_accumulates_instead_of_replacing() {
        let once = drag_rotation(Mat4::IDENTITY, 0.2, 0.0, false);
        let twice = drag_rotation(once, 0.2, 0.0, false);
        assert!(twice.abs_diff_eq(math::y_rotation(0.4), 1e-5));
    }

    #[test]
    fn device_orientation_sets_yaw_and_pitch() {
        let mut cam = Camera::new();
        device_orientation(&mut cam, 90.0, 0.0, 30.0);
        assert!((cam.orientation.yaw - 1.5 * PI).abs() < 1e-5);
        assert!((cam.orientation.pitch - 60f32.to_radians()).abs() < 1e-5);

        device_orientation(&mut cam, 0.0, 0.0, -30.0);
        assert!((cam.orientation.pitch - 300f32.to_radians()).abs() < 1e-5);
    }
}
