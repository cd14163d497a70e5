use std::collections::HashSet;

use winit::event::{DeviceEvent, ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::controls::{self, Controls};
use crate::scene::Scene;

/// Platform-independent input, translated from winit events.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    Key { key: KeyCode, pressed: bool },
    /// Primary pointer button.
    Button { pressed: bool },
    /// Relative pointer motion in pixels.
    PointerMotion { dx: f32, dy: f32 },
    /// Device orientation angles in degrees.
    Orientation { alpha: f32, beta: f32, gamma: f32 },
    FocusLost,
}

/// What the host should do with the OS cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorRequest {
    Grab,
    Release,
}

/// Tracks held keys and cursor capture, and feeds [`Controls`].
#[derive(Debug, Default)]
pub struct Input {
    keys_down: HashSet<KeyCode>,
    button_down: bool,
    cursor_grabbed: bool,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translates a window event. Events that carry no input return `None`.
    pub fn from_window_event(event: &WindowEvent) -> Option<InputEvent> {
        match event {
            WindowEvent::KeyboardInput { event, .. } => match event.physical_key {
                PhysicalKey::Code(key) => Some(InputEvent::Key {
                    key,
                    pressed: event.state == ElementState::Pressed,
                }),
                PhysicalKey::Unidentified(_) => None,
            },
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => Some(InputEvent::Button {
                pressed: *state == ElementState::Pressed,
            }),
            WindowEvent::Focused(false) => Some(InputEvent::FocusLost),
            _ => None,
        }
    }

    /// Translates raw device motion, which keeps coming while the cursor is
    /// locked.
    pub fn from_device_event(event: &DeviceEvent) -> Option<InputEvent> {
        match event {
            DeviceEvent::MouseMotion { delta: (dx, dy) } => Some(InputEvent::PointerMotion {
                dx: *dx as f32,
                dy: *dy as f32,
            }),
            _ => None,
        }
    }

    /// Applies one event to the controls and the scene camera.
    pub fn apply(
        &mut self,
        event: InputEvent,
        controls: &mut Controls,
        scene: &mut Scene,
    ) -> Option<CursorRequest> {
        match event {
            InputEvent::Key {
                key: KeyCode::Escape,
                pressed: true,
            } => {
                controls.release();
                self.button_down = false;
                if self.cursor_grabbed {
                    self.cursor_grabbed = false;
                    return Some(CursorRequest::Release);
                }
            }
            InputEvent::Key { key, pressed: true } => {
                // Auto-repeat delivers presses for keys already down.
                if self.keys_down.insert(key) {
                    controls.key_down(key);
                }
            }
            InputEvent::Key { key, pressed: false } => {
                self.keys_down.remove(&key);
                controls.key_up(key);
            }
            InputEvent::Button { pressed: true } => {
                self.button_down = true;
                controls.press();
                if !self.cursor_grabbed {
                    self.cursor_grabbed = true;
                    return Some(CursorRequest::Grab);
                }
            }
            InputEvent::Button { pressed: false } => {
                self.button_down = false;
                controls.release();
            }
            InputEvent::PointerMotion { dx, dy } => {
                if self.cursor_grabbed {
                    controls.pointer_moved(scene, dx, dy);
                }
            }
            InputEvent::Orientation { alpha, beta, gamma } => {
                controls::device_orientation(&mut scene.camera, alpha, beta, gamma);
            }
            InputEvent::FocusLost => {
                for key in self.keys_down.drain() {
                    controls.key_up(key);
                }
                self.button_down = false;
                controls.release();
                if self.cursor_grabbed {
                    self.cursor_grabbed = false;
                    return Some(CursorRequest::Release);
                }
            }
        }
        None
    }

    /// The host could not lock the cursor; motion will not be applied.
    pub fn cursor_grab_failed(&mut self) {
        self.cursor_grabbed = false;
    }

    /// Returns true if the key is currently held down.
    pub fn key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn button_down(&self) -> bool {
        self.button_down
    }

    pub fn cursor_grabbed(&self) -> bool {
        self.cursor_grabbed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControlsConfig;
    use glam::Vec3;

    fn setup() -> (Input, Controls, Scene) {
        (Input::new(), Controls::new(ControlsConfig::default()), Scene::new())
    }

    #[test]
    fn click_grabs_cursor_and_arms_picking() {
        let (mut input, mut controls, mut scene) = setup();
        let request = input.apply(InputEvent::Button { pressed: true }, &mut controls, &mut scene);
        assert_eq!(request, Some(CursorRequest::Grab));
        assert!(controls.picking_armed());

        // A second click while grabbed only arms again.
        input.apply(InputEvent::Button { pressed: false }, &mut controls, &mut scene);
        assert!(!controls.picking_armed());
        let request = input.apply(InputEvent::Button { pressed: true }, &mut controls, &mut scene);
        assert_eq!(request, None);
    }

    #[test]
    fn escape_releases_the_cursor() {
        let (mut input, mut controls, mut scene) = setup();
        input.apply(InputEvent::Button { pressed: true }, &mut controls, &mut scene);
        let escape = InputEvent::Key {
            key: KeyCode::Escape,
            pressed: true,
        };
        assert_eq!(
            input.apply(escape, &mut controls, &mut scene),
            Some(CursorRequest::Release)
        );
        assert!(!input.cursor_grabbed());
        assert!(!controls.picking_armed());
        assert_eq!(input.apply(escape, &mut controls, &mut scene), None);
    }

    #[test]
    fn motion_only_looks_while_grabbed() {
        let (mut input, mut controls, mut scene) = setup();
        let motion = InputEvent::PointerMotion { dx: 10.0, dy: 0.0 };
        input.apply(motion, &mut controls, &mut scene);
        assert_eq!(scene.camera.orientation.yaw, 0.0);

        input.apply(InputEvent::Button { pressed: true }, &mut controls, &mut scene);
        input.apply(motion, &mut controls, &mut scene);
        assert!(scene.camera.orientation.yaw != 0.0);
    }

    #[test]
    fn held_keys_survive_repeats_and_clear_on_focus_loss() {
        let (mut input, mut controls, mut scene) = setup();
        let w = InputEvent::Key {
            key: KeyCode::KeyW,
            pressed: true,
        };
        input.apply(w, &mut controls, &mut scene);
        input.apply(w, &mut controls, &mut scene);
        assert!(input.key_down(KeyCode::KeyW));

        input.apply(InputEvent::FocusLost, &mut controls, &mut scene);
        assert!(!input.key_down(KeyCode::KeyW));
        controls.apply_movement(&mut scene, 100.0);
        assert_eq!(scene.camera.eye_position(), Vec3::ZERO);
    }

    #[test]
    fn orientation_drives_the_camera() {
        let (mut input, mut controls, mut scene) = setup();
        input.apply(
            InputEvent::Orientation {
                alpha: 0.0,
                beta: 0.0,
                gamma: 90.0,
            },
            &mut controls,
            &mut scene,
        );
        assert!(scene.camera.orientation.pitch.abs() < 1e-6);
    }
}
