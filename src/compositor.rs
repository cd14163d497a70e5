//! Per-frame composition: projections, eyes, pick pass, then the main pass.
//!
//! The [`Compositor`] turns the scene into one [`EyePass`] per eye and hands
//! them to a [`FrameTarget`]. When picking is armed, the pick pass runs first
//! against the same target and its output is cleared before anything is
//! presented.
//!
//! # Stereo
//!
//! With [`StereoConfig::enabled`] the surface is split in two side-by-side
//! viewports. Each eye gets an asymmetric frustum converging at
//! `convergence` units in front of the camera; the right eye renders with the
//! camera strafed by half the eye separation, and the camera is put back
//! before [`Compositor::render`] returns.

use glam::{Mat4, Vec3};

use crate::ecs::{Material, MeshId, Shading};
use crate::error::SceneError;
use crate::math;
use crate::picking::{PickEvent, PickTarget, crosshair};
use crate::scene::Scene;

/// Pixel rectangle of a render target, top-left origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Covers a whole `width × height` target.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

/// Perspective parameters shared by every eye.
#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct Projection {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov: 60.0,
            near: 1.0,
            far: 7000.0,
        }
    }
}

/// Side-by-side stereo settings.
#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct StereoConfig {
    pub enabled: bool,
    /// Distance between the eyes in world units.
    pub eye_separation: f32,
    /// Distance to the zero-parallax plane.
    pub convergence: f32,
}

impl Default for StereoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            eye_separation: 1.0,
            convergence: 50.0,
        }
    }
}

/// Off-axis projections for the left and right eye.
///
/// `aspect` is the aspect ratio of one eye's viewport.
pub fn stereo_frustums(projection: Projection, stereo: StereoConfig, aspect: f32) -> [Mat4; 2] {
    let Projection { fov, near, far } = projection;
    let half_tan = (math::deg_to_rad(fov) / 2.0).tan();
    let top = near * half_tan;
    let convergence = stereo.convergence.max(near);

    let a = aspect * half_tan * convergence;
    let b = a - stereo.eye_separation / 2.0;
    let c = a + stereo.eye_separation / 2.0;
    let k = near / convergence;

    [
        math::frustum(-b * k, c * k, -top, top, near, far),
        math::frustum(-c * k, b * k, -top, top, near, far),
    ]
}

/// One mesh draw in an eye pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCommand {
    pub mesh: MeshId,
    pub shading: Shading,
    pub material: Material,
    pub model: Mat4,
}

/// Everything a target needs to draw one eye.
#[derive(Clone, Debug, PartialEq)]
pub struct EyePass {
    pub viewport: Viewport,
    pub projection: Mat4,
    pub view: Mat4,
    /// View without translation, for skyboxes.
    pub sky_view: Mat4,
    pub camera_position: Vec3,
    pub light_position: Vec3,
    pub draws: Vec<DrawCommand>,
}

/// A surface the compositor can draw frames on.
pub trait FrameTarget: PickTarget {
    /// Matches the drawable size to the host window. Zero sizes are ignored.
    fn resize(&mut self, width: u32, height: u32);

    /// Clears, draws every eye and presents.
    fn present(&mut self, eyes: &[EyePass]) -> Result<(), SceneError>;
}

/// Projection and eye layout of a frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct Compositor {
    pub projection: Projection,
    pub stereo: StereoConfig,
}

/// Viewport, projection and lateral camera offset of one eye.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Eye {
    pub viewport: Viewport,
    pub projection: Mat4,
    pub offset: f32,
}

impl Compositor {
    pub fn new(projection: Projection, stereo: StereoConfig) -> Self {
        Self { projection, stereo }
    }

    /// Eye layout for a `width × height` surface.
    pub fn eyes(&self, width: u32, height: u32) -> Vec<Eye> {
        if !self.stereo.enabled {
            let viewport = Viewport::full(width, height);
            let Projection { fov, near, far } = self.projection;
            let projection = math::perspective(math::deg_to_rad(fov), viewport.aspect(), near, far);
            return vec![Eye {
                viewport,
                projection,
                offset: 0.0,
            }];
        }

        let half = width / 2;
        let left = Viewport {
            x: 0,
            y: 0,
            width: half,
            height,
        };
        let right = Viewport { x: half, ..left };
        let [left_proj, right_proj] = stereo_frustums(self.projection, self.stereo, left.aspect());
        vec![
            Eye {
                viewport: left,
                projection: left_proj,
                offset: 0.0,
            },
            Eye {
                viewport: right,
                projection: right_proj,
                offset: self.stereo.eye_separation / 2.0,
            },
        ]
    }

    /// Renders one frame: resize, optional pick pass, then every eye.
    ///
    /// Returns the pick events of this frame. The camera is left exactly as it
    /// was found.
    pub fn render<T: FrameTarget + ?Sized>(
        &self,
        scene: &mut Scene,
        target: &mut T,
        width: u32,
        height: u32,
        picking: bool,
    ) -> Result<Vec<PickEvent>, SceneError> {
        target.resize(width, height);
        let eyes = self.eyes(width, height);

        let mut events = Vec::new();
        if picking {
            if let Some(first) = eyes.first() {
                let pixel = crosshair(width, height, self.stereo.enabled);
                events = scene.run_pick_pass(&mut *target, first.viewport, pixel, first.projection)?;
            }
        }

        let mut passes = Vec::with_capacity(eyes.len());
        for eye in &eyes {
            let saved = scene.camera.translation;
            if eye.offset != 0.0 {
                scene.camera.strafe(eye.offset, None);
            }
            passes.push(scene.eye_pass(eye.viewport, eye.projection));
            scene.camera.translation = saved;
        }

        target.present(&passes)?;
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picking::tests::SplatTarget;
    use crate::picking::IdDraw;
    use crate::scene::SceneNode;
    use crate::transform::Transform;

    /// Splat pick target that also records what reached it.
    struct RecordingTarget {
        ids: SplatTarget,
        log: Vec<String>,
        presented: Vec<EyePass>,
    }

    impl RecordingTarget {
        fn new() -> Self {
            Self {
                ids: SplatTarget::new(200, 100),
                log: Vec::new(),
                presented: Vec::new(),
            }
        }
    }

    impl PickTarget for RecordingTarget {
        fn clear_ids(&mut self, viewport: Viewport) -> Result<(), SceneError> {
            self.log.push("clear_ids".into());
            self.ids.clear_ids(viewport)
        }

        fn draw_id(&mut self, draw: &IdDraw) -> Result<(), SceneError> {
            self.log.push("draw_id".into());
            self.ids.draw_id(draw)
        }

        fn read_pixel(&mut self, x: u32, y: u32) -> Result<[u8; 4], SceneError> {
            self.log.push(format!("read {} {}", x, y));
            self.ids.read_pixel(x, y)
        }
    }

    impl FrameTarget for RecordingTarget {
        fn resize(&mut self, width: u32, height: u32) {
            self.log.push(format!("resize {}x{}", width, height));
        }

        fn present(&mut self, eyes: &[EyePass]) -> Result<(), SceneError> {
            self.log.push(format!("present {}", eyes.len()));
            self.presented = eyes.to_vec();
            Ok(())
        }
    }

    fn scene_with_cube() -> Scene {
        let mut scene = Scene::new();
        let node = SceneNode::new(MeshId(0))
            .transform(Transform::from_position(Vec3::new(0.0, 0.0, -20.0)));
        scene.spawn_pickable(node).unwrap();
        scene
    }

    #[test]
    fn zero_separation_matches_symmetric_perspective() {
        let projection = Projection::default();
        let stereo = StereoConfig {
            enabled: true,
            eye_separation: 0.0,
            convergence: 50.0,
        };
        let [left, right] = stereo_frustums(projection, stereo, 1.5);
        let expected = math::perspective(math::deg_to_rad(60.0), 1.5, 1.0, 7000.0);
        assert!(left.abs_diff_eq(expected, 1e-4));
        assert!(right.abs_diff_eq(expected, 1e-4));
    }

    #[test]
    fn eye_frustums_mirror_each_other() {
        let stereo = StereoConfig {
            enabled: true,
            eye_separation: 6.0,
            convergence: 50.0,
        };
        let [left, right] = stereo_frustums(Projection::default(), stereo, 1.0);
        // Off-axis shift lives in the third column, x row.
        assert!(left.z_axis.x > 0.0);
        assert!((left.z_axis.x + right.z_axis.x).abs() < 1e-6);
    }

    #[test]
    fn mono_frame_picks_then_presents() {
        let mut scene = scene_with_cube();
        let mut target = RecordingTarget::new();
        let compositor = Compositor::default();

        let events = compositor.render(&mut scene, &mut target, 200, 100, true).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            target.log,
            vec!["resize 200x100", "clear_ids", "draw_id", "read 100 50", "present 1"]
        );
        assert_eq!(target.presented[0].draws.len(), 1);
    }

    #[test]
    fn unarmed_frame_skips_the_pick_pass() {
        let mut scene = scene_with_cube();
        let mut target = RecordingTarget::new();
        Compositor::default()
            .render(&mut scene, &mut target, 200, 100, false)
            .unwrap();
        assert_eq!(target.log, vec!["resize 200x100", "present 1"]);
    }

    #[test]
    fn stereo_frame_offsets_second_eye_and_restores_camera() {
        let mut scene = scene_with_cube();
        scene.camera = crate::camera::Camera::new().at(Vec3::new(1.0, 2.0, 3.0));
        let before = scene.camera.translation;
        let mut target = RecordingTarget::new();
        let compositor = Compositor::new(
            Projection::default(),
            StereoConfig {
                enabled: true,
                eye_separation: 4.0,
                convergence: 50.0,
            },
        );

        compositor.render(&mut scene, &mut target, 200, 100, true).unwrap();
        assert_eq!(scene.camera.translation, before);
        assert!(target.log.contains(&"read 50 50".to_string()));

        let [left, right] = [&target.presented[0], &target.presented[1]];
        assert_eq!(left.viewport, Viewport { x: 0, y: 0, width: 100, height: 100 });
        assert_eq!(right.viewport, Viewport { x: 100, y: 0, width: 100, height: 100 });
        let shift = right.camera_position - left.camera_position;
        assert!((shift - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-4);
    }
}
