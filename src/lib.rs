//! # Lunar Walk
//!
//! **A first-person scene renderer: heightfield terrain, colour-id picking and
//! side-by-side stereo on wgpu.**
//!
//! Load a heightmap, drop in a few objects, and walk over the surface. Objects
//! under the crosshair can be picked and dragged; skyboxes, billboards and
//! camera-locked objects are placement variants of the same scene node.
//!
//! ## Quick Start
//!
//! ```no_run
//! use lunar_walk::*;
//!
//! fn main() -> Result<(), SceneError> {
//!     run_with_config(AppConfig::new().title("Demo").fps(30.0), |ctx| {
//!         let cube = ctx.mesh_cube();
//!         let node = SceneNode::new(cube)
//!             .transform(Transform::from_position(Vec3::new(0.0, 0.0, -10.0)));
//!         let entity = ctx.scene.spawn_pickable(node)?;
//!         ctx.scene.set_pick_handlers(
//!             entity,
//!             PickHandlers::new().on_pick(|e| log::info!("picked {:?}", e)),
//!         );
//!         Ok(())
//!     })
//! }
//! ```
//!
//! ## Layout
//!
//! - **Pure scene logic** (`math`, `Transform`, `Heightfield`, `Camera`,
//!   `Scene`, `Compositor`, `Scheduler`, `Controls`) has no GPU dependency and
//!   is tested on its own.
//! - **GPU side** (`GpuContext`, `Renderer`, `MeshPass`, `PickPass`) implements
//!   the [`PickTarget`] and [`FrameTarget`] traits the compositor drives.
//! - **Host** (`run_with_config`) owns the winit event loop.

mod app;
mod assets;
mod camera;
mod compositor;
mod config;
mod controls;
mod ecs;
mod error;
mod geometry;
mod gpu;
mod input;
pub mod math;
mod mesh;
mod mesh_pass;
mod pick_pass;
mod picking;
mod renderer;
mod scene;
mod scheduler;
mod terrain;
mod texture;
mod transform;

pub use app::{SetupContext, run, run_with_config};
pub use assets::{LoadProgress, Pixels, ResourceData, ResourceKind, ResourceLoader, Resources};
pub use camera::{Camera, DEFAULT_HEIGHT_OFFSET, HeightQuery, Orientation, wrap_angle};
pub use compositor::{
    Compositor, DrawCommand, Eye, EyePass, FrameTarget, Projection, StereoConfig, Viewport,
    stereo_frustums,
};
pub use config::{AppConfig, AssetsConfig, ControlsConfig, TextureSet};
pub use controls::{Controls, MoveDirection, device_orientation, drag_rotation};
pub use ecs::{Material, MeshId, Renderable, Shading, TextureId};
pub use error::SceneError;
pub use geometry::{GeometryError, PendingGeometry, RawGeometry, parse_obj};
pub use gpu::GpuContext;
pub use input::{CursorRequest, Input, InputEvent};
pub use mesh::{Mesh, Vertex3d};
pub use mesh_pass::MeshPass;
pub use pick_pass::PickPass;
pub use picking::{
    IdDraw, MAX_PICK_ID, PICK_ID_STRIDE, PickEvent, PickHandlers, PickId, PickIdAllocator,
    PickTarget, Pickable, crosshair, pick_pass, resolve,
};
pub use renderer::Renderer;
pub use scene::{DEFAULT_LIGHT_POSITION, Scene, SceneNode};
pub use scheduler::{FrameThrottle, Scheduler};
pub use terrain::{BitDepth, Heightfield, TerrainState, TerrainView};
pub use texture::{ColorSpace, Texture};
pub use transform::{
    Placement, Transform, billboard_matrix, locked_matrix, rotation_only, skybox_matrix,
};

// Re-export glam math types for convenience
pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

// Re-export commonly used winit types for convenience
pub use winit::keyboard::KeyCode;

// ECS storage
pub use hecs::{Entity, World};
