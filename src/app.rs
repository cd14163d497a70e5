use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{CursorGrabMode, Window, WindowAttributes, WindowId};

use crate::compositor::{Compositor, FrameTarget};
use crate::config::AppConfig;
use crate::controls::Controls;
use crate::ecs::MeshId;
use crate::error::SceneError;
use crate::geometry::RawGeometry;
use crate::gpu::GpuContext;
use crate::input::{CursorRequest, Input, InputEvent};
use crate::renderer::Renderer;
use crate::scene::Scene;
use crate::scheduler::Scheduler;

/// Context provided during app setup.
///
/// Upload meshes and textures through `renderer`, assemble `scene`, and add
/// per-tick behaviour to `scheduler`. Movement controls are already
/// registered.
pub struct SetupContext<'a> {
    pub renderer: &'a mut Renderer,
    pub scene: &'a mut Scene,
    pub scheduler: &'a mut Scheduler,
    pub config: &'a AppConfig,
}

impl SetupContext<'_> {
    /// Upload the built-in unit cube.
    pub fn mesh_cube(&mut self) -> MeshId {
        self.renderer.upload_geometry(&RawGeometry::cube())
    }

    /// Upload the built-in unit quad.
    pub fn mesh_quad(&mut self) -> MeshId {
        self.renderer.upload_geometry(&RawGeometry::quad())
    }
}

type SetupFn = Box<dyn FnOnce(&mut SetupContext) -> Result<(), SceneError>>;

/// Run a scene with the default configuration.
pub fn run<S>(setup: S) -> Result<(), SceneError>
where
    S: FnOnce(&mut SetupContext) -> Result<(), SceneError> + 'static,
{
    run_with_config(AppConfig::default(), setup)
}

/// Run a scene with custom configuration.
///
/// Creates the window, GPU context and scene, calls `setup` once, then renders
/// at the configured frame rate until the window closes. Start-up failures and
/// frame errors end the loop and are returned.
///
/// # Example
/// ```no_run
/// use lunar_walk::*;
///
/// run_with_config(AppConfig::new().title("Cube").fps(30.0), |ctx| {
///     let cube = ctx.mesh_cube();
///     ctx.scene.spawn(
///         SceneNode::new(cube).transform(Transform::from_position(Vec3::new(0.0, 0.0, -5.0))),
///     );
///     Ok(())
/// })?;
/// # Ok::<(), SceneError>(())
/// ```
pub fn run_with_config<S>(config: AppConfig, setup: S) -> Result<(), SceneError>
where
    S: FnOnce(&mut SetupContext) -> Result<(), SceneError> + 'static,
{
    let config = config.validate()?;
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = LunarApp {
        state: AppState::Pending {
            config,
            setup: Some(Box::new(setup)),
        },
        error: None,
    };

    event_loop.run_app(&mut app)?;
    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct Running {
    window: Arc<Window>,
    renderer: Renderer,
    scene: Scene,
    scheduler: Scheduler,
    compositor: Compositor,
    controls: Rc<RefCell<Controls>>,
    input: Input,
    start_time: Instant,
}

enum AppState {
    Pending {
        config: AppConfig,
        setup: Option<SetupFn>,
    },
    Running(Box<Running>),
    Finished,
}

struct LunarApp {
    state: AppState,
    error: Option<SceneError>,
}

impl LunarApp {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: SceneError) {
        log::error!("{}", error);
        if let AppState::Running(running) = &mut self.state {
            running.scheduler.stop();
        }
        self.state = AppState::Finished;
        self.error = Some(error);
        event_loop.exit();
    }
}

fn start(
    event_loop: &ActiveEventLoop,
    config: &AppConfig,
    setup: SetupFn,
) -> Result<Running, SceneError> {
    let window_attrs = WindowAttributes::default()
        .with_title(&config.title)
        .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

    let window = Arc::new(
        event_loop
            .create_window(window_attrs)
            .map_err(|e| SceneError::UnsupportedPlatform(format!("window: {}", e)))?,
    );
    let gpu = GpuContext::new(window.clone())?;
    let mut renderer = Renderer::new(gpu);
    let [r, g, b, a] = config.clear_color;
    renderer.clear_color = wgpu::Color { r, g, b, a };

    let mut scene = Scene::new();
    scene.camera.height_offset = config.height_offset;
    scene.light_position = config.light_position();

    let controls = Rc::new(RefCell::new(Controls::new(config.controls)));
    let mut scheduler = Scheduler::new(config.fps);
    let movement = Rc::clone(&controls);
    scheduler.on_tick(move |scene, delta| movement.borrow().apply_movement(scene, delta));

    setup(&mut SetupContext {
        renderer: &mut renderer,
        scene: &mut scene,
        scheduler: &mut scheduler,
        config,
    })?;

    let start_time = Instant::now();
    scheduler.start(0.0);
    window.request_redraw();

    Ok(Running {
        window,
        renderer,
        scene,
        scheduler,
        compositor: Compositor::new(config.projection, config.stereo),
        controls,
        input: Input::new(),
        start_time,
    })
}

impl Running {
    fn handle_input(&mut self, event: InputEvent) {
        let request = self
            .input
            .apply(event, &mut self.controls.borrow_mut(), &mut self.scene);
        match request {
            Some(CursorRequest::Grab) => {
                let grabbed = self
                    .window
                    .set_cursor_grab(CursorGrabMode::Locked)
                    .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined));
                match grabbed {
                    Ok(()) => self.window.set_cursor_visible(false),
                    Err(e) => {
                        log::warn!("cursor grab unavailable: {}", e);
                        self.input.cursor_grab_failed();
                    }
                }
            }
            Some(CursorRequest::Release) => {
                if let Err(e) = self.window.set_cursor_grab(CursorGrabMode::None) {
                    log::warn!("cursor release failed: {}", e);
                }
                self.window.set_cursor_visible(true);
            }
            None => {}
        }
    }

    fn redraw(&mut self) -> Result<(), SceneError> {
        let now = self.start_time.elapsed().as_secs_f64() * 1000.0;
        if self.scheduler.tick(&mut self.scene, now).is_some() {
            let size = self.window.inner_size();
            if size.width > 0 && size.height > 0 {
                let armed = self.controls.borrow().picking_armed();
                let events = self.compositor.render(
                    &mut self.scene,
                    &mut self.renderer,
                    size.width,
                    size.height,
                    armed,
                )?;
                self.controls.borrow_mut().on_pick_events(&events);
            }
        }
        self.window.request_redraw();
        Ok(())
    }
}

impl ApplicationHandler for LunarApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Pending { config, setup } = &mut self.state else {
            return;
        };
        let Some(setup) = setup.take() else {
            return;
        };
        match start(event_loop, config, setup) {
            Ok(running) => self.state = AppState::Running(Box::new(running)),
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let AppState::Running(running) = &mut self.state else {
            return;
        };

        if let Some(input) = Input::from_window_event(&event) {
            running.handle_input(input);
        }

        match event {
            WindowEvent::CloseRequested => {
                running.scheduler.stop();
                self.state = AppState::Finished;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                running.renderer.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = running.redraw() {
                    self.fail(event_loop, e);
                }
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let AppState::Running(running) = &mut self.state {
            if let Some(input) = Input::from_device_event(&event) {
                running.handle_input(input);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_builder_config_fails_before_the_event_loop() {
        let result = run_with_config(AppConfig::new().fps(0.0), |_| Ok(()));
        assert!(matches!(result, Err(SceneError::Config(_))));

        let result = run_with_config(AppConfig::new().fov(0.0), |_| Ok(()));
        assert!(matches!(result, Err(SceneError::Config(_))));
    }
}
