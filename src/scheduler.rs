//! Frame-rate throttled tick loop.
//!
//! The host calls [`Scheduler::tick`] as often as it likes (every redraw).
//! A tick is only accepted once strictly more than `1000 / fps` milliseconds
//! have passed since the last accepted one. Handlers then receive the real
//! elapsed time, not a fixed step, so motion speed follows wall time within
//! the throttle granularity.

use crate::scene::Scene;

/// Accepts at most one tick per frame interval.
#[derive(Clone, Copy, Debug)]
pub struct FrameThrottle {
    interval_ms: f64,
    last_ms: f64,
}

impl FrameThrottle {
    pub fn new(fps: f64) -> Self {
        Self {
            interval_ms: 1000.0 / fps,
            last_ms: 0.0,
        }
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    /// Restarts timing from `now_ms`.
    pub fn reset(&mut self, now_ms: f64) {
        self.last_ms = now_ms;
    }

    /// Elapsed milliseconds if a frame is due at `now_ms`.
    pub fn accept(&mut self, now_ms: f64) -> Option<f64> {
        let elapsed = now_ms - self.last_ms;
        if elapsed > self.interval_ms {
            self.last_ms = now_ms;
            Some(elapsed)
        } else {
            None
        }
    }
}

type TickHandler = Box<dyn FnMut(&mut Scene, f64)>;

/// Runs per-tick handlers at the configured frame rate.
pub struct Scheduler {
    throttle: FrameThrottle,
    handlers: Vec<TickHandler>,
    running: bool,
}

impl Scheduler {
    pub fn new(fps: f64) -> Self {
        Self {
            throttle: FrameThrottle::new(fps),
            handlers: Vec::new(),
            running: false,
        }
    }

    /// Registers a handler called with the scene and the elapsed milliseconds.
    pub fn on_tick(&mut self, handler: impl FnMut(&mut Scene, f64) + 'static) {
        self.handlers.push(Box::new(handler));
    }

    pub fn start(&mut self, now_ms: f64) {
        if !self.running {
            self.throttle.reset(now_ms);
            self.running = true;
            log::info!("scheduler started at {:.0} fps", 1000.0 / self.throttle.interval_ms());
        }
    }

    /// Stops ticking. Stopping twice is harmless.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            log::info!("scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Host callback. Runs the handlers and returns the elapsed time when a
    /// frame is due, in which case the caller should render.
    pub fn tick(&mut self, scene: &mut Scene, now_ms: f64) -> Option<f64> {
        if !self.running {
            return None;
        }
        let delta = self.throttle.accept(now_ms)?;
        for handler in &mut self.handlers {
            handler(scene, delta);
        }
        Some(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn twenty_fps_fires_every_other_ten_ms_tick() {
        let mut scene = Scene::new();
        let mut scheduler = Scheduler::new(20.0);
        let fired = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&fired);
        scheduler.on_tick(move |_, delta| sink.borrow_mut().push(delta));

        scheduler.start(0.0);
        let mut accepted = Vec::new();
        for i in 1..=20 {
            let now = i as f64 * 10.0;
            if scheduler.tick(&mut scene, now).is_some() {
                accepted.push(now);
            }
        }

        // 50 ms is not strictly more than the interval, so 60 is first.
        assert_eq!(accepted, vec![60.0, 120.0, 180.0]);
        assert!(accepted.windows(2).all(|w| w[1] - w[0] >= 50.0));
        assert_eq!(*fired.borrow(), vec![60.0, 60.0, 60.0]);
    }

    #[test]
    fn handlers_get_the_real_elapsed_time() {
        let mut throttle = FrameThrottle::new(20.0);
        throttle.reset(1000.0);
        assert_eq!(throttle.accept(1040.0), None);
        assert_eq!(throttle.accept(1137.5), Some(137.5));
        assert_eq!(throttle.accept(1150.0), None);
    }

    #[test]
    fn stopped_scheduler_never_ticks() {
        let mut scene = Scene::new();
        let mut scheduler = Scheduler::new(20.0);
        assert_eq!(scheduler.tick(&mut scene, 1000.0), None);

        scheduler.start(0.0);
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.tick(&mut scene, 1000.0), None);
    }

    #[test]
    fn handlers_move_the_camera() {
        let mut scene = Scene::new();
        let mut scheduler = Scheduler::new(10.0);
        scheduler.on_tick(|scene, delta| scene.advance_camera(delta as f32 * 0.1));
        scheduler.start(0.0);
        scheduler.tick(&mut scene, 150.0);
        assert!((scene.camera.eye_position().z + 15.0).abs() < 1e-4);
    }
}
