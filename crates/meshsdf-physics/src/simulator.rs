//! Fixed-step simulation with optional real-time pacing.

use std::time::{Duration, Instant};

use crate::world::PhysicsWorld;

/// Advances a [`PhysicsWorld`] in fixed steps.
///
/// With a positive real-time rate the simulator sleeps so that simulated
/// time never runs ahead of `rate` times the wall-clock time elapsed since
/// pacing began.
pub struct Simulator {
    world: PhysicsWorld,
    time: f64,
    time_step: f64,
    realtime_rate: f64,
    pace_origin: Option<(Instant, f64)>,
}

impl Simulator {
    /// Wrap `world`, stepping by `time_step` seconds. Non-positive steps fall
    /// back to 0.01 s.
    pub fn new(world: PhysicsWorld, time_step: f64) -> Self {
        let time_step = if time_step > 0.0 { time_step } else { 0.01 };
        Self {
            world,
            time: 0.0,
            time_step,
            realtime_rate: 0.0,
            pace_origin: None,
        }
    }

    /// Pace simulation at `rate` times real time; zero or less runs as fast
    /// as possible.
    pub fn set_target_realtime_rate(&mut self, rate: f64) {
        self.realtime_rate = rate.max(0.0);
        self.pace_origin = None;
    }

    /// Current simulated time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Step size in seconds.
    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// The simulated world.
    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    /// Advance until simulated time reaches `target`.
    pub fn advance_to(&mut self, target: f64) {
        self.advance_to_with(target, |_, _| {});
    }

    /// Advance until simulated time reaches `target`, calling `observer`
    /// after every step. The final step is shortened to land on `target`.
    pub fn advance_to_with(&mut self, target: f64, mut observer: impl FnMut(&PhysicsWorld, f64)) {
        while target - self.time > self.time_step * 1e-6 {
            let dt = self.time_step.min(target - self.time);
            self.world.step(dt as f32);
            self.time += dt;
            observer(&self.world, self.time);
            self.pace();
        }
    }

    fn pace(&mut self) {
        if self.realtime_rate <= 0.0 {
            return;
        }
        let (origin, start_time) = *self
            .pace_origin
            .get_or_insert_with(|| (Instant::now(), self.time));
        let due = Duration::from_secs_f64((self.time - start_time) / self.realtime_rate);
        let elapsed = origin.elapsed();
        if due > elapsed {
            std::thread::sleep(due - elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use meshsdf_sdf::{Descriptor, Link, Model};
    use std::path::Path;

    fn empty_world() -> PhysicsWorld {
        let descriptor = Descriptor::new(Model {
            name: "empty".into(),
            links: vec![Link::new("only")],
        });
        PhysicsWorld::from_descriptor(&descriptor, Path::new(".")).unwrap()
    }

    #[test]
    fn test_advance_lands_on_target() {
        let mut sim = Simulator::new(empty_world(), 0.01);
        let mut steps = 0;
        sim.advance_to_with(1.0, |_, _| steps += 1);
        assert_eq!(steps, 100);
        assert_relative_eq!(sim.time(), 1.0, epsilon = 1e-9);

        sim.advance_to(1.025);
        assert_relative_eq!(sim.time(), 1.025, epsilon = 1e-9);
    }

    #[test]
    fn test_advance_backwards_is_noop() {
        let mut sim = Simulator::new(empty_world(), 0.01);
        sim.advance_to(0.5);
        sim.advance_to(0.2);
        assert_relative_eq!(sim.time(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_realtime_pacing_sleeps() {
        let mut sim = Simulator::new(empty_world(), 0.01);
        sim.set_target_realtime_rate(1.0);
        let start = Instant::now();
        sim.advance_to(0.1);
        // The first step starts the clock, so at least 0.09 s must pass.
        assert!(start.elapsed() >= Duration::from_millis(85));
    }

    #[test]
    fn test_invalid_step_falls_back() {
        let sim = Simulator::new(empty_world(), 0.0);
        assert_relative_eq!(sim.time_step(), 0.01);
    }
}
