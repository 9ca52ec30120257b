//! Phase-ordered system schedule

use crate::clock::FrameClock;
use crate::system::{FrameInfo, System};
use crate::world::SceneWorld;
use kiln_core::Result;

/// Runs registered systems once per frame, phase by phase.
///
/// Within a phase, systems run in registration order.
pub struct Schedule<R> {
    systems: Vec<Box<dyn System<R>>>,
    clock: FrameClock,
    initialized: bool,
}

impl<R> Default for Schedule<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Schedule<R> {
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
            clock: FrameClock::new(),
            initialized: false,
        }
    }

    /// Register a system. Write conflicts with systems of the same phase are logged.
    pub fn add(&mut self, system: impl System<R> + 'static) -> &mut Self {
        let access = system.access();
        for existing in self.systems.iter().filter(|s| s.phase() == system.phase()) {
            for component in access.write_conflicts(&existing.access()) {
                log::warn!(
                    "Systems '{}' and '{}' both write {} during {:?}",
                    existing.name(),
                    system.name(),
                    component,
                    system.phase()
                );
            }
        }

        let at = self
            .systems
            .iter()
            .position(|s| s.phase() > system.phase())
            .unwrap_or(self.systems.len());
        log::debug!("Registered system '{}' in {:?}", system.name(), system.phase());
        self.systems.insert(at, Box::new(system));
        self
    }

    /// Names in execution order
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    /// Initialize every system. Called implicitly by the first tick.
    pub fn initialize(&mut self, world: &mut SceneWorld, resources: &mut R) -> Result<()> {
        for system in &mut self.systems {
            system.initialize(world, resources)?;
        }
        self.initialized = true;
        Ok(())
    }

    /// Advance the wall clock and run one frame
    pub fn tick(&mut self, world: &mut SceneWorld, resources: &mut R) -> Result<FrameInfo> {
        self.clock.tick();
        let frame = self.clock.frame_info();
        self.run(world, resources, &frame)?;
        Ok(frame)
    }

    /// Run one frame with an explicit delta
    pub fn tick_with_delta(&mut self, world: &mut SceneWorld, resources: &mut R, delta: f64) -> Result<FrameInfo> {
        self.clock.advance(delta);
        let frame = self.clock.frame_info();
        self.run(world, resources, &frame)?;
        Ok(frame)
    }

    fn run(&mut self, world: &mut SceneWorld, resources: &mut R, frame: &FrameInfo) -> Result<()> {
        if !self.initialized {
            self.initialize(world, resources)?;
        }
        for system in &mut self.systems {
            system.run(world, resources, frame)?;
        }
        Ok(())
    }

    pub fn shutdown(&mut self) -> Result<()> {
        for system in &mut self.systems {
            system.shutdown()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::Phase;

    struct Recorder {
        name: &'static str,
        phase: Phase,
    }

    impl System<Vec<String>> for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn phase(&self) -> Phase {
            self.phase
        }

        fn run(&mut self, _world: &mut SceneWorld, log: &mut Vec<String>, frame: &FrameInfo) -> Result<()> {
            log.push(format!("{}@{}", self.name, frame.frame));
            Ok(())
        }
    }

    #[test]
    fn test_runs_in_phase_order() {
        let mut schedule = Schedule::new();
        schedule
            .add(Recorder { name: "render", phase: Phase::OnStore })
            .add(Recorder { name: "submit", phase: Phase::PreStore })
            .add(Recorder { name: "add", phase: Phase::PostLoad })
            .add(Recorder { name: "submit_lights", phase: Phase::PreStore });

        assert_eq!(schedule.system_names(), vec!["add", "submit", "submit_lights", "render"]);

        let mut world = SceneWorld::new();
        let mut log = Vec::new();
        schedule.tick_with_delta(&mut world, &mut log, 0.016).unwrap();
        schedule.tick_with_delta(&mut world, &mut log, 0.016).unwrap();

        assert_eq!(log[0], "add@1");
        assert_eq!(log[3], "render@1");
        assert_eq!(log[7], "render@2");
    }
}
