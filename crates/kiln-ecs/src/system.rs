//! System trait and scheduling phases

use crate::world::SceneWorld;
use kiln_core::Result;

/// Frame phases, run in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    OnLoad,
    PostLoad,
    OnUpdate,
    OnValidate,
    PreStore,
    OnStore,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::OnLoad,
        Phase::PostLoad,
        Phase::OnUpdate,
        Phase::OnValidate,
        Phase::PreStore,
        Phase::OnStore,
    ];
}

/// Timing handed to every system for one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameInfo {
    pub frame: u64,
    pub delta_time: f64,
    pub total_time: f64,
}

/// Components a system reads, writes, or reads when present
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemAccess {
    pub reads: Vec<&'static str>,
    pub writes: Vec<&'static str>,
    pub optional: Vec<&'static str>,
}

impl SystemAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read<C: 'static>(mut self) -> Self {
        self.reads.push(std::any::type_name::<C>());
        self
    }

    pub fn write<C: 'static>(mut self) -> Self {
        self.writes.push(std::any::type_name::<C>());
        self
    }

    pub fn optional<C: 'static>(mut self) -> Self {
        self.optional.push(std::any::type_name::<C>());
        self
    }

    /// Components both systems write
    pub fn write_conflicts(&self, other: &SystemAccess) -> Vec<&'static str> {
        self.writes
            .iter()
            .filter(|w| other.writes.contains(w))
            .copied()
            .collect()
    }
}

/// A system run by the [`Schedule`](crate::Schedule) once per frame.
///
/// `R` is the resource context systems share (e.g. the render context);
/// systems that need none are generic over it.
pub trait System<R> {
    /// Human-readable name for this system
    fn name(&self) -> &str;

    /// Phase this system runs in
    fn phase(&self) -> Phase;

    /// Declared component access
    fn access(&self) -> SystemAccess {
        SystemAccess::default()
    }

    /// Called once before the first frame
    fn initialize(&mut self, _world: &mut SceneWorld, _resources: &mut R) -> Result<()> {
        Ok(())
    }

    /// Called once per frame
    fn run(&mut self, world: &mut SceneWorld, resources: &mut R, frame: &FrameInfo) -> Result<()>;

    /// Called when the schedule shuts down
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    #[test]
    fn test_phase_order() {
        let mut sorted = Phase::ALL;
        sorted.sort();
        assert_eq!(sorted, Phase::ALL);
        assert!(Phase::OnValidate < Phase::PreStore);
    }

    #[test]
    fn test_write_conflicts() {
        let first = SystemAccess::new().read::<A>().write::<B>();
        let second = SystemAccess::new().write::<B>().optional::<A>();
        let third = SystemAccess::new().write::<A>();

        assert_eq!(first.write_conflicts(&second), vec![std::any::type_name::<B>()]);
        assert!(first.write_conflicts(&third).is_empty());
    }
}
