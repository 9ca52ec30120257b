//! Per-entity change versions

/// Groups of components that share one change version.
///
/// Writing any member of a group bumps that group's version on the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeGroup {
    /// Position, Rotation and Scale
    TransformInputs,
    /// Spawn, component add/remove, parent and prefab links
    Structure,
}

impl ChangeGroup {
    pub const ALL: [ChangeGroup; 2] = [ChangeGroup::TransformInputs, ChangeGroup::Structure];

    fn index(self) -> usize {
        match self {
            ChangeGroup::TransformInputs => 0,
            ChangeGroup::Structure => 1,
        }
    }
}

/// The world tick at which each group of an entity last changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeTicks {
    versions: [u64; 2],
}

impl ChangeTicks {
    /// Every group marked as changed at `tick`
    pub fn new(tick: u64) -> Self {
        Self { versions: [tick; 2] }
    }

    pub fn get(&self, group: ChangeGroup) -> u64 {
        self.versions[group.index()]
    }

    pub(crate) fn bump(&mut self, group: ChangeGroup, tick: u64) {
        self.versions[group.index()] = tick;
    }

    /// True if `group` changed after `since`
    pub fn changed_since(&self, group: ChangeGroup, since: u64) -> bool {
        self.get(group) > since
    }

    /// True if any group changed after `since`
    pub fn any_changed_since(&self, since: u64) -> bool {
        ChangeGroup::ALL.iter().any(|g| self.changed_since(*g, since))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_is_per_group() {
        let mut ticks = ChangeTicks::new(1);
        ticks.bump(ChangeGroup::TransformInputs, 5);

        assert!(ticks.changed_since(ChangeGroup::TransformInputs, 4));
        assert!(!ticks.changed_since(ChangeGroup::Structure, 4));
        assert!(ticks.any_changed_since(4));
        assert!(!ticks.any_changed_since(5));
    }
}
