//! Transform cascade: resolves every entity's world matrix, parents first.
//!
//! Two systems cooperate. [`AddTransforms`] gives an identity `Transform` to
//! any entity that has (own or shared) Position, Rotation or Scale but no
//! Transform yet. [`TransformCascade`] then recomputes
//! `world = parent.world * local` for every entity with a Transform and a
//! Position, skipping entities whose inputs are unchanged since its last run.

use crate::change::ChangeGroup;
use crate::components::{Position, Rotation, Scale, Transform};
use crate::system::{FrameInfo, Phase, System, SystemAccess};
use crate::world::SceneWorld;
use kiln_core::math::local_matrix;
use kiln_core::{EntityId, Result};
use std::collections::HashSet;

/// Adds an identity Transform to entities that have transform inputs but no Transform
pub struct AddTransforms;

impl AddTransforms {
    /// Returns how many Transforms were added
    pub fn apply(world: &mut SceneWorld) -> Result<usize> {
        let pending: Vec<EntityId> = world
            .entity_ids()
            .into_iter()
            .filter(|id| needs_transform(world, *id))
            .collect();

        for id in &pending {
            world.insert(*id, Transform::default())?;
        }
        if !pending.is_empty() {
            log::debug!("Added {} Transform components", pending.len());
        }
        Ok(pending.len())
    }
}

fn needs_transform(world: &SceneWorld, id: EntityId) -> bool {
    !world.is_prefab(id)
        && !world.has::<Transform>(id)
        && (world.resolve::<Position>(id).is_some()
            || world.resolve::<Rotation>(id).is_some()
            || world.resolve::<Scale>(id).is_some())
}

impl<R> System<R> for AddTransforms {
    fn name(&self) -> &str {
        "add_transforms"
    }

    fn phase(&self) -> Phase {
        Phase::PostLoad
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new()
            .optional::<Position>()
            .optional::<Rotation>()
            .optional::<Scale>()
            .write::<Transform>()
    }

    fn run(&mut self, world: &mut SceneWorld, _resources: &mut R, _frame: &FrameInfo) -> Result<()> {
        Self::apply(world)?;
        Ok(())
    }
}

/// Counters from one cascade pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeStats {
    /// Entities with a Transform and a Position
    pub visited: usize,
    pub recomputed: usize,
    pub skipped: usize,
}

/// Recomputes world matrices parents-first with change-based skipping
#[derive(Debug, Default)]
pub struct TransformCascade {
    /// World tick at the end of the previous pass
    last_run: u64,
    has_run: bool,
    last_stats: CascadeStats,
}

impl TransformCascade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute entities whose inputs changed since the previous pass
    pub fn run(&mut self, world: &mut SceneWorld) -> Result<CascadeStats> {
        self.cascade(world, false)
    }

    /// Recompute every entity regardless of change versions
    pub fn run_full(&mut self, world: &mut SceneWorld) -> Result<CascadeStats> {
        self.cascade(world, true)
    }

    pub fn last_stats(&self) -> CascadeStats {
        self.last_stats
    }

    fn cascade(&mut self, world: &mut SceneWorld, force: bool) -> Result<CascadeStats> {
        let force = force || !self.has_run;
        let since = self.last_run;
        let mut stats = CascadeStats::default();
        let mut recomputed: HashSet<EntityId> = HashSet::new();

        for id in world.cascade_order() {
            if world.is_prefab(id) || !world.has::<Transform>(id) {
                continue;
            }
            let Some((Position(position), _)) = world.resolve::<Position>(id) else {
                continue;
            };
            stats.visited += 1;

            let parent = world.get_parent(id);
            let dirty = force
                || inputs_changed(world, id, since)
                || parent.is_some_and(|p| recomputed.contains(&p) || structure_changed(world, p, since));
            if !dirty {
                stats.skipped += 1;
                continue;
            }

            let rotation = world.resolve::<Rotation>(id).map(|(Rotation(r), _)| r);
            let scale = world.resolve::<Scale>(id).map(|(Scale(s), _)| s);
            let local = local_matrix(position, rotation, scale);

            let parent_world = parent.and_then(|p| world.get_copied::<Transform>(p));
            let matrix = match parent_world {
                Some(Transform(parent_matrix)) => parent_matrix * local,
                None => local,
            };

            world.store_transform(id, matrix)?;
            recomputed.insert(id);
            stats.recomputed += 1;
        }

        self.last_run = world.change_tick();
        self.has_run = true;
        self.last_stats = stats;
        Ok(stats)
    }
}

/// Own or shared transform inputs, or the entity's structure, changed after `since`
fn inputs_changed(world: &SceneWorld, id: EntityId, since: u64) -> bool {
    let own = world.changes(id).map_or(true, |ticks| {
        ticks.changed_since(ChangeGroup::TransformInputs, since)
            || ticks.changed_since(ChangeGroup::Structure, since)
    });
    if own {
        return true;
    }

    let mut cursor = world.get_prefab(id);
    while let Some(prefab) = cursor {
        if world.changes(prefab).is_some_and(|ticks| {
            ticks.changed_since(ChangeGroup::TransformInputs, since)
                || ticks.changed_since(ChangeGroup::Structure, since)
        }) {
            return true;
        }
        cursor = world.get_prefab(prefab);
    }
    false
}

fn structure_changed(world: &SceneWorld, id: EntityId, since: u64) -> bool {
    world
        .changes(id)
        .is_some_and(|ticks| ticks.changed_since(ChangeGroup::Structure, since))
}

impl<R> System<R> for TransformCascade {
    fn name(&self) -> &str {
        "transform_cascade"
    }

    fn phase(&self) -> Phase {
        Phase::OnValidate
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new()
            .read::<Position>()
            .optional::<Rotation>()
            .optional::<Scale>()
            .write::<Transform>()
    }

    fn run(&mut self, world: &mut SceneWorld, _resources: &mut R, _frame: &FrameInfo) -> Result<()> {
        let stats = TransformCascade::run(self, world)?;
        log::trace!(
            "Transform cascade: {} recomputed, {} skipped",
            stats.recomputed,
            stats.skipped
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Prefab;
    use glam::{Mat4, Vec3};
    use std::f32::consts::FRAC_PI_2;

    fn world_of(world: &SceneWorld, id: EntityId) -> Mat4 {
        world.get_copied::<Transform>(id).unwrap().0
    }

    fn step(world: &mut SceneWorld, cascade: &mut TransformCascade) -> CascadeStats {
        AddTransforms::apply(world).unwrap();
        cascade.run(world).unwrap()
    }

    #[test]
    fn test_root_world_equals_local() {
        let mut world = SceneWorld::new();
        let id = world.spawn("node").unwrap();
        world.set(id, Position(Vec3::new(1.0, 0.0, 0.0))).unwrap();
        world.set(id, Rotation(Vec3::ZERO)).unwrap();

        let mut cascade = TransformCascade::new();
        step(&mut world, &mut cascade);

        assert_eq!(world_of(&world, id), Mat4::from_translation(Vec3::X));
    }

    #[test]
    fn test_child_world_is_parent_times_local() {
        let mut world = SceneWorld::new();
        let parent = world.spawn("parent").unwrap();
        let child = world.spawn("child").unwrap();
        world.set(parent, Position(Vec3::new(0.0, 2.0, 0.0))).unwrap();
        world.set(parent, Rotation(Vec3::new(0.0, 0.0, FRAC_PI_2))).unwrap();
        world.set(parent, Scale(Vec3::splat(2.0))).unwrap();
        world.set(child, Position(Vec3::new(1.0, 0.0, 0.0))).unwrap();
        world.set_parent(child, parent).unwrap();

        let mut cascade = TransformCascade::new();
        step(&mut world, &mut cascade);

        let parent_world = world_of(&world, parent);
        let local = Mat4::from_translation(Vec3::X);
        assert!(world_of(&world, child).abs_diff_eq(parent_world * local, 1e-5));

        let origin = world_of(&world, child).transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(0.0, 4.0, 0.0), 1e-5));
    }

    #[test]
    fn test_rotation_only_gets_identity_transform() {
        let mut world = SceneWorld::new();
        let id = world.spawn_anonymous();
        world.set(id, Rotation(Vec3::new(0.3, 0.0, 0.0))).unwrap();

        let mut cascade = TransformCascade::new();
        let stats = step(&mut world, &mut cascade);

        assert_eq!(world_of(&world, id), Mat4::IDENTITY);
        assert_eq!(stats.visited, 0);
    }

    #[test]
    fn test_unchanged_entities_are_skipped() {
        let mut world = SceneWorld::new();
        let parent = world.spawn("parent").unwrap();
        let child = world.spawn("child").unwrap();
        let other = world.spawn("other").unwrap();
        for id in [parent, child, other] {
            world.set(id, Position(Vec3::ONE)).unwrap();
        }
        world.set_parent(child, parent).unwrap();

        let mut cascade = TransformCascade::new();
        assert_eq!(step(&mut world, &mut cascade).recomputed, 3);

        let stats = step(&mut world, &mut cascade);
        assert_eq!(stats.recomputed, 0);
        assert_eq!(stats.skipped, 3);

        // Moving the parent drags the child along, the unrelated root stays put
        world.set(parent, Position(Vec3::new(5.0, 0.0, 0.0))).unwrap();
        let stats = step(&mut world, &mut cascade);
        assert_eq!(stats.recomputed, 2);
        assert_eq!(stats.skipped, 1);
        assert!(world_of(&world, child)
            .transform_point3(Vec3::ZERO)
            .abs_diff_eq(Vec3::new(6.0, 1.0, 1.0), 1e-5));
    }

    #[test]
    fn test_incremental_matches_full() {
        let mut incremental = SceneWorld::new();
        let mut ids = Vec::new();
        for i in 0..6 {
            let id = incremental.spawn(format!("n{}", i)).unwrap();
            incremental.set(id, Position(Vec3::new(i as f32, 0.5, -1.0))).unwrap();
            incremental.set(id, Rotation(Vec3::new(0.1 * i as f32, 0.2, 0.0))).unwrap();
            if i % 2 == 0 {
                incremental.set(id, Scale(Vec3::splat(1.0 + i as f32 * 0.1))).unwrap();
            }
            if i > 0 {
                incremental.set_parent(id, ids[(i - 1) / 2]).unwrap();
            }
            ids.push(id);
        }

        let mut cascade = TransformCascade::new();
        step(&mut incremental, &mut cascade);

        let edits: [(usize, Vec3); 3] = [
            (1, Vec3::new(0.0, 3.0, 0.0)),
            (4, Vec3::new(-2.0, 0.0, 1.0)),
            (0, Vec3::new(0.5, 0.5, 0.5)),
        ];
        for (index, position) in edits {
            incremental.set(ids[index], Position(position)).unwrap();
            let stats = step(&mut incremental, &mut cascade);
            assert!(stats.skipped > 0 || index == 0);

            let snapshot: Vec<Mat4> = ids.iter().map(|id| world_of(&incremental, *id)).collect();
            let mut full = TransformCascade::new();
            full.run_full(&mut incremental).unwrap();
            for (id, expected) in ids.iter().zip(snapshot) {
                assert!(world_of(&incremental, *id).abs_diff_eq(expected, 1e-6));
            }
        }
    }

    #[test]
    fn test_shared_components_from_prefab() {
        let mut world = SceneWorld::new();
        let prefab = world.spawn_prefab("pillar").unwrap();
        world.set(prefab, Scale(Vec3::new(1.0, 3.0, 1.0))).unwrap();

        let a = world.spawn("a").unwrap();
        let b = world.spawn("b").unwrap();
        world.set(a, Position(Vec3::new(-1.0, 0.0, 0.0))).unwrap();
        world.set(b, Position(Vec3::new(1.0, 0.0, 0.0))).unwrap();
        world.set(b, Scale(Vec3::ONE)).unwrap();
        world.set_instance_of(a, prefab).unwrap();
        world.set_instance_of(b, prefab).unwrap();

        let mut cascade = TransformCascade::new();
        step(&mut world, &mut cascade);

        assert!(!world.has::<Transform>(prefab));
        assert!(world.has::<Prefab>(prefab));
        assert_eq!(
            world_of(&world, a),
            Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0)) * Mat4::from_scale(Vec3::new(1.0, 3.0, 1.0))
        );
        assert_eq!(world_of(&world, b), Mat4::from_translation(Vec3::X));

        // Changing the shared value reaches instances that read it
        world.set(prefab, Scale(Vec3::splat(2.0))).unwrap();
        let stats = step(&mut world, &mut cascade);
        assert_eq!(stats.recomputed, 2);
        assert_eq!(
            world_of(&world, a),
            Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0)) * Mat4::from_scale(Vec3::splat(2.0))
        );
        assert_eq!(world_of(&world, b), Mat4::from_translation(Vec3::X));
    }

    #[test]
    fn test_removing_shared_component_reaches_instances() {
        let mut world = SceneWorld::new();
        let prefab = world.spawn_prefab("column").unwrap();
        world.set(prefab, Scale(Vec3::splat(3.0))).unwrap();
        let a = world.spawn("a").unwrap();
        world.set(a, Position(Vec3::X)).unwrap();
        world.set_instance_of(a, prefab).unwrap();

        let mut cascade = TransformCascade::new();
        step(&mut world, &mut cascade);
        assert_eq!(world_of(&world, a).x_axis.x, 3.0);

        world.remove::<Scale>(prefab).unwrap();
        let stats = step(&mut world, &mut cascade);
        assert_eq!(stats.recomputed, 1);
        let incremental = world_of(&world, a);

        TransformCascade::new().run_full(&mut world).unwrap();
        assert_eq!(incremental, world_of(&world, a));
        assert_eq!(incremental, Mat4::from_translation(Vec3::X));
    }

    #[test]
    fn test_reparent_recomputes() {
        let mut world = SceneWorld::new();
        let left = world.spawn("left").unwrap();
        let right = world.spawn("right").unwrap();
        let child = world.spawn("child").unwrap();
        world.set(left, Position(Vec3::new(-10.0, 0.0, 0.0))).unwrap();
        world.set(right, Position(Vec3::new(10.0, 0.0, 0.0))).unwrap();
        world.set(child, Position(Vec3::ZERO)).unwrap();
        world.set_parent(child, left).unwrap();

        let mut cascade = TransformCascade::new();
        step(&mut world, &mut cascade);
        assert_eq!(world_of(&world, child).w_axis.x, -10.0);

        world.set_parent(child, right).unwrap();
        step(&mut world, &mut cascade);
        assert_eq!(world_of(&world, child).w_axis.x, 10.0);
    }
}
