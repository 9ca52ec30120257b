//! Frame schedule, shared resources and the default camera/light rig

use crate::config::PlayerConfig;
use crate::input::InputState;
use glam::Vec3;
use kiln_core::{EntityId, Result};
use kiln_ecs::{
    AddTransforms, Camera, FrameInfo, Light, LookAt, Phase, Position, Schedule, SceneWorld, System, SystemAccess,
    TransformCascade,
};
use kiln_render::{GpuBackend, RenderCameras, RenderContext, RenderResources, SubmitLights, SubmitMeshes};
use winit::keyboard::KeyCode;

/// Everything the player's systems share
pub struct PlayerResources<B: GpuBackend> {
    pub render: RenderContext<B>,
    pub input: InputState,
}

impl<B: GpuBackend> PlayerResources<B> {
    pub fn new(render: RenderContext<B>) -> Self {
        Self {
            render,
            input: InputState::new(),
        }
    }
}

impl<B: GpuBackend> RenderResources for PlayerResources<B> {
    type Backend = B;

    fn renderer(&mut self) -> &mut RenderContext<B> {
        &mut self.render
    }
}

/// Marks a camera the keyboard moves
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraControl {
    pub move_speed: f32,
}

/// Moves controlled cameras along X: W forward, S back
pub struct CameraController;

impl<B: GpuBackend> System<PlayerResources<B>> for CameraController {
    fn name(&self) -> &str {
        "camera_controller"
    }

    fn phase(&self) -> Phase {
        Phase::OnUpdate
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new().read::<CameraControl>().write::<Position>()
    }

    fn run(&mut self, world: &mut SceneWorld, resources: &mut PlayerResources<B>, frame: &FrameInfo) -> Result<()> {
        let axis = resources.input.axis(KeyCode::KeyS, KeyCode::KeyW);
        if axis == 0.0 {
            return Ok(());
        }

        let controlled: Vec<(EntityId, f32)> = world
            .ecs()
            .query::<&CameraControl>()
            .iter()
            .filter_map(|(entity, control)| Some((world.id_of(entity)?, control.move_speed)))
            .collect();
        for (id, speed) in controlled {
            let step = axis * speed * frame.delta_time as f32;
            world.modify::<Position>(id, |position| position.0.x += step)?;
        }
        Ok(())
    }
}

/// The systems one player frame runs, in phase order
pub fn frame_schedule<B: GpuBackend + 'static>() -> Schedule<PlayerResources<B>> {
    let mut schedule = Schedule::new();
    schedule
        .add(AddTransforms)
        .add(CameraController)
        .add(TransformCascade::new())
        .add(SubmitMeshes)
        .add(SubmitLights)
        .add(RenderCameras);
    schedule
}

fn spawn_named(world: &mut SceneWorld, name: &str) -> Result<EntityId> {
    if world.get_id(name).is_some() {
        return Ok(world.spawn_anonymous());
    }
    world.spawn(name)
}

/// Entities added by [`spawn_default_rig`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rig {
    pub camera: Option<EntityId>,
    pub light: Option<EntityId>,
}

/// Add the configured camera when the world has none, and the configured
/// light when it has no light
pub fn spawn_default_rig(world: &mut SceneWorld, config: &PlayerConfig) -> Result<Rig> {
    let mut rig = Rig::default();

    let has_camera = world.ecs().query::<&Camera>().iter().next().is_some();
    if !has_camera {
        let camera = &config.camera;
        let id = spawn_named(world, "camera")?;
        world.set(id, Position(Vec3::from_array(camera.position)))?;
        world.insert(
            id,
            Camera::perspective(camera.fov_y_degrees.to_radians(), camera.near, camera.far),
        )?;
        world.insert(
            id,
            LookAt {
                target: Vec3::from_array(camera.target),
            },
        )?;
        world.insert(
            id,
            CameraControl {
                move_speed: camera.move_speed,
            },
        )?;
        log::info!("Scene has no camera, added one at {:?}", camera.position);
        rig.camera = Some(id);
    }

    let has_light = world.ecs().query::<&Light>().iter().next().is_some();
    if !has_light {
        let id = spawn_named(world, "light")?;
        world.set(id, Position(Vec3::from_array(config.light.position)))?;
        world.insert(
            id,
            Light {
                color: Vec3::from_array(config.light.color),
            },
        )?;
        rig.light = Some(id);
    }

    Ok(rig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_render::RecordingBackend;

    fn resources() -> PlayerResources<RecordingBackend> {
        PlayerResources::new(RenderContext::new(RecordingBackend::new()))
    }

    #[test]
    fn test_rig_fills_missing_camera_and_light() {
        let mut world = SceneWorld::new();
        let rig = spawn_default_rig(&mut world, &PlayerConfig::default()).unwrap();
        let camera = rig.camera.unwrap();
        assert!(world.has::<Camera>(camera));
        assert!(world.has::<LookAt>(camera));
        assert_eq!(world.get_copied::<Position>(camera).unwrap().0, Vec3::new(0.0, 1.0, 5.0));
        assert!(world.has::<Light>(rig.light.unwrap()));

        // A second call finds both
        assert_eq!(spawn_default_rig(&mut world, &PlayerConfig::default()).unwrap(), Rig::default());
    }

    #[test]
    fn test_rig_keeps_scene_camera() {
        let mut world = SceneWorld::new();
        let id = world.spawn("camera").unwrap();
        world.insert(id, Camera::perspective(1.0, 0.1, 10.0)).unwrap();

        let rig = spawn_default_rig(&mut world, &PlayerConfig::default()).unwrap();
        assert_eq!(rig.camera, None);
        assert!(rig.light.is_some());
    }

    #[test]
    fn test_w_and_s_move_camera_along_x() {
        let mut world = SceneWorld::new();
        let mut config = PlayerConfig::default();
        config.camera.position = [0.0, 0.0, 5.0];
        config.camera.move_speed = 2.0;
        let camera = spawn_default_rig(&mut world, &config).unwrap().camera.unwrap();

        let mut resources = resources();
        let mut schedule = frame_schedule();

        resources.input.process_key_down(KeyCode::KeyW);
        schedule.tick_with_delta(&mut world, &mut resources, 0.2).unwrap();
        let x = world.get_copied::<Position>(camera).unwrap().0.x;
        assert!((x - 0.4).abs() < 1e-5);

        resources.input.process_key_up(KeyCode::KeyW);
        resources.input.process_key_down(KeyCode::KeyS);
        schedule.tick_with_delta(&mut world, &mut resources, 0.1).unwrap();
        let x = world.get_copied::<Position>(camera).unwrap().0.x;
        assert!((x - 0.2).abs() < 1e-5);

        let frame = resources.render.backend().last_frame().unwrap();
        assert_eq!(frame.uniforms.lights.len(), 1);
        assert!(frame
            .uniforms
            .camera_position
            .abs_diff_eq(Vec3::new(0.2, 0.0, 5.0), 1e-4));
    }
}
