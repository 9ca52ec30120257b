//! Windowed player implementing winit's ApplicationHandler
//!
//! The window and renderer are created on the first `resumed` call. Each
//! redraw ticks the frame schedule once; errors stop the event loop and are
//! handed back through [`PlayerApp::take_error`].

use crate::config::PlayerConfig;
use crate::rig::{frame_schedule, PlayerResources};
use anyhow::Context;
use kiln_ecs::{Schedule, SceneWorld};
use kiln_import::ImportedScene;
use kiln_render::{RenderContext, WgpuBackend};
use std::path::PathBuf;
use std::sync::Arc;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

struct Session {
    window: Arc<Window>,
    resources: PlayerResources<WgpuBackend>,
    schedule: Schedule<PlayerResources<WgpuBackend>>,
    scene: ImportedScene,
}

pub struct PlayerApp {
    pub world: SceneWorld,
    pub scene_path: PathBuf,
    config: PlayerConfig,
    session: Option<Session>,
    error: Option<anyhow::Error>,
}

impl PlayerApp {
    pub fn new(scene_path: PathBuf, config: PlayerConfig) -> Self {
        Self {
            world: SceneWorld::new(),
            scene_path,
            config,
            session: None,
            error: None,
        }
    }

    /// The error that stopped the event loop, if any
    pub fn take_error(&mut self) -> Option<anyhow::Error> {
        self.error.take()
    }

    fn initialize(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attrs = Window::default_attributes()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.window.width, self.config.window.height));
        let window = Arc::new(event_loop.create_window(window_attrs).context("Failed to create window")?);

        let backend =
            WgpuBackend::new(window.clone(), &self.config.renderer).context("Failed to initialize renderer")?;
        let mut render = RenderContext::new(backend);

        let scene = kiln_import::import_scene(&self.scene_path, &mut render, &mut self.world)
            .with_context(|| format!("Failed to import {}", self.scene_path.display()))?;
        log::info!(
            "Imported {}: {} entities, {} meshes, {} materials",
            self.scene_path.display(),
            scene.entities.len(),
            scene.meshes.len(),
            scene.materials.len()
        );
        crate::rig::spawn_default_rig(&mut self.world, &self.config)?;

        let mut resources = PlayerResources::new(render);
        let mut schedule = frame_schedule();
        schedule.initialize(&mut self.world, &mut resources)?;

        window.request_redraw();
        self.session = Some(Session {
            window,
            resources,
            schedule,
            scene,
        });
        Ok(())
    }

    fn redraw(&mut self) -> anyhow::Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        session.schedule.tick(&mut self.world, &mut session.resources)?;
        session.resources.input.end_frame();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    /// Unmount the scene and tear down the renderer
    fn shutdown(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        if let Err(e) = session.schedule.shutdown() {
            log::warn!("Schedule shutdown failed: {}", e);
        }
        session.scene.unmount(&mut self.world);
        self.world.clear();
        drop(session.resources.render.shutdown());
        log::info!("Player shut down");
    }
}

impl ApplicationHandler for PlayerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() || self.error.is_some() {
            return;
        }
        if let Err(e) = self.initialize(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(session) = self.session.as_mut() {
                    session.resources.render.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(key_code) = event.physical_key else {
                    return;
                };
                if key_code == KeyCode::Escape && event.state == ElementState::Pressed {
                    event_loop.exit();
                    return;
                }
                if let Some(session) = self.session.as_mut() {
                    match event.state {
                        ElementState::Pressed => session.resources.input.process_key_down(key_code),
                        ElementState::Released => session.resources.input.process_key_up(key_code),
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(session) = &self.session {
            session.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}
