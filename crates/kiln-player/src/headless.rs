//! Offscreen runs: render a fixed number of frames and optionally save the last one

use crate::config::PlayerConfig;
use crate::rig::{frame_schedule, spawn_default_rig, PlayerResources};
use anyhow::Context;
use kiln_ecs::SceneWorld;
use kiln_render::{RenderContext, WgpuBackend};
use std::path::Path;

const FRAME_DELTA: f64 = 1.0 / 60.0;

/// What a headless run produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessReport {
    pub frames: u64,
    pub entities: usize,
    pub pipelines: usize,
}

pub fn run_headless(
    scene_path: &Path,
    config: &PlayerConfig,
    frames: u32,
    screenshot: Option<&Path>,
) -> anyhow::Result<HeadlessReport> {
    let (width, height) = (config.window.width, config.window.height);
    let backend =
        WgpuBackend::headless(width, height, &config.renderer).context("Failed to initialize offscreen renderer")?;
    let mut resources = PlayerResources::new(RenderContext::new(backend));
    let mut world = SceneWorld::new();

    let scene = kiln_import::import_scene(scene_path, &mut resources.render, &mut world)
        .with_context(|| format!("Failed to import {}", scene_path.display()))?;
    spawn_default_rig(&mut world, config)?;

    let mut schedule = frame_schedule();
    schedule.initialize(&mut world, &mut resources)?;
    for _ in 0..frames {
        schedule.tick_with_delta(&mut world, &mut resources, FRAME_DELTA)?;
    }
    schedule.shutdown()?;

    if let Some(path) = screenshot {
        let pixels = resources.render.backend().read_pixels()?;
        let image = image::RgbaImage::from_raw(width, height, pixels)
            .context("Frame readback does not match the window size")?;
        image
            .save(path)
            .with_context(|| format!("Failed to save screenshot {}", path.display()))?;
        log::info!("Saved screenshot to {}", path.display());
    }

    let report = HeadlessReport {
        frames: resources.render.frame_count(),
        entities: world.entity_count(),
        pipelines: resources.render.backend().pipeline_count(),
    };

    scene.unmount(&mut world);
    world.clear();
    drop(resources.render.shutdown());
    Ok(report)
}
