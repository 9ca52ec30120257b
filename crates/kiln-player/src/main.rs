//! Kiln Player - render a scene document
//!
//! Usage:
//!   kiln-player <scene.json> [--config <kiln.toml>] [--headless <frames>] [--screenshot <png>]

use anyhow::{Context, Result};
use clap::Parser;
use kiln_player::{run_headless, PlayerApp, PlayerConfig};
use std::path::PathBuf;
use winit::event_loop::{ControlFlow, EventLoop};

#[derive(Parser)]
#[command(name = "kiln-player")]
#[command(about = "Kiln player - import a scene document and render it")]
struct Args {
    /// Path to the scene document
    scene: PathBuf,

    /// Config file; defaults to kiln.toml next to the scene
    #[arg(long)]
    config: Option<PathBuf>,

    /// Render this many frames offscreen instead of opening a window
    #[arg(long, value_name = "FRAMES")]
    headless: Option<u32>,

    /// Save the last offscreen frame as a PNG
    #[arg(long, value_name = "PNG", requires = "headless")]
    screenshot: Option<PathBuf>,

    /// Window or offscreen width
    #[arg(long)]
    width: Option<u32>,

    /// Window or offscreen height
    #[arg(long)]
    height: Option<u32>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        PlayerConfig::load(args.config.as_deref(), &args.scene).context("Failed to load configuration")?;
    config.override_size(args.width, args.height);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log.filter.as_str())).init();

    if let Some(frames) = args.headless {
        let report = run_headless(&args.scene, &config, frames, args.screenshot.as_deref())?;
        println!(
            "Rendered {} frames of {} ({} entities, {} pipelines)",
            report.frames,
            args.scene.display(),
            report.entities,
            report.pipelines
        );
        return Ok(());
    }

    println!("Controls:");
    println!("  W/S      - Move camera");
    println!("  Escape   - Exit");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = PlayerApp::new(args.scene, config);
    event_loop.run_app(&mut app)?;

    match app.take_error() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
