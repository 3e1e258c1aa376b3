//! Headless front end for the Ember renderer.
//!
//! Plays the role of a display loop: starts a background render, polls
//! progress on its own cadence, peeks at the partially rendered buffer and
//! joins once every row is done.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ember_renderer::{
    start_render, CameraConfig, Framebuffer, RenderJob, RenderSettings, Scene, SceneDescription,
    Vec3,
};

#[derive(Parser, Debug)]
#[command(name = "ember", about = "Render a sphere scene on the CPU")]
struct Args {
    /// Image width in pixels
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Width over height
    #[arg(long, default_value_t = 16.0 / 9.0)]
    aspect: f32,

    /// Samples per pixel
    #[arg(long, default_value_t = 50)]
    samples: u32,

    /// Maximum bounces per path
    #[arg(long, default_value_t = 10)]
    depth: u32,

    /// Worker threads (defaults to available parallelism)
    #[arg(long)]
    threads: Option<usize>,

    /// Base random seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Vertical field of view in degrees
    #[arg(long, default_value_t = 90.0)]
    fov: f32,

    /// JSON scene description; the built-in demo scene is used otherwise
    #[arg(long)]
    scene: Option<PathBuf>,

    /// How often to poll progress, in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
}

fn load_scene(path: Option<&PathBuf>) -> Result<Scene> {
    let Some(path) = path else {
        log::info!("Using built-in demo scene");
        return Ok(Scene::demo());
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading scene {}", path.display()))?;
    let desc: SceneDescription = serde_json::from_str(&text)
        .with_context(|| format!("parsing scene {}", path.display()))?;
    let scene = Scene::from_description(&desc)
        .with_context(|| format!("building scene {}", path.display()))?;

    log::info!(
        "Loaded {} with {} spheres and {} materials",
        path.display(),
        scene.object_count(),
        scene.materials().len()
    );
    Ok(scene)
}

/// Mean 8-bit color over every pixel.
fn average_color(framebuffer: &Framebuffer) -> [f32; 3] {
    let mut sum = [0u64; 3];
    for px in framebuffer.to_rgba8().chunks_exact(4) {
        for (acc, &c) in sum.iter_mut().zip(px) {
            *acc += c as u64;
        }
    }
    let n = framebuffer.len().max(1) as f32;
    sum.map(|s| s as f32 / n)
}

/// Log progress until every worker has exited, then join.
///
/// A worker that dies mid-pass is re-raised by `join`.
fn watch(job: RenderJob, poll: Duration) -> Arc<Framebuffer> {
    let progress = job.progress().clone();
    let mut last_percent = None;
    while !job.is_finished() {
        let percent = (progress.fraction() * 100.0) as u32;
        if last_percent != Some(percent) {
            let preview = job.framebuffer().to_rgba8();
            log::info!(
                "{:3}% ({}/{} rows, preview {} bytes)",
                percent,
                progress.rows_completed(),
                progress.total_rows(),
                preview.len()
            );
            last_percent = Some(percent);
        }
        thread::sleep(poll);
    }
    job.join()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!("Starting Ember");

    let scene = load_scene(args.scene.as_ref())?;

    let camera = CameraConfig::new()
        .with_position(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0), Vec3::Y)
        .with_fov(args.fov)
        .with_aspect_ratio(args.aspect)
        .with_image_width(args.width)
        .with_quality(args.samples, args.depth)
        .initialize()
        .context("invalid camera configuration")?;

    let mut settings = RenderSettings {
        seed: args.seed,
        ..RenderSettings::default()
    };
    if let Some(threads) = args.threads {
        settings.thread_count = threads;
    }

    let job = start_render(Arc::new(scene), Arc::new(camera), &settings)
        .context("invalid render settings")?;

    let framebuffer = watch(job, Duration::from_millis(args.poll_ms));
    let [r, g, b] = average_color(&framebuffer);
    log::info!(
        "Finished {}x{}, average color ({:.1}, {:.1}, {:.1})",
        framebuffer.width(),
        framebuffer.height(),
        r,
        g,
        b
    );

    Ok(())
}
