//! Multithreaded row-partitioned rendering.
//!
//! The image rows are split into one contiguous range per worker. Each
//! worker owns its rows for the whole pass, so pixel writes never overlap
//! and the framebuffer needs no lock. The only contended state is the
//! [`Progress`] counter, bumped once per finished row.
//!
//! Threads are spawned at render start and joined at the end of the pass.
//! [`render`] and [`render_into`] block; [`start_render`] returns a
//! [`RenderJob`] the caller polls and joins from its own loop.

use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::error::{ConfigError, Result};
use crate::framebuffer::{Framebuffer, Rgba};
use crate::renderer::{color_to_rgba, render_pixel};
use crate::{Camera, Scene};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Threading and seeding for one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Number of worker threads. Must be at least 1.
    pub thread_count: usize,
    /// Base seed. Worker `k` derives its own generator from this, so the
    /// same seed and thread count give byte-identical images.
    pub seed: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            thread_count: thread::available_parallelism().map_or(1, |n| n.get()),
            seed: 0,
        }
    }
}

impl RenderSettings {
    pub fn new(thread_count: usize, seed: u64) -> Self {
        Self { thread_count, seed }
    }
}

/// Split `height` rows into `thread_count` contiguous ranges.
///
/// Every range gets `height / thread_count` rows and the remainder is
/// appended to the last one, so the ranges cover `0..height` exactly once.
/// Ranges are empty when there are more threads than rows.
pub fn partition_rows(height: u32, thread_count: usize) -> Vec<Range<u32>> {
    let threads = thread_count.max(1) as u32;
    let base = height / threads;

    (0..threads)
        .map(|k| {
            let start = k * base;
            let end = if k + 1 == threads { height } else { start + base };
            start..end
        })
        .collect()
}

/// Seed for worker `worker`, spread so neighbouring workers get unrelated
/// streams.
fn worker_seed(seed: u64, worker: usize) -> u64 {
    seed ^ (worker as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Rows completed in the current render pass.
///
/// Cheap to clone; all clones observe the same counter. Reads may lag
/// behind workers slightly but never go backwards within a pass.
#[derive(Debug, Clone)]
pub struct Progress {
    rows: Arc<AtomicU32>,
    total: u32,
}

impl Progress {
    pub fn new(total_rows: u32) -> Self {
        Self {
            rows: Arc::new(AtomicU32::new(0)),
            total: total_rows,
        }
    }

    pub fn rows_completed(&self) -> u32 {
        self.rows.load(Ordering::Relaxed)
    }

    pub fn total_rows(&self) -> u32 {
        self.total
    }

    /// Completed fraction in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        self.rows_completed() as f32 / self.total as f32
    }

    pub fn is_complete(&self) -> bool {
        self.rows_completed() >= self.total
    }

    fn reset(&self) {
        self.rows.store(0, Ordering::Relaxed);
    }

    fn row_done(&self) {
        self.rows.fetch_add(1, Ordering::Relaxed);
    }
}

/// Destination for finished pixels.
pub(crate) trait PixelSink: Sync {
    fn put(&self, worker: usize, x: u32, y: u32, rgba: Rgba);
}

impl PixelSink for Framebuffer {
    #[inline]
    fn put(&self, _worker: usize, x: u32, y: u32, rgba: Rgba) {
        self.set(x, y, rgba);
    }
}

/// Validate settings against the camera and lay out the worker ranges.
fn plan(camera: &Camera, settings: &RenderSettings) -> Result<Vec<Range<u32>>> {
    if settings.thread_count == 0 {
        return Err(ConfigError::ZeroThreads);
    }

    let height = camera.image_height();
    let mut threads = settings.thread_count;
    if threads > height as usize {
        log::debug!(
            "Reducing {} threads to {} for a {} row image",
            threads,
            height,
            height
        );
        threads = height as usize;
    }

    log::info!(
        "Rendering {}x{} @ {} spp, depth {}, {} threads",
        camera.image_width(),
        height,
        camera.samples_per_pixel(),
        camera.max_depth(),
        threads
    );

    let ranges = partition_rows(height, threads);
    for (worker, rows) in ranges.iter().enumerate() {
        log::debug!("Worker {} renders rows {:?}", worker, rows);
    }
    Ok(ranges)
}

fn check_targets(camera: &Camera, framebuffer: &Framebuffer, progress: &Progress) -> Result<()> {
    let expected = (camera.image_width(), camera.image_height());
    let actual = (framebuffer.width(), framebuffer.height());
    if expected != actual {
        return Err(ConfigError::FramebufferSize { expected, actual });
    }
    if progress.total_rows() != camera.image_height() {
        return Err(ConfigError::ProgressSize {
            expected: camera.image_height(),
            actual: progress.total_rows(),
        });
    }
    Ok(())
}

/// Render `rows` on the current thread, one progress tick per row.
fn render_rows<S: PixelSink + ?Sized>(
    worker: usize,
    rows: Range<u32>,
    scene: &Scene,
    camera: &Camera,
    sink: &S,
    progress: &Progress,
    seed: u64,
) {
    let mut rng = StdRng::seed_from_u64(worker_seed(seed, worker));

    for y in rows {
        for x in 0..camera.image_width() {
            let color = render_pixel(camera, scene, x, y, &mut rng);
            sink.put(worker, x, y, color_to_rgba(color));
        }
        progress.row_done();
    }
}

/// Spawn scoped workers over `ranges` and wait for all of them.
///
/// A panicking worker is re-raised here once the scope ends.
fn render_scoped<S: PixelSink>(
    ranges: Vec<Range<u32>>,
    scene: &Scene,
    camera: &Camera,
    sink: &S,
    progress: &Progress,
    seed: u64,
) {
    progress.reset();
    thread::scope(|s| {
        for (worker, rows) in ranges.into_iter().enumerate() {
            s.spawn(move || render_rows(worker, rows, scene, camera, sink, progress, seed));
        }
    });
}

/// Render the whole image, blocking until every worker has finished.
pub fn render(scene: &Scene, camera: &Camera, settings: &RenderSettings) -> Result<Framebuffer> {
    let framebuffer = Framebuffer::new(camera.image_width(), camera.image_height());
    let progress = Progress::new(camera.image_height());
    render_into(scene, camera, settings, &framebuffer, &progress)?;
    Ok(framebuffer)
}

/// Render into a caller-owned framebuffer, blocking until done.
///
/// `progress` is reset to 0 first and equals the image height on return.
/// Other threads may read both while this runs.
pub fn render_into(
    scene: &Scene,
    camera: &Camera,
    settings: &RenderSettings,
    framebuffer: &Framebuffer,
    progress: &Progress,
) -> Result<()> {
    check_targets(camera, framebuffer, progress)?;
    let ranges = plan(camera, settings)?;

    let start = Instant::now();
    render_scoped(ranges, scene, camera, framebuffer, progress, settings.seed);
    log::info!("Rendered in {:?}", start.elapsed());

    Ok(())
}

/// A render pass running on background threads.
pub struct RenderJob {
    framebuffer: Arc<Framebuffer>,
    progress: Progress,
    workers: Vec<JoinHandle<()>>,
    started: Instant,
}

impl RenderJob {
    /// The buffer being rendered into. Readable at any time.
    pub fn framebuffer(&self) -> &Arc<Framebuffer> {
        &self.framebuffer
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// True once every worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.workers.iter().all(JoinHandle::is_finished)
    }

    /// Wait for every worker and hand back the finished image.
    ///
    /// A worker panic is a fatal fault and is resumed on the caller's thread.
    pub fn join(self) -> Arc<Framebuffer> {
        for worker in self.workers {
            if let Err(panic) = worker.join() {
                std::panic::resume_unwind(panic);
            }
        }
        log::info!("Rendered in {:?}", self.started.elapsed());
        self.framebuffer
    }
}

/// Start rendering on background threads and return immediately.
///
/// The caller keeps its own loop alive, polls [`RenderJob::progress`] and
/// calls [`RenderJob::join`] once [`RenderJob::is_finished`] is true. A
/// panicked worker never completes its rows.
pub fn start_render(
    scene: Arc<Scene>,
    camera: Arc<Camera>,
    settings: &RenderSettings,
) -> Result<RenderJob> {
    let ranges = plan(&camera, settings)?;

    let framebuffer = Arc::new(Framebuffer::new(camera.image_width(), camera.image_height()));
    let progress = Progress::new(camera.image_height());
    let seed = settings.seed;

    let workers = ranges
        .into_iter()
        .enumerate()
        .map(|(worker, rows)| {
            let scene = Arc::clone(&scene);
            let camera = Arc::clone(&camera);
            let framebuffer = Arc::clone(&framebuffer);
            let progress = progress.clone();
            thread::spawn(move || {
                render_rows(worker, rows, &scene, &camera, &*framebuffer, &progress, seed)
            })
        })
        .collect();

    Ok(RenderJob {
        framebuffer,
        progress,
        workers,
        started: Instant::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CameraConfig;
    use ember_math::Vec3;
    use std::sync::atomic::AtomicUsize;

    /// Records how often each pixel was written and by which worker.
    struct TaggedSink {
        width: u32,
        writes: Vec<AtomicU32>,
        owner: Vec<AtomicUsize>,
    }

    impl TaggedSink {
        fn new(width: u32, height: u32) -> Self {
            let count = (width * height) as usize;
            Self {
                width,
                writes: (0..count).map(|_| AtomicU32::new(0)).collect(),
                owner: (0..count).map(|_| AtomicUsize::new(usize::MAX)).collect(),
            }
        }
    }

    impl PixelSink for TaggedSink {
        fn put(&self, worker: usize, x: u32, y: u32, _rgba: Rgba) {
            let i = (y * self.width + x) as usize;
            self.writes[i].fetch_add(1, Ordering::Relaxed);
            self.owner[i].store(worker, Ordering::Relaxed);
        }
    }

    fn small_camera(width: u32, height: u32) -> Camera {
        CameraConfig::new()
            .with_position(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0), Vec3::Y)
            .with_aspect_ratio(width as f32 / height as f32)
            .with_image_width(width)
            .with_quality(1, 3)
            .initialize()
            .unwrap()
    }

    #[test]
    fn test_partition_covers_every_row_once() {
        for height in [1, 2, 7, 10, 99, 480] {
            for threads in 1..=12 {
                let ranges = partition_rows(height, threads);
                assert_eq!(ranges.len(), threads);

                let mut next = 0;
                for r in &ranges {
                    assert_eq!(r.start, next);
                    next = r.end;
                }
                assert_eq!(next, height);
            }
        }
    }

    #[test]
    fn test_partition_remainder_goes_last() {
        assert_eq!(partition_rows(10, 3), vec![0..3, 3..6, 6..10]);
        assert_eq!(partition_rows(5, 1), vec![0..5]);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let camera = small_camera(4, 4);
        assert_eq!(
            render(&Scene::new(), &camera, &RenderSettings::new(0, 0)).unwrap_err(),
            ConfigError::ZeroThreads
        );
    }

    #[test]
    fn test_mismatched_targets_rejected() {
        let camera = small_camera(4, 2);
        let settings = RenderSettings::new(2, 0);

        let wrong = Framebuffer::new(2, 2);
        let err = render_into(&Scene::new(), &camera, &settings, &wrong, &Progress::new(2));
        assert!(matches!(err, Err(ConfigError::FramebufferSize { .. })));

        let fb = Framebuffer::new(4, 2);
        let err = render_into(&Scene::new(), &camera, &settings, &fb, &Progress::new(3));
        assert!(matches!(err, Err(ConfigError::ProgressSize { .. })));
    }

    #[test]
    fn test_every_pixel_written_by_exactly_one_worker() {
        let camera = small_camera(9, 13);
        let scene = Scene::two_spheres();
        let threads = 4;
        let ranges = partition_rows(camera.image_height(), threads);
        let sink = TaggedSink::new(camera.image_width(), camera.image_height());
        let progress = Progress::new(camera.image_height());

        render_scoped(ranges.clone(), &scene, &camera, &sink, &progress, 7);

        for (i, writes) in sink.writes.iter().enumerate() {
            assert_eq!(writes.load(Ordering::Relaxed), 1, "pixel {i}");
        }
        // Owner matches the row partition
        for (worker, rows) in ranges.iter().enumerate() {
            for y in rows.clone() {
                for x in 0..camera.image_width() {
                    let i = (y * camera.image_width() + x) as usize;
                    assert_eq!(sink.owner[i].load(Ordering::Relaxed), worker);
                }
            }
        }
        assert_eq!(progress.rows_completed(), camera.image_height());
    }

    #[test]
    fn test_more_threads_than_rows() {
        let camera = small_camera(6, 2);
        let fb = render(&Scene::new(), &camera, &RenderSettings::new(16, 0)).unwrap();
        assert_eq!(fb.height(), 2);
        // Sky is never black
        for y in 0..2 {
            for x in 0..6 {
                assert_ne!(fb.get(x, y), [0, 0, 0, 255]);
            }
        }
    }

    #[test]
    fn test_empty_scene_matches_analytic_sky() {
        let camera = small_camera(8, 6);
        let seed = 21;
        let fb = render(&Scene::new(), &camera, &RenderSettings::new(1, seed)).unwrap();

        // Replay the single worker's jitter; sky rays consume no other samples
        let mut rng = StdRng::seed_from_u64(worker_seed(seed, 0));
        for y in 0..camera.image_height() {
            for x in 0..camera.image_width() {
                let ray = camera.get_ray(x, y, &mut rng);
                let expected = color_to_rgba(crate::sky_gradient(&ray));
                assert_eq!(fb.get(x, y), expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_two_pixel_depth_one_is_black_on_hits_and_sky_on_misses() {
        let camera = CameraConfig::new()
            .with_position(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0), Vec3::Y)
            .with_aspect_ratio(2.0)
            .with_image_width(2)
            .with_quality(1, 1)
            .initialize()
            .unwrap();
        let scene = Scene::two_spheres();
        let seed = 3;
        let fb = render(&scene, &camera, &RenderSettings::new(1, seed)).unwrap();
        assert_eq!((fb.width(), fb.height()), (2, 1));

        let mut rng = StdRng::seed_from_u64(worker_seed(seed, 0));
        for x in 0..2 {
            let ray = camera.get_ray(x, 0, &mut rng);
            let hit = scene.hit(&ray, crate::RAY_T).is_some();
            // Same draws as the worker so later pixels stay in step
            let color = crate::ray_color(&ray, &scene, 1, &mut rng);
            assert!(color.is_finite(), "pixel {x} = {color:?}");

            if hit {
                assert_eq!(color, Vec3::ZERO, "pixel {x}");
                assert_eq!(fb.get(x, 0), [0, 0, 0, 255], "pixel {x}");
            } else {
                assert_eq!(fb.get(x, 0), color_to_rgba(crate::sky_gradient(&ray)), "pixel {x}");
            }
        }
    }

    #[test]
    #[should_panic(expected = "worker fault")]
    fn test_dead_worker_finishes_job_and_join_reraises() {
        let progress = Progress::new(4);
        let job = RenderJob {
            framebuffer: Arc::new(Framebuffer::new(1, 4)),
            progress: progress.clone(),
            workers: vec![thread::spawn(|| panic!("worker fault"))],
            started: Instant::now(),
        };

        while !job.is_finished() {
            thread::yield_now();
        }
        assert!(!progress.is_complete());
        job.join();
    }

    #[test]
    fn test_worker_seeds_differ() {
        assert_ne!(worker_seed(5, 0), worker_seed(5, 1));
        assert_ne!(worker_seed(5, 0), worker_seed(6, 0));
    }

    #[test]
    fn test_progress_fraction() {
        let progress = Progress::new(4);
        assert_eq!(progress.fraction(), 0.0);
        progress.row_done();
        assert_eq!(progress.fraction(), 0.25);
        assert!(!progress.is_complete());
        for _ in 0..3 {
            progress.row_done();
        }
        assert!(progress.is_complete());
        progress.reset();
        assert_eq!(progress.rows_completed(), 0);
    }
}
