//! Ember - multithreaded CPU path tracing.
//!
//! A Monte Carlo path tracer over spheres with diffuse, metal and glass
//! materials lit by a sky gradient. The typical flow:
//!
//! 1. Build a [`Scene`] (by hand or from a [`SceneDescription`]).
//! 2. Validate a [`CameraConfig`] into a [`Camera`].
//! 3. Call [`render`] to block, or [`start_render`] to poll a
//!    [`RenderJob`] from a display loop.

mod camera;
mod error;
mod framebuffer;
mod hittable;
mod material;
mod renderer;
mod scene;
mod sphere;
mod tiled;

pub use camera::{Camera, CameraConfig, MAX_PIXELS};
pub use error::{ConfigError, Result};
pub use framebuffer::{Framebuffer, Rgba};
pub use hittable::{HitRecord, Hittable, HittableList};
pub use material::{reflectance, Color, Material, MaterialArena, MaterialId, Scatter};
pub use renderer::{
    color_to_rgba, linear_to_gamma, ray_color, render_pixel, sky_gradient, tone_map, RAY_T,
    TONE_CLAMP, TONE_SCALE,
};
pub use scene::{NamedMaterial, Scene, SceneDescription, SphereDescription};
pub use sphere::Sphere;
pub use tiled::{
    partition_rows, render, render_into, start_render, Progress, RenderJob, RenderSettings,
};

/// Re-export math types from ember_math
pub use ember_math::{Interval, Ray, Vec3};
