//! Camera for ray generation.

use crate::error::{ConfigError, Result};
use ember_math::random::sample_square;
use ember_math::{Ray, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Largest image [`CameraConfig::initialize`] accepts, in pixels.
pub const MAX_PIXELS: u64 = 1 << 28;

/// User-facing camera settings.
///
/// Everything needed to place the camera and size the image. Call
/// [`CameraConfig::initialize`] to validate it and get a [`Camera`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    // Camera positioning
    pub look_from: Vec3,
    pub look_at: Vec3,
    pub vup: Vec3,

    /// Vertical field of view in degrees
    pub vfov: f32,
    /// Image width over height
    pub aspect_ratio: f32,

    // Image settings
    pub image_width: u32,
    pub samples_per_pixel: u32,
    pub max_depth: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            look_from: Vec3::new(0.0, 0.0, 1.0),
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::Y,
            vfov: 90.0,
            aspect_ratio: 16.0 / 9.0,
            image_width: 800,
            samples_per_pixel: 50,
            max_depth: 10,
        }
    }
}

impl CameraConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self
    }

    pub fn with_fov(mut self, vfov: f32) -> Self {
        self.vfov = vfov;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: f32) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_image_width(mut self, image_width: u32) -> Self {
        self.image_width = image_width;
        self
    }

    /// Set quality settings.
    pub fn with_quality(mut self, samples_per_pixel: u32, max_depth: u32) -> Self {
        self.samples_per_pixel = samples_per_pixel;
        self.max_depth = max_depth;
        self
    }

    /// Image height implied by the width and aspect ratio, at least 1.
    pub fn image_height(&self) -> u32 {
        ((self.image_width as f32 / self.aspect_ratio) as u32).max(1)
    }

    /// Validate the settings and derive the camera basis and pixel grid.
    pub fn initialize(&self) -> Result<Camera> {
        if self.image_width == 0 {
            return Err(ConfigError::ZeroWidth);
        }
        if self.samples_per_pixel == 0 {
            return Err(ConfigError::ZeroSamples);
        }
        if !self.aspect_ratio.is_finite() || self.aspect_ratio <= 0.0 {
            return Err(ConfigError::InvalidAspectRatio(self.aspect_ratio));
        }
        // Checked before the f32 -> u32 cast, which saturates
        let raw_height = (self.image_width as f32 / self.aspect_ratio).floor();
        let too_large = |height: u64| ConfigError::ImageTooLarge {
            width: self.image_width,
            height,
            max: MAX_PIXELS,
        };
        if !raw_height.is_finite() || raw_height >= u32::MAX as f32 {
            return Err(too_large(u64::MAX));
        }
        let height = (raw_height as u64).max(1);
        match (self.image_width as u64).checked_mul(height) {
            Some(pixels) if pixels <= MAX_PIXELS => {}
            _ => return Err(too_large(height)),
        }
        if !self.vfov.is_finite() || self.vfov <= 0.0 || self.vfov >= 180.0 {
            return Err(ConfigError::InvalidFov(self.vfov));
        }
        for (v, what) in [
            (self.look_from, "look_from"),
            (self.look_at, "look_at"),
            (self.vup, "vup"),
        ] {
            if !v.is_finite() {
                return Err(ConfigError::NonFinite(what));
            }
        }

        let view = self.look_from - self.look_at;
        if view.length_squared() < 1e-12 {
            return Err(ConfigError::DegenerateCamera("look_from equals look_at"));
        }
        if self.vup.cross(view).length_squared() < 1e-12 * view.length_squared() {
            return Err(ConfigError::DegenerateCamera(
                "view direction is parallel to the up vector",
            ));
        }

        let image_width = self.image_width;
        let image_height = self.image_height();
        let center = self.look_from;

        // Calculate viewport dimensions
        let h = (self.vfov.to_radians() / 2.0).tan();
        let viewport_height = 2.0 * h;
        let viewport_width = viewport_height * self.aspect_ratio;

        // Calculate camera basis vectors
        let w = view.normalize();
        let u = self.vup.cross(w).normalize();
        let v = w.cross(u);

        // Viewport edges; v runs down the image
        let viewport_u = viewport_width * u;
        let viewport_v = -viewport_height * v;

        let pixel_delta_u = viewport_u / image_width as f32;
        let pixel_delta_v = viewport_v / image_height as f32;

        let viewport_upper_left = center - w - viewport_u / 2.0 - viewport_v / 2.0;
        let pixel00_loc = viewport_upper_left + 0.5 * (pixel_delta_u + pixel_delta_v);

        Ok(Camera {
            image_width,
            image_height,
            samples_per_pixel: self.samples_per_pixel,
            max_depth: self.max_depth,
            center,
            pixel00_loc,
            pixel_delta_u,
            pixel_delta_v,
        })
    }
}

/// An initialized camera. Immutable and shareable across render threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    image_width: u32,
    image_height: u32,
    samples_per_pixel: u32,
    max_depth: u32,

    center: Vec3,
    pixel00_loc: Vec3,
    pixel_delta_u: Vec3,
    pixel_delta_v: Vec3,
}

impl Camera {
    /// Generate a ray for pixel (i, j), jittered within the pixel footprint.
    ///
    /// Row `j = 0` is the top of the image.
    pub fn get_ray<R: Rng + ?Sized>(&self, i: u32, j: u32, rng: &mut R) -> Ray {
        let offset = sample_square(rng);

        let pixel_sample = self.pixel00_loc
            + ((i as f32) + offset.x) * self.pixel_delta_u
            + ((j as f32) + offset.y) * self.pixel_delta_v;

        Ray::new(self.center, pixel_sample - self.center)
    }

    /// Ray through the exact center of pixel (i, j), without jitter.
    pub fn center_ray(&self, i: u32, j: u32) -> Ray {
        let pixel_center =
            self.pixel00_loc + (i as f32) * self.pixel_delta_u + (j as f32) * self.pixel_delta_v;
        Ray::new(self.center, pixel_center - self.center)
    }

    pub fn image_width(&self) -> u32 {
        self.image_width
    }

    pub fn image_height(&self) -> u32 {
        self.image_height
    }

    pub fn samples_per_pixel(&self) -> u32 {
        self.samples_per_pixel
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }
}
