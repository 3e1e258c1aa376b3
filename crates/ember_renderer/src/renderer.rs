//! Core path tracing integrator.
//!
//! Implements Monte Carlo path tracing with:
//! - Recursive ray tracing with configurable depth
//! - Sky gradient as the only light source
//! - Gamma correction and 8-bit quantization
//! - Anti-aliasing via multi-sampling

use crate::{Camera, Color, Scene};
use ember_math::{Interval, Ray};
use rand::Rng;

/// Valid hit distances. The lower bound keeps a scattered ray from
/// re-hitting the surface it just left.
pub const RAY_T: Interval = Interval::new(0.001, f32::INFINITY);

/// Channels are clamped into this range after gamma correction.
pub const TONE_CLAMP: Interval = Interval::new(0.0, 0.999);

/// Clamped channels are scaled by this and truncated. With the 0.999 upper
/// clamp the largest byte is 255.
pub const TONE_SCALE: f32 = 256.0;

/// Compute the color seen by a ray.
///
/// Returns black once `depth` reaches zero or when a material absorbs.
pub fn ray_color<R: Rng + ?Sized>(ray: &Ray, scene: &Scene, depth: u32, rng: &mut R) -> Color {
    // If we've exceeded max depth, return black (no light)
    if depth == 0 {
        return Color::ZERO;
    }

    let Some(rec) = scene.hit(ray, RAY_T) else {
        return sky_gradient(ray);
    };

    match scene.material(rec.material).scatter(ray, &rec, rng) {
        Some(scatter) => {
            scatter.attenuation * ray_color(&scatter.scattered, scene, depth - 1, rng)
        }
        None => Color::ZERO,
    }
}

/// Vertical white-to-blue background gradient.
pub fn sky_gradient(ray: &Ray) -> Color {
    let unit_direction = ray.direction().normalize();
    let a = 0.5 * (unit_direction.y + 1.0);
    let white = Color::new(1.0, 1.0, 1.0);
    let blue = Color::new(0.5, 0.7, 1.0);
    white * (1.0 - a) + blue * a
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Gamma-correct and clamp one channel into [`TONE_CLAMP`].
///
/// NaN channels map to 0.
#[inline]
pub fn tone_map(linear: f32) -> f32 {
    TONE_CLAMP.clamp(linear_to_gamma(linear))
}

/// Convert a linear color to opaque 8-bit RGBA.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let r = (TONE_SCALE * tone_map(color.x)) as u8;
    let g = (TONE_SCALE * tone_map(color.y)) as u8;
    let b = (TONE_SCALE * tone_map(color.z)) as u8;
    [r, g, b, 255]
}

/// Render a single pixel with multi-sampling. Returns the averaged
/// linear color.
pub fn render_pixel<R: Rng + ?Sized>(
    camera: &Camera,
    scene: &Scene,
    x: u32,
    y: u32,
    rng: &mut R,
) -> Color {
    let samples = camera.samples_per_pixel();
    let mut pixel_color = Color::ZERO;

    for _ in 0..samples {
        let ray = camera.get_ray(x, y, rng);
        pixel_color += ray_color(&ray, scene, camera.max_depth(), rng);
    }

    pixel_color / samples as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CameraConfig;
    use ember_math::Vec3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sky_gradient() {
        let up = sky_gradient(&Ray::new(Vec3::ZERO, Vec3::Y));
        let down = sky_gradient(&Ray::new(Vec3::ZERO, Vec3::NEG_Y));
        let level = sky_gradient(&Ray::new(Vec3::ZERO, Vec3::new(3.0, 0.0, -2.0)));

        assert!((up - Color::new(0.5, 0.7, 1.0)).length() < 1e-6);
        assert!((down - Color::ONE).length() < 1e-6);
        assert!((level - Color::new(0.75, 0.85, 1.0)).length() < 1e-6);
    }

    #[test]
    fn test_linear_to_gamma() {
        assert_eq!(linear_to_gamma(0.0), 0.0);
        assert_eq!(linear_to_gamma(-1.0), 0.0);
        assert!((linear_to_gamma(1.0) - 1.0).abs() < 0.0001);
        assert!((linear_to_gamma(0.25) - 0.5).abs() < 0.0001);
    }

    #[test]
    fn test_tone_map_is_stable_under_reclamp() {
        for x in [-2.0, 0.0, 0.1, 0.5, 0.998, 0.999, 1.0, 7.0] {
            let once = tone_map(x);
            assert!(TONE_CLAMP.contains(once));
            assert_eq!(TONE_CLAMP.clamp(once), once);
        }
        assert_eq!(tone_map(f32::NAN), 0.0);
    }

    #[test]
    fn test_color_to_rgba() {
        assert_eq!(color_to_rgba(Color::ZERO), [0, 0, 0, 255]);
        assert_eq!(color_to_rgba(Color::ONE), [255, 255, 255, 255]);
        assert_eq!(color_to_rgba(Color::splat(100.0)), [255, 255, 255, 255]);
        // sqrt(0.25) = 0.5 -> 128
        assert_eq!(color_to_rgba(Color::new(0.25, 0.0, 1.0)), [128, 0, 255, 255]);
    }

    #[test]
    fn test_zero_depth_is_black() {
        let mut rng = StdRng::seed_from_u64(0);
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);

        for scene in [Scene::new(), Scene::demo()] {
            assert_eq!(ray_color(&ray, &scene, 0, &mut rng), Color::ZERO);
        }
    }

    #[test]
    fn test_empty_scene_returns_sky() {
        let mut rng = StdRng::seed_from_u64(0);
        let scene = Scene::new();
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.2, 0.6, -1.0));
        assert_eq!(ray_color(&ray, &scene, 5, &mut rng), sky_gradient(&ray));
    }

    #[test]
    fn test_diffuse_hit_is_tinted_by_albedo() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut scene = Scene::new();
        let red = scene.make_lambertian(Color::new(0.9, 0.0, 0.0)).unwrap();
        scene.add_sphere(Vec3::new(0.0, 0.0, -2.0), 0.5, red).unwrap();

        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        // Depth 2: one bounce, then either sky or black
        let color = ray_color(&ray, &scene, 2, &mut rng);
        assert_eq!(color.y, 0.0);
        assert_eq!(color.z, 0.0);
    }

    #[test]
    fn test_render_pixel() {
        let scene = Scene::two_spheres();
        let camera = CameraConfig::new()
            .with_aspect_ratio(1.0)
            .with_image_width(10)
            .with_quality(4, 5)
            .initialize()
            .unwrap();

        let mut rng = StdRng::seed_from_u64(42);

        // Center pixel hits the sphere
        let color = render_pixel(&camera, &scene, 5, 5, &mut rng);
        assert!(color.length() > 0.0);
        assert!(color.is_finite());
    }
}
