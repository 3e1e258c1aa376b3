//! Surface scattering models.
//!
//! Materials are a closed set, dispatched with a single `match` in
//! [`Material::scatter`]. Shapes never own a material directly; they hold a
//! [`MaterialId`] into the scene's [`MaterialArena`], so one material can
//! back any number of spheres.

use crate::hittable::HitRecord;
use ember_math::random::{random_in_unit_sphere, random_unit_vector};
use ember_math::{is_near_zero, reflect, refract, Ray, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Color type alias (linear RGB, typically 0-1)
pub type Color = Vec3;

/// Result of a successful scatter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scatter {
    /// Per-channel fraction of the scattered ray's color that survives
    pub attenuation: Color,
    /// Outgoing ray, starting at the hit point
    pub scattered: Ray,
}

/// How light interacts with a surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Material {
    /// Diffuse reflector with cosine-weighted scattering.
    Lambertian { albedo: Color },
    /// Specular reflector. `fuzz` 0.0 is a perfect mirror, 1.0 very rough.
    Metal { albedo: Color, fuzz: f32 },
    /// Clear refractive material such as glass or water.
    Dielectric {
        /// Index of refraction (1.0 = air, 1.5 = glass, 2.4 = diamond)
        ior: f32,
    },
}

impl Material {
    pub fn lambertian(albedo: Color) -> Self {
        Material::Lambertian { albedo }
    }

    /// Create a metal, clamping `fuzz` into `[0, 1]`.
    pub fn metal(albedo: Color, fuzz: f32) -> Self {
        Material::Metal {
            albedo,
            fuzz: fuzz.clamp(0.0, 1.0),
        }
    }

    pub fn dielectric(ior: f32) -> Self {
        Material::Dielectric { ior }
    }

    /// Scatter an incoming ray.
    ///
    /// Returns `None` if the ray is absorbed. Only metals ever absorb.
    pub fn scatter<R: Rng + ?Sized>(
        &self,
        ray_in: &Ray,
        rec: &HitRecord,
        rng: &mut R,
    ) -> Option<Scatter> {
        match *self {
            Material::Lambertian { albedo } => {
                let mut scatter_direction = rec.normal + random_unit_vector(rng);

                // Catch degenerate scatter direction
                if is_near_zero(scatter_direction) {
                    scatter_direction = rec.normal;
                }

                Some(Scatter {
                    attenuation: albedo,
                    scattered: Ray::new(rec.p, scatter_direction),
                })
            }
            Material::Metal { albedo, fuzz } => {
                let reflected = reflect(ray_in.direction().normalize(), rec.normal);
                let direction = reflected + fuzz * random_in_unit_sphere(rng);

                // Fuzzed below the surface: absorbed
                if direction.dot(rec.normal) <= 0.0 {
                    return None;
                }

                Some(Scatter {
                    attenuation: albedo,
                    scattered: Ray::new(rec.p, direction),
                })
            }
            Material::Dielectric { ior } => {
                let refraction_ratio = if rec.front_face { 1.0 / ior } else { ior };

                let unit_direction = ray_in.direction().normalize();
                let cos_theta = (-unit_direction).dot(rec.normal).min(1.0);
                let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();

                let cannot_refract = refraction_ratio * sin_theta > 1.0;
                let direction = if cannot_refract
                    || rng.gen::<f32>() < reflectance(cos_theta, refraction_ratio)
                {
                    reflect(unit_direction, rec.normal)
                } else {
                    refract(unit_direction, rec.normal, refraction_ratio)
                };

                Some(Scatter {
                    attenuation: Color::ONE,
                    scattered: Ray::new(rec.p, direction),
                })
            }
        }
    }
}

/// Schlick's approximation for reflectance.
///
/// `cosine` is the cosine of the incident angle, `refraction_ratio` the
/// ratio of refractive indices. The result lies in `[0, 1]` for any
/// `cosine` in `[0, 1]` and positive ratio.
pub fn reflectance(cosine: f32, refraction_ratio: f32) -> f32 {
    let r0 = ((1.0 - refraction_ratio) / (1.0 + refraction_ratio)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}

/// Stable handle to a material stored in a [`MaterialArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub(crate) u32);

impl MaterialId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Append-only storage for the materials of one scene.
#[derive(Debug, Clone, Default)]
pub struct MaterialArena {
    materials: Vec<Material>,
}

impl MaterialArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.materials.len() as u32);
        self.materials.push(material);
        id
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.index())
    }

    pub fn contains(&self, id: MaterialId) -> bool {
        id.index() < self.materials.len()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
