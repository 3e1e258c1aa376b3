//! Scene construction.
//!
//! A [`Scene`] owns every material and shape for one render. It is built up
//! front, validated at the boundary, and then only read while rendering.

use std::collections::HashMap;

use crate::error::{ConfigError, Result};
use crate::hittable::{HitRecord, HittableList};
use crate::material::{Color, Material, MaterialArena, MaterialId};
use crate::sphere::Sphere;
use ember_math::{Interval, Ray, Vec3};
use serde::{Deserialize, Serialize};

/// Geometry and materials for one render.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    materials: MaterialArena,
    world: HittableList,
}

impl Scene {
    /// Create an empty scene (renders pure sky).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_lambertian(&mut self, albedo: Color) -> Result<MaterialId> {
        check_finite(albedo, "albedo")?;
        Ok(self.materials.add(Material::lambertian(albedo)))
    }

    /// Add a metal. Unlike [`Material::metal`], out-of-range fuzz is rejected.
    pub fn make_metal(&mut self, albedo: Color, fuzz: f32) -> Result<MaterialId> {
        check_finite(albedo, "albedo")?;
        if !(0.0..=1.0).contains(&fuzz) {
            return Err(ConfigError::InvalidFuzz(fuzz));
        }
        Ok(self.materials.add(Material::metal(albedo, fuzz)))
    }

    pub fn make_dielectric(&mut self, refractive_index: f32) -> Result<MaterialId> {
        if !refractive_index.is_finite() || refractive_index <= 0.0 {
            return Err(ConfigError::InvalidRefractiveIndex(refractive_index));
        }
        Ok(self.materials.add(Material::dielectric(refractive_index)))
    }

    pub fn add_sphere(&mut self, center: Vec3, radius: f32, material: MaterialId) -> Result<()> {
        check_finite(center, "sphere center")?;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ConfigError::InvalidRadius(radius));
        }
        if !self.materials.contains(material) {
            return Err(ConfigError::UnknownMaterial(format!("#{}", material.index())));
        }
        self.world.add(Sphere::new(center, radius, material));
        Ok(())
    }

    /// Nearest hit of `ray` across the whole scene.
    #[inline]
    pub fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord> {
        self.world.hit(ray, ray_t)
    }

    /// Material behind a hit.
    ///
    /// Ids only come from this scene's arena, so a miss here is a broken
    /// invariant rather than a configuration error.
    #[inline]
    pub fn material(&self, id: MaterialId) -> &Material {
        match self.materials.get(id) {
            Some(material) => material,
            None => panic!("material {:?} does not belong to this scene", id),
        }
    }

    pub fn materials(&self) -> &MaterialArena {
        &self.materials
    }

    pub fn world(&self) -> &HittableList {
        &self.world
    }

    pub fn object_count(&self) -> usize {
        self.world.len()
    }

    /// Build a scene from a parsed description, resolving material names.
    pub fn from_description(desc: &SceneDescription) -> Result<Self> {
        let mut scene = Scene::new();
        let mut ids: HashMap<&str, MaterialId> = HashMap::new();

        for named in &desc.materials {
            let id = match named.material {
                Material::Lambertian { albedo } => scene.make_lambertian(albedo)?,
                Material::Metal { albedo, fuzz } => scene.make_metal(albedo, fuzz)?,
                Material::Dielectric { ior } => scene.make_dielectric(ior)?,
            };
            if ids.insert(named.name.as_str(), id).is_some() {
                return Err(ConfigError::DuplicateMaterial(named.name.clone()));
            }
        }

        for sphere in &desc.spheres {
            let id = *ids
                .get(sphere.material.as_str())
                .ok_or_else(|| ConfigError::UnknownMaterial(sphere.material.clone()))?;
            scene.add_sphere(sphere.center, sphere.radius, id)?;
        }

        log::debug!(
            "Built scene with {} materials and {} spheres",
            scene.materials.len(),
            scene.object_count()
        );

        Ok(scene)
    }

    /// Ground plus one diffuse sphere in front of the camera.
    pub fn two_spheres() -> Self {
        SceneDescription::two_spheres().build()
    }

    /// Ground, a diffuse center sphere, a glass sphere on the left and a
    /// fuzzy metal sphere on the right.
    pub fn demo() -> Self {
        SceneDescription::demo().build()
    }
}

fn check_finite(v: Vec3, what: &'static str) -> Result<()> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite(what))
    }
}

/// A material with a name spheres can refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedMaterial {
    pub name: String,
    #[serde(flatten)]
    pub material: Material,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphereDescription {
    pub center: Vec3,
    pub radius: f32,
    /// Name of an entry in [`SceneDescription::materials`]
    pub material: String,
}

/// Serializable scene layout, e.g. loaded from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    #[serde(default)]
    pub materials: Vec<NamedMaterial>,
    #[serde(default)]
    pub spheres: Vec<SphereDescription>,
}

impl SceneDescription {
    pub fn material(mut self, name: &str, material: Material) -> Self {
        self.materials.push(NamedMaterial {
            name: name.to_string(),
            material,
        });
        self
    }

    pub fn sphere(mut self, center: Vec3, radius: f32, material: &str) -> Self {
        self.spheres.push(SphereDescription {
            center,
            radius,
            material: material.to_string(),
        });
        self
    }

    pub fn two_spheres() -> Self {
        SceneDescription::default()
            .material("ground", Material::lambertian(Color::new(0.8, 0.8, 0.0)))
            .material("center", Material::lambertian(Color::new(0.1, 0.2, 0.5)))
            .sphere(Vec3::new(0.0, -100.5, -1.0), 100.0, "ground")
            .sphere(Vec3::new(0.0, 0.0, -1.0), 0.5, "center")
    }

    pub fn demo() -> Self {
        Self::two_spheres()
            .material("glass", Material::dielectric(1.5))
            .material("gold", Material::metal(Color::new(0.8, 0.6, 0.2), 0.3))
            .sphere(Vec3::new(-1.0, 0.0, -1.0), 0.5, "glass")
            .sphere(Vec3::new(1.0, 0.0, -1.0), 0.5, "gold")
    }

    /// Build a description known to be valid.
    fn build(&self) -> Scene {
        match Scene::from_description(self) {
            Ok(scene) => scene,
            Err(e) => panic!("built-in scene is invalid: {e}"),
        }
    }
}
