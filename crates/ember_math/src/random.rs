//! Random samplers used for anti-aliasing and scattering.
//!
//! Every sampler takes its generator explicitly so each render worker can
//! own an independently seeded source.

use crate::{Vec2, Vec3};
use rand::Rng;

/// Uniform random vector with every component in `[min, max)`.
pub fn random_vec<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> Vec3 {
    Vec3::new(
        rng.gen_range(min..max),
        rng.gen_range(min..max),
        rng.gen_range(min..max),
    )
}

/// Random point strictly inside the unit sphere (rejection sampled).
pub fn random_in_unit_sphere<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    loop {
        let p = random_vec(rng, -1.0, 1.0);
        if p.length_squared() < 1.0 {
            return p;
        }
    }
}

/// Random direction uniformly distributed on the unit sphere.
pub fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    loop {
        let p = random_vec(rng, -1.0, 1.0);
        let len_sq = p.length_squared();
        // Reject points too close to the origin, they lose precision on normalize
        if len_sq > 1e-12 && len_sq <= 1.0 {
            return p / len_sq.sqrt();
        }
    }
}

/// Random offset in the square `[-0.5, 0.5) x [-0.5, 0.5)`.
pub fn sample_square<R: Rng + ?Sized>(rng: &mut R) -> Vec2 {
    Vec2::new(rng.gen::<f32>() - 0.5, rng.gen::<f32>() - 0.5)
}
