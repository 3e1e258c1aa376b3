//! Math primitives for the Ember path tracer.
//!
//! `Vec3` and friends come straight from glam; this crate adds the
//! ray-tracing specific pieces on top: rays, scalar intervals, the
//! reflection/refraction helpers and the random samplers used by materials.

// Re-export glam for convenience
pub use glam::*;

mod interval;
mod ray;
pub mod random;
mod vector;

pub use interval::Interval;
pub use ray::Ray;
pub use vector::{is_near_zero, reflect, refract, NEAR_ZERO};
