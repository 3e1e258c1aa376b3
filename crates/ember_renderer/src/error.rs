//! Configuration errors surfaced before a render starts.

use thiserror::Error;

/// Every way a scene, camera or render configuration can be rejected.
///
/// Per-sample numeric edge cases are never reported here; they are handled
/// where they occur.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("image width must be at least 1 pixel")]
    ZeroWidth,

    #[error("image height must be at least 1 pixel")]
    ZeroHeight,

    #[error("samples per pixel must be at least 1")]
    ZeroSamples,

    #[error("thread count must be at least 1")]
    ZeroThreads,

    #[error("vertical field of view must be in (0, 180) degrees, got {0}")]
    InvalidFov(f32),

    #[error("aspect ratio must be positive and finite, got {0}")]
    InvalidAspectRatio(f32),

    #[error("image of {width} x {height} pixels exceeds the {max} pixel limit")]
    ImageTooLarge {
        width: u32,
        height: u64,
        max: u64,
    },

    #[error("degenerate camera basis: {0}")]
    DegenerateCamera(&'static str),

    #[error("{0} must have finite components")]
    NonFinite(&'static str),

    #[error("sphere radius must be positive and finite, got {0}")]
    InvalidRadius(f32),

    #[error("metal fuzz must be in [0, 1], got {0}")]
    InvalidFuzz(f32),

    #[error("refractive index must be positive and finite, got {0}")]
    InvalidRefractiveIndex(f32),

    #[error("unknown material {0}")]
    UnknownMaterial(String),

    #[error("duplicate material name {0:?}")]
    DuplicateMaterial(String),

    #[error("framebuffer is {actual:?} but the camera renders {expected:?}")]
    FramebufferSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("progress tracks {actual} rows but the image has {expected}")]
    ProgressSize { expected: u32, actual: u32 },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
