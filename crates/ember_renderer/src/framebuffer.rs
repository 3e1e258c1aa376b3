//! Shared RGBA8 pixel storage.
//!
//! Each pixel is one packed `AtomicU32`, so render workers can write their
//! own rows while a display thread reads the whole buffer for a progressive
//! preview. Workers only ever touch disjoint row ranges; the atomics make
//! concurrent preview reads well defined without any locking.

use std::sync::atomic::{AtomicU32, Ordering};

/// One RGBA8 pixel.
pub type Rgba = [u8; 4];

const OPAQUE_BLACK: Rgba = [0, 0, 0, 255];

/// Row-major `width * height` RGBA8 image.
#[derive(Debug)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Box<[AtomicU32]>,
}

impl Framebuffer {
    /// Create a framebuffer filled with opaque black.
    pub fn new(width: u32, height: u32) -> Self {
        let count = width as usize * height as usize;
        let black = u32::from_ne_bytes(OPAQUE_BLACK);
        Self {
            width,
            height,
            pixels: (0..count).map(|_| AtomicU32::new(black)).collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y as usize * self.width as usize + x as usize
    }

    /// Set the pixel at (x, y).
    #[inline]
    pub fn set(&self, x: u32, y: u32, rgba: Rgba) {
        self.pixels[self.index(x, y)].store(u32::from_ne_bytes(rgba), Ordering::Relaxed);
    }

    /// Get the pixel at (x, y).
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Rgba {
        self.pixels[self.index(x, y)]
            .load(Ordering::Relaxed)
            .to_ne_bytes()
    }

    /// Snapshot as tightly packed RGBA bytes, ready for texture upload.
    ///
    /// Safe to call mid-render; rows still being rendered show whatever
    /// was last written.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let packed: Vec<u32> = self
            .pixels
            .iter()
            .map(|pixel| pixel.load(Ordering::Relaxed))
            .collect();
        bytemuck::cast_slice::<u32, u8>(&packed).to_vec()
    }
}

impl Clone for Framebuffer {
    fn clone(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            pixels: self
                .pixels
                .iter()
                .map(|pixel| AtomicU32::new(pixel.load(Ordering::Relaxed)))
                .collect(),
        }
    }
}
