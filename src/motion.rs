//! Background-subtraction motion sensing.
//!
//! The detector keeps a per-pixel luma model of the empty scene and reports,
//! every tick, how much of a sparse sampling grid departs from it, where the
//! departing samples sit, and a gain-normalised energy scalar for the sound
//! and visual layers.

mod detector;
mod gain;
mod tracker;

use glam::Vec2;

pub use detector::{BackgroundModel, MotionDetector};
pub use gain::AutoGain;
pub use tracker::{MotionSmoother, SmoothedMotion};

/// Rec. 709 luma weights
const LUMA_R: f32 = 0.2126;
const LUMA_G: f32 = 0.7152;
const LUMA_B: f32 = 0.0722;

/// Perceptual brightness of one RGB pixel
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> f32 {
    LUMA_R * r as f32 + LUMA_G * g as f32 + LUMA_B * b as f32
}

/// One RGBA video frame at a fixed resolution
///
/// An empty pixel buffer means the source has nothing to deliver yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Frame {
    /// Bytes per pixel (RGBA)
    pub const CHANNELS: usize = 4;

    /// Wrap an RGBA buffer. The buffer is not validated here; detection
    /// treats a wrongly sized buffer like an empty one.
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// A frame from a source that is not ready yet
    pub fn empty(width: usize, height: usize) -> Self {
        Self::new(width, height, Vec::new())
    }

    /// A frame of one solid color
    pub fn filled(width: usize, height: usize, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width * height * Self::CHANNELS)
            .collect();
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Buffer length matches the declared dimensions
    pub fn is_well_formed(&self) -> bool {
        !self.pixels.is_empty() && self.pixels.len() == self.width * self.height * Self::CHANNELS
    }

    /// Luma of the pixel at linear index `idx` (row-major)
    #[inline]
    pub fn luma_at(&self, idx: usize) -> f32 {
        let i = idx * Self::CHANNELS;
        luma(self.pixels[i], self.pixels[i + 1], self.pixels[i + 2])
    }

    /// Paint an axis-aligned rectangle, clipped to the frame
    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, rgba: [u8; 4]) {
        if !self.is_well_formed() {
            return;
        }
        let x_end = (x + w).min(self.width);
        let y_end = (y + h).min(self.height);
        for row in y.min(self.height)..y_end {
            for col in x.min(self.width)..x_end {
                let i = (row * self.width + col) * Self::CHANNELS;
                self.pixels[i..i + Self::CHANNELS].copy_from_slice(&rgba);
            }
        }
    }
}

/// Per-tick detector output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// Gain-normalised motion energy in [0, 1]
    pub energy: f32,

    /// Mean position of active samples (pixels), or the frame center
    pub centroid: Vec2,

    /// Fraction of sampled positions classified as changed, in [0, 1]
    pub active_percent: f32,
}

impl MotionSample {
    /// "Nothing is happening" sample for a frame of the given size
    pub fn neutral(width: usize, height: usize) -> Self {
        Self {
            energy: 0.0,
            centroid: frame_center(width, height),
            active_percent: 0.0,
        }
    }
}

/// Geometric center of a frame (pixels)
pub fn frame_center(width: usize, height: usize) -> Vec2 {
    Vec2::new(width as f32 / 2.0, height as f32 / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_weights_sum_to_one() {
        assert!((luma(100, 100, 100) - 100.0).abs() < 1e-3);
        assert!((luma(255, 0, 0) - 255.0 * LUMA_R).abs() < 1e-3);
        assert_eq!(luma(0, 0, 0), 0.0);
    }

    #[test]
    fn test_fill_rect_clips_to_frame() {
        let mut frame = Frame::filled(8, 4, [0, 0, 0, 255]);
        frame.fill_rect(6, 2, 10, 10, [255, 255, 255, 255]);

        assert!((frame.luma_at(2 * 8 + 6) - 255.0).abs() < 1e-3);
        assert!((frame.luma_at(3 * 8 + 7) - 255.0).abs() < 1e-3);
        assert_eq!(frame.luma_at(2 * 8 + 5), 0.0);
        assert!(frame.is_well_formed());
    }

    #[test]
    fn test_empty_frame_is_not_well_formed() {
        let frame = Frame::empty(640, 480);
        assert!(frame.is_empty());
        assert!(!frame.is_well_formed());

        let short = Frame::new(4, 4, vec![0; 10]);
        assert!(!short.is_well_formed());
    }
}
