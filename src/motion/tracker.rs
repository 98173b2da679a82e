//! Exponential smoothing of raw motion samples.
//!
//! Raw samples jump around from tick to tick; the sound and visual layers
//! work from these smoothed copies instead.

use glam::Vec2;

use super::MotionSample;
use crate::params::SmoothingParams;

/// Smoothed motion metrics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedMotion {
    /// Smoothed energy in [0, 1]
    pub energy: f32,

    /// Smoothed centroid (pixels)
    pub centroid: Vec2,

    /// Smoothed frame-to-frame displacement of the centroid (pixels per tick)
    pub centroid_speed: f32,
}

/// Caller-held EMA state over successive motion samples
#[derive(Debug, Clone)]
pub struct MotionSmoother {
    params: SmoothingParams,
    current: SmoothedMotion,
    previous_centroid: Vec2,
}

impl MotionSmoother {
    /// Start at rest, centered on `center`
    pub fn new(params: SmoothingParams, center: Vec2) -> Self {
        Self {
            params,
            current: SmoothedMotion {
                energy: 0.0,
                centroid: center,
                centroid_speed: 0.0,
            },
            previous_centroid: center,
        }
    }

    pub fn current(&self) -> SmoothedMotion {
        self.current
    }

    /// Fold one raw sample into the smoothed state
    pub fn update(&mut self, sample: &MotionSample) -> SmoothedMotion {
        let p = &self.params;
        let s = &mut self.current;

        s.energy += (sample.energy - s.energy) * p.energy_rate;
        s.centroid = s.centroid.lerp(sample.centroid, p.centroid_rate);

        let displacement = s.centroid.distance(self.previous_centroid);
        s.centroid_speed += (displacement - s.centroid_speed) * p.speed_rate;
        self.previous_centroid = s.centroid;

        *s
    }
}
