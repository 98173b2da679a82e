//! Caller-side smoothing rates for motion metrics.

use serde::Deserialize;

/// EMA rates applied per tick to the raw motion sample
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmoothingParams {
    /// Energy smoothing rate (dimensionless, 0..1)
    pub energy_rate: f32,

    /// Centroid smoothing rate (dimensionless, 0..1)
    pub centroid_rate: f32,

    /// Centroid speed smoothing rate (dimensionless, 0..1)
    /// Speed is the frame-to-frame displacement of the smoothed centroid
    pub speed_rate: f32,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            energy_rate: 0.12,
            centroid_rate: 0.22,
            speed_rate: 0.25,
        }
    }
}

impl SmoothingParams {
    pub fn validate(&self) -> Result<(), String> {
        for (name, rate) in [
            ("energy_rate", self.energy_rate),
            ("centroid_rate", self.centroid_rate),
            ("speed_rate", self.speed_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(format!("{} must be in [0, 1], got {}", name, rate));
            }
        }
        Ok(())
    }
}
