//! Motion detector tuning: background model, auto gain and energy rescale.

use serde::Deserialize;

/// Background-subtraction detector parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Frame width the detector expects (pixels)
    pub frame_width: usize,

    /// Frame height the detector expects (pixels)
    pub frame_height: usize,

    /// Sampling grid stride (pixels, both axes)
    /// 6 = ~1/36 of the frame is inspected per tick
    pub sample_step: usize,

    /// Minimum luma difference counted as change, regardless of sensitivity
    pub noise_floor: f32,

    /// Background EMA rate per tick (dimensionless, 0..1)
    /// Applied to every sampled pixel, moving or not
    pub background_ema: f32,

    /// Sensitivity control range as exposed to the UI
    pub sensitivity_range: (f32, f32),

    /// Luma threshold range the sensitivity maps onto
    /// Higher sensitivity value => larger threshold => less sensitive
    pub threshold_range: (f32, f32),

    /// Gain grows while `active_percent * gain` stays below this
    pub gain_low_watermark: f32,

    /// Gain shrinks while `active_percent * gain` stays above this
    pub gain_high_watermark: f32,

    /// Multiplicative gain step when below the low watermark
    pub gain_raise: f32,

    /// Multiplicative gain step when above the high watermark
    pub gain_lower: f32,

    /// Lower gain clamp
    pub gain_min: f32,

    /// Upper gain clamp
    pub gain_max: f32,

    /// Density subtracted before rescaling into energy
    /// Formula: energy = clamp01((density * gain - floor) / span)
    pub energy_floor: f32,

    /// Density span that maps onto the full [0, 1] energy range
    pub energy_span: f32,

    /// Active samples required before the centroid leaves the frame center
    pub min_active_for_centroid: usize,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            frame_width: 640,
            frame_height: 480,
            sample_step: 6,
            noise_floor: 4.0,
            background_ema: 0.02,
            sensitivity_range: (10.0, 80.0),
            threshold_range: (10.0, 35.0),
            gain_low_watermark: 0.06,
            gain_high_watermark: 0.2,
            gain_raise: 1.01,
            gain_lower: 0.985,
            gain_min: 0.5,
            gain_max: 6.0,
            energy_floor: 0.01,
            energy_span: 0.16,
            min_active_for_centroid: 8,
        }
    }
}

impl DetectorParams {
    /// Number of pixels in a full frame
    pub fn pixel_count(&self) -> usize {
        self.frame_width * self.frame_height
    }

    /// Map a UI sensitivity value onto a luma threshold
    pub fn threshold_for(&self, sensitivity: f32) -> f32 {
        let (s_lo, s_hi) = self.sensitivity_range;
        let (t_lo, t_hi) = self.threshold_range;
        let s = sensitivity.clamp(s_lo, s_hi);
        t_lo + (s - s_lo) * (t_hi - t_lo) / (s_hi - s_lo)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(format!(
                "Frame size must be non-zero, got {}x{}",
                self.frame_width, self.frame_height
            ));
        }
        if self.sample_step < 2 {
            return Err(format!("Sample step must be > 1, got {}", self.sample_step));
        }
        if !(0.0..=1.0).contains(&self.background_ema) {
            return Err(format!(
                "Background EMA must be in [0, 1], got {}",
                self.background_ema
            ));
        }
        if self.sensitivity_range.0 >= self.sensitivity_range.1 {
            return Err("Sensitivity range must be increasing".to_string());
        }
        if self.gain_low_watermark >= self.gain_high_watermark {
            return Err("Gain low watermark must be below high watermark".to_string());
        }
        if self.gain_min <= 0.0 || self.gain_min > self.gain_max {
            return Err(format!(
                "Gain clamp must satisfy 0 < min <= max, got [{}, {}]",
                self.gain_min, self.gain_max
            ));
        }
        if self.energy_span <= 0.0 {
            return Err("Energy span must be > 0".to_string());
        }
        Ok(())
    }
}
