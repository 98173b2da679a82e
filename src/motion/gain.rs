//! Slow proportional gain loop that keeps perceived motion density stable
//! across cameras and lighting.

use crate::params::DetectorParams;

/// Auto-gain state. The value never leaves `[gain_min, gain_max]`.
#[derive(Debug, Clone)]
pub struct AutoGain {
    gain: f32,
    low_watermark: f32,
    high_watermark: f32,
    raise: f32,
    lower: f32,
    min: f32,
    max: f32,
}

impl AutoGain {
    pub fn new(params: &DetectorParams) -> Self {
        Self {
            gain: 1.0_f32.clamp(params.gain_min, params.gain_max),
            low_watermark: params.gain_low_watermark,
            high_watermark: params.gain_high_watermark,
            raise: params.gain_raise,
            lower: params.gain_lower,
            min: params.gain_min,
            max: params.gain_max,
        }
    }

    /// Current gain
    pub fn value(&self) -> f32 {
        self.gain
    }

    /// Back to unity (calibration)
    pub fn reset(&mut self) {
        self.gain = 1.0_f32.clamp(self.min, self.max);
    }

    /// Feed one tick's active density and return the updated gain
    pub fn update(&mut self, active_percent: f32) -> f32 {
        let target = active_percent * self.gain;
        if target < self.low_watermark {
            self.gain *= self.raise;
        }
        if target > self.high_watermark {
            self.gain *= self.lower;
        }
        // NaN input leaves both branches untaken; clamp still applies
        self.gain = self.gain.clamp(self.min, self.max);
        self.gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_quiet_scene_raises_gain() {
        let mut gain = AutoGain::new(&DetectorParams::default());
        let g = gain.update(0.0);
        assert!((g - 1.01).abs() < 1e-6);
    }

    #[test]
    fn test_busy_scene_lowers_gain() {
        let mut gain = AutoGain::new(&DetectorParams::default());
        let g = gain.update(0.5);
        assert!((g - 0.985).abs() < 1e-6);
    }

    #[test]
    fn test_dead_band_holds_gain() {
        let mut gain = AutoGain::new(&DetectorParams::default());
        assert_eq!(gain.update(0.1), 1.0);
    }

    #[test]
    fn test_gain_saturates_and_resets() {
        let mut gain = AutoGain::new(&DetectorParams::default());
        for _ in 0..1000 {
            gain.update(0.0);
        }
        assert_eq!(gain.value(), 6.0);

        gain.reset();
        assert_eq!(gain.value(), 1.0);

        for _ in 0..1000 {
            gain.update(1.0);
        }
        assert_eq!(gain.value(), 0.5);
    }

    proptest! {
        #[test]
        fn prop_gain_stays_clamped(inputs in prop::collection::vec(0.0f32..=1.0, 0..500)) {
            let mut gain = AutoGain::new(&DetectorParams::default());
            for active in inputs {
                let g = gain.update(active);
                prop_assert!((0.5..=6.0).contains(&g));
            }
        }
    }
}
