//! Synthetic scene configuration (stand-in for a camera).

use serde::Deserialize;

/// Procedural test scene: a bright block wandering over a textured backdrop
///
/// Positions are fractions of the frame size so the scene works at any
/// detector resolution.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SceneParams {
    /// Empty frames delivered before the "camera" is ready
    pub warmup_frames: u32,

    /// Mean backdrop luma (0..255)
    pub background_luma: f32,

    /// Backdrop texture amplitude (luma, ±)
    pub texture_amplitude: f32,

    /// Per-pixel sensor noise amplitude (luma, ±)
    /// Keep below the detector noise floor or the static scene reads as motion
    pub sensor_noise: f32,

    /// Noise seed; `None` seeds from the OS
    pub seed: Option<u64>,

    /// Block edge length (fraction of frame height)
    pub block_size: f32,

    /// Block luma (0..255)
    pub block_luma: f32,

    // X axis: wide sweeps
    /// Primary X oscillation frequency (Hz)
    pub x_freq_primary_hz: f32,

    /// Primary X amplitude (fraction of width)
    pub x_amplitude_primary: f32,

    /// Secondary X oscillation frequency (Hz)
    pub x_freq_secondary_hz: f32,

    /// Secondary X amplitude (fraction of width)
    pub x_amplitude_secondary: f32,

    // Y axis: slow bob plus detail
    /// Primary Y oscillation frequency (Hz)
    pub y_freq_primary_hz: f32,

    /// Primary Y amplitude (fraction of height)
    pub y_amplitude_primary: f32,

    /// Secondary Y detail frequency (Hz)
    pub y_detail_freq_hz: f32,

    /// Secondary Y detail amplitude (fraction of height)
    pub y_detail_amplitude: f32,

    // Presence: the block leaves and comes back so energy rises and falls
    /// Presence cycle frequency (Hz)
    pub presence_freq_hz: f32,

    /// Block is visible while sin(t * presence) is above this (-1..1)
    pub presence_cutoff: f32,
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            warmup_frames: 15, // Half a second at 30 Hz
            background_luma: 90.0,
            texture_amplitude: 25.0,
            sensor_noise: 1.5,
            seed: None,
            block_size: 0.25,
            block_luma: 210.0,

            x_freq_primary_hz: 0.9,
            x_amplitude_primary: 0.3,
            x_freq_secondary_hz: 2.3,
            x_amplitude_secondary: 0.08,

            y_freq_primary_hz: 0.6,
            y_amplitude_primary: 0.2,
            y_detail_freq_hz: 3.1,
            y_detail_amplitude: 0.05,

            presence_freq_hz: 0.35,
            presence_cutoff: -0.4,
        }
    }
}

impl SceneParams {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.block_size) {
            return Err(format!(
                "Block size must be a fraction of the frame, got {}",
                self.block_size
            ));
        }
        if self.sensor_noise < 0.0 {
            return Err("Sensor noise must be >= 0".to_string());
        }
        Ok(())
    }
}
