//! Session loop and capture configuration.

use serde::Deserialize;

/// Session loop parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionParams {
    /// Tick rate of the detection/sonification loop (Hz)
    pub tick_rate_hz: f32,

    /// Delay between the first available frame and automatic calibration (seconds)
    /// Gives camera exposure time to settle
    pub calibration_delay_s: f32,

    /// Sensitivity applied until the UI changes it (10..80)
    pub initial_sensitivity: f32,

    /// Whether the tonal bus starts enabled
    pub sound_enabled: bool,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            tick_rate_hz: 30.0,
            calibration_delay_s: 0.7,
            initial_sensitivity: 45.0,
            sound_enabled: true,
        }
    }
}

impl SessionParams {
    /// Tick period (seconds)
    pub fn tick_period_s(&self) -> f32 {
        1.0 / self.tick_rate_hz
    }

    /// Calibration delay expressed in ticks
    pub fn calibration_delay_ticks(&self) -> u32 {
        (self.calibration_delay_s * self.tick_rate_hz).round() as u32
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tick_rate_hz <= 0.0 {
            return Err(format!("Tick rate must be > 0, got {}", self.tick_rate_hz));
        }
        if self.calibration_delay_s < 0.0 {
            return Err("Calibration delay must be >= 0".to_string());
        }
        if !self.initial_sensitivity.is_finite() {
            return Err(format!(
                "Initial sensitivity must be finite, got {}",
                self.initial_sensitivity
            ));
        }
        Ok(())
    }
}

/// Capture-to-disk configuration (the CLI's capture sink)
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Duration to record (seconds)
    pub duration_secs: f32,

    /// Output directory for the capture file
    pub output_dir: String,
}

impl RecordingConfig {
    pub fn new(duration_secs: f32, output_dir: impl Into<String>) -> Self {
        Self {
            duration_secs,
            output_dir: output_dir.into(),
        }
    }

    /// Total capture length in samples at the given rate
    pub fn total_samples(&self, sample_rate: u32) -> usize {
        (self.duration_secs * sample_rate as f32).ceil() as usize
    }

    /// Audio file path
    pub fn audio_path(&self) -> String {
        format!("{}/capture.wav", self.output_dir)
    }
}
