//! Audio graph configuration and constants.

use serde::Deserialize;

/// Audio graph construction parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioGraphParams {
    /// Sample rate used when rendering without a device (Hz)
    /// Device output uses the device's default rate instead
    pub offline_sample_rate_hz: u32,

    /// Tonal bus level while sound is enabled
    pub tonal_nominal_gain: f32,

    /// Microphone bus level (fixed)
    pub mic_gain: f32,

    /// Master bus level
    pub master_gain: f32,

    /// Time constant for tonal bus on/off ramps (seconds)
    pub bus_toggle_time_constant_s: f32,

    /// Low-pass cutoff before the first motion update (Hz)
    pub initial_cutoff_hz: f32,

    /// Low-pass resonance
    pub lowpass_q: f32,

    /// Oscillator frequency before the first motion update (Hz)
    pub initial_pitch_hz: f32,

    /// Whoosh band-pass center before the first motion update (Hz)
    pub initial_whoosh_center_hz: f32,

    /// Whoosh band-pass resonance
    pub whoosh_q: f32,

    /// Noise loop length (seconds)
    pub noise_length_s: f32,

    /// Peak amplitude of the uniform noise
    pub noise_amplitude: f32,

    /// Seed for the noise loop (None = fresh entropy each session)
    pub noise_seed: Option<u64>,

    /// Capture tap buffer length (seconds of audio)
    pub capture_buffer_s: f32,

    /// Microphone queue length (seconds of audio)
    pub mic_buffer_s: f32,

    /// Hard clip applied to the master output
    pub output_limit: f32,
}

impl Default for AudioGraphParams {
    fn default() -> Self {
        Self {
            offline_sample_rate_hz: 48_000,
            tonal_nominal_gain: 0.22,
            mic_gain: 1.0,
            master_gain: 1.0,
            bus_toggle_time_constant_s: 0.03,
            initial_cutoff_hz: 1400.0,
            lowpass_q: 0.7071,
            initial_pitch_hz: 440.0,
            initial_whoosh_center_hz: 700.0,
            whoosh_q: 2.0,
            noise_length_s: 1.0,
            noise_amplitude: 0.25,
            noise_seed: None,
            capture_buffer_s: 2.0,
            mic_buffer_s: 0.5,
            output_limit: 0.9,
        }
    }
}

impl AudioGraphParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.offline_sample_rate_hz == 0 {
            return Err("Sample rate must be > 0".to_string());
        }
        if self.noise_length_s <= 0.0 {
            return Err("Noise loop length must be > 0".to_string());
        }
        if self.bus_toggle_time_constant_s <= 0.0 {
            return Err("Bus toggle time constant must be > 0".to_string());
        }
        if self.lowpass_q <= 0.0 || self.whoosh_q <= 0.0 {
            return Err("Filter Q must be > 0".to_string());
        }
        Ok(())
    }

    /// Noise loop length in samples at the given rate (at least one sample)
    pub fn noise_len(&self, sample_rate: u32) -> usize {
        ((sample_rate as f32 * self.noise_length_s) as usize).max(1)
    }
}
