//! Motion-to-sound mapping constants.

use serde::Deserialize;

/// Mapping from smoothed motion metrics to synthesis parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SonificationParams {
    /// Tick interval at zero energy (seconds)
    pub interval_idle_s: f64,

    /// Tick interval at full energy (seconds)
    pub interval_busy_s: f64,

    /// Oscillator pitch at rest (Hz)
    /// Formula: pitch = base + e * energy_scale + clamp(speed, 0, cap) * speed_scale
    pub pitch_base_hz: f32,

    /// Pitch added at full energy (Hz)
    pub pitch_energy_scale_hz: f32,

    /// Centroid speed ceiling (pixels per tick)
    pub speed_cap: f32,

    /// Pitch added per unit of centroid speed (Hz)
    pub pitch_speed_scale_hz: f32,

    /// Low-pass cutoff at rest (Hz)
    pub cutoff_base_hz: f32,

    /// Cutoff added at full energy (Hz)
    pub cutoff_energy_scale_hz: f32,

    /// Tick peak amplitude at rest
    pub tick_amp_base: f32,

    /// Tick peak amplitude added at full energy
    pub tick_amp_energy_scale: f32,

    /// Tick attack duration (seconds, linear ramp)
    pub tick_attack_s: f64,

    /// Time from tick start to end of exponential decay (seconds)
    pub tick_decay_s: f64,

    /// Near-zero level the envelope starts from and decays toward
    pub tick_floor: f32,

    /// Energy below which the whoosh stays silent
    pub whoosh_threshold: f32,

    /// Whoosh gain per unit of energy above the threshold
    pub whoosh_gain_scale: f32,

    /// Whoosh band-pass center at rest (Hz)
    pub whoosh_center_base_hz: f32,

    /// Whoosh center added at full energy (Hz)
    pub whoosh_center_energy_scale_hz: f32,

    /// Smoothing time constants (seconds)
    pub pitch_time_constant_s: f32,
    pub cutoff_time_constant_s: f32,
    pub whoosh_center_time_constant_s: f32,
    pub whoosh_gain_time_constant_s: f32,
}

impl Default for SonificationParams {
    fn default() -> Self {
        Self {
            interval_idle_s: 0.65,
            interval_busy_s: 0.09,
            pitch_base_hz: 160.0,
            pitch_energy_scale_hz: 260.0,
            speed_cap: 60.0,
            pitch_speed_scale_hz: 6.8,
            cutoff_base_hz: 600.0,
            cutoff_energy_scale_hz: 2600.0,
            tick_amp_base: 0.008,
            tick_amp_energy_scale: 0.18,
            tick_attack_s: 0.008,
            tick_decay_s: 0.12,
            tick_floor: 0.0001,
            whoosh_threshold: 0.22,
            whoosh_gain_scale: 0.22,
            whoosh_center_base_hz: 420.0,
            whoosh_center_energy_scale_hz: 2000.0,
            pitch_time_constant_s: 0.02,
            cutoff_time_constant_s: 0.03,
            whoosh_center_time_constant_s: 0.05,
            whoosh_gain_time_constant_s: 0.08,
        }
    }
}

impl SonificationParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_idle_s <= 0.0 || self.interval_busy_s <= 0.0 {
            return Err("Tick intervals must be > 0".to_string());
        }
        if self.tick_attack_s <= 0.0 || self.tick_decay_s <= self.tick_attack_s {
            return Err(format!(
                "Tick envelope needs 0 < attack < decay, got {} / {}",
                self.tick_attack_s, self.tick_decay_s
            ));
        }
        if self.tick_floor <= 0.0 {
            // Exponential ramps cannot reach or start from zero
            return Err("Tick floor must be > 0".to_string());
        }
        Ok(())
    }
}
