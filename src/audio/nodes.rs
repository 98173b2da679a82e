//! Signal-processing nodes for the synthesis graph.
//!
//! All nodes are allocation-free per sample and take their modulated
//! parameters as arguments, so the graph decides where values come from.

use std::f32::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Band-limited enough for sonar pings; no anti-aliasing
#[derive(Debug, Clone)]
pub struct TriangleOscillator {
    phase: f32,
    sample_rate: f32,
}

impl TriangleOscillator {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            sample_rate: sample_rate as f32,
        }
    }

    /// Next sample in [-1, 1] at `frequency_hz`. Starts at zero, rising.
    #[inline]
    pub fn next(&mut self, frequency_hz: f32) -> f32 {
        let p = self.phase;
        let out = if p < 0.25 {
            4.0 * p
        } else if p < 0.75 {
            2.0 - 4.0 * p
        } else {
            4.0 * p - 4.0
        };
        self.phase = (p + frequency_hz / self.sample_rate).rem_euclid(1.0);
        out
    }
}

/// Filter response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    LowPass,
    /// Constant 0 dB peak gain at the center frequency
    BandPass,
}

/// RBJ-cookbook biquad, transposed direct form II
#[derive(Debug, Clone)]
pub struct Biquad {
    kind: FilterKind,
    q: f32,
    sample_rate: f32,
    frequency_hz: f32,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    pub fn new(kind: FilterKind, frequency_hz: f32, q: f32, sample_rate: u32) -> Self {
        let mut filter = Self {
            kind,
            q,
            sample_rate: sample_rate as f32,
            frequency_hz: f32::NAN,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        };
        filter.retune(frequency_hz);
        filter
    }

    /// Recompute coefficients when the frequency actually moved
    fn retune(&mut self, frequency_hz: f32) {
        let f = frequency_hz.clamp(10.0, self.sample_rate * 0.49);
        if (f - self.frequency_hz).abs() < 1e-3 {
            return;
        }
        self.frequency_hz = f;

        let w0 = 2.0 * PI * f / self.sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * self.q);
        let a0 = 1.0 + alpha;

        let (b0, b1, b2) = match self.kind {
            FilterKind::LowPass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterKind::BandPass => (alpha, 0.0, -alpha),
        };

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    /// Filter one sample at the given center/cutoff frequency
    #[inline]
    pub fn process(&mut self, input: f32, frequency_hz: f32) -> f32 {
        self.retune(frequency_hz);
        let out = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * out + self.z2;
        self.z2 = self.b2 * input - self.a2 * out;
        out
    }
}

/// Pre-generated uniform noise, played as an endless loop
#[derive(Debug, Clone)]
pub struct NoiseLoop {
    buffer: Vec<f32>,
    position: usize,
}

impl NoiseLoop {
    /// Fill `len` samples uniformly in [-amplitude, amplitude]
    pub fn new(len: usize, amplitude: f32, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = StdRng::seed_from_u64(seed);
        let buffer = (0..len.max(1))
            .map(|_| (rng.random::<f32>() * 2.0 - 1.0) * amplitude)
            .collect();
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        let s = self.buffer[self.position];
        self.position += 1;
        if self.position == self.buffer.len() {
            self.position = 0;
        }
        s
    }
}
