//! Sample-accurate parameter automation.
//!
//! An [`AutomatedParam`] is a control value living on the render side. The
//! control side never writes it directly; it schedules [`Automation`] events
//! stamped with audio-clock time, and the render side evaluates them once per
//! sample. This keeps every change (bus toggles, pitch glides, tick envelopes)
//! continuous, so nothing clicks.

use std::collections::VecDeque;

/// One scheduled change to a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Automation {
    /// Jump to `value` at time `at`
    SetValue { at: f64, value: f32 },

    /// Linear ramp from the previous event's value, reaching `value` at `end`
    LinearRamp { end: f64, value: f32 },

    /// Exponential ramp from the previous event's value, reaching `value` at `end`.
    /// Both endpoints must be non-zero with the same sign, otherwise the value
    /// holds and jumps at `end`.
    ExponentialRamp { end: f64, value: f32 },

    /// Exponential approach toward `value` starting at `at`
    /// Formula: v(t) = value + (v0 - value) * exp(-(t - at) / time_constant)
    SetTarget {
        at: f64,
        value: f32,
        time_constant: f32,
    },
}

impl Automation {
    /// Time at which the event takes effect (ramps: when they complete)
    pub fn time(&self) -> f64 {
        match *self {
            Automation::SetValue { at, .. } | Automation::SetTarget { at, .. } => at,
            Automation::LinearRamp { end, .. } | Automation::ExponentialRamp { end, .. } => end,
        }
    }
}

/// Pre-allocated event slots; a tick envelope needs three
const EVENT_CAPACITY: usize = 32;

/// Parameter with a scheduled, smoothed target
#[derive(Debug, Clone)]
pub struct AutomatedParam {
    value: f32,
    sample_rate: f32,
    /// Time and value the next ramp starts from
    anchor: (f64, f32),
    /// Active exponential approach: (target, per-sample coefficient)
    approach: Option<(f32, f32)>,
    events: VecDeque<Automation>,
}

impl AutomatedParam {
    pub fn new(value: f32, sample_rate: u32) -> Self {
        Self {
            value,
            sample_rate: sample_rate as f32,
            anchor: (0.0, value),
            approach: None,
            events: VecDeque::with_capacity(EVENT_CAPACITY),
        }
    }

    /// Current value (as of the last evaluated sample)
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Number of events still waiting
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    /// Insert an event, keeping the queue time-ordered. Events with equal
    /// times keep their insertion order.
    pub fn schedule(&mut self, event: Automation) {
        let t = event.time();
        let pos = self
            .events
            .iter()
            .position(|e| e.time() > t)
            .unwrap_or(self.events.len());
        self.events.insert(pos, event);
    }

    /// Schedule an exponential approach toward `value` from time `at`
    pub fn set(&mut self, at: f64, value: f32, time_constant: f32) {
        self.schedule(Automation::SetTarget {
            at,
            value,
            time_constant,
        });
    }

    /// Drop every event at or after `from`. A ramp still in flight is
    /// frozen at the current value.
    pub fn cancel_from(&mut self, from: f64) {
        self.events.retain(|e| e.time() < from);
        self.anchor = (from, self.value);
    }

    fn approach_coefficient(&self, time_constant: f32) -> f32 {
        if time_constant <= 0.0 {
            1.0
        } else {
            1.0 - (-1.0 / (time_constant * self.sample_rate)).exp()
        }
    }

    /// Evaluate the parameter at audio time `t` (seconds). Call once per sample
    /// with monotonically increasing `t`.
    pub fn next(&mut self, t: f64) -> f32 {
        while let Some(&event) = self.events.front() {
            if event.time() > t {
                break;
            }
            self.events.pop_front();
            match event {
                Automation::SetValue { at, value } => {
                    self.value = value;
                    self.approach = None;
                    self.anchor = (at, value);
                }
                Automation::LinearRamp { end, value }
                | Automation::ExponentialRamp { end, value } => {
                    self.value = value;
                    self.approach = None;
                    self.anchor = (end, value);
                }
                Automation::SetTarget {
                    at,
                    value,
                    time_constant,
                } => {
                    self.approach = Some((value, self.approach_coefficient(time_constant)));
                    self.anchor = (at, self.value);
                }
            }
        }

        let (t0, v0) = self.anchor;
        match self.events.front() {
            Some(&Automation::LinearRamp { end, value }) => {
                let frac = ramp_fraction(t0, end, t);
                self.value = v0 + (value - v0) * frac;
            }
            Some(&Automation::ExponentialRamp { end, value }) => {
                if v0 != 0.0 && value != 0.0 && (v0 > 0.0) == (value > 0.0) {
                    let frac = ramp_fraction(t0, end, t);
                    self.value = v0 * (value / v0).powf(frac);
                }
            }
            _ => {
                if let Some((target, k)) = self.approach {
                    self.value += (target - self.value) * k;
                }
            }
        }

        self.value
    }
}

fn ramp_fraction(start: f64, end: f64, t: f64) -> f32 {
    if end <= start {
        1.0
    } else {
        ((t - start) / (end - start)).clamp(0.0, 1.0) as f32
    }
}
