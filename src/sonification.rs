//! Motion-to-sound mapping.
//!
//! Every tick the controller turns smoothed motion into target synthesis
//! parameters and decides whether a sonar tick is due. It never touches the
//! rendered signal: it only issues timestamped requests to an
//! [`AutomationTarget`], normally the [`AudioGraph`].

use crate::audio::{AudioGraph, Automation, ParamId, Playback};
use crate::motion::SmoothedMotion;
use crate::params::SonificationParams;

/// Slack for the tick-due comparison so an interval landing exactly on a
/// clock step is not missed to rounding
const TICK_EPSILON_S: f64 = 1e-9;

/// Receiver of parameter requests stamped on an audio clock
pub trait AutomationTarget {
    /// Whether requests would be heard and applied (graph ready and playing,
    /// tonal bus on)
    fn is_accepting(&self) -> bool;

    /// Audio clock (seconds)
    fn now(&self) -> f64;

    fn schedule(&mut self, param: ParamId, event: Automation);

    fn cancel_scheduled(&mut self, param: ParamId, from: f64);

    /// Smoothed approach toward `value` starting now
    fn set_param(&mut self, param: ParamId, value: f32, time_constant: f32) {
        let at = self.now();
        self.schedule(
            param,
            Automation::SetTarget {
                at,
                value,
                time_constant,
            },
        );
    }
}

impl AutomationTarget for AudioGraph {
    fn is_accepting(&self) -> bool {
        self.is_ready() && self.playback() == Playback::Running && self.tonal_enabled()
    }

    fn now(&self) -> f64 {
        AudioGraph::now(self)
    }

    fn schedule(&mut self, param: ParamId, event: Automation) {
        AudioGraph::schedule(self, param, event);
    }

    fn cancel_scheduled(&mut self, param: ParamId, from: f64) {
        AudioGraph::cancel_scheduled(self, param, from);
    }
}

/// Synthesis targets for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundTargets {
    pub interval_s: f64,
    pub pitch_hz: f32,
    pub cutoff_hz: f32,
    pub tick_amplitude: f32,
    pub whoosh_gain: f32,
    pub whoosh_center_hz: f32,
}

impl SoundTargets {
    /// Map smoothed energy and centroid speed to targets. Energy is clamped
    /// to [0, 1], speed to [0, speed_cap].
    pub fn from_motion(params: &SonificationParams, energy: f32, speed: f32) -> Self {
        let e = energy.clamp(0.0, 1.0);
        let speed = speed.clamp(0.0, params.speed_cap);

        let interval_s =
            params.interval_idle_s + (params.interval_busy_s - params.interval_idle_s) * e as f64;

        Self {
            interval_s,
            pitch_hz: params.pitch_base_hz
                + e * params.pitch_energy_scale_hz
                + speed * params.pitch_speed_scale_hz,
            cutoff_hz: params.cutoff_base_hz + e * params.cutoff_energy_scale_hz,
            tick_amplitude: params.tick_amp_base + e * params.tick_amp_energy_scale,
            whoosh_gain: (e - params.whoosh_threshold).max(0.0) * params.whoosh_gain_scale,
            whoosh_center_hz: params.whoosh_center_base_hz
                + e * params.whoosh_center_energy_scale_hz,
        }
    }
}

/// When the last tick fired, on the audio clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSchedule {
    last_tick: f64,
}

impl TickSchedule {
    pub fn new(start: f64) -> Self {
        Self { last_tick: start }
    }

    pub fn last_tick(&self) -> f64 {
        self.last_tick
    }

    pub fn is_due(&self, now: f64, interval_s: f64) -> bool {
        now - self.last_tick >= interval_s - TICK_EPSILON_S
    }

    pub fn mark(&mut self, now: f64) {
        self.last_tick = now;
    }
}

/// What the controller did this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SonificationUpdate {
    pub targets: SoundTargets,
    pub fired: bool,
}

/// Per-session mapping state
#[derive(Debug, Clone)]
pub struct SonificationController {
    params: SonificationParams,
    schedule: TickSchedule,
}

impl SonificationController {
    /// The graph clock starts at zero when the graph is built, and so does
    /// the tick schedule.
    pub fn new(params: SonificationParams) -> Self {
        Self {
            params,
            schedule: TickSchedule::new(0.0),
        }
    }

    pub fn params(&self) -> &SonificationParams {
        &self.params
    }

    pub fn schedule(&self) -> TickSchedule {
        self.schedule
    }

    /// Push targets for this tick and fire a tick if one is due. Does nothing
    /// while the target is not accepting.
    pub fn update<T: AutomationTarget + ?Sized>(
        &mut self,
        target: &mut T,
        motion: &SmoothedMotion,
    ) -> Option<SonificationUpdate> {
        if !target.is_accepting() {
            return None;
        }

        let p = &self.params;
        let targets = SoundTargets::from_motion(p, motion.energy, motion.centroid_speed);

        target.set_param(
            ParamId::OscillatorFrequency,
            targets.pitch_hz,
            p.pitch_time_constant_s,
        );
        target.set_param(
            ParamId::LowpassCutoff,
            targets.cutoff_hz,
            p.cutoff_time_constant_s,
        );
        target.set_param(
            ParamId::WhooshGain,
            targets.whoosh_gain,
            p.whoosh_gain_time_constant_s,
        );
        target.set_param(
            ParamId::WhooshCenter,
            targets.whoosh_center_hz,
            p.whoosh_center_time_constant_s,
        );

        let now = target.now();
        let fired = self.schedule.is_due(now, targets.interval_s);
        if fired {
            self.fire_tick(target, now, targets.tick_amplitude);
            self.schedule.mark(now);
            log::debug!("Tick at {:.3}s (amp {:.3})", now, targets.tick_amplitude);
        }

        Some(SonificationUpdate { targets, fired })
    }

    /// Envelope: floor at `now`, linear attack to `amplitude`, exponential
    /// decay back to the floor. Only the envelope is gated.
    fn fire_tick<T: AutomationTarget + ?Sized>(&self, target: &mut T, now: f64, amplitude: f32) {
        let p = &self.params;
        target.cancel_scheduled(ParamId::TickGain, now);
        target.schedule(
            ParamId::TickGain,
            Automation::SetValue {
                at: now,
                value: p.tick_floor,
            },
        );
        target.schedule(
            ParamId::TickGain,
            Automation::LinearRamp {
                end: now + p.tick_attack_s,
                value: amplitude,
            },
        );
        target.schedule(
            ParamId::TickGain,
            Automation::ExponentialRamp {
                end: now + p.tick_decay_s,
                value: p.tick_floor,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::OutputMode;
    use crate::params::AudioGraphParams;
    use glam::Vec2;

    /// Records requests against a manually stepped clock
    struct FakeTarget {
        now: f64,
        accepting: bool,
        events: Vec<(ParamId, Automation)>,
        cancels: Vec<(ParamId, f64)>,
    }

    impl FakeTarget {
        fn new() -> Self {
            Self {
                now: 0.0,
                accepting: true,
                events: Vec::new(),
                cancels: Vec::new(),
            }
        }
    }

    impl AutomationTarget for FakeTarget {
        fn is_accepting(&self) -> bool {
            self.accepting
        }

        fn now(&self) -> f64 {
            self.now
        }

        fn schedule(&mut self, param: ParamId, event: Automation) {
            self.events.push((param, event));
        }

        fn cancel_scheduled(&mut self, param: ParamId, from: f64) {
            self.cancels.push((param, from));
        }
    }

    fn motion(energy: f32, speed: f32) -> SmoothedMotion {
        SmoothedMotion {
            energy,
            centroid: Vec2::new(320.0, 240.0),
            centroid_speed: speed,
        }
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_targets_at_rest() {
        let t = SoundTargets::from_motion(&SonificationParams::default(), 0.0, 0.0);
        assert!((t.interval_s - 0.65).abs() < 1e-9);
        assert!(close(t.pitch_hz, 160.0));
        assert!(close(t.cutoff_hz, 600.0));
        assert!(close(t.tick_amplitude, 0.008));
        assert_eq!(t.whoosh_gain, 0.0);
        assert!(close(t.whoosh_center_hz, 420.0));
    }

    #[test]
    fn test_targets_at_full_energy() {
        let t = SoundTargets::from_motion(&SonificationParams::default(), 1.0, 30.0);
        assert!((t.interval_s - 0.09).abs() < 1e-6);
        assert!(close(t.pitch_hz, 160.0 + 260.0 + 30.0 * 6.8));
        assert!(close(t.cutoff_hz, 3200.0));
        assert!(close(t.tick_amplitude, 0.188));
        assert!(close(t.whoosh_gain, 0.78 * 0.22));
        assert!(close(t.whoosh_center_hz, 2420.0));
    }

    #[test]
    fn test_inputs_are_clamped() {
        let params = SonificationParams::default();
        let over = SoundTargets::from_motion(&params, 3.0, 500.0);
        let max = SoundTargets::from_motion(&params, 1.0, 60.0);
        assert_eq!(over, max);

        let under = SoundTargets::from_motion(&params, -1.0, -5.0);
        let rest = SoundTargets::from_motion(&params, 0.0, 0.0);
        assert_eq!(under, rest);
    }

    #[test]
    fn test_whoosh_silent_below_threshold() {
        let t = SoundTargets::from_motion(&SonificationParams::default(), 0.2, 0.0);
        assert_eq!(t.whoosh_gain, 0.0);
    }

    #[test]
    fn test_not_accepting_is_noop() {
        let mut target = FakeTarget::new();
        target.accepting = false;
        target.now = 5.0;

        let mut controller = SonificationController::new(SonificationParams::default());
        assert!(controller.update(&mut target, &motion(0.9, 10.0)).is_none());
        assert!(target.events.is_empty());
        assert!(target.cancels.is_empty());
        assert_eq!(controller.schedule().last_tick(), 0.0);
    }

    #[test]
    fn test_tick_envelope_sequence() {
        let mut target = FakeTarget::new();
        target.now = 1.0;

        let mut controller = SonificationController::new(SonificationParams::default());
        let update = controller.update(&mut target, &motion(0.5, 0.0)).unwrap();
        assert!(update.fired);
        assert_eq!(controller.schedule().last_tick(), 1.0);
        assert_eq!(target.cancels, vec![(ParamId::TickGain, 1.0)]);

        let envelope: Vec<Automation> = target
            .events
            .iter()
            .filter(|(p, _)| *p == ParamId::TickGain)
            .map(|(_, e)| *e)
            .collect();
        assert_eq!(envelope.len(), 3);
        assert_eq!(envelope[0], Automation::SetValue { at: 1.0, value: 0.0001 });
        match envelope[1] {
            Automation::LinearRamp { end, value } => {
                assert!((end - 1.008).abs() < 1e-9);
                assert!(close(value, 0.008 + 0.5 * 0.18));
            }
            other => panic!("expected linear ramp, got {:?}", other),
        }
        match envelope[2] {
            Automation::ExponentialRamp { end, value } => {
                assert!((end - 1.12).abs() < 1e-9);
                assert_eq!(value, 0.0001);
            }
            other => panic!("expected exponential ramp, got {:?}", other),
        }

        // Continuous parameters go out as smoothed targets every tick
        let smoothed = target
            .events
            .iter()
            .filter(|(_, e)| matches!(e, Automation::SetTarget { .. }))
            .count();
        assert_eq!(smoothed, 4);
    }

    fn count_ticks(energy: f32, duration_s: f64) -> usize {
        let mut target = FakeTarget::new();
        let mut controller = SonificationController::new(SonificationParams::default());
        let steps = (duration_s * 1000.0) as u64;

        let mut fired = 0;
        for n in 0..=steps {
            target.now = n as f64 / 1000.0;
            if let Some(update) = controller.update(&mut target, &motion(energy, 0.0)) {
                fired += update.fired as usize;
            }
        }
        fired
    }

    #[test]
    fn test_tick_count_matches_interval() {
        let params = SonificationParams::default();
        for energy in [0.0f32, 0.25, 0.5, 0.75, 1.0] {
            let interval = SoundTargets::from_motion(&params, energy, 0.0).interval_s;
            let expected = (10.0 / interval).floor() as i64;
            let fired = count_ticks(energy, 10.0) as i64;
            assert!(
                (fired - expected).abs() <= 1,
                "energy {}: fired {} expected {}",
                energy,
                fired,
                expected
            );
        }
    }

    #[test]
    fn test_ticks_are_audible_offline() {
        let params = AudioGraphParams {
            noise_seed: Some(9),
            ..Default::default()
        };
        let mut graph = AudioGraph::new(params, true);
        graph.initialize(OutputMode::Offline).unwrap();

        let mut controller = SonificationController::new(SonificationParams::default());
        let frames_per_tick = 48_000 / 30;
        let mut peak = 0.0f32;
        let mut fired = 0;

        for _ in 0..30 {
            if let Some(update) = controller.update(&mut graph, &motion(0.8, 5.0)) {
                fired += update.fired as usize;
            }
            let out = graph.render_offline(frames_per_tick);
            peak = out.iter().fold(peak, |m, s| m.max(s.abs()));
        }

        // One second at interval ~0.2s
        assert!((4..=6).contains(&fired), "fired {}", fired);
        assert!(peak > 0.001, "peak {}", peak);
        assert!(peak <= 0.9);

        let pitch = graph.probe(ParamId::OscillatorFrequency).unwrap();
        assert!((pitch - (160.0 + 0.8 * 260.0 + 5.0 * 6.8)).abs() < 1.0);
    }

    #[test]
    fn test_suspended_graph_gets_no_requests() {
        let mut graph = AudioGraph::new(AudioGraphParams::default(), true);
        graph.initialize(OutputMode::Offline).unwrap();
        graph.suspend();

        // Nothing drains the queue while suspended, so nothing is queued
        let mut controller = SonificationController::new(SonificationParams::default());
        for _ in 0..10 {
            assert!(controller.update(&mut graph, &motion(1.0, 20.0)).is_none());
        }

        graph.resume();
        assert!(controller.update(&mut graph, &motion(1.0, 20.0)).is_some());
        graph.render_offline(4800);
        let pitch = graph.probe(ParamId::OscillatorFrequency).unwrap();
        assert!((pitch - (160.0 + 260.0 + 20.0 * 6.8)).abs() < 5.0);
    }

    #[test]
    fn test_muted_graph_gets_no_requests() {
        let mut graph = AudioGraph::new(AudioGraphParams::default(), false);
        graph.initialize(OutputMode::Offline).unwrap();

        let mut controller = SonificationController::new(SonificationParams::default());
        graph.render_offline(48_000);
        assert!(controller.update(&mut graph, &motion(1.0, 0.0)).is_none());
        graph.render_offline(4800);
        assert_eq!(graph.probe(ParamId::TickGain), Some(0.0));
    }
}
