//! Render-side synthesis graph.
//!
//! ```text
//! triangle osc -> low-pass -> tick envelope --+
//!                                             +-> tonal bus --+--> master bus -> playback
//! noise loop -> band-pass -> whoosh gain -----+               |
//!                                                             +--> capture tap
//! microphone feed ------------------------------> mic bus ----+
//! ```
//!
//! The graph is built once and owned by whoever renders it: the device
//! callback, or the offline renderer. Control code reaches it only through
//! [`GraphCommand`]s and reads time through the shared [`AudioClock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use super::automation::{AutomatedParam, Automation};
use super::mic::MicFeed;
use super::nodes::{Biquad, FilterKind, NoiseLoop, TriangleOscillator};
use crate::params::AudioGraphParams;

/// Automatable parameters of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    OscillatorFrequency,
    LowpassCutoff,
    TickGain,
    WhooshCenter,
    WhooshGain,
    TonalBus,
    MicBus,
    MasterBus,
}

impl ParamId {
    pub const COUNT: usize = 8;

    pub const ALL: [ParamId; ParamId::COUNT] = [
        ParamId::OscillatorFrequency,
        ParamId::LowpassCutoff,
        ParamId::TickGain,
        ParamId::WhooshCenter,
        ParamId::WhooshGain,
        ParamId::TonalBus,
        ParamId::MicBus,
        ParamId::MasterBus,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Requests from the control side, applied at the start of the next block
pub enum GraphCommand {
    Schedule { param: ParamId, event: Automation },
    CancelScheduled { param: ParamId, from: f64 },
    ConnectMic(MicFeed),
    DisconnectMic,
}

/// Audio time as seen from the control side
///
/// Counts frames rendered since the graph was built, so it starts at zero
/// and only moves while audio is actually being produced.
#[derive(Debug, Clone)]
pub struct AudioClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl AudioClock {
    fn new(sample_rate: u32) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    /// Seconds of audio rendered so far
    pub fn now(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn publish(&self, frames: u64) {
        self.frames.store(frames, Ordering::Release);
    }
}

/// Disconnected microphone feeds awaiting release on the control side
const RETIRED_FEEDS: usize = 4;

/// Control-side ends of a freshly built graph
pub struct GraphLink {
    pub commands: Sender<GraphCommand>,
    pub clock: AudioClock,
    pub capture: HeapCons<f32>,
    /// Feeds the graph let go of; drop them here, not on the render thread
    pub retired: Receiver<MicFeed>,
}

/// The synthesis network
pub struct SynthGraph {
    frames: u64,
    clock: AudioClock,
    commands: Receiver<GraphCommand>,
    capture: HeapProd<f32>,
    params: [AutomatedParam; ParamId::COUNT],
    oscillator: TriangleOscillator,
    lowpass: Biquad,
    noise: NoiseLoop,
    bandpass: Biquad,
    mic: Option<MicFeed>,
    retired: Sender<MicFeed>,
    output_limit: f32,
}

impl SynthGraph {
    /// Build every node once. The tonal bus starts at its nominal level
    /// when `tonal_enabled`, silent otherwise.
    pub fn build(
        params: &AudioGraphParams,
        sample_rate: u32,
        tonal_enabled: bool,
    ) -> (Self, GraphLink) {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (retired_tx, retired_rx) = crossbeam_channel::bounded(RETIRED_FEEDS);
        let clock = AudioClock::new(sample_rate);

        let capture_len = ((sample_rate as f32 * params.capture_buffer_s) as usize).max(1);
        let (capture_prod, capture_cons) = HeapRb::<f32>::new(capture_len).split();

        let tonal_level = if tonal_enabled {
            params.tonal_nominal_gain
        } else {
            0.0
        };
        let initial = |id: ParamId| match id {
            ParamId::OscillatorFrequency => params.initial_pitch_hz,
            ParamId::LowpassCutoff => params.initial_cutoff_hz,
            ParamId::TickGain => 0.0,
            ParamId::WhooshCenter => params.initial_whoosh_center_hz,
            ParamId::WhooshGain => 0.0,
            ParamId::TonalBus => tonal_level,
            ParamId::MicBus => params.mic_gain,
            ParamId::MasterBus => params.master_gain,
        };

        let graph = Self {
            frames: 0,
            clock: clock.clone(),
            commands: command_rx,
            capture: capture_prod,
            params: ParamId::ALL.map(|id| AutomatedParam::new(initial(id), sample_rate)),
            oscillator: TriangleOscillator::new(sample_rate),
            lowpass: Biquad::new(
                FilterKind::LowPass,
                params.initial_cutoff_hz,
                params.lowpass_q,
                sample_rate,
            ),
            noise: NoiseLoop::new(
                params.noise_len(sample_rate),
                params.noise_amplitude,
                params.noise_seed,
            ),
            bandpass: Biquad::new(
                FilterKind::BandPass,
                params.initial_whoosh_center_hz,
                params.whoosh_q,
                sample_rate,
            ),
            mic: None,
            retired: retired_tx,
            output_limit: params.output_limit,
        };

        let link = GraphLink {
            commands: command_tx,
            clock,
            capture: capture_cons,
            retired: retired_rx,
        };

        (graph, link)
    }

    /// Current value of a parameter (as of the last rendered sample)
    pub fn param_value(&self, id: ParamId) -> f32 {
        self.params[id.index()].value()
    }

    pub fn mic_connected(&self) -> bool {
        self.mic.is_some()
    }

    fn apply_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                GraphCommand::Schedule { param, event } => {
                    self.params[param.index()].schedule(event);
                }
                GraphCommand::CancelScheduled { param, from } => {
                    self.params[param.index()].cancel_from(from);
                }
                GraphCommand::ConnectMic(feed) => {
                    self.retire_mic();
                    self.mic = Some(feed);
                }
                GraphCommand::DisconnectMic => self.retire_mic(),
            }
        }
    }

    /// Hand the current feed back to the control side. Bounded channel, so
    /// no allocation here; a full channel drops the feed in place.
    fn retire_mic(&mut self) {
        if let Some(feed) = self.mic.take() {
            let _ = self.retired.try_send(feed);
        }
    }

    /// Render one sample, returning (master, capture)
    #[inline]
    fn tick(&mut self, t: f64) -> (f32, f32) {
        let [osc_freq, cutoff, tick_gain, whoosh_center, whoosh_gain, tonal_bus, mic_bus, master_bus] =
            &mut self.params;

        let tone = self.oscillator.next(osc_freq.next(t));
        let tone = self.lowpass.process(tone, cutoff.next(t));
        let ping = tone * tick_gain.next(t);

        let hiss = self.bandpass.process(self.noise.next(), whoosh_center.next(t));
        let whoosh = hiss * whoosh_gain.next(t);

        let tonal = (ping + whoosh) * tonal_bus.next(t);

        let mic_in = self
            .mic
            .as_mut()
            .and_then(|feed| feed.try_pop())
            .unwrap_or(0.0);
        let mic = mic_in * mic_bus.next(t);

        let capture = tonal + mic;
        let master = (tonal + mic) * master_bus.next(t);
        (master, capture)
    }

    /// Fill an interleaved output buffer. Every channel carries the same
    /// mono master signal; the capture mix goes to the capture tap.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        self.apply_commands();

        let channels = channels.max(1);
        let sample_rate = self.clock.sample_rate() as f64;
        let limit = self.output_limit;

        for frame in out.chunks_mut(channels) {
            let t = self.frames as f64 / sample_rate;
            let (master, capture) = self.tick(t);

            // Safety limiter
            let master = master.clamp(-limit, limit);
            frame.fill(master);

            // Capture tap drops samples nobody is draining
            let _ = self.capture.try_push(capture);
            self.frames += 1;
        }

        self.clock.publish(self.frames);
    }
}
