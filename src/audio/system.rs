//! Control-side handle to the synthesis graph.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use ringbuf::traits::Consumer;
use ringbuf::HeapCons;

use super::automation::Automation;
use super::graph::{AudioClock, GraphCommand, GraphLink, ParamId, SynthGraph};
use super::mic::MicFeed;
use crate::error::{Result, SonarError};
use crate::params::AudioGraphParams;

/// Graph lifecycle; `Ready` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Whether the output stream is actually producing audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    Suspended,
    Running,
}

/// Where rendered audio goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Default output device through cpal
    Device,
    /// No device; the caller pulls samples with [`AudioGraph::render_offline`]
    Offline,
}

enum Output {
    /// Stream kept alive; the graph lives inside its callback
    Device(cpal::Stream),
    Offline {
        graph: Box<SynthGraph>,
        scratch: Vec<f32>,
    },
}

struct Live {
    commands: Sender<GraphCommand>,
    clock: AudioClock,
    capture: HeapCons<f32>,
    retired: Receiver<MicFeed>,
    output: Output,
}

/// Audio graph handle owned by the session
pub struct AudioGraph {
    params: AudioGraphParams,
    state: GraphState,
    playback: Playback,
    tonal_enabled: bool,
    live: Option<Live>,
}

impl AudioGraph {
    pub fn new(params: AudioGraphParams, tonal_enabled: bool) -> Self {
        Self {
            params,
            state: GraphState::Uninitialized,
            playback: Playback::Suspended,
            tonal_enabled,
            live: None,
        }
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == GraphState::Ready
    }

    pub fn playback(&self) -> Playback {
        self.playback
    }

    pub fn params(&self) -> &AudioGraphParams {
        &self.params
    }

    /// Build the graph and start output. Calling again once ready is a no-op.
    pub fn initialize(&mut self, mode: OutputMode) -> Result<()> {
        if self.state != GraphState::Uninitialized {
            return Ok(());
        }
        self.state = GraphState::Initializing;

        let started = match mode {
            OutputMode::Device => self.open_device(),
            OutputMode::Offline => Ok(self.open_offline()),
        };

        match started {
            Ok((live, playback)) => {
                log::info!(
                    "Audio graph ready ({:?}, {}Hz, {:?})",
                    mode,
                    live.clock.sample_rate(),
                    playback
                );
                self.live = Some(live);
                self.playback = playback;
                self.state = GraphState::Ready;
                Ok(())
            }
            Err(e) => {
                self.state = GraphState::Uninitialized;
                Err(e)
            }
        }
    }

    fn open_offline(&self) -> (Live, Playback) {
        let (graph, link) = SynthGraph::build(
            &self.params,
            self.params.offline_sample_rate_hz,
            self.tonal_enabled,
        );
        let GraphLink {
            commands,
            clock,
            capture,
            retired,
        } = link;

        let live = Live {
            commands,
            clock,
            capture,
            retired,
            output: Output::Offline {
                graph: Box::new(graph),
                scratch: Vec::new(),
            },
        };
        (live, Playback::Running)
    }

    fn open_device(&self) -> Result<(Live, Playback)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SonarError::AudioDevice("No audio output device found".to_string()))?;

        let config = device
            .default_output_config()
            .map_err(|e| SonarError::AudioDevice(format!("Failed to get audio config: {}", e)))?;

        log::info!(
            "Audio: {} @ {}Hz",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            config.sample_rate().0
        );

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        let (mut graph, link) = SynthGraph::build(&self.params, sample_rate, self.tonal_enabled);

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    graph.render(data, channels);
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| SonarError::AudioStream(format!("Failed to build audio stream: {}", e)))?;

        let playback = match stream.play() {
            Ok(()) => Playback::Running,
            Err(e) => {
                log::warn!("Audio playback suspended: {}", e);
                Playback::Suspended
            }
        };

        let live = Live {
            commands: link.commands,
            clock: link.clock,
            capture: link.capture,
            retired: link.retired,
            output: Output::Device(stream),
        };
        Ok((live, playback))
    }

    /// Retry starting a suspended output stream
    pub fn resume(&mut self) -> Playback {
        if self.playback == Playback::Suspended {
            match &self.live {
                Some(Live {
                    output: Output::Device(stream),
                    ..
                }) => match stream.play() {
                    Ok(()) => {
                        log::info!("Audio playback resumed");
                        self.playback = Playback::Running;
                    }
                    Err(e) => log::warn!("Audio playback still suspended: {}", e),
                },
                Some(Live {
                    output: Output::Offline { .. },
                    ..
                }) => self.playback = Playback::Running,
                None => {}
            }
        }
        self.playback
    }

    /// Pause output. The clock stops with it and nothing is rendered until
    /// [`resume`](Self::resume).
    pub fn suspend(&mut self) -> Playback {
        if self.playback == Playback::Running {
            match &self.live {
                Some(Live {
                    output: Output::Device(stream),
                    ..
                }) => match stream.pause() {
                    Ok(()) => {
                        log::info!("Audio playback suspended");
                        self.playback = Playback::Suspended;
                    }
                    Err(e) => log::warn!("Failed to suspend audio playback: {}", e),
                },
                Some(Live {
                    output: Output::Offline { .. },
                    ..
                }) => self.playback = Playback::Suspended,
                None => {}
            }
        }
        self.playback
    }

    /// Audio clock in seconds (0 before initialization)
    pub fn now(&self) -> f64 {
        self.live.as_ref().map_or(0.0, |live| live.clock.now())
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.live.as_ref().map(|live| live.clock.sample_rate())
    }

    fn send(&self, command: GraphCommand) {
        if let Some(live) = &self.live {
            // Feeds the render side disconnected are released here
            while let Ok(feed) = live.retired.try_recv() {
                drop(feed);
            }
            // Render side gone only during teardown
            let _ = live.commands.send(command);
        }
    }

    pub fn schedule(&self, param: ParamId, event: Automation) {
        self.send(GraphCommand::Schedule { param, event });
    }

    pub fn cancel_scheduled(&self, param: ParamId, from: f64) {
        self.send(GraphCommand::CancelScheduled { param, from });
    }

    /// Approach `value` from now with the given time constant
    pub fn set_param(&self, param: ParamId, value: f32, time_constant: f32) {
        self.schedule(
            param,
            Automation::SetTarget {
                at: self.now(),
                value,
                time_constant,
            },
        );
    }

    pub fn tonal_enabled(&self) -> bool {
        self.tonal_enabled
    }

    /// Ramp the tonal bus to its nominal level or to silence. The microphone
    /// bus is left alone.
    pub fn set_tonal_enabled(&mut self, enabled: bool) {
        self.tonal_enabled = enabled;
        let level = if enabled {
            self.params.tonal_nominal_gain
        } else {
            0.0
        };
        self.set_param(ParamId::TonalBus, level, self.params.bus_toggle_time_constant_s);
    }

    pub fn connect_microphone(&self, feed: MicFeed) {
        self.send(GraphCommand::ConnectMic(feed));
    }

    pub fn disconnect_microphone(&self) {
        self.send(GraphCommand::DisconnectMic);
    }

    /// Move everything the capture tap has produced into `out`
    pub fn drain_capture(&mut self, out: &mut Vec<f32>) -> usize {
        match &mut self.live {
            Some(live) => {
                let before = out.len();
                out.extend(live.capture.pop_iter());
                out.len() - before
            }
            None => 0,
        }
    }

    /// Render `frames` mono samples without a device, advancing the clock.
    /// Returns the rendered master signal; empty unless running offline.
    pub fn render_offline(&mut self, frames: usize) -> &[f32] {
        let running = self.playback == Playback::Running;
        match &mut self.live {
            Some(Live {
                output: Output::Offline { graph, scratch },
                ..
            }) if running => {
                scratch.clear();
                scratch.resize(frames, 0.0);
                graph.render(scratch, 1);
                scratch.as_slice()
            }
            _ => &[],
        }
    }

    /// Current value of a graph parameter; offline only
    pub fn probe(&self, param: ParamId) -> Option<f32> {
        match &self.live {
            Some(Live {
                output: Output::Offline { graph, .. },
                ..
            }) => Some(graph.param_value(param)),
            _ => None,
        }
    }
}
