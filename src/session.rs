//! One sonar session: detector, smoothing, sound and microphone, driven one
//! tick at a time.
//!
//! The session is the only owner of motion and audio state. UI commands
//! arrive as method calls between ticks; anything the user should hear
//! about (a denied microphone, suspended playback) is queued as a
//! [`Notice`] instead of failing.

use std::fmt;
use std::sync::Arc;

use crate::audio::{
    AcquireOutcome, AudioGraph, GraphState, MicState, Microphone, MicrophoneProvider, OutputMode,
    Playback,
};
use crate::error::Result;
use crate::motion::{Frame, MotionDetector, MotionSample, MotionSmoother, SmoothedMotion};
use crate::params::{SessionConfig, SessionParams};
use crate::sonification::{SonificationController, SonificationUpdate};

/// User-visible conditions
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Microphone access refused; the session carries on without it
    MicrophoneDenied(String),

    /// Output stream exists but is not running; unlock again to resume
    PlaybackSuspended,

    /// No output device could be opened
    AudioUnavailable(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::MicrophoneDenied(reason) => write!(
                f,
                "Microphone permission denied ({}). Allow microphone access and try again.",
                reason
            ),
            Notice::PlaybackSuspended => {
                write!(f, "Audio playback is suspended. Unlock audio to resume.")
            }
            Notice::AudioUnavailable(reason) => write!(f, "Audio unavailable: {}", reason),
        }
    }
}

/// Consumer of per-tick motion (the particle layer, a HUD, ...)
pub trait VisualSink {
    fn update(&mut self, sample: &MotionSample, motion: &SmoothedMotion);

    /// Drop any accumulated visual state
    fn clear(&mut self);
}

/// Everything one tick produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub sample: MotionSample,
    pub smoothed: SmoothedMotion,
    /// `None` while the graph is not ready or the tonal bus is off
    pub sound: Option<SonificationUpdate>,
    /// The background was (re)captured on this tick
    pub calibrated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AutoCalibration {
    /// No frame seen yet
    WaitingForSource,
    /// Source is live; let exposure settle
    Settling { remaining: u32 },
    Done,
}

/// Per-run controller instance
pub struct SonarSession {
    params: SessionParams,
    detector: MotionDetector,
    smoother: MotionSmoother,
    controller: SonificationController,
    graph: AudioGraph,
    microphone: Microphone,
    output_mode: OutputMode,
    sensitivity: f32,
    calibration: AutoCalibration,
    recalibrate_requested: bool,
    notices: Vec<Notice>,
    visuals: Option<Box<dyn VisualSink>>,
    ticks: u64,
}

impl SonarSession {
    pub fn new(
        config: SessionConfig,
        output_mode: OutputMode,
        microphone: Arc<dyn MicrophoneProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let SessionConfig {
            detector,
            smoothing,
            sonification,
            audio,
            session,
            ..
        } = config;

        let detector = MotionDetector::new(detector);
        let smoother = MotionSmoother::new(smoothing, detector.frame_center());
        let mic_buffer_s = audio.mic_buffer_s;
        let sensitivity = session.initial_sensitivity;

        let mut this = Self {
            graph: AudioGraph::new(audio, session.sound_enabled),
            microphone: Microphone::new(microphone, mic_buffer_s),
            controller: SonificationController::new(sonification),
            params: session,
            detector,
            smoother,
            output_mode,
            sensitivity: 0.0,
            calibration: AutoCalibration::WaitingForSource,
            recalibrate_requested: false,
            notices: Vec::new(),
            visuals: None,
            ticks: 0,
        };
        this.set_sensitivity(sensitivity);
        Ok(this)
    }

    pub fn set_visuals(&mut self, visuals: Box<dyn VisualSink>) {
        self.visuals = Some(visuals);
    }

    pub fn detector(&self) -> &MotionDetector {
        &self.detector
    }

    pub fn graph(&self) -> &AudioGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut AudioGraph {
        &mut self.graph
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn sound_enabled(&self) -> bool {
        self.graph.tonal_enabled()
    }

    pub fn microphone_state(&self) -> MicState {
        self.microphone.state()
    }

    pub fn is_calibrated(&self) -> bool {
        self.detector.is_ready()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Take every notice raised since the last call
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, notice: Notice) {
        log::warn!("{}", notice);
        self.notices.push(notice);
    }

    /// Sensitivity from the UI, clamped to the detector's range. Non-finite
    /// values are ignored and the previous sensitivity stays in effect.
    pub fn set_sensitivity(&mut self, value: f32) {
        if !value.is_finite() {
            log::warn!("Ignoring sensitivity {}", value);
            return;
        }
        let (lo, hi) = self.detector.params().sensitivity_range;
        self.sensitivity = value.clamp(lo, hi);
    }

    /// Build the graph on first use, resume playback afterwards
    pub fn unlock_audio(&mut self) -> GraphState {
        match self.graph.state() {
            GraphState::Ready => {
                if self.graph.resume() == Playback::Suspended {
                    self.notify(Notice::PlaybackSuspended);
                }
            }
            _ => match self.graph.initialize(self.output_mode) {
                Ok(()) => {
                    if self.graph.playback() == Playback::Suspended {
                        self.notify(Notice::PlaybackSuspended);
                    }
                }
                Err(e) => self.notify(Notice::AudioUnavailable(e.to_string())),
            },
        }
        self.graph.state()
    }

    /// Flip the tonal bus. The microphone bus is unaffected.
    pub fn toggle_sound(&mut self) -> bool {
        let enabled = !self.graph.tonal_enabled();
        self.unlock_audio();
        self.graph.set_tonal_enabled(enabled);
        log::info!("Sound {}", if enabled { "on" } else { "off" });
        enabled
    }

    /// Request the microphone, or release it if live. Ignored while a
    /// request is still pending.
    pub fn toggle_microphone(&mut self) -> MicState {
        if self.unlock_audio() != GraphState::Ready {
            return self.microphone.state();
        }

        match self.microphone.state() {
            MicState::Disabled => {
                if let Some(sample_rate) = self.graph.sample_rate() {
                    self.microphone.request(sample_rate);
                }
            }
            MicState::Acquiring => log::debug!("Microphone request already pending"),
            MicState::Enabled => self.disable_microphone(),
        }
        self.microphone.state()
    }

    /// Cancel a pending request or release the live device
    pub fn disable_microphone(&mut self) {
        if self.microphone.release() {
            self.graph.disconnect_microphone();
        }
    }

    /// Apply a finished microphone request, if any
    pub fn poll_microphone(&mut self) -> MicState {
        if let Some(outcome) = self.microphone.poll() {
            self.apply_outcome(outcome);
        }
        self.microphone.state()
    }

    /// Block up to `timeout` for a pending microphone request
    pub fn wait_for_microphone(&mut self, timeout: std::time::Duration) -> MicState {
        if let Some(outcome) = self.microphone.wait(timeout) {
            self.apply_outcome(outcome);
        }
        self.microphone.state()
    }

    fn apply_outcome(&mut self, outcome: AcquireOutcome) {
        match outcome {
            AcquireOutcome::Granted(feed) => self.graph.connect_microphone(feed),
            AcquireOutcome::Denied(reason) => self.notify(Notice::MicrophoneDenied(reason)),
            AcquireOutcome::Cancelled => {}
        }
    }

    /// Capture the background from the next frame
    pub fn recalibrate(&mut self) {
        self.recalibrate_requested = true;
    }

    pub fn clear_visuals(&mut self) {
        if let Some(visuals) = &mut self.visuals {
            visuals.clear();
        }
    }

    fn calibrate_if_due(&mut self, frame: &Frame) -> bool {
        if self.recalibrate_requested {
            self.recalibrate_requested = false;
            if self.detector.calibrate(frame) {
                self.calibration = AutoCalibration::Done;
                return true;
            }
            return false;
        }

        if self.calibration == AutoCalibration::WaitingForSource {
            if frame.is_empty() {
                return false;
            }
            log::info!("Frame source ready, calibrating shortly");
            self.calibration = AutoCalibration::Settling {
                remaining: self.params.calibration_delay_ticks(),
            };
        }

        if let AutoCalibration::Settling { remaining } = &mut self.calibration {
            if *remaining > 0 {
                *remaining -= 1;
                return false;
            }
            if self.detector.calibrate(frame) {
                self.calibration = AutoCalibration::Done;
                return true;
            }
        }
        false
    }

    /// Run one detection/sonification step on `frame`
    pub fn tick(&mut self, frame: &Frame) -> TickReport {
        self.poll_microphone();

        let calibrated = self.calibrate_if_due(frame);
        let sample = self.detector.detect(frame, self.sensitivity);
        let smoothed = self.smoother.update(&sample);
        let sound = self.controller.update(&mut self.graph, &smoothed);

        if let Some(visuals) = &mut self.visuals {
            visuals.update(&sample, &smoothed);
        }

        self.ticks += 1;
        log::debug!(
            "tick {}: energy {:.3} active {:.3} gain {:.2}",
            self.ticks,
            sample.energy,
            sample.active_percent,
            self.detector.gain()
        );

        TickReport {
            sample,
            smoothed,
            sound,
            calibrated,
        }
    }
}
