//! Sonar synthesis: a persistent audio graph driven by scheduled automation.
//!
//! The graph is built once on the first unlock and then lives on the render
//! side (the device callback or the offline renderer). Everything else talks
//! to it through the [`AudioGraph`] handle, which only sends timestamped
//! parameter requests and reads the audio clock.

mod automation;
mod graph;
mod mic;
mod nodes;
mod system;

pub use automation::{AutomatedParam, Automation};
pub use graph::{AudioClock, GraphCommand, GraphLink, ParamId, SynthGraph};
pub use mic::{
    AcquireOutcome, CpalMicrophone, DeviceGuard, MicFeed, MicState, Microphone,
    MicrophoneProvider,
};
pub use nodes::{Biquad, FilterKind, NoiseLoop, TriangleOscillator};
pub use system::{AudioGraph, GraphState, OutputMode, Playback};

#[cfg(test)]
pub(crate) use mic::tests as mic_fixtures;
