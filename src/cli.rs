//! Command-line argument parsing and interactive commands.

use std::path::PathBuf;

use clap::Parser;

use crate::audio::OutputMode;
use crate::error::Result;
use crate::params::{RecordingConfig, SessionConfig};
use crate::source::{FrameSource, ImageSequence, SyntheticScene};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "motion-sonar")]
#[command(about = "Turns motion in a video stream into sonar ticks", long_about = None)]
pub struct Args {
    /// Stop after this many seconds (runs until `q` otherwise)
    #[arg(long, value_name = "SECONDS")]
    pub duration: Option<f32>,

    /// Tick rate override (Hz)
    #[arg(long, value_name = "HZ")]
    pub fps: Option<f32>,

    /// Initial sensitivity (10 = most sensitive, 80 = least)
    #[arg(long, value_name = "VALUE")]
    pub sensitivity: Option<f32>,

    /// Directory of images to use instead of the synthetic scene
    #[arg(long, value_name = "DIR")]
    pub frames: Option<PathBuf>,

    /// TOML file overriding tuned parameters
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Record the capture mix to <DIR>/capture.wav for --duration seconds
    #[arg(long, value_name = "DIR", requires = "duration")]
    pub record: Option<String>,

    /// Render without an audio device (as fast as possible)
    #[arg(long)]
    pub offline: bool,

    /// Start with the tonal sound disabled
    #[arg(long)]
    pub mute: bool,

    /// Request the microphone at startup
    #[arg(long)]
    pub mic: bool,
}

impl Args {
    /// Load the config file (if any) and apply command-line overrides
    pub fn load_config(&self) -> Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::load(path)?,
            None => SessionConfig::default(),
        };

        if let Some(fps) = self.fps {
            config.session.tick_rate_hz = fps;
        }
        if let Some(sensitivity) = self.sensitivity {
            config.session.initial_sensitivity = sensitivity;
        }
        if self.mute {
            config.session.sound_enabled = false;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn output_mode(&self) -> OutputMode {
        if self.offline {
            OutputMode::Offline
        } else {
            OutputMode::Device
        }
    }

    /// Image sequence when `--frames` is given, synthetic scene otherwise
    pub fn frame_source(&self, config: &SessionConfig) -> Result<Box<dyn FrameSource>> {
        let width = config.detector.frame_width;
        let height = config.detector.frame_height;

        match &self.frames {
            Some(dir) => Ok(Box::new(ImageSequence::new(dir, width, height)?)),
            None => {
                log::info!("Source: synthetic scene ({}x{})", width, height);
                Ok(Box::new(SyntheticScene::new(
                    config.scene.clone(),
                    width,
                    height,
                    config.session.tick_rate_hz,
                )))
            }
        }
    }

    /// Create recording configuration if recording mode is enabled
    pub fn recording_config(&self) -> Option<RecordingConfig> {
        match (&self.record, self.duration) {
            (Some(dir), Some(duration)) => Some(RecordingConfig::new(duration, dir.as_str())),
            _ => None,
        }
    }
}

/// Keyboard commands read from stdin while running
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Unlock,
    Recalibrate,
    ToggleSound,
    ToggleMicrophone,
    /// Cancel a pending microphone request or release the device
    DisableMicrophone,
    ClearVisuals,
    SetSensitivity(f32),
    Help,
    Quit,
}

impl Command {
    pub const HELP: &'static str = "u: unlock audio | c: calibrate | s: sound | m: mic | \
                                    d: mic off | r: clear visuals | <10-80>: sensitivity | q: quit";

    /// Parse one input line; `None` for anything unrecognised
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if let Ok(value) = line.parse::<f32>() {
            return value.is_finite().then_some(Command::SetSensitivity(value));
        }

        match line.to_lowercase().as_str() {
            "u" => Some(Command::Unlock),
            "c" => Some(Command::Recalibrate),
            "s" => Some(Command::ToggleSound),
            "m" => Some(Command::ToggleMicrophone),
            "d" => Some(Command::DisableMicrophone),
            "r" => Some(Command::ClearVisuals),
            "h" | "?" => Some(Command::Help),
            "q" | "quit" => Some(Command::Quit),
            _ => None,
        }
    }
}
