//! Error types for the motion-sonar pipeline.
//!
//! Only genuinely unrecoverable setup failures surface here. Conditions the
//! session is expected to ride out (camera not ready, microphone denied,
//! playback suspended) are states and notices, not errors.

use thiserror::Error;

/// Crate-wide error
#[derive(Error, Debug)]
pub enum SonarError {
    /// Parameter validation failed
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Config file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame image could not be decoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// WAV capture file error
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// No usable audio device, or the device refused the stream
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    /// Audio stream was built but could not be driven
    #[error("Audio stream error: {0}")]
    AudioStream(String),
}

/// Result type for motion-sonar operations
pub type Result<T> = std::result::Result<T, SonarError>;
