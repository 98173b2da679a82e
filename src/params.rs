//! Parameter definitions with physical units and documented semantics.
//!
//! All tuned numbers live here with:
//! - Physical units (seconds, Hz, pixels)
//! - Documented ranges and meanings
//! - Defaults matching the hand-tuned values, overridable from a TOML file

mod audio;
mod detector;
mod scene;
mod session;
mod sonification;
mod tracking;

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SonarError};

// Re-export all types
pub use audio::AudioGraphParams;
pub use detector::DetectorParams;
pub use scene::SceneParams;
pub use session::{RecordingConfig, SessionParams};
pub use sonification::SonificationParams;
pub use tracking::SmoothingParams;

/// Complete session configuration, one section per component
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub detector: DetectorParams,
    pub smoothing: SmoothingParams,
    pub sonification: SonificationParams,
    pub audio: AudioGraphParams,
    pub session: SessionParams,
    pub scene: SceneParams,
}

impl SessionConfig {
    /// Parse a TOML document; missing sections and keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        log::info!("Loaded config from {}", path.as_ref().display());
        Self::from_toml_str(&source)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.detector
            .validate()
            .and_then(|_| self.smoothing.validate())
            .and_then(|_| self.sonification.validate())
            .and_then(|_| self.audio.validate())
            .and_then(|_| self.session.validate())
            .and_then(|_| self.scene.validate())
            .map_err(SonarError::Config)
    }
}
