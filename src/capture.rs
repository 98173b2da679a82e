//! Capture sink: writes the capture tap to a mono WAV file.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::Result;

/// Mono 32-bit float WAV writer with a sample budget
pub struct CaptureWriter {
    writer: hound::WavWriter<BufWriter<File>>,
    written: usize,
    limit: Option<usize>,
}

impl CaptureWriter {
    /// Create `path` (and its parent directories). Writing stops after
    /// `limit` samples when one is given.
    pub fn create(path: impl AsRef<Path>, sample_rate: u32, limit: Option<usize>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let writer = hound::WavWriter::create(path, spec)?;
        log::info!("Recording capture to {}", path.display());

        Ok(Self {
            writer,
            written: 0,
            limit,
        })
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// All requested samples have been written
    pub fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.written >= limit)
    }

    /// Append samples, dropping anything past the limit
    pub fn write(&mut self, samples: &[f32]) -> Result<usize> {
        let room = self
            .limit
            .map_or(samples.len(), |limit| limit.saturating_sub(self.written));
        let take = samples.len().min(room);

        for &s in &samples[..take] {
            self.writer.write_sample(s)?;
        }
        self.written += take;
        Ok(take)
    }

    /// Flush the header and close the file
    pub fn finalize(self) -> Result<usize> {
        let written = self.written;
        self.writer.finalize()?;
        log::info!("Capture finished: {} samples", written);
        Ok(written)
    }
}
