//! Frame sources feeding the detector.
//!
//! Camera capture itself is out of scope; these sources stand in for it.

use std::path::{Path, PathBuf};

use glam::Vec2;
use image::imageops::FilterType;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Result, SonarError};
use crate::motion::Frame;
use crate::params::SceneParams;

/// Delivers one frame per tick; an empty frame means "not ready"
pub trait FrameSource {
    fn next_frame(&mut self) -> Frame;
}

/// Procedural scene: a bright block wandering over a textured backdrop
pub struct SyntheticScene {
    params: SceneParams,
    width: usize,
    height: usize,
    tick_period_s: f32,
    ticks: u64,
    backdrop: Vec<u8>,
    rng: StdRng,
}

impl SyntheticScene {
    pub fn new(params: SceneParams, width: usize, height: usize, tick_rate_hz: f32) -> Self {
        let seed = params.seed.unwrap_or_else(|| rand::rng().random());

        // Gray texture so the detector has something other than a flat field
        let mut backdrop = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let t = (x as f32 * 0.05).sin() * (y as f32 * 0.07).cos();
                let luma = params.background_luma + t * params.texture_amplitude;
                backdrop.push(luma.clamp(0.0, 255.0) as u8);
            }
        }

        Self {
            params,
            width,
            height,
            tick_period_s: 1.0 / tick_rate_hz,
            ticks: 0,
            backdrop,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Scene time once the warm-up is over
    fn scene_time_s(&self) -> Option<f32> {
        let warmup = self.params.warmup_frames as u64;
        (self.ticks >= warmup).then(|| (self.ticks - warmup) as f32 * self.tick_period_s)
    }

    /// Block center at scene time `time_s`, or `None` while it is away
    pub fn block_center(&self, time_s: f32) -> Option<Vec2> {
        let p = &self.params;
        if (time_s * p.presence_freq_hz).sin() <= p.presence_cutoff {
            return None;
        }

        let w = self.width as f32;
        let h = self.height as f32;

        // Layered sines: wide sweeps plus faster detail
        let x = 0.5
            + (time_s * p.x_freq_primary_hz).sin() * p.x_amplitude_primary
            + (time_s * p.x_freq_secondary_hz).cos() * p.x_amplitude_secondary;
        let y = 0.5
            + (time_s * p.y_freq_primary_hz).sin() * p.y_amplitude_primary
            + (time_s * p.y_detail_freq_hz).sin() * p.y_detail_amplitude;

        Some(Vec2::new(x.clamp(0.0, 1.0) * w, y.clamp(0.0, 1.0) * h))
    }
}

impl FrameSource for SyntheticScene {
    fn next_frame(&mut self) -> Frame {
        let time_s = self.scene_time_s();
        self.ticks += 1;

        let Some(time_s) = time_s else {
            return Frame::empty(self.width, self.height);
        };

        let noise = self.params.sensor_noise;
        let mut pixels = Vec::with_capacity(self.width * self.height * Frame::CHANNELS);
        for &base in &self.backdrop {
            let jitter = if noise > 0.0 {
                self.rng.random_range(-noise..=noise)
            } else {
                0.0
            };
            let v = (base as f32 + jitter).clamp(0.0, 255.0) as u8;
            pixels.extend_from_slice(&[v, v, v, 255]);
        }
        let mut frame = Frame::new(self.width, self.height, pixels);

        if let Some(center) = self.block_center(time_s) {
            let size = (self.params.block_size * self.height as f32) as usize;
            let half = size as f32 / 2.0;
            let x = (center.x - half).max(0.0) as usize;
            let y = (center.y - half).max(0.0) as usize;
            let v = self.params.block_luma.clamp(0.0, 255.0) as u8;
            frame.fill_rect(x, y, size, size, [v, v, v, 255]);
        }

        frame
    }
}

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// Directory of still images played in name order, looping
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    width: usize,
    height: usize,
    position: usize,
}

impl ImageSequence {
    /// Collect every image file in `dir`; frames are resized to `width` x `height`
    pub fn new(dir: impl AsRef<Path>, width: usize, height: usize) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(SonarError::Config(format!(
                "No images found in {}",
                dir.display()
            )));
        }

        log::info!("Image sequence: {} frames from {}", paths.len(), dir.display());
        Ok(Self {
            paths,
            width,
            height,
            position: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn load(&self, path: &Path) -> Result<Frame> {
        let image = image::open(path)?;
        let rgba = image
            .resize_exact(self.width as u32, self.height as u32, FilterType::Triangle)
            .to_rgba8();
        Ok(Frame::new(self.width, self.height, rgba.into_raw()))
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Frame {
        let path = &self.paths[self.position];
        self.position = (self.position + 1) % self.paths.len();

        match self.load(path) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                Frame::empty(self.width, self.height)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::MotionDetector;
    use crate::params::DetectorParams;

    fn scene(params: SceneParams) -> SyntheticScene {
        SyntheticScene::new(
            SceneParams {
                seed: Some(11),
                ..params
            },
            160,
            120,
            30.0,
        )
    }

    #[test]
    fn test_scene_warms_up_with_empty_frames() {
        let mut scene = scene(SceneParams {
            warmup_frames: 3,
            ..Default::default()
        });
        for _ in 0..3 {
            assert!(scene.next_frame().is_empty());
        }
        let frame = scene.next_frame();
        assert!(frame.is_well_formed());
        assert_eq!((frame.width(), frame.height()), (160, 120));
    }

    #[test]
    fn test_block_stays_in_frame() {
        let scene = scene(SceneParams::default());
        for n in 0..600 {
            if let Some(c) = scene.block_center(n as f32 / 30.0) {
                assert!((0.0..=160.0).contains(&c.x));
                assert!((0.0..=120.0).contains(&c.y));
            }
        }
        assert!(scene.block_center(0.0).is_some());
    }

    #[test]
    fn test_scene_reads_as_motion() {
        let mut source = scene(SceneParams {
            warmup_frames: 0,
            ..Default::default()
        });
        let mut detector = MotionDetector::new(DetectorParams {
            frame_width: 160,
            frame_height: 120,
            ..Default::default()
        });

        // Calibrate on the plain backdrop, then watch the block move over it
        let backdrop = Frame::new(
            160,
            120,
            source.backdrop.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        );
        assert!(detector.calibrate(&backdrop));

        let peak = (0..30)
            .map(|_| detector.detect(&source.next_frame(), 45.0).energy)
            .fold(0.0f32, f32::max);
        assert!(peak > 0.1, "peak energy {}", peak);
    }

    #[test]
    fn test_static_noise_stays_quiet() {
        // No block: only sensor noise below the floor
        let mut source = scene(SceneParams {
            warmup_frames: 0,
            presence_cutoff: 1.0,
            ..Default::default()
        });
        let mut detector = MotionDetector::new(DetectorParams {
            frame_width: 160,
            frame_height: 120,
            ..Default::default()
        });
        assert!(detector.calibrate(&source.next_frame()));
        for _ in 0..20 {
            let sample = detector.detect(&source.next_frame(), 10.0);
            assert_eq!(sample.active_percent, 0.0);
        }
    }

    #[test]
    fn test_image_sequence_resizes_and_loops() {
        let dir = tempfile::tempdir().unwrap();
        for (name, shade) in [("a.png", 40u8), ("b.png", 200u8)] {
            image::RgbaImage::from_pixel(32, 24, image::Rgba([shade, shade, shade, 255]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let mut seq = ImageSequence::new(dir.path(), 16, 12).unwrap();
        assert_eq!(seq.len(), 2);

        let a = seq.next_frame();
        let b = seq.next_frame();
        let a_again = seq.next_frame();
        assert!(a.is_well_formed());
        assert_eq!((a.width(), a.height()), (16, 12));
        assert!((a.luma_at(0) - 40.0).abs() < 1.0);
        assert!((b.luma_at(0) - 200.0).abs() < 1.0);
        assert_eq!(a, a_again);
    }

    #[test]
    fn test_broken_image_yields_empty_frame() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"definitely not png").unwrap();

        let mut seq = ImageSequence::new(dir.path(), 16, 12).unwrap();
        assert!(seq.next_frame().is_empty());
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequence::new(dir.path(), 16, 12),
            Err(SonarError::Config(_))
        ));
    }
}
