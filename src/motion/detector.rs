//! Adaptive background-subtraction detector.

use glam::Vec2;

use super::gain::AutoGain;
use super::{frame_center, Frame, MotionSample};
use crate::params::DetectorParams;

/// Per-pixel luma estimate of the static scene
#[derive(Debug, Clone)]
pub struct BackgroundModel {
    luma: Vec<f32>,
    ready: bool,
}

impl BackgroundModel {
    fn new(pixel_count: usize) -> Self {
        Self {
            luma: vec![0.0; pixel_count],
            ready: false,
        }
    }

    /// Calibrated at least once
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Luma estimates, row-major, one per frame pixel
    pub fn luma(&self) -> &[f32] {
        &self.luma
    }
}

/// Motion detector owning the background model and gain loop
pub struct MotionDetector {
    params: DetectorParams,
    background: BackgroundModel,
    gain: AutoGain,
}

impl MotionDetector {
    /// Create an uncalibrated detector
    pub fn new(params: DetectorParams) -> Self {
        let background = BackgroundModel::new(params.pixel_count());
        let gain = AutoGain::new(&params);
        Self {
            params,
            background,
            gain,
        }
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    pub fn background(&self) -> &BackgroundModel {
        &self.background
    }

    pub fn is_ready(&self) -> bool {
        self.background.ready
    }

    pub fn gain(&self) -> f32 {
        self.gain.value()
    }

    pub fn frame_center(&self) -> Vec2 {
        frame_center(self.params.frame_width, self.params.frame_height)
    }

    fn accepts(&self, frame: &Frame) -> bool {
        frame.is_well_formed()
            && frame.width() == self.params.frame_width
            && frame.height() == self.params.frame_height
    }

    /// Snapshot the frame as the new background and reset the gain loop.
    ///
    /// Returns `false` (and changes nothing) when the frame is empty or does
    /// not match the configured resolution.
    pub fn calibrate(&mut self, frame: &Frame) -> bool {
        if !self.accepts(frame) {
            if !frame.is_empty() {
                log::warn!(
                    "Ignoring calibration frame: expected {}x{}, got {}x{} ({} bytes)",
                    self.params.frame_width,
                    self.params.frame_height,
                    frame.width(),
                    frame.height(),
                    frame.pixels().len()
                );
            }
            return false;
        }

        for (idx, bg) in self.background.luma.iter_mut().enumerate() {
            *bg = frame.luma_at(idx);
        }
        self.background.ready = true;
        self.gain.reset();

        log::info!("Calibrated background");
        true
    }

    /// Measure motion in `frame` against the background.
    ///
    /// Every sampled background pixel drifts toward the current frame,
    /// whether or not it is classified as active, so slow lighting changes
    /// are absorbed even while something moves.
    pub fn detect(&mut self, frame: &Frame, sensitivity: f32) -> MotionSample {
        let width = self.params.frame_width;
        let height = self.params.frame_height;

        if !self.background.ready || !self.accepts(frame) {
            return MotionSample::neutral(width, height);
        }

        let threshold = self.params.threshold_for(sensitivity);
        let noise_floor = self.params.noise_floor;
        let ema = self.params.background_ema;
        let step = self.params.sample_step;

        let mut active = 0usize;
        let mut samples = 0usize;
        let mut sum_x = 0.0f64;
        let mut sum_y = 0.0f64;

        for y in (0..height).step_by(step) {
            for x in (0..width).step_by(step) {
                let idx = y * width + x;
                let l = frame.luma_at(idx);

                let bg = self.background.luma[idx];
                let diff = (l - bg).abs();
                self.background.luma[idx] = bg + (l - bg) * ema;

                samples += 1;

                if diff > threshold && diff > noise_floor {
                    active += 1;
                    sum_x += x as f64;
                    sum_y += y as f64;
                }
            }
        }

        let active_percent = if samples > 0 {
            active as f32 / samples as f32
        } else {
            0.0
        };

        let gain = self.gain.update(active_percent);
        let energy = ((active_percent * gain - self.params.energy_floor)
            / self.params.energy_span)
            .clamp(0.0, 1.0);

        let centroid = if active > self.params.min_active_for_centroid {
            Vec2::new(
                (sum_x / active as f64) as f32,
                (sum_y / active as f64) as f32,
            )
        } else {
            self.frame_center()
        };

        MotionSample {
            energy,
            centroid,
            active_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const GRAY: [u8; 4] = [100, 100, 100, 255];
    const BRIGHT: [u8; 4] = [180, 180, 180, 255];

    fn small_params() -> DetectorParams {
        DetectorParams {
            frame_width: 160,
            frame_height: 120,
            ..Default::default()
        }
    }

    #[test]
    fn test_uncalibrated_detector_is_neutral() {
        let mut detector = MotionDetector::new(DetectorParams::default());
        let mut frame = Frame::filled(640, 480, GRAY);
        frame.fill_rect(0, 0, 200, 200, BRIGHT);

        let sample = detector.detect(&frame, 45.0);
        assert_eq!(sample.energy, 0.0);
        assert_eq!(sample.active_percent, 0.0);
        assert_eq!(sample.centroid, Vec2::new(320.0, 240.0));
        assert!(!detector.is_ready());
    }

    #[test]
    fn test_empty_frames_are_tolerated() {
        let mut detector = MotionDetector::new(small_params());

        assert!(!detector.calibrate(&Frame::empty(160, 120)));
        assert!(!detector.is_ready());

        assert!(detector.calibrate(&Frame::filled(160, 120, GRAY)));
        let sample = detector.detect(&Frame::empty(160, 120), 45.0);
        assert_eq!(sample, MotionSample::neutral(160, 120));
    }

    #[test]
    fn test_mismatched_frame_is_neutral() {
        let mut detector = MotionDetector::new(small_params());
        detector.calibrate(&Frame::filled(160, 120, GRAY));

        let sample = detector.detect(&Frame::filled(80, 60, BRIGHT), 45.0);
        assert_eq!(sample, MotionSample::neutral(160, 120));

        let truncated = Frame::new(160, 120, vec![255; 100]);
        assert_eq!(
            detector.detect(&truncated, 45.0),
            MotionSample::neutral(160, 120)
        );
    }

    #[test]
    fn test_calibration_resets_gain() {
        let mut detector = MotionDetector::new(small_params());
        let frame = Frame::filled(160, 120, GRAY);
        detector.calibrate(&frame);

        for _ in 0..20 {
            detector.detect(&frame, 45.0);
        }
        assert!(detector.gain() > 1.0);

        detector.calibrate(&frame);
        assert_eq!(detector.gain(), 1.0);
        assert!(detector.background().luma().iter().all(|&l| (l - 100.0).abs() < 1e-3));
    }

    #[test]
    fn test_block_scenario_small_frame() {
        let mut detector = MotionDetector::new(small_params());
        detector.calibrate(&Frame::filled(160, 120, GRAY));

        let mut frame = Frame::filled(160, 120, GRAY);
        frame.fill_rect(60, 40, 50, 50, BRIGHT);

        let sample = detector.detect(&frame, 45.0);
        let block_center = Vec2::new(85.0, 65.0);

        assert!(sample.active_percent > 0.0);
        assert!(sample.energy > 0.0);
        assert!(sample.centroid.distance(block_center) <= 6.0);
    }

    #[test]
    fn test_block_scenario_full_resolution() {
        let mut detector = MotionDetector::new(DetectorParams::default());
        detector.calibrate(&Frame::filled(640, 480, GRAY));

        let mut frame = Frame::filled(640, 480, GRAY);
        frame.fill_rect(300, 200, 50, 50, BRIGHT);
        let block_center = Vec2::new(325.0, 225.0);

        let first = detector.detect(&frame, 45.0);
        assert!(first.active_percent > 0.0);
        assert!(first.centroid.distance(block_center) <= 6.0);

        // A 50x50 block covers under 1% of the grid, so energy only appears
        // once the gain loop has lifted the density over the floor
        let mut energy = first.energy;
        for _ in 0..30 {
            let sample = detector.detect(&frame, 45.0);
            assert!(sample.centroid.distance(block_center) <= 6.0);
            energy = energy.max(sample.energy);
        }
        assert!(energy > 0.0);
    }

    #[test]
    fn test_static_scene_converges_to_zero() {
        let mut detector = MotionDetector::new(small_params());
        detector.calibrate(&Frame::filled(160, 120, GRAY));

        let changed = Frame::filled(160, 120, BRIGHT);
        let first = detector.detect(&changed, 45.0);
        assert!(first.active_percent > 0.9);

        let mut settled_at = None;
        for tick in 0..200 {
            let sample = detector.detect(&changed, 45.0);
            if sample.active_percent == 0.0 && sample.energy == 0.0 {
                settled_at = Some(tick);
                break;
            }
        }
        // diff decays as 80 * 0.98^n and drops under the 22.5 threshold near n = 63
        let tick = settled_at.expect("background never absorbed the static scene");
        assert!(tick < 100);
    }

    #[test]
    fn test_centroid_is_mean_of_active_samples() {
        let params = small_params();
        let mut detector = MotionDetector::new(params.clone());
        detector.calibrate(&Frame::filled(160, 120, GRAY));

        // Nine isolated active samples on grid positions
        let points: Vec<(usize, usize)> = (0..9).map(|i| (6 * (i + 1), 6 * (2 * i % 17))).collect();
        let mut frame = Frame::filled(160, 120, GRAY);
        for &(x, y) in &points {
            frame.fill_rect(x, y, 1, 1, BRIGHT);
        }

        let sample = detector.detect(&frame, 45.0);
        let mean_x = points.iter().map(|p| p.0 as f32).sum::<f32>() / 9.0;
        let mean_y = points.iter().map(|p| p.1 as f32).sum::<f32>() / 9.0;
        assert!((sample.centroid.x - mean_x).abs() < 1e-3);
        assert!((sample.centroid.y - mean_y).abs() < 1e-3);
    }

    #[test]
    fn test_sparse_detections_keep_center() {
        let mut detector = MotionDetector::new(small_params());
        detector.calibrate(&Frame::filled(160, 120, GRAY));

        let mut frame = Frame::filled(160, 120, GRAY);
        for i in 0..8 {
            frame.fill_rect(6 * (i + 1), 12, 1, 1, BRIGHT);
        }

        let sample = detector.detect(&frame, 45.0);
        assert!(sample.active_percent > 0.0);
        assert_eq!(sample.centroid, Vec2::new(80.0, 60.0));
    }

    #[test]
    fn test_higher_sensitivity_value_detects_less() {
        let mut frame = Frame::filled(160, 120, GRAY);
        // diff of 20 sits between the thresholds for 10 (10.0) and 80 (35.0)
        frame.fill_rect(0, 0, 160, 60, [120, 120, 120, 255]);

        let mut keen = MotionDetector::new(small_params());
        keen.calibrate(&Frame::filled(160, 120, GRAY));
        let mut dull = MotionDetector::new(small_params());
        dull.calibrate(&Frame::filled(160, 120, GRAY));

        assert!(keen.detect(&frame, 10.0).active_percent > 0.4);
        assert_eq!(dull.detect(&frame, 80.0).active_percent, 0.0);
    }

    proptest! {
        #[test]
        fn prop_sample_always_valid(
            pixels in prop::collection::vec(any::<u8>(), 32 * 24 * 4),
            sensitivity in -20.0f32..120.0,
        ) {
            let params = DetectorParams {
                frame_width: 32,
                frame_height: 24,
                sample_step: 2,
                ..Default::default()
            };
            let mut detector = MotionDetector::new(params);
            detector.calibrate(&Frame::filled(32, 24, GRAY));

            let frame = Frame::new(32, 24, pixels);
            for _ in 0..3 {
                let sample = detector.detect(&frame, sensitivity);
                prop_assert!((0.0..=1.0).contains(&sample.energy));
                prop_assert!((0.0..=1.0).contains(&sample.active_percent));
                prop_assert!(sample.centroid.x >= 0.0 && sample.centroid.x < 32.0);
                prop_assert!(sample.centroid.y >= 0.0 && sample.centroid.y < 24.0);
                prop_assert!((0.5..=6.0).contains(&detector.gain()));
            }
        }
    }
}
