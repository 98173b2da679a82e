//! Microphone acquisition and release.
//!
//! Opening an input device may block on a permission prompt, so it runs on a
//! short-lived worker thread that reports exactly one [`AcquireOutcome`].
//! `cpal::Stream` is not `Send`, so the worker also owns the open device and
//! keeps it alive until it is told to stop.

use std::any::Any;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use ringbuf::traits::{Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Mono microphone samples at the graph's sample rate
pub type MicFeed = HeapCons<f32>;

/// Microphone lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicState {
    Disabled,
    Acquiring,
    Enabled,
}

/// Result of one acquisition attempt
pub enum AcquireOutcome {
    Granted(MicFeed),
    Denied(String),
    Cancelled,
}

impl std::fmt::Debug for AcquireOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquireOutcome::Granted(_) => write!(f, "Granted"),
            AcquireOutcome::Denied(reason) => write!(f, "Denied({})", reason),
            AcquireOutcome::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Keeps an open input device alive; dropping it stops the device
pub struct DeviceGuard(#[allow(dead_code)] Box<dyn Any>);

impl DeviceGuard {
    pub fn new<T: 'static>(handle: T) -> Self {
        Self(Box::new(handle))
    }
}

/// Something that can open an input device and stream mono samples into `sink`
pub trait MicrophoneProvider: Send + Sync + 'static {
    fn open(&self, sample_rate: u32, sink: HeapProd<f32>) -> Result<DeviceGuard, String>;
}

/// Zero-order-hold rate conversion from the device rate to the graph rate
#[derive(Debug, Clone)]
struct RateAdapter {
    ratio: f64,
    phase: f64,
}

impl RateAdapter {
    fn new(input_rate: u32, output_rate: u32) -> Self {
        Self {
            ratio: output_rate as f64 / input_rate.max(1) as f64,
            phase: 0.0,
        }
    }

    #[inline]
    fn push(&mut self, sample: f32, mut emit: impl FnMut(f32)) {
        self.phase += self.ratio;
        while self.phase >= 1.0 {
            emit(sample);
            self.phase -= 1.0;
        }
    }
}

/// Default input device through cpal
pub struct CpalMicrophone;

impl MicrophoneProvider for CpalMicrophone {
    fn open(&self, sample_rate: u32, mut sink: HeapProd<f32>) -> Result<DeviceGuard, String> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or("No audio input device found")?;

        let config = device
            .default_input_config()
            .map_err(|e| format!("Failed to get input config: {}", e))?;

        log::info!(
            "Microphone: {} @ {}Hz",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            config.sample_rate().0
        );

        let channels = (config.channels() as usize).max(1);
        let mut adapter = RateAdapter::new(config.sample_rate().0, sample_rate);

        let stream = device
            .build_input_stream(
                &config.into(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for frame in data.chunks(channels) {
                        let mono = frame.iter().sum::<f32>() / channels as f32;
                        // Overruns drop samples; the graph never waits on the mic
                        adapter.push(mono, |s| {
                            let _ = sink.try_push(s);
                        });
                    }
                },
                |err| log::error!("Microphone stream error: {}", err),
                None,
            )
            .map_err(|e| format!("Failed to build input stream: {}", e))?;

        stream
            .play()
            .map_err(|e| format!("Failed to start input stream: {}", e))?;

        Ok(DeviceGuard::new(stream))
    }
}

fn spawn_worker(
    provider: Arc<dyn MicrophoneProvider>,
    sample_rate: u32,
    capacity: usize,
    outcome_tx: Sender<AcquireOutcome>,
    stop_rx: Receiver<()>,
) {
    thread::spawn(move || {
        let (prod, cons) = HeapRb::<f32>::new(capacity.max(1)).split();

        let guard = match provider.open(sample_rate, prod) {
            Ok(guard) => guard,
            Err(reason) => {
                let _ = outcome_tx.send(AcquireOutcome::Denied(reason));
                return;
            }
        };

        // Disabled while the prompt was up
        if !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty)) {
            drop(guard);
            let _ = outcome_tx.send(AcquireOutcome::Cancelled);
            return;
        }

        if outcome_tx.send(AcquireOutcome::Granted(cons)).is_err() {
            return;
        }

        // Hold the device until released (or the owner goes away)
        let _ = stop_rx.recv();
        drop(guard);
    });
}

struct Pending {
    outcome_rx: Receiver<AcquireOutcome>,
    stop_tx: Sender<()>,
}

/// Microphone state machine: `Disabled -> Acquiring -> Enabled`
pub struct Microphone {
    provider: Arc<dyn MicrophoneProvider>,
    buffer_s: f32,
    state: MicState,
    pending: Option<Pending>,
    active: Option<Sender<()>>,
}

impl Microphone {
    pub fn new(provider: Arc<dyn MicrophoneProvider>, buffer_s: f32) -> Self {
        Self {
            provider,
            buffer_s,
            state: MicState::Disabled,
            pending: None,
            active: None,
        }
    }

    pub fn state(&self) -> MicState {
        self.state
    }

    /// Start acquiring. Ignored unless currently disabled.
    pub fn request(&mut self, sample_rate: u32) -> bool {
        if self.state != MicState::Disabled {
            return false;
        }

        let (outcome_tx, outcome_rx) = crossbeam_channel::bounded(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let capacity = (sample_rate as f32 * self.buffer_s) as usize;
        spawn_worker(
            Arc::clone(&self.provider),
            sample_rate,
            capacity,
            outcome_tx,
            stop_rx,
        );

        self.pending = Some(Pending {
            outcome_rx,
            stop_tx,
        });
        self.state = MicState::Acquiring;
        log::info!("Requesting microphone");
        true
    }

    /// Go back to disabled, cancelling a pending request or stopping the
    /// device. Returns true if a feed was live (the caller disconnects it).
    pub fn release(&mut self) -> bool {
        let was_enabled = self.state == MicState::Enabled;

        if let Some(pending) = self.pending.take() {
            let _ = pending.stop_tx.try_send(());
            log::info!("Microphone request cancelled");
        }
        if let Some(stop_tx) = self.active.take() {
            let _ = stop_tx.try_send(());
            log::info!("Microphone released");
        }

        self.state = MicState::Disabled;
        was_enabled
    }

    /// `None` means the worker vanished without reporting
    fn settle(&mut self, outcome: Option<AcquireOutcome>) -> AcquireOutcome {
        let pending = self.pending.take();
        let outcome = outcome
            .unwrap_or_else(|| AcquireOutcome::Denied("Microphone worker exited".to_string()));

        match &outcome {
            AcquireOutcome::Granted(_) => {
                self.active = pending.map(|p| p.stop_tx);
                self.state = MicState::Enabled;
                log::info!("Microphone enabled");
            }
            AcquireOutcome::Denied(reason) => {
                self.state = MicState::Disabled;
                log::warn!("Microphone denied: {}", reason);
            }
            AcquireOutcome::Cancelled => {
                self.state = MicState::Disabled;
            }
        }
        outcome
    }

    /// Non-blocking check on a pending request
    pub fn poll(&mut self) -> Option<AcquireOutcome> {
        let received = match &self.pending {
            Some(pending) => match pending.outcome_rx.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => None,
            },
            None => return None,
        };
        Some(self.settle(received))
    }

    /// Block up to `timeout` for a pending request to settle
    pub fn wait(&mut self, timeout: Duration) -> Option<AcquireOutcome> {
        let received = match &self.pending {
            Some(pending) => match pending.outcome_rx.recv_timeout(timeout) {
                Ok(outcome) => Some(outcome),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => None,
            },
            None => return None,
        };
        Some(self.settle(received))
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ringbuf::traits::Consumer;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    /// Sets its flag when the "device" is closed
    pub(crate) struct ReleaseFlag(pub Arc<AtomicBool>);

    impl Drop for ReleaseFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    pub(crate) struct DeniedProvider;

    impl MicrophoneProvider for DeniedProvider {
        fn open(&self, _: u32, _: HeapProd<f32>) -> Result<DeviceGuard, String> {
            Err("Permission denied".to_string())
        }
    }

    /// Pushes a fixed level into the feed on open
    pub(crate) struct ToneProvider {
        pub level: f32,
        pub released: Arc<AtomicBool>,
    }

    impl MicrophoneProvider for ToneProvider {
        fn open(&self, _: u32, mut sink: HeapProd<f32>) -> Result<DeviceGuard, String> {
            for _ in 0..256 {
                let _ = sink.try_push(self.level);
            }
            Ok(DeviceGuard::new((sink, ReleaseFlag(Arc::clone(&self.released)))))
        }
    }

    /// Blocks in open until the gate fires, like a permission prompt
    pub(crate) struct GatedProvider {
        pub gate: Receiver<()>,
        pub released: Arc<AtomicBool>,
    }

    impl MicrophoneProvider for GatedProvider {
        fn open(&self, _: u32, _: HeapProd<f32>) -> Result<DeviceGuard, String> {
            let _ = self.gate.recv();
            Ok(DeviceGuard::new(ReleaseFlag(Arc::clone(&self.released))))
        }
    }

    fn wait_for(flag: &AtomicBool) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(2) {
            if flag.load(Ordering::SeqCst) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_rate_adapter_counts() {
        let mut up = RateAdapter::new(24_000, 48_000);
        let mut n = 0;
        for _ in 0..1000 {
            up.push(0.0, |_| n += 1);
        }
        assert_eq!(n, 2000);

        let mut same = RateAdapter::new(48_000, 48_000);
        let mut m = 0;
        for _ in 0..1000 {
            same.push(0.0, |_| m += 1);
        }
        assert_eq!(m, 1000);
    }

    #[test]
    fn test_denied_returns_to_disabled() {
        let mut mic = Microphone::new(Arc::new(DeniedProvider), 0.5);
        assert!(mic.request(48_000));
        assert_eq!(mic.state(), MicState::Acquiring);

        let outcome = mic.wait(Duration::from_secs(2));
        assert!(matches!(outcome, Some(AcquireOutcome::Denied(_))));
        assert_eq!(mic.state(), MicState::Disabled);
    }

    #[test]
    fn test_granted_then_released() {
        let released = Arc::new(AtomicBool::new(false));
        let provider = ToneProvider {
            level: 0.3,
            released: Arc::clone(&released),
        };
        let mut mic = Microphone::new(Arc::new(provider), 0.5);
        mic.request(48_000);

        let mut feed = match mic.wait(Duration::from_secs(2)) {
            Some(AcquireOutcome::Granted(feed)) => feed,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(mic.state(), MicState::Enabled);
        assert_eq!(feed.try_pop(), Some(0.3));

        // Repeated request while enabled is ignored
        assert!(!mic.request(48_000));

        assert!(mic.release());
        assert_eq!(mic.state(), MicState::Disabled);
        assert!(wait_for(&released));
    }

    #[test]
    fn test_release_while_acquiring_cancels() {
        let (gate_tx, gate_rx) = crossbeam_channel::bounded(1);
        let released = Arc::new(AtomicBool::new(false));
        let provider = GatedProvider {
            gate: gate_rx,
            released: Arc::clone(&released),
        };
        let mut mic = Microphone::new(Arc::new(provider), 0.5);
        mic.request(48_000);

        // Still waiting on the prompt
        assert!(mic.poll().is_none());
        assert!(!mic.request(48_000));

        assert!(!mic.release());
        assert_eq!(mic.state(), MicState::Disabled);

        // Prompt resolves after the user gave up: device is opened then closed
        gate_tx.send(()).unwrap();
        assert!(wait_for(&released));
        assert!(mic.poll().is_none());
        assert_eq!(mic.state(), MicState::Disabled);
    }
}
