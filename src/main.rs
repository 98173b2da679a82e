//! motion-sonar - hear what moves
//!
//! Watches a frame source for motion and turns it into sonar ticks and noise
//! swells. Commands are read from stdin while running.

use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::Receiver;

use motion_sonar::audio::{CpalMicrophone, OutputMode};
use motion_sonar::capture::CaptureWriter;
use motion_sonar::cli::{Args, Command};
use motion_sonar::error::Result;
use motion_sonar::motion::{MotionSample, SmoothedMotion};
use motion_sonar::session::{SonarSession, VisualSink};

/// Text stand-in for the overlay: one status line per second
struct Hud {
    ticks_per_report: u64,
    ticks: u64,
}

impl Hud {
    fn new(tick_rate_hz: f32) -> Self {
        Self {
            ticks_per_report: (tick_rate_hz.round() as u64).max(1),
            ticks: 0,
        }
    }
}

impl VisualSink for Hud {
    fn update(&mut self, sample: &MotionSample, motion: &SmoothedMotion) {
        self.ticks += 1;
        if self.ticks % self.ticks_per_report == 0 {
            log::info!(
                "Motion: {:.0}% | ActivePx: {:.2}%",
                motion.energy * 100.0,
                sample.active_percent * 100.0
            );
        }
    }

    fn clear(&mut self) {
        log::info!("Visuals cleared");
    }
}

/// Forward parsed stdin lines to the tick loop
fn spawn_command_reader() -> Receiver<Command> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match Command::parse(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                None => println!("{}", Command::HELP),
            }
        }
    });
    rx
}

/// Apply one command; false means quit
fn apply_command(session: &mut SonarSession, command: Command) -> bool {
    match command {
        Command::Unlock => {
            session.unlock_audio();
        }
        Command::Recalibrate => session.recalibrate(),
        Command::ToggleSound => {
            session.toggle_sound();
        }
        Command::ToggleMicrophone => {
            let state = session.toggle_microphone();
            println!("Microphone: {:?}", state);
        }
        Command::DisableMicrophone => {
            session.disable_microphone();
            println!("Microphone: {:?}", session.microphone_state());
        }
        Command::ClearVisuals => session.clear_visuals(),
        Command::SetSensitivity(value) => {
            session.set_sensitivity(value);
            println!("Sensitivity: {}", session.sensitivity());
        }
        Command::Help => println!("{}", Command::HELP),
        Command::Quit => return false,
    }
    true
}

fn run(args: Args) -> Result<()> {
    let config = args.load_config()?;
    let tick_rate_hz = config.session.tick_rate_hz;
    let mut source = args.frame_source(&config)?;

    let mode = args.output_mode();
    let mut session = SonarSession::new(config, mode, Arc::new(CpalMicrophone))?;
    session.set_visuals(Box::new(Hud::new(tick_rate_hz)));

    session.unlock_audio();
    if args.mic {
        session.toggle_microphone();
    }

    let sample_rate = session.graph().sample_rate();
    let mut capture = match (args.recording_config(), sample_rate) {
        (Some(recording), Some(rate)) => Some(CaptureWriter::create(
            recording.audio_path(),
            rate,
            Some(recording.total_samples(rate)),
        )?),
        (Some(_), None) => {
            log::warn!("Audio graph unavailable, nothing to record");
            None
        }
        _ => None,
    };

    let commands = spawn_command_reader();
    println!("{}", Command::HELP);

    let period = Duration::from_secs_f32(session.params().tick_period_s());
    let total_ticks = args.duration.map(|d| (d * tick_rate_hz).ceil() as u64);
    let mut rendered = 0usize;
    let mut drained = Vec::new();
    let mut deadline = Instant::now();

    'ticks: loop {
        if total_ticks.is_some_and(|total| session.ticks() >= total) {
            break;
        }

        while let Ok(command) = commands.try_recv() {
            if !apply_command(&mut session, command) {
                break 'ticks;
            }
        }

        let frame = source.next_frame();
        session.tick(&frame);

        for notice in session.take_notices() {
            println!("! {}", notice);
        }

        if mode == OutputMode::Offline {
            if let Some(rate) = sample_rate {
                let due = (session.ticks() as f64 * rate as f64 / tick_rate_hz as f64) as usize;
                session.graph_mut().render_offline(due - rendered);
                rendered = due;
            }
        }

        if let Some(writer) = &mut capture {
            drained.clear();
            session.graph_mut().drain_capture(&mut drained);
            writer.write(&drained)?;
        }

        if mode == OutputMode::Device {
            deadline += period;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else {
                deadline = now;
            }
        }
    }

    session.disable_microphone();
    if let Some(writer) = capture {
        writer.finalize()?;
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
