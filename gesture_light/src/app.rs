//! Top-level session and the main loop.
//!
//! `Session` owns the dispatcher, the landmark provider and the transcriber.
//! Each frame it reads the latest hands, runs a gesture tick, and then acts
//! on whatever key the control window reported.

use std::sync::mpsc::{self, Sender};
use std::time::Instant;

use anyhow::{Context, Result};
use light_link::{CommandSink, ConsoleSink, LinkError, SerialSink};
use tracing::{error, info};

use crate::config::Config;
use crate::dispatcher::{DispatchPolicy, Dispatcher, VoiceOutcome};
use crate::landmark::{HandLandmarks, LandmarkProvider, ProcessLandmarks, SimLandmarks, SimPose};
use crate::visualizer::{ControlInput, Overlay, Visualizer};
use crate::voice::{CommandTranscriber, ListenConfig, PromptTranscriber, Transcriber};

/// Whether the loop keeps going after a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

// ════════════════════════════════════════════════════════════════════════════
// Session
// ════════════════════════════════════════════════════════════════════════════

pub struct Session<S: CommandSink> {
    dispatcher:  Dispatcher<S>,
    landmarks:   Box<dyn LandmarkProvider>,
    transcriber: Box<dyn Transcriber>,
    listen:      ListenConfig,
    /// Hands seen in the most recent frame.
    hands:       Vec<HandLandmarks>,
}

impl<S: CommandSink> Session<S> {
    pub fn new(
        sink:        S,
        landmarks:   Box<dyn LandmarkProvider>,
        transcriber: Box<dyn Transcriber>,
        policy:      DispatchPolicy,
        listen:      ListenConfig,
        now:         Instant,
    ) -> Self {
        Session {
            dispatcher: Dispatcher::new(sink, policy, now),
            landmarks,
            transcriber,
            listen,
            hands: Vec::new(),
        }
    }

    // ── per-frame ─────────────────────────────────────────────────────────

    /// Read a frame and run a gesture tick.
    ///
    /// A frame that can't be read ends the loop; a failed write to the link
    /// is returned as an error.
    pub fn tick(&mut self, now: Instant) -> Result<Flow, LinkError> {
        self.hands = match self.landmarks.next_frame() {
            Ok(hands) => hands,
            Err(e) => {
                error!(error = %e, "failed to capture frame");
                return Ok(Flow::Stop);
            }
        };
        self.dispatcher.gesture_tick(&self.hands, now)?;
        Ok(Flow::Continue)
    }

    /// React to the key polled from the control window.
    pub fn handle(&mut self, input: ControlInput) -> Result<Flow, LinkError> {
        match input {
            ControlInput::None  => Ok(Flow::Continue),
            ControlInput::Quit  => Ok(Flow::Stop),
            ControlInput::Voice => {
                self.voice()?;
                Ok(Flow::Continue)
            }
        }
    }

    pub fn voice(&mut self) -> Result<VoiceOutcome, LinkError> {
        self.dispatcher.voice_tick(self.transcriber.as_mut(), &self.listen)
    }

    // ── accessors for the render loop ────────────────────────────────────

    pub fn hands(&self)      -> &[HandLandmarks] { &self.hands }
    pub fn dispatcher(&self) -> &Dispatcher<S>   { &self.dispatcher }

    pub fn overlay(&self, now: Instant, simulating: bool) -> Overlay<'_> {
        Overlay {
            hands:        &self.hands,
            last_command: self.dispatcher.last_command(),
            remaining:    self.dispatcher.remaining(now),
            simulating,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run() — the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the full application.
///
/// Opens the link (or the console sink in dry-run mode), the landmark source
/// (helper process, or keyboard simulation when none is configured), the
/// transcriber and the control window, then loops until `Q`, a closed
/// window, or a frame read failure.  A failed write to the link aborts with
/// an error.
pub fn run(cfg: Config) -> Result<()> {
    // ── Link ──────────────────────────────────────────────────────────────
    let sink: Box<dyn CommandSink> = if cfg.link.dry_run {
        info!("dry run — commands are logged, not sent");
        Box::new(ConsoleSink)
    } else {
        Box::new(SerialSink::open(&cfg.link_config()).context("cannot reach the light controller")?)
    };

    // ── Landmarks ─────────────────────────────────────────────────────────
    let (landmarks, sim_tx): (Box<dyn LandmarkProvider>, Option<Sender<SimPose>>) =
        match &cfg.camera.landmark_command {
            Some(command) => {
                let provider = ProcessLandmarks::spawn(command, cfg.camera.index, cfg.gesture.min_confidence)
                    .context("camera not found")?;
                (Box::new(provider) as Box<dyn LandmarkProvider>, None)
            }
            None => {
                let (tx, rx) = mpsc::channel();
                (Box::new(SimLandmarks::new(rx)) as Box<dyn LandmarkProvider>, Some(tx))
            }
        };
    let simulating = sim_tx.is_some();

    // ── Voice ─────────────────────────────────────────────────────────────
    let transcriber: Box<dyn Transcriber> = match &cfg.voice.command {
        Some(command) => Box::new(CommandTranscriber::new(command.clone())),
        None          => Box::new(PromptTranscriber::stdin()),
    };

    // ── Window ────────────────────────────────────────────────────────────
    let mut vis = Visualizer::new(sim_tx)
        .map_err(anyhow::Error::msg)
        .context("cannot open the control window")?;

    info!(
        landmarks = %landmarks.describe(),
        voice = %transcriber.describe(),
        link = %sink.describe(),
        "gesture recognition ready | V = voice command | Q = quit"
    );

    let mut session = Session::new(
        sink,
        landmarks,
        transcriber,
        cfg.dispatch_policy(),
        cfg.listen_config(),
        Instant::now(),
    );

    // ── Main loop ─────────────────────────────────────────────────────────
    while vis.is_open() {
        let now = Instant::now();
        if session.tick(now)? == Flow::Stop { break; }

        vis.render(&session.overlay(now, simulating));

        if session.handle(vis.poll_input())? == Flow::Stop { break; }
    }

    info!(sent = session.dispatcher().sent_count(), "shutting down");
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
