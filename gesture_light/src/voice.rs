//! Voice capture — microphone + speech-to-text behind the [`Transcriber`] trait.
//!
//! Recognition happens outside this crate.  [`CommandTranscriber`] runs the
//! speech client as a child process; [`PromptTranscriber`] reads a typed
//! phrase instead, for running without a microphone.

use std::io::{self, BufRead, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_LISTEN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_AMBIENT_CALIBRATION: Duration = Duration::from_secs(1);

/// Extra time allowed on top of the listen window for the network round trip.
pub const DEFAULT_SERVICE_GRACE: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Exit code a speech client uses for "heard something, couldn't understand it".
pub const EXIT_UNINTELLIGIBLE: i32 = 1;

// ════════════════════════════════════════════════════════════════════════════
// ListenConfig / TranscribeError
// ════════════════════════════════════════════════════════════════════════════

/// Timing of one capture: calibrate against background noise, then listen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ListenConfig {
    pub ambient_calibration: Duration,
    pub timeout:             Duration,
}

impl Default for ListenConfig {
    fn default() -> Self {
        ListenConfig {
            ambient_calibration: DEFAULT_AMBIENT_CALIBRATION,
            timeout:             DEFAULT_LISTEN_TIMEOUT,
        }
    }
}

impl ListenConfig {
    /// Longest a capture can legitimately take before the service replies.
    pub fn window(&self) -> Duration { self.ambient_calibration + self.timeout }
}

/// Why a capture produced no text.  Both kinds are recoverable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranscribeError {
    #[error("could not understand the command")]
    Unintelligible,

    #[error("speech recognition service error: {0}")]
    ServiceUnavailable(String),
}

// ════════════════════════════════════════════════════════════════════════════
// Transcriber
// ════════════════════════════════════════════════════════════════════════════

pub trait Transcriber {
    /// Capture one utterance and return its text.
    fn transcribe(&mut self, listen: &ListenConfig) -> Result<String, TranscribeError>;

    fn describe(&self) -> String;
}

// ════════════════════════════════════════════════════════════════════════════
// CommandTranscriber — external speech client
// ════════════════════════════════════════════════════════════════════════════

/// Runs `<command…> --timeout-secs <t> --calibrate-ms <c>` and reads the
/// transcript from its stdout.
///
/// | Outcome | Result |
/// |---|---|
/// | exit 0, non-empty stdout | transcript |
/// | exit 0 with empty stdout, or exit 1 | `Unintelligible` |
/// | spawn failure, other exit, or overrun | `ServiceUnavailable` |
pub struct CommandTranscriber {
    command: Vec<String>,
    grace:   Duration,
}

impl CommandTranscriber {
    pub fn new(command: Vec<String>) -> Self {
        CommandTranscriber { command, grace: DEFAULT_SERVICE_GRACE }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    fn interpret(status: ExitStatus, stdout: &str) -> Result<String, TranscribeError> {
        match status.code() {
            Some(0) if stdout.trim().is_empty() => Err(TranscribeError::Unintelligible),
            Some(0)                             => Ok(stdout.trim().to_string()),
            Some(EXIT_UNINTELLIGIBLE)           => Err(TranscribeError::Unintelligible),
            Some(code) => Err(TranscribeError::ServiceUnavailable(
                format!("speech client exited with status {code}"),
            )),
            None => Err(TranscribeError::ServiceUnavailable(
                "speech client terminated by signal".to_string(),
            )),
        }
    }
}

impl Transcriber for CommandTranscriber {
    fn transcribe(&mut self, listen: &ListenConfig) -> Result<String, TranscribeError> {
        let unavailable = |msg: String| TranscribeError::ServiceUnavailable(msg);

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| unavailable("no speech client configured".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .arg("--timeout-secs")
            .arg(listen.timeout.as_secs_f32().to_string())
            .arg("--calibrate-ms")
            .arg(listen.ambient_calibration.as_millis().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| unavailable(format!("failed to start {program}: {e}")))?;

        // Drain stdout while the client runs so a long transcript can't
        // fill the pipe and stall it.
        let reader = child.stdout.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut text = String::new();
                pipe.read_to_string(&mut text).map(|_| text)
            })
        });

        let deadline = Instant::now() + listen.window() + self.grace;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    warn!(program = %program, "speech client overran its window, killing it");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(unavailable("speech client timed out".to_string()));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(unavailable(format!("lost speech client: {e}")));
                }
            }
        };

        let stdout = match reader {
            Some(handle) => handle
                .join()
                .map_err(|_| unavailable("transcript reader panicked".to_string()))?
                .map_err(|e| unavailable(format!("unreadable transcript: {e}")))?,
            None => String::new(),
        };
        debug!(?status, bytes = stdout.len(), "speech client finished");
        Self::interpret(status, &stdout)
    }

    fn describe(&self) -> String {
        self.command.first().cloned().unwrap_or_else(|| "<none>".to_string())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PromptTranscriber — typed phrase
// ════════════════════════════════════════════════════════════════════════════

/// Reads one line of text in place of speech.
///
/// A blank line is treated as unintelligible; a closed input as a
/// service failure.
pub struct PromptTranscriber<R: BufRead> {
    input: R,
}

impl PromptTranscriber<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        PromptTranscriber { input: io::stdin().lock() }
    }
}

impl<R: BufRead> PromptTranscriber<R> {
    pub fn new(input: R) -> Self { PromptTranscriber { input } }
}

impl<R: BufRead> Transcriber for PromptTranscriber<R> {
    fn transcribe(&mut self, _listen: &ListenConfig) -> Result<String, TranscribeError> {
        info!("type a command and press Enter");
        let mut buf = String::new();
        match self.input.read_line(&mut buf) {
            Ok(0)  => Err(TranscribeError::ServiceUnavailable("input closed".to_string())),
            Ok(_) if buf.trim().is_empty() => Err(TranscribeError::Unintelligible),
            Ok(_)  => Ok(buf.trim().to_string()),
            Err(e) => Err(TranscribeError::ServiceUnavailable(e.to_string())),
        }
    }

    fn describe(&self) -> String { "typed phrase".to_string() }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
