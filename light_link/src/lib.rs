//! # light_link
//!
//! Write-only text link to the light controller.  Each command is sent as
//! ASCII followed by a single `\n`; the firmware on the other end reads a
//! line at a time and acts on it.  Nothing is read back; there is no
//! acknowledgement and no retry.
//!
//! ## Wire format
//!
//! | Command | Bytes on the wire |
//! |---|---|
//! | `turn on light` | `turn on light\n` |
//! | `turn off light` | `turn off light\n` |
//! | any transcript | `<transcript>\n` |
//!
//! ## Sinks
//!
//! * [`SerialSink`] — a real serial port opened via `serialport`.
//! * [`ConsoleSink`] — dry run; logs what would have been written.
//! * [`RecordingSink`] — keeps every line in memory.
//!
//! ```rust,no_run
//! use light_link::{CommandSink, LinkConfig, SerialSink};
//!
//! let mut sink = SerialSink::open(&LinkConfig::default()).unwrap();
//! sink.send_line("turn on light").unwrap();
//! ```

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

// ════════════════════════════════════════════════════════════════════════════
// Defaults
// ════════════════════════════════════════════════════════════════════════════

/// Serial port used when none is configured.
#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM15";
#[cfg(not(windows))]
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

pub const DEFAULT_BAUD: u32 = 9600;

/// Time the microcontroller needs to come out of reset after the port opens.
pub const DEFAULT_BOOT_DELAY: Duration = Duration::from_secs(2);

pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

// ════════════════════════════════════════════════════════════════════════════
// LinkError
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to open serial port {port} at {baud} baud: {source}")]
    Open {
        port:   String,
        baud:   u32,
        #[source]
        source: serialport::Error,
    },

    #[error("failed to write {command:?} to {target}: {source}")]
    Write {
        command: String,
        target:  String,
        #[source]
        source:  io::Error,
    },
}

// ════════════════════════════════════════════════════════════════════════════
// LinkConfig
// ════════════════════════════════════════════════════════════════════════════

/// How to reach the controller.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkConfig {
    pub port:          String,
    pub baud:          u32,
    pub boot_delay:    Duration,
    pub write_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            port:          DEFAULT_PORT.to_string(),
            baud:          DEFAULT_BAUD,
            boot_delay:    DEFAULT_BOOT_DELAY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Framing
// ════════════════════════════════════════════════════════════════════════════

/// Encode a command as the bytes sent on the wire.
pub fn frame_command(command: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(command.len() + 1);
    bytes.extend_from_slice(command.as_bytes());
    bytes.push(b'\n');
    bytes
}

// ════════════════════════════════════════════════════════════════════════════
// CommandSink — anything a command line can be written to
// ════════════════════════════════════════════════════════════════════════════

pub trait CommandSink {
    /// Send one command.  The sink adds the line terminator.
    fn send_line(&mut self, command: &str) -> Result<(), LinkError>;

    /// Human-readable name for status lines ("/dev/ttyUSB0", "console", …).
    fn describe(&self) -> String;
}

impl<S: CommandSink + ?Sized> CommandSink for Box<S> {
    fn send_line(&mut self, command: &str) -> Result<(), LinkError> {
        (**self).send_line(command)
    }
    fn describe(&self) -> String {
        (**self).describe()
    }
}

// ── any io::Write ──────────────────────────────────────────────────────────

/// Writes framed commands to an arbitrary byte stream and flushes after each.
pub struct LineSink<W: Write> {
    writer: W,
    target: String,
}

impl<W: Write> LineSink<W> {
    pub fn new(writer: W, target: impl Into<String>) -> Self {
        LineSink { writer, target: target.into() }
    }

    pub fn into_inner(self) -> W { self.writer }
}

impl<W: Write> CommandSink for LineSink<W> {
    fn send_line(&mut self, command: &str) -> Result<(), LinkError> {
        let bytes = frame_command(command);
        self.writer
            .write_all(&bytes)
            .and_then(|_| self.writer.flush())
            .map_err(|source| LinkError::Write {
                command: command.to_string(),
                target:  self.target.clone(),
                source,
            })?;
        debug!(to = %self.target, bytes = bytes.len(), "wrote command");
        Ok(())
    }

    fn describe(&self) -> String { self.target.clone() }
}

// ── serial port ────────────────────────────────────────────────────────────

pub type SerialSink = LineSink<Box<dyn serialport::SerialPort>>;

impl SerialSink {
    /// Open the port, then wait `boot_delay` so the board is listening
    /// before the first command goes out.
    pub fn open(cfg: &LinkConfig) -> Result<Self, LinkError> {
        let port = serialport::new(cfg.port.as_str(), cfg.baud)
            .timeout(cfg.write_timeout)
            .open()
            .map_err(|source| LinkError::Open {
                port: cfg.port.clone(),
                baud: cfg.baud,
                source,
            })?;

        if !cfg.boot_delay.is_zero() {
            debug!(delay_ms = cfg.boot_delay.as_millis() as u64, "waiting for controller reset");
            thread::sleep(cfg.boot_delay);
        }
        info!(port = %cfg.port, baud = cfg.baud, "connected to light controller");
        Ok(LineSink::new(port, cfg.port.clone()))
    }
}

// ── console (dry run) ──────────────────────────────────────────────────────

/// Sink used when no hardware is attached.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl CommandSink for ConsoleSink {
    fn send_line(&mut self, command: &str) -> Result<(), LinkError> {
        info!(command, "dry run — not sent");
        Ok(())
    }
    fn describe(&self) -> String { "console".to_string() }
}

// ── in-memory ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub lines: Vec<String>,
}

impl RecordingSink {
    pub fn new() -> Self { Self::default() }

    pub fn last(&self) -> Option<&str> { self.lines.last().map(String::as_str) }
}

impl CommandSink for RecordingSink {
    fn send_line(&mut self, command: &str) -> Result<(), LinkError> {
        self.lines.push(command.to_string());
        Ok(())
    }
    fn describe(&self) -> String { "memory".to_string() }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }
        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    #[test]
    fn frame_appends_single_newline() {
        assert_eq!(frame_command("turn on light"), b"turn on light\n".to_vec());
        assert_eq!(frame_command(""), b"\n".to_vec());
    }

    #[test]
    fn line_sink_writes_each_command_terminated() {
        let mut sink = LineSink::new(Vec::new(), "buffer");
        sink.send_line("turn on light").unwrap();
        sink.send_line("turn off light").unwrap();
        assert_eq!(sink.into_inner(), b"turn on light\nturn off light\n".to_vec());
    }

    #[test]
    fn write_failure_is_reported_with_command() {
        let mut sink = LineSink::new(BrokenPipe, "COM15");
        let err = sink.send_line("turn off light").unwrap_err();
        match &err {
            LinkError::Write { command, target, .. } => {
                assert_eq!(command, "turn off light");
                assert_eq!(target, "COM15");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("COM15"));
    }

    #[test]
    fn recording_sink_keeps_order() {
        let mut sink = RecordingSink::new();
        sink.send_line("a").unwrap();
        sink.send_line("b").unwrap();
        assert_eq!(sink.lines, vec!["a", "b"]);
        assert_eq!(sink.last(), Some("b"));
    }

    #[test]
    fn boxed_sink_delegates() {
        let mut sink: Box<dyn CommandSink> = Box::new(ConsoleSink);
        assert!(sink.send_line("turn on light").is_ok());
        assert_eq!(sink.describe(), "console");
    }

    #[test]
    fn default_link_is_9600_baud() {
        let cfg = LinkConfig::default();
        assert_eq!(cfg.baud, 9600);
        assert_eq!(cfg.boot_delay, Duration::from_secs(2));
    }
}
