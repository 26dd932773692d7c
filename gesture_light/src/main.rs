//! gesture_light — interactive entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gesture_light::app::run;
use gesture_light::config::Config;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "gesture_light", version, about = "Gesture and voice light controller")]
struct Cli {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Serial port of the light controller (e.g. COM15, /dev/ttyUSB0)
    #[arg(long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Log commands instead of opening the serial port
    #[arg(long)]
    dry_run: bool,

    /// Minimum milliseconds between gesture commands
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Camera index passed to the landmark helper
    #[arg(long)]
    camera: Option<u32>,

    /// Landmark helper command line; keyboard simulation when omitted
    #[arg(long, num_args = 1.., value_name = "CMD")]
    landmarks: Option<Vec<String>>,

    /// Speech client command line; typed input when omitted
    #[arg(long, num_args = 1.., value_name = "CMD")]
    speech: Option<Vec<String>>,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn apply(self, cfg: &mut Config) {
        if let Some(port) = self.port        { cfg.link.port = port; }
        if let Some(baud) = self.baud        { cfg.link.baud = baud; }
        if self.dry_run                      { cfg.link.dry_run = true; }
        if let Some(ms) = self.interval_ms   { cfg.gesture.interval_ms = ms; }
        if let Some(index) = self.camera     { cfg.camera.index = index; }
        if self.landmarks.is_some()          { cfg.camera.landmark_command = self.landmarks; }
        if self.speech.is_some()             { cfg.voice.command = self.speech; }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "gesture_light=debug,light_link=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║        Gesture Light — hand and voice light controller       ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let mut cfg = match Config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut cfg);
    if let Err(e) = cfg.validate() {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    if cfg.camera.landmark_command.is_some() {
        println!("  Mode: camera {} via landmark helper", cfg.camera.index);
    } else {
        println!("  Mode: keyboard simulation  (use --landmarks <CMD> for a camera)");
    }
    println!();

    if let Err(e) = run(cfg) {
        error!("{e:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
