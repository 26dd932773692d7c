//! Hand landmarks and the providers that produce them.
//!
//! The hand model itself lives outside this crate.  A [`LandmarkProvider`]
//! hands the run loop whatever hands were detected in the latest frame;
//! consumers don't need to know whether they came from a camera helper
//! process or the keyboard simulator.

use std::io::{self, BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc::{Receiver, TryRecvError};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Landmark indices, MediaPipe hand model convention.
pub mod index {
    pub const WRIST:             usize = 0;
    pub const THUMB_CMC:         usize = 1;
    pub const THUMB_MCP:         usize = 2;
    pub const THUMB_IP:          usize = 3;
    pub const THUMB_TIP:         usize = 4;
    pub const INDEX_FINGER_MCP:  usize = 5;
    pub const INDEX_FINGER_PIP:  usize = 6;
    pub const INDEX_FINGER_DIP:  usize = 7;
    pub const INDEX_FINGER_TIP:  usize = 8;
    pub const MIDDLE_FINGER_MCP: usize = 9;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_MCP:   usize = 13;
    pub const RING_FINGER_TIP:   usize = 16;
    pub const PINKY_MCP:         usize = 17;
    pub const PINKY_TIP:         usize = 20;
}

pub const LANDMARK_COUNT: usize = 21;

/// Bone segments between landmarks, for drawing.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1), (1, 2), (2, 3), (3, 4),
    (0, 5), (5, 6), (6, 7), (7, 8),
    (5, 9), (9, 10), (10, 11), (11, 12),
    (9, 13), (13, 14), (14, 15), (15, 16),
    (13, 17), (17, 18), (18, 19), (19, 20),
    (0, 17),
];

// ════════════════════════════════════════════════════════════════════════════
// Landmark / HandLandmarks
// ════════════════════════════════════════════════════════════════════════════

/// One point, normalised to the image (0.0–1.0, y grows downward).
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32) -> Self { Landmark { x, y, z: 0.0 } }
}

/// All 21 landmarks of one detected hand.
#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks {
    pub points:     [Landmark; LANDMARK_COUNT],
    pub handedness: Option<String>,
    pub score:      f32,
}

impl HandLandmarks {
    /// Build from a list of points; `None` unless there are exactly 21.
    pub fn from_points(points: &[Landmark]) -> Option<Self> {
        let points: [Landmark; LANDMARK_COUNT] = points.try_into().ok()?;
        Some(HandLandmarks { points, handedness: None, score: 1.0 })
    }

    pub fn thumb_tip(&self) -> Landmark { self.points[index::THUMB_TIP] }
    pub fn index_tip(&self) -> Landmark { self.points[index::INDEX_FINGER_TIP] }

    /// A spread hand with the thumb raised above the index fingertip.
    pub fn open_palm(wrist_x: f32) -> Self {
        Self::from_offsets(wrist_x, &OPEN_PALM_OFFSETS)
    }

    /// A fist with the thumb tucked below the curled index fingertip.
    pub fn closed_palm(wrist_x: f32) -> Self {
        Self::from_offsets(wrist_x, &CLOSED_PALM_OFFSETS)
    }

    fn from_offsets(wrist_x: f32, offsets: &[(f32, f32); LANDMARK_COUNT]) -> Self {
        const WRIST_Y: f32 = 0.8;
        let mut points = [Landmark::default(); LANDMARK_COUNT];
        for (p, &(dx, dy)) in points.iter_mut().zip(offsets) {
            *p = Landmark::new(wrist_x + dx, WRIST_Y + dy);
        }
        HandLandmarks { points, handedness: Some("Sim".to_string()), score: 1.0 }
    }
}

// Offsets from the wrist: wrist, thumb ×4, index ×4, middle ×4, ring ×4, pinky ×4.
const OPEN_PALM_OFFSETS: [(f32, f32); LANDMARK_COUNT] = [
    (0.0, 0.0),
    (-0.06, -0.08), (-0.11, -0.18), (-0.15, -0.30), (-0.18, -0.44),
    (-0.04, -0.20), (-0.05, -0.26), (-0.055, -0.32), (-0.06, -0.38),
    (0.0, -0.21),   (0.0, -0.29),   (0.0, -0.35),    (0.0, -0.40),
    (0.04, -0.20),  (0.05, -0.27),  (0.055, -0.32),  (0.06, -0.36),
    (0.08, -0.17),  (0.09, -0.22),  (0.10, -0.26),   (0.11, -0.29),
];

const CLOSED_PALM_OFFSETS: [(f32, f32); LANDMARK_COUNT] = [
    (0.0, 0.0),
    (-0.06, -0.07), (-0.09, -0.12), (-0.06, -0.15), (-0.02, -0.14),
    (-0.04, -0.20), (-0.05, -0.25), (-0.045, -0.20), (-0.04, -0.17),
    (0.0, -0.21),   (0.0, -0.26),   (0.0, -0.21),    (0.0, -0.18),
    (0.04, -0.20),  (0.045, -0.24), (0.045, -0.20),  (0.04, -0.17),
    (0.08, -0.17),  (0.085, -0.21), (0.085, -0.18),  (0.08, -0.16),
];

// ════════════════════════════════════════════════════════════════════════════
// FrameError
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("camera {index} could not be opened: {reason}")]
    CameraOpen { index: u32, reason: String },

    #[error("failed to read frame: {0}")]
    Read(#[from] io::Error),

    #[error("unreadable landmark line: {0}")]
    Protocol(String),

    #[error("landmark helper reported: {0}")]
    Helper(String),

    #[error("landmark stream closed")]
    Closed,
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkProvider
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can produce the hands seen in the next frame.
///
/// An `Err` means no frame could be read; the run loop treats that as fatal.
pub trait LandmarkProvider {
    fn next_frame(&mut self) -> Result<Vec<HandLandmarks>, FrameError>;

    fn describe(&self) -> String;
}

// ════════════════════════════════════════════════════════════════════════════
// JSON line protocol
// ════════════════════════════════════════════════════════════════════════════

#[derive(Deserialize, Debug)]
struct HandJson {
    #[serde(default)]
    handedness: Option<String>,
    #[serde(default = "full_score")]
    score: f32,
    landmarks: Vec<Landmark>,
}

fn full_score() -> f32 { 1.0 }

#[derive(Deserialize, Debug)]
struct FrameJson {
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

/// Parse one frame line from a landmark helper.
///
/// Hands below `min_confidence`, without exactly 21 landmarks, or with a
/// non-finite coordinate are dropped.  An `error` field fails the whole frame.
pub fn parse_frame_line(line: &str, min_confidence: f32) -> Result<Vec<HandLandmarks>, FrameError> {
    let frame: FrameJson = serde_json::from_str(line.trim())
        .map_err(|e| FrameError::Protocol(format!("{e}: {}", line.trim())))?;

    if let Some(error) = frame.error {
        return Err(FrameError::Helper(error));
    }

    let mut hands = Vec::with_capacity(frame.hands.len());
    for hand in frame.hands {
        if hand.score < min_confidence {
            debug!(score = hand.score, "hand below confidence threshold");
            continue;
        }
        let Some(mut parsed) = HandLandmarks::from_points(&hand.landmarks) else {
            warn!("expected {} landmarks, got {}", LANDMARK_COUNT, hand.landmarks.len());
            continue;
        };
        if !parsed.points.iter().all(|p| p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            warn!("hand with non-finite landmark coordinates");
            continue;
        }
        parsed.handedness = hand.handedness;
        parsed.score      = hand.score;
        hands.push(parsed);
    }
    Ok(hands)
}

/// Reads one JSON frame per line from any buffered reader.
pub struct LineLandmarks<R: BufRead> {
    reader:         R,
    min_confidence: f32,
    line:           String,
}

impl<R: BufRead> LineLandmarks<R> {
    pub fn new(reader: R, min_confidence: f32) -> Self {
        LineLandmarks { reader, min_confidence, line: String::new() }
    }
}

impl<R: BufRead> LandmarkProvider for LineLandmarks<R> {
    fn next_frame(&mut self) -> Result<Vec<HandLandmarks>, FrameError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Err(FrameError::Closed);
            }
            if !self.line.trim().is_empty() {
                return parse_frame_line(&self.line, self.min_confidence);
            }
        }
    }

    fn describe(&self) -> String { "landmark stream".to_string() }
}

// ════════════════════════════════════════════════════════════════════════════
// ProcessLandmarks — camera + hand model in a helper process
// ════════════════════════════════════════════════════════════════════════════

/// Runs an external helper that owns the camera and the hand model.
///
/// The helper is started as `<command…> --camera <index>`, must print
/// `READY` once the camera is open, and then one JSON frame per line.
pub struct ProcessLandmarks {
    child:  Child,
    frames: LineLandmarks<BufReader<ChildStdout>>,
    label:  String,
}

impl ProcessLandmarks {
    pub fn spawn(command: &[String], camera_index: u32, min_confidence: f32) -> Result<Self, FrameError> {
        let camera_open = |reason: String| FrameError::CameraOpen { index: camera_index, reason };

        let (program, args) = command
            .split_first()
            .ok_or_else(|| camera_open("no landmark command configured".to_string()))?;

        info!(program = %program, camera = camera_index, "starting landmark helper");
        let mut child = Command::new(program)
            .args(args)
            .arg("--camera")
            .arg(camera_index.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| camera_open(format!("failed to start {program}: {e}")))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            return Err(camera_open("helper stdout unavailable".to_string()));
        };
        let mut reader = BufReader::new(stdout);

        let mut ready = String::new();
        let read = reader.read_line(&mut ready);
        if !matches!(read, Ok(n) if n > 0) || ready.trim() != "READY" {
            let _ = child.kill();
            let _ = child.wait();
            let got = match read {
                Err(e) => e.to_string(),
                Ok(0)  => "helper exited before signalling READY".to_string(),
                Ok(_)  => format!("expected READY, got {:?}", ready.trim()),
            };
            return Err(camera_open(got));
        }
        info!("landmark helper ready");

        Ok(ProcessLandmarks {
            child,
            frames: LineLandmarks::new(reader, min_confidence),
            label:  format!("{program} (camera {camera_index})"),
        })
    }
}

impl LandmarkProvider for ProcessLandmarks {
    fn next_frame(&mut self) -> Result<Vec<HandLandmarks>, FrameError> {
        self.frames.next_frame()
    }

    fn describe(&self) -> String { self.label.clone() }
}

impl Drop for ProcessLandmarks {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SimLandmarks — keyboard simulation
// ════════════════════════════════════════════════════════════════════════════

/// Pose selected from the control window in simulation mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SimPose {
    #[default]
    NoHands,
    Open,
    Closed,
    /// Left hand open, right hand closed.
    Both,
}

/// Provider driven by [`SimPose`] events sent from the control window.
///
/// The last pose received is held until another one arrives.
pub struct SimLandmarks {
    rx:   Receiver<SimPose>,
    pose: SimPose,
}

impl SimLandmarks {
    pub fn new(rx: Receiver<SimPose>) -> Self {
        SimLandmarks { rx, pose: SimPose::NoHands }
    }

    pub fn pose(&self) -> SimPose { self.pose }
}

impl LandmarkProvider for SimLandmarks {
    fn next_frame(&mut self) -> Result<Vec<HandLandmarks>, FrameError> {
        loop {
            match self.rx.try_recv() {
                Ok(pose) => self.pose = pose,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        Ok(match self.pose {
            SimPose::NoHands => Vec::new(),
            SimPose::Open    => vec![HandLandmarks::open_palm(0.5)],
            SimPose::Closed  => vec![HandLandmarks::closed_palm(0.5)],
            SimPose::Both    => vec![
                HandLandmarks::open_palm(0.3),
                HandLandmarks::closed_palm(0.7),
            ],
        })
    }

    fn describe(&self) -> String { "keyboard simulation".to_string() }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
