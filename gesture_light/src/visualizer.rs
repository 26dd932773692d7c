//! Software-rendered control window using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                                              │
//! │   hand skeletons, green = open, red = closed │
//! │                                              │
//! ├──────────────────────────────────────────────┤
//! │  status: last command / gate countdown       │
//! │  key legend                                  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The window is also the keyboard: `V` asks for a voice command, `Q` quits,
//! and in simulation mode `O`/`C`/`B`/`N` pick the simulated pose.

use std::sync::mpsc::Sender;
use std::time::Duration;

use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::gesture::Gesture;
use crate::landmark::{HandLandmarks, SimPose, HAND_CONNECTIONS};

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:     usize = 640;
pub const WIN_H:     usize = 540;
const PREVIEW_H:     usize = 480;
const STATUS_Y:      usize = PREVIEW_H;
const BG_COLOR:      u32   = 0xFF1A1A2E;
const TEXT_BG:       u32   = 0xFF0F3460;
const OPEN_COLOR:    u32   = 0xFF3DDC84;
const CLOSED_COLOR:  u32   = 0xFFFF5555;
const JOINT_COLOR:   u32   = 0xFFFFFFFF;
const TEXT_COLOR:    u32   = 0xFFEEEEEE;
const LEGEND_COLOR:  u32   = 0xFF888888;

// ════════════════════════════════════════════════════════════════════════════
// ControlInput
// ════════════════════════════════════════════════════════════════════════════

/// What the user asked for this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlInput {
    None,
    Voice,
    Quit,
}

/// Snapshot of the loop state shown in the status bar.
pub struct Overlay<'a> {
    pub hands:        &'a [HandLandmarks],
    pub last_command: Option<&'a str>,
    pub remaining:    Duration,
    pub simulating:   bool,
}

// ════════════════════════════════════════════════════════════════════════════
// Canvas — pixel buffer and drawing primitives
// ════════════════════════════════════════════════════════════════════════════

pub struct Canvas {
    pub buf: Vec<u32>,
}

impl Default for Canvas {
    fn default() -> Self { Canvas { buf: vec![BG_COLOR; WIN_W * WIN_H] } }
}

impl Canvas {
    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < WIN_W && y < WIN_H).then(|| self.buf[y * WIN_W + x])
    }

    /// Draw one frame into the buffer.
    pub fn paint(&mut self, overlay: &Overlay<'_>) {
        self.buf.fill(BG_COLOR);

        for hand in overlay.hands {
            self.draw_hand(hand);
        }

        // ── Status bar ────────────────────────────────────────────────────
        self.fill_rect(0, STATUS_Y, WIN_W, WIN_H - STATUS_Y, TEXT_BG);
        self.draw_label(&status_text(overlay), 10, STATUS_Y + 12, TEXT_COLOR);
        self.draw_label(legend(overlay.simulating), 10, WIN_H - 16, LEGEND_COLOR);
    }

    fn draw_hand(&mut self, hand: &HandLandmarks) {
        let color = match Gesture::classify(hand) {
            Gesture::Open   => OPEN_COLOR,
            Gesture::Closed => CLOSED_COLOR,
        };
        for &(a, b) in HAND_CONNECTIONS.iter() {
            let (x0, y0) = to_preview(hand.points[a].x, hand.points[a].y);
            let (x1, y1) = to_preview(hand.points[b].x, hand.points[b].y);
            self.draw_line(x0, y0, x1, y1, color);
        }
        for p in hand.points.iter() {
            let (x, y) = to_preview(p.x, p.y);
            for dy in -2..=2 {
                for dx in -2..=2 {
                    self.set_pixel(x + dx, y + dy, JOINT_COLOR);
                }
            }
        }
    }

    // ── Primitive drawing helpers ─────────────────────────────────────────

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y+h).min(WIN_H) {
            for col in x..(x+w).min(WIN_W) {
                self.buf[row * WIN_W + col] = color;
            }
        }
    }

    fn set_pixel(&mut self, x: isize, y: isize, color: u32) {
        if x >= 0 && y >= 0 && (x as usize) < WIN_W && (y as usize) < PREVIEW_H {
            self.buf[y as usize * WIN_W + x as usize] = color;
        }
    }

    /// Bresenham line, clipped to the preview area.
    fn draw_line(&mut self, x0: isize, y0: isize, x1: isize, y1: isize, color: u32) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let (mut x, mut y, mut err) = (x0, y0, dx + dy);
        loop {
            self.set_pixel(x, y, color);
            if x == x1 && y == y1 { break; }
            let e2 = 2 * err;
            if e2 >= dy { err += dy; x += sx; }
            if e2 <= dx { err += dx; y += sy; }
        }
    }

    /// Minimal bitmap font — 3×5 characters.
    fn draw_label(&mut self, text: &str, x: usize, y: usize, color: u32) {
        let mut cx = x;
        for ch in text.chars() {
            let glyph = char_glyph(ch);
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) != 0 && cx + col < WIN_W && y + row < WIN_H {
                        self.buf[(y + row) * WIN_W + cx + col] = color;
                    }
                }
            }
            cx += 4;
            if cx + 4 > WIN_W { break; }
        }
    }
}

/// Normalised landmark coordinates → preview pixels.
///
/// Points off the preview are kept (lines still run toward them) but held
/// within one window size of its edges, which bounds the line walk.
fn to_preview(x: f32, y: f32) -> (isize, isize) {
    (to_axis(x, WIN_W), to_axis(y, PREVIEW_H))
}

fn to_axis(v: f32, extent: usize) -> isize {
    let span = extent as f32;
    let px = v * span;
    if px.is_nan() { 0 } else { px.clamp(-span, 2.0 * span) as isize }
}

pub fn status_text(overlay: &Overlay<'_>) -> String {
    let last = overlay.last_command.unwrap_or("none");
    let gate = if overlay.remaining.is_zero() {
        "ready".to_string()
    } else {
        format!("{:.1}s", overlay.remaining.as_secs_f32())
    };
    format!("hands: {}  last: {}  next gesture: {}", overlay.hands.len(), last, gate)
}

pub fn legend(simulating: bool) -> &'static str {
    if simulating {
        "V=voice  Q=quit  O=open  C=closed  B=both  N=none"
    } else {
        "V=voice  Q=quit"
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer — window + canvas
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window: Window,
    canvas: Canvas,
    /// Present only in simulation mode.
    sim_tx: Option<Sender<SimPose>>,
}

impl Visualizer {
    pub fn new(sim_tx: Option<Sender<SimPose>>) -> Result<Self, String> {
        let mut window = Window::new(
            "Hand Gesture Recognition",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        ).map_err(|e| e.to_string())?;

        window.set_target_fps(60);

        Ok(Visualizer {
            window,
            canvas: Canvas::default(),
            sim_tx,
        })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Poll the keyboard.  Pose keys are forwarded to the simulator.
    pub fn poll_input(&mut self) -> ControlInput {
        if !self.window.is_open() { return ControlInput::Quit; }

        let pressed = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);

        if pressed(Key::Q) { return ControlInput::Quit; }

        if let Some(tx) = &self.sim_tx {
            let pose = [
                (Key::O, SimPose::Open),
                (Key::C, SimPose::Closed),
                (Key::B, SimPose::Both),
                (Key::N, SimPose::NoHands),
            ]
            .into_iter()
            .find(|&(k, _)| pressed(k));
            if let Some((_, pose)) = pose {
                let _ = tx.send(pose);
            }
        }

        if pressed(Key::V) { ControlInput::Voice } else { ControlInput::None }
    }

    /// Render one frame.
    pub fn render(&mut self, overlay: &Overlay<'_>) {
        self.canvas.paint(overlay);
        self.window.update_with_buffer(&self.canvas.buf, WIN_W, WIN_H).ok();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

fn char_glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' | 'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'b' | 'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' | 'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'd' | 'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' | 'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' | 'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' | 'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'h' | 'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' | 'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' | 'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'k' | 'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' | 'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' | 'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'n' | 'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'o' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'p' | 'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'q' | 'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'r' | 'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        't' | 'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' | 'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' | 'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'w' | 'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'x' | 'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' | 'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'z' | 'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _   => [0b000, 0b000, 0b010, 0b000, 0b000], // fallback dot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::index;

    fn overlay<'a>(hands: &'a [HandLandmarks], last: Option<&'a str>, remaining: Duration) -> Overlay<'a> {
        Overlay { hands, last_command: last, remaining, simulating: true }
    }

    #[test]
    fn status_shows_countdown_then_ready() {
        let hands = [HandLandmarks::open_palm(0.5)];
        let s = status_text(&overlay(&hands, Some("turn on light"), Duration::from_millis(2500)));
        assert_eq!(s, "hands: 1  last: turn on light  next gesture: 2.5s");

        let s = status_text(&overlay(&[], None, Duration::ZERO));
        assert_eq!(s, "hands: 0  last: none  next gesture: ready");
    }

    #[test]
    fn legend_lists_pose_keys_only_when_simulating() {
        assert!(legend(true).contains("O=open"));
        assert!(!legend(false).contains("O=open"));
    }

    #[test]
    fn hand_is_drawn_in_gesture_color() {
        let open = HandLandmarks::open_palm(0.5);
        let mut canvas = Canvas::default();
        canvas.paint(&overlay(std::slice::from_ref(&open), None, Duration::ZERO));

        let (wx, wy) = to_preview(open.points[0].x, open.points[0].y);
        assert_eq!(canvas.pixel(wx as usize, wy as usize), Some(JOINT_COLOR));
        assert!(canvas.buf.contains(&OPEN_COLOR));
        assert!(!canvas.buf.contains(&CLOSED_COLOR));
    }

    #[test]
    fn off_screen_landmarks_stay_bounded() {
        assert_eq!(to_preview(f32::INFINITY, f32::NEG_INFINITY), (2 * WIN_W as isize, -(PREVIEW_H as isize)));
        assert_eq!(to_preview(1.0e6, f32::NAN), (2 * WIN_W as isize, 0));
        assert_eq!(to_preview(0.5, 0.5), (WIN_W as isize / 2, PREVIEW_H as isize / 2));
    }

    #[test]
    fn wild_landmark_paints_without_hanging() {
        let mut hand = HandLandmarks::open_palm(0.5);
        hand.points[index::THUMB_TIP].x = 1.0e6;
        hand.points[index::INDEX_FINGER_TIP].y = f32::INFINITY;

        let mut canvas = Canvas::default();
        canvas.paint(&overlay(std::slice::from_ref(&hand), None, Duration::ZERO));

        let (wx, wy) = to_preview(hand.points[0].x, hand.points[0].y);
        assert_eq!(canvas.pixel(wx as usize, wy as usize), Some(JOINT_COLOR));
    }

    #[test]
    fn closed_hand_uses_closed_color() {
        let closed = [HandLandmarks::closed_palm(0.5)];
        let mut canvas = Canvas::default();
        canvas.paint(&overlay(&closed, None, Duration::ZERO));
        assert!(canvas.buf.contains(&CLOSED_COLOR));
    }

    #[test]
    fn off_screen_points_do_not_panic() {
        let mut far = HandLandmarks::open_palm(0.5);
        far.points[4].x = -3.0;
        far.points[8].y = 9.0;
        let mut canvas = Canvas::default();
        canvas.paint(&overlay(std::slice::from_ref(&far), None, Duration::ZERO));
    }
}
