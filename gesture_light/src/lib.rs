//! # gesture_light
//!
//! Turns a light on and off with hand gestures or spoken commands.  Hand
//! landmarks come from an external hand model, speech from an external
//! recognizer; this crate decides what to send and writes it to the light
//! controller over a serial link (see the `light_link` crate).
//!
//! ## Gesture → Command mapping
//!
//! | Gesture | Rule | Command |
//! |---|---|---|
//! | Closed palm | thumb tip (landmark 4) lower than index tip (landmark 8) | `turn off light` |
//! | Open palm | otherwise | `turn on light` |
//! | Voice | any recognized phrase, lowercased | the phrase itself |
//!
//! Gestures act at most once per interval (5 s by default), one command per
//! detected hand.  Voice commands are sent as soon as they are recognized.
//!
//! ## Landmark sources
//!
//! * (default) — **Simulation mode**: the control window's keys choose the pose.
//! * `camera.landmark_command` set — **Camera mode**: a helper process owns the
//!   camera and the hand model and streams JSON frames.
//!
//! ### Keys
//!
//! | Key | Action |
//! |---|---|
//! | `V` | Listen for a voice command |
//! | `Q` | Quit |
//! | `O` | (sim) Open palm |
//! | `C` | (sim) Closed palm |
//! | `B` | (sim) Both hands — one open, one closed |
//! | `N` | (sim) No hands |

pub mod landmark;
pub mod gesture;
pub mod voice;
pub mod dispatcher;
pub mod config;
pub mod visualizer;
pub mod app;
