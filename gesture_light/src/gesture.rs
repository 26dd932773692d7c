//! Gesture classification.
//!
//! One comparison decides the gesture: if the thumb tip sits lower in the
//! image than the index fingertip (larger y), the palm is closed.

use std::fmt;

use crate::landmark::HandLandmarks;

pub const TURN_ON:  &str = "turn on light";
pub const TURN_OFF: &str = "turn off light";

/// Every command the gesture path can produce.
pub const KNOWN_COMMANDS: [&str; 2] = [TURN_ON, TURN_OFF];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gesture {
    Open,
    Closed,
}

impl Gesture {
    /// Classify one hand.  Equal heights count as open.
    pub fn classify(hand: &HandLandmarks) -> Gesture {
        if hand.thumb_tip().y > hand.index_tip().y {
            Gesture::Closed
        } else {
            Gesture::Open
        }
    }

    pub fn command(self) -> &'static str {
        match self {
            Gesture::Open   => TURN_ON,
            Gesture::Closed => TURN_OFF,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Gesture::Open   => "open palm",
            Gesture::Closed => "closed palm",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn is_known_command(text: &str) -> bool {
    KNOWN_COMMANDS.contains(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::{index, Landmark, LANDMARK_COUNT};

    fn hand(thumb_y: f32, index_y: f32) -> HandLandmarks {
        let mut points = [Landmark::new(0.5, 0.5); LANDMARK_COUNT];
        points[index::THUMB_TIP].y        = thumb_y;
        points[index::INDEX_FINGER_TIP].y = index_y;
        HandLandmarks::from_points(&points).unwrap()
    }

    #[test]
    fn thumb_below_index_is_closed() {
        let g = Gesture::classify(&hand(0.7, 0.4));
        assert_eq!(g, Gesture::Closed);
        assert_eq!(g.command(), "turn off light");
    }

    #[test]
    fn thumb_above_index_is_open() {
        let g = Gesture::classify(&hand(0.3, 0.4));
        assert_eq!(g, Gesture::Open);
        assert_eq!(g.command(), "turn on light");
    }

    #[test]
    fn equal_heights_are_open() {
        assert_eq!(Gesture::classify(&hand(0.5, 0.5)), Gesture::Open);
    }

    #[test]
    fn only_tips_matter() {
        let mut h = hand(0.9, 0.1);
        for (i, p) in h.points.iter_mut().enumerate() {
            if i != index::THUMB_TIP && i != index::INDEX_FINGER_TIP {
                p.y = 0.0;
                p.x = 1.0;
            }
        }
        assert_eq!(Gesture::classify(&h), Gesture::Closed);
    }

    #[test]
    fn synthetic_poses_classify_as_named() {
        assert_eq!(Gesture::classify(&HandLandmarks::open_palm(0.5)),   Gesture::Open);
        assert_eq!(Gesture::classify(&HandLandmarks::closed_palm(0.5)), Gesture::Closed);
    }

    #[test]
    fn known_commands() {
        assert!(is_known_command("turn on light"));
        assert!(!is_known_command("open the pod bay doors"));
    }
}
