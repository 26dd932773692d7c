//! Property tests for gesture classification and the dispatch gate.

use std::time::{Duration, Instant};

use gesture_light::dispatcher::{DispatchPolicy, Dispatcher};
use gesture_light::gesture::{Gesture, TURN_OFF, TURN_ON};
use gesture_light::landmark::{index, HandLandmarks, Landmark, LANDMARK_COUNT};
use light_link::RecordingSink;
use proptest::prelude::*;

fn hand(thumb_y: f32, index_y: f32) -> HandLandmarks {
    let mut points = [Landmark::new(0.5, 0.5); LANDMARK_COUNT];
    points[index::THUMB_TIP].y        = thumb_y;
    points[index::INDEX_FINGER_TIP].y = index_y;
    HandLandmarks::from_points(&points).unwrap()
}

fn any_hand() -> impl Strategy<Value = HandLandmarks> {
    (0.0f32..1.0, 0.0f32..1.0).prop_map(|(t, i)| hand(t, i))
}

// ── classification ────────────────────────────────────────────

proptest! {
    /// The command depends only on which tip is lower in the image.
    #[test]
    fn command_follows_tip_heights(thumb_y in 0.0f32..1.0, index_y in 0.0f32..1.0) {
        let g = Gesture::classify(&hand(thumb_y, index_y));
        if thumb_y > index_y {
            prop_assert_eq!(g.command(), TURN_OFF);
        } else {
            prop_assert_eq!(g.command(), TURN_ON);
        }
    }
}

// ── dispatch gate ─────────────────────────────────────────────

proptest! {
    /// Whatever the tick timing and hand counts, no two acting ticks are
    /// closer than the interval, and every acting tick sends one command
    /// per hand.
    #[test]
    fn acting_ticks_respect_interval(
        ticks in proptest::collection::vec(
            (0u64..3_000, proptest::collection::vec(any_hand(), 0..4)),
            1..40,
        ),
    ) {
        let interval = Duration::from_millis(5_000);
        let t0 = Instant::now();
        let policy = DispatchPolicy { interval, ..DispatchPolicy::default() };
        let mut d = Dispatcher::new(RecordingSink::new(), policy, t0);

        let mut now = t0;
        let mut last_acting = t0;
        let mut expected_lines = 0usize;

        for (step_ms, hands) in ticks {
            now += Duration::from_millis(step_ms);
            let before = d.last_dispatch();
            let sent = d.gesture_tick(&hands, now).unwrap();

            if d.last_dispatch() != before {
                prop_assert!(now.duration_since(last_acting) >= interval);
                prop_assert_eq!(sent.len(), hands.len());
                last_acting = now;
                expected_lines += hands.len();
            } else {
                prop_assert!(sent.is_empty());
            }
        }
        prop_assert_eq!(d.sink().lines.len(), expected_lines);
    }

    /// A tick that lands on or after the interval always acts.
    #[test]
    fn gate_reopens_after_interval(extra_ms in 0u64..10_000, n_hands in 0usize..4) {
        let t0 = Instant::now();
        let mut d = Dispatcher::new(RecordingSink::new(), DispatchPolicy::default(), t0);
        let hands = vec![hand(0.9, 0.1); n_hands];
        let now = t0 + Duration::from_millis(5_000 + extra_ms);

        let sent = d.gesture_tick(&hands, now).unwrap();
        prop_assert_eq!(sent, vec![Gesture::Closed; n_hands]);
        prop_assert_eq!(d.last_dispatch(), now);
    }
}
