//! The command dispatcher: gesture gate, voice path, and the write to the link.
//!
//! `Dispatcher` owns the sink and the single piece of timing state, the
//! instant of the last gesture tick that acted.  Time is passed in, so the
//! rules can be exercised without a clock or any hardware.

use std::time::{Duration, Instant};

use light_link::{CommandSink, LinkError};
use tracing::{info, warn};

use crate::gesture::{is_known_command, Gesture};
use crate::landmark::HandLandmarks;
use crate::voice::{ListenConfig, TranscribeError, Transcriber};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

// ════════════════════════════════════════════════════════════════════════════
// DispatchPolicy
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DispatchPolicy {
    /// Minimum spacing between gesture ticks that act.
    pub interval: Duration,
    /// Whether a tick that sees no hands still restarts the interval.
    pub idle_resets_timer: bool,
    /// Drop voice transcripts that aren't one of the gesture commands.
    pub restrict_voice: bool,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        DispatchPolicy {
            interval:          DEFAULT_INTERVAL,
            idle_resets_timer: true,
            restrict_voice:    false,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// VoiceOutcome
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoiceOutcome {
    /// The transcript was sent as-is (lowercased).
    Sent(String),
    NotUnderstood,
    ServiceError(String),
    /// Understood, but not a known command and voice is restricted.
    Rejected(String),
}

// ════════════════════════════════════════════════════════════════════════════
// Dispatcher
// ════════════════════════════════════════════════════════════════════════════

pub struct Dispatcher<S: CommandSink> {
    sink:          S,
    policy:        DispatchPolicy,
    last_dispatch: Instant,
    last_command:  Option<String>,
    sent:          usize,
}

impl<S: CommandSink> Dispatcher<S> {
    /// `now` starts the first interval: no gesture acts until it elapses.
    pub fn new(sink: S, policy: DispatchPolicy, now: Instant) -> Self {
        Dispatcher {
            sink,
            policy,
            last_dispatch: now,
            last_command:  None,
            sent:          0,
        }
    }

    // ── gesture path ─────────────────────────────────────────────────────

    pub fn gate_open(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_dispatch) >= self.policy.interval
    }

    /// Time left before the gesture gate reopens.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.policy
            .interval
            .saturating_sub(now.saturating_duration_since(self.last_dispatch))
    }

    /// Classify and dispatch every hand, at most once per interval.
    ///
    /// Each hand sends its own command.  The timer restarts once per acting
    /// tick, including ticks that saw no hands unless the policy says
    /// otherwise.  Returns the gestures that were dispatched, in order.
    pub fn gesture_tick(&mut self, hands: &[HandLandmarks], now: Instant) -> Result<Vec<Gesture>, LinkError> {
        if !self.gate_open(now) {
            return Ok(Vec::new());
        }
        if hands.is_empty() && !self.policy.idle_resets_timer {
            return Ok(Vec::new());
        }

        let mut sent = Vec::with_capacity(hands.len());
        for hand in hands {
            let gesture = Gesture::classify(hand);
            info!(%gesture, "gesture detected");
            self.dispatch(gesture.command())?;
            sent.push(gesture);
        }
        self.last_dispatch = now;
        Ok(sent)
    }

    // ── voice path ───────────────────────────────────────────────────────

    /// Capture and forward one spoken command.  Never touches the gesture gate.
    ///
    /// Recognition failures are logged and reported in the outcome; only a
    /// failed write to the link is an error.
    pub fn voice_tick<T>(&mut self, transcriber: &mut T, listen: &ListenConfig) -> Result<VoiceOutcome, LinkError>
    where
        T: Transcriber + ?Sized,
    {
        info!(source = %transcriber.describe(), "listening for a command…");
        let text = match transcriber.transcribe(listen) {
            Ok(text) => text.trim().to_lowercase(),
            Err(TranscribeError::Unintelligible) => {
                warn!("could not understand the command");
                return Ok(VoiceOutcome::NotUnderstood);
            }
            Err(TranscribeError::ServiceUnavailable(reason)) => {
                warn!(%reason, "speech recognition service error");
                return Ok(VoiceOutcome::ServiceError(reason));
            }
        };

        if text.is_empty() {
            warn!("could not understand the command");
            return Ok(VoiceOutcome::NotUnderstood);
        }
        info!(command = %text, "recognized command");

        if self.policy.restrict_voice && !is_known_command(&text) {
            warn!(command = %text, "not a known command — ignored");
            return Ok(VoiceOutcome::Rejected(text));
        }

        self.dispatch(&text)?;
        Ok(VoiceOutcome::Sent(text))
    }

    // ── the write ────────────────────────────────────────────────────────

    /// Send one command to the link.  No acknowledgement, no retry.
    pub fn dispatch(&mut self, command: &str) -> Result<(), LinkError> {
        self.sink.send_line(command)?;
        self.sent += 1;
        self.last_command = Some(command.to_string());
        info!(command, to = %self.sink.describe(), "sent");
        Ok(())
    }

    // ── accessors ────────────────────────────────────────────────────────

    pub fn sink(&self)          -> &S                { &self.sink }
    pub fn policy(&self)        -> &DispatchPolicy   { &self.policy }
    pub fn last_dispatch(&self) -> Instant           { self.last_dispatch }
    pub fn last_command(&self)  -> Option<&str>      { self.last_command.as_deref() }
    pub fn sent_count(&self)    -> usize             { self.sent }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use light_link::RecordingSink;
    use std::collections::VecDeque;
    use std::io;

    fn secs(n: u64) -> Duration { Duration::from_secs(n) }

    /// Transcriber that replays canned results.
    struct Canned(VecDeque<Result<String, TranscribeError>>);

    impl Transcriber for Canned {
        fn transcribe(&mut self, _listen: &ListenConfig) -> Result<String, TranscribeError> {
            self.0.pop_front().unwrap_or(Err(TranscribeError::Unintelligible))
        }
        fn describe(&self) -> String { "canned".to_string() }
    }

    fn canned(results: Vec<Result<String, TranscribeError>>) -> Canned {
        Canned(results.into())
    }

    /// Sink whose writes always fail.
    struct Unplugged;

    impl CommandSink for Unplugged {
        fn send_line(&mut self, command: &str) -> Result<(), LinkError> {
            Err(LinkError::Write {
                command: command.to_string(),
                target:  "COM15".to_string(),
                source:  io::Error::new(io::ErrorKind::NotConnected, "unplugged"),
            })
        }
        fn describe(&self) -> String { "unplugged".to_string() }
    }

    fn make(policy: DispatchPolicy) -> (Dispatcher<RecordingSink>, Instant) {
        let t0 = Instant::now();
        (Dispatcher::new(RecordingSink::new(), policy, t0), t0)
    }

    fn open()   -> HandLandmarks { HandLandmarks::open_palm(0.5) }
    fn closed() -> HandLandmarks { HandLandmarks::closed_palm(0.5) }

    #[test]
    fn nothing_acts_before_first_interval() {
        let (mut d, t0) = make(DispatchPolicy::default());
        assert!(d.gesture_tick(&[open()], t0 + secs(4)).unwrap().is_empty());
        assert!(d.sink().lines.is_empty());
    }

    #[test]
    fn closed_hand_turns_light_off() {
        let (mut d, t0) = make(DispatchPolicy::default());
        let sent = d.gesture_tick(&[closed()], t0 + secs(5)).unwrap();
        assert_eq!(sent, vec![Gesture::Closed]);
        assert_eq!(d.sink().lines, vec!["turn off light"]);
    }

    #[test]
    fn open_hand_turns_light_on() {
        let (mut d, t0) = make(DispatchPolicy::default());
        d.gesture_tick(&[open()], t0 + secs(5)).unwrap();
        assert_eq!(d.sink().last(), Some("turn on light"));
        assert_eq!(d.last_command(), Some("turn on light"));
    }

    #[test]
    fn ticks_inside_interval_are_suppressed() {
        let (mut d, t0) = make(DispatchPolicy::default());
        d.gesture_tick(&[open()], t0 + secs(5)).unwrap();
        d.gesture_tick(&[open()], t0 + secs(7)).unwrap();
        d.gesture_tick(&[open()], t0 + Duration::from_millis(9_999)).unwrap();
        assert_eq!(d.sent_count(), 1);

        d.gesture_tick(&[closed()], t0 + secs(10)).unwrap();
        assert_eq!(d.sink().lines, vec!["turn on light", "turn off light"]);
    }

    #[test]
    fn each_hand_dispatches_but_timer_resets_once() {
        let (mut d, t0) = make(DispatchPolicy::default());
        let now = t0 + secs(6);
        let sent = d.gesture_tick(&[open(), closed(), open()], now).unwrap();
        assert_eq!(sent, vec![Gesture::Open, Gesture::Closed, Gesture::Open]);
        assert_eq!(d.sink().lines.len(), 3);
        assert_eq!(d.last_dispatch(), now);
    }

    #[test]
    fn empty_frame_sends_nothing_but_restarts_timer() {
        let (mut d, t0) = make(DispatchPolicy::default());
        let now = t0 + secs(5);
        assert!(d.gesture_tick(&[], now).unwrap().is_empty());
        assert_eq!(d.last_dispatch(), now);
        assert!(d.sink().lines.is_empty());

        // The next real gesture waits a full interval.
        assert!(d.gesture_tick(&[open()], now + secs(1)).unwrap().is_empty());
        assert_eq!(d.gesture_tick(&[open()], now + secs(5)).unwrap().len(), 1);
    }

    #[test]
    fn idle_frames_can_leave_timer_alone() {
        let policy = DispatchPolicy { idle_resets_timer: false, ..DispatchPolicy::default() };
        let (mut d, t0) = make(policy);
        d.gesture_tick(&[], t0 + secs(5)).unwrap();
        assert_eq!(d.last_dispatch(), t0);
        assert_eq!(d.gesture_tick(&[open()], t0 + secs(6)).unwrap().len(), 1);
    }

    #[test]
    fn remaining_counts_down_to_zero() {
        let (d, t0) = make(DispatchPolicy::default());
        assert_eq!(d.remaining(t0), secs(5));
        assert_eq!(d.remaining(t0 + secs(2)), secs(3));
        assert_eq!(d.remaining(t0 + secs(60)), Duration::ZERO);
    }

    #[test]
    fn voice_bypasses_gate_and_keeps_timer() {
        let (mut d, t0) = make(DispatchPolicy::default());
        d.gesture_tick(&[open()], t0 + secs(5)).unwrap();
        let mut t = canned(vec![Ok("Dim The Lights".to_string())]);
        let outcome = d.voice_tick(&mut t, &ListenConfig::default()).unwrap();
        assert_eq!(outcome, VoiceOutcome::Sent("dim the lights".to_string()));
        assert_eq!(d.sink().lines, vec!["turn on light", "dim the lights"]);
        assert_eq!(d.last_dispatch(), t0 + secs(5));
    }

    #[test]
    fn voice_failures_send_nothing() {
        let (mut d, _) = make(DispatchPolicy::default());
        let mut t = canned(vec![
            Err(TranscribeError::Unintelligible),
            Err(TranscribeError::ServiceUnavailable("offline".to_string())),
            Ok("   ".to_string()),
        ]);
        let listen = ListenConfig::default();
        assert_eq!(d.voice_tick(&mut t, &listen).unwrap(), VoiceOutcome::NotUnderstood);
        assert_eq!(
            d.voice_tick(&mut t, &listen).unwrap(),
            VoiceOutcome::ServiceError("offline".to_string())
        );
        assert_eq!(d.voice_tick(&mut t, &listen).unwrap(), VoiceOutcome::NotUnderstood);
        assert_eq!(d.sent_count(), 0);
    }

    #[test]
    fn restricted_voice_only_forwards_known_commands() {
        let policy = DispatchPolicy { restrict_voice: true, ..DispatchPolicy::default() };
        let (mut d, _) = make(policy);
        let mut t = canned(vec![Ok("self destruct".to_string()), Ok("Turn Off Light".to_string())]);
        let listen = ListenConfig::default();
        assert_eq!(
            d.voice_tick(&mut t, &listen).unwrap(),
            VoiceOutcome::Rejected("self destruct".to_string())
        );
        assert_eq!(
            d.voice_tick(&mut t, &listen).unwrap(),
            VoiceOutcome::Sent("turn off light".to_string())
        );
        assert_eq!(d.sink().lines, vec!["turn off light"]);
    }

    #[test]
    fn write_failure_propagates() {
        let t0 = Instant::now();
        let mut d = Dispatcher::new(Unplugged, DispatchPolicy::default(), t0);
        assert!(d.gesture_tick(&[open()], t0 + secs(5)).is_err());
        assert_eq!(d.sent_count(), 0);

        let mut t = canned(vec![Ok("lights".to_string())]);
        assert!(d.voice_tick(&mut t, &ListenConfig::default()).is_err());
    }
}
