//! Streaming-completion detection for chat surfaces that never say "done".
//!
//! A surface renders its answer incrementally and offers no completion
//! event. Two signals are combined instead:
//!
//! - **quiet**: consecutive polls without the generation-in-progress
//!   indicator (usually a stop button);
//! - **stable**: consecutive polls in which the last message did not grow.
//!
//! The response is settled only when both counters reach their thresholds
//! in the same poll. Seeing the indicator again resets everything, so a
//! pause in the middle of a long answer never ends it early.
//!
//! Length tracking assumes the rendered message only grows while
//! streaming. A surface that rewrites or truncates text mid-stream can
//! settle prematurely.
//!
//! [`DetectorState`] is the pure state machine; [`CompletionDetector`] drives
//! it from a [`CompletionProbe`] on a fixed interval with a hard deadline.

use crate::config::DetectorConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// One poll's view of the surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    /// Whether the generation-in-progress indicator is visible.
    pub indicator_present: bool,
    /// Text of the last response element, if any.
    pub last_message: Option<String>,
}

impl Observation {
    /// Length of the last message in characters (0 if none).
    #[must_use]
    pub fn message_len(&self) -> usize {
        self.last_message
            .as_deref()
            .map_or(0, |text| text.chars().count())
    }
}

/// Result of feeding one observation to [`DetectorState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The indicator is visible; counters were reset.
    Generating,
    /// Not settled yet.
    Pending,
    /// Both thresholds hold.
    Settled,
}

/// Dual-counter debounce state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorState {
    quiet_cycles: u32,
    stable_cycles: u32,
    quiet: u32,
    stable: u32,
    last_len: usize,
}

impl DetectorState {
    #[must_use]
    pub fn new(quiet_cycles: u32, stable_cycles: u32) -> Self {
        Self {
            quiet_cycles,
            stable_cycles,
            quiet: 0,
            stable: 0,
            last_len: 0,
        }
    }

    /// Advance by one poll.
    pub fn observe(&mut self, indicator_present: bool, current_len: usize) -> Verdict {
        if indicator_present {
            self.quiet = 0;
            self.stable = 0;
            self.last_len = 0;
            return Verdict::Generating;
        }

        self.quiet = self.quiet.saturating_add(1);
        if current_len > self.last_len {
            self.last_len = current_len;
            self.stable = 0;
        } else {
            self.stable = self.stable.saturating_add(1);
        }

        if self.quiet >= self.quiet_cycles && self.stable >= self.stable_cycles {
            Verdict::Settled
        } else {
            Verdict::Pending
        }
    }

    #[must_use]
    pub fn quiet(&self) -> u32 {
        self.quiet
    }

    #[must_use]
    pub fn stable(&self) -> u32 {
        self.stable
    }

    #[must_use]
    pub fn last_len(&self) -> usize {
        self.last_len
    }
}

/// Source of observations for the detector.
#[async_trait]
pub trait CompletionProbe: Send {
    /// Inspect the surface once.
    async fn probe(&mut self) -> Result<Observation>;
}

/// How polling ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Settled,
    TimedOut,
}

/// Final report of a watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub outcome: Outcome,
    /// Last message text seen by the final poll that produced one.
    pub last_message: Option<String>,
    /// Number of polls performed.
    pub polls: u32,
}

/// Polls a [`CompletionProbe`] until the response settles or the deadline passes.
#[derive(Debug, Clone)]
pub struct CompletionDetector {
    poll_interval: Duration,
    hard_timeout: Duration,
    quiet_cycles: u32,
    stable_cycles: u32,
}

impl CompletionDetector {
    #[must_use]
    pub fn new(
        poll_interval: Duration,
        hard_timeout: Duration,
        quiet_cycles: u32,
        stable_cycles: u32,
    ) -> Self {
        Self {
            poll_interval,
            hard_timeout,
            quiet_cycles,
            stable_cycles,
        }
    }

    #[must_use]
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(
            config.poll_interval(),
            config.hard_timeout(),
            config.quiet_cycles,
            config.stable_cycles,
        )
    }

    /// Poll until settled or timed out.
    ///
    /// The first poll happens one interval after the call. The hard timeout
    /// is absolute and wins over a poll due at the same instant.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the probe; polling stops there.
    pub async fn watch<P>(&self, probe: &mut P) -> Result<Completion>
    where
        P: CompletionProbe + ?Sized,
    {
        let start = Instant::now();
        let deadline = start + self.hard_timeout;
        let mut ticker =
            tokio::time::interval_at(start + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut state = DetectorState::new(self.quiet_cycles, self.stable_cycles);
        let mut last_message = None;
        let mut polls = 0u32;

        loop {
            tokio::select! {
                biased;
                () = tokio::time::sleep_until(deadline) => {
                    tracing::warn!(
                        polls,
                        quiet = state.quiet(),
                        stable = state.stable(),
                        "completion watch hit hard timeout"
                    );
                    return Ok(Completion {
                        outcome: Outcome::TimedOut,
                        last_message,
                        polls,
                    });
                }
                _ = ticker.tick() => {}
            }

            let observation = probe.probe().await?;
            polls += 1;
            let len = observation.message_len();
            if observation.last_message.is_some() {
                last_message = observation.last_message;
            }

            match state.observe(observation.indicator_present, len) {
                Verdict::Generating => {
                    tracing::trace!(polls, "generation indicator visible");
                }
                Verdict::Pending => {
                    tracing::trace!(
                        polls,
                        quiet = state.quiet(),
                        stable = state.stable(),
                        len,
                        "waiting for response to settle"
                    );
                }
                Verdict::Settled => {
                    tracing::debug!(
                        polls,
                        len,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "response settled"
                    );
                    return Ok(Completion {
                        outcome: Outcome::Settled,
                        last_message,
                        polls,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[test]
    fn settles_only_when_both_counters_reach_threshold() {
        let mut state = DetectorState::new(3, 2);
        // Growing: quiet climbs, stable stays at zero.
        assert_eq!(state.observe(false, 10), Verdict::Pending);
        assert_eq!(state.observe(false, 20), Verdict::Pending);
        assert_eq!(state.observe(false, 30), Verdict::Pending);
        assert_eq!(state.quiet(), 3);
        assert_eq!(state.stable(), 0);
        // Constant: stable climbs.
        assert_eq!(state.observe(false, 30), Verdict::Pending);
        assert_eq!(state.observe(false, 30), Verdict::Settled);
    }

    #[test]
    fn indicator_resets_all_counters() {
        let mut state = DetectorState::new(3, 2);
        state.observe(false, 50);
        state.observe(false, 50);
        assert_eq!(state.observe(true, 50), Verdict::Generating);
        assert_eq!(state.quiet(), 0);
        assert_eq!(state.stable(), 0);
        assert_eq!(state.last_len(), 0);
    }

    #[test]
    fn transient_indicator_prevents_false_completion() {
        let mut state = DetectorState::new(3, 2);
        // Indicator gone at poll N with constant length...
        assert_eq!(state.observe(false, 40), Verdict::Pending);
        assert_eq!(state.observe(false, 40), Verdict::Pending);
        // ...and back at N+1 before thresholds are met.
        assert_eq!(state.observe(true, 40), Verdict::Generating);
        // After the reset the first length counts as growth again.
        assert_eq!(state.observe(false, 40), Verdict::Pending);
        assert_eq!(state.observe(false, 40), Verdict::Pending);
        assert_eq!(state.observe(false, 40), Verdict::Settled);
    }

    #[test]
    fn no_message_ever_still_settles_on_zero_length() {
        let mut state = DetectorState::new(3, 2);
        assert_eq!(state.observe(false, 0), Verdict::Pending);
        assert_eq!(state.observe(false, 0), Verdict::Pending);
        assert_eq!(state.observe(false, 0), Verdict::Settled);
    }

    #[test]
    fn shrinking_text_counts_as_stable() {
        let mut state = DetectorState::new(1, 1);
        assert_eq!(state.observe(false, 100), Verdict::Pending);
        assert_eq!(state.observe(false, 60), Verdict::Settled);
        assert_eq!(state.last_len(), 100);
    }

    #[test]
    fn message_len_counts_chars() {
        let obs = Observation {
            indicator_present: false,
            last_message: Some("שלום".to_owned()),
        };
        assert_eq!(obs.message_len(), 4);
        assert_eq!(Observation::default().message_len(), 0);
    }

    struct Scripted {
        script: VecDeque<Observation>,
        fallback: Observation,
    }

    impl Scripted {
        fn new(script: Vec<Observation>, fallback: Observation) -> Self {
            Self {
                script: script.into(),
                fallback,
            }
        }
    }

    #[async_trait]
    impl CompletionProbe for Scripted {
        async fn probe(&mut self) -> Result<Observation> {
            Ok(self
                .script
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone()))
        }
    }

    fn obs(indicator: bool, text: &str) -> Observation {
        Observation {
            indicator_present: indicator,
            last_message: (!text.is_empty()).then(|| text.to_owned()),
        }
    }

    fn fast(timeout_ms: u64) -> CompletionDetector {
        CompletionDetector::new(
            Duration::from_millis(1),
            Duration::from_millis(timeout_ms),
            3,
            2,
        )
    }

    #[tokio::test]
    async fn watch_reports_final_text_after_indicator_clears() {
        let answer = "the complete final answer";
        let mut probe = Scripted::new(
            vec![obs(true, "the"), obs(true, "the complete")],
            obs(false, answer),
        );
        let completion = fast(10_000).watch(&mut probe).await.expect("watch in test");
        assert_eq!(completion.outcome, Outcome::Settled);
        assert_eq!(completion.last_message.as_deref(), Some(answer));
        // 2 indicator polls, then growth (quiet=1, stable=0), then
        // stable=1 (quiet=2), stable=2 (quiet=3) -> settle on poll 5.
        assert_eq!(completion.polls, 5);
    }

    #[tokio::test]
    async fn watch_settles_on_first_poll_meeting_both_thresholds() {
        let mut probe = Scripted::new(
            vec![
                obs(false, "a"),
                obs(false, "ab"),
                obs(false, "abc"),
                obs(false, "abcd"),
            ],
            obs(false, "abcd"),
        );
        let completion = fast(10_000).watch(&mut probe).await.expect("watch in test");
        assert_eq!(completion.outcome, Outcome::Settled);
        // Growth through poll 4, stable reaches 2 at poll 6.
        assert_eq!(completion.polls, 6);
    }

    #[tokio::test]
    async fn watch_times_out_while_indicator_persists() {
        let mut probe = Scripted::new(Vec::new(), obs(true, "partial"));
        let detector = CompletionDetector::new(
            Duration::from_millis(5),
            Duration::from_millis(60),
            3,
            2,
        );
        let completion = detector.watch(&mut probe).await.expect("watch in test");
        assert_eq!(completion.outcome, Outcome::TimedOut);
        assert_eq!(completion.last_message.as_deref(), Some("partial"));
    }

    #[tokio::test]
    async fn watch_times_out_with_nothing_observed() {
        let mut probe = Scripted::new(Vec::new(), obs(true, ""));
        let detector = CompletionDetector::new(
            Duration::from_millis(50),
            Duration::from_millis(10),
            3,
            2,
        );
        let completion = detector.watch(&mut probe).await.expect("watch in test");
        assert_eq!(completion.outcome, Outcome::TimedOut);
        assert_eq!(completion.last_message, None);
        assert_eq!(completion.polls, 0);
    }

    struct Failing;

    #[async_trait]
    impl CompletionProbe for Failing {
        async fn probe(&mut self) -> Result<Observation> {
            Err(crate::error::BridgeError::Surface("agent gone".into()))
        }
    }

    #[tokio::test]
    async fn probe_error_stops_watch() {
        let err = fast(1_000).watch(&mut Failing).await.unwrap_err();
        assert!(err.to_string().contains("agent gone"));
    }
}
