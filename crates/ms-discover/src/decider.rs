//! Completion Decider.
//!
//! A session moves `Running -> Finishing -> Stopped` exactly once. The first
//! trigger observed while running fixes the outcome; everything after that
//! is ignored.

use serde::Serialize;
use std::fmt;

use crate::result::DiscoveryResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Running,
    Finishing,
    Stopped,
}

/// Signals that can end a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Eos,
    Error,
    Timeout,
    /// The endpoint set is closed and every recognized kind is recorded.
    CapabilitiesSatisfied,
    /// Only undecodable streams were found.
    NothingDecodable,
    /// The graph could not be built or started.
    StartFailed,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eos => write!(f, "eos"),
            Self::Error => write!(f, "error"),
            Self::Timeout => write!(f, "timeout"),
            Self::CapabilitiesSatisfied => write!(f, "capabilities-satisfied"),
            Self::NothingDecodable => write!(f, "nothing-decodable"),
            Self::StartFailed => write!(f, "start-failed"),
        }
    }
}

/// Outcome at end of stream or timeout: at least one of audio and video was
/// seen, and every kind seen has a recorded stream.
pub fn success_criterion(result: &DiscoveryResult) -> bool {
    result.found_decodable() && result.recognized_kinds_recorded()
}

/// Whether a fresh negotiation lets the session finish early.
pub fn all_capabilities_recorded(result: &DiscoveryResult, endpoints_closed: bool) -> bool {
    endpoints_closed && success_criterion(result)
}

#[derive(Debug)]
pub struct CompletionDecider {
    phase: Phase,
    trigger: Option<Trigger>,
    outcome: bool,
}

impl Default for CompletionDecider {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionDecider {
    pub fn new() -> Self {
        Self {
            phase: Phase::Running,
            trigger: None,
            outcome: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn trigger(&self) -> Option<Trigger> {
        self.trigger
    }

    pub fn outcome(&self) -> bool {
        self.outcome
    }

    /// Apply a trigger. Returns the outcome when this call moved the session
    /// out of `Running`, `None` if it was already past that.
    pub fn fire(&mut self, trigger: Trigger, result: &DiscoveryResult) -> Option<bool> {
        if !self.is_running() {
            tracing::trace!(%trigger, phase = ?self.phase, "ignoring trigger");
            return None;
        }
        let outcome = match trigger {
            Trigger::Eos | Trigger::Timeout => success_criterion(result),
            Trigger::CapabilitiesSatisfied => true,
            Trigger::Error | Trigger::NothingDecodable | Trigger::StartFailed => false,
        };
        tracing::debug!(%trigger, success = outcome, "finishing");
        self.phase = Phase::Finishing;
        self.trigger = Some(trigger);
        self.outcome = outcome;
        Some(outcome)
    }

    /// Complete teardown. Returns `true` only for the call that stopped the
    /// session.
    pub fn stop(&mut self) -> bool {
        if self.phase != Phase::Finishing {
            return false;
        }
        self.phase = Phase::Stopped;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::StreamRecord;
    use ms_core::StreamKind;
    use ms_graph::Caps;

    fn audio_only() -> DiscoveryResult {
        let mut result = DiscoveryResult::new("x");
        result.mark_recognized(StreamKind::Audio);
        result.record(StreamRecord::from_caps(Caps::new("audio/x-raw-int"), 1).unwrap());
        result
    }

    #[test]
    fn nothing_recognized_is_failure() {
        assert!(!success_criterion(&DiscoveryResult::new("x")));
    }

    #[test]
    fn recognized_but_unrecorded_kind_is_failure() {
        let mut result = audio_only();
        assert!(success_criterion(&result));
        result.mark_recognized(StreamKind::Video);
        assert!(!success_criterion(&result));
    }

    #[test]
    fn early_finish_needs_closed_endpoints() {
        let result = audio_only();
        assert!(!all_capabilities_recorded(&result, false));
        assert!(all_capabilities_recorded(&result, true));
    }

    #[test]
    fn eos_and_timeout_share_the_criterion() {
        for trigger in [Trigger::Eos, Trigger::Timeout] {
            let mut decider = CompletionDecider::new();
            assert_eq!(decider.fire(trigger, &audio_only()), Some(true));
            let mut decider = CompletionDecider::new();
            assert_eq!(decider.fire(trigger, &DiscoveryResult::new("x")), Some(false));
        }
    }

    #[test]
    fn error_fails_regardless_of_progress() {
        let mut decider = CompletionDecider::new();
        assert_eq!(decider.fire(Trigger::Error, &audio_only()), Some(false));
        assert_eq!(decider.trigger(), Some(Trigger::Error));
    }

    #[test]
    fn start_failure_is_failure() {
        let mut decider = CompletionDecider::new();
        assert_eq!(decider.fire(Trigger::StartFailed, &DiscoveryResult::new("x")), Some(false));
        assert_eq!(decider.trigger(), Some(Trigger::StartFailed));
        assert_eq!(Trigger::StartFailed.to_string(), "start-failed");
        assert!(decider.stop());
    }

    #[test]
    fn transitions_happen_once() {
        let mut decider = CompletionDecider::new();
        assert_eq!(decider.fire(Trigger::CapabilitiesSatisfied, &audio_only()), Some(true));
        assert_eq!(decider.phase(), Phase::Finishing);
        assert_eq!(decider.fire(Trigger::Error, &audio_only()), None);
        assert!(decider.outcome());

        assert!(decider.stop());
        assert!(!decider.stop());
        assert_eq!(decider.phase(), Phase::Stopped);
        assert_eq!(decider.fire(Trigger::Eos, &audio_only()), None);
    }

    #[test]
    fn stop_requires_finishing() {
        let mut decider = CompletionDecider::new();
        assert!(!decider.stop());
        assert!(decider.is_running());
    }
}
