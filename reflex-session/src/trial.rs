use std::time::Duration;

use reflex_core::TrialState;
use reflex_timing::TimerHandle;

/// Snapshot of the machine. Every transition builds a new one; only the
/// last reaction time is carried across so it stays on screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub trial: TrialState,
    pub pending_timer: Option<TimerHandle>,
    pub stimulus_delay: Option<Duration>,
    pub armed_at_ns: Option<u64>,
    pub stimulus_at_ns: Option<u64>,
    pub last_reaction_ms: Option<u64>,
}

impl SessionState {
    pub fn armed(
        timer: TimerHandle,
        delay: Duration,
        now_ns: u64,
        last_reaction_ms: Option<u64>,
    ) -> Self {
        Self {
            trial: TrialState::Armed,
            pending_timer: Some(timer),
            stimulus_delay: Some(delay),
            armed_at_ns: Some(now_ns),
            stimulus_at_ns: None,
            last_reaction_ms,
        }
    }

    pub fn stimulus(previous: &SessionState, now_ns: u64) -> Self {
        Self {
            trial: TrialState::Stimulus,
            pending_timer: None,
            stimulus_delay: previous.stimulus_delay,
            armed_at_ns: previous.armed_at_ns,
            stimulus_at_ns: Some(now_ns),
            last_reaction_ms: previous.last_reaction_ms,
        }
    }

    pub fn result(reaction_ms: u64) -> Self {
        Self {
            trial: TrialState::Result,
            last_reaction_ms: Some(reaction_ms),
            ..Self::default()
        }
    }

    pub fn false_start(last_reaction_ms: Option<u64>) -> Self {
        Self {
            trial: TrialState::FalseStart,
            last_reaction_ms,
            ..Self::default()
        }
    }
}
