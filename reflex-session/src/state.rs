use super::config::SessionConfig;
use super::trial::SessionState;
use rand::Rng;
use reflex_core::{Histogram, RecentAttempt, SessionSummary, Trial, TrialHistory, TrialState};
use reflex_timing::{Clock, Scheduler, TimerHandle};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    Respond,
    StimulusDue(TimerHandle),
}

/// Drives one attempt after another: idle, armed behind a random delay,
/// stimulus shown, then a result or a false start.
///
/// Only [`start`](Self::start), [`respond`](Self::respond) and
/// [`on_stimulus_due`](Self::on_stimulus_due) change anything. Requests that
/// make no sense in the current state are ignored and reported as `false`.
pub struct SessionStateMachine<C, S, R>
where
    C: Clock,
    S: Scheduler,
    R: Rng,
{
    clock: C,
    scheduler: S,
    rng: R,
    config: SessionConfig,
    state: SessionState,
    history: TrialHistory,
}

impl<C, S, R> SessionStateMachine<C, S, R>
where
    C: Clock,
    S: Scheduler,
    R: Rng,
{
    pub fn new(config: SessionConfig, clock: C, scheduler: S, rng: R) -> Self {
        Self {
            clock,
            scheduler,
            rng,
            config,
            state: SessionState::default(),
            history: TrialHistory::new(),
        }
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Start => self.start(),
            SessionEvent::Respond => self.respond(),
            SessionEvent::StimulusDue(handle) => self.on_stimulus_due(handle),
        }
    }

    /// Arms a new attempt. Ignored while one is already armed or showing.
    pub fn start(&mut self) -> bool {
        if !self.state.trial.can_start() {
            debug!(state = %self.state.trial, "start ignored");
            return false;
        }

        let delay = self.draw_delay();
        let timer = self.scheduler.schedule(delay);
        let now_ns = self.clock.now();
        self.state = SessionState::armed(timer, delay, now_ns, self.state.last_reaction_ms);

        debug!(
            attempt = self.history.len() + 1,
            delay_ms = delay.as_millis() as u64,
            "armed"
        );
        true
    }

    /// The single user gesture: too early while armed, a measurement while
    /// the stimulus shows, and a new start otherwise.
    pub fn respond(&mut self) -> bool {
        match self.state.trial {
            TrialState::Armed => self.false_start(),
            TrialState::Stimulus => self.record_response(),
            TrialState::Idle | TrialState::Result | TrialState::FalseStart => self.start(),
        }
    }

    /// Timer expiry. Acts only if the machine is still armed by this very
    /// timer; anything else is a stale callback.
    pub fn on_stimulus_due(&mut self, handle: TimerHandle) -> bool {
        if !self.state.trial.is_waiting() || self.state.pending_timer != Some(handle) {
            debug!(
                timer = handle.id(),
                state = %self.state.trial,
                "stale stimulus timer ignored"
            );
            return false;
        }

        let now_ns = self.clock.now();
        self.state = SessionState::stimulus(&self.state, now_ns);
        debug!(at_ns = now_ns, "stimulus shown");
        true
    }

    fn false_start(&mut self) -> bool {
        if let Some(timer) = self.state.pending_timer {
            // Losing the race to an already fired timer is fine: its
            // delivery will find us no longer armed.
            let stopped = self.scheduler.cancel(timer);
            debug!(timer = timer.id(), stopped, "false start");
        }
        self.state = SessionState::false_start(self.state.last_reaction_ms);
        true
    }

    fn record_response(&mut self) -> bool {
        let now_ns = self.clock.now();
        let shown_ns = self.state.stimulus_at_ns.unwrap_or(now_ns);
        let reaction_ms = round_to_ms(now_ns.saturating_sub(shown_ns));

        let attempt = self.history.record(Trial::new(reaction_ms, now_ns));
        self.state = SessionState::result(reaction_ms);

        info!(attempt, reaction_ms, "trial recorded");
        true
    }

    fn draw_delay(&mut self) -> Duration {
        let (min, max) = self.config.delay_range_ms;
        let (lo, hi) = (min.saturating_mul(1_000), max.saturating_mul(1_000));
        if lo >= hi {
            return Duration::from_millis(min);
        }
        Duration::from_micros(self.rng.random_range(lo..hi))
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn trial_state(&self) -> TrialState {
        self.state.trial
    }

    pub fn last_reaction_ms(&self) -> Option<u64> {
        self.state.last_reaction_ms
    }

    pub fn history(&self) -> &TrialHistory {
        &self.history
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn count(&self) -> usize {
        self.history.count()
    }

    pub fn average(&self) -> u64 {
        self.history.average()
    }

    pub fn best(&self) -> u64 {
        self.history.best()
    }

    pub fn recent(&self, n: usize) -> Vec<RecentAttempt> {
        self.history.recent(n)
    }

    pub fn histogram(&self) -> Histogram {
        self.history.histogram()
    }

    pub fn summary(&self) -> SessionSummary {
        self.history.summary(self.config.recent_count)
    }
}

fn round_to_ms(nanos: u64) -> u64 {
    nanos.saturating_add(500_000) / 1_000_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use reflex_timing::{ManualClock, ManualScheduler, TimerStatus};

    type TestMachine = SessionStateMachine<ManualClock, ManualScheduler, StdRng>;

    fn machine() -> (TestMachine, ManualClock, ManualScheduler) {
        let clock = ManualClock::new();
        let scheduler = ManualScheduler::new();
        let m = SessionStateMachine::new(
            SessionConfig::default(),
            clock.clone(),
            scheduler.clone(),
            StdRng::seed_from_u64(7),
        );
        (m, clock, scheduler)
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_to_ms(0), 0);
        assert_eq!(round_to_ms(149_499_999), 149);
        assert_eq!(round_to_ms(149_500_000), 150);
        assert_eq!(round_to_ms(150_000_000), 150);
    }

    #[test]
    fn starts_idle_with_no_timer() {
        let (m, _, scheduler) = machine();
        assert_eq!(m.trial_state(), TrialState::Idle);
        assert_eq!(m.last_reaction_ms(), None);
        assert!(scheduler.history().is_empty());
    }

    #[test]
    fn start_arms_with_delay_in_range() {
        let (mut m, _, scheduler) = machine();
        assert!(m.start());
        assert_eq!(m.trial_state(), TrialState::Armed);

        let pending = scheduler.pending();
        assert_eq!(pending.len(), 1);
        let delay = pending[0].delay;
        assert!(delay >= Duration::from_millis(2000) && delay < Duration::from_millis(5000));
        assert_eq!(m.state().pending_timer, Some(pending[0].handle));
        assert_eq!(m.state().stimulus_delay, Some(delay));
    }

    #[test]
    fn delays_vary_between_attempts() {
        let (mut m, _, scheduler) = machine();
        for _ in 0..5 {
            m.start();
            m.respond();
        }
        let delays: Vec<Duration> = scheduler.history().iter().map(|t| t.delay).collect();
        assert_eq!(delays.len(), 5);
        assert!(delays.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn degenerate_range_uses_lower_bound() {
        let config = SessionConfig {
            delay_range_ms: (1000, 1000),
            ..SessionConfig::default()
        };
        let scheduler = ManualScheduler::new();
        let mut m = SessionStateMachine::new(
            config,
            ManualClock::new(),
            scheduler.clone(),
            StdRng::seed_from_u64(1),
        );
        m.start();
        assert_eq!(scheduler.pending()[0].delay, Duration::from_millis(1000));
    }

    #[test]
    fn huge_unvalidated_range_does_not_overflow() {
        let config = SessionConfig {
            delay_range_ms: (u64::MAX - 615, u64::MAX),
            ..SessionConfig::default()
        };
        let scheduler = ManualScheduler::new();
        let mut m = SessionStateMachine::new(
            config,
            ManualClock::new(),
            scheduler.clone(),
            StdRng::seed_from_u64(3),
        );
        assert!(m.start());
        assert_eq!(m.trial_state(), TrialState::Armed);
        assert_eq!(
            scheduler.pending()[0].delay,
            Duration::from_millis(u64::MAX - 615)
        );
    }

    #[test]
    fn cancelled_timer_status_after_false_start() {
        let (mut m, _, scheduler) = machine();
        m.start();
        let handle = scheduler.pending()[0].handle;
        assert!(m.respond());
        assert_eq!(m.trial_state(), TrialState::FalseStart);
        assert_eq!(scheduler.status(handle), Some(TimerStatus::Cancelled));
        assert_eq!(m.state().pending_timer, None);
    }

    #[test]
    fn handle_event_dispatches() {
        let (mut m, clock, scheduler) = machine();
        assert!(m.handle_event(SessionEvent::Start));
        let timer = scheduler.pending()[0].clone();
        clock.advance(timer.delay);
        assert!(m.handle_event(SessionEvent::StimulusDue(timer.handle)));
        clock.advance_ms(200);
        assert!(m.handle_event(SessionEvent::Respond));
        assert_eq!(m.last_reaction_ms(), Some(200));
    }
}
