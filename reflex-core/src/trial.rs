use serde::{Deserialize, Serialize};

use crate::stats::{self, Histogram, RecentAttempt, SessionSummary};

/// One completed measurement. Only successful responses become trials;
/// false starts never reach the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trial {
    pub reaction_time_ms: u64,
    pub completed_at_ns: u64,
}

impl Trial {
    pub fn new(reaction_time_ms: u64, completed_at_ns: u64) -> Self {
        Self {
            reaction_time_ms,
            completed_at_ns,
        }
    }
}

/// Append-only record of completed trials in attempt order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrialHistory {
    trials: Vec<Trial>,
}

impl TrialHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a trial and returns its 1-based attempt number.
    pub fn record(&mut self, trial: Trial) -> usize {
        self.trials.push(trial);
        self.trials.len()
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trial> {
        self.trials.iter()
    }

    pub fn last(&self) -> Option<&Trial> {
        self.trials.last()
    }

    /// Reaction times in attempt order.
    pub fn latencies(&self) -> Vec<u64> {
        self.trials.iter().map(|t| t.reaction_time_ms).collect()
    }

    pub fn count(&self) -> usize {
        self.len()
    }

    pub fn average(&self) -> u64 {
        stats::average(&self.latencies())
    }

    pub fn best(&self) -> u64 {
        stats::best(&self.latencies())
    }

    pub fn recent(&self, n: usize) -> Vec<RecentAttempt> {
        stats::recent(&self.latencies(), n)
    }

    pub fn histogram(&self) -> Histogram {
        stats::histogram(&self.latencies())
    }

    pub fn summary(&self, recent: usize) -> SessionSummary {
        SessionSummary::from_latencies(&self.latencies(), recent)
    }
}

impl FromIterator<Trial> for TrialHistory {
    fn from_iter<I: IntoIterator<Item = Trial>>(iter: I) -> Self {
        let mut history = TrialHistory::new();
        for trial in iter {
            history.record(trial);
        }
        history
    }
}
