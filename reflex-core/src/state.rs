use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single reaction attempt.
///
/// `Result` and `FalseStart` look terminal but are not: both accept a new
/// start, so the machine loops for as long as the session runs.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrialState {
    #[default]
    Idle,
    Armed,
    Stimulus,
    Result,
    FalseStart,
}

impl TrialState {
    /// States from which `start()` schedules a new stimulus.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Result | Self::FalseStart)
    }

    /// A stimulus is scheduled but not yet shown.
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Armed)
    }

    pub fn shows_stimulus(&self) -> bool {
        matches!(self, Self::Stimulus)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Armed => "armed",
            Self::Stimulus => "stimulus",
            Self::Result => "result",
            Self::FalseStart => "false_start",
        }
    }
}

impl fmt::Display for TrialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
