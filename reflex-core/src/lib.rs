pub mod state;
pub mod stats;
pub mod trial;

pub use state::TrialState;
pub use stats::{
    BIN_COUNT, BIN_WIDTH_MS, HISTOGRAM_MAX_MS, Histogram, HistogramBin, HistogramSource,
    RecentAttempt, SessionSummary,
};
pub use trial::{Trial, TrialHistory};
