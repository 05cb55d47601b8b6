pub mod clock;
pub mod scheduler;

pub use clock::{high_precision_sleep, Clock, HighPrecisionClock, ManualClock};
pub use scheduler::{
    ManualScheduler, Scheduler, ThreadScheduler, TimerCallback, TimerHandle, TimerStatus,
};
