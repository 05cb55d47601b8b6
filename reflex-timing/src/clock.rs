use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source in nanoseconds since the clock's own epoch.
pub trait Clock: Clone + Send + Sync {
    fn now(&self) -> u64;

    fn elapsed(&self, since: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(since))
    }
}

/// Wall-free monotonic clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct HighPrecisionClock {
    start: Instant,
}

impl Clock for HighPrecisionClock {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
}

impl HighPrecisionClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for HighPrecisionClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Clock that only moves when told to. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.nanos.fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    pub fn set(&self, nanos: u64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

/// Sleeps on the monotonic clock where the platform offers it.
pub fn high_precision_sleep(duration: Duration) {
    #[cfg(target_os = "linux")]
    linux_sleep(duration);
    #[cfg(not(target_os = "linux"))]
    std::thread::sleep(duration);
}

#[cfg(target_os = "linux")]
fn linux_sleep(duration: Duration) {
    use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC, EINTR};

    let mut req = timespec {
        tv_sec: duration.as_secs() as libc::time_t,
        tv_nsec: duration.subsec_nanos() as libc::c_long,
    };
    let mut rem = timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };

    // clock_nanosleep returns the error number directly; resume on signal.
    loop {
        let rc = unsafe { clock_nanosleep(CLOCK_MONOTONIC, 0, &req, &mut rem) };
        if rc != EINTR {
            break;
        }
        req = rem;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_precision_clock_is_monotonic() {
        let clock = HighPrecisionClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance_ms(150);
        assert_eq!(other.now(), 150_000_000);
        other.set(5);
        assert_eq!(clock.now(), 5);
    }

    #[test]
    fn elapsed_saturates_for_future_timestamps() {
        let clock = ManualClock::new();
        clock.advance_ms(10);
        assert_eq!(clock.elapsed(0), Duration::from_millis(10));
        assert_eq!(clock.elapsed(u64::MAX), Duration::ZERO);
    }

    #[test]
    fn sleep_waits_at_least_the_requested_time() {
        let clock = HighPrecisionClock::new();
        let t = clock.now();
        high_precision_sleep(Duration::from_millis(5));
        assert!(clock.elapsed(t) >= Duration::from_millis(5));
    }
}
