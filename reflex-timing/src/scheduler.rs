//! One-shot, cancellable delayed callbacks.
//!
//! A timer is either still pending, has fired, or was cancelled, and only
//! one of fire/cancel can move it out of pending. Schedulers never act on
//! the state machine themselves: they hand the [`TimerHandle`] back to the
//! owner, which decides whether the expiry still matters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::trace;

use crate::clock::high_precision_sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    Pending,
    Fired,
    Cancelled,
}

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

impl TimerStatus {
    fn from_raw(raw: u8) -> Self {
        match raw {
            PENDING => Self::Pending,
            FIRED => Self::Fired,
            _ => Self::Cancelled,
        }
    }
}

pub trait Scheduler {
    fn schedule(&mut self, delay: Duration) -> TimerHandle;

    /// Returns `true` only if this call stopped a pending timer. Cancelling
    /// a fired, already cancelled or unknown handle does nothing.
    fn cancel(&mut self, handle: TimerHandle) -> bool;
}

pub type TimerCallback = Arc<dyn Fn(TimerHandle) + Send + Sync>;

/// Runs each timer on its own sleeping thread and reports expiry through
/// a callback, typically a channel or event-loop proxy.
pub struct ThreadScheduler {
    callback: TimerCallback,
    next_id: u64,
    timers: HashMap<TimerHandle, Arc<AtomicU8>>,
}

impl ThreadScheduler {
    pub fn new(callback: TimerCallback) -> Self {
        Self {
            callback,
            next_id: 0,
            timers: HashMap::new(),
        }
    }

    pub fn status(&self, handle: TimerHandle) -> Option<TimerStatus> {
        self.timers
            .get(&handle)
            .map(|flag| TimerStatus::from_raw(flag.load(Ordering::Acquire)))
    }

    pub fn pending_count(&self) -> usize {
        self.timers
            .values()
            .filter(|flag| flag.load(Ordering::Acquire) == PENDING)
            .count()
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        // Settled timers are only kept around until the next schedule.
        self.timers.retain(|_, flag| flag.load(Ordering::Acquire) == PENDING);

        let handle = TimerHandle(self.next_id);
        self.next_id += 1;

        let flag = Arc::new(AtomicU8::new(PENDING));
        self.timers.insert(handle, Arc::clone(&flag));

        let callback = Arc::clone(&self.callback);
        thread::spawn(move || {
            high_precision_sleep(delay);
            if flag
                .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                trace!(timer = handle.0, "timer fired");
                callback(handle);
            }
        });

        trace!(timer = handle.0, delay_ms = delay.as_millis() as u64, "timer scheduled");
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        let Some(flag) = self.timers.get(&handle) else {
            return false;
        };
        let stopped = flag
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        trace!(timer = handle.0, stopped, "timer cancel");
        stopped
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        for flag in self.timers.values() {
            let _ = flag.compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManualTimer {
    pub handle: TimerHandle,
    pub delay: Duration,
    pub status: TimerStatus,
}

#[derive(Debug, Default)]
struct ManualInner {
    next_id: u64,
    timers: Vec<ManualTimer>,
}

/// Scheduler whose timers fire only when the caller says so. Clones share
/// the same timer table, so a test can keep one while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualInner>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut ManualInner) -> T) -> T {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut inner)
    }

    /// Marks a pending timer as fired. Returns `false` if it had already
    /// fired, was cancelled, or never existed.
    pub fn fire(&self, handle: TimerHandle) -> bool {
        self.with(|inner| {
            match inner
                .timers
                .iter_mut()
                .find(|t| t.handle == handle && t.status == TimerStatus::Pending)
            {
                Some(timer) => {
                    timer.status = TimerStatus::Fired;
                    true
                }
                None => false,
            }
        })
    }

    pub fn pending(&self) -> Vec<ManualTimer> {
        self.with(|inner| {
            inner
                .timers
                .iter()
                .filter(|t| t.status == TimerStatus::Pending)
                .cloned()
                .collect()
        })
    }

    pub fn status(&self, handle: TimerHandle) -> Option<TimerStatus> {
        self.with(|inner| {
            inner
                .timers
                .iter()
                .find(|t| t.handle == handle)
                .map(|t| t.status)
        })
    }

    /// Every timer ever scheduled, in scheduling order.
    pub fn history(&self) -> Vec<ManualTimer> {
        self.with(|inner| inner.timers.clone())
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        self.with(|inner| {
            let handle = TimerHandle(inner.next_id);
            inner.next_id += 1;
            inner.timers.push(ManualTimer {
                handle,
                delay,
                status: TimerStatus::Pending,
            });
            handle
        })
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.with(|inner| {
            match inner
                .timers
                .iter_mut()
                .find(|t| t.handle == handle && t.status == TimerStatus::Pending)
            {
                Some(timer) => {
                    timer.status = TimerStatus::Cancelled;
                    true
                }
                None => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn channel_scheduler() -> (ThreadScheduler, mpsc::Receiver<TimerHandle>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let scheduler = ThreadScheduler::new(Arc::new(move |handle: TimerHandle| {
            let _ = tx.lock().unwrap().send(handle);
        }));
        (scheduler, rx)
    }

    #[test]
    fn manual_fire_and_cancel_are_exclusive() {
        let mut s = ManualScheduler::new();
        let a = s.schedule(Duration::from_millis(2500));
        let b = s.schedule(Duration::from_millis(3000));
        assert_ne!(a, b);
        assert_eq!(s.pending().len(), 2);

        assert!(s.fire(a));
        assert!(!s.cancel(a));
        assert_eq!(s.status(a), Some(TimerStatus::Fired));

        assert!(s.cancel(b));
        assert!(!s.cancel(b));
        assert!(!s.fire(b));
        assert_eq!(s.status(b), Some(TimerStatus::Cancelled));
        assert!(s.pending().is_empty());
        assert_eq!(s.history().len(), 2);
    }

    #[test]
    fn manual_clones_share_timers() {
        let mut owned = ManualScheduler::new();
        let observer = owned.clone();
        let h = owned.schedule(Duration::from_secs(2));
        assert_eq!(observer.pending()[0].handle, h);
        assert_eq!(observer.pending()[0].delay, Duration::from_secs(2));
    }

    #[test]
    fn unknown_handle_cancel_is_noop() {
        let mut s = ManualScheduler::new();
        assert!(!s.cancel(TimerHandle(42)));
        let (mut t, _rx) = channel_scheduler();
        assert!(!t.cancel(TimerHandle(42)));
    }

    #[test]
    fn thread_timer_delivers_handle() {
        let (mut s, rx) = channel_scheduler();
        let h = s.schedule(Duration::from_millis(5));
        let got = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(got, h);
        assert_eq!(s.status(h), Some(TimerStatus::Fired));
        assert!(!s.cancel(h));
    }

    #[test]
    fn cancel_after_thread_timer_fired_loses() {
        let (mut s, rx) = channel_scheduler();
        let h = s.schedule(Duration::ZERO);
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), h);

        assert!(!s.cancel(h));
        assert!(!s.cancel(h));
        assert_eq!(s.status(h), Some(TimerStatus::Fired));
        assert_eq!(s.pending_count(), 0);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn cancelled_thread_timer_never_fires() {
        let (mut s, rx) = channel_scheduler();
        let h = s.schedule(Duration::from_millis(50));
        assert!(s.cancel(h));
        assert!(!s.cancel(h));
        assert_eq!(s.pending_count(), 0);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn drop_cancels_pending_timers() {
        let (mut s, rx) = channel_scheduler();
        s.schedule(Duration::from_millis(50));
        drop(s);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }
}
