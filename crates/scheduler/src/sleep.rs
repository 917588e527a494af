//! Wait conditions and the sleeping-job registry.
//!
//! A job that has nothing to do until some state changes suspends with
//! [`crate::Suspend::Sleep`] instead of spinning through a queue. The main
//! tick drain re-tests the stored conditions once per tick and moves jobs
//! whose condition no longer requests sleep back onto the worker queues.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::clock::TickClock;
use crate::job::BoxedJob;

/// Condition a sleeping job waits on.
///
/// `should_wait` models "should I keep sleeping": the job stays in the
/// registry while it returns `true` and becomes eligible to resume on the
/// first re-test where it returns `false`. Conditions are re-tested once
/// per main tick, so a condition that flips back and forth gets no
/// fairness guarantee; conditions are expected to become permanently
/// ready once ready.
///
/// Conditions must not call back into the scheduler that is polling them.
pub trait WaitCondition: Send {
    /// Returns `true` while the job should stay asleep.
    fn should_wait(&self) -> bool;
}

impl<F> WaitCondition for F
where
    F: Fn() -> bool + Send,
{
    fn should_wait(&self) -> bool {
        (self)()
    }
}

/// Wait condition that sleeps until a [`TickClock`] deadline passes.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use weft_scheduler::{SleepUntil, TickClock, WaitCondition};
///
/// let clock = TickClock::new();
/// let nap = SleepUntil::after(&clock, Duration::from_millis(100));
/// assert!(nap.should_wait());
///
/// clock.advance_to(Duration::from_millis(100));
/// assert!(!nap.should_wait());
/// ```
#[derive(Debug, Clone)]
pub struct SleepUntil {
    clock: TickClock,
    deadline: Duration,
}

impl SleepUntil {
    /// Sleep for a duration measured from the clock's current reading.
    pub fn after(clock: &TickClock, duration: Duration) -> Self {
        Self {
            clock: clock.clone(),
            deadline: clock.now() + duration,
        }
    }

    /// Sleep until the clock reaches an absolute elapsed-time deadline.
    pub fn at(clock: &TickClock, deadline: Duration) -> Self {
        Self {
            clock: clock.clone(),
            deadline,
        }
    }

    /// The deadline this condition waits for.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

impl WaitCondition for SleepUntil {
    fn should_wait(&self) -> bool {
        self.clock.now() < self.deadline
    }
}

struct SleepingJob {
    job: BoxedJob,
    condition: Box<dyn WaitCondition>,
}

/// Holding area for jobs waiting on a condition rather than a queue slot.
///
/// Entries keep registration order. The drain protocol releases entries
/// from the front while their condition no longer requests sleep and stops
/// at the first entry that still does; that entry goes back to the front,
/// so a long sleeper blocks release of everything registered behind it
/// until it wakes. A condition that never becomes ready leaves its job
/// sleeping indefinitely; the registry never treats that as an error.
pub(crate) struct SleepRegistry {
    entries: Mutex<VecDeque<SleepingJob>>,
}

impl SleepRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn register(&self, job: BoxedJob, condition: Box<dyn WaitCondition>) {
        self.entries
            .lock()
            .unwrap()
            .push_back(SleepingJob { job, condition });
    }

    /// Release ready entries from the front, stopping at the first entry
    /// that still wants to sleep.
    pub(crate) fn take_ready(&self) -> Vec<BoxedJob> {
        let mut entries = self.entries.lock().unwrap();
        let mut ready = Vec::new();
        while let Some(entry) = entries.pop_front() {
            if entry.condition.should_wait() {
                entries.push_front(entry);
                break;
            }
            ready.push(entry.job);
        }
        ready
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
