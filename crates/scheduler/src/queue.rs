//! Synchronized job queues and the shared wake signal.
//!
//! Every queue in a scheduler instance (one per worker plus the main queue)
//! shares a single wake signal: any enqueue notifies every waiting worker.
//! There is no per-queue granularity, so workers must tolerate waking with
//! nothing to do, and waits are always bounded so a missed signal only
//! costs one poll interval.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::job::BoxedJob;

/// Shared wake condition for the whole scheduler instance.
pub(crate) struct WakeSignal {
    lock: Mutex<()>,
    work_ready: Condvar,
}

impl WakeSignal {
    pub(crate) fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            work_ready: Condvar::new(),
        }
    }

    /// Wake every thread blocked in [`WakeSignal::wait_timeout`].
    pub(crate) fn notify_all(&self) {
        self.work_ready.notify_all();
    }

    /// Block until notified or until the timeout elapses.
    ///
    /// Spurious wakeups and missed signals are expected; callers loop back
    /// to searching for work either way.
    pub(crate) fn wait_timeout(&self, timeout: Duration) {
        let guard = self.lock.lock().unwrap();
        let _ = self.work_ready.wait_timeout(guard, timeout).unwrap();
    }
}

/// Thread-safe FIFO of pending jobs.
///
/// `len` is a load heuristic only: it is accurate at the instant the lock
/// is held but may be stale by the time a placement decision acts on it,
/// which the placement heuristic tolerates.
pub(crate) struct JobQueue {
    jobs: Mutex<VecDeque<BoxedJob>>,
    wake: Arc<WakeSignal>,
}

impl JobQueue {
    pub(crate) fn new(wake: Arc<WakeSignal>) -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            wake,
        }
    }

    /// Append a job and signal the wake condition.
    pub(crate) fn push(&self, job: BoxedJob) {
        self.jobs.lock().unwrap().push_back(job);
        self.wake.notify_all();
    }

    /// Pop the front job without blocking.
    pub(crate) fn try_pop(&self) -> Option<BoxedJob> {
        self.jobs.lock().unwrap().pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{job_fn, Step};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Instant;

    fn marker_job(slot: Arc<AtomicUsize>, value: usize) -> BoxedJob {
        job_fn(move || {
            slot.store(value, Ordering::SeqCst);
            Ok(Step::Complete)
        })
    }

    #[test]
    fn test_queue_is_fifo() {
        let queue = JobQueue::new(Arc::new(WakeSignal::new()));
        let slot = Arc::new(AtomicUsize::new(0));

        queue.push(marker_job(slot.clone(), 1));
        queue.push(marker_job(slot.clone(), 2));

        let mut first = queue.try_pop().expect("first job");
        first.advance().unwrap();
        assert_eq!(slot.load(Ordering::SeqCst), 1);

        let mut second = queue.try_pop().expect("second job");
        second.advance().unwrap();
        assert_eq!(slot.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_try_pop_empty_returns_none() {
        let queue = JobQueue::new(Arc::new(WakeSignal::new()));
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn test_len_tracks_contents() {
        let queue = JobQueue::new(Arc::new(WakeSignal::new()));
        assert!(queue.is_empty());

        let slot = Arc::new(AtomicUsize::new(0));
        queue.push(marker_job(slot.clone(), 1));
        queue.push(marker_job(slot, 2));
        assert_eq!(queue.len(), 2);

        queue.try_pop();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_wait_timeout_expires() {
        let wake = WakeSignal::new();
        let start = Instant::now();
        wake.wait_timeout(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_push_wakes_waiter() {
        let wake = Arc::new(WakeSignal::new());
        let queue = Arc::new(JobQueue::new(wake.clone()));

        let waiter = {
            let wake = wake.clone();
            thread::spawn(move || {
                let start = Instant::now();
                wake.wait_timeout(Duration::from_secs(5));
                start.elapsed()
            })
        };

        // Give the waiter time to block before signalling.
        thread::sleep(Duration::from_millis(50));
        let slot = Arc::new(AtomicUsize::new(0));
        queue.push(marker_job(slot, 1));

        let waited = waiter.join().unwrap();
        assert!(waited < Duration::from_secs(2));
    }
}
