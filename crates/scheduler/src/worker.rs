//! Worker thread lifecycle.
//!
//! Each worker owns one queue and loops: search for work (own queue first,
//! then steal from the others), run the job bound to its own queue, and
//! block on the shared wake signal with a bounded timeout when nothing is
//! pending. The bounded wait means a missed wake signal or a shutdown
//! request is noticed within one poll interval.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::fault::ExecutionContext;
use crate::runner::run_job;
use crate::scheduler::Core;

/// A single worker thread in the pool.
pub(crate) struct Worker {
    index: usize,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a worker bound to the queue at `index`.
    pub(crate) fn spawn(index: usize, core: Arc<Core>, poll_interval: Duration) -> Self {
        let thread = thread::Builder::new()
            .name(format!("weft-worker-{index}"))
            .spawn(move || run(index, core, poll_interval))
            .expect("failed to spawn worker thread");

        Self {
            index,
            thread: Some(thread),
        }
    }

    /// Join the worker within the timeout.
    ///
    /// A worker that does not stop in time is abandoned: the handle is
    /// dropped, the thread is left detached, and any job it held is lost.
    /// Returns `false` when the worker was abandoned.
    pub(crate) fn join_within(mut self, timeout: Duration) -> bool {
        let Some(handle) = self.thread.take() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(
                    worker = self.index,
                    "worker did not stop within the shutdown timeout; abandoning thread"
                );
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }

        if handle.join().is_err() {
            // Job panics are caught by the runner; anything arriving here
            // escaped outside a job body.
            warn!(worker = self.index, "worker thread panicked outside a job");
        }
        true
    }
}

fn run(index: usize, core: Arc<Core>, poll_interval: Duration) {
    debug!(worker = index, "worker started");

    while core.is_running() {
        core.mark_busy();
        match core.find_work(Some(index)) {
            Some(job) => {
                run_job(&core, job, ExecutionContext::Worker(index));
                core.mark_idle();
            }
            None => {
                core.mark_idle();
                core.wait_for_work(poll_interval);
            }
        }
    }

    debug!(worker = index, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::TraceFaultSink;
    use crate::job::{job_fn, Step};
    use crate::scheduler::SchedulerConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn idle_core() -> Arc<Core> {
        let config = SchedulerConfig::new(1)
            .with_halt_on_fault(false)
            .with_poll_interval(Duration::from_millis(5));
        Arc::new(Core::new(&config, Box::new(TraceFaultSink)))
    }

    #[test]
    fn test_worker_runs_queued_job() {
        let core = idle_core();
        let worker = Worker::spawn(0, core.clone(), Duration::from_millis(5));

        let ran = Arc::new(AtomicUsize::new(0));
        let probe = ran.clone();
        core.queue(ExecutionContext::Worker(0)).push(job_fn(move || {
            probe.fetch_add(1, Ordering::SeqCst);
            Ok(Step::Complete)
        }));

        let deadline = Instant::now() + Duration::from_secs(5);
        while ran.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        core.request_stop();
        assert!(worker.join_within(Duration::from_secs(1)));
    }

    #[test]
    fn test_idle_worker_stops_promptly() {
        let core = idle_core();
        let worker = Worker::spawn(0, core.clone(), Duration::from_millis(5));

        core.request_stop();

        let start = Instant::now();
        assert!(worker.join_within(Duration::from_secs(1)));
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_stuck_worker_is_abandoned() {
        let core = idle_core();
        let worker = Worker::spawn(0, core.clone(), Duration::from_millis(5));

        core.queue(ExecutionContext::Worker(0)).push(job_fn(|| {
            thread::sleep(Duration::from_millis(600));
            Ok(Step::Complete)
        }));

        // Let the worker pick the job up before asking it to stop.
        thread::sleep(Duration::from_millis(100));
        core.request_stop();

        let start = Instant::now();
        assert!(!worker.join_within(Duration::from_millis(50)));
        assert!(start.elapsed() < Duration::from_millis(400));
    }
}
