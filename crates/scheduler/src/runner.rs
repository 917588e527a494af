//! Job runner: advances a job and interprets its suspension tokens.
//!
//! One `run_job` call performs at most one placement action. The job is
//! advanced until it completes, faults, or produces a token that moves it
//! somewhere; after the move the job is not advanced again within the same
//! call. Tokens that request the context the job is already on (`ToMain`
//! on the main context, `ToWorker` on a worker) are no-ops and the job
//! keeps advancing.

use std::panic::{self, AssertUnwindSafe};

use crate::fault::{ExecutionContext, JobFault};
use crate::job::{BoxedJob, Step, Suspend};
use crate::scheduler::Core;

/// Resume a job on the given execution context until it suspends away,
/// completes, or faults.
///
/// No scheduler lock is held while the job body runs; queues and the
/// sleeping registry are only locked to move the job afterwards.
pub(crate) fn run_job(core: &Core, mut job: BoxedJob, context: ExecutionContext) {
    loop {
        let step = match panic::catch_unwind(AssertUnwindSafe(|| job.advance())) {
            Ok(Ok(step)) => step,
            Ok(Err(error)) => {
                core.report_fault(JobFault::Failed {
                    context,
                    source: error,
                });
                return;
            }
            Err(payload) => {
                core.report_fault(JobFault::from_panic(context, payload));
                return;
            }
        };

        match step {
            Step::Complete => {
                core.note_completed();
                return;
            }
            Step::Suspend(Suspend::Yield) => {
                core.queue(context).push(job);
                return;
            }
            Step::Suspend(Suspend::ToMain) => {
                if context == ExecutionContext::Main {
                    continue;
                }
                core.queue(ExecutionContext::Main).push(job);
                return;
            }
            Step::Suspend(Suspend::ToWorker) => {
                if matches!(context, ExecutionContext::Worker(_)) {
                    continue;
                }
                core.place_on_worker(job);
                return;
            }
            Step::Suspend(Suspend::Sleep(condition)) => {
                core.register_sleeper(job, condition);
                return;
            }
            Step::Suspend(Suspend::Park) => {
                core.note_parked();
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultSink;
    use crate::job::{job_fn, JobError};
    use crate::scheduler::SchedulerConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct CollectingSink {
        faults: Mutex<Vec<String>>,
    }

    impl CollectingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                faults: Mutex::new(Vec::new()),
            })
        }
    }

    impl FaultSink for Arc<CollectingSink> {
        fn report(&self, fault: &JobFault) {
            self.faults.lock().unwrap().push(fault.to_string());
        }
    }

    fn test_core(worker_count: usize) -> (Core, Arc<CollectingSink>) {
        let sink = CollectingSink::new();
        let config = SchedulerConfig::new(worker_count).with_halt_on_fault(false);
        (Core::new(&config, Box::new(sink.clone())), sink)
    }

    fn script(steps: Vec<Step>) -> (BoxedJob, Arc<AtomicUsize>) {
        let advanced = Arc::new(AtomicUsize::new(0));
        let counter = advanced.clone();
        let mut steps = steps.into_iter();
        let job = job_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(steps.next().unwrap_or(Step::Complete))
        });
        (job, advanced)
    }

    #[test]
    fn test_complete_discards_job() {
        let (core, _) = test_core(1);
        let (job, advanced) = script(vec![Step::Complete]);

        run_job(&core, job, ExecutionContext::Worker(0));

        assert_eq!(advanced.load(Ordering::SeqCst), 1);
        assert!(!core.has_pending_work());
    }

    #[test]
    fn test_yield_requeues_on_owning_queue() {
        let (core, _) = test_core(2);
        let (job, advanced) = script(vec![Step::Suspend(Suspend::Yield)]);

        run_job(&core, job, ExecutionContext::Worker(1));

        // One step only; the job sits on its own queue again.
        assert_eq!(advanced.load(Ordering::SeqCst), 1);
        assert_eq!(core.queue(ExecutionContext::Worker(1)).len(), 1);
        assert_eq!(core.queue(ExecutionContext::Worker(0)).len(), 0);
    }

    #[test]
    fn test_yield_on_main_requeues_on_main() {
        let (core, _) = test_core(1);
        let (job, _) = script(vec![Step::Suspend(Suspend::Yield)]);

        run_job(&core, job, ExecutionContext::Main);
        assert_eq!(core.queue(ExecutionContext::Main).len(), 1);
    }

    #[test]
    fn test_to_main_migrates_from_worker() {
        let (core, _) = test_core(1);
        let (job, advanced) = script(vec![Step::Suspend(Suspend::ToMain)]);

        run_job(&core, job, ExecutionContext::Worker(0));

        assert_eq!(advanced.load(Ordering::SeqCst), 1);
        assert_eq!(core.queue(ExecutionContext::Main).len(), 1);
        assert_eq!(core.queue(ExecutionContext::Worker(0)).len(), 0);
    }

    #[test]
    fn test_to_main_on_main_keeps_advancing() {
        let (core, _) = test_core(1);
        let (job, advanced) = script(vec![
            Step::Suspend(Suspend::ToMain),
            Step::Suspend(Suspend::ToMain),
            Step::Complete,
        ]);

        run_job(&core, job, ExecutionContext::Main);

        // All three steps ran within one call; nothing was requeued.
        assert_eq!(advanced.load(Ordering::SeqCst), 3);
        assert_eq!(core.queue(ExecutionContext::Main).len(), 0);
    }

    #[test]
    fn test_to_worker_migrates_from_main() {
        let (core, _) = test_core(2);
        let (job, _) = script(vec![Step::Suspend(Suspend::ToWorker)]);

        run_job(&core, job, ExecutionContext::Main);

        let queued: usize = (0..2)
            .map(|index| core.queue(ExecutionContext::Worker(index)).len())
            .sum();
        assert_eq!(queued, 1);
        assert_eq!(core.queue(ExecutionContext::Main).len(), 0);
    }

    #[test]
    fn test_to_worker_on_worker_keeps_advancing() {
        let (core, _) = test_core(1);
        let (job, advanced) = script(vec![Step::Suspend(Suspend::ToWorker), Step::Complete]);

        run_job(&core, job, ExecutionContext::Worker(0));

        assert_eq!(advanced.load(Ordering::SeqCst), 2);
        assert_eq!(core.queue(ExecutionContext::Worker(0)).len(), 0);
    }

    #[test]
    fn test_sleep_registers_even_when_already_ready() {
        let (core, _) = test_core(1);
        let job = job_fn(|| Ok(Step::Suspend(Suspend::sleep(|| false))));

        run_job(&core, job, ExecutionContext::Worker(0));

        // The condition is already ready, but the job still takes the trip
        // through the registry and comes back on the next drain.
        assert_eq!(core.take_ready_sleepers().len(), 1);
    }

    #[test]
    fn test_park_drops_job_without_completion() {
        let (core, _) = test_core(1);
        let (job, advanced) = script(vec![Step::Suspend(Suspend::Park)]);

        run_job(&core, job, ExecutionContext::Worker(0));

        assert_eq!(advanced.load(Ordering::SeqCst), 1);
        assert!(!core.has_pending_work());
        assert!(core.take_ready_sleepers().is_empty());
    }

    #[test]
    fn test_error_faults_job() {
        let (core, sink) = test_core(1);
        let job = job_fn(|| -> Result<Step, JobError> { Err("torn buffer".into()) });

        run_job(&core, job, ExecutionContext::Worker(0));

        let faults = sink.faults.lock().unwrap();
        assert_eq!(faults.len(), 1);
        assert!(faults[0].contains("torn buffer"));
        assert!(faults[0].contains("worker 0"));
    }

    #[test]
    fn test_panic_faults_job() {
        let (core, sink) = test_core(1);
        let job = job_fn(|| panic!("subscript out of range"));

        run_job(&core, job, ExecutionContext::Main);

        let faults = sink.faults.lock().unwrap();
        assert_eq!(faults.len(), 1);
        assert!(faults[0].contains("subscript out of range"));
        assert!(faults[0].contains("main context"));
    }

    #[test]
    fn test_faulted_job_is_not_requeued() {
        let (core, _) = test_core(1);
        let job = job_fn(|| -> Result<Step, JobError> { Err("gone".into()) });

        run_job(&core, job, ExecutionContext::Worker(0));
        assert!(!core.has_pending_work());
    }
}
