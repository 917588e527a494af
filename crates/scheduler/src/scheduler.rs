//! Scheduler configuration, shared state, and the per-tick facade.
//!
//! A [`Scheduler`] is an explicit context object: all queues, the sleeping
//! registry, and the worker pool hang off one instance, so independent
//! schedulers (one per tick rate, or one per test) can coexist in a
//! process.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::clock::TickClock;
use crate::fault::{ExecutionContext, FaultSink, JobFault, TraceFaultSink};
use crate::job::BoxedJob;
use crate::queue::{JobQueue, WakeSignal};
use crate::runner::run_job;
use crate::sleep::{SleepRegistry, WaitCondition};
use crate::worker::Worker;

/// Default bounded wait used by idle workers between work searches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default bounded join window granted to each worker at shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for a scheduler instance.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of worker threads to spawn.
    /// Default: available parallelism minus one, reserving one unit for
    /// the host's tick thread. Zero is allowed; every job then runs on the
    /// main context.
    pub worker_count: usize,

    /// Maximum time an idle worker waits for the wake signal before
    /// re-checking for work and shutdown. Default: 100ms.
    pub poll_interval: Duration,

    /// Maximum time `shutdown` waits for each worker to stop before
    /// abandoning its thread. Default: 1s.
    pub shutdown_timeout: Duration,

    /// Abort the process after reporting a job fault. Default: true, the
    /// halt-for-inspection debugging policy; production deployments should
    /// disable this so one bad job cannot stop the whole process.
    pub halt_on_fault: bool,

    /// Clock that deadline-based wait conditions read. Supply a shared
    /// handle to keep several schedulers on one time source.
    pub clock: TickClock,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            halt_on_fault: true,
            clock: TickClock::new(),
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration with an explicit worker count.
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }

    /// Set the idle-worker poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the per-worker shutdown join window.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Enable or disable halting the process on a job fault.
    pub fn with_halt_on_fault(mut self, halt: bool) -> Self {
        self.halt_on_fault = halt;
        self
    }

    /// Use a shared tick clock.
    pub fn with_clock(mut self, clock: TickClock) -> Self {
        self.clock = clock;
        self
    }
}

/// Default worker count: available parallelism minus one.
fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .saturating_sub(1)
        .max(1)
}

/// Scheduler counters and current occupancy.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    /// Jobs handed to the scheduler since construction.
    pub jobs_submitted: u64,

    /// Jobs that ran to completion.
    pub jobs_completed: u64,

    /// Jobs dropped after a fault.
    pub jobs_faulted: u64,

    /// Jobs that deliberately stopped scheduling without completing.
    pub jobs_parked: u64,

    /// Jobs currently sitting in the main or worker queues.
    pub queued_jobs: usize,

    /// Jobs currently in the sleeping registry.
    pub sleeping_jobs: usize,
}

/// Shared state of one scheduler instance.
pub(crate) struct Core {
    main_queue: JobQueue,
    worker_queues: Vec<JobQueue>,
    sleeping: SleepRegistry,
    wake: Arc<WakeSignal>,
    running: AtomicBool,
    busy_workers: AtomicUsize,
    clock: TickClock,
    fault_sink: Box<dyn FaultSink>,
    halt_on_fault: bool,
    submitted: AtomicU64,
    completed: AtomicU64,
    faulted: AtomicU64,
    parked: AtomicU64,
}

impl Core {
    pub(crate) fn new(config: &SchedulerConfig, fault_sink: Box<dyn FaultSink>) -> Self {
        let wake = Arc::new(WakeSignal::new());
        let worker_queues = (0..config.worker_count)
            .map(|_| JobQueue::new(wake.clone()))
            .collect();

        Self {
            main_queue: JobQueue::new(wake.clone()),
            worker_queues,
            sleeping: SleepRegistry::new(),
            wake,
            running: AtomicBool::new(true),
            busy_workers: AtomicUsize::new(0),
            clock: config.clock.clone(),
            fault_sink,
            halt_on_fault: config.halt_on_fault,
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            faulted: AtomicU64::new(0),
            parked: AtomicU64::new(0),
        }
    }

    /// The queue owning jobs that run on the given context.
    pub(crate) fn queue(&self, context: ExecutionContext) -> &JobQueue {
        match context {
            ExecutionContext::Main => &self.main_queue,
            ExecutionContext::Worker(index) => &self.worker_queues[index],
        }
    }

    /// Place a job on the least-loaded worker queue.
    ///
    /// Scans worker queues in index order, short-circuiting on the first
    /// empty one; ties go to the lowest index. The scan does not reserve
    /// capacity, so two concurrent placements may pick the same queue and
    /// leave it momentarily imbalanced; the next placement corrects it.
    /// With no workers at all the job falls back onto the main queue.
    pub(crate) fn place_on_worker(&self, job: BoxedJob) {
        let mut best: Option<(usize, usize)> = None;
        for (index, queue) in self.worker_queues.iter().enumerate() {
            let len = queue.len();
            if len == 0 {
                best = Some((index, 0));
                break;
            }
            if best.is_none_or(|(_, best_len)| len < best_len) {
                best = Some((index, len));
            }
        }

        match best {
            Some((index, _)) => self.worker_queues[index].push(job),
            None => self.main_queue.push(job),
        }
    }

    /// Find a pending job, preferring the caller's own queue.
    ///
    /// With `own_index` set, that worker's queue is tried first and the
    /// remaining worker queues are scanned in index order (work stealing).
    /// With `None` (the main drain path) every worker queue is scanned in
    /// index order.
    pub(crate) fn find_work(&self, own_index: Option<usize>) -> Option<BoxedJob> {
        if let Some(index) = own_index {
            if let Some(job) = self.worker_queues[index].try_pop() {
                return Some(job);
            }
        }

        for (index, queue) in self.worker_queues.iter().enumerate() {
            if Some(index) == own_index {
                continue;
            }
            if let Some(job) = queue.try_pop() {
                return Some(job);
            }
        }
        None
    }

    /// Whether any work is in flight or queued.
    ///
    /// A non-empty worker queue re-signals the wake condition so a worker
    /// is guaranteed to notice it.
    pub(crate) fn has_pending_work(&self) -> bool {
        if self.busy_workers.load(Ordering::Acquire) > 0 {
            return true;
        }
        if !self.main_queue.is_empty() {
            return true;
        }
        if self.worker_queues.iter().any(|queue| !queue.is_empty()) {
            self.wake.notify_all();
            return true;
        }
        false
    }

    pub(crate) fn register_sleeper(&self, job: BoxedJob, condition: Box<dyn WaitCondition>) {
        self.sleeping.register(job, condition);
    }

    pub(crate) fn take_ready_sleepers(&self) -> Vec<BoxedJob> {
        self.sleeping.take_ready()
    }

    pub(crate) fn report_fault(&self, fault: JobFault) {
        self.faulted.fetch_add(1, Ordering::Relaxed);
        self.fault_sink.report(&fault);
        if self.halt_on_fault {
            std::process::abort();
        }
    }

    pub(crate) fn note_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_parked(&self) {
        self.parked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
        self.wake.notify_all();
    }

    pub(crate) fn mark_busy(&self) {
        self.busy_workers.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn mark_idle(&self) {
        self.busy_workers.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn wait_for_work(&self, timeout: Duration) {
        self.wake.wait_timeout(timeout);
    }

    fn stats(&self) -> SchedulerStats {
        let queued_jobs = self.main_queue.len()
            + self
                .worker_queues
                .iter()
                .map(|queue| queue.len())
                .sum::<usize>();

        SchedulerStats {
            jobs_submitted: self.submitted.load(Ordering::Relaxed),
            jobs_completed: self.completed.load(Ordering::Relaxed),
            jobs_faulted: self.faulted.load(Ordering::Relaxed),
            jobs_parked: self.parked.load(Ordering::Relaxed),
            queued_jobs,
            sleeping_jobs: self.sleeping.len(),
        }
    }
}

/// Cooperative job scheduler: a worker pool plus one host-driven main
/// context.
///
/// Jobs suspend with [`crate::Suspend`] tokens to move between the worker
/// queues and the main queue; the host calls [`Scheduler::drain_tick`] once
/// per tick to run everything that is due on the main context and to wake
/// sleeping jobs whose condition has become ready.
///
/// # Example
///
/// ```
/// use weft_scheduler::{job_fn, Scheduler, SchedulerConfig, Step, Suspend};
///
/// let scheduler = Scheduler::with_config(SchedulerConfig::new(2));
///
/// let mut phase = 0;
/// scheduler.submit(job_fn(move || {
///     phase += 1;
///     Ok(match phase {
///         // Heavy computation happened on a worker; now touch host
///         // state on the main context.
///         1 => Step::Suspend(Suspend::ToMain),
///         _ => Step::Complete,
///     })
/// }));
///
/// // One host tick: returns once no runnable work remains.
/// scheduler.drain_tick();
/// assert_eq!(scheduler.stats().jobs_completed, 1);
///
/// scheduler.shutdown();
/// ```
pub struct Scheduler {
    core: Arc<Core>,
    workers: Vec<Worker>,
    shutdown_timeout: Duration,
}

impl Scheduler {
    /// Create a scheduler with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a scheduler with the given configuration and the default
    /// `tracing`-backed fault sink.
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self::with_fault_sink(config, Box::new(TraceFaultSink))
    }

    /// Create a scheduler that reports job faults to a host-supplied sink.
    pub fn with_fault_sink(config: SchedulerConfig, fault_sink: Box<dyn FaultSink>) -> Self {
        let core = Arc::new(Core::new(&config, fault_sink));
        let workers = (0..config.worker_count)
            .map(|index| Worker::spawn(index, core.clone(), config.poll_interval))
            .collect();

        Self {
            core,
            workers,
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    /// Submit a job, placing it on the least-loaded worker queue.
    pub fn submit(&self, job: BoxedJob) {
        self.core.submitted.fetch_add(1, Ordering::Relaxed);
        self.core.place_on_worker(job);
    }

    /// Submit a job directly onto the main queue, so its first step runs
    /// on the main context during a tick drain.
    pub fn submit_to_main(&self, job: BoxedJob) {
        self.core.submitted.fetch_add(1, Ordering::Relaxed);
        self.core.queue(ExecutionContext::Main).push(job);
    }

    /// Drain one host tick on the calling thread.
    ///
    /// First wakes every sleeping job whose condition has become ready
    /// (front-to-back, stopping at the first still-sleeping entry) and
    /// places them for worker execution. Then runs jobs until no work
    /// remains: main-queue jobs take priority, otherwise one job is stolen
    /// from the worker queues and run on the main context. The call only
    /// returns once every currently known job has completed, faulted, or
    /// moved into a container that this tick does not drain.
    pub fn drain_tick(&self) {
        for job in self.core.take_ready_sleepers() {
            self.core.place_on_worker(job);
        }

        while self.core.has_pending_work() {
            if let Some(job) = self.core.queue(ExecutionContext::Main).try_pop() {
                run_job(&self.core, job, ExecutionContext::Main);
            } else if let Some(job) = self.core.find_work(None) {
                run_job(&self.core, job, ExecutionContext::Main);
            } else {
                // Everything left is in flight on a worker; let it land.
                thread::yield_now();
            }
        }
    }

    /// Whether any worker is busy or any queue holds a job.
    pub fn has_pending_work(&self) -> bool {
        self.core.has_pending_work()
    }

    /// Handle to the clock wait conditions read.
    pub fn clock(&self) -> TickClock {
        self.core.clock.clone()
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Snapshot of counters and queue occupancy.
    pub fn stats(&self) -> SchedulerStats {
        self.core.stats()
    }

    /// Stop the worker pool.
    ///
    /// Flips the running flag, wakes every worker, and joins each thread
    /// within the configured timeout. A worker that does not stop in time
    /// is abandoned and any job it held is lost; this is a best-effort
    /// teardown, not a graceful-completion guarantee.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if self.core.is_running() {
            self.core.request_stop();
        }
        for worker in self.workers.drain(..) {
            worker.join_within(self.shutdown_timeout);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}
