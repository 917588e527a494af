//! Weft Scheduler Library
//!
//! Cooperative job scheduler for tick-driven hosts.
//!
//! Long-running, logically sequential work is written as a suspendable job
//! that alternates between main-context-only steps (touching state that is
//! not safe to access concurrently) and worker-parallel computation. A job
//! suspends with a [`Suspend`] token naming where it should run next; the
//! scheduler moves it between one host-driven main queue and a pool of
//! worker queues with least-loaded placement and work stealing. Jobs can
//! also sleep on a [`WaitCondition`] until the host's [`TickClock`] or any
//! other predicate says they are ready.
//!
//! The host drives the main context explicitly: once per tick it calls
//! [`Scheduler::drain_tick`], which wakes ready sleepers and runs jobs on
//! the calling thread until no runnable work remains.
//!
//! # Example
//!
//! ```
//! use weft_scheduler::{job_fn, Scheduler, SchedulerConfig, Step, Suspend};
//!
//! let scheduler = Scheduler::with_config(SchedulerConfig::new(2));
//!
//! let mut phase = 0;
//! scheduler.submit(job_fn(move || {
//!     phase += 1;
//!     Ok(match phase {
//!         // First step runs off the main context: crunch numbers, then
//!         // ask to publish the result where host state is safe to touch.
//!         1 => Step::Suspend(Suspend::ToMain),
//!         _ => Step::Complete,
//!     })
//! }));
//!
//! // One host tick; returns once all runnable work is done.
//! scheduler.drain_tick();
//! scheduler.shutdown();
//! ```

mod clock;
mod fault;
mod job;
mod queue;
mod runner;
mod scheduler;
mod sleep;
mod worker;

pub use clock::TickClock;
pub use fault::{ExecutionContext, FaultSink, JobFault, TraceFaultSink};
pub use job::{job_fn, BoxedJob, Job, JobError, Step, Suspend};
pub use scheduler::{
    Scheduler, SchedulerConfig, SchedulerStats, DEFAULT_POLL_INTERVAL, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use sleep::{SleepUntil, WaitCondition};
