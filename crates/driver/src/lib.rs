//! Weft Driver Library
//!
//! Host-side driving layer for the weft scheduler: producer registration
//! and the per-tick protocol.
//!
//! A host application registers [`JobProducer`]s once and then calls
//! [`JobDriver::run_update_tick`] from its normal tick (and, if it runs a
//! second fixed-rate tick, [`JobDriver::run_fixed_tick`]). Each tick call
//! refreshes the shared clock with the host's elapsed time, collects one
//! fresh job from every willing producer, places the jobs via least-loaded
//! worker placement, and drains the tick to completion on the calling
//! thread.
//!
//! The two tick rates run on independent schedulers (separate main
//! queues, sleeping registries, and worker pools), so their jobs never
//! interleave. Both read the same [`TickClock`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use weft_driver::{DriverConfig, JobDriver, JobProducer};
//! use weft_scheduler::{job_fn, BoxedJob, SchedulerConfig, Step};
//!
//! struct Heartbeat;
//!
//! impl JobProducer for Heartbeat {
//!     fn update_job(&mut self) -> Option<BoxedJob> {
//!         Some(job_fn(|| Ok(Step::Complete)))
//!     }
//! }
//!
//! let mut driver = JobDriver::with_config(
//!     DriverConfig::new().with_update(SchedulerConfig::new(1)),
//! );
//! driver.register(Box::new(Heartbeat));
//!
//! // Host tick at t = 16ms.
//! driver.run_update_tick(Duration::from_millis(16));
//! driver.shutdown();
//! ```

use std::time::Duration;

use tracing::warn;

use weft_scheduler::{BoxedJob, Scheduler, SchedulerConfig, TickClock};

/// Source of per-tick jobs.
///
/// Once per tick the driver asks each registered producer for a fresh job;
/// returning `None` skips this tick. The default implementations never
/// produce, so a producer only overrides the tick kinds it cares about.
pub trait JobProducer: Send {
    /// Job to schedule for the current normal tick, if any.
    fn update_job(&mut self) -> Option<BoxedJob> {
        None
    }

    /// Job to schedule for the current fixed tick, if any.
    fn fixed_job(&mut self) -> Option<BoxedJob> {
        None
    }
}

/// Handle identifying a registered producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProducerId(u64);

/// Configuration for a [`JobDriver`].
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Scheduler for the normal tick rate.
    pub update: SchedulerConfig,

    /// Scheduler for the fixed tick rate; `None` when the host has a
    /// single tick rate.
    pub fixed: Option<SchedulerConfig>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            update: SchedulerConfig::default(),
            fixed: None,
        }
    }
}

impl DriverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the normal-tick scheduler.
    pub fn with_update(mut self, config: SchedulerConfig) -> Self {
        self.update = config;
        self
    }

    /// Enable a fixed-rate tick lane with its own scheduler.
    pub fn with_fixed_tick(mut self, config: SchedulerConfig) -> Self {
        self.fixed = Some(config);
        self
    }
}

/// Drives registered producers through the host's tick loop.
///
/// Owns one scheduler per configured tick rate. The driver lives on the
/// host's tick thread; that thread is the main context of both schedulers.
pub struct JobDriver {
    clock: TickClock,
    update: Scheduler,
    fixed: Option<Scheduler>,
    producers: Vec<(ProducerId, Box<dyn JobProducer>)>,
    next_id: u64,
}

impl JobDriver {
    /// Create a driver with default configuration (single tick rate).
    pub fn new() -> Self {
        Self::with_config(DriverConfig::default())
    }

    /// Create a driver from a configuration.
    ///
    /// The fixed-tick scheduler, when configured, is re-pointed at the
    /// update scheduler's clock so both lanes share one time source.
    pub fn with_config(config: DriverConfig) -> Self {
        let clock = config.update.clock.clone();
        let update = Scheduler::with_config(config.update);
        let fixed = config
            .fixed
            .map(|fixed| Scheduler::with_config(fixed.with_clock(clock.clone())));

        Self {
            clock,
            update,
            fixed,
            producers: Vec::new(),
            next_id: 0,
        }
    }

    /// Register a producer; it is polled on every subsequent tick.
    pub fn register(&mut self, producer: Box<dyn JobProducer>) -> ProducerId {
        let id = ProducerId(self.next_id);
        self.next_id += 1;
        self.producers.push((id, producer));
        id
    }

    /// Remove a producer. Returns `false` if the id is unknown.
    pub fn unregister(&mut self, id: ProducerId) -> bool {
        let before = self.producers.len();
        self.producers.retain(|(pid, _)| *pid != id);
        self.producers.len() != before
    }

    /// Number of registered producers.
    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    /// Run one normal tick.
    ///
    /// Refreshes the clock to the host's elapsed-time reading, collects a
    /// job from every willing producer, and drains the update scheduler to
    /// completion on the calling thread.
    pub fn run_update_tick(&mut self, elapsed: Duration) {
        self.clock.advance_to(elapsed);
        for (_, producer) in &mut self.producers {
            if let Some(job) = producer.update_job() {
                self.update.submit(job);
            }
        }
        self.update.drain_tick();
    }

    /// Run one fixed tick on the fixed-rate lane.
    pub fn run_fixed_tick(&mut self, elapsed: Duration) {
        self.clock.advance_to(elapsed);
        let Some(fixed) = &self.fixed else {
            warn!("fixed tick requested but no fixed tick lane is configured");
            return;
        };
        for (_, producer) in &mut self.producers {
            if let Some(job) = producer.fixed_job() {
                fixed.submit(job);
            }
        }
        fixed.drain_tick();
    }

    /// The clock both tick lanes read.
    pub fn clock(&self) -> TickClock {
        self.clock.clone()
    }

    /// Scheduler backing the normal tick rate.
    pub fn update_scheduler(&self) -> &Scheduler {
        &self.update
    }

    /// Scheduler backing the fixed tick rate, when configured.
    pub fn fixed_scheduler(&self) -> Option<&Scheduler> {
        self.fixed.as_ref()
    }

    /// Tear down both schedulers' worker pools.
    pub fn shutdown(self) {
        self.update.shutdown();
        if let Some(fixed) = self.fixed {
            fixed.shutdown();
        }
    }
}

impl Default for JobDriver {
    fn default() -> Self {
        Self::new()
    }
}
