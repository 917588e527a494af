//! Job fault reporting.
//!
//! A fault is anything that escapes a job step: an `Err` from `advance` or
//! a panic caught at the runner boundary. Faulted jobs are dropped, never
//! requeued, and the fault is handed to a host-suppliable [`FaultSink`].
//! The producer that submitted the job gets no signal.

use std::any::Any;
use std::fmt;

use crate::job::JobError;

/// Which execution context a job was running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// The host-driven main context.
    Main,

    /// A worker thread, by index.
    Worker(usize),
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionContext::Main => write!(f, "the main context"),
            ExecutionContext::Worker(index) => write!(f, "worker {index}"),
        }
    }
}

/// A fault raised while advancing a job.
#[derive(Debug, thiserror::Error)]
pub enum JobFault {
    /// The job's `advance` returned an error.
    #[error("job failed on {context}: {source}")]
    Failed {
        context: ExecutionContext,
        #[source]
        source: JobError,
    },

    /// The job panicked mid-step.
    #[error("job panicked on {context}: {message}")]
    Panicked {
        context: ExecutionContext,
        message: String,
    },
}

impl JobFault {
    /// Where the job was executing when it faulted.
    pub fn context(&self) -> ExecutionContext {
        match self {
            JobFault::Failed { context, .. } => *context,
            JobFault::Panicked { context, .. } => *context,
        }
    }

    pub(crate) fn from_panic(context: ExecutionContext, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        JobFault::Panicked { context, message }
    }
}

/// Destination for job faults.
///
/// The scheduler reports every fault here before applying the halt-on-fault
/// policy, so a host can route faults into its own diagnostics.
pub trait FaultSink: Send + Sync {
    fn report(&self, fault: &JobFault);
}

/// Default sink: reports faults through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceFaultSink;

impl FaultSink for TraceFaultSink {
    fn report(&self, fault: &JobFault) {
        tracing::error!(context = %fault.context(), %fault, "job fault");
    }
}
