//! Execution strategies for consumer invocations.
//!
//! A [`Dispatcher`] receives boxed [`Task`]s tagged with a [`DispatchKey`]. Two
//! strategies exist:
//!
//! - [`InlineDispatcher`] runs the task on the calling thread before returning
//! - [`WorkerDispatcher`] queues the task on one of N worker threads and returns
//!   immediately; a full queue is reported as [`DispatchError::QueueFull`] instead of
//!   blocking the caller
//!
//! Both strategies isolate failures: a task that returns an error or panics is logged
//! and counted, and never affects the caller or other tasks. Tasks submitted with the
//! same key run in submission order.

mod inline;
mod worker;

use std::any::Any;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tracing::error;

pub use inline::InlineDispatcher;
pub use worker::WorkerDispatcher;

use crate::BoxError;
use crate::config::DispatcherConfig;

/// A unit of consumer work.
pub type Task = Box<dyn FnOnce() -> Result<(), BoxError> + Send + 'static>;

/// Routes related tasks to the same execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatchKey(u64);

impl DispatchKey {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Derives a key from any hashable value. Stable for the lifetime of the process.
    pub fn of<H: Hash + ?Sized>(value: &H) -> Self {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        Self(hasher.finish())
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    #[allow(clippy::cast_possible_truncation, reason = "the remainder is always below `workers`")]
    fn worker_index(self, workers: usize) -> usize {
        (self.0 % workers as u64) as usize
    }
}

impl From<u64> for DispatchKey {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("queue of worker {worker} is full")]
    QueueFull { worker: usize },

    #[error("dispatcher has been shut down")]
    Closed,

    #[error("failed to spawn worker thread: {source}")]
    Spawn {
        #[from]
        source: io::Error,
    },
}

/// Point-in-time task counters of a dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchCounts {
    pub completed: u64,
    pub faulted: u64,
    pub rejected: u64,
}

#[derive(Debug, Default)]
pub(crate) struct DispatchStats {
    completed: AtomicU64,
    faulted: AtomicU64,
    rejected: AtomicU64,
}

impl DispatchStats {
    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DispatchCounts {
        DispatchCounts {
            completed: self.completed.load(Ordering::Relaxed),
            faulted: self.faulted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

pub trait Dispatcher: Send + Sync {
    /// Hands `task` to the strategy. Never blocks the caller.
    fn dispatch(&self, key: DispatchKey, task: Task) -> Result<(), DispatchError>;

    fn counts(&self) -> DispatchCounts;

    /// Stops accepting tasks. Queued tasks still run.
    fn shutdown(&self) {}
}

/// Builds the strategy selected by `config`.
pub fn from_config(config: &DispatcherConfig) -> Result<Arc<dyn Dispatcher>, DispatchError> {
    Ok(match *config {
        DispatcherConfig::Inline => Arc::new(InlineDispatcher::new()),
        DispatcherConfig::Worker { workers, queue_capacity } => Arc::new(WorkerDispatcher::new(workers, queue_capacity)?),
    })
}

/// Runs one task, converting errors and panics into log records.
pub(crate) fn run_task(task: Task, stats: &DispatchStats) {
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(Ok(())) => {
            stats.completed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Err(e)) => {
            stats.faulted.fetch_add(1, Ordering::Relaxed);
            error!(cause = %e, "consumer failed");
        }
        Err(payload) => {
            stats.faulted.fetch_add(1, Ordering::Relaxed);
            error!(cause = panic_message(payload.as_ref()), "consumer panicked");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
