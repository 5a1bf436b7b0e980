use std::mem;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use arc_swap::ArcSwap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use super::{DispatchCounts, DispatchError, DispatchKey, DispatchStats, Dispatcher, Task, run_task};

/// Runs tasks on a fixed pool of named worker threads.
///
/// Every worker owns a bounded queue. A task goes to the worker chosen by its key, so
/// tasks sharing a key are executed one after another in submission order.
pub struct WorkerDispatcher {
    queues: ArcSwap<Vec<mpsc::Sender<Task>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<DispatchStats>,
}

impl WorkerDispatcher {
    pub fn new(workers: NonZeroUsize, queue_capacity: NonZeroUsize) -> Result<Self, DispatchError> {
        let stats = Arc::new(DispatchStats::default());
        let mut queues = Vec::with_capacity(workers.get());
        let mut handles = Vec::with_capacity(workers.get());

        for index in 0..workers.get() {
            let (sender, mut receiver) = mpsc::channel::<Task>(queue_capacity.get());
            let stats = Arc::clone(&stats);
            let handle = thread::Builder::new().name(format!("reactor-worker-{index}")).spawn(move || {
                while let Some(task) = receiver.blocking_recv() {
                    run_task(task, &stats);
                }
                debug!(worker = index, "dispatcher worker stopped");
            })?;

            queues.push(sender);
            handles.push(handle);
        }

        Ok(Self { queues: ArcSwap::from_pointee(queues), handles: Mutex::new(handles), stats })
    }

    pub fn workers(&self) -> usize {
        self.queues.load().len()
    }
}

impl Dispatcher for WorkerDispatcher {
    fn dispatch(&self, key: DispatchKey, task: Task) -> Result<(), DispatchError> {
        let queues = self.queues.load();
        if queues.is_empty() {
            return Err(DispatchError::Closed);
        }

        let worker = key.worker_index(queues.len());
        queues[worker].try_send(task).map_err(|e| match e {
            TrySendError::Full(_) => {
                self.stats.record_rejected();
                warn!(worker, "worker queue is full, rejecting task");
                DispatchError::QueueFull { worker }
            }
            TrySendError::Closed(_) => DispatchError::Closed,
        })
    }

    fn counts(&self) -> DispatchCounts {
        self.stats.snapshot()
    }

    /// Closes every queue and waits for the workers to drain them.
    fn shutdown(&self) {
        self.queues.store(Arc::new(Vec::new()));

        let handles = mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        let current = thread::current().id();
        for handle in handles {
            // a worker dropping the last reference to its own dispatcher cannot join itself
            if handle.thread().id() != current && handle.join().is_err() {
                warn!("dispatcher worker exited abnormally");
            }
        }
    }
}

impl Drop for WorkerDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerDispatcher").field("workers", &self.workers()).field("counts", &self.counts()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::BoxError;

    fn nz(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    fn record(log: &Arc<Mutex<Vec<(u64, u64, &'static str)>>>, entry: (u64, u64, &'static str)) -> Task {
        let log = Arc::clone(log);
        Box::new(move || -> Result<(), BoxError> {
            log.lock().unwrap().push(entry);
            Ok(())
        })
    }

    #[test]
    fn same_key_runs_in_submission_order() {
        let dispatcher = Arc::new(WorkerDispatcher::new(nz(4), nz(4096)).unwrap());
        let log = Arc::new(Mutex::new(Vec::new()));

        // several submitters hammer different keys at the same time
        let submitters: Vec<_> = (0..4u64)
            .map(|submitter| {
                let dispatcher = Arc::clone(&dispatcher);
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for trial in 0..1000u64 {
                        let key = DispatchKey::new(submitter * 10_000 + trial % 16);
                        for step in ["A", "B"] {
                            while let Err(e) = dispatcher.dispatch(key, record(&log, (submitter, trial, step))) {
                                assert!(matches!(e, DispatchError::QueueFull { .. }));
                                thread::sleep(Duration::from_millis(1));
                            }
                        }
                    }
                })
            })
            .collect();
        for submitter in submitters {
            submitter.join().unwrap();
        }
        dispatcher.shutdown();

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 4 * 1000 * 2);
        let order: HashMap<_, _> = log.iter().enumerate().map(|(index, entry)| (*entry, index)).collect();
        for submitter in 0..4u64 {
            for trial in 0..1000u64 {
                let a = order[&(submitter, trial, "A")];
                let b = order[&(submitter, trial, "B")];
                assert!(a < b, "trial {trial} of submitter {submitter} ran out of order");
            }
        }
    }

    #[test]
    fn failing_task_does_not_stop_others() {
        let dispatcher = WorkerDispatcher::new(nz(2), nz(16)).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));

        dispatcher
            .dispatch(DispatchKey::new(0), Box::new(|| -> Result<(), BoxError> { panic!("worker boom") }))
            .unwrap();
        dispatcher
            .dispatch(DispatchKey::new(0), Box::new(|| -> Result<(), BoxError> { Err("bad input".into()) }))
            .unwrap();
        let counter = Arc::clone(&ran);
        dispatcher
            .dispatch(
                DispatchKey::new(1),
                Box::new(move || -> Result<(), BoxError> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();
        dispatcher.shutdown();

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.counts(), DispatchCounts { completed: 1, faulted: 2, rejected: 0 });
    }

    #[test]
    fn full_queue_is_rejected_without_blocking() {
        let dispatcher = WorkerDispatcher::new(nz(1), nz(1)).unwrap();
        let gate = Arc::new(Barrier::new(2));

        let worker_gate = Arc::clone(&gate);
        dispatcher
            .dispatch(
                DispatchKey::new(0),
                Box::new(move || -> Result<(), BoxError> {
                    worker_gate.wait();
                    Ok(())
                }),
            )
            .unwrap();

        // the worker is parked on the barrier: one task fits in the queue, the next one does not
        let mut rejected = false;
        for _ in 0..3 {
            if let Err(DispatchError::QueueFull { worker }) =
                dispatcher.dispatch(DispatchKey::new(0), Box::new(|| -> Result<(), BoxError> { Ok(()) }))
            {
                assert_eq!(worker, 0);
                rejected = true;
            }
        }
        assert!(rejected);

        gate.wait();
        dispatcher.shutdown();
        assert!(dispatcher.counts().rejected >= 1);
    }

    #[test]
    fn dispatch_after_shutdown_fails() {
        let dispatcher = WorkerDispatcher::new(nz(2), nz(2)).unwrap();
        dispatcher.shutdown();

        let result = dispatcher.dispatch(DispatchKey::new(0), Box::new(|| -> Result<(), BoxError> { Ok(()) }));
        assert!(matches!(result, Err(DispatchError::Closed)));
        assert_eq!(dispatcher.workers(), 0);
    }
}
