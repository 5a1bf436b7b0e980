use super::{DispatchCounts, DispatchError, DispatchKey, DispatchStats, Dispatcher, Task, run_task};

/// Runs every task on the calling thread, before `dispatch` returns.
#[derive(Debug, Default)]
pub struct InlineDispatcher {
    stats: DispatchStats,
}

impl InlineDispatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, _key: DispatchKey, task: Task) -> Result<(), DispatchError> {
        run_task(task, &self.stats);
        Ok(())
    }

    fn counts(&self) -> DispatchCounts {
        self.stats.snapshot()
    }
}
