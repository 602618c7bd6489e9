//! Executor indirection for continuation dispatch.
//!
//! The cell machinery never owns a thread. Every continuation either runs
//! inline on whichever thread triggers dispatch, or is packaged as a task and
//! handed to an [`Executor`] the caller supplied. The contract is a single
//! `submit`; anything with a run queue can implement it.
//!
//! [`Inline`] is zero-sized, so handlers parameterised by it carry no
//! executor state at all. [`QueueExecutor`] is the deferred counterpart used
//! throughout the test suites: tasks accumulate in a lock-free FIFO until the
//! owner drains it.

use std::sync::Arc;

use crossbeam_queue::SegQueue;

/// Routes zero-argument tasks to a thread of execution.
///
/// `submit` may run the task synchronously before returning; handlers must
/// not assume asynchrony.
pub trait Executor: Clone + Send + 'static {
    /// Hands `task` to the executor.
    fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static;
}

/// Executor that runs every task synchronously on the submitting thread.
///
/// Submitting through `Inline` is indistinguishable from a direct call, and
/// the type is zero-sized, so an `Inline`-parameterised handler stores no
/// executor state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Executor for Inline {
    fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        task();
    }
}

type Task = Box<dyn FnOnce() + Send>;

/// FIFO executor whose tasks run only when the owner drains the queue.
///
/// Clones share one queue, so a clone can be captured by producers while the
/// original drives [`QueueExecutor::run_pending`] from the consuming side.
#[derive(Debug, Clone)]
pub struct QueueExecutor {
    tasks: Arc<SegQueue<Task>>,
}

impl QueueExecutor {
    /// Creates an empty queue executor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(SegQueue::new()),
        }
    }

    /// Runs queued tasks in submission order until the queue is empty.
    ///
    /// Returns how many tasks ran, including any submitted by the tasks
    /// themselves while draining.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.tasks.pop() {
            task();
            ran += 1;
        }
        ran
    }

    /// Number of tasks currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when no tasks are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for QueueExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for QueueExecutor {
    fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tasks.push(Box::new(task));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn inline_runs_immediately() {
        let ran = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&ran);
        Inline.submit(move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn queue_defers_until_drained() {
        let exec = QueueExecutor::new();
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&ran);
            exec.submit(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(exec.len(), 3);
        assert_eq!(exec.run_pending(), 3);
        assert_eq!(ran.load(Ordering::SeqCst), 3);
        assert!(exec.is_empty());
    }

    #[test]
    fn clones_share_one_queue() {
        let exec = QueueExecutor::new();
        let clone = exec.clone();
        let ran = Arc::new(AtomicUsize::new(0));

        let count = Arc::clone(&ran);
        clone.submit(move || {
            count.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(exec.run_pending(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drain_picks_up_tasks_submitted_while_draining() {
        let exec = QueueExecutor::new();
        let inner = exec.clone();
        let ran = Arc::new(AtomicUsize::new(0));

        let count = Arc::clone(&ran);
        exec.submit(move || {
            let nested = Arc::clone(&count);
            count.fetch_add(1, Ordering::SeqCst);
            inner.submit(move || {
                nested.fetch_add(1, Ordering::SeqCst);
            });
        });

        assert_eq!(exec.run_pending(), 2);
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }
}
