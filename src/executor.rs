// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The worker pool driving the shared run queue.

use crate::error::SpawnError;
use crate::scheduler::Scheduler;
use crate::task::{self, JoinHandle};
use core::fmt;
use static_assertions::assert_impl_all;
use std::sync::Arc;
use std::thread;

/// A fixed pool of worker threads sharing one run queue.
///
/// The executor is an explicit value, not ambient process state: tests can
/// construct as many isolated instances as they like. Dropping one tears it
/// down in order (stop accepting work, drain the queue, join the workers).
pub struct Executor {
    scheduler: Arc<Scheduler>,
    workers: Vec<thread::JoinHandle<()>>,
}

assert_impl_all!(Executor: Send, Sync);

// === impl Executor ===

impl Executor {
    /// Start an executor with `workers` worker threads.
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to spawn a thread.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let scheduler = Arc::new(Scheduler::new());
        let workers = (0..workers)
            .map(|id| {
                let scheduler = Arc::clone(&scheduler);
                thread::Builder::new()
                    .name(format!("worker-{id}"))
                    .spawn(move || worker_loop(id, &scheduler))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self { scheduler, workers }
    }

    /// Spawn a future onto the pool, returning a [`JoinHandle`] to its
    /// output.
    ///
    /// # Errors
    ///
    /// Fails with [`SpawnError`] once the executor has been
    /// [`stop`][Self::stop]ped. The check happens before the task is
    /// created; a spawn racing with a concurrent `stop` may still be
    /// accepted, and is then drained normally by the exiting workers.
    pub fn try_spawn<F>(&self, future: F) -> Result<JoinHandle<F::Output>, SpawnError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.scheduler.is_closed() {
            return Err(SpawnError);
        }
        Ok(task::spawn(&self.scheduler, future))
    }

    /// Stop accepting new tasks and wake idle workers.
    ///
    /// Tasks already in the queue still run to their next suspension point
    /// or completion; workers exit once the queue is drained.
    pub fn stop(&self) {
        tracing::debug!("stopping executor");
        self.scheduler.close();
    }

    /// Stop the executor and block until every worker has drained the queue
    /// and exited.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.scheduler.close();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

fn worker_loop(id: usize, scheduler: &Scheduler) {
    let _span = tracing::debug_span!("worker", id).entered();

    while let Some(task) = scheduler.next_task() {
        task.run();
    }

    tracing::debug!("run queue closed and drained, exiting");
}
