// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The shared queue of runnable tasks.
//!
//! A FIFO of type-erased task references behind a mutex, with a condvar for
//! workers to sleep on while it is empty. Any thread may enqueue (that is
//! what a waker does); workers take turns dequeuing. The queue is the only
//! structure in the runtime that multiple threads mutate; everything per-task
//! goes through the task's own atomic state instead.

use crate::loom::sync::{Condvar, Mutex, MutexGuard};
use crate::task::Runnable;
use std::collections::VecDeque;
use std::sync::Arc;

pub(crate) struct Scheduler {
    queue: Mutex<RunQueue>,
    /// Signalled once per enqueue, broadcast on close.
    work: Condvar,
}

struct RunQueue {
    tasks: VecDeque<Arc<dyn Runnable>>,
    closed: bool,
}

// === impl Scheduler ===

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(RunQueue {
                tasks: VecDeque::new(),
                closed: false,
            }),
            work: Condvar::new(),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Enqueue a runnable task and rouse one sleeping worker.
    ///
    /// Enqueues are accepted even after [`close`][Self::close]: a wake that
    /// races with shutdown parks the task in the queue, where it is either
    /// drained by an exiting worker or failed when the queue is dropped.
    pub(crate) fn enqueue(&self, task: Arc<dyn Runnable>) {
        tracing::trace!(target: "spindle::scheduler", "task enqueued");
        self.lock().tasks.push_back(task);
        self.work.notify_one();
    }

    /// Dequeue the next runnable task, sleeping while the queue is empty.
    ///
    /// Returns `None` once the queue is closed *and* drained, which is a
    /// worker's signal to exit.
    pub(crate) fn next_task(&self) -> Option<Arc<dyn Runnable>> {
        let mut queue = self.lock();
        loop {
            if let Some(task) = queue.tasks.pop_front() {
                return Some(task);
            }
            if queue.closed {
                return None;
            }
            queue = self.work.wait(queue).expect("run queue mutex poisoned");
        }
    }

    /// Dequeue without blocking. Tests drive the queue with this.
    pub(crate) fn try_next(&self) -> Option<Arc<dyn Runnable>> {
        self.lock().tasks.pop_front()
    }

    /// Refuse new submissions and wake every sleeping worker, so they drain
    /// the remainder and exit.
    pub(crate) fn close(&self) {
        self.lock().closed = true;
        self.work.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, RunQueue> {
        self.queue.lock().expect("run queue mutex poisoned")
    }
}

impl Drop for RunQueue {
    fn drop(&mut self) {
        // tasks still queued here will never be polled again; fail their
        // handles instead of leaking a forever-pending join
        for task in self.tasks.drain(..) {
            task.abandon();
        }
    }
}
