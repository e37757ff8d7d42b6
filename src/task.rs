// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The schedulable unit: a task owns one future tree and drives it to
//! completion by repeated polling.
//!
//! Spawning performs a single heap allocation. The future, the lifecycle
//! state and the output slot all live in one [`Arc`]; wakers, run queue
//! entries and the [`JoinHandle`] are counted references into that
//! allocation. The waker is the task itself, through [`Wake`]: invoking it
//! re-enqueues the task into the scheduler it was spawned on.
//!
//! The wake/poll handshake never takes a lock. `wake()` may be called from
//! any thread at any moment, including from inside the very poll it is
//! racing with, so every lifecycle decision is a compare-and-swap transition
//! on a single state byte.

use crate::error::JoinError;
use crate::loom::cell::UnsafeCell;
use crate::loom::sync::atomic::{AtomicU8, Ordering};
use crate::loom::sync::{Condvar, Mutex, MutexGuard};
use crate::scheduler::Scheduler;
use core::fmt;
use core::pin::Pin;
use static_assertions::assert_impl_all;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};
use std::task::Wake;

pub use core::task::{Context, Poll, Waker};

/// Suspended: the last poll returned [`Poll::Pending`] and no wake has
/// arrived since. The task is not in the run queue.
const IDLE: u8 = 0;
/// In the run queue, waiting for a worker to pick it up.
const SCHEDULED: u8 = 1;
/// A worker is currently polling the future.
const RUNNING: u8 = 2;
/// Woken while `RUNNING`: the polling worker must re-enqueue the task
/// instead of letting it go idle, or the wake would be lost.
const NOTIFIED: u8 = 3;
/// The future returned [`Poll::Ready`], panicked, or was abandoned; it is
/// never polled again.
const COMPLETE: u8 = 4;

/// A type-erased, reference-counted task, as the run queue sees it.
pub(crate) trait Runnable: Send + Sync {
    /// Poll the owned future once and transition the task according to the
    /// outcome.
    fn run(self: Arc<Self>);

    /// Signal that the task will never run again (its queue was dropped);
    /// fails the associated [`JoinHandle`].
    fn abandon(&self);
}

/// The output side of a task, as seen by its [`JoinHandle`].
pub(crate) trait Join<T>: Send + Sync {
    fn poll_output(&self, cx: &mut Context<'_>) -> Poll<Result<T, JoinError>>;
    fn wait_output(&self) -> Result<T, JoinError>;
}

/// A spawned unit of work: one future plus the state needed to drive it.
///
/// Never exposed directly; the outside world sees a task only through a
/// [`JoinHandle`], a [`Waker`], or the run queue's `dyn Runnable`.
struct Task<F: Future> {
    /// Lifecycle state byte; see the constants above for the protocol.
    state: AtomicU8,
    /// Where wakes re-enqueue the task. Weak, so tasks parked in a queue do
    /// not keep a torn-down executor alive.
    scheduler: Weak<Scheduler>,
    /// The future, until the task reaches its terminal state.
    ///
    /// Only the worker that moved `state` to `RUNNING` may touch this.
    future: UnsafeCell<Option<F>>,
    /// Output slot shared with the `JoinHandle`.
    output: Mutex<OutputSlot<F::Output>>,
    /// Signalled when `output` settles, for blocking joiners.
    done: Condvar,
}

struct OutputSlot<T> {
    value: Option<T>,
    /// Waker of a `JoinHandle` that is being awaited rather than blocked on.
    waker: Option<Waker>,
    /// The task reached its terminal state; `value` is `None` if it failed
    /// (panicked or abandoned).
    settled: bool,
    /// The output was handed to the `JoinHandle`.
    taken: bool,
}

// Safety: the future is the only field without its own synchronization;
// access to it is arbitrated by the state byte (only the worker that wins
// the `SCHEDULED -> RUNNING` transition touches it), so the cell is sound to
// share whenever the future itself may cross threads.
unsafe impl<F> Send for Task<F>
where
    F: Future + Send,
    F::Output: Send,
{
}
// Safety: see above.
unsafe impl<F> Sync for Task<F>
where
    F: Future + Send,
    F::Output: Send,
{
}

/// Allocate a task owning `future` and enqueue it for its first poll.
///
/// This is the task's one heap allocation: the returned [`JoinHandle`], the
/// queue entry, and every waker handed out while polling are counted
/// references into it.
pub(crate) fn spawn<F>(scheduler: &Arc<Scheduler>, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let task = Arc::new(Task {
        state: AtomicU8::new(SCHEDULED),
        scheduler: Arc::downgrade(scheduler),
        future: UnsafeCell::new(Some(future)),
        output: Mutex::new(OutputSlot {
            value: None,
            waker: None,
            settled: false,
            taken: false,
        }),
        done: Condvar::new(),
    });

    let join: Arc<dyn Join<F::Output>> = Arc::clone(&task);
    tracing::trace!(target: "spindle::task", task.addr = ?(Arc::as_ptr(&task)), "task spawned");
    scheduler.enqueue(task);

    JoinHandle { task: join }
}

// === impl Task ===

impl<F: Future> Task<F> {
    /// Publish the task's outcome and wake whoever is waiting for it.
    fn settle(&self, value: Option<F::Output>) {
        let waker = {
            let Ok(mut slot) = self.output.lock() else {
                return;
            };
            if slot.settled {
                return;
            }
            slot.value = value;
            slot.settled = true;
            self.done.notify_all();
            slot.waker.take()
        };

        // invoked outside the lock: the join waker may do arbitrary work
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Finish the task: drop the future in place, publish the terminal state
    /// and settle the handle.
    ///
    /// May only be called by the worker holding `RUNNING`.
    fn retire(&self, value: Option<F::Output>) {
        self.future.with_mut(|slot| {
            // Safety: the caller holds `RUNNING`, so this is the only access.
            // Overwriting with `None` drops the future in place, upholding
            // the pinning contract.
            unsafe { *slot = None }
        });
        self.state.store(COMPLETE, Ordering::Release);
        tracing::trace!(target: "spindle::task", completed = value.is_some(), "task retired");
        self.settle(value);
    }

    /// Mark a task that can never be polled again as failed, so its handle
    /// resolves instead of waiting forever.
    fn abandon(&self) {
        if self.state.load(Ordering::Acquire) != COMPLETE {
            self.state.store(COMPLETE, Ordering::Release);
            self.settle(None);
        }
    }

    fn lock_output(&self) -> MutexGuard<'_, OutputSlot<F::Output>> {
        self.output.lock().expect("task output mutex poisoned")
    }
}

impl<F> Task<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    /// The wake half of the state machine: request that the task be polled
    /// again, enqueueing it if it was idle.
    fn schedule(this: &Arc<Self>) {
        let mut state = this.state.load(Ordering::Acquire);
        loop {
            let next = match state {
                IDLE => SCHEDULED,
                RUNNING => NOTIFIED,
                // already queued, already marked for a re-run, or done:
                // redundant wakes coalesce into the poll that is due anyway
                SCHEDULED | NOTIFIED | COMPLETE => return,
                _ => unreachable!("invalid task state: {state}"),
            };
            match this
                .state
                .compare_exchange_weak(state, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(actual) => state = actual,
            }
        }

        if state == IDLE {
            match this.scheduler.upgrade() {
                Some(scheduler) => {
                    tracing::trace!(target: "spindle::task", "woken task enqueued");
                    scheduler.enqueue(Arc::clone(this));
                }
                // the executor is gone; the task can never be polled again
                None => this.abandon(),
            }
        }
        // `RUNNING -> NOTIFIED` enqueues nothing here: the polling worker
        // observes the flag when the poll ends and re-enqueues the task
        // itself. Waking a task from inside its own poll therefore cannot
        // deadlock or get lost.
    }
}

/// Wakers are counted references to the task itself: cloning one bumps the
/// reference count, and every clone is interchangeable with every other for
/// the "will be polled again" guarantee.
impl<F> Wake for Task<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    fn wake(self: Arc<Self>) {
        Self::schedule(&self);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        Self::schedule(self);
    }
}

impl<F> Runnable for Task<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    fn run(self: Arc<Self>) {
        // Claim exclusive access to the future. The queue hands a task out
        // exactly once per `IDLE -> SCHEDULED` transition, so the claim
        // cannot fail.
        self.state
            .compare_exchange(SCHEDULED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .expect("task dequeued while not scheduled");

        let waker = Waker::from(Arc::clone(&self));
        let mut cx = Context::from_waker(&waker);

        // A panic inside `poll` is a task failure, not a worker failure:
        // trap it here and fail the handle below.
        let poll = catch_unwind(AssertUnwindSafe(|| {
            self.future.with_mut(|slot| {
                // Safety: winning the `SCHEDULED -> RUNNING` transition above
                // grants exclusive access to the future until the state
                // leaves `RUNNING`. The future is polled in place and only
                // ever dropped in place, never moved out of the cell.
                unsafe {
                    let future = (*slot).as_mut().expect("future of a running task is gone");
                    Pin::new_unchecked(future).poll(&mut cx)
                }
            })
        }));

        match poll {
            Ok(Poll::Ready(value)) => self.retire(Some(value)),
            Ok(Poll::Pending) => {
                match self
                    .state
                    .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
                {
                    Ok(_) => {}
                    Err(actual) => {
                        // A wake arrived while the future was being polled.
                        // The poll may have observed state from before that
                        // wake, so going idle would lose it; the task goes
                        // straight back into the queue instead.
                        debug_assert_eq!(actual, NOTIFIED);
                        self.state.store(SCHEDULED, Ordering::Release);
                        match self.scheduler.upgrade() {
                            Some(scheduler) => scheduler.enqueue(self),
                            None => self.abandon(),
                        }
                    }
                }
            }
            Err(_panic) => {
                tracing::warn!(target: "spindle::task", "task panicked while being polled");
                self.retire(None);
            }
        }
    }

    fn abandon(&self) {
        Task::abandon(self);
    }
}

impl<F> Join<F::Output> for Task<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    fn poll_output(&self, cx: &mut Context<'_>) -> Poll<Result<F::Output, JoinError>> {
        let mut slot = self.lock_output();
        assert!(!slot.taken, "`JoinHandle` polled after completion");

        if slot.settled {
            slot.taken = true;
            return Poll::Ready(slot.value.take().ok_or(JoinError));
        }

        // `settle` takes this lock before reading the slot, so a completion
        // cannot slip between the check above and the registration below
        match &slot.waker {
            Some(waker) if waker.will_wake(cx.waker()) => {}
            _ => slot.waker = Some(cx.waker().clone()),
        }
        Poll::Pending
    }

    fn wait_output(&self) -> Result<F::Output, JoinError> {
        let mut slot = self.lock_output();
        while !slot.settled {
            slot = self.done.wait(slot).expect("task output mutex poisoned");
        }
        assert!(!slot.taken, "task output taken twice");
        slot.taken = true;
        slot.value.take().ok_or(JoinError)
    }
}

impl<F: Future> Drop for Task<F> {
    fn drop(&mut self) {
        // last reference gone without the task completing: nobody can ever
        // poll it, so make sure a joiner is not left waiting
        if self.state.load(Ordering::Acquire) != COMPLETE {
            self.settle(None);
        }
    }
}

// === impl JoinHandle ===

/// An owned permission to collect a spawned task's output.
///
/// The handle is the completion notification for a spawned future: await it
/// (it is itself a [`Future`]), or block on it with [`wait`][Self::wait]
/// from outside the runtime. Dropping the handle detaches the task, which
/// keeps running with its output discarded.
pub struct JoinHandle<T> {
    task: Arc<dyn Join<T>>,
}

assert_impl_all!(JoinHandle<()>: Send, Sync);

impl<T> JoinHandle<T> {
    /// Block the calling thread until the task finishes, returning its
    /// output.
    ///
    /// Fails with [`JoinError`] if the task's future panicked or the
    /// executor was torn down first. This blocks an OS thread; calling it
    /// from inside a task would stall a worker, so it is meant for code
    /// outside the runtime.
    ///
    /// # Panics
    ///
    /// Panics if the output was already collected by polling this handle to
    /// completion.
    pub fn wait(self) -> Result<T, JoinError> {
        self.task.wait_output()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = Result<T, JoinError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.task.poll_output(cx)
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle").finish_non_exhaustive()
    }
}

// === yield_now ===

/// Yields execution back to the scheduler exactly once.
///
/// The returned future wakes its own task before suspending, so the task
/// goes to the back of the run queue rather than idle. This is a self-wake:
/// the waker is invoked from inside the poll it belongs to, which the task
/// state protocol explicitly supports.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

/// Future for [`yield_now`].
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
