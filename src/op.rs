// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Leaf futures bridging callback-based operations into the poll model.
//!
//! An [`Operation`] is the boundary to whatever actually performs the work:
//! a network download, a conversion job handed to a thread pool, anything
//! that eventually produces a value on some thread. The runtime neither
//! knows nor cares how; it hands the operation a [`Complete`] handle and
//! expects it to be invoked exactly once.
//!
//! [`OpFuture`] does the bridging: the first poll starts the operation and
//! suspends, the completion callback stores the value and wakes the task,
//! and the next poll hands the value out. Failures are not a separate path
//! here: a fallible operation simply completes with a `Result`.

use crate::loom::sync::Mutex;
use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use std::sync::Arc;

/// An external asynchronous operation that can be bridged into a future via
/// [`OpFuture`].
pub trait Operation {
    type Output;

    /// Start the operation.
    ///
    /// Implementations must arrange for [`Complete::complete`] to be called
    /// exactly once, eventually, on any thread; calling it synchronously from
    /// within `start` is allowed. `start` itself must not block.
    fn start(self, done: Complete<Self::Output>);
}

/// The completion callback handed to [`Operation::start`].
///
/// `Complete` is not cloneable, so "invoked exactly once" is enforced by
/// move semantics. Dropping it without completing marks the operation as
/// violated, which the owning [`OpFuture`] treats as fatal.
pub struct Complete<T> {
    shared: Option<Arc<Shared<T>>>,
}

/// A future driving a single [`Operation`] to completion.
pub struct OpFuture<O: Operation> {
    state: State<O>,
}

enum State<O: Operation> {
    /// The operation has not been started yet; the first poll does that.
    Unstarted(O),
    /// The operation is in flight and will land in the shared slot.
    Waiting(Arc<Shared<O::Output>>),
    Done,
}

/// Completion state shared between the future and its one `Complete` handle.
struct Shared<T> {
    slot: Mutex<Slot<T>>,
}

struct Slot<T> {
    value: Option<T>,
    waker: Option<Waker>,
    /// The `Complete` was dropped without delivering a value.
    failed: bool,
}

// === impl Complete ===

impl<T> Complete<T> {
    /// Complete the operation with `value`, waking the task awaiting it.
    ///
    /// This method never blocks and may be called from any thread, including
    /// synchronously from within [`Operation::start`] itself.
    #[expect(clippy::missing_panics_doc, reason = "internal invariant")]
    pub fn complete(mut self, value: T) {
        let shared = self.shared.take().expect("completion handle already used");

        // the value goes into the slot before the waker fires, so the poll
        // the wake triggers always finds it
        let waker = {
            let mut slot = shared.slot.lock().expect("operation slot poisoned");
            slot.value = Some(value);
            slot.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> Drop for Complete<T> {
    fn drop(&mut self) {
        // the operation went away without producing a value; wake the future
        // so it can report the broken contract instead of hanging
        if let Some(shared) = self.shared.take() {
            let waker = {
                let Ok(mut slot) = shared.slot.lock() else {
                    return;
                };
                slot.failed = true;
                slot.waker.take()
            };
            if let Some(waker) = waker {
                waker.wake();
            }
        }
    }
}

impl<T> fmt::Debug for Complete<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Complete").finish_non_exhaustive()
    }
}

// === impl OpFuture ===

impl<O: Operation> OpFuture<O> {
    pub fn new(op: O) -> Self {
        Self {
            state: State::Unstarted(op),
        }
    }
}

impl<O: Operation> Future for OpFuture<O> {
    type Output = O::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Safety: no field of `OpFuture` is structurally pinned; the operation
        // and the shared handle are plain values moved between states.
        let this = unsafe { self.get_unchecked_mut() };

        match mem::replace(&mut this.state, State::Done) {
            State::Unstarted(op) => {
                // the waker is in place before the operation starts, so a
                // completion arriving from another thread (or synchronously
                // from within `start`) always finds someone to wake
                let shared = Arc::new(Shared {
                    slot: Mutex::new(Slot {
                        value: None,
                        waker: Some(cx.waker().clone()),
                        failed: false,
                    }),
                });

                op.start(Complete {
                    shared: Some(Arc::clone(&shared)),
                });
                tracing::trace!(target: "spindle::op", "operation started");

                // pending-first even if the completion already landed: its
                // wake has marked the task for an immediate re-poll
                this.state = State::Waiting(shared);
                Poll::Pending
            }
            State::Waiting(shared) => {
                let mut slot = shared.slot.lock().expect("operation slot poisoned");
                if let Some(value) = slot.value.take() {
                    drop(slot);
                    return Poll::Ready(value);
                }
                assert!(!slot.failed, "operation was dropped without completing");

                // the callback is still outstanding; refresh the waker in
                // case the task migrated, nothing is registered twice
                match &slot.waker {
                    Some(waker) if waker.will_wake(cx.waker()) => {}
                    _ => slot.waker = Some(cx.waker().clone()),
                }
                drop(slot);

                this.state = State::Waiting(shared);
                Poll::Pending
            }
            State::Done => panic!("`OpFuture` polled after completion"),
        }
    }
}

impl<O: Operation> fmt::Debug for OpFuture<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Unstarted(_) => "Unstarted",
            State::Waiting(_) => "Waiting",
            State::Done => "Done",
        };
        f.debug_struct("OpFuture").field("state", &state).finish()
    }
}

// === from_fn ===

/// Adapts a closure into an [`Operation`].
///
/// Useful for tests and for one-off operations that don't warrant a named
/// type: the closure receives the [`Complete`] handle and takes over the
/// exactly-once obligation.
pub fn from_fn<T, F>(start: F) -> FromFn<T, F>
where
    F: FnOnce(Complete<T>),
{
    FromFn {
        start,
        _output: PhantomData,
    }
}

/// An [`Operation`] backed by a closure, created by [`from_fn`].
pub struct FromFn<T, F> {
    start: F,
    _output: PhantomData<fn(Complete<T>)>,
}

impl<T, F> Operation for FromFn<T, F>
where
    F: FnOnce(Complete<T>),
{
    type Output = T;

    fn start(self, done: Complete<T>) {
        (self.start)(done);
    }
}

impl<T, F> fmt::Debug for FromFn<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FromFn").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loom;

    fn poll<F: Future + Unpin>(future: &mut F) -> Poll<F::Output> {
        let mut cx = Context::from_waker(Waker::noop());
        Pin::new(future).poll(&mut cx)
    }

    #[test]
    fn first_poll_starts_and_suspends() {
        loom::model(|| {
            let started = Arc::new(Mutex::new(None));
            let op = {
                let started = Arc::clone(&started);
                from_fn(move |done| {
                    *started.lock().unwrap() = Some(done);
                })
            };

            let mut future = OpFuture::new(op);
            assert!(poll(&mut future).is_pending());

            // the operation was started exactly once
            let done = started.lock().unwrap().take().expect("operation started");

            // still pending until the completion lands
            assert!(poll(&mut future).is_pending());

            done.complete(42);
            assert_eq!(poll(&mut future), Poll::Ready(42));
        });
    }

    #[test]
    fn synchronous_completion_still_suspends_once() {
        loom::model(|| {
            let mut future = OpFuture::new(from_fn(|done| done.complete("now")));

            // the contract is pending-first even when the operation finished
            // during `start`
            assert!(poll(&mut future).is_pending());
            assert_eq!(poll(&mut future), Poll::Ready("now"));
        });
    }

    #[test]
    fn cross_thread_completion() {
        loom::model(|| {
            let mut future = OpFuture::new(from_fn(|done: Complete<u32>| {
                loom::thread::spawn(move || {
                    done.complete(7);
                })
                .join()
                .unwrap();
            }));

            assert!(poll(&mut future).is_pending());
            assert_eq!(poll(&mut future), Poll::Ready(7));
        });
    }

    #[cfg(not(loom))]
    #[test]
    #[should_panic(expected = "`OpFuture` polled after completion")]
    fn poll_after_ready_panics() {
        let mut future = OpFuture::new(from_fn(|done| done.complete(())));
        assert!(poll(&mut future).is_pending());
        assert_eq!(poll(&mut future), Poll::Ready(()));
        let _ = poll(&mut future);
    }

    #[cfg(not(loom))]
    #[test]
    #[should_panic(expected = "operation was dropped without completing")]
    fn dropped_completion_is_fatal() {
        let mut future = OpFuture::new(from_fn(|done: Complete<u32>| drop(done)));
        assert!(poll(&mut future).is_pending());
        let _ = poll(&mut future);
    }
}
