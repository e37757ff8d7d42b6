// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::pin::Pin;
use core::task::{Context, Poll};
use pin_project::pin_project;

/// Future for the [`and_then`][crate::future::FutureExt::and_then]
/// combinator, sequencing two futures where the second depends on the first's
/// output.
///
/// The chain is a tagged state machine: it starts out holding the first
/// future and the continuation, is rewritten in place to hold the future the
/// continuation produced, and ends up empty. Exactly one state is ever
/// active, and the value is sized to the largest of the three.
#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct AndThen<Fut1, Fut2, F> {
    #[pin]
    state: State<Fut1, Fut2, F>,
}

#[pin_project(project = StateProj)]
enum State<Fut1, Fut2, F> {
    /// Still driving the first future; the continuation is waiting for its
    /// output.
    First {
        #[pin]
        future: Fut1,
        cont: Option<F>,
    },
    /// The first future completed and the continuation produced the second.
    Second {
        #[pin]
        future: Fut2,
    },
    /// The second future completed.
    Done,
}

impl<Fut1, Fut2, F> AndThen<Fut1, Fut2, F> {
    pub(crate) fn new(future: Fut1, cont: F) -> Self {
        Self {
            state: State::First {
                future,
                cont: Some(cont),
            },
        }
    }
}

impl<Fut1, Fut2, F> fmt::Debug for AndThen<Fut1, Fut2, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::First { .. } => "First",
            State::Second { .. } => "Second",
            State::Done => "Done",
        };
        f.debug_struct("AndThen").field("state", &state).finish()
    }
}

impl<Fut1, Fut2, F> Future for AndThen<Fut1, Fut2, F>
where
    Fut1: Future,
    Fut2: Future,
    F: FnOnce(Fut1::Output) -> Fut2,
{
    type Output = Fut2::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.project().state;

        let second = match state.as_mut().project() {
            StateProj::First { future, cont } => match future.poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(output) => {
                    let cont = cont.take().expect("`AndThen` polled after completion");
                    Some(cont(output))
                }
            },
            StateProj::Second { .. } => None,
            StateProj::Done => panic!("`AndThen` polled after completion"),
        };

        if let Some(second) = second {
            state.set(State::Second { future: second });
        }

        // poll the second future in the same call that constructed it, so an
        // already-ready continuation completes without an extra scheduling
        // round trip
        let output = match state.as_mut().project() {
            StateProj::Second { future } => match future.poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(output) => output,
            },
            _ => unreachable!(),
        };

        state.set(State::Done);
        Poll::Ready(output)
    }
}

#[cfg(test)]
mod tests {
    use crate::future::{FutureExt, poll_fn, ready};
    use core::pin::pin;
    use core::task::{Context, Poll, Waker};

    #[test]
    fn ready_chain_resolves_in_one_poll() {
        let mut cx = Context::from_waker(Waker::noop());
        let mut future = pin!(
            ready(1)
                .and_then(|n| ready(n + 1))
                .and_then(|n| ready(n * 2))
                .map(|n| n + 38)
        );
        // no wake happened in between: a single poll drives the whole chain
        assert_eq!(future.as_mut().poll(&mut cx), Poll::Ready(42));
    }

    #[test]
    fn pending_first_future_suspends_the_chain() {
        let mut cx = Context::from_waker(Waker::noop());

        let mut polls = 0;
        let first = poll_fn(move |_| {
            polls += 1;
            if polls < 2 { Poll::Pending } else { Poll::Ready(10) }
        });

        let mut future = pin!(first.and_then(|n| ready(n + 1)));
        assert_eq!(future.as_mut().poll(&mut cx), Poll::Pending);
        assert_eq!(future.as_mut().poll(&mut cx), Poll::Ready(11));
    }

    #[test]
    fn pending_second_future_resumes_in_second_state() {
        let mut cx = Context::from_waker(Waker::noop());

        let mut polls = 0;
        let mut future = pin!(ready("out").and_then(move |s| {
            poll_fn(move |_| {
                polls += 1;
                if polls < 2 { Poll::Pending } else { Poll::Ready(s.len()) }
            })
        }));

        assert_eq!(future.as_mut().poll(&mut cx), Poll::Pending);
        // the first future must not be polled again: `ready` would panic
        assert_eq!(future.as_mut().poll(&mut cx), Poll::Ready(3));
    }

    #[test]
    fn short_circuit_is_a_value_decision() {
        let mut cx = Context::from_waker(Waker::noop());

        let mut future = pin!(ready(Err::<u32, &str>("boom")).and_then(|res| {
            ready(match res {
                Ok(n) => Ok(n + 1),
                Err(e) => Err(e),
            })
        }));
        assert_eq!(future.as_mut().poll(&mut cx), Poll::Ready(Err("boom")));
    }

    #[test]
    #[should_panic(expected = "`AndThen` polled after completion")]
    fn poll_after_ready_panics() {
        let mut cx = Context::from_waker(Waker::noop());
        let mut future = pin!(ready(1).and_then(|n| ready(n)));
        assert_eq!(future.as_mut().poll(&mut cx), Poll::Ready(1));
        let _ = future.as_mut().poll(&mut cx);
    }
}
