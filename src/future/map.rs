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

/// Future for the [`map`][crate::future::FutureExt::map] combinator.
#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Map<Fut, F> {
    #[pin]
    future: Fut,
    f: Option<F>,
}

impl<Fut, F> Map<Fut, F> {
    pub(crate) fn new(future: Fut, f: F) -> Self {
        Self { future, f: Some(f) }
    }
}

impl<Fut, F> fmt::Debug for Map<Fut, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("transformed", &self.f.is_none())
            .finish_non_exhaustive()
    }
}

impl<Fut, F, T> Future for Map<Fut, F>
where
    Fut: Future,
    F: FnOnce(Fut::Output) -> T,
{
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match this.future.poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(output) => {
                let f = this.f.take().expect("`Map` polled after completion");
                Poll::Ready(f(output))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::future::{FutureExt, ready};
    use core::task::{Context, Poll, Waker};

    #[test]
    fn maps_the_output() {
        let mut cx = Context::from_waker(Waker::noop());
        let mut future = core::pin::pin!(ready(2).map(|n| n * 21));
        assert_eq!(future.as_mut().poll(&mut cx), Poll::Ready(42));
    }

    #[test]
    #[should_panic(expected = "polled after completion")]
    fn poll_after_ready_panics() {
        let mut cx = Context::from_waker(Waker::noop());
        let mut future = core::pin::pin!(ready(1).map(|n| n));
        assert_eq!(future.as_mut().poll(&mut cx), Poll::Ready(1));
        let _ = future.as_mut().poll(&mut cx);
    }
}
