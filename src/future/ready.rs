// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::pin::Pin;
use core::task::{Context, Poll};

/// Creates a future that is immediately ready with `value`.
pub fn ready<T>(value: T) -> Ready<T> {
    Ready(Some(value))
}

/// Future for [`ready`].
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Ready<T>(Option<T>);

impl<T> Unpin for Ready<T> {}

impl<T> Future for Ready<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<T> {
        let value = self
            .get_mut()
            .0
            .take()
            .expect("`Ready` polled after completion");
        Poll::Ready(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::task::Waker;

    #[test]
    #[should_panic(expected = "`Ready` polled after completion")]
    fn poll_after_ready_panics() {
        let mut cx = Context::from_waker(Waker::noop());
        let mut future = core::pin::pin!(ready(5));
        assert_eq!(future.as_mut().poll(&mut cx), Poll::Ready(5));
        let _ = future.as_mut().poll(&mut cx);
    }
}
