// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Future combinators.
//!
//! A chain built from these combinators is a single statically-sized value:
//! each combinator embeds its children by value, so the size of the whole
//! chain is computed at compile time and sequencing N operations costs no
//! heap allocation per step. The only allocation a chain ever causes is the
//! one made for the [task][crate::task] that eventually owns it.
//!
//! Failures are values: a fallible step resolves to a `Result` and the
//! continuation passed to [`and_then`][FutureExt::and_then] decides whether
//! to short-circuit or to keep going.

mod and_then;
mod map;
mod poll_fn;
mod ready;

pub use and_then::AndThen;
pub use map::Map;
pub use poll_fn::{PollFn, poll_fn};
pub use ready::{Ready, ready};

/// Combinator adapters for [`Future`]s.
pub trait FutureExt: Future {
    /// Map this future's output to a different type, returning a new future of
    /// the resulting type.
    fn map<T, F>(self, f: F) -> Map<Self, F>
    where
        F: FnOnce(Self::Output) -> T,
        Self: Sized,
    {
        Map::new(self, f)
    }

    /// Chain on a computation for when this future finishes, passing the
    /// output to `cont` which produces the future to run next.
    ///
    /// If the produced future is already ready when the first one resolves,
    /// the whole chain resolves in the same poll, without a trip through the
    /// scheduler in between.
    fn and_then<Fut, F>(self, cont: F) -> AndThen<Self, Fut, F>
    where
        F: FnOnce(Self::Output) -> Fut,
        Fut: Future,
        Self: Sized,
    {
        AndThen::new(self, cont)
    }
}

impl<F: Future> FutureExt for F {}
