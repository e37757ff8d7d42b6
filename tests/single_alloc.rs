// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Spawning a task performs exactly one heap allocation, no matter how many
//! combinators the future chain is built from.

use spindle::executor::Executor;
use spindle::future::{FutureExt, ready};
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Forwards to the system allocator, counting allocations while enabled.
struct CountingAlloc;

static ENABLED: AtomicBool = AtomicBool::new(false);
static ALLOCS: AtomicUsize = AtomicUsize::new(0);

// Safety: defers to `System` for all actual allocation
unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if ENABLED.load(Ordering::Relaxed) {
            ALLOCS.fetch_add(1, Ordering::Relaxed);
        }
        // Safety: same contract as the caller's
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // Safety: same contract as the caller's
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static ALLOC: CountingAlloc = CountingAlloc;

#[test]
fn one_allocation_per_spawned_chain() {
    let exec = Executor::new(1);

    // warm up: the first spawn pays one-time costs (queue buffer, tracing
    // callsite registration) that are not per-task
    let h = exec.try_spawn(ready(0).map(|n| n)).unwrap();
    assert_eq!(h.wait().unwrap(), 0);

    // the combinator chain is a single value; only the task cell wrapping it
    // hits the heap
    ENABLED.store(true, Ordering::SeqCst);
    let h = exec
        .try_spawn(
            ready(1)
                .and_then(|n| ready(n + 1))
                .and_then(|n| ready(n * 2))
                .map(|n| n + 38),
        )
        .unwrap();
    let value = h.wait().unwrap();
    ENABLED.store(false, Ordering::SeqCst);

    assert_eq!(value, 42);
    assert_eq!(
        ALLOCS.load(Ordering::SeqCst),
        1,
        "spawning a combinator chain must allocate exactly once"
    );
}
