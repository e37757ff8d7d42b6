// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use criterion::{Criterion, criterion_group, criterion_main};
use spindle::executor::Executor;
use spindle::task::yield_now;

const PINGS: usize = 10_000;

fn ping_10k_single_worker(c: &mut Criterion) {
    let exec = Executor::new(1);

    c.bench_function("ping_10k_single_worker", |b| {
        b.iter(|| {
            let h = exec
                .try_spawn(async {
                    for _ in 0..PINGS {
                        yield_now().await;
                    }
                })
                .unwrap();
            h.wait().unwrap();
        });
    });
}

fn ping_pong_10k_single_worker(c: &mut Criterion) {
    let exec = Executor::new(1);

    c.bench_function("ping_pong_10k_single_worker", |b| {
        b.iter(|| {
            let h1 = exec
                .try_spawn(async {
                    for _ in 0..PINGS {
                        yield_now().await;
                    }
                })
                .unwrap();
            let h2 = exec
                .try_spawn(async {
                    for _ in 0..PINGS {
                        yield_now().await;
                    }
                })
                .unwrap();

            h1.wait().unwrap();
            h2.wait().unwrap();
        });
    });
}

fn ping_pong_10k_two_workers(c: &mut Criterion) {
    let exec = Executor::new(2);

    c.bench_function("ping_pong_10k_two_workers", |b| {
        b.iter(|| {
            let h1 = exec
                .try_spawn(async {
                    for _ in 0..PINGS {
                        yield_now().await;
                    }
                })
                .unwrap();
            let h2 = exec
                .try_spawn(async {
                    for _ in 0..PINGS {
                        yield_now().await;
                    }
                })
                .unwrap();

            h1.wait().unwrap();
            h2.wait().unwrap();
        });
    });
}

criterion_group!(
    benches,
    ping_10k_single_worker,
    ping_pong_10k_single_worker,
    ping_pong_10k_two_workers
);
criterion_main!(benches);
