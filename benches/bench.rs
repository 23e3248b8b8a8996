use asyncerator::config::Concurrency;
use asyncerator::{from_stream, merge, Asyncerator, Error};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use futures_core::Stream;
use futures_lite::future::{block_on, yield_now};
use futures_lite::StreamExt;
use pin_project::pin_project;

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("merge 10", |b| b.iter(|| merge_test(black_box(10))));
    c.bench_function("merge 100", |b| b.iter(|| merge_test(black_box(100))));
    c.bench_function("merge 1000", |b| b.iter(|| merge_test(black_box(1000))));
    c.bench_function("race 1000 / 16", |b| {
        b.iter(|| race_test(black_box(1000), black_box(16)))
    });
    c.bench_function("race 1000 / 128", |b| {
        b.iter(|| race_test(black_box(1000), black_box(128)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

pub(crate) fn merge_test(max: usize) {
    block_on(async {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let streams: Vec<Asyncerator<'_, ()>> = (0..max)
            .map(|n| from_stream(Countdown::new(n, max, shared.clone())))
            .collect();
        let mut s: Asyncerator<'_, ()> = merge(streams);

        let mut counter = 0;
        while s.next().await.is_some() {
            counter += 1;
        }
        assert_eq!(counter, max);
    })
}

pub(crate) fn race_test(max: u32, limit: usize) {
    block_on(async {
        let limit = Concurrency::new(limit).unwrap();
        let out = asyncerator::from_iter(0..max)
            .race_with(limit, |n| async move {
                for _ in 0..n % 4 {
                    yield_now().await;
                }
                Ok::<_, Error>(n)
            })
            .reduce(|acc, _, _| acc + 1, 0u32)
            .await
            .unwrap();
        assert_eq!(out, max);
    })
}

#[derive(Default)]
struct Shared {
    wakers: Vec<Waker>,
    completed: usize,
}

#[derive(Clone, Copy)]
enum State {
    Init,
    Polled,
    Done,
}

/// A stream which will _eventually_ be ready, but needs to be polled N times
/// before it is. Streams complete strictly in index order.
#[pin_project]
struct Countdown {
    state: State,
    shared: Arc<Mutex<Shared>>,
    index: usize,
    max_count: usize,
}

impl Countdown {
    fn new(index: usize, max_count: usize, shared: Arc<Mutex<Shared>>) -> Self {
        Self {
            state: State::Init,
            shared,
            index,
            max_count,
        }
    }
}

impl Stream for Countdown {
    type Item = ();

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let mut shared = this.shared.lock().unwrap();

        // If we are the last stream to be polled, skip straight to the Polled state.
        if shared.wakers.len() + 1 == *this.max_count {
            *this.state = State::Polled;
        }

        match this.state {
            State::Init => {
                shared.wakers.push(cx.waker().clone());
                *this.state = State::Polled;
                Poll::Pending
            }
            State::Polled => {
                if let Some(waker) = shared.wakers.pop() {
                    waker.wake();
                }
                if shared.completed == *this.index {
                    *this.state = State::Done;
                    shared.completed += 1;
                    Poll::Ready(Some(()))
                } else {
                    shared.wakers.push(cx.waker().clone());
                    Poll::Pending
                }
            }
            State::Done => Poll::Ready(None),
        }
    }
}
