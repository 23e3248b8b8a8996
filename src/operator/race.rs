use futures_core::Stream;
use pin_project::pin_project;
use slab::Slab;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::asyncerator::{Asyncerator, BoxFuture};
use crate::config::Concurrency;
use crate::error::Error;

/// Run `worker` over every value with the default concurrency, emitting
/// results in the order they complete.
///
/// See [`race_with`] for the details.
pub fn race<'a, T, U, E, F, Fut>(worker: F) -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, U>
where
    T: Send + 'a,
    U: Send + 'a,
    E: Into<Error> + 'a,
    F: FnMut(T) -> Fut + Send + 'a,
    Fut: Future<Output = Result<U, E>> + Send + 'a,
{
    race_with(Concurrency::default(), worker)
}

/// Run `worker` over every value with at most `limit` invocations in
/// flight, emitting results in the order they complete.
///
/// Finished results waiting to be pulled count against `limit`, so a slow
/// consumer stops the upstream from being pulled. An upstream failure is
/// reported once the work already started has been delivered. A worker
/// failure is reported right after the results already finished, and the
/// remaining work is dropped.
///
/// # Example
///
/// ```rust
/// use asyncerator::{config::Concurrency, from, Error};
/// use futures_lite::future::block_on;
///
/// # block_on(async {
/// let limit = Concurrency::new(2)?;
/// let mut out = from(vec![1, 2, 3])
///     .race_with(limit, |n| async move { Ok::<_, Error>(n * 2) })
///     .to_array()
///     .await?;
/// out.sort();
/// assert_eq!(out, [2, 4, 6]);
/// # Ok::<(), asyncerator::Error>(())
/// # }).unwrap();
/// ```
pub fn race_with<'a, T, U, E, F, Fut>(
    limit: Concurrency,
    worker: F,
) -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, U>
where
    T: Send + 'a,
    U: Send + 'a,
    E: Into<Error> + 'a,
    F: FnMut(T) -> Fut + Send + 'a,
    Fut: Future<Output = Result<U, E>> + Send + 'a,
{
    move |upstream| {
        Asyncerator::new(Race {
            upstream,
            worker,
            pending: Slab::with_capacity(limit.get().min(64)),
            ready: VecDeque::new(),
            limit: limit.get(),
            upstream_done: false,
            upstream_error: None,
            failure: None,
        })
    }
}

#[pin_project]
struct Race<'a, T, U, F> {
    #[pin]
    upstream: Asyncerator<'a, T>,
    worker: F,
    pending: Slab<BoxFuture<'a, Result<U, Error>>>,
    ready: VecDeque<U>,
    limit: usize,
    upstream_done: bool,
    upstream_error: Option<Error>,
    failure: Option<Error>,
}

impl<'a, T, U, E, F, Fut> Stream for Race<'a, T, U, F>
where
    U: 'a,
    E: Into<Error> + 'a,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<U, E>> + Send + 'a,
{
    type Item = Result<U, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        // Start work while below the ceiling.
        while !*this.upstream_done
            && this.failure.is_none()
            && this.pending.len() + this.ready.len() < *this.limit
        {
            match this.upstream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(item))) => {
                    let fut = (this.worker)(item);
                    this.pending
                        .insert(Box::pin(async move { fut.await.map_err(Into::<Error>::into) }));
                }
                Poll::Ready(Some(Err(err))) => {
                    *this.upstream_done = true;
                    *this.upstream_error = Some(err);
                }
                Poll::Ready(None) => *this.upstream_done = true,
                Poll::Pending => break,
            }
        }

        // Collect everything that settled during this pass.
        let ready = &mut *this.ready;
        let failure = &mut *this.failure;
        this.pending.retain(|_, fut| match fut.as_mut().poll(cx) {
            Poll::Ready(Ok(value)) => {
                ready.push_back(value);
                false
            }
            Poll::Ready(Err(err)) => {
                failure.get_or_insert(err);
                false
            }
            Poll::Pending => true,
        });
        if this.failure.is_some() && !this.pending.is_empty() {
            tracing::debug!(
                target: "asyncerator::race",
                abandoned = this.pending.len(),
                "worker failed, dropping in-flight work"
            );
            this.pending.clear();
        }

        if let Some(value) = this.ready.pop_front() {
            return Poll::Ready(Some(Ok(value)));
        }
        if let Some(err) = this.failure.take() {
            *this.upstream_done = true;
            this.upstream_error.take();
            return Poll::Ready(Some(Err(err)));
        }
        if *this.upstream_done && this.pending.is_empty() {
            return Poll::Ready(this.upstream_error.take().map(Err));
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::from_iter;
    use futures_lite::future::{block_on, yield_now};
    use futures_lite::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn yields_every_result() {
        block_on(async {
            let mut out = from_iter(0..100u32)
                .race(|n| async move {
                    for _ in 0..n % 7 {
                        yield_now().await;
                    }
                    Ok::<_, Error>(n + 1)
                })
                .to_array()
                .await
                .unwrap();
            out.sort_unstable();
            assert_eq!(out, (1..=100).collect::<Vec<_>>());
        })
    }

    #[test]
    fn respects_the_ceiling() {
        block_on(async {
            let running = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));
            let (r, p) = (running.clone(), peak.clone());
            let out = from_iter(0..20u32)
                .race_with(Concurrency::new(3).unwrap(), move |n| {
                    let (r, p) = (r.clone(), p.clone());
                    async move {
                        let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                        p.fetch_max(now, Ordering::SeqCst);
                        yield_now().await;
                        yield_now().await;
                        r.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, Error>(n)
                    }
                })
                .to_array()
                .await
                .unwrap();
            assert_eq!(out.len(), 20);
            assert!(peak.load(Ordering::SeqCst) <= 3);
            assert_eq!(running.load(Ordering::SeqCst), 0);
        })
    }

    #[test]
    fn worker_failure_is_terminal() {
        block_on(async {
            let mut seq = from_iter(0..10u32).race(|n| async move {
                if n == 3 {
                    Err(Error::other("three"))
                } else {
                    Ok(n)
                }
            });
            let mut errors = 0;
            while let Some(item) = seq.next().await {
                if item.is_err() {
                    errors += 1;
                }
            }
            assert_eq!(errors, 1);
            assert!(seq.next().await.is_none());
        })
    }

    #[test]
    fn upstream_failure_after_in_flight_work() {
        block_on(async {
            let upstream = Asyncerator::new(futures_lite::stream::iter(vec![
                Ok(1u32),
                Ok(2),
                Err(Error::other("upstream")),
            ]));
            let mut seq = upstream.race(|n| async move {
                yield_now().await;
                Ok::<_, Error>(n)
            });
            let mut values = vec![];
            loop {
                match seq.next().await {
                    Some(Ok(n)) => values.push(n),
                    Some(Err(_)) => break,
                    None => panic!("error was not reported"),
                }
            }
            values.sort_unstable();
            assert_eq!(values, [1, 2]);
            assert!(seq.next().await.is_none());
        })
    }
}
