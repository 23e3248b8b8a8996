use async_io::Timer;
use futures_core::Stream;
use pin_project::pin_project;
use slab::Slab;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use super::retry::{back_off, give_up};
use super::timeout::timeout;
use crate::asyncerator::{Asyncerator, BoxFuture};
use crate::config::{
    DynamicOptions, DYNAMIC_ADJUST_PERIOD, DYNAMIC_HIGH_CUTOFF, DYNAMIC_LOW_CUTOFF,
    DYNAMIC_SAMPLE_SIZE,
};
use crate::error::Error;

/// Run `worker` over every value with a concurrency that adapts to how the
/// work behaves, emitting results in the order they complete.
///
/// Concurrency starts at [`DynamicOptions::min`]. Every failed attempt
/// halves it and puts the value back to be retried under the configured
/// [`RetryOptions`][crate::config::RetryOptions]. At most once per
/// [`DYNAMIC_ADJUST_PERIOD`] it is raised by a tenth while the average
/// latency of recent work stays low, and lowered by a tenth once it grows
/// past three times the fastest one. A failure carrying
/// [`Error::retry_after`] pauses new work for the requested time, scaled
/// by the throughput of the last period. Progress is logged once per
/// period under the `asyncerator::dynamic` target.
///
/// A value that fails every attempt ends the sequence with
/// [`Error::RetryExhausted`].
///
/// # Example
///
/// ```rust
/// use asyncerator::config::DynamicOptions;
/// use asyncerator::{from, worker, Error};
/// use futures_lite::future::block_on;
///
/// # block_on(async {
/// let mut out = from(vec!["a", "bb", "ccc"])
///     .pipe(worker::dynamic(
///         |word: &'static str| async move { Ok::<_, Error>(word.len()) },
///         DynamicOptions::default(),
///     ))
///     .to_array()
///     .await?;
/// out.sort();
/// assert_eq!(out, [1, 2, 3]);
/// # Ok::<(), asyncerator::Error>(())
/// # }).unwrap();
/// ```
pub fn dynamic<'a, T, U, E, W, Fut>(
    worker: W,
    options: DynamicOptions,
) -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, U>
where
    T: Clone + Send + 'a,
    U: Send + 'a,
    E: Into<Error> + 'a,
    W: Fn(T) -> Fut + Send + Sync + 'a,
    Fut: Future<Output = Result<U, E>> + Send + 'a,
{
    move |upstream| {
        Asyncerator::new(Dynamic {
            upstream,
            worker: Arc::new(worker),
            options,
            control: Control::new(&options, options.now()),
            next_index: 0,
            retries: Vec::new(),
            pending: Slab::new(),
            ready: VecDeque::new(),
            waiting: None,
            upstream_done: false,
            upstream_error: None,
            failure: None,
        })
    }
}

struct Work<T> {
    item: T,
    index: usize,
    attempts: u32,
}

struct Settled<T, U> {
    work: Work<T>,
    elapsed: Duration,
    result: Result<U, Error>,
}

fn attempt<'a, T, U, E, W, Fut>(
    worker: &Arc<W>,
    work: Work<T>,
    options: DynamicOptions,
) -> BoxFuture<'a, Settled<T, U>>
where
    T: Clone + Send + 'a,
    U: Send + 'a,
    E: Into<Error> + 'a,
    W: Fn(T) -> Fut + Send + Sync + 'a,
    Fut: Future<Output = Result<U, E>> + Send + 'a,
{
    let worker = worker.clone();
    Box::pin(async move {
        back_off(options.retry(), work.attempts).await;
        let started = options.now();
        let result = timeout(options.timeout(), worker(work.item.clone())).await;
        let elapsed = options.now().saturating_duration_since(started);
        Settled {
            work,
            elapsed,
            result,
        }
    })
}

/// The adjustable ceiling and the measurements it is steered by.
#[derive(Debug)]
struct Control {
    allowed: usize,
    min: usize,
    max: usize,
    times: VecDeque<Duration>,
    last_change: Instant,
    delay: Duration,
    stats: Throughput,
}

impl Control {
    fn new(options: &DynamicOptions, now: Instant) -> Self {
        Self {
            allowed: options.min(),
            min: options.min(),
            max: options.max(),
            times: VecDeque::with_capacity(DYNAMIC_SAMPLE_SIZE),
            last_change: now,
            delay: Duration::ZERO,
            stats: Throughput::new(now),
        }
    }

    fn on_success(&mut self, elapsed: Duration, now: Instant) {
        self.stats.record(elapsed);
        self.times.push_back(elapsed);
        if self.times.len() > DYNAMIC_SAMPLE_SIZE {
            self.times.pop_front();
        }
        if now.saturating_duration_since(self.last_change) <= DYNAMIC_ADJUST_PERIOD {
            return;
        }
        self.last_change = now;

        let fastest = self.times.iter().copied().min().unwrap_or_default();
        let average = self.times.iter().sum::<Duration>() / self.times.len() as u32;
        let before = self.allowed;
        if (average < DYNAMIC_LOW_CUTOFF || average < fastest.saturating_mul(2))
            && average < DYNAMIC_HIGH_CUTOFF
        {
            self.allowed = ((self.allowed * 11 + 9) / 10).min(self.max);
        }
        if (average >= DYNAMIC_LOW_CUTOFF && average > fastest.saturating_mul(3))
            || average > DYNAMIC_HIGH_CUTOFF
        {
            self.allowed = (self.allowed * 10 / 11).max(self.min);
        }
        if self.allowed != before {
            tracing::debug!(
                target: "asyncerator::dynamic",
                from = before,
                to = self.allowed,
                average_ms = average.as_millis() as u64,
                "adjusted concurrency"
            );
        }
    }

    fn on_failure(&mut self, err: &Error) {
        self.stats.errors += 1;
        self.times.clear();
        self.allowed = (self.allowed / 2).max(self.min);
        if let Some(delay) = err.retry_after() {
            self.delay = self.delay.saturating_add(delay);
            tracing::debug!(
                target: "asyncerator::dynamic",
                delay_ms = self.delay.as_millis() as u64,
                "throttled"
            );
        }
    }

    /// The pause owed before starting more work, if any.
    fn take_wait(&mut self) -> Option<Duration> {
        if self.delay.is_zero() {
            return None;
        }
        let delay = std::mem::take(&mut self.delay);
        let scale = u32::try_from(self.stats.prior_window).unwrap_or(u32::MAX);
        Some(if scale == 0 {
            delay
        } else {
            delay.saturating_mul(scale)
        })
    }
}

/// Completions per period, for the progress log and the pause scaling.
#[derive(Debug)]
struct Throughput {
    done: u64,
    errors: u64,
    window_start: Instant,
    window_done: u64,
    window_fastest: Duration,
    window_slowest: Duration,
    window_total: Duration,
    prior_window: u64,
}

impl Throughput {
    fn new(now: Instant) -> Self {
        Self {
            done: 0,
            errors: 0,
            window_start: now,
            window_done: 0,
            window_fastest: Duration::MAX,
            window_slowest: Duration::ZERO,
            window_total: Duration::ZERO,
            prior_window: 0,
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.done += 1;
        self.window_done += 1;
        self.window_fastest = self.window_fastest.min(elapsed);
        self.window_slowest = self.window_slowest.max(elapsed);
        self.window_total = self.window_total.saturating_add(elapsed);
    }

    /// Close the current period once it has run its course.
    fn tick(&mut self, now: Instant, in_flight: usize) {
        if now.saturating_duration_since(self.window_start) < DYNAMIC_ADJUST_PERIOD {
            return;
        }
        self.report(in_flight);
        self.prior_window = self.window_done;
        self.window_start = now;
        self.window_done = 0;
        self.window_fastest = Duration::MAX;
        self.window_slowest = Duration::ZERO;
        self.window_total = Duration::ZERO;
    }

    fn report(&self, in_flight: usize) {
        if self.window_done == 0 {
            return;
        }
        let average = self.window_total / u32::try_from(self.window_done).unwrap_or(u32::MAX);
        tracing::debug!(
            target: "asyncerator::dynamic",
            done = self.done,
            errors = self.errors,
            in_flight,
            per_period = self.window_done,
            fastest_ms = self.window_fastest.as_millis() as u64,
            average_ms = average.as_millis() as u64,
            slowest_ms = self.window_slowest.as_millis() as u64,
            "progress"
        );
    }
}

#[pin_project]
struct Dynamic<'a, T, U, W> {
    #[pin]
    upstream: Asyncerator<'a, T>,
    worker: Arc<W>,
    options: DynamicOptions,
    control: Control,
    next_index: usize,
    retries: Vec<Work<T>>,
    pending: Slab<BoxFuture<'a, Settled<T, U>>>,
    ready: VecDeque<U>,
    waiting: Option<Timer>,
    upstream_done: bool,
    upstream_error: Option<Error>,
    failure: Option<Error>,
}

impl<'a, T, U, E, W, Fut> Stream for Dynamic<'a, T, U, W>
where
    T: Clone + Send + 'a,
    U: Send + 'a,
    E: Into<Error> + 'a,
    W: Fn(T) -> Fut + Send + Sync + 'a,
    Fut: Future<Output = Result<U, E>> + Send + 'a,
{
    type Item = Result<U, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            // Start work while below the current ceiling.
            while this.failure.is_none() && this.pending.len() + this.ready.len() < this.control.allowed
            {
                if let Some(timer) = this.waiting.as_mut() {
                    if Pin::new(timer).poll(cx).is_pending() {
                        break;
                    }
                    *this.waiting = None;
                }
                let work = match this.retries.pop() {
                    Some(work) => work,
                    None if *this.upstream_done => break,
                    None => match this.upstream.as_mut().poll_next(cx) {
                        Poll::Ready(Some(Ok(item))) => {
                            let index = *this.next_index;
                            *this.next_index += 1;
                            Work {
                                item,
                                index,
                                attempts: 0,
                            }
                        }
                        Poll::Ready(Some(Err(err))) => {
                            *this.upstream_done = true;
                            *this.upstream_error = Some(err);
                            break;
                        }
                        Poll::Ready(None) => {
                            *this.upstream_done = true;
                            break;
                        }
                        Poll::Pending => break,
                    },
                };
                if let Some(wait) = this.control.take_wait() {
                    tracing::debug!(
                        target: "asyncerator::dynamic",
                        wait_ms = wait.as_millis() as u64,
                        "pausing before more work"
                    );
                    *this.waiting = Some(Timer::after(wait));
                    this.retries.push(work);
                    continue;
                }
                this.pending.insert(attempt(this.worker, work, *this.options));
            }

            let mut settled = Vec::new();
            this.pending.retain(|_, fut| match fut.as_mut().poll(cx) {
                Poll::Ready(out) => {
                    settled.push(out);
                    false
                }
                Poll::Pending => true,
            });
            if settled.is_empty() {
                break;
            }

            let now = this.options.now();
            for Settled {
                work,
                elapsed,
                result,
            } in settled
            {
                match result {
                    Ok(value) => {
                        this.ready.push_back(value);
                        this.control.on_success(elapsed, now);
                    }
                    Err(err) if work.attempts >= this.options.retry().retries() => {
                        if this.failure.is_none() {
                            *this.failure = Some(give_up(this.options.retry(), err));
                        }
                    }
                    Err(err) => {
                        tracing::debug!(
                            target: "asyncerator::dynamic",
                            index = work.index,
                            attempt = work.attempts,
                            error = %err,
                            "item failed, lowering concurrency"
                        );
                        this.control.on_failure(&err);
                        this.retries.push(Work {
                            attempts: work.attempts + 1,
                            ..work
                        });
                    }
                }
            }
            this.control.stats.tick(now, this.pending.len());

            if this.failure.is_some() {
                if !this.pending.is_empty() {
                    tracing::debug!(
                        target: "asyncerator::dynamic",
                        abandoned = this.pending.len(),
                        "giving up, dropping in-flight work"
                    );
                    this.pending.clear();
                }
                break;
            }
        }

        if let Some(value) = this.ready.pop_front() {
            return Poll::Ready(Some(Ok(value)));
        }
        if let Some(err) = this.failure.take() {
            *this.upstream_done = true;
            this.upstream_error.take();
            this.retries.clear();
            *this.waiting = None;
            return Poll::Ready(Some(Err(err)));
        }
        if *this.upstream_done && this.pending.is_empty() && this.retries.is_empty() {
            this.control.stats.report(0);
            return Poll::Ready(this.upstream_error.take().map(Err));
        }
        Poll::Pending
    }
}
