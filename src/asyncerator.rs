use futures_core::stream::{FusedStream, Stream};
use futures_lite::StreamExt;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::chunk::Chunk;
use crate::config::{Concurrency, DynamicOptions};
use crate::error::{BoxError, Error};
use crate::operator;
use crate::sink;
use crate::source::{self, IntoAsyncerator, Shared};
use crate::worker;

/// An owned, boxed future, as handed around between workers and sources.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub(crate) type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T, Error>> + Send + 'a>>;

/// The canonical lazy, pull-based async sequence.
///
/// Every value is delivered as `Ok(T)`. A failure is delivered once as
/// `Err(Error)`, after which the sequence is finished. Once finished, every
/// further poll yields `None`.
///
/// # Example
///
/// ```rust
/// use asyncerator::from;
/// use futures_lite::future::block_on;
///
/// # block_on(async {
/// let out = from(vec![1, 2, 3]).map(|n| n * 2).to_array().await?;
/// assert_eq!(out, vec![2, 4, 6]);
/// # Ok::<(), asyncerator::Error>(())
/// # }).unwrap();
/// ```
#[must_use = "sequences do nothing unless polled"]
pub struct Asyncerator<'a, T> {
    inner: Option<BoxStream<'a, T>>,
    thrown: Option<Error>,
}

impl<'a, T> Asyncerator<'a, T> {
    /// Wrap a fallible stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, Error>> + Send + 'a,
    {
        Self::from_boxed(Box::pin(stream))
    }

    pub(crate) fn from_boxed(stream: BoxStream<'a, T>) -> Self {
        Self {
            inner: Some(stream),
            thrown: None,
        }
    }

    /// A sequence that is already finished.
    pub fn empty() -> Self {
        Self {
            inner: None,
            thrown: None,
        }
    }

    /// A sequence that yields `error` once and then finishes.
    pub fn failed(error: impl Into<Error>) -> Self {
        Self {
            inner: None,
            thrown: Some(error.into()),
        }
    }

    /// End the sequence early.
    ///
    /// Dropping the upstream chain releases every source feeding this
    /// sequence. Later polls yield `None`.
    pub fn close(&mut self) {
        self.inner = None;
        self.thrown = None;
    }

    /// Inject a failure.
    ///
    /// The upstream chain is released and the next poll yields `Err(error)`.
    pub fn throw(&mut self, error: impl Into<Error>) {
        self.inner = None;
        self.thrown = Some(error.into());
    }

    /// Apply a single pipeline stage.
    pub fn pipe<R, F>(self, stage: F) -> R
    where
        F: FnOnce(Self) -> R,
    {
        stage(self)
    }

    /// Address of the boxed upstream, used to check that adaptation never
    /// double-wraps.
    #[cfg(test)]
    pub(crate) fn addr(&self) -> Option<*const ()> {
        self.inner
            .as_ref()
            .map(|s| &**s as *const (dyn Stream<Item = Result<T, Error>> + Send + 'a) as *const ())
    }
}

impl<'a, T: Send + 'a> Asyncerator<'a, T> {
    /// Turn this sequence into a handle that can be cloned and polled from
    /// several places, each value going to whichever clone pulls it first.
    pub fn share(self) -> Shared<'a, T> {
        Shared::new(self)
    }

    /// Transform each value.
    pub fn map<U, F>(self, f: F) -> Asyncerator<'a, U>
    where
        U: Send + 'a,
        F: FnMut(T) -> U + Send + 'a,
    {
        operator::map(f)(self)
    }

    /// Keep the values matching `predicate`.
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: FnMut(&T) -> bool + Send + 'a,
    {
        operator::filter(predicate)(self)
    }

    /// Flatten one level of nesting.
    pub fn flat(self) -> Asyncerator<'a, T::Item>
    where
        T: IntoIterator,
        T::IntoIter: Send + 'a,
        T::Item: Send + 'a,
    {
        operator::flat()(self)
    }

    /// Observe each value as it passes.
    pub fn for_each<F>(self, f: F) -> Self
    where
        F: FnMut(&T) + Send + 'a,
    {
        operator::for_each(f)(self)
    }

    /// Emit `value` ahead of the upstream values.
    pub fn before(self, value: T) -> Self {
        operator::before(value)(self)
    }

    /// Emit `value` once the upstream completes without error.
    pub fn after(self, value: T) -> Self {
        operator::after(value)(self)
    }

    /// Drop the first `count` values.
    pub fn skip(self, count: usize) -> Self {
        operator::skip(count)(self)
    }

    /// End the sequence, without emitting it, at the first value matching
    /// `predicate`.
    pub fn close_before<F>(self, predicate: F) -> Self
    where
        F: FnMut(&T) -> bool + Send + 'a,
    {
        operator::close_before(predicate)(self)
    }

    /// End the sequence right after emitting the first value matching
    /// `predicate`.
    pub fn close_after<F>(self, predicate: F) -> Self
    where
        F: FnMut(&T) -> bool + Send + 'a,
    {
        operator::close_after(predicate)(self)
    }

    /// Split the concatenated text of every chunk on `separator`.
    pub fn split(self, separator: &str, limit: Option<usize>) -> Asyncerator<'a, String>
    where
        T: Chunk,
    {
        operator::split(separator, limit)(self)
    }

    /// Interleave the results of `f(0)`, `f(1)`, ... with the upstream values
    /// until the upstream completes.
    pub fn sequence<E, F, Fut>(self, f: F) -> Self
    where
        E: Into<Error>,
        F: FnMut(usize) -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
    {
        operator::sequence(f)(self)
    }

    /// Run `worker` over the values with the default concurrency, yielding
    /// results in completion order.
    pub fn race<U, E, F, Fut>(self, worker: F) -> Asyncerator<'a, U>
    where
        U: Send + 'a,
        E: Into<Error> + 'a,
        F: FnMut(T) -> Fut + Send + 'a,
        Fut: Future<Output = Result<U, E>> + Send + 'a,
    {
        self.race_with(Concurrency::default(), worker)
    }

    /// Run `worker` over the values with at most `limit` in flight, yielding
    /// results in completion order.
    pub fn race_with<U, E, F, Fut>(self, limit: Concurrency, worker: F) -> Asyncerator<'a, U>
    where
        U: Send + 'a,
        E: Into<Error> + 'a,
        F: FnMut(T) -> Fut + Send + 'a,
        Fut: Future<Output = Result<U, E>> + Send + 'a,
    {
        operator::race_with(limit, worker)(self)
    }

    /// Run `worker` over the values with adaptive concurrency and retries,
    /// yielding results in completion order.
    ///
    /// See [`worker::dynamic`][crate::worker::dynamic] for tuning.
    pub fn map_dynamic<U, E, W, Fut>(self, worker: W) -> Asyncerator<'a, U>
    where
        T: Clone,
        U: Send + 'a,
        E: Into<Error> + 'a,
        W: Fn(T) -> Fut + Send + Sync + 'a,
        Fut: Future<Output = Result<U, E>> + Send + 'a,
    {
        worker::dynamic(worker, DynamicOptions::default())(self)
    }

    /// Interleave the values of this sequence and `other` as they arrive.
    pub fn merge<S>(self, other: S) -> Self
    where
        S: IntoAsyncerator<'a, Item = T>,
    {
        source::merge([self, other.into_asyncerator()])
    }

    /// Turn an upstream failure into a normal end, reporting it to `hook`.
    pub fn on_error<E, F>(self, hook: F) -> Self
    where
        E: Into<BoxError>,
        F: FnOnce(&Error) -> Result<(), E> + Send + 'a,
    {
        operator::on_error(hook)(self)
    }

    /// Call `hook` once the upstream completes without error.
    pub fn on_complete<E, F>(self, hook: F) -> Self
    where
        E: Into<BoxError>,
        F: FnOnce() -> Result<(), E> + Send + 'a,
    {
        operator::on_complete(hook)(self)
    }

    /// Collect every value.
    pub async fn to_array(self) -> Result<Vec<T>, Error> {
        StreamExt::try_collect(self).await
    }

    /// Concatenate every chunk into a string.
    pub async fn to_string(self) -> Result<String, Error>
    where
        T: Chunk,
    {
        sink::to_string(self).await
    }

    /// Fold the values, passing each value's index to `f`.
    pub async fn reduce<A, F>(self, f: F, initial: A) -> Result<A, Error>
    where
        A: Send + 'a,
        F: FnMut(A, T, usize) -> A + Send + 'a,
    {
        sink::reduce(f, initial)(self).await
    }

    /// Pull the sequence to its end, discarding the values.
    pub async fn drain(self) -> Result<(), Error> {
        sink::to_null(self).await
    }
}

impl<T> Stream for Asyncerator<'_, T> {
    type Item = Result<T, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(error) = this.thrown.take() {
            return Poll::Ready(Some(Err(error)));
        }
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(value))) => Poll::Ready(Some(Ok(value))),
            Poll::Ready(Some(Err(error))) => {
                this.inner = None;
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                this.inner = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match (&self.inner, &self.thrown) {
            (_, Some(_)) => (1, Some(1)),
            (Some(inner), None) => inner.size_hint(),
            (None, None) => (0, Some(0)),
        }
    }
}

impl<T> FusedStream for Asyncerator<'_, T> {
    fn is_terminated(&self) -> bool {
        self.inner.is_none() && self.thrown.is_none()
    }
}

impl<T> Default for Asyncerator<'_, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> fmt::Debug for Asyncerator<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asyncerator")
            .field("terminated", &self.is_terminated())
            .field("thrown", &self.thrown)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures_lite::future::block_on;
    use futures_lite::stream;

    #[test]
    fn terminal_after_error() {
        block_on(async {
            let mut seq = Asyncerator::new(stream::iter(vec![
                Ok(1),
                Err(Error::other("boom")),
                Ok(2),
            ]));
            assert_eq!(seq.next().await.transpose().ok().flatten(), Some(1));
            assert!(matches!(seq.next().await, Some(Err(Error::Other(_)))));
            assert!(seq.is_terminated());
            assert!(seq.next().await.is_none());
            assert!(seq.next().await.is_none());
        })
    }

    #[test]
    fn close_releases_upstream() {
        block_on(async {
            let mut seq = Asyncerator::new(stream::repeat(7).map(Ok));
            assert!(matches!(seq.next().await, Some(Ok(7))));
            seq.close();
            assert!(seq.next().await.is_none());
        })
    }

    #[test]
    fn throw_yields_once() {
        block_on(async {
            let mut seq = Asyncerator::new(stream::repeat(7).map(Ok));
            seq.throw(Error::Timeout(std::time::Duration::from_secs(1)));
            assert!(matches!(seq.next().await, Some(Err(Error::Timeout(_)))));
            assert!(seq.next().await.is_none());
        })
    }

    #[test]
    fn failed_and_empty() {
        block_on(async {
            assert!(Asyncerator::<u8>::empty().to_array().await.unwrap().is_empty());
            let err = Asyncerator::<u8>::failed(Error::NotConvertible("None"))
                .to_array()
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "None not convertible to a string");
        })
    }
}
