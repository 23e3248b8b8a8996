use futures_core::Stream;
use futures_lite::StreamExt;
use slab::Slab;
use smallvec::SmallVec;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::asyncerator::{Asyncerator, BoxFuture};
use crate::error::Error;
use crate::source::IntoAsyncerator;
use crate::utils::RandomGenerator;

/// One element produced by a merged source.
///
/// A plain value is emitted as-is, a future is awaited and its output
/// emitted, and a nested sequence is merged in alongside the other sources.
pub enum Mergeable<'a, T> {
    /// A value emitted directly.
    Value(T),
    /// A future whose output is emitted once it resolves.
    Future(BoxFuture<'a, Result<T, Error>>),
    /// A sequence merged in as a source of its own.
    Sequence(Asyncerator<'a, Mergeable<'a, T>>),
}

impl<'a, T: Send + 'a> Mergeable<'a, T> {
    /// Wrap a value.
    pub fn value(value: T) -> Self {
        Self::Value(value)
    }

    /// Wrap a fallible future.
    pub fn future<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'a,
        E: Into<Error> + 'a,
    {
        Self::Future(Box::pin(async move { future.await.map_err(Into::<Error>::into) }))
    }

    /// Wrap anything convertible into a sequence of mergeable elements.
    pub fn sequence<S>(source: S) -> Self
    where
        S: IntoAsyncerator<'a>,
        S::Item: Into<Mergeable<'a, T>> + Send + 'a,
    {
        Self::Sequence(source.into_asyncerator().map(Into::into))
    }
}

impl<'a, T> From<T> for Mergeable<'a, T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Mergeable<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Future(_) => f.debug_tuple("Future").field(&"..").finish(),
            Self::Sequence(seq) => f.debug_tuple("Sequence").field(seq).finish(),
        }
    }
}

/// Interleave any number of sources, emitting values as they become
/// available.
///
/// Sources may yield futures, which are awaited before their output is
/// emitted, and nested sequences, which join the merge for as long as they
/// run. Values from a single source keep their relative order. The first
/// failure of any source ends the whole merge.
///
/// # Example
///
/// ```rust
/// use asyncerator::{from, merge, Mergeable};
/// use futures_lite::future::block_on;
///
/// # block_on(async {
/// let nested = Mergeable::sequence(vec![2, 3]);
/// let mut out: Vec<i32> = merge([
///     from(vec![Mergeable::value(1), nested]),
///     from(vec![Mergeable::value(4)]),
/// ])
/// .to_array()
/// .await?;
/// out.sort();
/// assert_eq!(out, [1, 2, 3, 4]);
/// # Ok::<(), asyncerator::Error>(())
/// # }).unwrap();
/// ```
pub fn merge<'a, T, I, S>(sources: I) -> Asyncerator<'a, T>
where
    T: Send + 'a,
    I: IntoIterator<Item = S>,
    S: IntoAsyncerator<'a>,
    S::Item: Into<Mergeable<'a, T>> + Send + 'a,
{
    let mut entries = Slab::new();
    for source in sources {
        entries.insert(Entry::new(source.into_asyncerator().map(Into::into)));
    }
    Asyncerator::new(Merge {
        entries,
        rng: RandomGenerator::new(),
    })
}

struct Entry<'a, T> {
    source: Asyncerator<'a, Mergeable<'a, T>>,
    awaiting: Option<BoxFuture<'a, Result<T, Error>>>,
}

enum Step<'a, T> {
    Value(T),
    Nested(Asyncerator<'a, Mergeable<'a, T>>),
}

impl<'a, T> Entry<'a, T> {
    fn new(source: Asyncerator<'a, Mergeable<'a, T>>) -> Self {
        Self {
            source,
            awaiting: None,
        }
    }

    fn poll_step(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Step<'a, T>, Error>>> {
        loop {
            // A pending future blocks its own source, keeping the source's order.
            if let Some(fut) = self.awaiting.as_mut() {
                let out = match fut.as_mut().poll(cx) {
                    Poll::Ready(out) => out,
                    Poll::Pending => return Poll::Pending,
                };
                self.awaiting = None;
                return Poll::Ready(Some(out.map(Step::Value)));
            }
            return match self.source.poll_next(cx) {
                Poll::Ready(Some(Ok(Mergeable::Value(value)))) => {
                    Poll::Ready(Some(Ok(Step::Value(value))))
                }
                Poll::Ready(Some(Ok(Mergeable::Future(fut)))) => {
                    self.awaiting = Some(fut);
                    continue;
                }
                Poll::Ready(Some(Ok(Mergeable::Sequence(seq)))) => {
                    Poll::Ready(Some(Ok(Step::Nested(seq))))
                }
                Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(err))),
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            };
        }
    }
}

struct Merge<'a, T> {
    entries: Slab<Entry<'a, T>>,
    rng: RandomGenerator,
}

impl<T> Stream for Merge<'_, T> {
    type Item = Result<T, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.entries.is_empty() {
                return Poll::Ready(None);
            }

            let keys: SmallVec<[usize; 16]> = this.entries.iter().map(|(key, _)| key).collect();
            let start = this.rng.generate(keys.len() as u32) as usize;
            let mut discovered = SmallVec::<[Asyncerator<'_, Mergeable<'_, T>>; 2]>::new();
            let mut progressed = false;
            let mut emitted = None;

            for index in 0..keys.len() {
                let key = keys[(start + index) % keys.len()];
                match this.entries[key].poll_step(cx) {
                    Poll::Ready(Some(Ok(Step::Value(value)))) => {
                        emitted = Some(value);
                        break;
                    }
                    Poll::Ready(Some(Ok(Step::Nested(seq)))) => {
                        discovered.push(seq);
                        progressed = true;
                    }
                    Poll::Ready(Some(Err(err))) => {
                        tracing::debug!(
                            target: "asyncerator::merge",
                            abandoned = this.entries.len() - 1 + discovered.len(),
                            "source failed, releasing remaining sources"
                        );
                        this.entries.clear();
                        return Poll::Ready(Some(Err(err)));
                    }
                    Poll::Ready(None) => {
                        this.entries.remove(key);
                        progressed = true;
                    }
                    Poll::Pending => {}
                }
            }

            for seq in discovered {
                let key = this.entries.insert(Entry::new(seq));
                tracing::trace!(target: "asyncerator::merge", key, "admitted nested source");
            }

            if let Some(value) = emitted {
                return Poll::Ready(Some(Ok(value)));
            }
            if !progressed {
                return Poll::Pending;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::from_iter;
    use futures_lite::future::block_on;

    #[test]
    fn empty_and_single() {
        block_on(async {
            let none: Vec<Asyncerator<'static, u8>> = vec![];
            let out: Vec<u8> = merge(none).to_array().await.unwrap();
            assert!(out.is_empty());
            let out: Vec<u8> = merge([from_iter(vec![1, 2, 3])]).to_array().await.unwrap();
            assert_eq!(out, [1, 2, 3]);
        })
    }

    #[test]
    fn keeps_per_source_order() {
        block_on(async {
            let out: Vec<u32> = merge([from_iter(0..50), from_iter(100..150)])
                .to_array()
                .await
                .unwrap();
            let low: Vec<_> = out.iter().copied().filter(|n| *n < 100).collect();
            let high: Vec<_> = out.iter().copied().filter(|n| *n >= 100).collect();
            assert_eq!(low, (0..50).collect::<Vec<_>>());
            assert_eq!(high, (100..150).collect::<Vec<_>>());
        })
    }

    #[test]
    fn awaits_futures_and_nested_sources() {
        block_on(async {
            let inner = from_iter(vec![
                Mergeable::value(3),
                Mergeable::future(async { Ok::<_, Error>(4) }),
            ]);
            let outer = from_iter(vec![
                Mergeable::value(1),
                Mergeable::Sequence(inner),
                Mergeable::future(async { Ok::<_, Error>(2) }),
            ]);
            let mut out: Vec<i32> = merge([outer]).to_array().await.unwrap();
            out.sort_unstable();
            assert_eq!(out, [1, 2, 3, 4]);
        })
    }

    #[test]
    fn first_failure_ends_merge() {
        block_on(async {
            let failing = from_iter(vec![Mergeable::future(async {
                Err::<u8, _>(Error::other("rejected"))
            })]);
            let mut seq: Asyncerator<'_, u8> = merge([failing, from_iter(vec![Mergeable::value(1)])]);
            let mut saw_error = false;
            while let Some(item) = seq.next().await {
                if item.is_err() {
                    saw_error = true;
                }
            }
            assert!(saw_error);
            assert!(seq.next().await.is_none());
        })
    }
}
