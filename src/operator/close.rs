use futures_core::Stream;
use pin_project::pin_project;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use crate::asyncerator::Asyncerator;
use crate::error::Error;

/// End the sequence at the first value matching `predicate`, without
/// emitting that value. The upstream is released immediately.
pub fn close_before<'a, T, F>(predicate: F) -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, T>
where
    T: Send + 'a,
    F: FnMut(&T) -> bool + Send + 'a,
{
    move |upstream| {
        Asyncerator::new(CloseWhen {
            upstream,
            predicate,
            inclusive: false,
        })
    }
}

/// End the sequence right after emitting the first value matching
/// `predicate`. The upstream is released immediately.
pub fn close_after<'a, T, F>(predicate: F) -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, T>
where
    T: Send + 'a,
    F: FnMut(&T) -> bool + Send + 'a,
{
    move |upstream| {
        Asyncerator::new(CloseWhen {
            upstream,
            predicate,
            inclusive: true,
        })
    }
}

#[pin_project]
struct CloseWhen<'a, T, F> {
    #[pin]
    upstream: Asyncerator<'a, T>,
    predicate: F,
    inclusive: bool,
}

impl<T, F> Stream for CloseWhen<'_, T, F>
where
    F: FnMut(&T) -> bool,
{
    type Item = Result<T, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        match ready!(this.upstream.as_mut().poll_next(cx)) {
            Some(Ok(item)) if (this.predicate)(&item) => {
                this.upstream.get_mut().close();
                Poll::Ready(this.inclusive.then_some(Ok(item)))
            }
            other => Poll::Ready(other),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::source::from_stream;
    use futures_lite::future::block_on;
    use futures_lite::{stream, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn closes_around_the_match() {
        block_on(async {
            let before = from_stream(stream::iter(1..)).close_before(|n| *n == 4);
            assert_eq!(before.to_array().await.unwrap(), [1, 2, 3]);
            let after = from_stream(stream::iter(1..)).close_after(|n| *n == 4);
            assert_eq!(after.to_array().await.unwrap(), [1, 2, 3, 4]);
        })
    }

    #[test]
    fn stops_pulling_upstream() {
        block_on(async {
            let pulled = Arc::new(AtomicUsize::new(0));
            let counter = pulled.clone();
            let upstream = from_stream(stream::repeat(()).map(move |()| {
                counter.fetch_add(1, Ordering::SeqCst) + 1
            }));
            let out = upstream.close_after(|n| *n == 2).to_array().await.unwrap();
            assert_eq!(out, [1, 2]);
            assert_eq!(pulled.load(Ordering::SeqCst), 2);
        })
    }
}
