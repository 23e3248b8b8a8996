use futures_core::Stream;
use pin_project::pin_project;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use crate::asyncerator::Asyncerator;
use crate::error::Error;

/// Emit `value` once the upstream completes.
///
/// Nothing is emitted if the upstream fails.
pub fn after<'a, T>(value: T) -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, T>
where
    T: Send + 'a,
{
    move |upstream| {
        Asyncerator::new(After {
            upstream,
            value: Some(value),
        })
    }
}

#[pin_project]
struct After<'a, T> {
    #[pin]
    upstream: Asyncerator<'a, T>,
    value: Option<T>,
}

impl<T> Stream for After<'_, T> {
    type Item = Result<T, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match ready!(this.upstream.poll_next(cx)) {
            Some(Ok(item)) => Poll::Ready(Some(Ok(item))),
            Some(Err(err)) => {
                this.value.take();
                Poll::Ready(Some(Err(err)))
            }
            None => Poll::Ready(this.value.take().map(Ok)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::from_iter;
    use futures_lite::future::block_on;
    use futures_lite::{stream, StreamExt};

    #[test]
    fn appends_on_completion() {
        block_on(async {
            let out = from_iter(vec![1, 2]).after(3).to_array().await.unwrap();
            assert_eq!(out, [1, 2, 3]);
            let out = Asyncerator::empty().after("only").to_array().await.unwrap();
            assert_eq!(out, ["only"]);
        })
    }

    #[test]
    fn skipped_after_failure() {
        block_on(async {
            let upstream = Asyncerator::new(stream::iter(vec![Ok(1), Err(Error::other("x"))]));
            let mut seq = upstream.after(9);
            assert!(matches!(seq.next().await, Some(Ok(1))));
            assert!(matches!(seq.next().await, Some(Err(_))));
            assert!(seq.next().await.is_none());
        })
    }
}
