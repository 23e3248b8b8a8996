use futures_core::Stream;
use slab::Slab;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::asyncerator::{Asyncerator, BoxFuture};
use crate::error::Error;

/// Run every future at once, yielding each output as soon as it is ready.
///
/// The first failure ends the sequence and drops the futures still running.
///
/// # Example
///
/// ```rust
/// use asyncerator::{all, Error};
/// use futures_lite::future::block_on;
///
/// # block_on(async {
/// let mut out = all((1..=3).map(|n| async move { Ok::<_, Error>(n * 10) }))
///     .to_array()
///     .await?;
/// out.sort();
/// assert_eq!(out, [10, 20, 30]);
/// # Ok::<(), asyncerator::Error>(())
/// # }).unwrap();
/// ```
pub fn all<'a, I, F, T, E>(futures: I) -> Asyncerator<'a, T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>> + Send + 'a,
    T: Send + 'a,
    E: Into<Error> + 'a,
{
    let mut group = Slab::new();
    for fut in futures {
        let fut: BoxFuture<'a, Result<T, Error>> =
            Box::pin(async move { fut.await.map_err(Into::<Error>::into) });
        group.insert(fut);
    }
    Asyncerator::new(All { group })
}

struct All<'a, T> {
    group: Slab<BoxFuture<'a, Result<T, Error>>>,
}

impl<T> Stream for All<'_, T> {
    type Item = Result<T, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.group.is_empty() {
            return Poll::Ready(None);
        }
        let ready = this
            .group
            .iter_mut()
            .find_map(|(key, fut)| match fut.as_mut().poll(cx) {
                Poll::Ready(out) => Some((key, out)),
                Poll::Pending => None,
            });
        match ready {
            Some((key, out)) => {
                drop(this.group.remove(key));
                if out.is_err() {
                    this.group.clear();
                }
                Poll::Ready(Some(out))
            }
            None => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.group.len()))
    }
}
