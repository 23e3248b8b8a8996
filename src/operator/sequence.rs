use futures_core::Stream;
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use crate::asyncerator::Asyncerator;
use crate::error::Error;

/// Interleave generated values with the upstream values.
///
/// `f` is called with `0, 1, 2, ...`, one call at a time, whenever the
/// upstream has nothing ready; its outputs are emitted alongside the
/// upstream values. Generation stops when the upstream completes, so `f` is
/// never called for an upstream that is always ready. A failure on either
/// side ends the sequence.
///
/// Because `f` may wait before resolving, this emits values on a schedule
/// while a slow upstream is running.
pub fn sequence<'a, T, E, F, Fut>(f: F) -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, T>
where
    T: Send + 'a,
    E: Into<Error>,
    F: FnMut(usize) -> Fut + Send + 'a,
    Fut: Future<Output = Result<T, E>> + Send + 'a,
{
    move |upstream| {
        Asyncerator::new(Sequence {
            upstream,
            f,
            running: None,
            index: 0,
        })
    }
}

/// Alias of [`sequence`], for generating values on a timer.
pub fn timer<'a, T, E, F, Fut>(f: F) -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, T>
where
    T: Send + 'a,
    E: Into<Error>,
    F: FnMut(usize) -> Fut + Send + 'a,
    Fut: Future<Output = Result<T, E>> + Send + 'a,
{
    sequence(f)
}

#[pin_project]
struct Sequence<'a, T, F, Fut> {
    #[pin]
    upstream: Asyncerator<'a, T>,
    f: F,
    #[pin]
    running: Option<Fut>,
    index: usize,
}

impl<T, E, F, Fut> Stream for Sequence<'_, T, F, Fut>
where
    E: Into<Error>,
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    type Item = Result<T, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        match this.upstream.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(item))) => return Poll::Ready(Some(Ok(item))),
            Poll::Ready(other) => {
                this.running.set(None);
                return Poll::Ready(other);
            }
            Poll::Pending => {}
        }

        if this.running.is_none() {
            let fut = (this.f)(*this.index);
            *this.index += 1;
            this.running.set(Some(fut));
        }
        let out = match this.running.as_mut().as_pin_mut() {
            Some(fut) => ready!(fut.poll(cx)),
            None => return Poll::Pending,
        };
        this.running.set(None);
        Poll::Ready(Some(out.map_err(Into::into)))
    }
}
