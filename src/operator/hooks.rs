use futures_core::Stream;
use pin_project::pin_project;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use crate::asyncerator::Asyncerator;
use crate::error::{BoxError, Error};

/// Observe an upstream failure.
///
/// The failure is handed to `hook` and the sequence then ends normally. A
/// failing hook is logged and otherwise ignored.
pub fn on_error<'a, T, E, F>(hook: F) -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, T>
where
    T: Send + 'a,
    E: Into<BoxError>,
    F: FnOnce(&Error) -> Result<(), E> + Send + 'a,
{
    move |upstream| {
        Asyncerator::new(OnError {
            upstream,
            hook: Some(hook),
        })
    }
}

/// Observe a successful completion.
///
/// `hook` runs once the upstream ends without failing. A failing hook is
/// logged and otherwise ignored.
pub fn on_complete<'a, T, E, F>(hook: F) -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, T>
where
    T: Send + 'a,
    E: Into<BoxError>,
    F: FnOnce() -> Result<(), E> + Send + 'a,
{
    move |upstream| {
        Asyncerator::new(OnComplete {
            upstream,
            hook: Some(hook),
        })
    }
}

#[pin_project]
struct OnError<'a, T, F> {
    #[pin]
    upstream: Asyncerator<'a, T>,
    hook: Option<F>,
}

impl<T, E, F> Stream for OnError<'_, T, F>
where
    E: Into<BoxError>,
    F: FnOnce(&Error) -> Result<(), E>,
{
    type Item = Result<T, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match ready!(this.upstream.poll_next(cx)) {
            Some(Err(err)) => {
                if let Some(hook) = this.hook.take() {
                    if let Err(hook_err) = hook(&err) {
                        let hook_err = hook_err.into();
                        tracing::warn!(
                            target: "asyncerator::hooks",
                            error = %err,
                            hook_error = %hook_err,
                            "error hook failed, ignoring"
                        );
                    }
                }
                Poll::Ready(None)
            }
            other => Poll::Ready(other),
        }
    }
}

#[pin_project]
struct OnComplete<'a, T, F> {
    #[pin]
    upstream: Asyncerator<'a, T>,
    hook: Option<F>,
}

impl<T, E, F> Stream for OnComplete<'_, T, F>
where
    E: Into<BoxError>,
    F: FnOnce() -> Result<(), E>,
{
    type Item = Result<T, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let item = ready!(this.upstream.poll_next(cx));
        if item.is_none() {
            if let Some(hook) = this.hook.take() {
                if let Err(hook_err) = hook() {
                    let hook_err = hook_err.into();
                    tracing::warn!(
                        target: "asyncerator::hooks",
                        hook_error = %hook_err,
                        "complete hook failed, ignoring"
                    );
                }
            }
        }
        Poll::Ready(item)
    }
}
