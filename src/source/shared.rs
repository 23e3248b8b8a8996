use futures_core::stream::{FusedStream, Stream};
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};

use crate::asyncerator::Asyncerator;
use crate::error::Error;
use crate::source::IntoAsyncerator;
use crate::utils::BroadcastWaker;

/// A cloneable handle onto one underlying sequence.
///
/// Every clone pulls from the same source: each value goes to whichever
/// clone asks first. Once the source finishes or fails, every clone reports
/// the end without touching the source again. This is what makes passing
/// the same source to [`merge`][crate::merge] more than once safe.
///
/// # Example
///
/// ```rust
/// use asyncerator::{from, merge};
/// use futures_lite::future::block_on;
///
/// # block_on(async {
/// let shared = from(vec!["1"]).share();
/// let out: Vec<&str> = merge([shared.clone(), shared]).to_array().await?;
/// assert_eq!(out, ["1"]);
/// # Ok::<(), asyncerator::Error>(())
/// # }).unwrap();
/// ```
pub struct Shared<'a, T> {
    inner: Arc<Mutex<State<'a, T>>>,
}

struct State<'a, T> {
    source: Option<Asyncerator<'a, T>>,
    broadcast: Arc<BroadcastWaker>,
    waker: Waker,
}

impl<'a, T> Shared<'a, T> {
    pub(crate) fn new(source: Asyncerator<'a, T>) -> Self {
        let (broadcast, waker) = BroadcastWaker::new();
        Self {
            inner: Arc::new(Mutex::new(State {
                source: Some(source),
                broadcast,
                waker,
            })),
        }
    }
}

impl<T> Stream for Shared<'_, T> {
    type Item = Result<T, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *state;
        let Some(source) = state.source.as_mut() else {
            return Poll::Ready(None);
        };

        // Poll on behalf of every clone, so a wake-up reaches all of them.
        state.broadcast.register(cx.waker());
        let mut cx = Context::from_waker(&state.waker);
        match Pin::new(source).poll_next(&mut cx) {
            Poll::Ready(item) => {
                if !matches!(item, Some(Ok(_))) {
                    state.source = None;
                    state.broadcast.wake_all();
                }
                Poll::Ready(item)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> FusedStream for Shared<'_, T> {
    fn is_terminated(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .source
            .is_none()
    }
}

impl<T> Clone for Shared<'_, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Shared<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("handles", &Arc::strong_count(&self.inner))
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

impl<'a, T: Send + 'a> IntoAsyncerator<'a> for Shared<'a, T> {
    type Item = T;

    fn into_asyncerator(self) -> Asyncerator<'a, T> {
        Asyncerator::new(self)
    }
}
