use async_io::Timer;
use futures_lite::future;
use std::future::Future;
use std::time::Duration;

use crate::asyncerator::BoxFuture;
use crate::error::Error;

/// Await `fut`, failing with [`Error::Timeout`] if it takes longer than
/// `duration`.
///
/// # Example
///
/// ```rust
/// use asyncerator::worker::timeout;
/// use asyncerator::Error;
/// use futures_lite::future::{block_on, pending};
/// use std::time::Duration;
///
/// # block_on(async {
/// let out = timeout(Duration::from_millis(5), pending::<Result<(), Error>>()).await;
/// assert!(out.unwrap_err().is_timeout());
/// # });
/// ```
pub async fn timeout<F, T, E>(duration: Duration, fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, E>>,
    E: Into<Error>,
{
    future::or(async { fut.await.map_err(Into::into) }, async {
        Timer::after(duration).await;
        Err(Error::Timeout(duration))
    })
    .await
}

/// Wrap a worker so every call fails with [`Error::Timeout`] after
/// `duration`.
pub fn with_timeout<'a, T, U, E, W, Fut>(
    duration: Duration,
    mut worker: W,
) -> impl FnMut(T) -> BoxFuture<'a, Result<U, Error>> + Send + 'a
where
    U: Send + 'a,
    E: Into<Error> + 'a,
    W: FnMut(T) -> Fut + Send + 'a,
    Fut: Future<Output = Result<U, E>> + Send + 'a,
{
    move |item| Box::pin(timeout(duration, worker(item)))
}

#[cfg(test)]
mod test {
    use super::*;
    use futures_lite::future::block_on;

    #[test]
    fn passes_fast_results() {
        let out = block_on(timeout(Duration::from_secs(5), async { Ok::<_, Error>(3) }));
        assert_eq!(out.unwrap(), 3);
    }

    #[test]
    fn fails_slow_work() {
        let mut worker = with_timeout(Duration::from_millis(10), |delay: u64| async move {
            Timer::after(Duration::from_millis(delay)).await;
            Ok::<_, Error>(delay)
        });
        assert_eq!(block_on(worker(0)).unwrap(), 0);
        let err = block_on(worker(2_000)).unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_millis(10)));
    }
}
