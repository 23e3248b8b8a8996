use async_io::Timer;
use std::future::Future;
use std::sync::Arc;

use crate::asyncerator::BoxFuture;
use crate::config::RetryOptions;
use crate::error::Error;

/// Wrap a worker so failed calls are retried with exponential backoff.
///
/// Each call gets one attempt plus up to
/// [`RetryOptions::retries`] retries; once they are used up the call fails
/// with [`Error::RetryExhausted`] carrying the last failure.
///
/// # Example
///
/// ```rust
/// use asyncerator::config::RetryOptions;
/// use asyncerator::{from, worker::retry, Error};
/// use futures_lite::future::block_on;
/// use std::time::Duration;
///
/// # block_on(async {
/// let options = RetryOptions::new(Duration::ZERO, 2)?;
/// let double = retry(|n: u32| async move { Ok::<_, Error>(n * 2) }, options);
/// let out = from(vec![1, 2]).race(double).to_array().await?;
/// assert_eq!(out.len(), 2);
/// # Ok::<(), asyncerator::Error>(())
/// # }).unwrap();
/// ```
pub fn retry<'a, T, U, E, W, Fut>(
    worker: W,
    options: RetryOptions,
) -> impl Fn(T) -> BoxFuture<'a, Result<U, Error>> + Send + Sync + 'a
where
    T: Clone + Send + 'a,
    U: Send + 'a,
    E: Into<Error> + 'a,
    W: Fn(T) -> Fut + Send + Sync + 'a,
    Fut: Future<Output = Result<U, E>> + Send + 'a,
{
    let worker = Arc::new(worker);
    move |item| {
        let worker = worker.clone();
        Box::pin(async move {
            let mut attempt = 0;
            loop {
                back_off(options, attempt).await;
                let err: Error = match worker(item.clone()).await {
                    Ok(out) => return Ok(out),
                    Err(err) => err.into(),
                };
                if attempt >= options.retries() {
                    return Err(give_up(options, err));
                }
                tracing::debug!(target: "asyncerator::retry", attempt, error = %err, "attempt failed");
                attempt += 1;
            }
        })
    }
}

/// Wait out the backoff owed before attempt number `attempt`; the first
/// attempt (number zero) runs at once.
pub(crate) async fn back_off(options: RetryOptions, attempt: u32) {
    if attempt == 0 {
        return;
    }
    let wait = options.backoff(attempt);
    tracing::debug!(
        target: "asyncerator::retry",
        attempt,
        wait_ms = wait.as_millis() as u64,
        "waiting before retry"
    );
    if !wait.is_zero() {
        Timer::after(wait).await;
    }
}

/// The error reported once every retry has failed.
pub(crate) fn give_up(options: RetryOptions, last: Error) -> Error {
    tracing::warn!(
        target: "asyncerator::retry",
        retries = options.retries(),
        error = %last,
        "retries exhausted"
    );
    Error::RetryExhausted {
        retries: options.retries(),
        last: Box::new(last),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures_lite::future::block_on;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn flaky(failures: u32) -> (Arc<AtomicU32>, impl Fn(u32) -> BoxFuture<'static, Result<u32, Error>>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let worker = move |n: u32| -> BoxFuture<'static, Result<u32, Error>> {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if call < failures {
                    Err(Error::other(format!("failure {call}")))
                } else {
                    Ok(n)
                }
            })
        };
        (calls, worker)
    }

    #[test]
    fn recovers_within_budget() {
        let (calls, worker) = flaky(2);
        let worker = retry(worker, RetryOptions::new(Duration::ZERO, 2).unwrap());
        assert_eq!(block_on(worker(7)).unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn exhausts_with_last_error() {
        let (calls, worker) = flaky(u32::MAX);
        let worker = retry(worker, RetryOptions::new(Duration::from_millis(1), 3).unwrap());
        let err = block_on(worker(7)).unwrap_err();
        assert_eq!(err.to_string(), "maximum retries (3) exceeded");
        match err {
            Error::RetryExhausted { retries, last } => {
                assert_eq!(retries, 3);
                assert_eq!(last.to_string(), "failure 3");
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn zero_retries_fail_at_once() {
        let (calls, worker) = flaky(1);
        let worker = retry(worker, RetryOptions::new(Duration::ZERO, 0).unwrap());
        assert!(block_on(worker(1)).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
