use futures_lite::StreamExt;

use crate::asyncerator::Asyncerator;
use crate::source::IntoAsyncerator;

/// Concatenate sources, draining each one before the next one starts.
///
/// # Example
///
/// ```rust
/// use asyncerator::{from, series};
/// use futures_lite::future::block_on;
///
/// # block_on(async {
/// let out = series([from(vec![1, 2]), from(vec![3])]).to_array().await?;
/// assert_eq!(out, [1, 2, 3]);
/// # Ok::<(), asyncerator::Error>(())
/// # }).unwrap();
/// ```
pub fn series<'a, I, S>(sources: I) -> Asyncerator<'a, S::Item>
where
    I: IntoIterator<Item = S>,
    I::IntoIter: Send + 'a,
    S: IntoAsyncerator<'a> + 'a,
    S::Item: Send + 'a,
{
    let sources = sources.into_iter().map(IntoAsyncerator::into_asyncerator);
    Asyncerator::new(futures_lite::stream::iter(sources).flatten())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use futures_lite::future::block_on;

    #[test]
    fn stops_at_failure() {
        block_on(async {
            let mut seq = series([
                Asyncerator::<u8>::failed(Error::other("first")),
                crate::from(vec![1u8]),
            ]);
            assert!(matches!(seq.next().await, Some(Err(_))));
            assert!(seq.next().await.is_none());
        })
    }

    #[test]
    fn adapts_each_source() {
        block_on(async {
            let out = series(vec![vec!["a", "b"], vec![], vec!["c"]])
                .to_string()
                .await
                .unwrap();
            assert_eq!(out, "abc");
        })
    }
}
