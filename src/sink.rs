//! Sinks: terminal consumers of a sequence.
//!
//! Every sink accepts anything convertible into an
//! [`Asyncerator`][crate::Asyncerator], so they work as the last stage of a
//! [`pipeline!`][crate::pipeline] and on their own.

use futures_lite::{AsyncWrite, AsyncWriteExt, StreamExt};

use crate::asyncerator::{Asyncerator, BoxFuture};
use crate::chunk::Chunk;
use crate::error::Error;
use crate::source::IntoAsyncerator;

/// Collect every value into a `Vec`.
pub async fn to_array<'a, S>(source: S) -> Result<Vec<S::Item>, Error>
where
    S: IntoAsyncerator<'a>,
{
    source.into_asyncerator().try_collect().await
}

/// Concatenate the text of every chunk.
///
/// # Example
///
/// ```rust
/// use asyncerator::sink::to_string;
/// use futures_lite::future::block_on;
///
/// # block_on(async {
/// assert_eq!(to_string(vec!["to", "get", "her"]).await?, "together");
/// # Ok::<(), asyncerator::Error>(())
/// # }).unwrap();
/// ```
pub async fn to_string<'a, S>(source: S) -> Result<String, Error>
where
    S: IntoAsyncerator<'a>,
    S::Item: Chunk,
{
    let mut source = source.into_asyncerator();
    let mut buf = Vec::new();
    while let Some(chunk) = source.next().await {
        chunk?.append_to(&mut buf)?;
    }
    Ok(String::from_utf8(buf)?)
}

/// Fold every value into an accumulator.
///
/// `f` receives the accumulator, the value and the value's index.
pub fn reduce<'a, T, A, F>(
    mut f: F,
    initial: A,
) -> impl FnOnce(Asyncerator<'a, T>) -> BoxFuture<'a, Result<A, Error>>
where
    T: Send + 'a,
    A: Send + 'a,
    F: FnMut(A, T, usize) -> A + Send + 'a,
{
    move |mut source| {
        Box::pin(async move {
            let mut acc = initial;
            let mut index = 0;
            while let Some(value) = source.next().await {
                acc = f(acc, value?, index);
                index += 1;
            }
            Ok::<_, Error>(acc)
        })
    }
}

/// Pull the sequence to its end, discarding the values.
pub async fn to_null<'a, S>(source: S) -> Result<(), Error>
where
    S: IntoAsyncerator<'a>,
{
    let mut source = source.into_asyncerator();
    while source.next().await.transpose()?.is_some() {}
    Ok(())
}

/// Write every value into `writer`, then flush and close it.
///
/// The returned future resolves once the writer is closed, or with the
/// first upstream or write failure.
pub fn to_writer<'a, T, W>(writer: W) -> impl FnOnce(Asyncerator<'a, T>) -> BoxFuture<'a, Result<(), Error>>
where
    T: AsRef<[u8]> + Send + 'a,
    W: AsyncWrite + Unpin + Send + 'a,
{
    move |mut source| {
        Box::pin(async move {
            let mut writer = writer;
            while let Some(chunk) = source.next().await {
                let chunk = chunk?;
                writer.write_all(chunk.as_ref()).await?;
            }
            writer.flush().await?;
            writer.close().await?;
            Ok::<_, Error>(())
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::from_iter;
    use futures_lite::future::block_on;
    use futures_lite::stream;

    #[test]
    fn collects() {
        block_on(async {
            assert_eq!(to_array(vec![1, 2, 3]).await.unwrap(), [1, 2, 3]);
            assert_eq!(to_string(from_iter(1..=3)).await.unwrap(), "123");
            assert!(to_null(from_iter(0..10)).await.is_ok());
        })
    }

    #[test]
    fn reduce_passes_indexes() {
        block_on(async {
            let folded = reduce(|acc: Vec<(usize, char)>, c, i| {
                let mut acc = acc;
                acc.push((i, c));
                acc
            }, Vec::new())(from_iter("ab".chars()))
            .await
            .unwrap();
            assert_eq!(folded, [(0, 'a'), (1, 'b')]);

            let sum = from_iter(1..=4).reduce(|acc, n, _| acc + n, 10).await.unwrap();
            assert_eq!(sum, 20);
        })
    }

    #[test]
    fn sinks_report_failures() {
        block_on(async {
            let failing = || {
                Asyncerator::new(stream::iter(vec![Ok("a"), Err(Error::other("gone"))]))
            };
            assert!(to_array(failing()).await.is_err());
            assert!(to_string(failing()).await.is_err());
            assert!(to_null(failing()).await.is_err());
        })
    }

    #[test]
    fn writes_and_closes() {
        block_on(async {
            let mut out = Vec::new();
            to_writer(futures_lite::io::Cursor::new(&mut out))(from_iter(vec!["ab", "cd"]))
                .await
                .unwrap();
            assert_eq!(out, b"abcd");
        })
    }
}
