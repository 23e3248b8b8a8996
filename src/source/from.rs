use futures_core::Stream;
use futures_lite::{stream, AsyncRead, AsyncReadExt, StreamExt};
use std::fmt;
use std::future::Future;

use crate::asyncerator::{Asyncerator, BoxFuture, BoxStream};
use crate::config::READ_CHUNK_SIZE;
use crate::error::Error;

/// Conversion into the canonical [`Asyncerator`].
///
/// Converting an `Asyncerator` is the identity: the same boxed stream comes
/// back, never a wrapper around it.
pub trait IntoAsyncerator<'a> {
    /// The type of the values in the resulting sequence.
    type Item;

    /// Perform the conversion.
    fn into_asyncerator(self) -> Asyncerator<'a, Self::Item>;
}

/// The shapes of producer that can be adapted into an [`Asyncerator`].
///
/// Each shape is chosen explicitly through a constructor, so no runtime
/// probing takes place. Adaptation checks the shapes in the order the
/// variants are listed.
pub enum Producer<'a, T> {
    /// A function producing the actual producer, invoked on adaptation.
    Deferred(Box<dyn FnOnce() -> Producer<'a, T> + Send + 'a>),
    /// An already canonical sequence.
    Asyncerator(Asyncerator<'a, T>),
    /// A synchronous iterator.
    Iter(Box<dyn Iterator<Item = T> + Send + 'a>),
    /// A fallible asynchronous stream.
    Stream(BoxStream<'a, T>),
    /// Futures awaited one at a time, in order.
    Futures(Box<dyn Iterator<Item = BoxFuture<'a, Result<T, Error>>> + Send + 'a>),
}

impl<'a, T: Send + 'a> Producer<'a, T> {
    /// A synchronous iterator or iterable.
    pub fn from_iterator<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'a,
    {
        Self::Iter(Box::new(iter.into_iter()))
    }

    /// An infallible stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'a,
    {
        Self::Stream(Box::pin(stream.map(Ok::<T, Error>)))
    }

    /// A stream of results.
    pub fn from_try_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'a,
        E: Into<Error>,
    {
        Self::Stream(Box::pin(stream.map(|item| -> Result<T, Error> {
            item.map_err(Into::into)
        })))
    }

    /// A stream of futures; each future is awaited before its output is
    /// emitted, a single level deep.
    pub fn from_future_stream<S>(stream: S) -> Self
    where
        S: Stream + Send + 'a,
        S::Item: Future<Output = T> + Send + 'a,
    {
        Self::Stream(Box::pin(stream.then(|fut| fut).map(Ok::<T, Error>)))
    }

    /// Futures that are awaited in order, each yielding one value.
    pub fn from_futures<I, F>(futures: I) -> Self
    where
        I: IntoIterator<Item = F>,
        I::IntoIter: Send + 'a,
        F: Future<Output = T> + Send + 'a,
    {
        Self::Futures(Box::new(futures.into_iter().map(|fut| {
            Box::pin(async move { Ok::<T, Error>(fut.await) }) as BoxFuture<'a, Result<T, Error>>
        })))
    }

    /// Fallible futures that are awaited in order; the first failure ends
    /// the sequence.
    pub fn from_try_futures<I, F, E>(futures: I) -> Self
    where
        I: IntoIterator<Item = F>,
        I::IntoIter: Send + 'a,
        F: Future<Output = Result<T, E>> + Send + 'a,
        E: Into<Error> + 'a,
    {
        Self::Futures(Box::new(futures.into_iter().map(|fut| {
            Box::pin(async move { fut.await.map_err(Into::<Error>::into) })
                as BoxFuture<'a, Result<T, Error>>
        })))
    }

    /// A function building the producer when the sequence is adapted.
    pub fn from_fn<F, P>(f: F) -> Self
    where
        F: FnOnce() -> P + Send + 'a,
        P: IntoAsyncerator<'a, Item = T>,
    {
        Self::Deferred(Box::new(move || Self::Asyncerator(f().into_asyncerator())))
    }
}

impl<'a> Producer<'a, Vec<u8>> {
    /// A byte reader, read in chunks of at most
    /// [`READ_CHUNK_SIZE`][crate::config::READ_CHUNK_SIZE] bytes.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'a,
    {
        let state = ReadState {
            reader,
            buf: vec![0; READ_CHUNK_SIZE].into_boxed_slice(),
        };
        Self::Stream(Box::pin(stream::try_unfold(state, read_chunk::<R>)))
    }
}

/// The reader and the scratch buffer reused across reads.
struct ReadState<R> {
    reader: R,
    buf: Box<[u8]>,
}

async fn read_chunk<R>(mut state: ReadState<R>) -> Result<Option<(Vec<u8>, ReadState<R>)>, Error>
where
    R: AsyncRead + Unpin,
{
    let len = state.reader.read(&mut state.buf).await?;
    if len == 0 {
        return Ok(None);
    }
    // Copy out only what was read; the chunk does not pin the scratch buffer.
    let chunk = state.buf[..len].to_vec();
    Ok(Some((chunk, state)))
}

impl<'a, T: Send + 'a> IntoAsyncerator<'a> for Producer<'a, T> {
    type Item = T;

    fn into_asyncerator(self) -> Asyncerator<'a, T> {
        match self {
            Producer::Deferred(f) => f().into_asyncerator(),
            Producer::Asyncerator(seq) => seq,
            Producer::Iter(iter) => Asyncerator::new(stream::iter(iter.map(Ok::<T, Error>))),
            Producer::Stream(stream) => Asyncerator::from_boxed(stream),
            Producer::Futures(futures) => Asyncerator::new(stream::iter(futures).then(|fut| fut)),
        }
    }
}

impl<'a, T> From<Asyncerator<'a, T>> for Producer<'a, T> {
    fn from(seq: Asyncerator<'a, T>) -> Self {
        Self::Asyncerator(seq)
    }
}

impl<T> fmt::Debug for Producer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self {
            Producer::Deferred(_) => "Deferred",
            Producer::Asyncerator(_) => "Asyncerator",
            Producer::Iter(_) => "Iter",
            Producer::Stream(_) => "Stream",
            Producer::Futures(_) => "Futures",
        };
        f.debug_tuple("Producer").field(&shape).finish()
    }
}

impl<'a, T> IntoAsyncerator<'a> for Asyncerator<'a, T> {
    type Item = T;

    fn into_asyncerator(self) -> Self {
        self
    }
}

impl<'a, T: Send + 'a> IntoAsyncerator<'a> for Vec<T> {
    type Item = T;

    fn into_asyncerator(self) -> Asyncerator<'a, T> {
        Producer::from_iterator(self).into_asyncerator()
    }
}

impl<'a, T: Send + 'a, const N: usize> IntoAsyncerator<'a> for [T; N] {
    type Item = T;

    fn into_asyncerator(self) -> Asyncerator<'a, T> {
        Producer::from_iterator(self).into_asyncerator()
    }
}

/// Adapt any supported producer into an [`Asyncerator`].
///
/// # Example
///
/// ```rust
/// use asyncerator::{from, Producer};
/// use futures_lite::{future::block_on, stream};
///
/// # block_on(async {
/// let out = from(Producer::from_stream(stream::iter(["a", "b"]))).to_array().await?;
/// assert_eq!(out, ["a", "b"]);
/// # Ok::<(), asyncerator::Error>(())
/// # }).unwrap();
/// ```
pub fn from<'a, P>(producer: P) -> Asyncerator<'a, P::Item>
where
    P: IntoAsyncerator<'a>,
{
    producer.into_asyncerator()
}

/// Adapt a synchronous iterator or iterable.
pub fn from_iter<'a, I>(iter: I) -> Asyncerator<'a, I::Item>
where
    I: IntoIterator,
    I::IntoIter: Send + 'a,
    I::Item: Send + 'a,
{
    Producer::from_iterator(iter).into_asyncerator()
}

/// Adapt an infallible stream.
pub fn from_stream<'a, S>(stream: S) -> Asyncerator<'a, S::Item>
where
    S: Stream + Send + 'a,
    S::Item: Send + 'a,
{
    Producer::from_stream(stream).into_asyncerator()
}

/// Adapt a stream of results.
pub fn from_try_stream<'a, S, T, E>(stream: S) -> Asyncerator<'a, T>
where
    S: Stream<Item = Result<T, E>> + Send + 'a,
    T: Send + 'a,
    E: Into<Error>,
{
    Producer::from_try_stream(stream).into_asyncerator()
}

/// Adapt futures that are awaited in order.
pub fn from_futures<'a, I, F>(futures: I) -> Asyncerator<'a, F::Output>
where
    I: IntoIterator<Item = F>,
    I::IntoIter: Send + 'a,
    F: Future + Send + 'a,
    F::Output: Send + 'a,
{
    Producer::from_futures(futures).into_asyncerator()
}

/// Adapt a producer built lazily by `f`.
pub fn from_fn<'a, F, P>(f: F) -> Asyncerator<'a, P::Item>
where
    F: FnOnce() -> P + Send + 'a,
    P: IntoAsyncerator<'a>,
    P::Item: Send + 'a,
{
    Producer::from_fn(f).into_asyncerator()
}

/// Adapt a byte reader into a sequence of byte chunks.
pub fn from_reader<'a, R>(reader: R) -> Asyncerator<'a, Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'a,
{
    Producer::from_reader(reader).into_asyncerator()
}
