use futures_core::Stream;
use pin_project::pin_project;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use crate::asyncerator::Asyncerator;
use crate::chunk::Chunk;
use crate::error::Error;

/// Split the concatenated text of every chunk on `separator`, the way
/// [`str::split`] would split the whole text at once.
///
/// An empty separator emits one character at a time. With `limit` set, at
/// most that many pieces are emitted and the upstream is released after the
/// last one; `Some(0)` emits nothing and never pulls the upstream. When the
/// upstream yields no chunks at all, nothing is emitted.
///
/// # Example
///
/// ```rust
/// use asyncerator::from;
/// use futures_lite::future::block_on;
///
/// # block_on(async {
/// let lines = from(vec!["a,b", "b,", "c"]).split(",", None).to_array().await?;
/// assert_eq!(lines, ["a", "bb", "c"]);
/// # Ok::<(), asyncerator::Error>(())
/// # }).unwrap();
/// ```
pub fn split<'a, T>(
    separator: &str,
    limit: Option<usize>,
) -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, String>
where
    T: Chunk + Send + 'a,
{
    let separator = separator.as_bytes().to_vec();
    move |upstream| {
        Asyncerator::new(Split {
            upstream,
            separator,
            limit,
            buffer: Buffered::default(),
            count: 0,
            received: false,
            finished: limit == Some(0),
        })
    }
}

#[pin_project]
struct Split<'a, T> {
    #[pin]
    upstream: Asyncerator<'a, T>,
    separator: Vec<u8>,
    limit: Option<usize>,
    buffer: Buffered,
    count: usize,
    received: bool,
    finished: bool,
}

/// Bytes received but not yet emitted.
///
/// Pieces are cut by advancing `start`; the consumed prefix is only dropped
/// when the next chunk arrives. `scanned` marks where the separator search
/// resumes, so no byte is searched twice.
#[derive(Debug, Default)]
struct Buffered {
    bytes: Vec<u8>,
    start: usize,
    scanned: usize,
}

impl Buffered {
    fn append<T: Chunk>(&mut self, chunk: &T) -> Result<(), Error> {
        if self.start > 0 {
            self.bytes.drain(..self.start);
            self.scanned -= self.start;
            self.start = 0;
        }
        chunk.append_to(&mut self.bytes)
    }

    fn is_empty(&self) -> bool {
        self.start == self.bytes.len()
    }

    /// Cut the next complete piece off the front.
    fn next_piece(&mut self, separator: &[u8]) -> Option<Vec<u8>> {
        if self.is_empty() {
            return None;
        }
        if separator.is_empty() {
            let width = utf8_width(self.bytes[self.start]);
            let end = self.start + width;
            if end > self.bytes.len() {
                return None;
            }
            let piece = self.bytes[self.start..end].to_vec();
            self.start = end;
            self.scanned = end;
            return Some(piece);
        }

        let from = self.scanned.max(self.start);
        let found = self.bytes[from..]
            .windows(separator.len())
            .position(|window| window == separator);
        match found {
            Some(offset) => {
                let pos = from + offset;
                let piece = self.bytes[self.start..pos].to_vec();
                self.start = pos + separator.len();
                self.scanned = self.start;
                Some(piece)
            }
            None => {
                // A separator may still straddle the end of what we have.
                let tail = self.bytes.len().saturating_sub(separator.len() - 1);
                self.scanned = tail.max(self.start);
                None
            }
        }
    }

    fn take_rest(&mut self) -> Vec<u8> {
        let rest = self.bytes.split_off(self.start);
        self.bytes.clear();
        self.start = 0;
        self.scanned = 0;
        rest
    }
}

/// Length of the UTF-8 sequence starting with `byte`. Invalid leading bytes
/// count as one, which fails decoding later on.
fn utf8_width(byte: u8) -> usize {
    match byte {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
}

fn decode(piece: Vec<u8>) -> Result<String, Error> {
    Ok(String::from_utf8(piece)?)
}

impl<T: Chunk> Stream for Split<'_, T> {
    type Item = Result<String, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if *this.finished {
                return Poll::Ready(None);
            }

            if let Some(piece) = this.buffer.next_piece(this.separator) {
                *this.count += 1;
                if this.limit.is_some_and(|limit| *this.count >= limit) {
                    *this.finished = true;
                    this.upstream.as_mut().get_mut().close();
                }
                return Poll::Ready(Some(decode(piece)));
            }

            match ready!(this.upstream.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    *this.received = true;
                    if let Err(err) = this.buffer.append(&chunk) {
                        *this.finished = true;
                        return Poll::Ready(Some(Err(err)));
                    }
                }
                Some(Err(err)) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    *this.finished = true;
                    let below_limit = this.limit.map_or(true, |limit| *this.count < limit);
                    let tail = (!this.separator.is_empty() && *this.received)
                        || (!this.buffer.is_empty() && below_limit);
                    if tail {
                        return Poll::Ready(Some(decode(this.buffer.take_rest())));
                    }
                    return Poll::Ready(None);
                }
            }
        }
    }
}
