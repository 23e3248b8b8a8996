use futures_core::Stream;
use pin_project::pin_project;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use crate::asyncerator::Asyncerator;
use crate::error::Error;

/// Flatten one level of nesting, emitting the elements of each value in
/// order.
pub fn flat<'a, T>() -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, T::Item>
where
    T: IntoIterator + Send + 'a,
    T::IntoIter: Send + 'a,
    T::Item: Send + 'a,
{
    move |upstream| {
        Asyncerator::new(Flat {
            upstream,
            current: None,
        })
    }
}

#[pin_project]
struct Flat<'a, T: IntoIterator> {
    #[pin]
    upstream: Asyncerator<'a, T>,
    current: Option<T::IntoIter>,
}

impl<T: IntoIterator> Stream for Flat<'_, T> {
    type Item = Result<T::Item, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if let Some(iter) = this.current.as_mut() {
                if let Some(item) = iter.next() {
                    return Poll::Ready(Some(Ok(item)));
                }
                *this.current = None;
            }
            match ready!(this.upstream.as_mut().poll_next(cx)) {
                Some(Ok(items)) => *this.current = Some(items.into_iter()),
                Some(Err(err)) => return Poll::Ready(Some(Err(err))),
                None => return Poll::Ready(None),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::source::from_iter;
    use futures_lite::future::block_on;

    #[test]
    fn one_level() {
        block_on(async {
            let out = from_iter(vec![vec![1, 2], vec![], vec![3]])
                .flat()
                .to_array()
                .await
                .unwrap();
            assert_eq!(out, [1, 2, 3]);
            let nested = from_iter(vec![vec![vec![1], vec![2]]])
                .flat()
                .to_array()
                .await
                .unwrap();
            assert_eq!(nested, [vec![1], vec![2]]);
        })
    }
}
