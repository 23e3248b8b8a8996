//! Operators: stages turning one sequence into another.
//!
//! Each operator is available both as a method on
//! [`Asyncerator`][crate::Asyncerator] and as a free function returning a
//! stage for [`pipeline!`][crate::pipeline].

use futures_lite::{stream, StreamExt};

use crate::asyncerator::Asyncerator;

mod after;
mod close;
mod flat;
mod hooks;
mod race;
mod sequence;
mod split;

pub use after::after;
pub use close::{close_after, close_before};
pub use flat::flat;
pub use hooks::{on_complete, on_error};
pub use race::{race, race_with};
pub use sequence::{sequence, timer};
pub use split::split;

/// Transform each value with `f`, keeping the order.
pub fn map<'a, T, U, F>(mut f: F) -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, U>
where
    T: Send + 'a,
    U: Send + 'a,
    F: FnMut(T) -> U + Send + 'a,
{
    move |upstream| Asyncerator::new(StreamExt::map(upstream, move |item| item.map(&mut f)))
}

/// Keep the values for which `predicate` returns `true`.
///
/// Failures are always passed on.
pub fn filter<'a, T, F>(mut predicate: F) -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, T>
where
    T: Send + 'a,
    F: FnMut(&T) -> bool + Send + 'a,
{
    move |upstream| {
        Asyncerator::new(StreamExt::filter(upstream, move |item| match item {
            Ok(value) => predicate(value),
            Err(_) => true,
        }))
    }
}

/// Call `f` with every value as it passes.
pub fn for_each<'a, T, F>(mut f: F) -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, T>
where
    T: Send + 'a,
    F: FnMut(&T) + Send + 'a,
{
    move |upstream| {
        Asyncerator::new(StreamExt::inspect(upstream, move |item| {
            if let Ok(value) = item {
                f(value);
            }
        }))
    }
}

/// Emit `value` ahead of the upstream values.
pub fn before<'a, T>(value: T) -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, T>
where
    T: Send + 'a,
{
    move |upstream| Asyncerator::new(stream::once(Ok(value)).chain(upstream))
}

/// Drop the first `count` values. Failures are never dropped.
pub fn skip<'a, T>(count: usize) -> impl FnOnce(Asyncerator<'a, T>) -> Asyncerator<'a, T>
where
    T: Send + 'a,
{
    move |upstream| {
        let mut remaining = count;
        Asyncerator::new(StreamExt::filter(upstream, move |item| match item {
            Ok(_) if remaining > 0 => {
                remaining -= 1;
                false
            }
            _ => true,
        }))
    }
}
