//! Helpers for building worker functions passed to
//! [`race`][crate::operator::race], and [`dynamic`], which runs a worker
//! with adaptive concurrency.

mod dynamic;
mod retry;
mod timeout;

pub use dynamic::dynamic;
pub use retry::retry;
pub use timeout::{timeout, with_timeout};
