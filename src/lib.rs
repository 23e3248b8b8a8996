//! Lazy, pull-based async sequences with a standard set of operators.
//!
//! Every supported producer (iterators, streams, futures, readers) is
//! adapted into one canonical type, [`Asyncerator`], a fallible
//! [`Stream`][futures_core::Stream] that ends for good after its first
//! failure. On top of it this crate provides:
//!
//! - [`source`]: adapting producers ([`from`]), and combining sequences with
//!   [`merge`] (dynamic, recursive fan-in), [`all`] and [`series`].
//! - [`operator`]: `map`, `filter`, `flat`, `for_each`, `before`, `after`,
//!   `skip`, `split`, `sequence`, `close_before`/`close_after`, the error and
//!   completion hooks, and [`race`][operator::race], a concurrency bounded
//!   map emitting in completion order.
//! - [`sink`]: collecting into a `Vec` or `String`, folding, draining and
//!   writing into an `AsyncWrite`.
//! - [`pipeline!`]: wiring a source through operators into a sink.
//! - [`worker`]: retry and timeout wrappers for `race` workers, and
//!   [`dynamic`][worker::dynamic], a map whose concurrency follows the
//!   error rate and latency of the work.
//!
//! # Examples
//!
//! ```rust
//! use asyncerator::prelude::*;
//! use futures_lite::future::block_on;
//!
//! # block_on(async {
//! let mut lengths = from(vec!["merge", "race", "split"])
//!     .race(|word| async move { Ok::<_, Error>(word.len()) })
//!     .to_array()
//!     .await?;
//! lengths.sort();
//! assert_eq!(lengths, [4, 5, 5]);
//! # Ok::<(), asyncerator::Error>(())
//! # }).unwrap();
//! ```
//!
//! # Logging
//!
//! Diagnostics are emitted through [`tracing`] under the `asyncerator::*`
//! targets. Install a subscriber to see them.

#![deny(missing_debug_implementations, nonstandard_style, unsafe_code)]
#![warn(missing_docs, unreachable_pub)]

mod asyncerator;
mod chunk;
mod macros;
mod utils;

pub mod config;
pub mod error;
pub mod operator;
pub mod sink;
pub mod source;
pub mod worker;

pub use crate::asyncerator::{Asyncerator, BoxFuture};
pub use chunk::Chunk;
pub use error::{BoxError, Error, Result};
pub use source::{
    all, from, from_fn, from_futures, from_iter, from_reader, from_stream, from_try_stream, merge,
    series, IntoAsyncerator, Mergeable, Producer, Shared,
};

/// The asyncerator prelude.
pub mod prelude {
    pub use super::config::Concurrency;
    pub use super::source::{from, merge, IntoAsyncerator, Mergeable, Producer};
    pub use super::{pipeline, Asyncerator, Error};
}
