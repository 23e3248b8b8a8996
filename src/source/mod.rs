//! Sources: adapting producers into sequences and combining sequences.

mod all;
mod from;
mod merge;
mod series;
mod shared;

pub use all::all;
pub use from::{
    from, from_fn, from_futures, from_iter, from_reader, from_stream, from_try_stream,
    IntoAsyncerator, Producer,
};
pub use merge::{merge, Mergeable};
pub use series::series;
pub use shared::Shared;
