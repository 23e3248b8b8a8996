//! Utilities shared by the sources and operators of this crate.

mod rng;
mod waker;

pub(crate) use rng::RandomGenerator;
pub(crate) use waker::BroadcastWaker;
