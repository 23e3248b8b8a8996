use std::num::Wrapping;
use std::sync::atomic::{AtomicU32, Ordering};

/// Small xorshift generator used to pick a fair starting point when
/// polling a set of sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RandomGenerator(Wrapping<u32>);

impl RandomGenerator {
    pub(crate) fn new() -> Self {
        // Mix a process-wide counter into the seed so two generators created
        // back to back don't walk the same sequence.
        static SEED: AtomicU32 = AtomicU32::new(0x9E37_79B9);
        let seed = SEED.fetch_add(0x6D2B_79F5, Ordering::Relaxed);
        Self(Wrapping(seed | 1))
    }

    /// Generates a random number in `0..n`.
    pub(crate) fn generate(&mut self, n: u32) -> u32 {
        // 32-bit Xorshift, see https://en.wikipedia.org/wiki/Xorshift
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;

        // Lemire's multiply-shift reduction in place of `x % n`.
        ((u64::from(x.0)).wrapping_mul(u64::from(n)) >> 32) as u32
    }
}
