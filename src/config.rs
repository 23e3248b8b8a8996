//! Tunables and their validated wrappers.
//!
//! Everything here is checked when it is built, so a bad value is reported
//! before a single element has been pulled.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use crate::error::ConfigError;

/// Default number of in-flight workers for [`race`][crate::operator::race].
pub const DEFAULT_CONCURRENCY: usize = 128;

/// Largest accepted concurrency.
pub const MAX_CONCURRENCY: usize = 1 << 16;

/// Default deadline for [`worker::timeout`][crate::worker::timeout].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Size of the buffer used when adapting an `AsyncRead`.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Default number of retries.
pub const DEFAULT_RETRIES: u32 = 8;

/// Largest accepted number of retries.
pub const MAX_RETRIES: u32 = 64;

/// Default base wait between retries.
pub const DEFAULT_WAIT_RATIO: Duration = Duration::from_millis(100);

/// Largest accepted base wait between retries.
pub const MAX_WAIT_RATIO: Duration = Duration::from_secs(60);

/// Concurrency [`worker::dynamic`][crate::worker::dynamic] starts at and
/// never drops below.
pub const MIN_DYNAMIC_CONCURRENCY: usize = 4;

/// Concurrency [`worker::dynamic`][crate::worker::dynamic] never exceeds.
pub const MAX_DYNAMIC_CONCURRENCY: usize = 64;

/// Number of recent latencies the adaptive worker judges speed by.
pub const DYNAMIC_SAMPLE_SIZE: usize = 100;

/// Average latency under which work counts as fast.
pub const DYNAMIC_LOW_CUTOFF: Duration = Duration::from_secs(1);

/// Average latency over which work counts as slow.
pub const DYNAMIC_HIGH_CUTOFF: Duration = Duration::from_secs(10);

/// Shortest time between two concurrency adjustments, and the period of
/// the throughput log.
pub const DYNAMIC_ADJUST_PERIOD: Duration = Duration::from_secs(1);

/// Upper bound on the number of workers running at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Concurrency(NonZeroUsize);

impl Concurrency {
    /// Validate a concurrency limit.
    ///
    /// # Example
    ///
    /// ```rust
    /// use asyncerator::config::Concurrency;
    ///
    /// assert_eq!(Concurrency::new(4).unwrap().get(), 4);
    /// assert!(Concurrency::new(0).is_err());
    /// ```
    pub fn new(value: usize) -> Result<Self, ConfigError> {
        match NonZeroUsize::new(value) {
            Some(n) if value <= MAX_CONCURRENCY => Ok(Self(n)),
            _ => Err(ConfigError::Concurrency {
                value,
                max: MAX_CONCURRENCY,
            }),
        }
    }

    /// The limit as a plain number.
    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        match NonZeroUsize::new(DEFAULT_CONCURRENCY) {
            Some(n) => Self(n),
            None => unreachable!("default concurrency is non-zero"),
        }
    }
}

impl TryFrom<usize> for Concurrency {
    type Error = ConfigError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Backoff policy for [`worker::retry`][crate::worker::retry].
///
/// Retry number `n` (the first retry being number one) waits
/// `wait_ratio * 2^n` before running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    wait_ratio: Duration,
    retries: u32,
}

impl RetryOptions {
    /// Validate a retry policy.
    pub fn new(wait_ratio: Duration, retries: u32) -> Result<Self, ConfigError> {
        if wait_ratio > MAX_WAIT_RATIO {
            return Err(ConfigError::WaitRatio {
                value: wait_ratio,
                max: MAX_WAIT_RATIO,
            });
        }
        if retries > MAX_RETRIES {
            return Err(ConfigError::Retries {
                value: retries,
                max: MAX_RETRIES,
            });
        }
        Ok(Self {
            wait_ratio,
            retries,
        })
    }

    /// Replace the base wait.
    pub fn with_wait_ratio(self, wait_ratio: Duration) -> Result<Self, ConfigError> {
        Self::new(wait_ratio, self.retries)
    }

    /// Replace the retry count.
    pub fn with_retries(self, retries: u32) -> Result<Self, ConfigError> {
        Self::new(self.wait_ratio, retries)
    }

    /// Base wait between attempts.
    pub fn wait_ratio(&self) -> Duration {
        self.wait_ratio
    }

    /// Retries allowed after the first attempt.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Wait before retry number `attempt`, saturating on overflow.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.wait_ratio.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            wait_ratio: DEFAULT_WAIT_RATIO,
            retries: DEFAULT_RETRIES,
        }
    }
}

/// Tuning for [`worker::dynamic`][crate::worker::dynamic].
///
/// Concurrency starts at `min`. Errors halve it, consistently fast work
/// raises it by a tenth at most once per
/// [`DYNAMIC_ADJUST_PERIOD`], and slow work lowers it by the same step.
/// Failed items are retried under `retry`, each attempt bounded by
/// `timeout`.
#[derive(Debug, Clone, Copy)]
pub struct DynamicOptions {
    min: usize,
    max: usize,
    retry: RetryOptions,
    timeout: Duration,
    clock: fn() -> Instant,
}

impl DynamicOptions {
    /// Validate the concurrency bounds.
    ///
    /// # Example
    ///
    /// ```rust
    /// use asyncerator::config::DynamicOptions;
    ///
    /// assert!(DynamicOptions::new(2, 16).is_ok());
    /// assert!(DynamicOptions::new(8, 4).is_err());
    /// ```
    pub fn new(min: usize, max: usize) -> Result<Self, ConfigError> {
        if min == 0 || min > max || max > MAX_CONCURRENCY {
            return Err(ConfigError::DynamicBounds {
                min,
                max,
                limit: MAX_CONCURRENCY,
            });
        }
        Ok(Self {
            min,
            max,
            retry: RetryOptions::default(),
            timeout: DEFAULT_TIMEOUT,
            clock: Instant::now,
        })
    }

    /// Replace the retry policy applied to failed items.
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the per-attempt deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the clock latencies are measured with.
    ///
    /// Useful to drive the adjustments from a mocked runtime clock.
    pub fn with_clock(mut self, clock: fn() -> Instant) -> Self {
        self.clock = clock;
        self
    }

    /// Lower concurrency bound, and the starting point.
    pub fn min(&self) -> usize {
        self.min
    }

    /// Upper concurrency bound.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Retry policy for failed items.
    pub fn retry(&self) -> RetryOptions {
        self.retry
    }

    /// Deadline of each attempt.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn now(&self) -> Instant {
        (self.clock)()
    }
}

impl Default for DynamicOptions {
    fn default() -> Self {
        Self {
            min: MIN_DYNAMIC_CONCURRENCY,
            max: MAX_DYNAMIC_CONCURRENCY,
            retry: RetryOptions::default(),
            timeout: DEFAULT_TIMEOUT,
            clock: Instant::now,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn concurrency_bounds() {
        assert_eq!(Concurrency::default().get(), DEFAULT_CONCURRENCY);
        assert!(Concurrency::try_from(MAX_CONCURRENCY).is_ok());
        assert_eq!(
            Concurrency::new(MAX_CONCURRENCY + 1),
            Err(ConfigError::Concurrency {
                value: MAX_CONCURRENCY + 1,
                max: MAX_CONCURRENCY
            })
        );
    }

    #[test]
    fn retry_validation() {
        assert!(RetryOptions::new(Duration::ZERO, 0).is_ok());
        assert!(RetryOptions::new(MAX_WAIT_RATIO, MAX_RETRIES).is_ok());
        assert!(RetryOptions::new(MAX_WAIT_RATIO + Duration::from_millis(1), 1).is_err());
        assert!(RetryOptions::default().with_retries(MAX_RETRIES + 1).is_err());
    }

    #[test]
    fn dynamic_bounds() {
        let opts = DynamicOptions::default();
        assert_eq!((opts.min(), opts.max()), (4, 64));
        assert_eq!(opts.timeout(), DEFAULT_TIMEOUT);
        assert!(DynamicOptions::new(1, 1).is_ok());
        assert_eq!(
            DynamicOptions::new(0, 4).unwrap_err(),
            ConfigError::DynamicBounds {
                min: 0,
                max: 4,
                limit: MAX_CONCURRENCY
            }
        );
        assert!(DynamicOptions::new(4, MAX_CONCURRENCY + 1).is_err());
    }

    #[test]
    fn backoff_doubles() {
        let opts = RetryOptions::default();
        assert_eq!(opts.backoff(0), Duration::from_millis(100));
        assert_eq!(opts.backoff(3), Duration::from_millis(800));
        assert_eq!(opts.backoff(40), Duration::MAX);
    }
}
