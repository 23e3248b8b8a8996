//! Error types shared by every sequence, operator and sink.

use std::time::Duration;

/// A type-erased error raised by user code (workers, hooks, producers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced while pulling from an [`Asyncerator`][crate::Asyncerator].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid configuration was passed to a constructor.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A chunk handed to a text operator has no string form.
    #[error("{0} not convertible to a string")]
    NotConvertible(&'static str),

    /// Bytes handed to a text operator were not valid UTF-8.
    #[error("invalid UTF-8 in text chunk: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// A retried worker failed on every attempt.
    #[error("maximum retries ({retries}) exceeded")]
    RetryExhausted {
        /// Number of retries performed after the first attempt.
        retries: u32,
        /// Error returned by the last attempt.
        #[source]
        last: Box<Error>,
    },

    /// A worker was refused by a rate-limited backend and asks for a pause.
    ///
    /// [`worker::dynamic`][crate::worker::dynamic] waits `delay` before
    /// starting more work.
    #[error("throttled, retry after {delay:?}")]
    Throttled {
        /// Requested pause.
        delay: Duration,
        /// The refusal itself.
        #[source]
        source: Box<Error>,
    },

    /// A worker did not finish within its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// An I/O error from a reader or writer.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An error raised by user code.
    #[error(transparent)]
    Other(BoxError),
}

impl Error {
    /// Wrap an arbitrary error raised by user code.
    pub fn other(error: impl Into<BoxError>) -> Self {
        Self::Other(error.into())
    }

    /// Mark `error` as a throttling refusal asking for a pause of `delay`.
    pub fn throttled(delay: Duration, error: impl Into<Error>) -> Self {
        Self::Throttled {
            delay,
            source: Box::new(error.into()),
        }
    }

    /// The pause requested by a [`Error::Throttled`] refusal.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Throttled { delay, .. } => Some(*delay),
            _ => None,
        }
    }

    /// Returns `true` if this is a [`Error::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::Utf8(err.utf8_error())
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

/// Configuration rejected at construction time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Concurrency must lie in `1..=max`.
    #[error("concurrency must be between 1 and {max}, got {value}")]
    Concurrency {
        /// The rejected value.
        value: usize,
        /// Largest accepted value.
        max: usize,
    },

    /// Retry wait ratio exceeds the accepted maximum.
    #[error("retry wait ratio must be at most {max:?}, got {value:?}")]
    WaitRatio {
        /// The rejected value.
        value: Duration,
        /// Largest accepted value.
        max: Duration,
    },

    /// Retry count exceeds the accepted maximum.
    #[error("retries must be at most {max}, got {value}")]
    Retries {
        /// The rejected value.
        value: u32,
        /// Largest accepted value.
        max: u32,
    },

    /// Adaptive concurrency bounds must satisfy `1 <= min <= max <= limit`.
    #[error("adaptive concurrency must satisfy 1 <= min <= max <= {limit}, got {min}..={max}")]
    DynamicBounds {
        /// Requested lower bound.
        min: usize,
        /// Requested upper bound.
        max: usize,
        /// Largest accepted upper bound.
        limit: usize,
    },
}

/// Convenience alias for results carrying [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
