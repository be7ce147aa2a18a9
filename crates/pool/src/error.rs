//! Error types for pool operations
use thiserror::Error;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pool construction, acquisition and lease handling
#[derive(Error, Debug)]
pub enum Error {
    /// Pool configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// A factory failed to construct a new instance.
    ///
    /// Factories return this variant themselves; `acquire` hands it back to
    /// the caller untouched and never retries.
    #[error("Initialization failed: {reason}")]
    Initialization {
        /// The failure reason
        reason: String,
        /// The underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Bounded pool had no free slot before the acquire timeout elapsed
    #[error("Pool '{pool}' exhausted: {active}/{max_size} in use after waiting {waited_ms}ms")]
    PoolExhausted {
        /// The pool name
        pool: String,
        /// Leases outstanding when the wait gave up
        active: usize,
        /// Maximum pool size
        max_size: usize,
        /// How long the caller waited, in milliseconds
        waited_ms: u64,
    },

    /// The pool has been shut down
    #[error("Pool '{pool}' is closed")]
    PoolClosed {
        /// The pool name
        pool: String,
    },

    /// The acquire context was cancelled while waiting for a slot
    #[error("Acquire on pool '{pool}' was cancelled")]
    Cancelled {
        /// The pool name
        pool: String,
    },

    /// A lease was accessed after its instance went back to the pool
    #[error("Lease from pool '{pool}' used after release")]
    UseAfterRelease {
        /// The pool name
        pool: String,
    },

    /// A lease was released more than once
    #[error("Lease from pool '{pool}' released twice")]
    DoubleRelease {
        /// The pool name
        pool: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an initialization error without an underlying source.
    pub fn initialization<S: Into<String>>(reason: S) -> Self {
        Self::Initialization {
            reason: reason.into(),
            source: None,
        }
    }

    /// Create an initialization error wrapping the error that caused it.
    pub fn initialization_with<S, E>(reason: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Initialization {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Check if this error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. })
    }

    /// Check if this error reports a misuse of a [`Lease`](crate::Lease).
    ///
    /// These are defects in caller code, not runtime conditions.
    #[must_use]
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            Self::UseAfterRelease { .. } | Self::DoubleRelease { .. }
        )
    }

    /// Get the pool name associated with this error (if any)
    #[must_use]
    pub fn pool(&self) -> Option<&str> {
        match self {
            Self::Configuration { .. } | Self::Initialization { .. } => None,
            Self::PoolExhausted { pool, .. }
            | Self::PoolClosed { pool }
            | Self::Cancelled { pool }
            | Self::UseAfterRelease { pool }
            | Self::DoubleRelease { pool } => Some(pool),
        }
    }
}
