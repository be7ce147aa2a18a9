//! Per-acquire context with timeout and cancellation

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Context for a single acquire call.
///
/// Overrides the pool's default `acquire_timeout` and carries a cooperative
/// cancellation token. A cancelled token aborts a pending wait for capacity
/// with [`Error::Cancelled`](crate::Error::Cancelled).
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Wait bound for this call; `None` falls back to the pool config.
    pub timeout: Option<Duration>,
    /// Cooperative cancellation token.
    pub cancellation: CancellationToken,
}

impl Context {
    /// Create a context that defers to the pool configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the wait for capacity by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replace the default cancellation token with the provided one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}
