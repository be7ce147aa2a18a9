//! Pool configuration types

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use tokio::sync::Semaphore;

use crate::error::{Error, Result};

/// Order in which idle instances are handed out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PoolStrategy {
    /// Most recently returned instance first. Keeps a small warm working set.
    #[default]
    Lifo,
    /// Oldest returned instance first. Spreads use across all idle instances.
    Fifo,
}

/// Configuration for an object pool
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Name used in log fields and error messages
    pub name: String,
    /// Maximum number of live instances; `None` means unbounded
    pub max_size: Option<usize>,
    /// Default wait bound for `acquire`; `None` waits indefinitely
    pub acquire_timeout: Option<Duration>,
    /// Reuse order of idle instances
    pub strategy: PoolStrategy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "pool".to_string(),
            max_size: None,
            acquire_timeout: None,
            strategy: PoolStrategy::Lifo,
        }
    }
}

impl PoolConfig {
    /// Bounded configuration with the given capacity.
    pub fn bounded(max_size: usize) -> Self {
        Self {
            max_size: Some(max_size),
            ..Self::default()
        }
    }

    /// Validate pool configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::configuration("name cannot be empty"));
        }
        match self.max_size {
            Some(0) => {
                return Err(Error::configuration("max_size must be greater than 0"));
            }
            Some(max) if max > Semaphore::MAX_PERMITS => {
                return Err(Error::configuration(format!(
                    "max_size ({max}) must not exceed {}",
                    Semaphore::MAX_PERMITS
                )));
            }
            _ => {}
        }
        if self.acquire_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::configuration(
                "acquire_timeout must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Whether the pool caps the number of live instances.
    pub fn is_bounded(&self) -> bool {
        self.max_size.is_some()
    }
}
