//! # Reservoir Pool
//!
//! Generic, thread-safe object pool for expensive-to-build resources.
//!
//! A [`Pool`] builds instances lazily through a [`Factory`], keeps returned
//! instances on a free list for reuse (most recently returned first), and
//! optionally caps how many instances may be alive at once. Callers get a
//! [`Lease`]: a scoped handle that gives the instance back exactly once,
//! either explicitly or when it goes out of scope.
//!
//! ```rust,ignore
//! use reservoir_pool::{Pool, Result};
//!
//! let pool = Pool::builder()
//!     .name("processors")
//!     .max_size(4)
//!     .factory(|| -> Result<Processor> { Ok(Processor::new()) })
//!     .build()?;
//!
//! {
//!     let processor = pool.acquire().await?;
//!     processor.process("work");
//! } // back on the free list here
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod factory;
pub mod lease;
pub mod pool;

pub use config::{PoolConfig, PoolStrategy};
pub use context::Context;
pub use error::{Error, Result};
pub use factory::{AsyncFactory, Factory, from_async};
pub use lease::Lease;
pub use pool::{Pool, PoolBuilder, PoolStats};
