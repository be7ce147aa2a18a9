//! Object pool — lazy construction, optional capacity bound, scoped leases.
//!
//! `Pool<T>` hands out [`Lease`]s. An idle instance is reused when one is
//! available; otherwise the [`Factory`] builds a new one outside the lock.
//! A bounded pool keeps one semaphore permit per capacity slot, so callers
//! beyond the bound wait for a release, a timeout, or cancellation.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Semaphore, SemaphorePermit, TryAcquireError};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::{PoolConfig, PoolStrategy};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::factory::Factory;
use crate::lease::Lease;

type Validator<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

// ---------------------------------------------------------------------------
// PoolStats
// ---------------------------------------------------------------------------

/// Pool statistics.
///
/// Taken under the pool lock, so `active + idle == live()` holds for every
/// snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total successful acquisitions.
    pub total_acquisitions: u64,
    /// Total leases that ended (released, discarded or detached).
    pub total_releases: u64,
    /// Current number of instances checked out.
    pub active: usize,
    /// Current number of idle instances in the pool.
    pub idle: usize,
    /// Total instances ever created.
    pub created: u64,
    /// Total instances permanently removed from the pool.
    pub destroyed: u64,
}

impl PoolStats {
    /// Instances currently accounted for by the pool (idle + checked out).
    pub fn live(&self) -> u64 {
        self.created - self.destroyed
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct State<T> {
    idle: VecDeque<T>,
    closed: bool,
    total_acquisitions: u64,
    total_releases: u64,
    active: usize,
    created: u64,
    destroyed: u64,
}

impl<T> State<T> {
    fn new(capacity: usize) -> Self {
        Self {
            idle: VecDeque::with_capacity(capacity),
            closed: false,
            total_acquisitions: 0,
            total_releases: 0,
            active: 0,
            created: 0,
            destroyed: 0,
        }
    }

    fn pop(&mut self, strategy: PoolStrategy) -> Option<T> {
        match strategy {
            PoolStrategy::Lifo => self.idle.pop_back(),
            PoolStrategy::Fifo => self.idle.pop_front(),
        }
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            total_acquisitions: self.total_acquisitions,
            total_releases: self.total_releases,
            active: self.active,
            idle: self.idle.len(),
            created: self.created,
            destroyed: self.destroyed,
        }
    }
}

/// State shared between a pool and every lease it handed out.
pub(crate) struct Shared<T> {
    config: PoolConfig,
    factory: Box<dyn Factory<T>>,
    validator: Option<Validator<T>>,
    state: Mutex<State<T>>,
    /// One permit per capacity slot; `None` for unbounded pools.
    semaphore: Option<Semaphore>,
}

impl<T: Send + 'static> Shared<T> {
    pub(crate) fn name(&self) -> &str {
        &self.config.name
    }

    /// Take an instance back from a lease.
    ///
    /// The instance goes onto the free list, or is dropped if the pool has
    /// been shut down in the meantime.
    pub(crate) fn release(&self, instance: T, held_for: Duration) {
        let leftover = {
            let mut state = self.state.lock();
            debug_assert!(state.active > 0, "release without an active lease");
            state.active -= 1;
            state.total_releases += 1;
            if state.closed {
                state.destroyed += 1;
                Some(instance)
            } else {
                state.idle.push_back(instance);
                None
            }
        };
        let discarded = leftover.is_some();
        drop(leftover);
        self.return_slot();

        trace!(
            pool = %self.config.name,
            held_ms = held_for.as_millis() as u64,
            discarded,
            "Released instance"
        );
    }

    /// Account for a leased instance that will not come back.
    pub(crate) fn forget(&self, reason: &'static str) {
        {
            let mut state = self.state.lock();
            debug_assert!(state.active > 0, "release without an active lease");
            state.active -= 1;
            state.total_releases += 1;
            state.destroyed += 1;
        }
        self.return_slot();
        trace!(pool = %self.config.name, reason, "Instance left the pool");
    }

    fn return_slot(&self) {
        if let Some(semaphore) = &self.semaphore {
            semaphore.add_permits(1);
        }
    }

    fn closed_error(&self) -> Error {
        Error::PoolClosed {
            pool: self.config.name.clone(),
        }
    }

    fn exhausted_error(&self, waited: Duration) -> Error {
        Error::PoolExhausted {
            pool: self.config.name.clone(),
            active: self.state.lock().active,
            max_size: self.config.max_size.unwrap_or_default(),
            waited_ms: waited.as_millis() as u64,
        }
    }
}

/// Undoes the accounting of a popped instance whose checkout never reached
/// the caller, including when the validity hook panics.
struct Rollback<'a, T: Send + 'static> {
    shared: &'a Shared<T>,
    armed: bool,
}

impl<'a, T: Send + 'static> Rollback<'a, T> {
    fn new(shared: &'a Shared<T>) -> Self {
        Self {
            shared,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<T: Send + 'static> Drop for Rollback<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.shared.state.lock();
            debug_assert!(state.active > 0, "rollback without an active checkout");
            state.active -= 1;
            state.total_acquisitions -= 1;
            state.destroyed += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Pool<T>
// ---------------------------------------------------------------------------

/// Generic object pool.
///
/// Cheap to clone; every clone refers to the same free list, counters and
/// capacity. Instances are built lazily by the pool's [`Factory`] and
/// returned to the free list when their [`Lease`] is released or dropped.
pub struct Pool<T: Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.shared.config.name)
            .field("max_size", &self.shared.config.max_size)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<T: Send + 'static> Pool<T> {
    /// Create a pool from a factory and configuration.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if `config` is invalid.
    pub fn new(factory: impl Factory<T>, config: PoolConfig) -> Result<Self> {
        Self::builder().config(config).factory(factory).build()
    }

    /// Start building a pool.
    pub fn builder() -> PoolBuilder<T> {
        PoolBuilder::default()
    }

    /// Acquire an instance, waiting up to the configured `acquire_timeout`.
    pub async fn acquire(&self) -> Result<Lease<T>> {
        self.acquire_with(&Context::new()).await
    }

    /// Acquire an instance, waiting at most `timeout` for free capacity.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<Lease<T>> {
        self.acquire_with(&Context::new().with_timeout(timeout))
            .await
    }

    /// Acquire an instance under the given context.
    ///
    /// Only a bounded pool at capacity makes the caller wait. The wait ends
    /// with [`Error::PoolExhausted`] on timeout and [`Error::Cancelled`] when
    /// the context's token fires. Dropping the returned future abandons the
    /// wait without taking a slot.
    pub async fn acquire_with(&self, ctx: &Context) -> Result<Lease<T>> {
        self.checkout(ctx, true).await
    }

    async fn checkout(&self, ctx: &Context, wait: bool) -> Result<Lease<T>> {
        let shared = &self.shared;
        if shared.state.lock().closed {
            return Err(shared.closed_error());
        }

        let permit = match &shared.semaphore {
            Some(semaphore) => Some(self.reserve_slot(semaphore, ctx, wait).await?),
            None => None,
        };

        loop {
            let popped = {
                let mut state = shared.state.lock();
                if state.closed {
                    return Err(shared.closed_error());
                }
                let popped = state.pop(shared.config.strategy);
                if popped.is_some() {
                    state.active += 1;
                    state.total_acquisitions += 1;
                }
                popped
            };

            let Some(instance) = popped else {
                break;
            };
            let rollback = Rollback::new(shared);

            if shared.validator.as_ref().is_none_or(|valid| valid(&instance)) {
                rollback.disarm();
                debug!(pool = %shared.config.name, "Reusing idle instance");
                return Ok(self.lease(instance, permit));
            }

            drop(instance);
            drop(rollback);
            debug!(pool = %shared.config.name, "Discarded idle instance that failed validation");
        }

        let instance = shared.factory.create().await.inspect_err(|e| {
            debug!(pool = %shared.config.name, error = %e, "Factory failed to construct instance");
        })?;

        let created = {
            let mut state = shared.state.lock();
            state.created += 1;
            if state.closed {
                state.destroyed += 1;
                None
            } else {
                state.active += 1;
                state.total_acquisitions += 1;
                Some(state.created)
            }
        };
        let Some(created) = created else {
            return Err(shared.closed_error());
        };

        debug!(pool = %shared.config.name, created, "Constructed new instance");
        Ok(self.lease(instance, permit))
    }

    /// Take a capacity slot, waiting for one when `wait` is set.
    async fn reserve_slot<'a>(
        &self,
        semaphore: &'a Semaphore,
        ctx: &Context,
        wait: bool,
    ) -> Result<SemaphorePermit<'a>> {
        let shared = &self.shared;
        match semaphore.try_acquire() {
            Ok(permit) => return Ok(permit),
            Err(TryAcquireError::Closed) => return Err(shared.closed_error()),
            Err(TryAcquireError::NoPermits) if !wait => {
                return Err(shared.exhausted_error(Duration::ZERO));
            }
            Err(TryAcquireError::NoPermits) => {}
        }

        let timeout = ctx.timeout.or(shared.config.acquire_timeout);
        debug!(
            pool = %shared.config.name,
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
            "Pool at capacity, waiting for a release"
        );

        let started = Instant::now();
        let wait_for_permit = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, semaphore.acquire()).await.ok(),
                None => Some(semaphore.acquire().await),
            }
        };

        tokio::select! {
            biased;
            () = ctx.cancellation.cancelled() => {
                debug!(pool = %shared.config.name, "Acquire cancelled while waiting");
                Err(Error::Cancelled {
                    pool: shared.config.name.clone(),
                })
            }
            outcome = wait_for_permit => match outcome {
                Some(Ok(permit)) => Ok(permit),
                Some(Err(_)) => Err(shared.closed_error()),
                None => {
                    let err = shared.exhausted_error(started.elapsed());
                    warn!(pool = %shared.config.name, error = %err, "Acquire timed out");
                    Err(err)
                }
            },
        }
    }

    fn lease(&self, instance: T, permit: Option<SemaphorePermit<'_>>) -> Lease<T> {
        // The slot travels with the lease and comes back through `Shared::return_slot`.
        if let Some(permit) = permit {
            permit.forget();
        }
        Lease::new(instance, Arc::clone(&self.shared))
    }

    /// Make sure up to `count` idle instances are ready, bounded by capacity.
    ///
    /// Reuses idle instances first and constructs the rest, never waiting for
    /// capacity held by other callers. Returns the idle count afterwards.
    /// Constructions show up in [`PoolStats::created`]; the acquisition and
    /// release totals are left as they were.
    pub async fn warm_up(&self, count: usize) -> Result<usize> {
        let ctx = Context::new();
        let mut leases = Vec::with_capacity(count);
        let mut failure = None;
        for _ in 0..count {
            match self.checkout(&ctx, false).await {
                Ok(lease) => leases.push(lease),
                Err(Error::PoolExhausted { .. }) => break,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        let warmed = leases.len();
        drop(leases);

        // Warm-up checkouts are not caller acquisitions.
        let idle = {
            let mut state = self.shared.state.lock();
            state.total_acquisitions -= warmed as u64;
            state.total_releases -= warmed as u64;
            state.idle.len()
        };
        if let Some(e) = failure {
            return Err(e);
        }
        debug!(pool = %self.shared.config.name, warmed, idle, "Warmed up pool");
        Ok(idle)
    }

    /// Close the pool.
    ///
    /// Idle instances are dropped, pending and future acquires fail with
    /// [`Error::PoolClosed`]. Leases still out can be released normally;
    /// their instances are dropped instead of pooled. Calling it again is a
    /// no-op.
    pub fn shutdown(&self) {
        let drained: Vec<T> = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let drained: Vec<T> = state.idle.drain(..).collect();
            state.destroyed += drained.len() as u64;
            drained
        };

        if let Some(semaphore) = &self.shared.semaphore {
            semaphore.close();
        }

        info!(
            pool = %self.shared.config.name,
            drained = drained.len(),
            "Pool shut down"
        );
        drop(drained);
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.shared.state.lock().stats()
    }

    /// The configuration this pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }
}

// ---------------------------------------------------------------------------
// PoolBuilder
// ---------------------------------------------------------------------------

/// Builder for [`Pool`].
///
/// A factory is mandatory; everything else falls back to
/// [`PoolConfig::default`].
pub struct PoolBuilder<T> {
    config: PoolConfig,
    factory: Option<Box<dyn Factory<T>>>,
    validator: Option<Validator<T>>,
}

impl<T> Default for PoolBuilder<T> {
    fn default() -> Self {
        Self {
            config: PoolConfig::default(),
            factory: None,
            validator: None,
        }
    }
}

impl<T> std::fmt::Debug for PoolBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("config", &self.config)
            .field("factory", &self.factory.is_some())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl<T: Send + 'static> PoolBuilder<T> {
    /// Set the factory used to construct instances.
    pub fn factory(mut self, factory: impl Factory<T>) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Check idle instances before reuse; rejected ones are dropped.
    pub fn validate<F>(mut self, validator: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Name used in log fields and error messages.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Cap the number of live instances.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.config.max_size = Some(max_size);
        self
    }

    /// Default wait bound for [`Pool::acquire`].
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = Some(timeout);
        self
    }

    /// Reuse order of idle instances.
    pub fn strategy(mut self, strategy: PoolStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Build the pool.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if no factory was set or the
    /// configuration is invalid.
    pub fn build(self) -> Result<Pool<T>> {
        let factory = self
            .factory
            .ok_or_else(|| Error::configuration("a factory is required"))?;
        self.config.validate()?;

        let capacity = self.config.max_size.unwrap_or_default();
        let semaphore = self.config.max_size.map(Semaphore::new);
        Ok(Pool {
            shared: Arc::new(Shared {
                state: Mutex::new(State::new(capacity)),
                config: self.config,
                factory,
                validator: self.validator,
                semaphore,
            }),
        })
    }
}
