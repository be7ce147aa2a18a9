//! Scoped custody of one pooled instance.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::pool::Shared;

/// Scoped handle over one instance checked out of a [`Pool`](crate::Pool).
///
/// The instance goes back to the pool exactly once: on the first call to
/// [`release`](Self::release) or [`discard`](Self::discard), or when the
/// lease is dropped, whichever comes first. Dropping covers every exit
/// path, including `?` returns, panics and aborted tasks.
///
/// Misuse is reported, not ignored:
/// - a second `release`/`discard` returns [`Error::DoubleRelease`] and
///   leaves the pool untouched;
/// - [`get`](Self::get)/[`get_mut`](Self::get_mut) after release return
///   [`Error::UseAfterRelease`]; `Deref` panics instead.
pub struct Lease<T: Send + 'static> {
    instance: Option<T>,
    shared: Arc<Shared<T>>,
    acquired_at: Instant,
}

impl<T: Send + 'static> Lease<T> {
    pub(crate) fn new(instance: T, shared: Arc<Shared<T>>) -> Self {
        Self {
            instance: Some(instance),
            shared,
            acquired_at: Instant::now(),
        }
    }

    /// Borrow the leased instance.
    pub fn get(&self) -> Result<&T> {
        self.instance.as_ref().ok_or_else(|| Error::UseAfterRelease {
            pool: self.shared.name().to_owned(),
        })
    }

    /// Mutably borrow the leased instance.
    pub fn get_mut(&mut self) -> Result<&mut T> {
        let shared = &self.shared;
        self.instance.as_mut().ok_or_else(|| Error::UseAfterRelease {
            pool: shared.name().to_owned(),
        })
    }

    /// Whether the instance has already left this lease.
    pub fn is_released(&self) -> bool {
        self.instance.is_none()
    }

    /// Time since the instance was handed out.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Return the instance to the pool now instead of at drop.
    pub fn release(&mut self) -> Result<()> {
        let instance = self.take()?;
        self.shared.release(instance, self.acquired_at.elapsed());
        Ok(())
    }

    /// Drop the instance instead of returning it, freeing its capacity slot.
    ///
    /// Use this when the instance is known to be broken.
    pub fn discard(&mut self) -> Result<()> {
        let instance = self.take()?;
        drop(instance);
        self.shared.forget("discarded");
        Ok(())
    }

    /// Take the instance out of the pool for good.
    ///
    /// The pool stops accounting for it and its capacity slot is freed.
    pub fn detach(mut self) -> Result<T> {
        let instance = self.instance.take().ok_or_else(|| Error::UseAfterRelease {
            pool: self.shared.name().to_owned(),
        })?;
        self.shared.forget("detached");
        Ok(instance)
    }

    fn take(&mut self) -> Result<T> {
        self.instance.take().ok_or_else(|| Error::DoubleRelease {
            pool: self.shared.name().to_owned(),
        })
    }
}

impl<T: Send + 'static> std::ops::Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.instance {
            Some(instance) => instance,
            None => panic!("lease from pool '{}' used after release", self.shared.name()),
        }
    }
}

impl<T: Send + 'static> std::ops::DerefMut for Lease<T> {
    fn deref_mut(&mut self) -> &mut T {
        let name = self.shared.name();
        match &mut self.instance {
            Some(instance) => instance,
            None => panic!("lease from pool '{name}' used after release"),
        }
    }
}

impl<T: Send + 'static> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            self.shared.release(instance, self.acquired_at.elapsed());
        }
    }
}

impl<T: Send + std::fmt::Debug + 'static> std::fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("pool", &self.shared.name())
            .field("instance", &self.instance)
            .field("held_for", &self.held_for())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, Pool, Result};

    fn pool() -> Pool<String> {
        Pool::builder()
            .name("strings")
            .factory(|| -> Result<String> { Ok(String::from("hello")) })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn lease_deref() {
        let pool = pool();
        let lease = pool.acquire().await.unwrap();
        assert_eq!(*lease, "hello");
        assert_eq!(lease.get().unwrap(), "hello");
    }

    #[tokio::test]
    async fn lease_deref_mut() {
        let pool = pool();
        let mut lease = pool.acquire().await.unwrap();
        lease.push_str(" world");
        lease.get_mut().unwrap().push('!');
        assert_eq!(*lease, "hello world!");
    }

    #[tokio::test]
    async fn drop_returns_instance() {
        let pool = pool();
        let lease = pool.acquire().await.unwrap();
        assert_eq!(pool.stats().active, 1);
        drop(lease);

        let stats = pool.stats();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.total_releases, 1);
    }

    #[tokio::test]
    async fn get_after_release_is_an_error() {
        let pool = pool();
        let mut lease = pool.acquire().await.unwrap();
        lease.release().unwrap();

        assert!(lease.is_released());
        assert!(matches!(lease.get(), Err(Error::UseAfterRelease { ref pool }) if pool == "strings"));
        assert!(matches!(lease.get_mut(), Err(Error::UseAfterRelease { .. })));
    }

    #[tokio::test]
    #[should_panic(expected = "used after release")]
    async fn deref_after_release_panics() {
        let pool = pool();
        let mut lease = pool.acquire().await.unwrap();
        lease.release().unwrap();
        let _ = lease.len();
    }

    #[tokio::test]
    async fn discard_drops_instance() {
        let pool = pool();
        let mut lease = pool.acquire().await.unwrap();
        lease.discard().unwrap();
        assert!(matches!(lease.discard(), Err(Error::DoubleRelease { .. })));
        drop(lease);

        let stats = pool.stats();
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.destroyed, 1);
        assert_eq!(stats.live(), 0);
    }

    #[tokio::test]
    async fn detach_takes_ownership() {
        let pool = pool();
        let lease = pool.acquire().await.unwrap();
        let owned: String = lease.detach().unwrap();
        assert_eq!(owned, "hello");

        let stats = pool.stats();
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.live(), 0);
    }

    #[tokio::test]
    async fn detach_after_release_is_an_error() {
        let pool = pool();
        let mut lease = pool.acquire().await.unwrap();
        lease.release().unwrap();
        assert!(matches!(lease.detach(), Err(Error::UseAfterRelease { .. })));
        assert_eq!(pool.stats().idle, 1);
    }
}
