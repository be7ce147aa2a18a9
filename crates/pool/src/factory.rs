//! Construction of pooled instances.
//!
//! A [`Factory`] builds a new instance whenever the pool has no idle one to
//! hand out. Plain closures returning [`Result<T>`](crate::Result) are
//! factories already; asynchronous construction goes through
//! [`from_async`].

use std::future::Future;

use futures::future::BoxFuture;

use crate::error::Result;

/// Builds new instances of `T` for a pool.
///
/// Errors are returned from `acquire` unchanged. The pool never retries a
/// failed construction and may call `create` from several tasks at once.
pub trait Factory<T>: Send + Sync + 'static {
    /// Construct a fresh instance.
    fn create(&self) -> BoxFuture<'_, Result<T>>;
}

impl<T, F> Factory<T> for F
where
    F: Fn() -> Result<T> + Send + Sync + 'static,
    T: Send + 'static,
{
    fn create(&self) -> BoxFuture<'_, Result<T>> {
        Box::pin(std::future::ready(self()))
    }
}

/// Factory adapter for closures returning a future. See [`from_async`].
pub struct AsyncFactory<F> {
    f: F,
}

impl<F> std::fmt::Debug for AsyncFactory<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFactory").finish_non_exhaustive()
    }
}

impl<T, F, Fut> Factory<T> for AsyncFactory<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    fn create(&self) -> BoxFuture<'_, Result<T>> {
        Box::pin((self.f)())
    }
}

/// Wrap an async closure as a [`Factory`].
///
/// ```rust,ignore
/// let factory = from_async(|| async { Connection::open("db").await });
/// ```
pub fn from_async<F, Fut, T>(f: F) -> AsyncFactory<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    AsyncFactory { f }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn closure_is_a_factory() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_c = Arc::clone(&calls);
        let factory = move || -> Result<u32> { Ok(calls_c.fetch_add(1, Ordering::SeqCst)) };

        assert_eq!(factory.create().await.unwrap(), 0);
        assert_eq!(factory.create().await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn async_factory_awaits_construction() {
        let factory = from_async(|| async {
            tokio::task::yield_now().await;
            Ok(String::from("conn"))
        });
        assert_eq!(factory.create().await.unwrap(), "conn");
    }

    #[tokio::test]
    async fn factory_errors_pass_through() {
        let factory = || -> Result<u8> { Err(Error::initialization("boom")) };
        let err = factory.create().await.unwrap_err();
        assert!(matches!(err, Error::Initialization { ref reason, .. } if reason == "boom"));
    }
}
