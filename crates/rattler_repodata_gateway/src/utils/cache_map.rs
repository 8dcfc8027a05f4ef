use dashmap::DashMap;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    future::Future,
    hash::Hash,
    sync::{Arc, Weak},
};
use thiserror::Error;
use tokio::sync::broadcast;

/// A map that caches the result of an asynchronous computation per key.
///
/// Concurrent requests for the same key are coalesced: only the first request
/// runs the computation, the others wait for its result. Failed computations
/// are not cached, the next request for the key tries again.
pub(crate) struct CoalescingMap<K, V, E> {
    inner: Arc<CoalescingMapInner<K, V, E>>,
}

type ResultChannel<V, E> = Weak<broadcast::Sender<Result<V, E>>>;

struct CoalescingMapInner<K, V, E> {
    values: DashMap<K, V>,
    in_flight: Mutex<HashMap<K, ResultChannel<V, E>>>,
}

#[derive(Debug, Error, Clone)]
pub(crate) enum CoalescingError<E> {
    #[error(transparent)]
    CacheError(E),

    #[error("cancelled")]
    Cancelled,
}

impl<K: Eq + Hash, V, E> Default for CoalescingMap<K, V, E> {
    fn default() -> Self {
        Self {
            inner: Arc::new(CoalescingMapInner {
                values: DashMap::default(),
                in_flight: Mutex::new(HashMap::default()),
            }),
        }
    }
}

impl<K, V, E> CoalescingMap<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + 'static,
{
    /// Returns the cached value for the key or computes it with the future
    /// returned by `f`. The future runs on a separate task so that it
    /// completes even if the caller that started it is dropped.
    pub async fn get_or_cache<F, Fut>(&self, key: &K, f: F) -> Result<V, CoalescingError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let inner = self.inner.as_ref();

        // Fast path, check if this value was previously already cached.
        if let Some(cached_value) = inner.values.get(key) {
            return Ok(cached_value.clone());
        }

        let mut receiver = {
            // Otherwise, lock the in-flight map to check if there is an ongoing request. The
            // guard must not live across an await point.
            let mut in_flight = inner.in_flight.lock();

            // Now that we acquired the lock, another task may have already written
            // its result. Values are only inserted while holding the lock.
            if let Some(cached_value) = inner.values.get(key) {
                return Ok(cached_value.clone());
            }

            // If there is an ongoing request, subscribe to its output. Otherwise start a new
            // request.
            if let Some(sender) = in_flight.get(key).and_then(Weak::upgrade) {
                sender.subscribe()
            } else {
                let (tx, rx) = broadcast::channel::<Result<V, E>>(1);
                let tx = Arc::new(tx);
                let key = key.clone();

                // Only store a weak reference in our map to ensure that if something panics
                // we don't create a deadlock.
                in_flight.insert(key.clone(), Arc::downgrade(&tx));

                // Call the closure first, so we don't send the entire closure across threads,
                // just the future it returns.
                let fut = f();

                let inner = self.inner.clone();
                tokio::spawn(async move {
                    let result = fut.await;

                    let mut in_flight = inner.in_flight.lock();
                    if let Ok(value) = &result {
                        inner.values.insert(key.clone(), value.clone());
                    }
                    in_flight.remove(&key);
                    drop(in_flight);

                    // Broadcast the result to all receivers.
                    let _ = tx.send(result);
                });

                rx
            }
        };

        match receiver.recv().await {
            Ok(result) => result.map_err(CoalescingError::CacheError),
            Err(_) => Err(CoalescingError::Cancelled),
        }
    }

    /// Removes all cached values.
    pub fn clear(&self) {
        self.inner.values.clear();
    }
}

#[cfg(test)]
mod test {
    use super::{CoalescingError, CoalescingMap};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_requests_are_coalesced() {
        let map: Arc<CoalescingMap<String, usize, String>> = Arc::new(CoalescingMap::default());
        let invocations = Arc::new(AtomicUsize::new(0));

        let requests = (0..10).map(|_| {
            let map = map.clone();
            let invocations = invocations.clone();
            tokio::spawn(async move {
                map.get_or_cache(&"key".to_owned(), move || async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(invocations.fetch_add(1, Ordering::SeqCst))
                })
                .await
            })
        });

        for request in futures::future::join_all(requests).await {
            assert_eq!(request.unwrap().unwrap(), 0);
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);

        // The value is cached now.
        let value = map
            .get_or_cache(&"key".to_owned(), || async { Ok(42) })
            .await
            .unwrap();
        assert_eq!(value, 0);
    }

    #[test]
    fn test_get_or_cache_is_send() {
        fn assert_send<T: Send>(_: T) {}

        let map: CoalescingMap<u32, u32, String> = CoalescingMap::default();
        assert_send(map.get_or_cache(&1, || async { Ok(1) }));
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let map: CoalescingMap<u32, u32, String> = CoalescingMap::default();

        let err = map
            .get_or_cache(&1, || async { Err("failed".to_owned()) })
            .await
            .unwrap_err();
        assert!(matches!(err, CoalescingError::CacheError(message) if message == "failed"));

        let value = map.get_or_cache(&1, || async { Ok(5) }).await.unwrap();
        assert_eq!(value, 5);

        map.clear();
        let value = map.get_or_cache(&1, || async { Ok(6) }).await.unwrap();
        assert_eq!(value, 6);
    }
}
