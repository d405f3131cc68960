use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct Cached<V> {
    pub value: V,
    pub fetched_at: DateTime<Utc>,
}

impl<V> Cached<V> {
    pub fn is_stale(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now >= self.fetched_at + ttl
    }
}

type Slot<V> = Arc<Mutex<Option<Cached<V>>>>;

/// Memoizes fetch results per key until they are `ttl` old.
///
/// Each key has its own slot. The map lock is only held to find the slot, and the slot lock is
/// held across the fetch, so concurrent callers for one key share a single upstream request while
/// other keys are served independently.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> anyhow::Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        let slot = {
            let mut entries = self.entries.lock().await;
            let evicted = evict_stale(&mut entries, self.ttl, Utc::now());
            if evicted > 0 {
                tracing::debug!(evicted, remaining = entries.len(), "stale cache entries evicted");
            }
            Arc::clone(entries.entry(key.clone()).or_default())
        };

        let mut cell = slot.lock().await;
        if let Some(cached) = cell.as_ref() {
            if !cached.is_stale(self.ttl, Utc::now()) {
                tracing::debug!(?key, fetched_at = %cached.fetched_at, "cache hit");
                return Ok(cached.value.clone());
            }
        }

        let fetched_at = Utc::now();
        let value = fetch().await?;
        *cell = Some(Cached {
            value: value.clone(),
            fetched_at,
        });
        Ok(value)
    }

    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let n = entries.len();
        entries.clear();
        n
    }

    /// Slots currently in the map, stale ones included.
    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Drops slots that are empty or stale and that no caller is holding.
fn evict_stale<K, V>(
    entries: &mut HashMap<K, Slot<V>>,
    ttl: Duration,
    now: DateTime<Utc>,
) -> usize {
    let before = entries.len();
    entries.retain(|_, slot| {
        // A clone outside the map means a caller is about to read or fill this slot.
        if Arc::strong_count(slot) > 1 {
            return true;
        }
        match slot.try_lock() {
            Ok(cell) => cell.as_ref().is_some_and(|c| !c.is_stale(ttl, now)),
            Err(_) => true,
        }
    });
    before - entries.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn staleness_is_measured_from_fetch_time() {
        let fetched_at = Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap();
        let cached = Cached { value: 1, fetched_at };
        let ttl = Duration::minutes(10);

        assert!(!cached.is_stale(ttl, fetched_at + Duration::minutes(9)));
        assert!(cached.is_stale(ttl, fetched_at + Duration::minutes(10)));
        assert!(cached.is_stale(Duration::zero(), fetched_at));
    }

    #[tokio::test]
    async fn fetches_once_per_key() {
        let cache = TtlCache::<(&str, u32), u32>::new(Duration::hours(1));
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = |v: u32| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, anyhow::Error>(v)
            }
        };

        assert_eq!(cache.get_or_fetch(("R01235", 30), fetch(1)).await.unwrap(), 1);
        assert_eq!(cache.get_or_fetch(("R01235", 30), fetch(2)).await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(cache.get_or_fetch(("R01235", 31), fetch(3)).await.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn zero_ttl_always_refetches() {
        let cache = TtlCache::<(), u32>::new(Duration::zero());
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        for _ in 0..3 {
            cache
                .get_or_fetch((), || async move {
                    Ok(calls.fetch_add(1, Ordering::SeqCst) as u32)
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn stale_entries_of_other_keys_are_evicted() {
        let cache = TtlCache::<u32, u32>::new(Duration::zero());
        for day in 0..50 {
            cache.get_or_fetch(day, || async move { Ok(day) }).await.unwrap();
        }
        assert_eq!(cache.len().await, 1);

        let cache = TtlCache::<u32, u32>::new(Duration::hours(1));
        for day in 0..50 {
            cache.get_or_fetch(day, || async move { Ok(day) }).await.unwrap();
        }
        assert_eq!(cache.len().await, 50);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = TtlCache::<(), u32>::new(Duration::hours(1));
        let res = cache
            .get_or_fetch((), || async { Err(anyhow::anyhow!("upstream down")) })
            .await;
        assert!(res.is_err());

        let v = cache.get_or_fetch((), || async { Ok(7) }).await.unwrap();
        assert_eq!(v, 7);
    }

    #[tokio::test]
    async fn clear_drops_entries() {
        let cache = TtlCache::<u32, u32>::new(Duration::hours(1));
        cache.get_or_fetch(1, || async { Ok(10) }).await.unwrap();
        cache.get_or_fetch(2, || async { Ok(20) }).await.unwrap();

        assert_eq!(cache.clear().await, 2);
        assert_eq!(cache.len().await, 0);
        let v = cache.get_or_fetch(1, || async { Ok(11) }).await.unwrap();
        assert_eq!(v, 11);
    }

    #[tokio::test]
    async fn slow_fetch_does_not_block_other_keys() {
        let cache = Arc::new(TtlCache::<u32, u32>::new(Duration::hours(1)));
        cache.get_or_fetch(1, || async { Ok(10) }).await.unwrap();

        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let slow = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move {
                cache
                    .get_or_fetch(2, move || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok(20)
                    })
                    .await
            }
        });
        started_rx.await.unwrap();

        let hit = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            cache.get_or_fetch(1, || async { Ok(99) }),
        )
        .await
        .expect("cached key waited on another key's fetch")
        .unwrap();
        assert_eq!(hit, 10);

        release_tx.send(()).unwrap();
        assert_eq!(slow.await.unwrap().unwrap(), 20);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let cache = TtlCache::<u32, u32>::new(Duration::hours(1));
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok::<u32, anyhow::Error>(5)
        };

        let (a, b) = tokio::join!(cache.get_or_fetch(7, fetch), cache.get_or_fetch(7, fetch));
        assert_eq!((a.unwrap(), b.unwrap()), (5, 5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
