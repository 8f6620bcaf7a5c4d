//! Per-pass memoization.
//!
//! Both [`Memo`] and [`Memoized`] own their cache; dropping the value drops
//! every cached entry. There is intentionally no shared or global variant.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

/// Unbounded key/value cache filled on first access.
#[derive(Debug)]
pub struct Memo<K, V> {
    cache: HashMap<K, V>,
    misses: usize,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            cache: HashMap::new(),
            misses: 0,
        }
    }
}

impl<K: Eq + Hash + Clone, V> Memo<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert_with(&mut self, key: K, f: impl FnOnce(&K) -> V) -> &V {
        match self.cache.entry(key) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                self.misses += 1;
                let value = f(e.key());
                e.insert(value)
            }
        }
    }

    /// Async, fallible fill. Errors are not cached.
    pub async fn get_or_try_insert_async<E, Fut>(
        &mut self,
        key: K,
        f: impl FnOnce(K) -> Fut,
    ) -> Result<&V, E>
    where
        Fut: Future<Output = Result<V, E>>,
    {
        match self.cache.entry(key) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let value = f(e.key().clone()).await?;
                self.misses += 1;
                Ok(e.insert(value))
            }
        }
    }

    /// Number of lookups that reached the underlying function.
    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// A function wrapped with a [`Memo`].
pub struct Memoized<K, V, F> {
    f: F,
    memo: Memo<K, V>,
}

impl<K, V, F> Memoized<K, V, F>
where
    K: Eq + Hash + Clone,
    V: Clone,
    F: FnMut(&K) -> V,
{
    pub fn get(&mut self, key: &K) -> V {
        let f = &mut self.f;
        self.memo.get_or_insert_with(key.clone(), |k| f(k)).clone()
    }

    /// How many times the wrapped function actually ran.
    pub fn calls(&self) -> usize {
        self.memo.misses()
    }
}

/// Anything that can be turned into a [`Memoized`] lookup.
pub trait Memoize<K, V> {
    type Output;

    fn memoize(self) -> Self::Output;
}

impl<K, V, F> Memoize<K, V> for F
where
    K: Eq + Hash + Clone,
    V: Clone,
    F: FnMut(&K) -> V,
{
    type Output = Memoized<K, V, F>;

    fn memoize(self) -> Self::Output {
        Memoized {
            f: self,
            memo: Memo::new(),
        }
    }
}

// Already memoized: keep the existing cache instead of stacking another one.
impl<K, V, F> Memoize<K, V> for Memoized<K, V, F> {
    type Output = Self;

    fn memoize(self) -> Self::Output {
        self
    }
}

/// Cache `f` per distinct key for as long as the returned value lives.
pub fn memoize<K, V, M: Memoize<K, V>>(f: M) -> M::Output {
    f.memoize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memoize_calls_once_per_key() {
        let mut lookup = memoize::<u32, u32, _>(|k: &u32| k * 10);
        assert_eq!(lookup.get(&1), 10);
        assert_eq!(lookup.get(&1), 10);
        assert_eq!(lookup.get(&2), 20);
        assert_eq!(lookup.calls(), 2);
    }

    #[test]
    fn test_memoize_is_idempotent() {
        let mut once = memoize::<String, usize, _>(|k: &String| k.len());
        once.get(&"abc".to_string());

        let mut twice = memoize::<String, usize, _>(once);
        assert_eq!(twice.get(&"abc".to_string()), 3);
        // Cache survived rewrapping, so no new call.
        assert_eq!(twice.calls(), 1);
    }

    #[test]
    fn test_memo_sync_fill() {
        let mut memo: Memo<&str, usize> = Memo::new();
        assert_eq!(*memo.get_or_insert_with("abc", |k| k.len()), 3);
        assert_eq!(*memo.get_or_insert_with("abc", |_| 99), 3);
        assert_eq!(memo.misses(), 1);
        assert_eq!(memo.len(), 1);
    }

    #[tokio::test]
    async fn test_memo_async_errors_not_cached() {
        let mut memo: Memo<u32, u32> = Memo::new();

        let err = memo
            .get_or_try_insert_async(7, |_| async { Err::<u32, &str>("boom") })
            .await;
        assert_eq!(err, Err("boom"));
        assert!(memo.is_empty());

        let ok = memo
            .get_or_try_insert_async(7, |k| async move { Ok::<_, &str>(k + 1) })
            .await
            .copied();
        assert_eq!(ok, Ok(8));

        let cached = memo
            .get_or_try_insert_async(7, |_| async { Err::<u32, &str>("not called") })
            .await
            .copied();
        assert_eq!(cached, Ok(8));
        assert_eq!(memo.misses(), 1);
    }
}
