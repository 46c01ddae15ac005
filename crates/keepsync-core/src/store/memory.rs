// ── In-process store ──
//
// Keeps the value in memory. Latency and failures can be injected, and
// every call is recorded, which makes it the workhorse for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::ValueStore;
use crate::error::StoreError;

/// A [`ValueStore`] that lives in memory.
///
/// Cheaply cloneable; clones share the same contents and call log, so a
/// test can keep one handle while the synchronizer owns another.
pub struct MemoryStore<T> {
    settings: Settings,
    inner: Arc<Shared<T>>,
}

#[derive(Debug, Clone, Default)]
struct Settings {
    load_delay: Duration,
    save_delay: Duration,
    load_failure: Option<String>,
}

struct Shared<T> {
    value: Mutex<Option<T>>,
    save_calls: Mutex<Vec<T>>,
    pending_save_failures: AtomicUsize,
    load_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> MemoryStore<T> {
    /// An empty store: the first load returns `None`.
    pub fn new() -> Self {
        Self::from_option(None)
    }

    /// A store that already holds `value`.
    pub fn with_value(value: T) -> Self {
        Self::from_option(Some(value))
    }

    /// Delay every `load()` by `delay`.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.settings.load_delay = delay;
        self
    }

    /// Delay every `save()` by `delay`.
    pub fn with_save_delay(mut self, delay: Duration) -> Self {
        self.settings.save_delay = delay;
        self
    }

    /// Make `load()` fail with `message`.
    pub fn with_load_failure(mut self, message: impl Into<String>) -> Self {
        self.settings.load_failure = Some(message.into());
        self
    }

    /// Make the next `count` calls to `save()` fail.
    pub fn fail_next_saves(&self, count: usize) {
        self.inner
            .pending_save_failures
            .store(count, Ordering::SeqCst);
    }

    /// The value as it currently sits in the store.
    pub fn stored(&self) -> Option<T> {
        self.inner.value.lock().clone()
    }

    /// Every value passed to `save()`, in call order, including failed ones.
    pub fn save_calls(&self) -> Vec<T> {
        self.inner.save_calls.lock().clone()
    }

    pub fn load_calls(&self) -> usize {
        self.inner.load_calls.load(Ordering::SeqCst)
    }

    /// Highest number of `save()` calls ever observed running concurrently.
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    fn from_option(value: Option<T>) -> Self {
        Self {
            settings: Settings::default(),
            inner: Arc::new(Shared {
                value: Mutex::new(value),
                save_calls: Mutex::new(Vec::new()),
                pending_save_failures: AtomicUsize::new(0),
                load_calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter even if the save future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<T: Clone + Send + Sync + 'static> ValueStore<T> for MemoryStore<T> {
    async fn load(&self) -> Result<Option<T>, StoreError> {
        self.inner.load_calls.fetch_add(1, Ordering::SeqCst);
        if !self.settings.load_delay.is_zero() {
            tokio::time::sleep(self.settings.load_delay).await;
        }
        if let Some(ref message) = self.settings.load_failure {
            return Err(StoreError::backend(message.clone()));
        }
        Ok(self.inner.value.lock().clone())
    }

    async fn save(&self, value: &T) -> Result<(), StoreError> {
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.inner.in_flight);
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.inner.save_calls.lock().push(value.clone());

        if !self.settings.save_delay.is_zero() {
            tokio::time::sleep(self.settings.save_delay).await;
        }

        let should_fail = self
            .inner
            .pending_save_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(StoreError::backend("injected save failure"));
        }

        *self.inner.value.lock() = Some(value.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_store_loads_none() {
        let store: MemoryStore<u32> = MemoryStore::new();
        assert_eq!(store.load().await.unwrap(), None);
        assert_eq!(store.load_calls(), 1);
    }

    #[tokio::test]
    async fn save_replaces_value_and_is_recorded() {
        let store = MemoryStore::with_value(1u32);
        store.save(&2).await.unwrap();
        store.save(&3).await.unwrap();
        assert_eq!(store.stored(), Some(3));
        assert_eq!(store.save_calls(), vec![2, 3]);
        assert_eq!(store.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let store = MemoryStore::with_value(0u32);
        store.fail_next_saves(1);
        assert!(store.save(&1).await.is_err());
        assert_eq!(store.stored(), Some(0));
        store.save(&2).await.unwrap();
        assert_eq!(store.stored(), Some(2));
        assert_eq!(store.save_calls(), vec![1, 2]);
    }

    #[tokio::test]
    async fn load_failure_is_reported() {
        let store: MemoryStore<u32> = MemoryStore::new().with_load_failure("offline");
        let err = store.load().await.unwrap_err();
        assert_eq!(err.to_string(), "offline");
    }

    #[tokio::test(start_paused = true)]
    async fn builder_keeps_earlier_settings() {
        let store = MemoryStore::with_value(5u32)
            .with_load_delay(Duration::from_millis(10))
            .with_save_delay(Duration::from_millis(20));

        let start = tokio::time::Instant::now();
        assert_eq!(store.load().await.unwrap(), Some(5));
        assert!(start.elapsed() >= Duration::from_millis(10));
        store.save(&6).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
