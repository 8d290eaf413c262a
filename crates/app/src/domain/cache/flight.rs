//! Single-flight loads.

use std::{future::Future, hash::Hash, sync::Arc};

use rustc_hash::FxHashMap;
use tokio::sync::{Mutex, OnceCell};

/// Collapses concurrent loads for the same key into one.
///
/// Callers that arrive while a load is running wait for its result. A failed load is not
/// shared: the next waiter runs the load itself, and callers arriving meanwhile join that
/// retry. A key is released once a load succeeds or nobody is left waiting on it.
#[derive(Debug)]
pub struct SingleFlight<K, T> {
    flights: Mutex<FxHashMap<K, Arc<OnceCell<T>>>>,
}

impl<K, T> Default for SingleFlight<K, T> {
    fn default() -> Self {
        Self {
            flights: Mutex::new(FxHashMap::default()),
        }
    }
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `load` for `key` unless a load for it is already in flight.
    ///
    /// # Errors
    ///
    /// Returns the error of the load this caller ran.
    pub async fn run<E, F, Fut>(&self, key: &K, load: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let cell = {
            let mut flights = self.flights.lock().await;

            Arc::clone(flights.entry(key.clone()).or_default())
        };

        let result = cell.get_or_try_init(load).await.cloned();

        let mut flights = self.flights.lock().await;

        // The map and this caller hold the only references when nobody else is waiting.
        let settled = result.is_ok() || Arc::strong_count(&cell) <= 2;

        if settled
            && flights
                .get(key)
                .is_some_and(|current| Arc::ptr_eq(current, &cell))
        {
            flights.remove(key);
        }

        result
    }

    /// Detach any in-flight load for `key` so later callers start a fresh one.
    pub async fn forget(&self, key: &K) {
        self.flights.lock().await.remove(key);
    }

    #[cfg(test)]
    pub async fn in_flight(&self) -> usize {
        self.flights.lock().await.len()
    }
}
