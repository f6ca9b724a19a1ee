//! Per-key async mutual exclusion.
//!
//! One registry replaces the two ad-hoc lock tables of the original
//! design (per-workspace generation locks and per-destination write
//! locks). A registry is an explicit value with a lifecycle - owned by
//! whatever component needs it, constructed per process or per test -
//! never a hidden process-wide global.
//!
//! Waiters on the same key are served in acquisition order (the tokio
//! mutex is FIFO-fair). An entry lives only while someone holds or
//! awaits its lock; an idle registry is empty.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

struct Registry<K> {
    table: StdMutex<HashMap<K, Arc<Mutex<()>>>>,
}

pub struct KeyedMutex<K: Eq + Hash + Clone> {
    registry: Arc<Registry<K>>,
}

impl<K: Eq + Hash + Clone> Default for KeyedMutex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> KeyedMutex<K> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                table: StdMutex::new(HashMap::new()),
            }),
        }
    }

    /// Acquires the lock for `key`, waiting behind any current holder.
    pub async fn lock(&self, key: K) -> KeyedGuard<K> {
        let entry = {
            let mut table = self.registry.table.lock().expect("lock table poisoned");
            table
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let guard = entry.lock_owned().await;
        KeyedGuard {
            registry: self.registry.clone(),
            key,
            guard: Some(guard),
        }
    }

    /// True while any holder or waiter exists for `key`. Test hook.
    pub fn is_locked(&self, key: &K) -> bool {
        self.registry
            .table
            .lock()
            .expect("lock table poisoned")
            .contains_key(key)
    }
}

pub struct KeyedGuard<K: Eq + Hash + Clone> {
    registry: Arc<Registry<K>>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> Drop for KeyedGuard<K> {
    fn drop(&mut self) {
        // Release the mutex first so a queued waiter can proceed, then
        // drop the table entry if nobody else references it. Clones of
        // the entry Arc are only taken under the table lock, so the
        // strong count observed here is consistent.
        self.guard.take();
        let mut table = self.registry.table.lock().expect("lock table poisoned");
        if let Some(entry) = table.get(&self.key) {
            if Arc::strong_count(entry) == 1 {
                table.remove(&self.key);
            }
        }
    }
}
