//! Per-symbol single-flight guard.
//!
//! At most one unit of work per symbol runs at a time. A caller that finds
//! the symbol busy waits for the running holder to finish, so requests for
//! the same symbol run one after another.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

type FlightMap = Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>;

#[derive(Clone, Default)]
pub struct SingleFlight {
    locks: FlightMap,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let locks = self.locks.read().await;
        if let Some(lock) = locks.get(key) {
            return lock.clone();
        }
        drop(locks);

        let mut locks = self.locks.write().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Claim `key`, waiting for any current holder. The claim lasts as long
    /// as the guard.
    pub async fn claim(&self, key: &str) -> OwnedMutexGuard<()> {
        self.lock_for(key).await.lock_owned().await
    }

    /// True while some caller holds `key`.
    pub async fn is_busy(&self, key: &str) -> bool {
        let lock = self.lock_for(key).await;
        lock.try_lock().map(drop).is_err()
    }
}
