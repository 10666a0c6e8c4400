//! Short-lived values keyed by OAuth state. Entries the callback never
//! claims are pruned once they outlive the TTL.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub const PENDING_AUTHORIZATION_TTL: Duration = Duration::from_secs(15 * 60);

struct Entry<T> {
    value: T,
    created: Instant,
}

pub struct PendingStore<T> {
    entries: Mutex<HashMap<String, Entry<T>>>,
    ttl: Duration,
}

impl<T> PendingStore<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn insert(&self, key: String, value: T) {
        let mut entries = self.entries.lock().await;
        self.prune(&mut entries);
        entries.insert(
            key,
            Entry {
                value,
                created: Instant::now(),
            },
        );
    }

    /// Removes and returns a live entry. Expired entries are never returned.
    pub async fn take(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.lock().await;
        self.prune(&mut entries);
        entries.remove(key).map(|entry| entry.value)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    fn prune(&self, entries: &mut HashMap<String, Entry<T>>) {
        let before = entries.len();
        entries.retain(|_, entry| entry.created.elapsed() < self.ttl);
        let pruned = before - entries.len();
        if pruned > 0 {
            debug!("Pruned {} expired pending authorizations", pruned);
        }
    }
}
