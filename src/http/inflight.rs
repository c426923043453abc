//! Registry of in-flight requests keyed by request key.
//!
//! Each entry holds the cancellation token of the call currently owning the
//! key. At most one entry exists per key. Registration under auto-cancel
//! cancels the previous owner inside the same map-entry critical section, so
//! no concurrent dispatch can observe two live entries for one key.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

struct Slot {
    id: u64,
    token: CancellationToken,
}

/// Proof of registration, used to release only our own entry.
#[derive(Debug)]
pub struct Registration {
    key: String,
    id: u64,
    token: CancellationToken,
}

impl Registration {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Mapping from request key to cancellation handle.
#[derive(Default)]
pub struct InFlightRegistry {
    slots: DashMap<String, Slot>,
    next_id: AtomicU64,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token under `key`.
    ///
    /// With `auto_cancel`, a previous owner of the key is cancelled before the
    /// new token takes its place. Without it the previous token is only
    /// dropped from the registry and keeps running.
    pub fn register(&self, key: &str, auto_cancel: bool) -> Registration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let slot = Slot {
            id,
            token: token.clone(),
        };

        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if auto_cancel {
                    occupied.get().token.cancel();
                    tracing::debug!(key = %key, "cancelled superseded request");
                } else {
                    tracing::debug!(key = %key, "replaced in-flight handle without cancelling");
                }
                occupied.insert(slot);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
            }
        }

        Registration {
            key: key.to_string(),
            id,
            token,
        }
    }

    /// Remove the entry if it still belongs to `registration`.
    pub fn release(&self, registration: &Registration) {
        self.slots
            .remove_if(&registration.key, |_, slot| slot.id == registration.id);
    }

    /// Cancel and remove the entry under `key`. No-op for unknown keys.
    pub fn cancel(&self, key: &str) -> bool {
        match self.slots.remove(key) {
            Some((_, slot)) => {
                slot.token.cancel();
                tracing::debug!(key = %key, "cancelled in-flight request");
                true
            }
            None => false,
        }
    }

    /// Cancel and remove every entry.
    pub fn cancel_all(&self) -> usize {
        let keys: Vec<String> = self.slots.iter().map(|e| e.key().clone()).collect();
        keys.iter().filter(|key| self.cancel(key)).count()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Keys currently registered.
    pub fn keys(&self) -> Vec<String> {
        self.slots.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
