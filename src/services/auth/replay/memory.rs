//! Process-local replay cache.
//!
//! A hashmap keyed by replay key with an absolute expiry per entry. Expired
//! entries are dropped lazily on lookup, when the cache reaches capacity, and
//! by the background sweeper. Memory is bounded by `capacity`: if a sweep
//! cannot free a slot the check fails closed instead of evicting live keys
//! (evicting a live key would re-open the replay window for it).
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::{collections::HashMap, future::Future, pin::Pin, sync::Mutex};

use crate::services::auth::replay::store::{ReplayError, ReplayStore};
use crate::services::clock::SharedClock;

pub struct InMemoryReplayCache {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
    capacity: usize,
    clock: SharedClock,
}

impl std::fmt::Debug for InMemoryReplayCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryReplayCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl InMemoryReplayCache {
    pub fn new(capacity: usize, clock: SharedClock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            clock,
        }
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert_if_absent(&self, key: &str, ttl_secs: u64) -> Result<bool, ReplayError> {
        let now = self.clock.now();
        let expires_at = ChronoDuration::try_seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX))
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        // Lookup and insert happen under one lock acquisition.
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(seen_until) = entries.get(key) {
            if *seen_until > now {
                return Ok(false);
            }
            entries.remove(key);
        }

        if entries.len() >= self.capacity {
            entries.retain(|_, expires_at| *expires_at > now);
            if entries.len() >= self.capacity {
                return Err(ReplayError::CapacityExceeded {
                    capacity: self.capacity,
                });
            }
        }

        entries.insert(key.to_string(), expires_at);
        Ok(true)
    }
}

impl ReplayStore for InMemoryReplayCache {
    fn check_and_store<'a>(
        &'a self,
        key: &'a str,
        ttl_secs: u64,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ReplayError>> + Send + 'a>> {
        Box::pin(async move { self.insert_if_absent(key, ttl_secs) })
    }
}
